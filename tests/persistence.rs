//! Persistence tests: the checkpoint ledger and a persistent entity store
//! survive across runs.

use bibsieve::build::MissingReason;
use bibsieve::checkpoint::CheckpointLedger;
use bibsieve::config::PipelineConfig;
use bibsieve::enrich::NoopEnricher;
use bibsieve::extract::ExtractOptions;
use bibsieve::graph::EntityStore;
use bibsieve::monitor::UnmonitoredResources;
use bibsieve::pipeline::PipelineRun;
use bibsieve::source::SourceFile;

fn persistent_config(dir: &std::path::Path) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.graph.store_dir = Some(dir.join("store"));
    config.checkpoint.path = dir.join("ledger.txt");
    config.output.enriched_file = dir.join("enriched.ttl");
    config.output.incomplete_file = dir.join("incomplete.ttl");
    config
}

#[test]
fn ledger_survives_restart_and_tolerates_duplicates() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("ledger.txt");

    // First session: record two files, one twice.
    {
        let mut ledger = CheckpointLedger::open(&path).unwrap();
        assert!(ledger.is_empty());
        ledger.record("a.csv").unwrap();
        ledger.record("b.csv").unwrap();
        ledger.record("a.csv").unwrap();
    }

    // Second session: the set absorbs the duplicate line.
    let ledger = CheckpointLedger::open(&path).unwrap();
    assert_eq!(ledger.len(), 2);
    assert!(ledger.contains("a.csv"));
    assert!(ledger.contains("b.csv"));
    assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 3);
}

#[test]
fn persistent_store_rejects_resources_from_an_earlier_run() {
    let dir = tempfile::TempDir::new().unwrap();
    let source = || vec![SourceFile::in_memory("a.csv", "id,title\n\"omid:br/1 doi:10.1/a\",A\n")];

    {
        let mut run = PipelineRun::new(persistent_config(dir.path())).unwrap();
        let summary = run
            .execute(&source(), ExtractOptions::default(), &mut UnmonitoredResources, &NoopEnricher)
            .unwrap();
        assert_eq!(summary.created, 1);
    }

    // Same records, new ledger: the store still holds br/1.
    let mut config = persistent_config(dir.path());
    config.checkpoint.path = dir.path().join("fresh-ledger.txt");
    let mut run = PipelineRun::new(config).unwrap();
    let summary = run
        .execute(&source(), ExtractOptions::default(), &mut UnmonitoredResources, &NoopEnricher)
        .unwrap();

    assert_eq!(summary.records, 1);
    assert_eq!(summary.created, 0);
    assert_eq!(summary.missing, 1);
    assert_eq!(summary.missing_sample[0].token, "br/1");
    assert!(matches!(summary.missing_sample[0].reason, MissingReason::Rejected(_)));
    assert_eq!(run.store().resources().unwrap().len(), 1);
}

#[test]
fn checkpointed_in_memory_source_is_skipped_on_rerun() {
    let dir = tempfile::TempDir::new().unwrap();
    let source = || vec![SourceFile::in_memory("a.csv", "id,title\nomid:br/1,A\n")];

    let mut config = persistent_config(dir.path());
    config.graph.store_dir = None;

    let mut first = PipelineRun::new(config.clone()).unwrap();
    first
        .extract(&source(), ExtractOptions::default(), &mut UnmonitoredResources)
        .unwrap();
    assert_eq!(first.selected().len(), 1);
    assert!(first.ledger().contains("a.csv"));

    let mut second = PipelineRun::new(config).unwrap();
    second
        .extract(&source(), ExtractOptions::default(), &mut UnmonitoredResources)
        .unwrap();
    assert!(second.selected().is_empty());
}
