//! Pipeline run: the context object that owns one run's state and drives its stages.
//!
//! Stages run in order: extract → build → enrich → classify → write. Each
//! stage reads the state the previous one left in the [`PipelineRun`], so
//! independent runs (and tests) never share accumulators.

use std::path::PathBuf;

use serde::Serialize;

use crate::build::{DiagnosticsLog, EntityBuilder, MissingEntry};
use crate::checkpoint::CheckpointLedger;
use crate::classify::{Classification, CompletenessClassifier};
use crate::config::PipelineConfig;
use crate::enrich::{EnrichReport, Enricher, run_enrichment};
use crate::error::{ConfigError, SieveResult};
use crate::extract::{ExtractOptions, FileReport, RecordExtractor, SelectionRecord, StopReason};
use crate::graph::OxiEntityStore;
use crate::monitor::ResourceMonitor;
use crate::output::{OutputFormat, write_graph};
use crate::source::{SourceFile, discover_sources};

/// Number of missing-data entries shown in a summary.
pub const MISSING_SAMPLE: usize = 5;

/// Outcome of the enrichment stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EnrichStatus {
    Completed(EnrichReport),
    /// Enrichment stopped with a reported error; no outputs were written.
    Failed { enricher: String, message: String },
    NotRun,
}

/// Outcome of the classify-and-write stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutputStatus {
    Written,
    /// Classification or serialization failed; counts above are still valid.
    Failed { message: String },
    NotWritten,
}

/// End-of-run report. Always produced, whatever failed per item.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub records: usize,
    pub created: usize,
    pub missing: usize,
    pub missing_sample: Vec<MissingEntry>,
    pub stop: StopReason,
    pub files: Vec<FileReport>,
    pub enrichment: EnrichStatus,
    pub output: OutputStatus,
    pub complete: usize,
    pub incomplete: usize,
    pub enriched_file: Option<PathBuf>,
    pub incomplete_file: Option<PathBuf>,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "bibsieve run summary")?;
        writeln!(f, "  stop:         {}", self.stop)?;
        writeln!(f, "  files:        {}", self.files.len())?;
        writeln!(f, "  records:      {}", self.records)?;
        writeln!(f, "  created:      {}", self.created)?;
        writeln!(f, "  missing:      {}", self.missing)?;
        for entry in &self.missing_sample {
            writeln!(f, "    - {entry}")?;
        }
        match &self.enrichment {
            EnrichStatus::Completed(report) => writeln!(
                f,
                "  enrichment:   {} (+{} triples)",
                report.enricher, report.triples_added
            )?,
            EnrichStatus::Failed { enricher, message } => {
                writeln!(f, "  enrichment:   {enricher} FAILED: {message}")?
            }
            EnrichStatus::NotRun => writeln!(f, "  enrichment:   not run")?,
        }
        match &self.output {
            OutputStatus::Written => writeln!(f, "  output:       written")?,
            OutputStatus::Failed { message } => writeln!(f, "  output:       FAILED: {message}")?,
            OutputStatus::NotWritten => writeln!(f, "  output:       not written")?,
        }
        writeln!(f, "  complete:     {}", self.complete)?;
        writeln!(f, "  incomplete:   {}", self.incomplete)?;
        if let Some(path) = &self.enriched_file {
            writeln!(f, "  full graph:   {}", path.display())?;
        }
        if let Some(path) = &self.incomplete_file {
            writeln!(f, "  incomplete graph: {}", path.display())?;
        }
        Ok(())
    }
}

/// State owned by one pipeline run.
pub struct PipelineRun {
    config: PipelineConfig,
    format: OutputFormat,
    store: OxiEntityStore,
    ledger: CheckpointLedger,
    selected: Vec<SelectionRecord>,
    files: Vec<FileReport>,
    stop: StopReason,
    diagnostics: DiagnosticsLog,
}

impl PipelineRun {
    /// Validate `config` and open the store and ledger it names.
    pub fn new(config: PipelineConfig) -> SieveResult<Self> {
        config.validate()?;
        let store = match &config.graph.store_dir {
            Some(dir) => OxiEntityStore::open(dir, &config.base_iri)?,
            None => OxiEntityStore::in_memory(&config.base_iri)?,
        };
        let ledger = if config.checkpoint.enabled {
            CheckpointLedger::open(&config.checkpoint.path)?
        } else {
            CheckpointLedger::in_memory()
        };
        Self::with_parts(config, store, ledger)
    }

    /// Assemble a run from an already-open store and ledger.
    pub fn with_parts(
        config: PipelineConfig,
        store: OxiEntityStore,
        ledger: CheckpointLedger,
    ) -> SieveResult<Self> {
        let format = config.output.format.parse()?;
        tracing::info!(
            base_iri = %config.base_iri,
            checkpoints = ledger.len(),
            "pipeline run ready"
        );
        Ok(Self {
            config,
            format,
            store,
            ledger,
            selected: Vec::new(),
            files: Vec::new(),
            stop: StopReason::SourcesExhausted,
            diagnostics: DiagnosticsLog::new(),
        })
    }

    pub fn store(&self) -> &OxiEntityStore {
        &self.store
    }

    pub fn ledger(&self) -> &CheckpointLedger {
        &self.ledger
    }

    pub fn selected(&self) -> &[SelectionRecord] {
        &self.selected
    }

    /// Sources under the configured root, in discovery order.
    pub fn discover(&self) -> SieveResult<Vec<SourceFile>> {
        let root = self.config.source.root.as_ref().ok_or_else(|| ConfigError::Invalid {
            message: "source.root is not set".into(),
            hint: "Set `source.root` in the config or pass --source-root.".into(),
        })?;
        let sources = discover_sources(root, &self.config.source.extension)?;
        if sources.is_empty() {
            tracing::info!(root = %root.display(), "no source files found");
        } else {
            tracing::info!(root = %root.display(), count = sources.len(), "discovered sources");
        }
        Ok(sources)
    }

    /// Stage 1: stream selection records out of `sources`.
    pub fn extract(
        &mut self,
        sources: &[SourceFile],
        options: ExtractOptions,
        monitor: &mut dyn ResourceMonitor,
    ) -> SieveResult<&StopReason> {
        let extractor = RecordExtractor::from_config(&self.config)?;
        let outcome = extractor.extract(sources, options, monitor, &mut self.ledger);
        tracing::info!(records = outcome.records.len(), stop = %outcome.stop, "extraction finished");
        self.selected.extend(outcome.records);
        self.files.extend(outcome.files);
        self.stop = outcome.stop;
        Ok(&self.stop)
    }

    /// Stage 2: materialize the selected records.
    pub fn build(&mut self) -> &DiagnosticsLog {
        let log = std::mem::take(&mut self.diagnostics);
        let mut builder = EntityBuilder::with_log(&self.store, &self.config.resp_agent, log);
        builder.build_all(&self.selected);
        self.diagnostics = builder.finish();
        &self.diagnostics
    }

    /// Stage 3: run `enricher` under the configured graph-size ceiling.
    pub fn enrich(&self, enricher: &dyn Enricher) -> EnrichStatus {
        match run_enrichment(enricher, &self.store, self.config.enrich.max_graph_triples) {
            Ok(report) => {
                tracing::info!(
                    enricher = %report.enricher,
                    added = report.triples_added,
                    "enrichment complete"
                );
                EnrichStatus::Completed(report)
            }
            Err(e) => {
                tracing::error!(enricher = enricher.name(), error = %e, "enrichment failed");
                EnrichStatus::Failed {
                    enricher: enricher.name().to_string(),
                    message: e.to_string(),
                }
            }
        }
    }

    /// Stage 4: split the enriched graph by completeness.
    pub fn classify(&self) -> SieveResult<Classification> {
        let classifier = CompletenessClassifier::new(&self.config.completeness.required_schemes);
        Ok(classifier.classify(&self.store)?)
    }

    /// Stage 5: write the full graph, and the incomplete graph when non-empty.
    pub fn write_outputs(
        &self,
        classification: &Classification,
    ) -> SieveResult<(PathBuf, Option<PathBuf>)> {
        let enriched = self.config.output.enriched_file.clone();
        write_graph(&classification.full, &enriched, self.format)?;

        let incomplete = if classification.incomplete.is_empty() {
            tracing::info!("no incomplete entities, skipping incomplete output");
            None
        } else {
            let path = self.config.output.incomplete_file.clone();
            write_graph(&classification.incomplete, &path, self.format)?;
            Some(path)
        };
        Ok((enriched, incomplete))
    }

    /// Run every stage over `sources`.
    pub fn execute(
        &mut self,
        sources: &[SourceFile],
        options: ExtractOptions,
        monitor: &mut dyn ResourceMonitor,
        enricher: &dyn Enricher,
    ) -> SieveResult<RunSummary> {
        self.extract(sources, options, monitor)?;
        self.build();

        let enrichment = self.enrich(enricher);
        let mut summary = self.summary(enrichment);
        if matches!(summary.enrichment, EnrichStatus::Failed { .. }) {
            return Ok(summary);
        }

        let classification = match self.classify() {
            Ok(classification) => classification,
            Err(e) => {
                tracing::error!(error = %e, "classification failed");
                summary.output = OutputStatus::Failed {
                    message: e.to_string(),
                };
                return Ok(summary);
            }
        };
        summary.complete = classification.complete_count();
        summary.incomplete = classification.incomplete_count();

        match self.write_outputs(&classification) {
            Ok((enriched, incomplete)) => {
                summary.output = OutputStatus::Written;
                summary.enriched_file = Some(enriched);
                summary.incomplete_file = incomplete;
            }
            Err(e) => {
                tracing::error!(error = %e, "writing outputs failed");
                summary.output = OutputStatus::Failed {
                    message: e.to_string(),
                };
            }
        }
        Ok(summary)
    }

    /// Summary of the state so far.
    pub fn summary(&self, enrichment: EnrichStatus) -> RunSummary {
        RunSummary {
            records: self.selected.len(),
            created: self.diagnostics.created,
            missing: self.diagnostics.missing.len(),
            missing_sample: self.diagnostics.sample(MISSING_SAMPLE).to_vec(),
            stop: self.stop.clone(),
            files: self.files.clone(),
            enrichment,
            output: OutputStatus::NotWritten,
            complete: 0,
            incomplete: 0,
            enriched_file: None,
            incomplete_file: None,
        }
    }
}

impl std::fmt::Debug for PipelineRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineRun")
            .field("base_iri", &self.config.base_iri)
            .field("selected", &self.selected.len())
            .field("created", &self.diagnostics.created)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::{NoopEnricher, ProvenanceEnricher};
    use crate::monitor::UnmonitoredResources;

    fn config(dir: &std::path::Path) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.checkpoint.enabled = false;
        config.output.enriched_file = dir.join("enriched.ttl");
        config.output.incomplete_file = dir.join("incomplete.ttl");
        config
    }

    fn sources() -> Vec<SourceFile> {
        vec![SourceFile::in_memory(
            "a.csv",
            "id,title\n\
             \"omid:1 doi:10.1/x\",A\n\
             \"omid:2 doi:10.1/y issn:1 wikidata:Q1 openalex:W1 junk\",B\n\
             doi:10.1/z,no primary\n",
        )]
    }

    #[test]
    fn full_run_writes_both_outputs() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut run = PipelineRun::new(config(dir.path())).unwrap();
        let summary = run
            .execute(
                &sources(),
                ExtractOptions::default(),
                &mut UnmonitoredResources,
                &ProvenanceEnricher,
            )
            .unwrap();

        assert_eq!(summary.records, 2);
        assert_eq!(summary.created, 2);
        assert_eq!(summary.missing, 1);
        assert_eq!(summary.missing_sample[0].token, "junk");
        assert_eq!(summary.complete, 1);
        assert_eq!(summary.incomplete, 1);
        assert_eq!(summary.output, OutputStatus::Written);
        assert!(dir.path().join("enriched.ttl").exists());
        assert_eq!(summary.incomplete_file, Some(dir.path().join("incomplete.ttl")));
        assert!(summary.to_string().contains("created:      2"));
    }

    #[test]
    fn all_complete_skips_incomplete_output() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut cfg = config(dir.path());
        cfg.completeness.required_schemes = vec!["doi".into()];
        let mut run = PipelineRun::new(cfg).unwrap();
        let summary = run
            .execute(
                &sources(),
                ExtractOptions::default(),
                &mut UnmonitoredResources,
                &NoopEnricher,
            )
            .unwrap();
        assert_eq!(summary.incomplete, 0);
        assert_eq!(summary.incomplete_file, None);
        assert!(!dir.path().join("incomplete.ttl").exists());
    }

    #[test]
    fn ceiling_reports_instead_of_crashing() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut cfg = config(dir.path());
        cfg.enrich.max_graph_triples = Some(1);
        let mut run = PipelineRun::new(cfg).unwrap();
        let summary = run
            .execute(
                &sources(),
                ExtractOptions::default(),
                &mut UnmonitoredResources,
                &ProvenanceEnricher,
            )
            .unwrap();
        assert!(matches!(summary.enrichment, EnrichStatus::Failed { .. }));
        assert_eq!(summary.created, 2);
        assert!(!dir.path().join("enriched.ttl").exists());
    }

    #[test]
    fn write_failure_still_reports_counts() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut cfg = config(dir.path());
        cfg.output.enriched_file = dir.path().join("no/such/dir/enriched.ttl");
        let mut run = PipelineRun::new(cfg).unwrap();
        let summary = run
            .execute(
                &sources(),
                ExtractOptions::default(),
                &mut UnmonitoredResources,
                &NoopEnricher,
            )
            .unwrap();

        assert_eq!(summary.created, 2);
        assert_eq!(summary.missing, 1);
        assert_eq!(summary.incomplete, 1);
        assert!(matches!(summary.output, OutputStatus::Failed { .. }));
        assert_eq!(summary.enriched_file, None);
        assert!(summary.to_string().contains("output:       FAILED"));
    }

    #[test]
    fn summary_serializes_to_json() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut run = PipelineRun::new(config(dir.path())).unwrap();
        run.extract(&sources(), ExtractOptions::default(), &mut UnmonitoredResources)
            .unwrap();
        run.build();
        let json = serde_json::to_value(run.summary(EnrichStatus::NotRun)).unwrap();
        assert_eq!(json["created"], 2);
        assert_eq!(json["stop"]["kind"], "sources_exhausted");
        assert_eq!(json["enrichment"]["status"], "not_run");
        assert_eq!(json["output"]["status"], "not_written");
        assert_eq!(json["files"][0]["status"], "completed");
    }

    #[test]
    fn independent_runs_do_not_share_state() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut first = PipelineRun::new(config(dir.path())).unwrap();
        first
            .extract(&sources(), ExtractOptions::default(), &mut UnmonitoredResources)
            .unwrap();
        let second = PipelineRun::new(config(dir.path())).unwrap();
        assert_eq!(first.selected().len(), 2);
        assert!(second.selected().is_empty());
    }

    #[test]
    fn bad_format_rejected_up_front() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut cfg = config(dir.path());
        cfg.output.format = "rdfxml".into();
        assert!(PipelineRun::new(cfg).is_err());
    }

    #[test]
    fn discover_requires_root() {
        let dir = tempfile::TempDir::new().unwrap();
        let run = PipelineRun::new(config(dir.path())).unwrap();
        assert!(run.discover().is_err());
    }
}
