//! Record extractor: streams source tables row by row into selection records.
//!
//! Each row's identifier field is a whitespace-separated list of tokens. The
//! first token carrying the primary marker (`omid:` by default) becomes the
//! record's primary identifier; every token without the marker is kept, in
//! order, as a secondary identifier. Rows with no primary token are skipped
//! silently.
//!
//! Failure handling is deliberately asymmetric:
//!
//! - an unreadable or malformed file is logged and skipped; the next file runs
//! - a failed resource check halts the whole extraction, not just the file
//!
//! Either way, records produced before the fault are kept.

use crate::checkpoint::CheckpointLedger;
use crate::config::{ConfigResult, PipelineConfig};
use crate::error::SourceError;
use crate::monitor::{ResourceLimits, ResourceMonitor};
use crate::source::SourceFile;

/// Canonical record for one selected row.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SelectionRecord {
    /// Primary identifier with the marker stripped. Never empty.
    pub primary_id: String,
    /// Raw `scheme:literal` tokens, in field order.
    pub secondary_ids: Vec<String>,
    /// Title cell as read; `None` when the table has no title column.
    pub title: Option<String>,
}

/// Result of classifying one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Selected(SelectionRecord),
    /// No primary identifier token. Not a failure.
    Skipped,
}

/// Split an identifier field into the primary identifier and the others.
///
/// Returns `None` when no token carries `primary_prefix` with a non-empty
/// remainder. Marker tokens after the first are dropped.
pub fn split_identifiers(field: &str, primary_prefix: &str) -> Option<(String, Vec<String>)> {
    let mut primary = None;
    let mut others = Vec::new();
    for token in field.split_whitespace() {
        match token.strip_prefix(primary_prefix) {
            Some(rest) => {
                if primary.is_none() && !rest.is_empty() {
                    primary = Some(rest.to_string());
                } else {
                    tracing::debug!(token, "ignoring extra primary-marker token");
                }
            }
            None => others.push(token.to_string()),
        }
    }
    primary.map(|p| (p, others))
}

/// Classify one row from its identifier and title cells.
pub fn parse_row(id_field: Option<&str>, title: Option<&str>, primary_prefix: &str) -> RowOutcome {
    let Some(field) = id_field.filter(|f| !f.is_empty()) else {
        return RowOutcome::Skipped;
    };
    match split_identifiers(field, primary_prefix) {
        Some((primary_id, secondary_ids)) => RowOutcome::Selected(SelectionRecord {
            primary_id,
            secondary_ids,
            title: title.map(str::to_string),
        }),
        None => RowOutcome::Skipped,
    }
}

/// Column layout of the source tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLayout {
    pub id_column: String,
    pub title_column: String,
    pub primary_prefix: String,
    pub delimiter: u8,
}

impl Default for FieldLayout {
    fn default() -> Self {
        Self {
            id_column: "id".into(),
            title_column: "title".into(),
            primary_prefix: "omid:".into(),
            delimiter: b',',
        }
    }
}

/// Caller-facing limits for one extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Stop after this many selection records in total. `Some(0)` produces
    /// none; `None` is unlimited.
    pub test_limit: Option<usize>,
    /// Only the first this-many sources, in discovery order. `Some(0)` opens
    /// no file; `None` is unlimited.
    pub file_limit: Option<usize>,
}

/// Why extraction stopped.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StopReason {
    /// Every source was visited.
    SourcesExhausted,
    /// `test_limit` records were produced.
    TestLimitReached { limit: usize },
    /// A resource check failed; no later source was attempted.
    ResourceExhausted { source: String, row: u64 },
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SourcesExhausted => write!(f, "all sources visited"),
            Self::TestLimitReached { limit } => write!(f, "test limit of {limit} records reached"),
            Self::ResourceExhausted { source, row } => {
                write!(f, "controlled abort: resources exhausted at row {row} of {source}")
            }
        }
    }
}

/// What happened to one source.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    /// Read to the end and recorded in the ledger.
    Completed { rows: u64, selected: usize },
    /// Already in the ledger; not opened.
    AlreadyProcessed,
    /// Open, read or decode failure; the rest of the file was skipped.
    Failed {
        rows: u64,
        selected: usize,
        error: String,
    },
    /// Stopped by `test_limit`.
    Truncated { rows: u64, selected: usize },
    /// Stopped by a failed resource check.
    Aborted { rows: u64, selected: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FileReport {
    pub name: String,
    #[serde(flatten)]
    pub outcome: FileOutcome,
}

/// Everything one extraction produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOutcome {
    pub records: Vec<SelectionRecord>,
    pub files: Vec<FileReport>,
    pub stop: StopReason,
}

/// How a single file's stream ended, short of an error.
enum FileEnd {
    Finished,
    LimitReached,
    ResourceAbort { row: u64 },
}

#[derive(Default)]
struct Tally {
    rows: u64,
    selected: usize,
}

/// Streams selection records out of source tables.
#[derive(Debug, Clone)]
pub struct RecordExtractor {
    layout: FieldLayout,
    limits: ResourceLimits,
    check_every: u64,
}

impl RecordExtractor {
    pub fn new(layout: FieldLayout, limits: ResourceLimits, check_every: u64) -> Self {
        Self {
            layout,
            limits,
            check_every: check_every.max(1),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> ConfigResult<Self> {
        let layout = FieldLayout {
            id_column: config.source.id_column.clone(),
            title_column: config.source.title_column.clone(),
            primary_prefix: config.source.primary_prefix.clone(),
            delimiter: config.source.delimiter_byte()?,
        };
        Ok(Self::new(
            layout,
            config.resources.limits(),
            config.resources.check_every_rows,
        ))
    }

    /// Extract selection records from `sources`, in order.
    ///
    /// Sources already in `ledger` are skipped; sources read to the end are
    /// recorded in it.
    pub fn extract(
        &self,
        sources: &[SourceFile],
        options: ExtractOptions,
        monitor: &mut dyn ResourceMonitor,
        ledger: &mut CheckpointLedger,
    ) -> ExtractOutcome {
        let sources = match options.file_limit {
            Some(n) => &sources[..n.min(sources.len())],
            None => sources,
        };

        let mut records = Vec::new();
        let mut files = Vec::new();
        let mut remaining = options.test_limit;

        if sources.is_empty() {
            tracing::info!("no source files to process");
        }

        for source in sources {
            if let (Some(0), Some(limit)) = (remaining, options.test_limit) {
                tracing::info!(limit, "test limit reached");
                return ExtractOutcome {
                    records,
                    files,
                    stop: StopReason::TestLimitReached { limit },
                };
            }

            if ledger.contains(&source.name) {
                tracing::info!(source = %source.name, "already processed, skipping");
                files.push(FileReport {
                    name: source.name.clone(),
                    outcome: FileOutcome::AlreadyProcessed,
                });
                continue;
            }

            tracing::info!(source = %source, "reading source");
            let mut tally = Tally::default();
            let result = self.stream_file(source, monitor, &mut remaining, &mut records, &mut tally);

            match result {
                Ok(FileEnd::Finished) => {
                    tracing::info!(
                        source = %source.name,
                        rows = tally.rows,
                        selected = tally.selected,
                        "source complete"
                    );
                    if let Err(e) = ledger.record(&source.name) {
                        tracing::warn!(error = %e, "checkpoint not recorded");
                    }
                    files.push(FileReport {
                        name: source.name.clone(),
                        outcome: FileOutcome::Completed {
                            rows: tally.rows,
                            selected: tally.selected,
                        },
                    });
                }
                Ok(FileEnd::LimitReached) => {
                    let limit = options.test_limit.unwrap_or(records.len());
                    tracing::info!(limit, source = %source.name, "test limit reached");
                    files.push(FileReport {
                        name: source.name.clone(),
                        outcome: FileOutcome::Truncated {
                            rows: tally.rows,
                            selected: tally.selected,
                        },
                    });
                    return ExtractOutcome {
                        records,
                        files,
                        stop: StopReason::TestLimitReached { limit },
                    };
                }
                Ok(FileEnd::ResourceAbort { row }) => {
                    tracing::error!(
                        source = %source.name,
                        row,
                        kept = records.len(),
                        "controlled abort: system resources too high"
                    );
                    files.push(FileReport {
                        name: source.name.clone(),
                        outcome: FileOutcome::Aborted {
                            rows: tally.rows,
                            selected: tally.selected,
                        },
                    });
                    return ExtractOutcome {
                        records,
                        files,
                        stop: StopReason::ResourceExhausted {
                            source: source.name.clone(),
                            row,
                        },
                    };
                }
                Err(e) => {
                    tracing::warn!(source = %source.name, error = %e, "skipping unreadable source");
                    files.push(FileReport {
                        name: source.name.clone(),
                        outcome: FileOutcome::Failed {
                            rows: tally.rows,
                            selected: tally.selected,
                            error: e.to_string(),
                        },
                    });
                }
            }
        }

        ExtractOutcome {
            records,
            files,
            stop: StopReason::SourcesExhausted,
        }
    }

    fn stream_file(
        &self,
        source: &SourceFile,
        monitor: &mut dyn ResourceMonitor,
        remaining: &mut Option<usize>,
        out: &mut Vec<SelectionRecord>,
        tally: &mut Tally,
    ) -> Result<FileEnd, SourceError> {
        let malformed = |row: u64, e: csv::Error| SourceError::Malformed {
            name: source.name.clone(),
            row,
            message: e.to_string(),
        };

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.layout.delimiter)
            .flexible(true)
            .from_reader(source.open()?);

        let headers = reader.headers().map_err(|e| malformed(0, e))?.clone();
        if headers.is_empty() {
            return Ok(FileEnd::Finished);
        }
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim_start_matches('\u{feff}').trim() == name)
        };
        let id_idx = column(&self.layout.id_column).ok_or_else(|| SourceError::MissingColumn {
            name: source.name.clone(),
            column: self.layout.id_column.clone(),
        })?;
        let title_idx = column(&self.layout.title_column);

        let mut row = csv::StringRecord::new();
        loop {
            let index = tally.rows + 1;
            if !reader.read_record(&mut row).map_err(|e| malformed(index, e))? {
                return Ok(FileEnd::Finished);
            }
            if index % self.check_every == 0 && !monitor.check(&self.limits) {
                return Ok(FileEnd::ResourceAbort { row: index });
            }
            tally.rows = index;

            let title = title_idx.and_then(|i| row.get(i));
            match parse_row(row.get(id_idx), title, &self.layout.primary_prefix) {
                RowOutcome::Selected(record) => {
                    out.push(record);
                    tally.selected += 1;
                    if let Some(left) = remaining.as_mut() {
                        *left = left.saturating_sub(1);
                        if *left == 0 {
                            return Ok(FileEnd::LimitReached);
                        }
                    }
                }
                RowOutcome::Skipped => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::ResourceSample;

    /// Monitor that fails the check on its `fail_on`-th call.
    struct FailOn {
        calls: usize,
        fail_on: Option<usize>,
    }

    impl FailOn {
        fn never() -> Self {
            Self {
                calls: 0,
                fail_on: None,
            }
        }
        fn nth(n: usize) -> Self {
            Self {
                calls: 0,
                fail_on: Some(n),
            }
        }
    }

    impl ResourceMonitor for FailOn {
        fn sample(&mut self) -> Option<ResourceSample> {
            self.calls += 1;
            let hot = self.fail_on == Some(self.calls);
            Some(ResourceSample {
                memory_percent: if hot { 99.0 } else { 10.0 },
                cpu_percent: 10.0,
            })
        }
    }

    fn extractor() -> RecordExtractor {
        RecordExtractor::new(FieldLayout::default(), ResourceLimits::default(), 500)
    }

    fn table(rows: &[(&str, &str)]) -> String {
        let mut out = String::from("id,title\n");
        for (id, title) in rows {
            out.push_str(&format!("\"{id}\",\"{title}\"\n"));
        }
        out
    }

    fn numbered(name: &str, n: usize) -> SourceFile {
        let mut out = String::from("id,title\n");
        for i in 1..=n {
            out.push_str(&format!("omid:br/{name}-{i} doi:10.1/{name}{i},T{i}\n"));
        }
        SourceFile::in_memory(name, out)
    }

    #[test]
    fn split_picks_first_marker_and_keeps_others_in_order() {
        let (primary, others) =
            split_identifiers("doi:10.1/x omid:br/1 issn:1234 omid:br/2", "omid:").unwrap();
        assert_eq!(primary, "br/1");
        assert_eq!(others, vec!["doi:10.1/x", "issn:1234"]);
    }

    #[test]
    fn split_without_marker_is_none() {
        assert!(split_identifiers("doi:10.1/x issn:1", "omid:").is_none());
        assert!(split_identifiers("omid:", "omid:").is_none());
        assert!(split_identifiers("   ", "omid:").is_none());
    }

    #[test]
    fn parse_row_keeps_empty_title() {
        let out = parse_row(Some("omid:2"), Some(""), "omid:");
        assert_eq!(
            out,
            RowOutcome::Selected(SelectionRecord {
                primary_id: "2".into(),
                secondary_ids: vec![],
                title: Some(String::new()),
            })
        );
        assert_eq!(parse_row(None, Some("T"), "omid:"), RowOutcome::Skipped);
        assert_eq!(parse_row(Some(""), Some("T"), "omid:"), RowOutcome::Skipped);
    }

    #[test]
    fn two_row_scenario() {
        let source = SourceFile::in_memory("a.csv", table(&[("omid:1 doi:10.1/x", "A"), ("omid:2", "")]));
        let mut ledger = CheckpointLedger::in_memory();
        let out = extractor().extract(
            &[source],
            ExtractOptions::default(),
            &mut FailOn::never(),
            &mut ledger,
        );
        assert_eq!(
            out.records,
            vec![
                SelectionRecord {
                    primary_id: "1".into(),
                    secondary_ids: vec!["doi:10.1/x".into()],
                    title: Some("A".into()),
                },
                SelectionRecord {
                    primary_id: "2".into(),
                    secondary_ids: vec![],
                    title: Some(String::new()),
                },
            ]
        );
        assert_eq!(out.stop, StopReason::SourcesExhausted);
        assert!(ledger.contains("a.csv"));
    }

    #[test]
    fn rows_without_primary_are_silent_skips() {
        let source = SourceFile::in_memory(
            "a.csv",
            table(&[("doi:10.1/x", "no omid"), ("", "empty"), ("omid:3", "kept")]),
        );
        let out = extractor().extract(
            &[source],
            ExtractOptions::default(),
            &mut FailOn::never(),
            &mut CheckpointLedger::in_memory(),
        );
        assert_eq!(out.records.len(), 1);
        assert_eq!(
            out.files[0].outcome,
            FileOutcome::Completed {
                rows: 3,
                selected: 1
            }
        );
    }

    #[test]
    fn missing_title_column_yields_none() {
        let source = SourceFile::in_memory("a.csv", "id\nomid:1\n");
        let out = extractor().extract(
            &[source],
            ExtractOptions::default(),
            &mut FailOn::never(),
            &mut CheckpointLedger::in_memory(),
        );
        assert_eq!(out.records[0].title, None);
    }

    #[test]
    fn test_limit_stops_mid_file_and_skips_later_files() {
        let sources = [numbered("a", 10), numbered("b", 10)];
        let mut ledger = CheckpointLedger::in_memory();
        let out = extractor().extract(
            &sources,
            ExtractOptions {
                test_limit: Some(3),
                file_limit: None,
            },
            &mut FailOn::never(),
            &mut ledger,
        );
        assert_eq!(out.records.len(), 3);
        assert_eq!(out.stop, StopReason::TestLimitReached { limit: 3 });
        assert_eq!(out.files.len(), 1);
        assert_eq!(
            out.files[0].outcome,
            FileOutcome::Truncated {
                rows: 3,
                selected: 3
            }
        );
        assert!(!ledger.contains("a"));
    }

    #[test]
    fn test_limit_spanning_files() {
        let sources = [numbered("a", 2), numbered("b", 10)];
        let out = extractor().extract(
            &sources,
            ExtractOptions {
                test_limit: Some(4),
                file_limit: None,
            },
            &mut FailOn::never(),
            &mut CheckpointLedger::in_memory(),
        );
        assert_eq!(out.records.len(), 4);
        assert_eq!(out.records[3].primary_id, "br/b-2");
    }

    #[test]
    fn zero_test_limit_opens_nothing() {
        let out = extractor().extract(
            &[numbered("a", 2)],
            ExtractOptions {
                test_limit: Some(0),
                file_limit: None,
            },
            &mut FailOn::never(),
            &mut CheckpointLedger::in_memory(),
        );
        assert!(out.records.is_empty());
        assert!(out.files.is_empty());
        assert_eq!(out.stop, StopReason::TestLimitReached { limit: 0 });
    }

    #[test]
    fn zero_file_limit_processes_no_file() {
        let mut ledger = CheckpointLedger::in_memory();
        let out = extractor().extract(
            &[numbered("a", 2)],
            ExtractOptions {
                test_limit: None,
                file_limit: Some(0),
            },
            &mut FailOn::never(),
            &mut ledger,
        );
        assert!(out.records.is_empty());
        assert!(out.files.is_empty());
        assert!(ledger.is_empty());
        assert_eq!(out.stop, StopReason::SourcesExhausted);
    }

    #[test]
    fn file_limit_slices_in_order() {
        let sources = [numbered("a", 1), numbered("b", 1), numbered("c", 1)];
        let out = extractor().extract(
            &sources,
            ExtractOptions {
                test_limit: None,
                file_limit: Some(2),
            },
            &mut FailOn::never(),
            &mut CheckpointLedger::in_memory(),
        );
        let names: Vec<_> = out.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn resource_abort_at_row_500_keeps_earlier_rows_and_halts_run() {
        let sources = [numbered("a", 800), numbered("b", 5)];
        let mut ledger = CheckpointLedger::in_memory();
        let mut monitor = FailOn::nth(1);
        let out = extractor().extract(&sources, ExtractOptions::default(), &mut monitor, &mut ledger);

        assert_eq!(out.records.len(), 499);
        assert_eq!(out.records.last().unwrap().primary_id, "br/a-499");
        assert_eq!(
            out.stop,
            StopReason::ResourceExhausted {
                source: "a".into(),
                row: 500
            }
        );
        assert_eq!(out.files.len(), 1);
        assert!(!ledger.contains("a"));
        assert_eq!(monitor.calls, 1);
    }

    #[test]
    fn checks_happen_every_interval() {
        let sources = [numbered("a", 1_250)];
        let mut monitor = FailOn::never();
        let out = extractor().extract(
            &sources,
            ExtractOptions::default(),
            &mut monitor,
            &mut CheckpointLedger::in_memory(),
        );
        assert_eq!(out.records.len(), 1_250);
        assert_eq!(monitor.calls, 2);
    }

    #[test]
    fn malformed_file_is_skipped_and_next_file_runs() {
        let mut bad = b"id,title\nomid:1,ok\nomid:2,".to_vec();
        bad.extend_from_slice(&[0xff, 0xfe, b'\n']);
        bad.extend_from_slice(b"omid:3,after\n");
        let sources = [
            SourceFile::in_memory("bad.csv", bad),
            SourceFile::in_memory("good.csv", "id,title\nomid:9,fine\n"),
        ];
        let mut ledger = CheckpointLedger::in_memory();
        let out = extractor().extract(&sources, ExtractOptions::default(), &mut FailOn::never(), &mut ledger);

        let ids: Vec<_> = out.records.iter().map(|r| r.primary_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "9"]);
        assert!(matches!(out.files[0].outcome, FileOutcome::Failed { rows: 1, .. }));
        assert_eq!(out.stop, StopReason::SourcesExhausted);
        assert!(!ledger.contains("bad.csv"));
        assert!(ledger.contains("good.csv"));
    }

    #[test]
    fn missing_id_column_fails_the_file() {
        let sources = [SourceFile::in_memory("x.csv", "ids,title\nomid:1,a\n")];
        let out = extractor().extract(
            &sources,
            ExtractOptions::default(),
            &mut FailOn::never(),
            &mut CheckpointLedger::in_memory(),
        );
        assert!(out.records.is_empty());
        assert!(matches!(out.files[0].outcome, FileOutcome::Failed { .. }));
    }

    #[test]
    fn already_processed_sources_are_not_opened() {
        let mut ledger = CheckpointLedger::in_memory();
        ledger.record("gone.csv").unwrap();
        let sources = [SourceFile::from_path("gone.csv", "/not/there.csv")];
        let out = extractor().extract(&sources, ExtractOptions::default(), &mut FailOn::never(), &mut ledger);
        assert_eq!(out.files[0].outcome, FileOutcome::AlreadyProcessed);
    }

    #[test]
    fn empty_file_completes() {
        let sources = [SourceFile::in_memory("empty.csv", "")];
        let out = extractor().extract(
            &sources,
            ExtractOptions::default(),
            &mut FailOn::never(),
            &mut CheckpointLedger::in_memory(),
        );
        assert_eq!(
            out.files[0].outcome,
            FileOutcome::Completed {
                rows: 0,
                selected: 0
            }
        );
    }

    #[test]
    fn bom_prefixed_header_is_recognized() {
        let sources = [SourceFile::in_memory("bom.csv", "\u{feff}id,title\nomid:1,A\n")];
        let out = extractor().extract(
            &sources,
            ExtractOptions::default(),
            &mut FailOn::never(),
            &mut CheckpointLedger::in_memory(),
        );
        assert_eq!(out.records.len(), 1);
    }
}
