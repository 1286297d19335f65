// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # bibsieve
//!
//! Streaming ingestion of bibliographic tables into an RDF entity graph, with
//! a completeness sieve over the enriched result.
//!
//! ## Architecture
//!
//! - **Extraction** (`extract`): row-by-row CSV streaming with resource checks
//!   (`monitor`) and whole-file restart skipping (`checkpoint`)
//! - **Entity graph** (`graph`): capability trait over an oxigraph quad store,
//!   one named graph per entity kind
//! - **Building** (`build`): resource and identifier nodes, failures isolated
//!   into a diagnostics log
//! - **Enrichment** (`enrich`): pluggable in-place enrichers under a graph-size ceiling
//! - **Classification** (`classify`): required-scheme verdicts and the
//!   incomplete-entity subgraph
//!
//! ## Library usage
//!
//! ```no_run
//! use bibsieve::config::PipelineConfig;
//! use bibsieve::enrich::ProvenanceEnricher;
//! use bibsieve::extract::ExtractOptions;
//! use bibsieve::monitor::SystemMonitor;
//! use bibsieve::pipeline::PipelineRun;
//!
//! let mut config = PipelineConfig::default();
//! config.source.root = Some("data/csv".into());
//! let mut run = PipelineRun::new(config).unwrap();
//! let sources = run.discover().unwrap();
//! let summary = run
//!     .execute(&sources, ExtractOptions::default(), &mut SystemMonitor::default(), &ProvenanceEnricher)
//!     .unwrap();
//! println!("{summary}");
//! ```

pub mod build;
pub mod checkpoint;
pub mod classify;
pub mod config;
pub mod enrich;
pub mod error;
pub mod extract;
pub mod graph;
pub mod monitor;
pub mod output;
pub mod pipeline;
pub mod source;
