//! Pipeline configuration, persisted as TOML.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! runnable configuration once `source.root` is supplied.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::monitor::ResourceLimits;

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Top-level configuration for one ingestion run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Namespace every entity IRI is derived from.
    #[serde(default = "default_base_iri")]
    pub base_iri: String,
    /// Responsible-agent label attached to every node this tool creates.
    #[serde(default = "default_resp_agent")]
    pub resp_agent: String,
    #[serde(default)]
    pub source: SourceSettings,
    #[serde(default)]
    pub checkpoint: CheckpointSettings,
    #[serde(default)]
    pub resources: ResourceSettings,
    #[serde(default)]
    pub completeness: CompletenessSettings,
    #[serde(default)]
    pub graph: GraphSettings,
    #[serde(default)]
    pub enrich: EnrichSettings,
    #[serde(default)]
    pub output: OutputSettings,
}

/// Where the tables live and how their rows are laid out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSettings {
    /// Directory walked recursively for source tables.
    #[serde(default)]
    pub root: Option<PathBuf>,
    /// File extension (case-insensitive, without the dot).
    #[serde(default = "default_extension")]
    pub extension: String,
    #[serde(default = "default_id_column")]
    pub id_column: String,
    #[serde(default = "default_title_column")]
    pub title_column: String,
    /// Marker prefix of the primary identifier token.
    #[serde(default = "default_primary_prefix")]
    pub primary_prefix: String,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointSettings {
    #[serde(default = "default_checkpoint_path")]
    pub path: PathBuf,
    /// When false, the ledger is kept in memory and nothing is skipped.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSettings {
    #[serde(default = "default_max_memory_percent")]
    pub max_memory_percent: f32,
    #[serde(default = "default_max_cpu_percent")]
    pub max_cpu_percent: f32,
    /// Rows between two resource checks within one file.
    #[serde(default = "default_check_every_rows")]
    pub check_every_rows: u64,
    /// Length of the CPU sampling window in milliseconds.
    #[serde(default = "default_cpu_sample_ms")]
    pub cpu_sample_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletenessSettings {
    #[serde(default = "default_required_schemes")]
    pub required_schemes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSettings {
    /// Persistent oxigraph directory. `None` keeps the graph in memory.
    #[serde(default)]
    pub store_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichSettings {
    /// Enricher name: `provenance` or `none`.
    #[serde(default = "default_enricher")]
    pub enricher: String,
    /// Refuse to grow the graph past this many triples during enrichment.
    /// `0` turns the ceiling off.
    #[serde(default = "default_max_graph_triples")]
    pub max_graph_triples: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(default = "default_enriched_file")]
    pub enriched_file: PathBuf,
    #[serde(default = "default_incomplete_file")]
    pub incomplete_file: PathBuf,
    /// `turtle` or `ntriples`.
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_base_iri() -> String {
    "https://w3id.org/oc/meta/".into()
}
fn default_resp_agent() -> String {
    "bibsieve".into()
}
fn default_extension() -> String {
    "csv".into()
}
fn default_id_column() -> String {
    "id".into()
}
fn default_title_column() -> String {
    "title".into()
}
fn default_primary_prefix() -> String {
    "omid:".into()
}
fn default_delimiter() -> String {
    ",".into()
}
fn default_checkpoint_path() -> PathBuf {
    PathBuf::from("processed_files.txt")
}
fn default_true() -> bool {
    true
}
fn default_max_memory_percent() -> f32 {
    85.0
}
fn default_max_cpu_percent() -> f32 {
    95.0
}
fn default_check_every_rows() -> u64 {
    500
}
fn default_cpu_sample_ms() -> u64 {
    500
}
fn default_required_schemes() -> Vec<String> {
    vec![
        "doi".into(),
        "issn".into(),
        "wikidata".into(),
        "openalex".into(),
    ]
}
fn default_enricher() -> String {
    "provenance".into()
}
fn default_max_graph_triples() -> Option<usize> {
    Some(20_000_000)
}
fn default_enriched_file() -> PathBuf {
    PathBuf::from("enriched.ttl")
}
fn default_incomplete_file() -> PathBuf {
    PathBuf::from("incomplete.ttl")
}
fn default_format() -> String {
    "turtle".into()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_iri: default_base_iri(),
            resp_agent: default_resp_agent(),
            source: SourceSettings::default(),
            checkpoint: CheckpointSettings::default(),
            resources: ResourceSettings::default(),
            completeness: CompletenessSettings::default(),
            graph: GraphSettings::default(),
            enrich: EnrichSettings::default(),
            output: OutputSettings::default(),
        }
    }
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            root: None,
            extension: default_extension(),
            id_column: default_id_column(),
            title_column: default_title_column(),
            primary_prefix: default_primary_prefix(),
            delimiter: default_delimiter(),
        }
    }
}

impl Default for CheckpointSettings {
    fn default() -> Self {
        Self {
            path: default_checkpoint_path(),
            enabled: true,
        }
    }
}

impl Default for ResourceSettings {
    fn default() -> Self {
        Self {
            max_memory_percent: default_max_memory_percent(),
            max_cpu_percent: default_max_cpu_percent(),
            check_every_rows: default_check_every_rows(),
            cpu_sample_ms: default_cpu_sample_ms(),
        }
    }
}

impl Default for CompletenessSettings {
    fn default() -> Self {
        Self {
            required_schemes: default_required_schemes(),
        }
    }
}

impl Default for EnrichSettings {
    fn default() -> Self {
        Self {
            enricher: default_enricher(),
            max_graph_triples: default_max_graph_triples(),
        }
    }
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            enriched_file: default_enriched_file(),
            incomplete_file: default_incomplete_file(),
            format: default_format(),
        }
    }
}

impl SourceSettings {
    /// The delimiter as the single byte the CSV reader expects.
    pub fn delimiter_byte(&self) -> ConfigResult<u8> {
        match self.delimiter.as_bytes() {
            [b] if b.is_ascii() => Ok(*b),
            _ => Err(ConfigError::Invalid {
                message: format!("delimiter {:?} is not a single ASCII character", self.delimiter),
                hint: "Use a one-character delimiter such as \",\" or \"\\t\".".into(),
            }),
        }
    }
}

impl ResourceSettings {
    pub fn limits(&self) -> ResourceLimits {
        ResourceLimits {
            max_memory_percent: self.max_memory_percent,
            max_cpu_percent: self.max_cpu_percent,
        }
    }
}

impl PipelineConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml(&content, &path.display().to_string())
    }

    /// Parse from TOML text; `origin` names the text in error messages.
    pub fn from_toml(content: &str, origin: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: origin.to_string(),
            message: e.to_string(),
        })
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.base_iri.is_empty() {
            return Err(invalid(
                "base_iri is required",
                "Set base_iri, e.g. \"https://w3id.org/oc/meta/\".",
            ));
        }
        if let Err(e) = oxigraph::model::NamedNode::new(self.base_iri.as_str()) {
            return Err(invalid(
                format!("base_iri {:?} is not an absolute IRI: {e}", self.base_iri),
                "Use an absolute IRI ending in '/' or '#'.",
            ));
        }
        if self.source.primary_prefix.is_empty() {
            return Err(invalid(
                "source.primary_prefix must not be empty",
                "The default marker is \"omid:\".",
            ));
        }
        self.source.delimiter_byte()?;
        if self.resources.check_every_rows == 0 {
            return Err(invalid(
                "resources.check_every_rows must be > 0",
                "The default checks every 500 rows.",
            ));
        }
        for (name, value) in [
            ("max_memory_percent", self.resources.max_memory_percent),
            ("max_cpu_percent", self.resources.max_cpu_percent),
        ] {
            if !(value > 0.0 && value <= 100.0) {
                return Err(invalid(
                    format!("resources.{name} = {value} is outside (0, 100]"),
                    "Thresholds are utilization percentages.",
                ));
            }
        }
        if self.completeness.required_schemes.iter().all(|s| s.trim().is_empty()) {
            return Err(invalid(
                "completeness.required_schemes is empty",
                "List at least one scheme, e.g. [\"doi\"].",
            ));
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>, hint: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        message: message.into(),
        hint: hint.into(),
    }
}
