//! Rich diagnostic error types for the bibsieve pipeline.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains. Per-row and
//! per-identifier failures are not errors here: they are typed outcomes
//! collected by the extractor and the builder.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for a pipeline run.
#[derive(Debug, Error, Diagnostic)]
pub enum SieveError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Enrich(#[from] EnrichError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Output(#[from] OutputError),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(sieve::config::read),
        help("Ensure the config file exists and is readable, or omit --config to use defaults.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {message}")]
    #[diagnostic(
        code(sieve::config::parse),
        help("Check the TOML syntax. `bibsieve init-config` writes a complete default file.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(sieve::config::write),
        help("Ensure you have write permissions to the target directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {message}")]
    #[diagnostic(code(sieve::config::invalid), help("{hint}"))]
    Invalid { message: String, hint: String },
}

// ---------------------------------------------------------------------------
// Checkpoint ledger errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum LedgerError {
    #[error("failed to read checkpoint ledger {path}")]
    #[diagnostic(
        code(sieve::ledger::read),
        help(
            "The ledger is a plain text file with one source name per line. \
             Delete it to reprocess every source from scratch."
        )
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to append \"{name}\" to checkpoint ledger {path}")]
    #[diagnostic(
        code(sieve::ledger::append),
        help("Check disk space and write permissions for the ledger file.")
    )]
    Append {
        path: String,
        name: String,
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Source file errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum SourceError {
    #[error("source root not found: {path}")]
    #[diagnostic(
        code(sieve::source::root_missing),
        help("Point `source.root` (or --source-root) at the directory holding the tables.")
    )]
    RootMissing { path: String },

    #[error("failed to walk source tree at {path}: {message}")]
    #[diagnostic(
        code(sieve::source::walk),
        help("A directory under the source root could not be read. Check permissions.")
    )]
    Walk { path: String, message: String },

    #[error("failed to open source \"{name}\"")]
    #[diagnostic(
        code(sieve::source::open),
        help("The file was discovered but could not be opened. It is skipped for this run.")
    )]
    Open {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed table \"{name}\" at row {row}: {message}")]
    #[diagnostic(
        code(sieve::source::malformed),
        help(
            "The file is not valid delimited UTF-8 text. Rows read before the fault \
             are kept; the rest of the file is skipped."
        )
    )]
    Malformed {
        name: String,
        row: u64,
        message: String,
    },

    #[error("table \"{name}\" has no \"{column}\" column")]
    #[diagnostic(
        code(sieve::source::missing_column),
        help("Set `source.id_column` to the header holding the identifier tokens.")
    )]
    MissingColumn { name: String, column: String },
}

// ---------------------------------------------------------------------------
// Entity graph errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    #[error("invalid IRI \"{iri}\": {message}")]
    #[diagnostic(
        code(sieve::graph::invalid_iri),
        help(
            "Entity IRIs are built as base IRI + identifier. The identifier contains \
             characters that are not allowed in an IRI."
        )
    )]
    InvalidIri { iri: String, message: String },

    #[error("bibliographic resource already exists: {iri}")]
    #[diagnostic(
        code(sieve::graph::duplicate_resource),
        help(
            "Two selection records share the same primary identifier, or the persistent \
             store already holds this resource from an earlier run."
        )
    )]
    DuplicateResource { iri: String },

    #[error("identifier {iri} already uses scheme {existing}, not {requested}")]
    #[diagnostic(
        code(sieve::graph::scheme_conflict),
        help("Identifier IRIs are derived from the literal alone; the same literal appeared under two schemes.")
    )]
    SchemeConflict {
        iri: String,
        existing: String,
        requested: String,
    },

    #[error("node is not a {expected}: {iri}")]
    #[diagnostic(
        code(sieve::graph::unknown_node),
        help("Create the node before attaching anything to it.")
    )]
    UnknownNode { iri: String, expected: &'static str },

    #[error("graph storage error: {message}")]
    #[diagnostic(
        code(sieve::graph::storage),
        help(
            "The oxigraph store failed. For a persistent store check the directory \
             permissions and that no other process holds it open."
        )
    )]
    Storage { message: String },
}

// ---------------------------------------------------------------------------
// Enrichment errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum EnrichError {
    #[error("graph too large for enrichment: {triples} triples exceeds ceiling of {ceiling}")]
    #[diagnostic(
        code(sieve::enrich::graph_too_large),
        help(
            "Lower --test-limit or --file-limit to ingest fewer records per run, \
             or raise `enrich.max_graph_triples` if the host has memory to spare."
        )
    )]
    GraphTooLarge { triples: usize, ceiling: usize },

    #[error("unknown enricher \"{name}\"")]
    #[diagnostic(
        code(sieve::enrich::unknown),
        help("Known enrichers are: provenance, none.")
    )]
    Unknown { name: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),
}

// ---------------------------------------------------------------------------
// Output errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum OutputError {
    #[error("failed to write {path}")]
    #[diagnostic(
        code(sieve::output::write),
        help("Check that the output directory exists and is writable.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported output format: \"{format}\"")]
    #[diagnostic(
        code(sieve::output::format),
        help("Supported formats are: turtle, ntriples.")
    )]
    UnsupportedFormat { format: String },

    #[error("invalid serializer prefix {prefix}: {message}")]
    #[diagnostic(code(sieve::output::prefix))]
    Prefix { prefix: String, message: String },
}

/// Convenience alias for functions returning pipeline results.
pub type SieveResult<T> = std::result::Result<T, SieveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_error_converts_to_sieve_error() {
        let err = GraphError::DuplicateResource {
            iri: "https://w3id.org/oc/meta/br/1".into(),
        };
        let top: SieveError = err.into();
        assert!(matches!(
            top,
            SieveError::Graph(GraphError::DuplicateResource { .. })
        ));
    }

    #[test]
    fn enrich_error_wraps_graph_error() {
        let err: EnrichError = GraphError::Storage {
            message: "disk".into(),
        }
        .into();
        assert!(matches!(err, EnrichError::Graph(GraphError::Storage { .. })));
    }

    #[test]
    fn ceiling_message_names_both_sizes() {
        let err = EnrichError::GraphTooLarge {
            triples: 12_000,
            ceiling: 10_000,
        };
        let msg = format!("{err}");
        assert!(msg.contains("12000"));
        assert!(msg.contains("10000"));
    }
}
