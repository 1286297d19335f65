//! Graph serialization for the full and incomplete outputs.

use std::io::Write;
use std::path::Path;

use oxigraph::io::{RdfFormat, RdfSerializer};
use oxigraph::model::{Graph, TripleRef};

use crate::error::OutputError;
use crate::graph::vocab;

pub type OutputResult<T> = std::result::Result<T, OutputError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Turtle,
    NTriples,
}

impl OutputFormat {
    fn rdf_format(self) -> RdfFormat {
        match self {
            Self::Turtle => RdfFormat::Turtle,
            Self::NTriples => RdfFormat::NTriples,
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = OutputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "turtle" | "ttl" => Ok(Self::Turtle),
            "ntriples" | "n-triples" | "nt" => Ok(Self::NTriples),
            _ => Err(OutputError::UnsupportedFormat {
                format: s.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Turtle => f.write_str("turtle"),
            Self::NTriples => f.write_str("ntriples"),
        }
    }
}

/// Serialize `graph` into `writer`. Triples are written in sorted order.
pub fn serialize_graph<W: Write>(graph: &Graph, writer: W, format: OutputFormat) -> OutputResult<W> {
    let mut serializer = RdfSerializer::from_format(format.rdf_format());
    if format == OutputFormat::Turtle {
        for (prefix, iri) in vocab::PREFIXES {
            serializer = serializer
                .with_prefix(*prefix, *iri)
                .map_err(|e| OutputError::Prefix {
                    prefix: prefix.to_string(),
                    message: e.to_string(),
                })?;
        }
    }

    let mut triples: Vec<TripleRef<'_>> = graph.iter().collect();
    triples.sort_by_cached_key(|t| t.to_string());

    let io = |source: std::io::Error| OutputError::Write {
        path: "<writer>".into(),
        source,
    };
    let mut out = serializer.for_writer(writer);
    for triple in triples {
        out.serialize_triple(triple).map_err(io)?;
    }
    out.finish().map_err(io)
}

/// Write `graph` to `path`.
pub fn write_graph(graph: &Graph, path: &Path, format: OutputFormat) -> OutputResult<()> {
    let write_err = |source: std::io::Error| OutputError::Write {
        path: path.display().to_string(),
        source,
    };
    let file = std::fs::File::create(path).map_err(write_err)?;
    let writer = serialize_graph(graph, std::io::BufWriter::new(file), format).map_err(|e| match e {
        OutputError::Write { source, .. } => write_err(source),
        other => other,
    })?;
    writer
        .into_inner()
        .map_err(|e| write_err(e.into_error()))?
        .sync_all()
        .map_err(write_err)?;
    tracing::info!(path = %path.display(), triples = graph.len(), %format, "graph written");
    Ok(())
}
