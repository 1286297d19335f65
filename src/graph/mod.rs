//! Entity graph: the triple substrate bibliographic entities are written to.
//!
//! The pipeline talks to the graph only through [`EntityStore`], a capability
//! set covering node creation, attachment, enumeration and triple-pattern
//! queries over named sub-graphs. [`OxiEntityStore`] implements it on an
//! oxigraph quad store, in memory or on disk.
//!
//! Layout inside the store, for a base IRI `B`:
//!
//! - `B br/` holds resource typing, titles and `hasIdentifier` links
//! - `B id/` holds identifier typing, schemes and literal values
//! - `B prov/` holds provenance snapshots added by enrichment

pub mod store;
pub mod vocab;

use std::borrow::Cow;

use oxigraph::model::{Graph, NamedNode, NamedNodeRef, Term, TermRef, Triple, TripleRef};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

use crate::error::GraphError;

pub use store::OxiEntityStore;

pub type GraphResult<T> = std::result::Result<T, GraphError>;

/// ASCII characters that may not appear literally in an IRI path, plus `%`
/// so that encoded segments stay unambiguous.
const IRI_UNSAFE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'\\')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Percent-encode an identifier for use as an IRI path segment.
pub fn iri_segment(raw: &str) -> Cow<'_, str> {
    utf8_percent_encode(raw, IRI_UNSAFE).into()
}

/// Outcome of asking the store for an identifier node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierNode {
    /// A new node was written.
    Created,
    /// A node with the same IRI and scheme already existed and is shared.
    Reused,
}

/// Capability set the pipeline needs from a triple store.
pub trait EntityStore {
    /// Namespace every entity IRI is derived from.
    fn base_iri(&self) -> &str;

    /// Create a bibliographic-resource node. Fails on an existing resource.
    fn create_resource(&self, resp_agent: &str, res: NamedNodeRef<'_>) -> GraphResult<()>;

    /// Create (or reuse) an identifier node carrying `scheme` and `literal`.
    fn create_identifier(
        &self,
        resp_agent: &str,
        res: NamedNodeRef<'_>,
        scheme: &str,
        literal: &str,
    ) -> GraphResult<IdentifierNode>;

    /// Link an identifier to a resource via `datacite:hasIdentifier`.
    fn attach_identifier(
        &self,
        resource: NamedNodeRef<'_>,
        identifier: NamedNodeRef<'_>,
    ) -> GraphResult<()>;

    fn attach_title(&self, resource: NamedNodeRef<'_>, title: &str) -> GraphResult<()>;

    /// Insert an arbitrary triple into a named sub-graph. Returns whether it was new.
    fn insert(&self, graph: NamedNodeRef<'_>, triple: TripleRef<'_>) -> GraphResult<bool>;

    /// Every bibliographic-resource node, in IRI order.
    fn resources(&self) -> GraphResult<Vec<NamedNode>>;

    /// Every named sub-graph, in IRI order.
    fn graph_names(&self) -> GraphResult<Vec<NamedNode>>;

    /// Triples of `graph` with a fixed subject, a fixed object, both, or neither.
    fn triples_matching(
        &self,
        graph: NamedNodeRef<'_>,
        subject: Option<NamedNodeRef<'_>>,
        object: Option<TermRef<'_>>,
    ) -> GraphResult<Vec<Triple>>;

    /// Responsible-agent label a node was created with, if known.
    fn responsible_agent(&self, node: NamedNodeRef<'_>) -> Option<String>;

    /// Total number of triples across all sub-graphs.
    fn len(&self) -> GraphResult<usize>;

    fn is_empty(&self) -> GraphResult<bool> {
        self.len().map(|n| n == 0)
    }

    /// `base_iri + suffix` as a node.
    fn iri(&self, suffix: &str) -> GraphResult<NamedNode> {
        parse_iri(format!("{}{suffix}", self.base_iri()))
    }

    /// IRI of the resource for a primary identifier.
    fn resource_iri(&self, primary_id: &str) -> GraphResult<NamedNode> {
        self.iri(&iri_segment(primary_id))
    }

    /// IRI of the identifier node for a literal. The literal itself is stored
    /// unencoded as the node's value.
    fn identifier_iri(&self, literal: &str) -> GraphResult<NamedNode> {
        self.iri(&format!("{}{}", vocab::IDENTIFIER_GRAPH, iri_segment(literal)))
    }

    /// All identifier nodes attached to `resource`, across every sub-graph.
    fn identifiers_of(&self, resource: NamedNodeRef<'_>) -> GraphResult<Vec<NamedNode>> {
        let mut found = Vec::new();
        for graph in self.graph_names()? {
            for triple in self.triples_matching(graph.as_ref(), Some(resource), None)? {
                if triple.predicate.as_ref() != vocab::HAS_IDENTIFIER {
                    continue;
                }
                if let Term::NamedNode(id) = triple.object {
                    if !found.contains(&id) {
                        found.push(id);
                    }
                }
            }
        }
        Ok(found)
    }

    /// Scheme strings of an identifier node (IRIs or literals, as written).
    fn schemes_of(&self, identifier: NamedNodeRef<'_>) -> GraphResult<Vec<String>> {
        let mut schemes = Vec::new();
        for graph in self.graph_names()? {
            for triple in self.triples_matching(graph.as_ref(), Some(identifier), None)? {
                if triple.predicate.as_ref() != vocab::USES_IDENTIFIER_SCHEME {
                    continue;
                }
                schemes.push(term_text(&triple.object));
            }
        }
        Ok(schemes)
    }

    /// Union of every named sub-graph as plain triples.
    fn merged(&self) -> GraphResult<Graph> {
        let mut merged = Graph::new();
        for graph in self.graph_names()? {
            for triple in self.triples_matching(graph.as_ref(), None, None)? {
                merged.insert(&triple);
            }
        }
        Ok(merged)
    }
}

/// Parse an IRI, mapping failures to [`GraphError::InvalidIri`].
pub fn parse_iri(iri: String) -> GraphResult<NamedNode> {
    NamedNode::new(iri.as_str()).map_err(|e| GraphError::InvalidIri {
        message: e.to_string(),
        iri,
    })
}

/// Lexical text of a term: the IRI of a named node, the value of a literal.
pub fn term_text(term: &Term) -> String {
    match term {
        Term::NamedNode(n) => n.as_str().to_string(),
        Term::Literal(l) => l.value().to_string(),
        other => other.to_string(),
    }
}
