//! oxigraph-backed [`EntityStore`].

use std::collections::HashSet;

use dashmap::DashMap;
use oxigraph::model::vocab::rdf;
use oxigraph::model::{
    GraphNameRef, Literal, NamedNode, NamedNodeRef, NamedOrBlankNode, Quad, QuadRef, TermRef,
    Triple, TripleRef,
};
use oxigraph::store::Store;

use crate::error::GraphError;

use super::{EntityStore, GraphResult, IdentifierNode, parse_iri, term_text, vocab};

/// Quad store holding the entity graph, one named graph per entity kind.
pub struct OxiEntityStore {
    store: Store,
    base_iri: String,
    resource_graph: NamedNode,
    identifier_graph: NamedNode,
    agents: DashMap<NamedNode, String>,
}

impl OxiEntityStore {
    /// Create a new in-memory store (no persistence).
    pub fn in_memory(base_iri: &str) -> GraphResult<Self> {
        let store = Store::new().map_err(|e| storage("failed to create oxigraph store", e))?;
        Self::with_store(store, base_iri)
    }

    /// Open or create a persistent store at the given path.
    pub fn open(path: &std::path::Path, base_iri: &str) -> GraphResult<Self> {
        std::fs::create_dir_all(path)
            .map_err(|e| storage("failed to create oxigraph directory", e))?;
        let store = Store::open(path).map_err(|e| GraphError::Storage {
            message: format!("failed to open oxigraph store at {}: {e}", path.display()),
        })?;
        Self::with_store(store, base_iri)
    }

    fn with_store(store: Store, base_iri: &str) -> GraphResult<Self> {
        let resource_graph = parse_iri(format!("{base_iri}{}", vocab::RESOURCE_GRAPH))?;
        let identifier_graph = parse_iri(format!("{base_iri}{}", vocab::IDENTIFIER_GRAPH))?;
        Ok(Self {
            store,
            base_iri: base_iri.to_string(),
            resource_graph,
            identifier_graph,
            agents: DashMap::new(),
        })
    }

    fn insert_quad(&self, quad: QuadRef<'_>) -> GraphResult<bool> {
        self.store
            .insert(quad)
            .map_err(|e| storage("insert failed", e))
    }

    fn contains(&self, quad: QuadRef<'_>) -> GraphResult<bool> {
        self.store
            .contains(quad)
            .map_err(|e| storage("lookup failed", e))
    }

    fn is_resource(&self, res: NamedNodeRef<'_>) -> GraphResult<bool> {
        self.contains(QuadRef::new(
            res,
            rdf::TYPE,
            vocab::EXPRESSION,
            self.resource_graph.as_ref(),
        ))
    }
}

impl EntityStore for OxiEntityStore {
    fn base_iri(&self) -> &str {
        &self.base_iri
    }

    fn create_resource(&self, resp_agent: &str, res: NamedNodeRef<'_>) -> GraphResult<()> {
        if self.is_resource(res)? {
            return Err(GraphError::DuplicateResource {
                iri: res.as_str().to_string(),
            });
        }
        self.insert_quad(QuadRef::new(
            res,
            rdf::TYPE,
            vocab::EXPRESSION,
            self.resource_graph.as_ref(),
        ))?;
        self.agents.insert(res.into_owned(), resp_agent.to_string());
        Ok(())
    }

    fn create_identifier(
        &self,
        resp_agent: &str,
        res: NamedNodeRef<'_>,
        scheme: &str,
        literal: &str,
    ) -> GraphResult<IdentifierNode> {
        let scheme_iri = parse_iri(format!("{}{scheme}", vocab::DATACITE))?;
        let graph = &self.identifier_graph;

        let existing: Vec<String> = self
            .triples_matching(graph.as_ref(), Some(res), None)?
            .into_iter()
            .filter(|t| t.predicate.as_ref() == vocab::USES_IDENTIFIER_SCHEME)
            .map(|t| term_text(&t.object))
            .collect();
        if let Some(first) = existing.first() {
            if existing.iter().any(|s| s == scheme_iri.as_str()) {
                return Ok(IdentifierNode::Reused);
            }
            return Err(GraphError::SchemeConflict {
                iri: res.as_str().to_string(),
                existing: first.clone(),
                requested: scheme_iri.as_str().to_string(),
            });
        }

        let value = Literal::new_simple_literal(literal);
        for quad in [
            QuadRef::new(res, rdf::TYPE, vocab::IDENTIFIER, graph.as_ref()),
            QuadRef::new(res, vocab::USES_IDENTIFIER_SCHEME, scheme_iri.as_ref(), graph.as_ref()),
            QuadRef::new(res, vocab::HAS_LITERAL_VALUE, value.as_ref(), graph.as_ref()),
        ] {
            self.insert_quad(quad)?;
        }
        self.agents.insert(res.into_owned(), resp_agent.to_string());
        Ok(IdentifierNode::Created)
    }

    fn attach_identifier(
        &self,
        resource: NamedNodeRef<'_>,
        identifier: NamedNodeRef<'_>,
    ) -> GraphResult<()> {
        if !self.is_resource(resource)? {
            return Err(GraphError::UnknownNode {
                iri: resource.as_str().to_string(),
                expected: "bibliographic resource",
            });
        }
        let typed = self.contains(QuadRef::new(
            identifier,
            rdf::TYPE,
            vocab::IDENTIFIER,
            self.identifier_graph.as_ref(),
        ))?;
        if !typed {
            return Err(GraphError::UnknownNode {
                iri: identifier.as_str().to_string(),
                expected: "identifier",
            });
        }
        self.insert_quad(QuadRef::new(
            resource,
            vocab::HAS_IDENTIFIER,
            identifier,
            self.resource_graph.as_ref(),
        ))?;
        Ok(())
    }

    fn attach_title(&self, resource: NamedNodeRef<'_>, title: &str) -> GraphResult<()> {
        if !self.is_resource(resource)? {
            return Err(GraphError::UnknownNode {
                iri: resource.as_str().to_string(),
                expected: "bibliographic resource",
            });
        }
        let title = Literal::new_simple_literal(title);
        self.insert_quad(QuadRef::new(
            resource,
            vocab::TITLE,
            title.as_ref(),
            self.resource_graph.as_ref(),
        ))?;
        Ok(())
    }

    fn insert(&self, graph: NamedNodeRef<'_>, triple: TripleRef<'_>) -> GraphResult<bool> {
        self.insert_quad(triple.in_graph(graph))
    }

    fn resources(&self) -> GraphResult<Vec<NamedNode>> {
        let mut seen = HashSet::new();
        let mut resources = Vec::new();
        for quad in self.store.quads_for_pattern(
            None,
            Some(rdf::TYPE),
            Some(vocab::EXPRESSION.into()),
            None,
        ) {
            let quad = quad.map_err(|e| storage("resource scan failed", e))?;
            if let NamedOrBlankNode::NamedNode(node) = quad.subject {
                if seen.insert(node.clone()) {
                    resources.push(node);
                }
            }
        }
        resources.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(resources)
    }

    fn graph_names(&self) -> GraphResult<Vec<NamedNode>> {
        let mut names = Vec::new();
        for name in self.store.named_graphs() {
            let name = name.map_err(|e| storage("graph listing failed", e))?;
            if let NamedOrBlankNode::NamedNode(node) = name {
                names.push(node);
            }
        }
        names.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(names)
    }

    fn triples_matching(
        &self,
        graph: NamedNodeRef<'_>,
        subject: Option<NamedNodeRef<'_>>,
        object: Option<TermRef<'_>>,
    ) -> GraphResult<Vec<Triple>> {
        let mut triples = Vec::new();
        for quad in self.store.quads_for_pattern(
            subject.map(Into::into),
            None,
            object,
            Some(GraphNameRef::NamedNode(graph)),
        ) {
            let Quad {
                subject,
                predicate,
                object,
                ..
            } = quad.map_err(|e| storage("pattern query failed", e))?;
            triples.push(Triple::new(subject, predicate, object));
        }
        Ok(triples)
    }

    fn responsible_agent(&self, node: NamedNodeRef<'_>) -> Option<String> {
        self.agents
            .get(&node.into_owned())
            .map(|agent| agent.value().clone())
    }

    fn len(&self) -> GraphResult<usize> {
        self.store.len().map_err(|e| storage("count failed", e))
    }
}

impl std::fmt::Debug for OxiEntityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OxiEntityStore")
            .field("base_iri", &self.base_iri)
            .finish()
    }
}

fn storage(context: &str, e: impl std::fmt::Display) -> GraphError {
    GraphError::Storage {
        message: format!("{context}: {e}"),
    }
}
