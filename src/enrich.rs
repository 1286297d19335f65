//! Enrichment seam: collaborators that mutate the entity graph in place.
//!
//! Enrichment runs between building and classification. Every enricher works
//! against an [`EnrichBudget`] so that a graph too large for the host fails
//! with [`EnrichError::GraphTooLarge`] rather than exhausting memory.

use oxigraph::model::vocab::rdf;
use oxigraph::model::{Literal, NamedNode, TripleRef};
use serde::Serialize;

use crate::error::EnrichError;
use crate::graph::{EntityStore, vocab};

pub type EnrichResult<T> = std::result::Result<T, EnrichError>;

/// Triple allowance for one enrichment pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrichBudget {
    ceiling: Option<usize>,
    used: usize,
}

impl EnrichBudget {
    /// Budget for a graph currently holding `current` triples.
    ///
    /// A ceiling of `Some(0)` is the same as `None`: no limit.
    pub fn new(ceiling: Option<usize>, current: usize) -> Self {
        Self {
            ceiling: ceiling.filter(|&c| c > 0),
            used: current,
        }
    }

    pub fn unlimited(current: usize) -> Self {
        Self::new(None, current)
    }

    /// Fail if the graph is already over the ceiling.
    pub fn ensure_within(&self) -> EnrichResult<()> {
        match self.ceiling {
            Some(ceiling) if self.used > ceiling => Err(EnrichError::GraphTooLarge {
                triples: self.used,
                ceiling,
            }),
            _ => Ok(()),
        }
    }

    /// Claim room for `n` more triples.
    pub fn reserve(&mut self, n: usize) -> EnrichResult<()> {
        let wanted = self.used.saturating_add(n);
        if let Some(ceiling) = self.ceiling {
            if wanted > ceiling {
                return Err(EnrichError::GraphTooLarge {
                    triples: wanted,
                    ceiling,
                });
            }
        }
        self.used = wanted;
        Ok(())
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn ceiling(&self) -> Option<usize> {
        self.ceiling
    }
}

/// What an enrichment pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnrichReport {
    pub enricher: String,
    pub resources: usize,
    pub triples_added: usize,
}

/// A collaborator that mutates the entity graph in place.
pub trait Enricher {
    fn name(&self) -> &str;

    fn enrich(&self, store: &dyn EntityStore, budget: &mut EnrichBudget) -> EnrichResult<EnrichReport>;
}

/// Leaves the graph untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEnricher;

impl Enricher for NoopEnricher {
    fn name(&self) -> &str {
        "none"
    }

    fn enrich(&self, store: &dyn EntityStore, _budget: &mut EnrichBudget) -> EnrichResult<EnrichReport> {
        Ok(EnrichReport {
            enricher: self.name().to_string(),
            resources: store.resources()?.len(),
            triples_added: 0,
        })
    }
}

/// Adds one provenance snapshot per bibliographic resource.
///
/// The snapshot `<resource>/prov/se/1` lives in the `prov/` graph, is a
/// `prov:Entity` specializing the resource, and is attributed to the agent that
/// created the resource. Agents that are not IRIs are only named in the
/// description.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProvenanceEnricher;

impl ProvenanceEnricher {
    pub fn snapshot_iri(resource: &NamedNode) -> String {
        format!("{}/prov/se/1", resource.as_str())
    }
}

impl Enricher for ProvenanceEnricher {
    fn name(&self) -> &str {
        "provenance"
    }

    fn enrich(&self, store: &dyn EntityStore, budget: &mut EnrichBudget) -> EnrichResult<EnrichReport> {
        let graph = store.iri(vocab::PROVENANCE_GRAPH)?;
        let resources = store.resources()?;
        let mut added = 0;

        for resource in &resources {
            let snapshot = crate::graph::parse_iri(Self::snapshot_iri(resource))?;
            let agent = store.responsible_agent(resource.as_ref());
            let description = agent
                .as_ref()
                .map(|a| Literal::new_simple_literal(format!("Entity created by {a}")));
            let attributed = agent.as_deref().and_then(|a| NamedNode::new(a).ok());

            let mut triples = vec![
                TripleRef::new(snapshot.as_ref(), rdf::TYPE, vocab::PROV_ENTITY),
                TripleRef::new(snapshot.as_ref(), vocab::SPECIALIZATION_OF, resource.as_ref()),
            ];
            if let Some(description) = &description {
                triples.push(TripleRef::new(
                    snapshot.as_ref(),
                    vocab::DESCRIPTION,
                    description.as_ref(),
                ));
            }
            if let Some(agent) = &attributed {
                triples.push(TripleRef::new(
                    snapshot.as_ref(),
                    vocab::WAS_ATTRIBUTED_TO,
                    agent.as_ref(),
                ));
            }

            budget.reserve(triples.len())?;
            for triple in triples {
                if store.insert(graph.as_ref(), triple)? {
                    added += 1;
                }
            }
        }

        tracing::info!(resources = resources.len(), added, "provenance snapshots written");
        Ok(EnrichReport {
            enricher: self.name().to_string(),
            resources: resources.len(),
            triples_added: added,
        })
    }
}

/// Look up an enricher by its configured name.
pub fn enricher_by_name(name: &str) -> EnrichResult<Box<dyn Enricher>> {
    match name.trim().to_ascii_lowercase().as_str() {
        "provenance" => Ok(Box::new(ProvenanceEnricher)),
        "none" | "noop" => Ok(Box::new(NoopEnricher)),
        _ => Err(EnrichError::Unknown {
            name: name.to_string(),
        }),
    }
}

/// Run `enricher` over `store`, refusing to start past `ceiling`.
pub fn run_enrichment(
    enricher: &dyn Enricher,
    store: &dyn EntityStore,
    ceiling: Option<usize>,
) -> EnrichResult<EnrichReport> {
    let mut budget = EnrichBudget::new(ceiling, store.len()?);
    budget.ensure_within()?;
    tracing::info!(
        enricher = enricher.name(),
        triples = budget.used(),
        ceiling = ?budget.ceiling(),
        "starting enrichment"
    );
    enricher.enrich(store, &mut budget)
}
