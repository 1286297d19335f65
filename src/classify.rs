//! Completeness classifier: splits the enriched graph by required identifier schemes.
//!
//! The full output is the merged graph, untouched. The incomplete output holds
//! every triple, from any sub-graph, in which an incomplete resource appears as
//! subject or object, so it is always a subset of the full output.

use std::collections::BTreeMap;

use oxigraph::model::{Graph, NamedNode};

use crate::graph::{EntityStore, GraphResult};

/// Per-scheme presence for one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletenessVerdict {
    pub resource: NamedNode,
    pub present: BTreeMap<String, bool>,
}

impl CompletenessVerdict {
    pub fn is_complete(&self) -> bool {
        self.present.values().all(|p| *p)
    }

    /// Required schemes with no matching identifier.
    pub fn missing(&self) -> Vec<&str> {
        self.present
            .iter()
            .filter(|(_, p)| !**p)
            .map(|(s, _)| s.as_str())
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct Classification {
    pub full: Graph,
    pub incomplete: Graph,
    pub verdicts: Vec<CompletenessVerdict>,
}

impl Classification {
    pub fn complete_count(&self) -> usize {
        self.verdicts.iter().filter(|v| v.is_complete()).count()
    }

    pub fn incomplete_count(&self) -> usize {
        self.verdicts.len() - self.complete_count()
    }
}

/// Whether `scheme` satisfies `required`: case-insensitive substring match.
pub fn scheme_matches(scheme: &str, required: &str) -> bool {
    scheme.to_lowercase().contains(&required.to_lowercase())
}

#[derive(Debug, Clone)]
pub struct CompletenessClassifier {
    required: Vec<String>,
}

impl CompletenessClassifier {
    pub fn new<I, S>(required: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut required: Vec<String> = required
            .into_iter()
            .map(|s| s.as_ref().trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        required.sort();
        required.dedup();
        Self { required }
    }

    pub fn required(&self) -> &[String] {
        &self.required
    }

    /// Evaluate every required scheme for one resource.
    pub fn verdict(
        &self,
        store: &dyn EntityStore,
        resource: &NamedNode,
    ) -> GraphResult<CompletenessVerdict> {
        let mut schemes = Vec::new();
        for identifier in store.identifiers_of(resource.as_ref())? {
            schemes.extend(store.schemes_of(identifier.as_ref())?);
        }
        let present = self
            .required
            .iter()
            .map(|req| (req.clone(), schemes.iter().any(|s| scheme_matches(s, req))))
            .collect();
        Ok(CompletenessVerdict {
            resource: resource.clone(),
            present,
        })
    }

    pub fn classify(&self, store: &dyn EntityStore) -> GraphResult<Classification> {
        let full = store.merged()?;
        let graphs = store.graph_names()?;
        let mut incomplete = Graph::new();
        let mut verdicts = Vec::new();

        for resource in store.resources()? {
            let verdict = self.verdict(store, &resource)?;
            if !verdict.is_complete() {
                tracing::debug!(resource = %resource, missing = ?verdict.missing(), "incomplete");
                for graph in &graphs {
                    let as_subject = store.triples_matching(graph.as_ref(), Some(resource.as_ref()), None)?;
                    let as_object =
                        store.triples_matching(graph.as_ref(), None, Some(resource.as_ref().into()))?;
                    for triple in as_subject.iter().chain(&as_object) {
                        incomplete.insert(triple);
                    }
                }
            }
            verdicts.push(verdict);
        }

        let classification = Classification {
            full,
            incomplete,
            verdicts,
        };
        tracing::info!(
            complete = classification.complete_count(),
            incomplete = classification.incomplete_count(),
            triples = classification.full.len(),
            incomplete_triples = classification.incomplete.len(),
            "classification done"
        );
        Ok(classification)
    }
}
