//! Entity builder: materializes selection records as resource and identifier nodes.
//!
//! A resource node is always created before its identifiers are looked at, so
//! a record whose secondary identifiers all fail still yields an entity. Bad
//! identifiers and rejected entities are collected into a [`DiagnosticsLog`]
//! and never abort the batch.

use oxigraph::model::NamedNode;
use serde::Serialize;

use crate::extract::SelectionRecord;
use crate::graph::{EntityStore, GraphResult, IdentifierNode};

/// Why a token or record did not make it into the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum MissingReason {
    /// Token has no `:` separator.
    ParseError,
    /// Nothing before the `:`.
    EmptyScheme,
    /// Nothing after the `:`.
    EmptyLiteral,
    /// The store refused the node; carries its message.
    Rejected(String),
}

impl std::fmt::Display for MissingReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ParseError => f.write_str("<parse error>"),
            Self::EmptyScheme => f.write_str("<empty scheme>"),
            Self::EmptyLiteral => f.write_str("<empty literal>"),
            Self::Rejected(message) => f.write_str(message),
        }
    }
}

/// One failed identifier token or primary id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingEntry {
    pub token: String,
    pub reason: MissingReason,
}

impl std::fmt::Display for MissingEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.token, self.reason)
    }
}

/// Failures and successes accumulated over a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiagnosticsLog {
    pub missing: Vec<MissingEntry>,
    pub created: usize,
}

impl DiagnosticsLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_missing(&mut self, token: impl Into<String>, reason: MissingReason) {
        let token = token.into();
        tracing::warn!(token = %token, reason = %reason, "recorded missing data");
        self.missing.push(MissingEntry { token, reason });
    }

    /// First `n` missing entries, for summaries.
    pub fn sample(&self, n: usize) -> &[MissingEntry] {
        &self.missing[..n.min(self.missing.len())]
    }
}

/// Split a secondary token once on its first colon.
pub fn split_scheme(token: &str) -> Result<(&str, &str), MissingReason> {
    let (scheme, literal) = token.split_once(':').ok_or(MissingReason::ParseError)?;
    if scheme.is_empty() {
        return Err(MissingReason::EmptyScheme);
    }
    if literal.is_empty() {
        return Err(MissingReason::EmptyLiteral);
    }
    Ok((scheme, literal))
}

/// Writes selection records into an [`EntityStore`].
pub struct EntityBuilder<'a> {
    store: &'a dyn EntityStore,
    resp_agent: &'a str,
    log: DiagnosticsLog,
}

impl<'a> EntityBuilder<'a> {
    pub fn new(store: &'a dyn EntityStore, resp_agent: &'a str) -> Self {
        Self::with_log(store, resp_agent, DiagnosticsLog::new())
    }

    /// Continue accumulating into an existing log.
    pub fn with_log(store: &'a dyn EntityStore, resp_agent: &'a str, log: DiagnosticsLog) -> Self {
        Self {
            store,
            resp_agent,
            log,
        }
    }

    /// Build one entity. Identifier failures are logged; only a failure to
    /// create the resource itself is returned.
    pub fn build_one(
        &mut self,
        primary_id: &str,
        others: &[String],
        title: Option<&str>,
    ) -> GraphResult<NamedNode> {
        let resource = self.store.resource_iri(primary_id)?;
        self.store.create_resource(self.resp_agent, resource.as_ref())?;

        for token in others {
            if let Err(reason) = self.attach_token(&resource, token) {
                self.log.record_missing(token.as_str(), reason);
            }
        }

        if let Some(title) = title.filter(|t| !t.is_empty()) {
            self.store.attach_title(resource.as_ref(), title)?;
        }

        Ok(resource)
    }

    fn attach_token(&self, resource: &NamedNode, token: &str) -> Result<(), MissingReason> {
        let (scheme, literal) = split_scheme(token)?;
        let rejected = |e: crate::error::GraphError| MissingReason::Rejected(e.to_string());

        let identifier = self.store.identifier_iri(literal).map_err(rejected)?;
        let node = self
            .store
            .create_identifier(self.resp_agent, identifier.as_ref(), scheme, literal)
            .map_err(rejected)?;
        if node == IdentifierNode::Reused {
            tracing::debug!(identifier = %identifier, "sharing existing identifier node");
        }
        self.store
            .attach_identifier(resource.as_ref(), identifier.as_ref())
            .map_err(rejected)
    }

    /// Build every record, isolating per-entity failures.
    pub fn build_all(&mut self, records: &[SelectionRecord]) {
        tracing::info!(records = records.len(), "building entities");
        for record in records {
            match self.build_one(
                &record.primary_id,
                &record.secondary_ids,
                record.title.as_deref(),
            ) {
                Ok(_) => self.log.created += 1,
                Err(e) => self
                    .log
                    .record_missing(record.primary_id.as_str(), MissingReason::Rejected(e.to_string())),
            }
        }
        tracing::info!(
            created = self.log.created,
            missing = self.log.missing.len(),
            "entities built"
        );
    }

    pub fn finish(self) -> DiagnosticsLog {
        self.log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::CompletenessClassifier;
    use crate::graph::OxiEntityStore;

    const BASE: &str = "https://w3id.org/oc/meta/";

    fn record(primary: &str, others: &[&str], title: Option<&str>) -> SelectionRecord {
        SelectionRecord {
            primary_id: primary.into(),
            secondary_ids: others.iter().map(|s| s.to_string()).collect(),
            title: title.map(str::to_string),
        }
    }

    #[test]
    fn split_scheme_uses_first_colon() {
        assert_eq!(split_scheme("doi:10.1/x:y"), Ok(("doi", "10.1/x:y")));
        assert_eq!(split_scheme("nocolon"), Err(MissingReason::ParseError));
        assert_eq!(split_scheme(":x"), Err(MissingReason::EmptyScheme));
        assert_eq!(split_scheme("doi:"), Err(MissingReason::EmptyLiteral));
    }

    #[test]
    fn two_record_scenario() {
        let store = OxiEntityStore::in_memory(BASE).unwrap();
        let mut builder = EntityBuilder::new(&store, "tester");
        builder.build_all(&[
            record("1", &["doi:10.1/x"], Some("A")),
            record("2", &[], Some("")),
        ]);
        let log = builder.finish();

        assert_eq!(log.created, 2);
        assert!(log.missing.is_empty());
        assert_eq!(store.resources().unwrap().len(), 2);

        let one = store.resource_iri("1").unwrap();
        let ids = store.identifiers_of(one.as_ref()).unwrap();
        assert_eq!(ids.len(), 1);
        let schemes = store.schemes_of(ids[0].as_ref()).unwrap();
        assert!(schemes[0].ends_with("doi"));
    }

    #[test]
    fn empty_title_is_not_attached() {
        let store = OxiEntityStore::in_memory(BASE).unwrap();
        let mut builder = EntityBuilder::new(&store, "tester");
        let res = builder.build_one("2", &[], Some("")).unwrap();
        let br = store.iri("br/").unwrap();
        let triples = store.triples_matching(br.as_ref(), Some(res.as_ref()), None).unwrap();
        assert_eq!(triples.len(), 1);
    }

    #[test]
    fn colonless_token_logs_once_and_keeps_entity() {
        let store = OxiEntityStore::in_memory(BASE).unwrap();
        let mut builder = EntityBuilder::new(&store, "tester");
        builder.build_all(&[record("1", &["garbage", "doi:10.1/ok"], None)]);
        let log = builder.finish();

        assert_eq!(log.created, 1);
        assert_eq!(
            log.missing,
            vec![MissingEntry {
                token: "garbage".into(),
                reason: MissingReason::ParseError,
            }]
        );
        assert_eq!(log.missing[0].to_string(), "garbage: <parse error>");
        let one = store.resource_iri("1").unwrap();
        assert_eq!(store.identifiers_of(one.as_ref()).unwrap().len(), 1);
    }

    #[test]
    fn duplicate_primary_is_entity_level_failure() {
        let store = OxiEntityStore::in_memory(BASE).unwrap();
        let mut builder = EntityBuilder::new(&store, "tester");
        builder.build_all(&[
            record("1", &[], None),
            record("1", &[], None),
            record("3", &[], None),
        ]);
        let log = builder.finish();

        assert_eq!(log.created, 2);
        assert_eq!(log.missing.len(), 1);
        assert_eq!(log.missing[0].token, "1");
        assert!(matches!(log.missing[0].reason, MissingReason::Rejected(_)));
    }

    #[test]
    fn shared_identifier_and_scheme_conflict() {
        let store = OxiEntityStore::in_memory(BASE).unwrap();
        let mut builder = EntityBuilder::new(&store, "tester");
        builder.build_all(&[
            record("1", &["issn:1234-5678"], None),
            record("2", &["issn:1234-5678"], None),
            record("3", &["isbn:1234-5678"], None),
        ]);
        let log = builder.finish();

        assert_eq!(log.created, 3);
        assert_eq!(log.missing.len(), 1);
        assert_eq!(log.missing[0].token, "isbn:1234-5678");

        let id = store.identifier_iri("1234-5678").unwrap();
        for primary in ["1", "2"] {
            let res = store.resource_iri(primary).unwrap();
            assert_eq!(store.identifiers_of(res.as_ref()).unwrap(), vec![id.clone()]);
        }
    }

    #[test]
    fn sici_doi_is_attached_and_keeps_raw_literal() {
        let sici = "10.1002/(SICI)1097-4571(199806)49:8<693::AID-ASI4>3.0.CO;2-0";
        let store = OxiEntityStore::in_memory(BASE).unwrap();
        let mut builder = EntityBuilder::new(&store, "tester");
        let token = format!("doi:{sici}");
        builder.build_all(&[record("1", &[token.as_str()], None)]);
        let log = builder.finish();
        assert_eq!(log.created, 1);
        assert!(log.missing.is_empty());

        let one = store.resource_iri("1").unwrap();
        let ids = store.identifiers_of(one.as_ref()).unwrap();
        assert_eq!(ids.len(), 1);
        let id_graph = store.iri("id/").unwrap();
        let values: Vec<String> = store
            .triples_matching(id_graph.as_ref(), Some(ids[0].as_ref()), None)
            .unwrap()
            .into_iter()
            .filter(|t| t.predicate.as_ref() == crate::graph::vocab::HAS_LITERAL_VALUE)
            .map(|t| crate::graph::term_text(&t.object))
            .collect();
        assert_eq!(values, vec![sici.to_string()]);

        let verdict = CompletenessClassifier::new(["doi"]).classify(&store).unwrap();
        assert_eq!(verdict.complete_count(), 1);
    }

    #[test]
    fn primary_id_with_unsafe_characters_is_created() {
        let store = OxiEntityStore::in_memory(BASE).unwrap();
        let mut builder = EntityBuilder::new(&store, "tester");
        builder.build_all(&[record("br/<odd>", &[], None)]);
        assert_eq!(builder.finish().created, 1);
    }

    #[test]
    fn created_count_equals_records_minus_entity_failures() {
        let store = OxiEntityStore::in_memory(BASE).unwrap();
        let mut builder = EntityBuilder::new(&store, "tester");
        let records = vec![
            record("a", &["x"], None),
            record("b", &["y", "z"], None),
            record("a", &[], None),
            record("b", &["doi:10.1/b"], None),
        ];
        builder.build_all(&records);
        let log = builder.finish();
        let entity_failures = log
            .missing
            .iter()
            .filter(|m| ["a", "b"].contains(&m.token.as_str()))
            .count();
        assert_eq!(entity_failures, 2);
        assert_eq!(log.missing.len(), 5);
        assert_eq!(log.created, records.len() - entity_failures);
    }

    #[test]
    fn sample_is_bounded() {
        let mut log = DiagnosticsLog::new();
        for i in 0..8 {
            log.record_missing(format!("t{i}"), MissingReason::ParseError);
        }
        assert_eq!(log.sample(5).len(), 5);
        assert_eq!(DiagnosticsLog::new().sample(5).len(), 0);
    }
}
