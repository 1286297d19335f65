//! Vocabulary used to express bibliographic resources and identifiers as triples.
//!
//! Terms follow the SPAR ontologies used by the OpenCitations data model.

use oxigraph::model::NamedNodeRef;

pub const FABIO: &str = "http://purl.org/spar/fabio/";
pub const DATACITE: &str = "http://purl.org/spar/datacite/";
pub const LITERAL: &str = "http://www.essepuntato.it/2010/06/literalreification/";
pub const DCTERMS: &str = "http://purl.org/dc/terms/";
pub const PROV: &str = "http://www.w3.org/ns/prov#";
pub const RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";

/// Class of every bibliographic resource node.
pub const EXPRESSION: NamedNodeRef<'static> =
    NamedNodeRef::new_unchecked("http://purl.org/spar/fabio/Expression");
/// Class of every identifier node.
pub const IDENTIFIER: NamedNodeRef<'static> =
    NamedNodeRef::new_unchecked("http://purl.org/spar/datacite/Identifier");

pub const HAS_IDENTIFIER: NamedNodeRef<'static> =
    NamedNodeRef::new_unchecked("http://purl.org/spar/datacite/hasIdentifier");
pub const USES_IDENTIFIER_SCHEME: NamedNodeRef<'static> =
    NamedNodeRef::new_unchecked("http://purl.org/spar/datacite/usesIdentifierScheme");
pub const HAS_LITERAL_VALUE: NamedNodeRef<'static> = NamedNodeRef::new_unchecked(
    "http://www.essepuntato.it/2010/06/literalreification/hasLiteralValue",
);
pub const TITLE: NamedNodeRef<'static> = NamedNodeRef::new_unchecked("http://purl.org/dc/terms/title");
pub const DESCRIPTION: NamedNodeRef<'static> =
    NamedNodeRef::new_unchecked("http://purl.org/dc/terms/description");

pub const PROV_ENTITY: NamedNodeRef<'static> =
    NamedNodeRef::new_unchecked("http://www.w3.org/ns/prov#Entity");
pub const SPECIALIZATION_OF: NamedNodeRef<'static> =
    NamedNodeRef::new_unchecked("http://www.w3.org/ns/prov#specializationOf");
pub const WAS_ATTRIBUTED_TO: NamedNodeRef<'static> =
    NamedNodeRef::new_unchecked("http://www.w3.org/ns/prov#wasAttributedTo");

/// Turtle prefixes for serialized output.
pub const PREFIXES: &[(&str, &str)] = &[
    ("fabio", FABIO),
    ("datacite", DATACITE),
    ("literal", LITERAL),
    ("dcterms", DCTERMS),
    ("prov", PROV),
    ("rdf", RDF),
];

/// Named-graph suffix for bibliographic resources.
pub const RESOURCE_GRAPH: &str = "br/";
/// Named-graph suffix and IRI infix for identifiers.
pub const IDENTIFIER_GRAPH: &str = "id/";
/// Named-graph suffix for provenance snapshots.
pub const PROVENANCE_GRAPH: &str = "prov/";
