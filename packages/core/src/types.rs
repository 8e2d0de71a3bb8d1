//! Core data types for OntoWeft.
//!
//! This module defines the values that flow between the graph store, the
//! closure engine, and the query resolver: [`NodeId`], [`OwlRelationship`],
//! [`Direction`], [`RelationshipSpec`], [`Entity`], and [`CategoryClosure`].
//! All of them serialise to and from JSON so the HTTP layer can expose them
//! without wrapper types.

use serde::{Deserialize, Serialize};

/// Opaque, stable integer handle for a node in the graph store.
///
/// Serialises as a bare JSON number.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl NodeId {
    /// The raw integer value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        NodeId(id)
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The taxonomic relationship types followed when computing a category
/// closure.
///
/// Serialises as its SCREAMING_SNAKE_CASE store name (e.g. `"SUBCLASS_OF"`),
/// which is also the relationship type name edges carry in the graph store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OwlRelationship {
    /// `rdfs:subClassOf`: the source class is a subclass of the target.
    SubclassOf,
    /// `rdf:type`: the source individual is an instance of the target class.
    Type,
    /// `owl:equivalentClass`: symmetric class equivalence.
    EquivalentClass,
    /// `owl:sameAs`: symmetric individual identity.
    SameAs,
}

impl OwlRelationship {
    /// Every relationship type, in declaration order.
    pub const ALL: [OwlRelationship; 4] = [
        OwlRelationship::SubclassOf,
        OwlRelationship::Type,
        OwlRelationship::EquivalentClass,
        OwlRelationship::SameAs,
    ];

    /// The relationship type name used for edges in the graph store.
    pub fn name(self) -> &'static str {
        match self {
            OwlRelationship::SubclassOf => "SUBCLASS_OF",
            OwlRelationship::Type => "TYPE",
            OwlRelationship::EquivalentClass => "EQUIVALENT_CLASS",
            OwlRelationship::SameAs => "SAME_AS",
        }
    }

    /// The W3C vocabulary IRI this relationship type was loaded from.
    pub fn iri(self) -> &'static str {
        match self {
            OwlRelationship::SubclassOf => vocab::RDFS_SUBCLASS_OF,
            OwlRelationship::Type => vocab::RDF_TYPE,
            OwlRelationship::EquivalentClass => vocab::OWL_EQUIVALENT_CLASS,
            OwlRelationship::SameAs => vocab::OWL_SAME_AS,
        }
    }
}

impl std::fmt::Display for OwlRelationship {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Parses an [`OwlRelationship`] from its store name or its vocabulary IRI.
impl std::str::FromStr for OwlRelationship {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OwlRelationship::ALL
            .into_iter()
            .find(|r| r.name() == s || r.iri() == s)
            .ok_or_else(|| {
                format!(
                    "unknown relationship {:?}; expected one of: \
                     SUBCLASS_OF, TYPE, EQUIVALENT_CLASS, SAME_AS",
                    s
                )
            })
    }
}

/// W3C vocabulary IRIs for the closure relationship types.
pub mod vocab {
    pub const RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
    pub const RDFS: &str = "http://www.w3.org/2000/01/rdf-schema#";
    pub const OWL: &str = "http://www.w3.org/2002/07/owl#";
    pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
    pub const RDFS_SUBCLASS_OF: &str = "http://www.w3.org/2000/01/rdf-schema#subClassOf";
    pub const OWL_EQUIVALENT_CLASS: &str = "http://www.w3.org/2002/07/owl#equivalentClass";
    pub const OWL_SAME_AS: &str = "http://www.w3.org/2002/07/owl#sameAs";
}

/// Which edges to follow from the current node.
///
/// Direction is relative to the node being expanded: `Incoming` follows
/// edges that point *into* it, so expanding a class along incoming
/// `SUBCLASS_OF` yields its direct subclasses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
    Both,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Incoming => write!(f, "incoming"),
            Direction::Outgoing => write!(f, "outgoing"),
            Direction::Both => write!(f, "both"),
        }
    }
}

/// A `(relationship type, direction)` pair the traversal expands along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationshipSpec {
    pub relationship: OwlRelationship,
    pub direction: Direction,
}

impl RelationshipSpec {
    pub const fn new(relationship: OwlRelationship, direction: Direction) -> Self {
        Self {
            relationship,
            direction,
        }
    }
}

/// The fixed relationship set followed by category closure: subclasses and
/// instances are collected from incoming edges, equivalences and identities
/// are followed both ways.
pub const CATEGORY_CLOSURE_SPECS: [RelationshipSpec; 4] = [
    RelationshipSpec::new(OwlRelationship::SubclassOf, Direction::Incoming),
    RelationshipSpec::new(OwlRelationship::Type, Direction::Incoming),
    RelationshipSpec::new(OwlRelationship::EquivalentClass, Direction::Both),
    RelationshipSpec::new(OwlRelationship::SameAs, Direction::Both),
];

/// A node projected out of the graph store by entity lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: NodeId,
    pub iri: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
}

/// The members of one category, as discovered by a single closure traversal.
///
/// `nodes` is in traversal discovery order and never contains a duplicate.
/// Callers should rely on set membership only; the order follows the store's
/// edge iteration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryClosure {
    pub category: String,
    pub root: NodeId,
    pub nodes: Vec<NodeId>,
}

impl CategoryClosure {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }
}
