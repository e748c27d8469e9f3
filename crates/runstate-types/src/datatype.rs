//! Data type definitions
//!
//! A single closed variant covers every type a variable can have. Legality of a
//! value is decided by one dispatch, [`TypeKind::legal`], against an explicit
//! [`LegalityContext`].

use std::collections::{BTreeMap, BTreeSet};

use runstate_core::TypeId;

/// Where a value is being written
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LegalityContext<'a> {
    /// The variable is being declared; the value will be its initial value
    Creating,
    /// The variable exists and currently holds this value
    Existing(&'a str),
}

/// Type classification
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeKind {
    Integer,
    Real,
    String,
    /// Ordered domain; `domain[0]` is the default
    Enum { domain: Vec<String> },
    /// Enumeration whose writes must follow an edge from the current value
    StateMachine {
        domain: Vec<String>,
        edges: BTreeMap<String, BTreeSet<String>>,
    },
}

impl TypeKind {
    /// Decide whether `value` may be written in `context`
    pub fn legal(&self, value: &str, context: LegalityContext<'_>) -> bool {
        match self {
            TypeKind::Integer => value.trim().parse::<i64>().is_ok(),
            TypeKind::Real => value.trim().parse::<f64>().is_ok(),
            TypeKind::String => true,
            TypeKind::Enum { domain } => domain.iter().any(|v| v == value),
            TypeKind::StateMachine { domain, edges } => {
                if !domain.iter().any(|v| v == value) {
                    return false;
                }
                // No recorded edges: behaves as a plain enumeration
                if edges.values().all(BTreeSet::is_empty) {
                    return true;
                }
                match context {
                    LegalityContext::Creating => domain.first().map(String::as_str) == Some(value),
                    LegalityContext::Existing(current) => edges
                        .get(current)
                        .is_some_and(|targets| targets.contains(value)),
                }
            }
        }
    }

    /// Value a freshly declared variable gets when none is supplied
    pub fn default_value(&self) -> String {
        match self {
            TypeKind::Integer => "0".to_string(),
            TypeKind::Real => "0.0".to_string(),
            TypeKind::String => String::new(),
            TypeKind::Enum { domain } | TypeKind::StateMachine { domain, .. } => {
                domain.first().cloned().unwrap_or_default()
            }
        }
    }

    /// Ordered value domain for enumerations and state machines
    pub fn domain(&self) -> Option<&[String]> {
        match self {
            TypeKind::Enum { domain } | TypeKind::StateMachine { domain, .. } => Some(domain),
            _ => None,
        }
    }

    /// True iff this is an enumeration carrying at least one edge
    pub fn is_state_machine(&self) -> bool {
        match self {
            TypeKind::StateMachine { edges, .. } => edges.values().any(|t| !t.is_empty()),
            _ => false,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TypeKind::Integer => "integer",
            TypeKind::Real => "real",
            TypeKind::String => "string",
            TypeKind::Enum { .. } => "enum",
            TypeKind::StateMachine { .. } => "state-machine",
        }
    }
}

/// A registered data type
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataType {
    pub id: TypeId,
    pub name: String,
    pub kind: TypeKind,
}

impl DataType {
    pub fn new(id: TypeId, name: impl Into<String>, kind: TypeKind) -> Self {
        DataType {
            id,
            name: name.into(),
            kind,
        }
    }

    #[inline]
    pub fn legal(&self, value: &str, context: LegalityContext<'_>) -> bool {
        self.kind.legal(value, context)
    }

    #[inline]
    pub fn default_value(&self) -> String {
        self.kind.default_value()
    }
}
