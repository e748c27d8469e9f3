//! Type registry - owns every data type a store knows about

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use runstate_core::{
    RunStateError, RunStateResult, TypeId, BOOL_TYPE, INTEGER_TYPE, REAL_TYPE, STRING_TYPE,
};
use tracing::debug;

use crate::{DataType, LegalityContext, TransitionMap, TypeKind};

/// Registry of data types, indexed by id and by name
#[derive(Debug)]
pub struct TypeRegistry {
    types: HashMap<TypeId, DataType>,
    by_name: HashMap<String, TypeId>,
    next_id: u32,
}

impl TypeRegistry {
    /// Create a registry holding the builtin types
    pub fn new() -> Self {
        let mut registry = TypeRegistry {
            types: HashMap::new(),
            by_name: HashMap::new(),
            next_id: 1,
        };
        registry.insert(INTEGER_TYPE, TypeKind::Integer);
        registry.insert(REAL_TYPE, TypeKind::Real);
        registry.insert(STRING_TYPE, TypeKind::String);
        registry.insert(
            BOOL_TYPE,
            TypeKind::Enum {
                domain: vec!["false".to_string(), "true".to_string()],
            },
        );
        registry
    }

    fn insert(&mut self, name: &str, kind: TypeKind) -> TypeId {
        let id = TypeId::new(self.next_id);
        self.next_id += 1;
        self.by_name.insert(name.to_string(), id);
        self.types.insert(id, DataType::new(id, name, kind));
        id
    }

    fn ensure_new_name(&self, name: &str) -> RunStateResult<()> {
        if name.is_empty() {
            return Err(RunStateError::InvalidArgument("type name is empty".into()));
        }
        if self.by_name.contains_key(name) {
            return Err(RunStateError::AlreadyExists(format!("type {}", name)));
        }
        Ok(())
    }

    /// Register a plain enumeration
    pub fn create_enum<S: AsRef<str>>(&mut self, name: &str, values: &[S]) -> RunStateResult<TypeId> {
        self.ensure_new_name(name)?;
        if values.is_empty() {
            return Err(RunStateError::InvalidArgument(format!(
                "enum {} needs at least one value",
                name
            )));
        }

        let mut seen = HashSet::new();
        let mut domain = Vec::with_capacity(values.len());
        for value in values {
            let value = value.as_ref();
            if !seen.insert(value) {
                return Err(RunStateError::AlreadyExists(format!(
                    "value {} repeated in enum {}",
                    value, name
                )));
            }
            domain.push(value.to_string());
        }

        let id = self.insert(name, TypeKind::Enum { domain });
        debug!(type_name = name, type_id = %id, "enum type created");
        Ok(id)
    }

    /// Register a state machine built from a transition map.
    ///
    /// The domain is the from-states in insertion order. Every edge target must be
    /// in that domain; otherwise nothing is registered.
    pub fn create_state_machine(&mut self, name: &str, map: &TransitionMap) -> RunStateResult<TypeId> {
        self.ensure_new_name(name)?;
        if map.is_empty() {
            return Err(RunStateError::InvalidArgument(format!(
                "state machine {} needs at least one state",
                name
            )));
        }

        let domain: Vec<String> = map.states().map(str::to_string).collect();
        let known: HashSet<&str> = map.states().collect();

        let mut edges = BTreeMap::new();
        for (from, targets) in map.iter() {
            if let Some(missing) = targets.iter().find(|t| !known.contains(t.as_str())) {
                return Err(RunStateError::IllegalTransition(format!(
                    "{}: edge {} -> {} targets a state outside the domain",
                    name, from, missing
                )));
            }
            edges.insert(from.to_string(), targets.clone());
        }

        let id = self.insert(name, TypeKind::StateMachine { domain, edges });
        debug!(
            type_name = name,
            type_id = %id,
            states = map.len(),
            edges = map.edge_count(),
            "state machine type created"
        );
        Ok(id)
    }

    /// Look up a type by id
    pub fn get(&self, id: TypeId) -> RunStateResult<&DataType> {
        self.types
            .get(&id)
            .ok_or_else(|| RunStateError::NotFound(format!("type id {}", id)))
    }

    /// Look up a type by name
    pub fn lookup(&self, name: &str) -> RunStateResult<&DataType> {
        let id = self.id_of(name)?;
        self.get(id)
    }

    pub fn id_of(&self, name: &str) -> RunStateResult<TypeId> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| RunStateError::NotFound(format!("type {}", name)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// True iff the type is an enumeration with at least one edge
    pub fn is_state_machine(&self, id: TypeId) -> RunStateResult<bool> {
        Ok(self.get(id)?.kind.is_state_machine())
    }

    pub fn legal(&self, id: TypeId, value: &str, context: LegalityContext<'_>) -> RunStateResult<bool> {
        Ok(self.get(id)?.legal(value, context))
    }

    /// Like [`TypeRegistry::legal`] but rejects with `IllegalTransition`
    pub fn check(&self, id: TypeId, value: &str, context: LegalityContext<'_>) -> RunStateResult<()> {
        let ty = self.get(id)?;
        if ty.legal(value, context) {
            return Ok(());
        }
        let msg = match context {
            LegalityContext::Creating => {
                format!("{} is not a legal initial value for type {}", value, ty.name)
            }
            LegalityContext::Existing(current) => {
                format!("{} -> {} is not allowed by type {}", current, value, ty.name)
            }
        };
        Err(RunStateError::IllegalTransition(msg))
    }

    /// States reachable from `from` in one hop, sorted ascending
    pub fn valid_next_states(&self, id: TypeId, from: &str) -> RunStateResult<Vec<String>> {
        let ty = self.get(id)?;
        let targets = match &ty.kind {
            TypeKind::StateMachine { edges, .. } => edges.get(from),
            _ => None,
        };
        match targets {
            Some(targets) if !targets.is_empty() => Ok(targets.iter().cloned().collect()),
            _ => Err(RunStateError::IllegalTransition(format!(
                "{} has no transitions out of {}",
                ty.name, from
            ))),
        }
    }

    /// Reconstruct the transition map a state machine was created from
    pub fn transition_map(&self, id: TypeId) -> RunStateResult<TransitionMap> {
        let ty = self.get(id)?;
        match &ty.kind {
            TypeKind::StateMachine { domain, edges } => {
                let mut map = TransitionMap::new();
                for state in domain {
                    let targets = edges.get(state).cloned().unwrap_or_else(BTreeSet::new);
                    map.add(state, targets);
                }
                Ok(map)
            }
            other => Err(RunStateError::NotFound(format!(
                "type {} is {}, not a state machine",
                ty.name,
                other.label()
            ))),
        }
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
