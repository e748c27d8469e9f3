//! Transition maps - ordered `from -> {to...}` descriptions of a state machine
//!
//! Order matters: the first from-state added becomes the machine's default
//! (initial) state.

use std::collections::BTreeSet;

/// Ordered map from a state to the set of states reachable in one hop
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransitionMap {
    entries: Vec<(String, BTreeSet<String>)>,
}

impl TransitionMap {
    pub fn new() -> Self {
        TransitionMap::default()
    }

    /// Add edges `from -> to` for every target, declaring `from` if it is new
    pub fn transition<I, S>(mut self, from: &str, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add(from, targets);
        self
    }

    /// Declare a state with no outgoing edges (yet)
    pub fn state(mut self, name: &str) -> Self {
        self.entry(name);
        self
    }

    /// In-place form of [`TransitionMap::transition`]
    pub fn add<I, S>(&mut self, from: &str, targets: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let edges = self.entry(from);
        edges.extend(targets.into_iter().map(Into::into));
    }

    fn entry(&mut self, from: &str) -> &mut BTreeSet<String> {
        let idx = match self.entries.iter().position(|(s, _)| s == from) {
            Some(idx) => idx,
            None => {
                self.entries.push((from.to_string(), BTreeSet::new()));
                self.entries.len() - 1
            }
        };
        &mut self.entries[idx].1
    }

    /// Targets reachable from `from`
    pub fn targets(&self, from: &str) -> Option<&BTreeSet<String>> {
        self.entries.iter().find(|(s, _)| s == from).map(|(_, t)| t)
    }

    /// From-states in insertion order
    pub fn states(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(s, _)| s.as_str())
    }

    /// Iterate `(from, targets)` in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.entries.iter().map(|(s, t)| (s.as_str(), t))
    }

    /// Total number of edges
    pub fn edge_count(&self) -> usize {
        self.entries.iter().map(|(_, t)| t.len()).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Vec<S>)> for TransitionMap {
    fn from_iter<T: IntoIterator<Item = (S, Vec<S>)>>(iter: T) -> Self {
        let mut map = TransitionMap::new();
        for (from, targets) in iter {
            let from: String = from.into();
            map.add(&from, targets);
        }
        map
    }
}
