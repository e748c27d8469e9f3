//! In-memory variable store
//!
//! A directory tree of typed variables guarded by one `RwLock`. Every mutation
//! is validated by the type engine and published to live subscriptions while
//! the write lock is still held, so feed order equals commit order.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use runstate_core::{
    layout, ChangeRecord, RunStateError, RunStateResult, TypeId,
};
use runstate_types::{LegalityContext, TransitionMap, TypeRegistry};
use tracing::{trace, warn};

use crate::feed::SubscriberQueue;
use crate::{MemorySubscription, VariableStore};

#[derive(Debug, Clone)]
struct Variable {
    type_id: TypeId,
    value: String,
}

#[derive(Debug, Default)]
struct Directory {
    dirs: BTreeMap<String, Directory>,
    vars: BTreeMap<String, Variable>,
}

impl Directory {
    fn walk(&self, path: &str) -> Option<&Directory> {
        layout::split(path).try_fold(self, |dir, part| dir.dirs.get(part))
    }

    fn walk_mut(&mut self, path: &str) -> Option<&mut Directory> {
        layout::split(path).try_fold(self, |dir, part| dir.dirs.get_mut(part))
    }
}

#[derive(Debug)]
struct StoreInner {
    root: Directory,
    types: TypeRegistry,
}

/// In-process variable store with a change feed
#[derive(Debug)]
pub struct MemoryStore {
    inner: RwLock<StoreInner>,
    subscribers: Mutex<Vec<Weak<SubscriberQueue>>>,
}

fn absolute(path: &str) -> RunStateResult<String> {
    layout::normalize(path)
        .ok_or_else(|| RunStateError::InvalidArgument(format!("path {} is not absolute", path)))
}

fn split_var(path: &str) -> RunStateResult<(String, String)> {
    let path = absolute(path)?;
    let (dir, leaf) = layout::parent_and_leaf(&path)
        .ok_or_else(|| RunStateError::InvalidArgument(format!("{} names no variable", path)))?;
    Ok((dir.to_string(), leaf.to_string()))
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            inner: RwLock::new(StoreInner {
                root: Directory::default(),
                types: TypeRegistry::new(),
            }),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Shared handle, the form connectors hand out
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Open a new subscription connection
    pub fn subscription(&self) -> MemorySubscription {
        let queue = Arc::new(SubscriberQueue::default());
        self.subscribers.lock().push(Arc::downgrade(&queue));
        MemorySubscription::new(queue)
    }

    /// Push a raw frame to every live subscription, bypassing prefixes and filters.
    ///
    /// Used to exercise consumers against malformed feed traffic.
    pub fn inject_frame(&self, frame: Bytes) {
        let mut subs = self.subscribers.lock();
        subs.retain(|weak| weak.strong_count() > 0);
        for queue in subs.iter().filter_map(Weak::upgrade) {
            queue.push_raw(frame.clone());
        }
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        let mut subs = self.subscribers.lock();
        subs.retain(|weak| weak.strong_count() > 0);
        subs.len()
    }

    fn variable<'a>(root: &'a Directory, dir: &str, leaf: &str) -> RunStateResult<&'a Variable> {
        root.walk(dir)
            .and_then(|d| d.vars.get(leaf))
            .ok_or_else(|| RunStateError::NotFound(format!("variable {}", layout::join(dir, leaf))))
    }

    fn publish(&self, record: ChangeRecord) {
        let frame = match record.encode() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, path = %record.path, "change record not published");
                return;
            }
        };
        trace!(record = %record, "publishing change");

        let mut subs = self.subscribers.lock();
        subs.retain(|weak| weak.strong_count() > 0);
        for queue in subs.iter().filter_map(Weak::upgrade) {
            queue.offer(&record.path, &frame);
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VariableStore for MemoryStore {
    fn get(&self, path: &str) -> RunStateResult<String> {
        let (dir, leaf) = split_var(path)?;
        let inner = self.inner.read();
        Ok(Self::variable(&inner.root, &dir, &leaf)?.value.clone())
    }

    fn set(&self, path: &str, value: &str) -> RunStateResult<()> {
        let (dir, leaf) = split_var(path)?;
        let mut inner = self.inner.write();
        let StoreInner { root, types, .. } = &mut *inner;

        let var = root
            .walk_mut(&dir)
            .and_then(|d| d.vars.get_mut(&leaf))
            .ok_or_else(|| RunStateError::NotFound(format!("variable {}", layout::join(&dir, &leaf))))?;
        types.check(var.type_id, value, LegalityContext::Existing(&var.value))?;
        var.value = value.to_string();

        self.publish(ChangeRecord::assign(layout::join(&dir, &leaf), value));
        Ok(())
    }

    fn mkdir(&self, path: &str) -> RunStateResult<()> {
        let path = absolute(path)?;
        let (parent, leaf) = layout::parent_and_leaf(&path)
            .ok_or_else(|| RunStateError::AlreadyExists("/".into()))?;
        if !layout::is_valid_component(leaf) {
            return Err(RunStateError::InvalidArgument(format!("bad directory name {}", leaf)));
        }

        let mut inner = self.inner.write();
        let dir = inner
            .root
            .walk_mut(parent)
            .ok_or_else(|| RunStateError::NotFound(format!("directory {}", parent)))?;
        if dir.dirs.contains_key(leaf) || dir.vars.contains_key(leaf) {
            return Err(RunStateError::AlreadyExists(path.clone()));
        }
        dir.dirs.insert(leaf.to_string(), Directory::default());

        self.publish(ChangeRecord::mkdir(parent, leaf));
        Ok(())
    }

    fn rmdir(&self, path: &str) -> RunStateResult<()> {
        let path = absolute(path)?;
        let (parent, leaf) = layout::parent_and_leaf(&path)
            .ok_or_else(|| RunStateError::InvalidArgument("cannot remove /".into()))?;

        let mut inner = self.inner.write();
        let removed = inner
            .root
            .walk_mut(parent)
            .and_then(|d| d.dirs.remove(leaf));
        if removed.is_none() {
            return Err(RunStateError::NotFound(format!("directory {}", path)));
        }

        self.publish(ChangeRecord::rmdir(parent, leaf));
        Ok(())
    }

    fn declare(&self, path: &str, type_name: &str, initial: Option<&str>) -> RunStateResult<()> {
        let (dir, leaf) = split_var(path)?;
        if !layout::is_valid_component(&leaf) {
            return Err(RunStateError::InvalidArgument(format!("bad variable name {}", leaf)));
        }

        let mut inner = self.inner.write();
        let StoreInner { root, types } = &mut *inner;

        let ty = types.lookup(type_name)?;
        let value = match initial {
            Some(v) => v.to_string(),
            None => ty.default_value(),
        };
        types.check(ty.id, &value, LegalityContext::Creating)?;
        let type_id = ty.id;

        let d = root
            .walk_mut(&dir)
            .ok_or_else(|| RunStateError::NotFound(format!("directory {}", dir)))?;
        if d.vars.contains_key(&leaf) || d.dirs.contains_key(&leaf) {
            return Err(RunStateError::AlreadyExists(layout::join(&dir, &leaf)));
        }

        d.vars.insert(leaf, Variable { type_id, value });
        Ok(())
    }

    fn ls(&self, path: &str) -> RunStateResult<Vec<String>> {
        let path = absolute(path)?;
        let inner = self.inner.read();
        let dir = inner
            .root
            .walk(&path)
            .ok_or_else(|| RunStateError::NotFound(format!("directory {}", path)))?;
        Ok(dir.dirs.keys().cloned().collect())
    }

    fn ls_vars(&self, path: &str) -> RunStateResult<Vec<String>> {
        let path = absolute(path)?;
        let inner = self.inner.read();
        let dir = inner
            .root
            .walk(&path)
            .ok_or_else(|| RunStateError::NotFound(format!("directory {}", path)))?;
        Ok(dir.vars.keys().cloned().collect())
    }

    fn valid_next_states(&self, path: &str) -> RunStateResult<Vec<String>> {
        let (dir, leaf) = split_var(path)?;
        let inner = self.inner.read();
        let var = Self::variable(&inner.root, &dir, &leaf)?;
        inner.types.valid_next_states(var.type_id, &var.value)
    }

    fn create_state_machine(&self, name: &str, map: &TransitionMap) -> RunStateResult<TypeId> {
        self.inner.write().types.create_state_machine(name, map)
    }

    fn create_enum(&self, name: &str, values: &[&str]) -> RunStateResult<TypeId> {
        self.inner.write().types.create_enum(name, values)
    }

    fn transition_map(&self, type_name: &str) -> RunStateResult<TransitionMap> {
        let inner = self.inner.read();
        let id = inner.types.id_of(type_name)?;
        inner.types.transition_map(id)
    }
}
