//! Connector for in-process stores
//!
//! A `MemoryConnector` serves exactly one `inproc://<name>` endpoint. There is
//! no process-wide table of stores: whoever owns the connector decides which
//! store its connections reach.

use std::sync::Arc;

use runstate_core::{Endpoint, RunStateError, RunStateResult};
use tracing::debug;

use crate::{ChangeFeed, MemoryStore, StoreConnector, VariableStore};

/// Hands out request and subscription connections to one [`MemoryStore`]
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    name: String,
    store: Arc<MemoryStore>,
}

impl MemoryConnector {
    pub fn new(name: impl Into<String>, store: Arc<MemoryStore>) -> Self {
        MemoryConnector {
            name: name.into(),
            store,
        }
    }

    /// Endpoint this connector answers to
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::Inproc {
            name: self.name.clone(),
        }
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    fn accept(&self, endpoint: &Endpoint) -> RunStateResult<()> {
        match endpoint {
            Endpoint::Inproc { name } if *name == self.name => Ok(()),
            other => Err(RunStateError::InvalidEndpoint(format!(
                "{} is not served here (expected {})",
                other,
                self.endpoint()
            ))),
        }
    }
}

impl StoreConnector for MemoryConnector {
    fn connect_requests(&self, endpoint: &Endpoint) -> RunStateResult<Arc<dyn VariableStore>> {
        self.accept(endpoint)?;
        debug!(%endpoint, "request connection opened");
        let store: Arc<dyn VariableStore> = self.store.clone();
        Ok(store)
    }

    fn connect_subscriptions(&self, endpoint: &Endpoint) -> RunStateResult<Box<dyn ChangeFeed>> {
        self.accept(endpoint)?;
        debug!(%endpoint, "subscription connection opened");
        let feed: Box<dyn ChangeFeed> = Box::new(self.store.subscription());
        Ok(feed)
    }
}
