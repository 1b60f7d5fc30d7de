//! Shared holder for the current resource model
//!
//! Backed by a `watch` channel: publishing swaps the whole `Arc` in one
//! step, so readers see either the old model or the new one.

use crate::model::ResourceModel;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct ModelStore {
    tx: Arc<watch::Sender<Arc<ResourceModel>>>,
}

impl ModelStore {
    /// Starts out with an empty model.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Arc::new(ResourceModel::default()));
        Self { tx: Arc::new(tx) }
    }

    /// Replace the model and wake subscribers.
    pub fn publish(&self, model: ResourceModel) {
        self.tx.send_replace(Arc::new(model));
    }

    pub fn current(&self) -> Arc<ResourceModel> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<ResourceModel>> {
        self.tx.subscribe()
    }
}

impl Default for ModelStore {
    fn default() -> Self {
        Self::new()
    }
}
