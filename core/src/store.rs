//! Item store owned by the orchestrator.
//!
//! Display order is newest run first; within one run items keep their
//! planned order. Every mutation publishes an `ItemUpdated` event carrying a
//! snapshot of the item, so observers never need to share mutable state.

use crate::event::{EventBus, ProductionEvent};
use crate::item::{AudioClip, ItemStatus, ProductionItem};
use crate::ProductionError;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Clone)]
pub struct ItemStore {
    items: Arc<RwLock<Vec<ProductionItem>>>,
    bus: EventBus,
}

impl ItemStore {
    pub fn new(bus: EventBus) -> Self {
        Self {
            items: Arc::new(RwLock::new(Vec::new())),
            bus,
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Insert a freshly planned run ahead of all older items.
    pub async fn prepend_run(&self, run: Vec<ProductionItem>) {
        let mut items = self.items.write().await;
        items.splice(0..0, run);
    }

    pub async fn snapshot(&self) -> Vec<ProductionItem> {
        self.items.read().await.clone()
    }

    pub async fn get(&self, id: Uuid) -> Option<ProductionItem> {
        self.items.read().await.iter().find(|i| i.id == id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.items.write().await.clear();
        self.bus.publish(ProductionEvent::ItemsCleared);
    }

    /// Start an attempt: `processing`, one more retry, wait flag down.
    pub async fn mark_processing(&self, id: Uuid) -> Result<ProductionItem, ProductionError> {
        self.update(id, |item| {
            item.status = ItemStatus::Processing;
            item.retry_count += 1;
            item.waiting_limit = false;
            item.notice = None;
            item.error = None;
        })
        .await
    }

    /// Raise the wait flag while the item sits out a rate-limit cooldown.
    pub async fn mark_waiting(
        &self,
        id: Uuid,
        notice: impl Into<String>,
    ) -> Result<ProductionItem, ProductionError> {
        let notice = notice.into();
        self.update(id, move |item| {
            item.waiting_limit = true;
            item.notice = Some(notice);
        })
        .await
    }

    pub async fn mark_completed(
        &self,
        id: Uuid,
        clip: AudioClip,
    ) -> Result<ProductionItem, ProductionError> {
        self.update(id, move |item| {
            item.status = ItemStatus::Completed;
            item.audio = Some(clip);
            item.error = None;
            item.notice = None;
            item.waiting_limit = false;
        })
        .await
    }

    pub async fn mark_error(
        &self,
        id: Uuid,
        message: impl Into<String>,
    ) -> Result<ProductionItem, ProductionError> {
        let message = message.into();
        self.update(id, move |item| {
            item.status = ItemStatus::Error;
            item.error = Some(message);
            item.audio = None;
            item.notice = None;
            item.waiting_limit = false;
        })
        .await
    }

    /// Put an interrupted item back to `pending`.
    pub async fn mark_pending(&self, id: Uuid) -> Result<ProductionItem, ProductionError> {
        self.update(id, |item| {
            item.status = ItemStatus::Pending;
            item.waiting_limit = false;
            item.notice = None;
            item.error = None;
        })
        .await
    }

    pub async fn set_cloud_url(
        &self,
        id: Uuid,
        url: impl Into<String>,
    ) -> Result<ProductionItem, ProductionError> {
        let url = url.into();
        let mut items = self.items.write().await;
        let item = items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or(ProductionError::ItemNotFound(id))?;
        if !item.is_completed() {
            return Err(ProductionError::NotCompleted(id));
        }
        item.cloud_url = Some(url);
        let snapshot = item.clone();
        drop(items);
        self.bus.publish(ProductionEvent::ItemUpdated {
            item: snapshot.clone(),
        });
        Ok(snapshot)
    }

    async fn update<F>(&self, id: Uuid, f: F) -> Result<ProductionItem, ProductionError>
    where
        F: FnOnce(&mut ProductionItem),
    {
        let snapshot = {
            let mut items = self.items.write().await;
            let item = items
                .iter_mut()
                .find(|i| i.id == id)
                .ok_or(ProductionError::ItemNotFound(id))?;
            f(item);
            item.clone()
        };
        self.bus.publish(ProductionEvent::ItemUpdated {
            item: snapshot.clone(),
        });
        Ok(snapshot)
    }
}
