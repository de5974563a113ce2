//
// (C) Copyright IBM 2025, 2026
//
// This code is licensed under the Apache License, Version 2.0. You may
// obtain a copy of this license in the LICENSE.txt file in the root directory
// of this source tree or at http://www.apache.org/licenses/LICENSE-2.0.
//
// Any modifications or derivative works of this code must retain this
// copyright notice, and modified files need to carry a notice indicating
// that they have been altered from the originals.

//! Realtime topic subscriptions.
//!
//! Handlers are registered per topic and stay registered for as long as the
//! returned [`Subscription`] is alive.

use log::debug;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Published once queued invoices are downloaded and uploads may start.
pub const UPLOAD_DATA_AND_CHECK_STATUS: &str = "upload_data_and_check_status";
/// Published when a download request is queued on the server.
pub const IMS_DOWNLOAD_QUEUED: &str = "ims_download_queued";
/// Published when downloaded invoices are reconciled.
pub const IMS_DOWNLOAD_COMPLETED: &str = "ims_download_completed";

type Handler = Arc<dyn Fn(&Value) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: HashMap<String, Vec<(u64, Handler)>>,
}

/// In-process event bus delivering payloads to topic subscribers.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<Registry>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `topic` until the returned subscription is dropped.
    pub fn subscribe<F>(&self, topic: &str, handler: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let mut registry = lock(&self.inner);
        let id = registry.next_id;
        registry.next_id += 1;
        registry
            .handlers
            .entry(topic.to_string())
            .or_default()
            .push((id, Arc::new(handler)));
        debug!("Subscribed #{} to '{}'", id, topic);

        Subscription {
            registry: Arc::downgrade(&self.inner),
            topic: topic.to_string(),
            id,
        }
    }

    /// Delivers `payload` to every handler of `topic` and returns how many ran.
    pub fn publish(&self, topic: &str, payload: &Value) -> usize {
        // Handlers run without the lock so they may (un)subscribe.
        let handlers: Vec<Handler> = lock(&self.inner)
            .handlers
            .get(topic)
            .map(|hs| hs.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default();
        for handler in &handlers {
            handler(payload);
        }
        handlers.len()
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        lock(&self.inner)
            .handlers
            .get(topic)
            .map_or(0, |hs| hs.len())
    }
}

/// Registration handle of one handler. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes its handler"]
pub struct Subscription {
    registry: Weak<Mutex<Registry>>,
    topic: String,
    id: u64,
}

impl Subscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let mut registry = lock(&registry);
        if let Some(handlers) = registry.handlers.get_mut(&self.topic) {
            handlers.retain(|(id, _)| *id != self.id);
            if handlers.is_empty() {
                registry.handlers.remove(&self.topic);
            }
        }
        debug!("Unsubscribed #{} from '{}'", self.id, self.topic);
    }
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}
