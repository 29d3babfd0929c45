//! Named-event emitter with persistent and one-shot listeners.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::{join_all, BoxFuture};

use crate::error::Result;
use crate::handler::HandlerOutput;

/// Results of every handler one listener ran
pub type ListenerResults = Vec<Result<Option<HandlerOutput>>>;

pub type Listener =
    Arc<dyn Fn(serde_json::Value) -> BoxFuture<'static, ListenerResults> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Entry {
    id: ListenerId,
    once: bool,
    listener: Listener,
}

#[derive(Default)]
pub struct EventEmitter {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<String, Vec<Entry>>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, event: &str, listener: Listener) -> ListenerId {
        self.add(event, listener, false)
    }

    /// Listener removed before its first run.
    pub fn once(&self, event: &str, listener: Listener) -> ListenerId {
        self.add(event, listener, true)
    }

    fn add(&self, event: &str, listener: Listener, once: bool) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock()
            .entry(event.to_string())
            .or_default()
            .push(Entry { id, once, listener });
        id
    }

    /// Returns false when no such listener was attached.
    pub fn off(&self, event: &str, id: ListenerId) -> bool {
        let mut listeners = self.lock();
        let Some(entries) = listeners.get_mut(event) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|e| e.id != id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            listeners.remove(event);
        }
        removed
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.lock().get(event).map_or(0, Vec::len)
    }

    pub fn event_names(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    /// Run every listener for `event` concurrently and collect their
    /// results. Returns an empty list when nothing listens.
    pub async fn emit(&self, event: &str, payload: serde_json::Value) -> ListenerResults {
        let listeners: Vec<Listener> = {
            let mut map = self.lock();
            let Some(entries) = map.get_mut(event) else {
                return Vec::new();
            };
            let current: Vec<Listener> = entries.iter().map(|e| e.listener.clone()).collect();
            entries.retain(|e| !e.once);
            if entries.is_empty() {
                map.remove(event);
            }
            current
        };

        join_all(listeners.iter().map(|listener| listener(payload.clone())))
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<Entry>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
