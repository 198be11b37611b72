//! Notification fan-out to changes-feed waiters.
//!
//! Any state-modifying operation that produced a non-empty changed-channels
//! set notifies the bus on the same call path, after the coordinator lock
//! has been released. Delivery is synchronous; a slow subscriber blocks
//! ingestion.

use parking_lot::RwLock;
use std::sync::Arc;

/// Set of channel names with new content.
pub type ChannelSet = ahash::AHashSet<String>;

/// Subscriber callback receiving the changed channel names.
pub type NotifyFn = Arc<dyn Fn(&ChannelSet) + Send + Sync>;

/// Bus of subscribed change listeners.
#[derive(Default)]
pub struct ListenerBus {
    subscribers: RwLock<Vec<NotifyFn>>,
}

impl ListenerBus {
    pub fn new() -> Self {
        ListenerBus::default()
    }

    pub fn subscribe(&self, listener: NotifyFn) {
        self.subscribers.write().push(listener);
    }

    /// Deliver the set to every subscriber. Empty sets are not delivered.
    pub fn notify(&self, changed: &ChannelSet) {
        if changed.is_empty() {
            return;
        }
        let subscribers = self.subscribers.read();
        for subscriber in subscribers.iter() {
            subscriber(changed);
        }
    }
}
