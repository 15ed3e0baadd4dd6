//! Backend event feeds
//!
//! Fire-and-forget fan-out of `device-status` and `log-line` events. Each
//! subscriber owns an unbounded receiver; subscribers whose receiver has been
//! dropped are pruned on the next emit.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;

use geekflash_core::{DeviceStatus, LogLine};

/// A named broadcast feed with per-subscriber ordered delivery
#[derive(Debug)]
pub struct EventFeed<T> {
    name: &'static str,
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<T>>>>,
}

impl<T> Clone for EventFeed<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            subscribers: Arc::clone(&self.subscribers),
        }
    }
}

impl<T: Clone> EventFeed<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    // Recovers from poisoning
    fn subscribers(&self) -> MutexGuard<'_, Vec<mpsc::UnboundedSender<T>>> {
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a new listener. Events emitted after this call are delivered
    /// to the returned receiver in emission order.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut subs = self.subscribers();
        subs.push(tx);
        tracing::debug!("{} feed: subscriber added ({} total)", self.name, subs.len());
        rx
    }

    /// Deliver an event to every live subscriber. Returns the number reached.
    pub fn emit(&self, event: T) -> usize {
        let mut subs = self.subscribers();
        subs.retain(|tx| tx.send(event.clone()).is_ok());
        subs.len()
    }

    pub fn subscriber_count(&self) -> usize {
        let mut subs = self.subscribers();
        subs.retain(|tx| !tx.is_closed());
        subs.len()
    }
}

/// The two feeds a backend publishes on
#[derive(Debug, Clone)]
pub struct EventBus {
    pub device_status: EventFeed<DeviceStatus>,
    pub log_lines: EventFeed<LogLine>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            device_status: EventFeed::new(geekflash_core::DEVICE_STATUS_EVENT),
            log_lines: EventFeed::new(geekflash_core::LOG_LINE_EVENT),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
