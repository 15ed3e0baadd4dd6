//! Device status monitor
//!
//! Mirrors the `device-status` feed into a `watch` channel. Starts at
//! `disconnected`; every inbound event replaces the status, including
//! same-mode events (which refresh the timestamp).

use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use geekflash_backend::EventFeed;
use geekflash_core::prelude::*;
use geekflash_core::DeviceStatus;

use crate::subscription::Subscription;

pub struct DeviceStatusMonitor {
    tx: Arc<watch::Sender<DeviceStatus>>,
    subscription: Mutex<Option<Subscription>>,
}

impl Default for DeviceStatusMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceStatusMonitor {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(DeviceStatus::disconnected());
        Self {
            tx: Arc::new(tx),
            subscription: Mutex::new(None),
        }
    }

    /// Subscribe to `feed`. Returns `false` (and subscribes nothing) when
    /// already started.
    pub fn start(&self, feed: &EventFeed<DeviceStatus>) -> bool {
        let mut slot = self.subscription.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_some() {
            debug!("Device monitor already started");
            return false;
        }

        let tx = Arc::clone(&self.tx);
        *slot = Some(Subscription::spawn(feed.name(), feed.subscribe(), move |status| {
            trace!("device-status: {}", status.mode);
            tx.send_replace(status);
        }));
        true
    }

    /// Tear down the subscription; no status is applied after this returns
    pub async fn shutdown(&self) {
        let subscription = self
            .subscription
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(subscription) = subscription {
            subscription.unsubscribe().await;
        }
    }

    pub fn is_started(&self) -> bool {
        self.subscription
            .lock()
            .map(|s| s.is_some())
            .unwrap_or(false)
    }

    /// Latest status
    pub fn current(&self) -> DeviceStatus {
        *self.tx.borrow()
    }

    pub fn watch(&self) -> watch::Receiver<DeviceStatus> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use geekflash_backend::EventBus;
    use geekflash_core::DeviceMode;
    use std::time::Duration;

    async fn next(rx: &mut watch::Receiver<DeviceStatus>) -> DeviceStatus {
        tokio::time::timeout(Duration::from_secs(2), rx.changed())
            .await
            .unwrap()
            .unwrap();
        *rx.borrow_and_update()
    }

    #[tokio::test]
    async fn test_starts_disconnected() {
        let monitor = DeviceStatusMonitor::new();
        assert_eq!(monitor.current().mode, DeviceMode::Disconnected);
        assert!(!monitor.is_started());
    }

    #[tokio::test]
    async fn test_follows_feed_events() {
        let bus = EventBus::new();
        let monitor = DeviceStatusMonitor::new();
        let mut rx = monitor.watch();
        assert!(monitor.start(&bus.device_status));

        let t1 = Utc.timestamp_millis_opt(1_000).unwrap();
        let t2 = Utc.timestamp_millis_opt(2_000).unwrap();

        bus.device_status.emit(DeviceStatus::new(DeviceMode::Edl, t1));
        assert_eq!(next(&mut rx).await, DeviceStatus::new(DeviceMode::Edl, t1));

        // Same mode, new timestamp
        bus.device_status.emit(DeviceStatus::new(DeviceMode::Edl, t2));
        assert_eq!(next(&mut rx).await.timestamp, t2);
        assert_eq!(monitor.current(), DeviceStatus::new(DeviceMode::Edl, t2));

        monitor.shutdown().await;
    }

    #[tokio::test]
    async fn test_second_start_is_noop() {
        let bus = EventBus::new();
        let monitor = DeviceStatusMonitor::new();

        assert!(monitor.start(&bus.device_status));
        assert!(!monitor.start(&bus.device_status));
        assert_eq!(bus.device_status.subscriber_count(), 1);

        monitor.shutdown().await;
    }

    #[tokio::test]
    async fn test_no_updates_after_shutdown() {
        let bus = EventBus::new();
        let monitor = DeviceStatusMonitor::new();
        monitor.start(&bus.device_status);
        monitor.shutdown().await;

        bus.device_status.emit(DeviceStatus::now(DeviceMode::Fastboot));
        tokio::task::yield_now().await;

        assert_eq!(monitor.current().mode, DeviceMode::Disconnected);
        assert_eq!(bus.device_status.subscriber_count(), 0);
    }
}
