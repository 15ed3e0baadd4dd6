//! USB device mode detection
//!
//! Probes the USB bus listing (`system_profiler SPUSBDataType` on macOS,
//! `lsusb` elsewhere) and classifies the attached device:
//! - Qualcomm HS-USB QDLoader (VID `05c6`, PID `9008`) => `edl`
//! - anything mentioning "fastboot" => `fastboot`
//! - otherwise => `disconnected`
//!
//! [`DevicePoller`] repeats the probe on an interval and publishes a
//! `device-status` event whenever the mode changes.

use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tokio::process::Command;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use geekflash_core::prelude::*;
use geekflash_core::{DeviceMode, DeviceStatus};

use crate::feed::EventFeed;

/// Default probe interval
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(3000);

/// `lsusb`: `Bus 001 Device 004: ID 05c6:9008 Qualcomm, Inc. Gobi Wireless Modem (QDL mode)`
static LSUSB_EDL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bID\s+05c6:9008\b").expect("lsusb EDL regex is valid")
});

/// `system_profiler`: `Vendor ID: 0x05c6  (Qualcomm, Inc.)`
static PROFILER_VID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Vendor ID:\s*0x05c6\b").expect("vendor id regex is valid")
});

/// `system_profiler`: `Product ID: 0x9008`
static PROFILER_PID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Product ID:\s*0x9008\b").expect("product id regex is valid")
});

/// Classify a USB listing. EDL requires both the vendor and the product id
/// and takes priority over fastboot.
pub fn parse_device_mode(listing: &str) -> DeviceMode {
    let edl = LSUSB_EDL_PATTERN.is_match(listing)
        || (PROFILER_VID_PATTERN.is_match(listing) && PROFILER_PID_PATTERN.is_match(listing));
    if edl {
        return DeviceMode::Edl;
    }

    if listing.to_ascii_lowercase().contains("fastboot") {
        return DeviceMode::Fastboot;
    }

    DeviceMode::Disconnected
}

fn listing_command() -> (&'static str, &'static [&'static str]) {
    if cfg!(target_os = "macos") {
        ("system_profiler", &["SPUSBDataType"])
    } else {
        ("lsusb", &[])
    }
}

/// Run the platform USB listing once and classify it
pub async fn probe_device() -> Result<DeviceStatus> {
    let (program, args) = listing_command();

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::ToolNotFound {
                    tool: program.to_string(),
                }
            } else {
                Error::process_spawn(program, e.to_string())
            }
        })?;

    if !output.status.success() {
        return Err(Error::process(format!(
            "{} exited with {:?}",
            program,
            output.status.code()
        )));
    }

    let listing = String::from_utf8_lossy(&output.stdout);
    Ok(DeviceStatus::now(parse_device_mode(&listing)))
}

/// Background task that publishes mode changes on the `device-status` feed
pub struct DevicePoller {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl DevicePoller {
    /// Start polling with the platform probe
    pub fn spawn(feed: EventFeed<DeviceStatus>, interval: Duration) -> Self {
        Self::spawn_with(feed, interval, || async {
            probe_device().await.map(|status| status.mode)
        })
    }

    /// Start polling with a custom probe. Probe errors count as disconnected.
    pub fn spawn_with<F, Fut>(feed: EventFeed<DeviceStatus>, interval: Duration, probe: F) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<DeviceMode>> + Send + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut last: Option<DeviceMode> = None;

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            debug!("Device poller: shutdown signal received");
                            break;
                        }
                    }
                    _ = tick.tick() => {
                        let mode = match probe().await {
                            Ok(mode) => mode,
                            Err(e) => {
                                debug!("Device probe failed (treated as disconnected): {}", e);
                                DeviceMode::Disconnected
                            }
                        };
                        if last != Some(mode) {
                            info!("Device mode: {}", mode);
                            last = Some(mode);
                            feed.emit(DeviceStatus::now(mode));
                        }
                    }
                }
            }
        });

        Self { shutdown_tx, task }
    }

    /// Stop polling and wait for the task to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            if !e.is_cancelled() {
                warn!("Device poller task ended abnormally: {}", e);
            }
        }
    }
}
