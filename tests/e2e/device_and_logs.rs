//! Event feed scenarios: device status and log ordering

use std::time::Duration;

use chrono::{TimeZone, Utc};
use geekflash_backend::test_utils::{full_config, ScriptedBackend};
use geekflash_backend::EventBus;
use geekflash_core::{DeviceMode, DeviceStatus, LogLine, LogStreamKind, Operation};

use crate::{started, wait_for_lines};

#[tokio::test]
async fn test_device_status_follows_feed() {
    let bus = EventBus::new();
    let orch = started(ScriptedBackend::new(), bus.clone()).await;
    let mut rx = orch.devices().watch();
    let mut observed = vec![orch.devices().current().mode];

    let t1 = Utc.timestamp_millis_opt(1_000).unwrap();
    let t2 = Utc.timestamp_millis_opt(2_000).unwrap();
    bus.device_status
        .emit(DeviceStatus::new(DeviceMode::Disconnected, t1));
    bus.device_status.emit(DeviceStatus::new(DeviceMode::Edl, t2));

    tokio::time::timeout(Duration::from_secs(5), async {
        while orch.devices().current().timestamp != t2 {
            rx.changed().await.unwrap();
            let mode = rx.borrow_and_update().mode;
            if observed.last() != Some(&mode) {
                observed.push(mode);
            }
        }
    })
    .await
    .unwrap();

    assert_eq!(observed, vec![DeviceMode::Disconnected, DeviceMode::Edl]);
    assert_eq!(orch.devices().current(), DeviceStatus::new(DeviceMode::Edl, t2));
    orch.shutdown().await;
}

#[tokio::test]
async fn test_log_lines_keep_emission_order() {
    let bus = EventBus::new();
    let lines = vec![
        LogLine::stdout("[1/2] Running: fastboot oem edl"),
        LogLine::stdout("rebooting into EDL"),
        LogLine::stderr("sahara: device not ready, retrying"),
        LogLine::stdout("[2/2] Running: sudo edl w boot_a boot.img"),
    ];
    let backend = ScriptedBackend::new()
        .with_config(full_config())
        .with_log_lines(&bus, lines.clone());
    let orch = started(backend, bus).await;

    orch.run(Operation::FlashBoot).await.unwrap();
    wait_for_lines(&orch, lines.len()).await;

    assert_eq!(orch.logs().snapshot(), lines);
    let kinds: Vec<_> = orch.logs().snapshot().iter().map(|l| l.stream).collect();
    assert_eq!(
        kinds,
        vec![
            LogStreamKind::Stdout,
            LogStreamKind::Stdout,
            LogStreamKind::Stderr,
            LogStreamKind::Stdout,
        ]
    );

    orch.logs().clear();
    assert!(orch.logs().is_empty());

    orch.run(Operation::FlashBoot).await.unwrap();
    wait_for_lines(&orch, lines.len()).await;
    assert_eq!(orch.logs().snapshot(), lines);
    orch.shutdown().await;
}
