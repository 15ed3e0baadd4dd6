//! Orchestrator over the real local backend: file persistence and, on Unix,
//! process execution with stand-in programs

use std::sync::Arc;
use std::time::Duration;

use geekflash_app::{Orchestrator, ReadinessFlags};
use geekflash_backend::test_utils::full_config;
use geekflash_backend::{CommandOptions, ConfigPersistence, EventBus, LocalBackend};
use geekflash_core::prelude::*;
use geekflash_core::{ConfigField, PartialAppConfig};
use tempfile::tempdir;

use crate::wait_for_lines;

fn local(dir: &std::path::Path, options: CommandOptions) -> Orchestrator<LocalBackend> {
    let bus = EventBus::new();
    let backend = LocalBackend::new(
        ConfigPersistence::new(dir),
        options,
        Duration::from_secs(10),
        &bus,
    );
    Orchestrator::new(Arc::new(backend), bus, None)
}

#[tokio::test]
async fn test_configuration_survives_restart() {
    let temp = tempdir().unwrap();

    let orch = local(temp.path(), CommandOptions::default());
    let initial = orch.start().await.unwrap();
    assert_eq!(initial.firehose_loader, None);

    let patch = PartialAppConfig::new().set(ConfigField::GptMainBin, "/fw/gpt_main4.bin");
    orch.apply(patch).await.unwrap();
    orch.config()
        .update_avb_params(|p| p.rollback_index = 42)
        .await
        .unwrap();
    assert_eq!(orch.config().last_persist_error(), None);
    orch.shutdown().await;

    let reopened = local(temp.path(), CommandOptions::default());
    let loaded = reopened.start().await.unwrap();
    assert!(loaded.is_set(ConfigField::GptMainBin));
    assert_eq!(loaded.avb_params.rollback_index, 42);
    reopened.shutdown().await;
}

#[tokio::test]
async fn test_corrupt_configuration_disables_operations() {
    let temp = tempdir().unwrap();
    let persistence = ConfigPersistence::new(temp.path());
    std::fs::write(persistence.path(), b"{ not json").unwrap();

    let orch = local(temp.path(), CommandOptions::default());
    let err = orch.start().await.unwrap_err();

    assert!(matches!(err, Error::Persistence { .. }));
    assert!(!orch.config().is_loaded());
    assert_eq!(orch.readiness(), ReadinessFlags::default());
    orch.shutdown().await;
}

#[cfg(unix)]
fn stand_in(program: &str) -> CommandOptions {
    CommandOptions {
        edl_program: program.to_string(),
        fastboot_program: program.to_string(),
        use_sudo: false,
        edl_switch_delay_ms: 0,
        ..CommandOptions::default()
    }
}

#[cfg(unix)]
#[tokio::test]
async fn test_flash_boot_runs_both_steps() {
    use geekflash_core::Operation;

    let temp = tempdir().unwrap();
    let orch = local(temp.path(), stand_in("true"));
    orch.start().await.unwrap();
    let fixtures = full_config();
    let patch = PartialAppConfig::new()
        .set(ConfigField::PatchedBootImg, fixtures.patched_boot_img.unwrap())
        .set(ConfigField::FirehoseLoader, fixtures.firehose_loader.unwrap());
    orch.apply(patch).await.unwrap();

    let result = orch.run(Operation::FlashBoot).await.unwrap();
    assert_eq!(result.exit_code, 0);

    wait_for_lines(&orch, 4).await;
    let lines: Vec<String> = orch.logs().snapshot().into_iter().map(|l| l.content).collect();
    assert_eq!(lines[0], "[1/2] Running: true oem edl");
    assert!(lines.iter().any(|l| l.starts_with("[2/2] Running: true w boot_a")));
    assert!(lines.iter().any(|l| l.starts_with("Command exited with code 0")));
    orch.shutdown().await;
}

#[cfg(unix)]
#[tokio::test]
async fn test_failing_step_stops_sequence() {
    use geekflash_app::OperationState;
    use geekflash_core::Operation;

    let temp = tempdir().unwrap();
    let orch = local(temp.path(), stand_in("false"));
    orch.start().await.unwrap();
    let patch = PartialAppConfig::new()
        .set(ConfigField::GptMainBin, "/fw/gpt_main4.bin")
        .set(ConfigField::GptBackupBin, "/fw/gpt_backup4.bin")
        .set(ConfigField::FirehoseLoader, "/fw/prog_firehose.elf");
    orch.apply(patch).await.unwrap();

    let err = orch.run(Operation::FixGptSlot).await.unwrap_err();
    assert!(matches!(err, Error::OperationFailed { exit_code: 1, .. }));
    assert!(matches!(
        orch.runner().state(Operation::FixGptSlot),
        OperationState::Failed { result: Some(_), .. }
    ));

    wait_for_lines(&orch, 2).await;
    let lines: Vec<String> = orch.logs().snapshot().into_iter().map(|l| l.content).collect();
    assert!(lines.iter().all(|l| !l.starts_with("[2/2]")));
    orch.shutdown().await;
}
