//! Operation scenarios against a scripted backend

use geekflash_app::OperationState;
use geekflash_backend::test_utils::{
    config_with, full_config, BackendCall, Outcome, ScriptedBackend,
};
use geekflash_backend::EventBus;
use geekflash_core::prelude::*;
use geekflash_core::{CommandResult, ConfigField, Operation};

use crate::started;

#[tokio::test]
async fn test_flash_boot_succeeds_with_both_paths() {
    let backend = ScriptedBackend::new().with_config(config_with(&[
        ConfigField::PatchedBootImg,
        ConfigField::FirehoseLoader,
    ]));
    let orch = started(backend.clone(), EventBus::new()).await;

    assert!(orch.readiness().can_flash_boot);
    let result = orch.run(Operation::FlashBoot).await.unwrap();

    assert_eq!(result.exit_code, 0);
    assert_eq!(
        orch.runner().state(Operation::FlashBoot),
        OperationState::Succeeded(result)
    );
    assert_eq!(orch.runner().in_flight(), None);
    assert_eq!(backend.operation_calls().len(), 1);
    orch.shutdown().await;
}

#[tokio::test]
async fn test_flash_boot_nonzero_exit_fails() {
    let backend = ScriptedBackend::new().with_config(full_config());
    backend.push_outcome(Operation::FlashBoot, Outcome::Exit(1));
    let orch = started(backend, EventBus::new()).await;

    let err = orch.run(Operation::FlashBoot).await.unwrap_err();
    assert!(matches!(err, Error::OperationFailed { exit_code: 1, .. }));

    match orch.runner().state(Operation::FlashBoot) {
        OperationState::Failed { result, .. } => {
            assert_eq!(result, Some(CommandResult::new(1, 10)));
        }
        other => panic!("expected failed, got {:?}", other),
    }

    // Terminal state does not block the next run
    orch.run(Operation::FlashBoot).await.unwrap();
    orch.shutdown().await;
}

#[tokio::test]
async fn test_fix_gpt_without_main_never_reaches_backend() {
    let mut config = full_config();
    config.gpt_main_bin = None;
    let backend = ScriptedBackend::new().with_config(config);
    let orch = started(backend.clone(), EventBus::new()).await;

    assert!(!orch.readiness().can_fix_gpt);
    let err = orch.run(Operation::FixGptSlot).await.unwrap_err();

    match err {
        Error::Precondition { operation, missing } => {
            assert_eq!(operation, Operation::FixGptSlot);
            assert_eq!(missing, vec![ConfigField::GptMainBin]);
        }
        other => panic!("expected precondition error, got {:?}", other),
    }
    assert!(backend.operation_calls().is_empty());
    assert_eq!(orch.runner().state(Operation::FixGptSlot), OperationState::Idle);
    orch.shutdown().await;
}

#[tokio::test]
async fn test_second_operation_rejected_while_running() {
    let backend = ScriptedBackend::new().with_config(full_config()).gated();
    let orch = started(backend.clone(), EventBus::new()).await;

    let (first, second) = tokio::join!(orch.run(Operation::SignAvb), async {
        backend.wait_until_entered().await;
        let second = orch.run(Operation::RestoreBoot).await;
        backend.release();
        second
    });

    assert!(first.is_ok());
    assert!(matches!(
        second.unwrap_err(),
        Error::OperationInProgress {
            requested: Operation::RestoreBoot,
            running: Operation::SignAvb,
        }
    ));
    assert_eq!(backend.operation_calls().len(), 1);
    orch.shutdown().await;
}

#[tokio::test]
async fn test_sign_avb_forwards_edited_params() {
    let backend = ScriptedBackend::new().with_config(full_config());
    let orch = started(backend.clone(), EventBus::new()).await;

    orch.config()
        .update_avb_params(|p| p.partition_size = 67_108_864)
        .await
        .unwrap();
    orch.run(Operation::SignAvb).await.unwrap();

    match backend.operation_calls().as_slice() {
        [BackendCall::SignAvb { params, .. }] => {
            assert_eq!(params.partition_size, 67_108_864);
            assert_eq!(params.props.len(), 3);
        }
        other => panic!("unexpected calls {:?}", other),
    }
    orch.shutdown().await;
}
