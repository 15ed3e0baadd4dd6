//! Configuration store: the single live [`AppConfig`]
//!
//! Mutations are merged under an async mutex and published on a `watch`
//! channel before being persisted (write-through cache). A failed persist is
//! logged and recorded, never rolled back.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};

use geekflash_backend::FlashBackend;
use geekflash_core::prelude::*;
use geekflash_core::{AppConfig, AvbParams, PartialAppConfig};

pub struct ConfigStore<B> {
    backend: Arc<B>,
    /// Serializes merges against the latest value
    current: Mutex<Option<AppConfig>>,
    /// Taken before `current` is released so persists run in merge order
    save_lock: Mutex<()>,
    tx: watch::Sender<Option<AppConfig>>,
    last_persist_error: std::sync::Mutex<Option<String>>,
}

impl<B> ConfigStore<B>
where
    B: FlashBackend + Sync,
{
    /// An empty store; call [`Self::load`] before applying patches
    pub fn new(backend: Arc<B>) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            backend,
            current: Mutex::new(None),
            save_lock: Mutex::new(()),
            tx,
            last_persist_error: std::sync::Mutex::new(None),
        }
    }

    /// Load the persisted configuration and make it current.
    ///
    /// On failure the store keeps whatever it held before (nothing, at
    /// startup) and the error is returned.
    pub async fn load(&self) -> Result<AppConfig> {
        let mut current = self.current.lock().await;
        match self.backend.load_config().await {
            Ok(config) => {
                info!("Configuration loaded");
                *current = Some(config.clone());
                self.tx.send_replace(Some(config.clone()));
                Ok(config)
            }
            Err(e) => {
                warn!("Failed to load configuration: {}", e);
                Err(e)
            }
        }
    }

    /// Retry loading, e.g. after the operator repaired a corrupt file
    pub async fn reload(&self) -> Result<AppConfig> {
        self.load().await
    }

    /// Merge `patch` onto the current configuration and persist the result.
    ///
    /// Returns the merged configuration even when persisting it fails.
    pub async fn apply(&self, patch: PartialAppConfig) -> Result<AppConfig> {
        self.apply_with(move |_| patch).await
    }

    /// Replace `avb_params` with an edited copy of the current record
    pub async fn update_avb_params<F>(&self, edit: F) -> Result<AppConfig>
    where
        F: FnOnce(&mut AvbParams) + Send,
    {
        self.apply_with(move |config| {
            let mut params = config.avb_params.clone();
            edit(&mut params);
            PartialAppConfig::new().avb_params(params)
        })
        .await
    }

    async fn apply_with<F>(&self, build_patch: F) -> Result<AppConfig>
    where
        F: FnOnce(&AppConfig) -> PartialAppConfig + Send,
    {
        let mut current = self.current.lock().await;
        let base = current.as_ref().ok_or(Error::ConfigUnavailable)?;

        let patch = build_patch(base);
        let merged = base.merged(&patch);
        *current = Some(merged.clone());
        self.tx.send_replace(Some(merged.clone()));

        let save_guard = self.save_lock.lock().await;
        drop(current);

        self.persist(&merged).await;
        drop(save_guard);

        Ok(merged)
    }

    async fn persist(&self, config: &AppConfig) {
        let outcome = self.backend.save_config(config).await;
        let mut last = self
            .last_persist_error
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        match outcome {
            Ok(()) => {
                debug!("Configuration persisted");
                *last = None;
            }
            Err(e) => {
                warn!("Failed to persist configuration (kept in memory): {}", e);
                *last = Some(e.to_string());
            }
        }
    }

    /// The current configuration, `None` until a load succeeds
    pub fn current(&self) -> Option<AppConfig> {
        self.tx.borrow().clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.tx.borrow().is_some()
    }

    pub fn watch(&self) -> watch::Receiver<Option<AppConfig>> {
        self.tx.subscribe()
    }

    /// Message of the most recent failed persist, cleared by the next success
    pub fn last_persist_error(&self) -> Option<String> {
        self.last_persist_error
            .lock()
            .map(|e| e.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geekflash_backend::test_utils::{fixture_path, BackendCall, ScriptedBackend};
    use geekflash_core::{AvbProp, ConfigField};

    async fn loaded_store(
        backend: ScriptedBackend,
    ) -> (ConfigStore<ScriptedBackend>, Arc<ScriptedBackend>) {
        let backend = Arc::new(backend);
        let store = ConfigStore::new(Arc::clone(&backend));
        store.load().await.unwrap();
        (store, backend)
    }

    #[tokio::test]
    async fn test_apply_merges_and_persists() {
        let (store, backend) = loaded_store(ScriptedBackend::new()).await;

        let merged = store
            .apply(PartialAppConfig::new().set(ConfigField::FirehoseLoader, "/l/prog.elf"))
            .await
            .unwrap();

        assert_eq!(
            merged.firehose_loader.as_deref(),
            Some(std::path::Path::new("/l/prog.elf"))
        );
        assert_eq!(store.current(), Some(merged.clone()));
        assert_eq!(backend.stored_config(), Some(merged));
        assert!(store.last_persist_error().is_none());
    }

    #[tokio::test]
    async fn test_apply_is_idempotent() {
        let (store, _backend) = loaded_store(ScriptedBackend::new()).await;
        let patch = PartialAppConfig::new()
            .set(ConfigField::GptMainBin, "/g/main.bin")
            .clear(ConfigField::AvbKeyPath);

        let first = store.apply(patch.clone()).await.unwrap();
        let second = store.apply(patch).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_avb_params_replaced_wholesale() {
        let (store, _backend) = loaded_store(ScriptedBackend::new()).await;
        let replacement = AvbParams {
            partition_name: "init_boot".to_string(),
            props: vec![],
            ..AvbParams::default()
        };

        let merged = store
            .apply(PartialAppConfig::new().avb_params(replacement.clone()))
            .await
            .unwrap();
        assert_eq!(merged.avb_params, replacement);
        assert!(merged.avb_params.props.is_empty());
    }

    #[tokio::test]
    async fn test_update_avb_params_edits_current_record() {
        let (store, _backend) = loaded_store(ScriptedBackend::new()).await;

        let merged = store
            .update_avb_params(|p| {
                p.rollback_index = 0;
                p.props.push(AvbProp::new("k", "v"));
            })
            .await
            .unwrap();

        assert_eq!(merged.avb_params.rollback_index, 0);
        assert_eq!(merged.avb_params.props.len(), 4);
        assert_eq!(merged.avb_params.partition_name, "boot");
    }

    #[tokio::test]
    async fn test_save_failure_keeps_in_memory_value() {
        let (store, backend) =
            loaded_store(ScriptedBackend::new().with_config(AppConfig::default())).await;
        backend.set_save_error(Some("disk full"));

        let merged = store
            .apply(PartialAppConfig::new().set(ConfigField::StockBootImg, "/s/boot.img"))
            .await
            .unwrap();

        assert_eq!(store.current(), Some(merged));
        assert_eq!(backend.stored_config(), Some(AppConfig::default()));
        assert!(store.last_persist_error().unwrap().contains("disk full"));

        backend.set_save_error(None);
        store.apply(PartialAppConfig::new()).await.unwrap();
        assert!(store.last_persist_error().is_none());
    }

    #[tokio::test]
    async fn test_load_failure_leaves_store_empty() {
        let backend = Arc::new(ScriptedBackend::new().with_load_error("corrupt"));
        let store = ConfigStore::new(Arc::clone(&backend));

        let err = store.load().await.unwrap_err();
        assert!(matches!(err, Error::Persistence { .. }));
        assert!(!store.is_loaded());

        let err = store.apply(PartialAppConfig::new()).await.unwrap_err();
        assert!(matches!(err, Error::ConfigUnavailable));

        backend.clear_load_error();
        tokio_test::assert_ok!(store.reload().await);
        assert!(store.is_loaded());
    }

    #[tokio::test]
    async fn test_watch_sees_merge_before_persist_returns() {
        let (store, _backend) = loaded_store(ScriptedBackend::new()).await;
        let mut rx = store.watch();
        rx.borrow_and_update();

        store
            .apply(PartialAppConfig::new().set(ConfigField::AvbtoolPath, "/t/avbtool.py"))
            .await
            .unwrap();

        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow().as_ref().unwrap().is_set(ConfigField::AvbtoolPath));
    }

    #[tokio::test]
    async fn test_concurrent_applies_persist_in_merge_order() {
        let (store, backend) = loaded_store(ScriptedBackend::new()).await;
        let store = Arc::new(store);

        let mut handles = Vec::new();
        for field in ConfigField::ALL {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .apply(PartialAppConfig::new().set(field, fixture_path(field)))
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let current = store.current().unwrap();
        assert!(ConfigField::ALL.iter().all(|f| current.is_set(*f)));
        assert_eq!(backend.stored_config(), Some(current));

        // Each save carries one more field than the one before
        let saved: Vec<usize> = backend
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                BackendCall::SaveConfig(cfg) => {
                    Some(ConfigField::ALL.iter().filter(|f| cfg.is_set(**f)).count())
                }
                _ => None,
            })
            .collect();
        assert_eq!(saved, vec![1, 2, 3, 4, 5, 6, 7]);
    }
}
