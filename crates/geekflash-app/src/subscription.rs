//! Explicit event-feed subscription handles
//!
//! A [`Subscription`] owns the listener task draining one feed receiver.
//! [`Subscription::unsubscribe`] signals the task through a `watch` shutdown
//! channel and awaits it: once it returns, the callback will not run again.

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use geekflash_core::prelude::*;

#[derive(Debug)]
pub struct Subscription {
    name: &'static str,
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Spawn a listener that hands every received event to `on_event`, in order
    pub fn spawn<T, F>(
        name: &'static str,
        mut rx: mpsc::UnboundedReceiver<T>,
        mut on_event: F,
    ) -> Self
    where
        T: Send + 'static,
        F: FnMut(T) + Send + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    event = rx.recv() => match event {
                        Some(event) => on_event(event),
                        None => {
                            debug!("{} feed closed", name);
                            break;
                        }
                    },
                }
            }
            debug!("{} listener stopped", name);
        });

        Self {
            name,
            shutdown_tx,
            task: Some(task),
        }
    }

    /// Whether the listener task is still running
    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop delivery and wait for the listener to exit
    pub async fn unsubscribe(mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    warn!("{} listener ended abnormally: {}", self.name, e);
                }
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
