use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

use super::controller::DraftController;
use crate::config::AutosaveConfig;
use crate::draft::{DraftDocument, DraftKey};

/// Where the autosave loop is for its draft
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutosaveState {
    Idle,
    Dirty,
    Saving,
}

#[derive(Debug, Clone)]
pub struct AutosaveSettings {
    pub debounce: Duration,
    pub flush_on_close: bool,
}

impl From<&AutosaveConfig> for AutosaveSettings {
    fn from(config: &AutosaveConfig) -> Self {
        Self {
            debounce: Duration::from_millis(config.debounce_ms),
            flush_on_close: config.flush_on_close,
        }
    }
}

/// Debounced autosave for one draft key
///
/// Every mutation publishes the latest snapshot with [`Autosaver::mark_dirty`].
/// A single background task coalesces bursts, saves one snapshot at a time,
/// and picks up anything published while a save was in flight. Two processes
/// autosaving the same key race and the last writer wins.
///
/// Dropping the autosaver stops the loop like [`Autosaver::close`] does,
/// including the final save, but without waiting for it.
pub struct Autosaver {
    key: DraftKey,
    snapshots: watch::Sender<DraftDocument>,
    state: watch::Receiver<AutosaveState>,
    flush_requests: mpsc::Sender<oneshot::Sender<bool>>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
    _cancel_on_drop: DropGuard,
}

impl Autosaver {
    /// Start the loop; `initial` counts as already saved
    pub fn spawn(
        controller: Arc<DraftController>,
        key: DraftKey,
        settings: AutosaveSettings,
        initial: DraftDocument,
    ) -> Self {
        let (snapshot_tx, snapshot_rx) = watch::channel(initial);
        let (state_tx, state_rx) = watch::channel(AutosaveState::Idle);
        let (flush_tx, flush_rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();

        info!(draft_key = %key, debounce_ms = settings.debounce.as_millis() as u64, "Autosave started");

        let worker = SaveLoop {
            controller,
            key: key.clone(),
            settings,
            snapshots: snapshot_rx,
            state: state_tx,
            flush_requests: flush_rx,
            cancel: cancel.clone(),
            dirty: false,
        };
        let task = tokio::spawn(worker.run());

        Self {
            key,
            snapshots: snapshot_tx,
            state: state_rx,
            flush_requests: flush_tx,
            _cancel_on_drop: cancel.clone().drop_guard(),
            cancel,
            task,
        }
    }

    pub fn key(&self) -> &DraftKey {
        &self.key
    }

    /// Publish the latest form snapshot and (re)arm the debounce timer
    pub fn mark_dirty(&self, snapshot: DraftDocument) {
        self.snapshots.send_replace(snapshot);
    }

    pub fn state(&self) -> AutosaveState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<AutosaveState> {
        self.state.clone()
    }

    /// Save the latest snapshot now, skipping the debounce
    pub async fn flush_now(&self) -> bool {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.flush_requests.send(reply_tx).await.is_err() {
            return false;
        }
        reply_rx.await.unwrap_or(false)
    }

    /// Stop the loop, cancelling any pending timer
    ///
    /// With `flush_on_close` an unsaved latest snapshot is written once before
    /// this returns.
    pub async fn close(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(draft_key = %self.key, error = %e, "Autosave task ended abnormally");
        }
    }
}

enum Wake {
    Changed,
    Flush(oneshot::Sender<bool>),
    Stop,
}

enum Debounced {
    Ready(Option<oneshot::Sender<bool>>),
    Stop,
}

struct SaveLoop {
    controller: Arc<DraftController>,
    key: DraftKey,
    settings: AutosaveSettings,
    snapshots: watch::Receiver<DraftDocument>,
    state: watch::Sender<AutosaveState>,
    flush_requests: mpsc::Receiver<oneshot::Sender<bool>>,
    cancel: CancellationToken,
    dirty: bool,
}

impl SaveLoop {
    async fn run(mut self) {
        loop {
            self.state.send_replace(AutosaveState::Idle);

            match self.wait_for_change().await {
                Wake::Stop => break,
                Wake::Flush(reply) => {
                    let saved = self.save().await;
                    let _ = reply.send(saved);
                }
                Wake::Changed => {
                    self.dirty = true;
                    self.state.send_replace(AutosaveState::Dirty);

                    match self.debounce().await {
                        Debounced::Stop => break,
                        Debounced::Ready(reply) => {
                            let saved = self.save().await;
                            if let Some(reply) = reply {
                                let _ = reply.send(saved);
                            }
                        }
                    }
                }
            }
        }

        self.finish().await;
    }

    /// Snapshots are polled before cancellation so a change published just
    /// ahead of teardown is seen as dirty.
    async fn wait_for_change(&mut self) -> Wake {
        tokio::select! {
            biased;
            changed = self.snapshots.changed() => match changed {
                Ok(()) => Wake::Changed,
                Err(_) => Wake::Stop,
            },
            Some(reply) = self.flush_requests.recv() => Wake::Flush(reply),
            _ = self.cancel.cancelled() => Wake::Stop,
        }
    }

    /// Wait until no new snapshot has arrived for one debounce interval
    async fn debounce(&mut self) -> Debounced {
        loop {
            tokio::select! {
                biased;
                changed = self.snapshots.changed() => {
                    if changed.is_err() {
                        return Debounced::Stop;
                    }
                }
                Some(reply) = self.flush_requests.recv() => return Debounced::Ready(Some(reply)),
                _ = self.cancel.cancelled() => return Debounced::Stop,
                _ = tokio::time::sleep(self.settings.debounce) => return Debounced::Ready(None),
            }
        }
    }

    async fn save(&mut self) -> bool {
        self.state.send_replace(AutosaveState::Saving);
        let snapshot = self.snapshots.borrow_and_update().clone();
        self.dirty = false;
        self.controller.flush(&self.key, &snapshot).await
    }

    async fn finish(&mut self) {
        // `Ref::has_changed` still answers once the sender is gone
        let unsaved = self.dirty || self.snapshots.borrow().has_changed();

        if unsaved && self.settings.flush_on_close {
            let saved = self.save().await;
            debug!(draft_key = %self.key, saved, "Final save on close");
        } else if unsaved {
            debug!(draft_key = %self.key, "Closed with unsaved changes");
        }

        self.state.send_replace(AutosaveState::Idle);
        info!(draft_key = %self.key, "Autosave stopped");
    }
}
