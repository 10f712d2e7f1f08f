use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::{
    sync::{Mutex, broadcast, mpsc, oneshot, watch},
    time::Duration,
};
use tracing::{debug, error, info, warn};

use crate::{
    config::EngineConfig,
    core::{
        entry::{EditQueueEntry, NewEntry},
        retention::normalize,
        schedule::{Step, next_step},
        state::{EditQueueState, QueueStatus},
    },
    engine::{
        coordinator::{ApplyEdits, Deliverer, DeliveryOutcome, Submission},
        traits::PermitInvalidator,
    },
    op::{QueueAction, Transition},
    persist::{PersistError, PersistResult, QueueRepository},
    types::EntryId,
};

use super::events::QueueEvent;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error("edit queue runtime has stopped")]
    ChannelClosed,
}

#[derive(Clone)]
pub struct EditQueueHandle {
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<QueueEvent>,
}

enum Command {
    Enqueue {
        entry: NewEntry,
        resp: oneshot::Sender<Option<EntryId>>,
    },
    AcknowledgeAdd {
        resp: oneshot::Sender<Transition>,
    },
    StartSync {
        resp: oneshot::Sender<Transition>,
    },
    ManualSyncStart {
        id: EntryId,
        resp: oneshot::Sender<Transition>,
    },
    Retry {
        id: EntryId,
        resp: oneshot::Sender<Transition>,
    },
    ResetFromStore {
        resp: oneshot::Sender<Result<Vec<EditQueueEntry>, RuntimeError>>,
    },
    Snapshot {
        resp: oneshot::Sender<EditQueueState>,
    },
    IsStoredQueueIdle {
        resp: oneshot::Sender<Result<bool, RuntimeError>>,
    },
    Shutdown {
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
}

enum Internal {
    DeliveryFinished {
        entry_id: EntryId,
        outcome: DeliveryOutcome,
    },
    Settled {
        generation: u64,
    },
}

enum PersistMsg {
    Save {
        queue: Vec<EditQueueEntry>,
        reload_permits: bool,
    },
    Load {
        resp: oneshot::Sender<PersistResult<Vec<EditQueueEntry>>>,
    },
    IsIdle {
        resp: oneshot::Sender<PersistResult<bool>>,
    },
    Shutdown {
        resp: oneshot::Sender<()>,
    },
}

/// Starts the queue runtime and its persistence worker.
///
/// The queue stays in [`QueueStatus::Loading`] until the first load from
/// `repository` succeeds. If `connectivity` reports connected at startup the
/// runtime behaves as on a connected transition.
pub fn spawn_edit_queue(
    repository: QueueRepository,
    deliverer: Deliverer,
    invalidator: Arc<dyn PermitInvalidator>,
    connectivity: watch::Receiver<bool>,
    config: EngineConfig,
) -> EditQueueHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel::<Command>(config.command_queue_bound.max(1));
    let (events_tx, _) = broadcast::channel::<QueueEvent>(config.event_capacity.max(1));
    let (persist_tx, persist_rx) = mpsc::channel::<PersistMsg>(config.persist_queue_bound.max(1));
    let (internal_tx, internal_rx) = mpsc::unbounded_channel::<Internal>();

    spawn_persistence_worker(repository, invalidator, persist_rx, events_tx.clone());

    let engine = EngineLoop {
        state: EditQueueState::new(),
        coordinator: ApplyEdits::new(),
        deliverer: Arc::new(deliverer),
        persist_tx,
        internal_tx,
        events_tx: events_tx.clone(),
        config,
        connected: false,
        settle_generation: 0,
    };
    tokio::spawn(engine.run(cmd_rx, internal_rx, connectivity));

    EditQueueHandle { cmd_tx, events_tx }
}

impl EditQueueHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.events_tx.subscribe()
    }

    /// Appends a pending entry. Returns `None` while the queue is still
    /// loading.
    pub async fn enqueue(&self, entry: NewEntry) -> Result<Option<EntryId>, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Enqueue { entry, resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    pub async fn acknowledge_add(&self) -> Result<Transition, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::AcknowledgeAdd { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    pub async fn start_sync(&self) -> Result<Transition, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::StartSync { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Delivers a pending entry right away, ahead of queue order. Only valid
    /// while the queue is idle.
    pub async fn manual_sync_start(&self, id: EntryId) -> Result<Transition, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::ManualSyncStart { id, resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    pub async fn retry(&self, id: EntryId) -> Result<Transition, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Retry { id, resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Reloads and normalizes the stored queue, replacing in-memory state.
    pub async fn reset_from_store(&self) -> Result<Vec<EditQueueEntry>, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::ResetFromStore { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    pub async fn snapshot(&self) -> Result<EditQueueState, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Snapshot { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// True when no persisted entry is pending or active. Reflects every
    /// write issued before the call.
    pub async fn is_stored_queue_idle(&self) -> Result<bool, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::IsStoredQueueIdle { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Waits for queued writes, then stops the runtime. A delivery still in
    /// flight is abandoned; its entry is retried after the next load.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Shutdown { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }
}

struct EngineLoop {
    state: EditQueueState,
    coordinator: ApplyEdits,
    deliverer: Arc<Deliverer>,
    persist_tx: mpsc::Sender<PersistMsg>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    events_tx: broadcast::Sender<QueueEvent>,
    config: EngineConfig,
    connected: bool,
    settle_generation: u64,
}

impl EngineLoop {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::Receiver<Command>,
        mut internal_rx: mpsc::UnboundedReceiver<Internal>,
        mut connectivity: watch::Receiver<bool>,
    ) {
        let connected = *connectivity.borrow_and_update();
        if connected {
            self.on_connectivity(true).await;
        } else if let Err(err) = self.reset_from_store().await {
            error!(error = %err, "initial edit queue load failed");
        }

        let mut watching = true;
        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else { break; };
                    if self.handle_command(cmd).await {
                        break;
                    }
                }
                changed = connectivity.changed(), if watching => {
                    if changed.is_err() {
                        watching = false;
                        continue;
                    }
                    let connected = *connectivity.borrow_and_update();
                    self.on_connectivity(connected).await;
                }
                Some(msg) = internal_rx.recv() => {
                    self.handle_internal(msg).await;
                }
            }
        }
    }

    /// Returns true when the loop should stop.
    async fn handle_command(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Enqueue { entry, resp } => {
                let _ = resp.send(self.enqueue(entry).await);
            }
            Command::AcknowledgeAdd { resp } => {
                let _ = resp.send(self.commit(QueueAction::AcknowledgeAdd).await);
            }
            Command::StartSync { resp } => {
                let out = self.start_sync().await;
                let _ = resp.send(out);
                self.advance().await;
            }
            Command::ManualSyncStart { id, resp } => {
                let out = self.commit(QueueAction::ManualStart { id }).await;
                if out.is_applied() {
                    info!(entry_id = %id, "manual sync start");
                    self.emit(QueueEvent::Activated { id });
                }
                let _ = resp.send(out);
                self.advance().await;
            }
            Command::Retry { id, resp } => {
                let out = self.commit(QueueAction::RetryFailed { id }).await;
                if out.is_applied() {
                    self.emit(QueueEvent::Retried { id });
                }
                let _ = resp.send(out);
                self.advance().await;
            }
            Command::ResetFromStore { resp } => {
                let _ = resp.send(self.reset_from_store().await);
            }
            Command::Snapshot { resp } => {
                let _ = resp.send(self.state.clone());
            }
            Command::IsStoredQueueIdle { resp } => {
                let (tx, rx) = oneshot::channel();
                let out = if self.persist_tx.send(PersistMsg::IsIdle { resp: tx }).await.is_err() {
                    Err(RuntimeError::ChannelClosed)
                } else {
                    rx.await
                        .map_err(|_| RuntimeError::ChannelClosed)
                        .and_then(|r| r.map_err(RuntimeError::from))
                };
                let _ = resp.send(out);
            }
            Command::Shutdown { resp } => {
                let (done_tx, done_rx) = oneshot::channel();
                let out = if self
                    .persist_tx
                    .send(PersistMsg::Shutdown { resp: done_tx })
                    .await
                    .is_err()
                {
                    Err(RuntimeError::ChannelClosed)
                } else {
                    done_rx.await.map_err(|_| RuntimeError::ChannelClosed)
                };
                let _ = resp.send(out);
                return true;
            }
        }

        false
    }

    async fn handle_internal(&mut self, msg: Internal) {
        match msg {
            Internal::DeliveryFinished { entry_id, outcome } => {
                self.on_delivery_finished(entry_id, outcome).await;
            }
            Internal::Settled { generation } => {
                if generation != self.settle_generation || !self.connected {
                    debug!(generation, "stale settle timer");
                    return;
                }
                if self.coordinator.is_loading() {
                    debug!(
                        loading = ?self.coordinator.loading_entry(),
                        "delivery in flight; keeping coordinator state"
                    );
                } else {
                    self.coordinator.reset();
                }
                self.start_sync().await;
                self.advance().await;
            }
        }
    }

    async fn enqueue(&mut self, entry: NewEntry) -> Option<EntryId> {
        if self.state.status == QueueStatus::Loading {
            debug!("queue still loading; enqueue ignored");
            return None;
        }
        let entry = entry.into_entry();
        let id = entry.id;
        if !self.commit(QueueAction::Enqueue { entry }).await.is_applied() {
            return None;
        }
        info!(entry_id = %id, "entry enqueued");
        self.emit(QueueEvent::Enqueued { id });

        if self.state.status == QueueStatus::Idle && self.connected {
            self.start_sync().await;
        }
        self.advance().await;
        Some(id)
    }

    async fn start_sync(&mut self) -> Transition {
        let out = self.commit(QueueAction::StartSync).await;
        if out.is_applied() {
            self.emit(QueueEvent::SyncStarted);
        }
        out
    }

    async fn on_connectivity(&mut self, connected: bool) {
        if connected == self.connected {
            return;
        }
        self.connected = connected;
        info!(connected, "connectivity changed");
        self.emit(QueueEvent::ConnectivityChanged { connected });
        if !connected {
            return;
        }

        if let Err(err) = self.reset_from_store().await {
            error!(error = %err, "edit queue reload on reconnect failed");
        }

        // Reachability is sometimes reported before data can flow.
        self.settle_generation += 1;
        let generation = self.settle_generation;
        let delay = Duration::from_millis(self.config.settle_delay_ms);
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Internal::Settled { generation });
        });
    }

    async fn on_delivery_finished(&mut self, entry_id: EntryId, outcome: DeliveryOutcome) {
        if !self
            .coordinator
            .complete(entry_id, outcome.clone())
            .is_applied()
        {
            debug!(entry_id = %entry_id, "outcome for a delivery that is no longer loading");
            return;
        }

        let is_active = self
            .state
            .active_entry()
            .is_some_and(|entry| entry.id == entry_id);
        if is_active {
            match outcome {
                Ok(()) => self.mark_delivered(entry_id).await,
                Err(failure) if failure.is_already_processed() => {
                    info!(entry_id = %entry_id, "request already processed; treating as delivered");
                    self.mark_delivered(entry_id).await;
                }
                Err(failure) => {
                    let message = failure.message;
                    if self
                        .commit(QueueAction::SyncError {
                            id: entry_id,
                            message: message.clone(),
                        })
                        .await
                        .is_applied()
                    {
                        warn!(entry_id = %entry_id, code = ?failure.code, "entry failed");
                        self.emit(QueueEvent::Failed {
                            id: entry_id,
                            message,
                        });
                    }
                }
            }
        } else {
            warn!(entry_id = %entry_id, "discarding outcome for an entry that is no longer active");
        }

        self.coordinator.reset();
        self.advance().await;
    }

    async fn mark_delivered(&mut self, id: EntryId) {
        if self.commit(QueueAction::SyncSuccess { id }).await.is_applied() {
            info!(entry_id = %id, "entry delivered");
            self.emit(QueueEvent::Succeeded { id });
        }
    }

    /// Runs scheduling steps until the queue waits on an external input.
    async fn advance(&mut self) {
        loop {
            match next_step(&self.state) {
                Step::Start(id) => {
                    if !self.commit(QueueAction::SyncStart { id }).await.is_applied() {
                        break;
                    }
                    self.emit(QueueEvent::Activated { id });
                }
                Step::Deliver(id) => {
                    self.dispatch(id);
                    break;
                }
                Step::Finish => {
                    if !self.commit(QueueAction::SyncFinished).await.is_applied() {
                        break;
                    }
                    self.emit(QueueEvent::SyncFinished);
                }
                Step::Recover => {
                    warn!("queue active without an active entry; reloading");
                    if let Err(err) = self.reset_from_store().await {
                        error!(error = %err, "edit queue reload failed");
                    }
                    break;
                }
                Step::Wait => break,
            }
        }
    }

    fn dispatch(&mut self, id: EntryId) {
        let Some(entry) = self.state.entry(id) else {
            return;
        };
        let submission = Submission {
            entry_id: id,
            edits: entry.edits.clone(),
            photo: entry.photo.clone(),
        };
        if !self.coordinator.submit(submission.clone()).is_applied() {
            debug!(
                entry_id = %id,
                loading = ?self.coordinator.loading_entry(),
                "delivery already in flight"
            );
            return;
        }

        let deliverer = Arc::clone(&self.deliverer);
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let outcome = deliverer.deliver(&submission).await;
            let _ = tx.send(Internal::DeliveryFinished {
                entry_id: submission.entry_id,
                outcome,
            });
        });
    }

    async fn reset_from_store(&mut self) -> Result<Vec<EditQueueEntry>, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.persist_tx
            .send(PersistMsg::Load { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        let loaded = rx.await.map_err(|_| RuntimeError::ChannelClosed)??;

        let queue = normalize(loaded, Utc::now(), self.config.retention_days);
        self.commit(QueueAction::Reset {
            queue: queue.clone(),
        })
        .await;
        info!(entries = queue.len(), "edit queue reset from storage");
        self.emit(QueueEvent::Reset {
            entries: queue.len(),
        });
        Ok(queue)
    }

    /// Applies `action` and, if it changed a non-empty queue, queues a full
    /// write.
    async fn commit(&mut self, action: QueueAction) -> Transition {
        let changes_queue = action.changes_queue();
        let out = self.state.apply(action);
        if out.is_applied() && changes_queue && !self.state.queue.is_empty() {
            let msg = PersistMsg::Save {
                queue: self.state.queue.clone(),
                reload_permits: self.state.take_reload_permits(),
            };
            if self.persist_tx.send(msg).await.is_err() {
                error!("persistence worker stopped; queue not saved");
            }
        }
        out
    }

    fn emit(&self, event: QueueEvent) {
        let _ = self.events_tx.send(event);
    }
}

fn spawn_persistence_worker(
    repository: QueueRepository,
    invalidator: Arc<dyn PermitInvalidator>,
    mut rx: mpsc::Receiver<PersistMsg>,
    events_tx: broadcast::Sender<QueueEvent>,
) {
    let repository = Arc::new(Mutex::new(repository));
    tokio::spawn(async move {
        let mut deferred: Option<PersistMsg> = None;

        loop {
            let msg = match deferred.take() {
                Some(msg) => msg,
                None => match rx.recv().await {
                    Some(msg) => msg,
                    None => break,
                },
            };

            match msg {
                PersistMsg::Save {
                    mut queue,
                    mut reload_permits,
                } => {
                    // Every save carries the whole queue, so only the newest
                    // of a backlog needs writing.
                    while let Ok(next) = rx.try_recv() {
                        match next {
                            PersistMsg::Save {
                                queue: newer,
                                reload_permits: reload,
                            } => {
                                queue = newer;
                                reload_permits |= reload;
                            }
                            other => {
                                deferred = Some(other);
                                break;
                            }
                        }
                    }

                    let entries = queue.len();
                    match with_repository(&repository, move |repo| repo.save(&queue)).await {
                        Ok(()) => {
                            let _ = events_tx.send(QueueEvent::Persisted { entries });
                        }
                        Err(err) => {
                            error!(error = %err, "failed to persist edit queue");
                            let _ = events_tx.send(QueueEvent::PersistFailed {
                                message: err.to_string(),
                            });
                        }
                    }

                    if reload_permits {
                        info!("invalidating permits");
                        invalidator.invalidate_permits();
                        let _ = events_tx.send(QueueEvent::PermitsInvalidated);
                    }
                }
                PersistMsg::Load { resp } => {
                    let _ = resp.send(with_repository(&repository, |repo| repo.load()).await);
                }
                PersistMsg::IsIdle { resp } => {
                    let _ = resp.send(
                        with_repository(&repository, |repo| repo.is_stored_queue_idle()).await,
                    );
                }
                PersistMsg::Shutdown { resp } => {
                    let _ = resp.send(());
                    break;
                }
            }
        }
    });
}

async fn with_repository<T, F>(repository: &Arc<Mutex<QueueRepository>>, f: F) -> PersistResult<T>
where
    T: Send + 'static,
    F: FnOnce(&mut QueueRepository) -> PersistResult<T> + Send + 'static,
{
    let repo = Arc::clone(repository);
    tokio::task::spawn_blocking(move || {
        let mut repo = repo.blocking_lock();
        f(&mut repo)
    })
    .await
    .map_err(|e| PersistError::Message(format!("join error: {e}")))?
}
