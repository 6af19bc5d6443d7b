//! Upload orchestrator.
//!
//! One actor task owns the [`UploadQueue`] and is the only writer of queue
//! state, history and statistics. Callers talk to it through a cloneable
//! [`UploaderHandle`]. Each admitted upload runs in an attempt task that
//! performs the network and disk work and reports results back; the actor
//! turns those results into reducer actions.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use fanvault_library::{
    DraftAutosaver, HistoryStatus, Library, UploadHistoryItem, UploadStatistics,
};
use fanvault_protocol::{ContentMetadata, MediaFile, UploadId};
use fanvault_transfer::{
    CompletionResult, JsonFileSessionStore, SessionStore, TransferError, TransferProgress,
    UploadSession, UploadSessionManager, UploadTransport,
};
use fanvault_upload_queue::{
    Priority, Transition, TransitionKind, UploadAction, UploadProgress, UploadQueue,
    UploadQueueItem,
};

use crate::config::UploaderConfig;
use crate::error::UploaderError;
use crate::events::UploadEvent;
use crate::validation::validate_upload;

const COMMAND_CAPACITY: usize = 64;
const EVENT_CAPACITY: usize = 256;

type Reply<T> = oneshot::Sender<Result<T, UploaderError>>;

enum Command {
    Add {
        item: Box<UploadQueueItem>,
        reply: Reply<UploadProgress>,
    },
    Cancel {
        upload_id: UploadId,
        reply: Reply<UploadProgress>,
    },
    Retry {
        upload_id: UploadId,
        reply: Reply<UploadProgress>,
    },
    Dismiss {
        upload_id: UploadId,
        reply: Reply<UploadProgress>,
    },
    SetMaxConcurrent {
        limit: usize,
        reply: oneshot::Sender<usize>,
    },
    Get {
        upload_id: UploadId,
        reply: oneshot::Sender<Option<UploadProgress>>,
    },
    Snapshot {
        reply: oneshot::Sender<Vec<UploadProgress>>,
    },
    UpdateHistoryMetadata {
        upload_id: UploadId,
        metadata: Box<ContentMetadata>,
        reply: Reply<UploadHistoryItem>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable entry point to a running uploader.
#[derive(Clone)]
pub struct UploaderHandle {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<UploadEvent>,
    library: Arc<Library>,
    sessions: Arc<UploadSessionManager>,
    config: Arc<UploaderConfig>,
}

impl UploaderHandle {
    /// Opens the stores under `config.data_dir` and starts the uploader.
    ///
    /// Drafts, history and statistics are loaded before any upload can be
    /// admitted.
    pub fn open(
        config: UploaderConfig,
        transport: Arc<dyn UploadTransport>,
    ) -> Result<Self, UploaderError> {
        config.validate()?;
        let store = Arc::new(JsonFileSessionStore::new(config.sessions_dir()));
        let library = Arc::new(Library::open(
            config.data_dir.clone(),
            config.storage_quota_bytes,
        )?);
        Ok(Self::spawn(config, transport, store, library))
    }

    /// Starts the uploader actor on the current runtime.
    pub fn spawn(
        config: UploaderConfig,
        transport: Arc<dyn UploadTransport>,
        store: Arc<dyn SessionStore>,
        library: Arc<Library>,
    ) -> Self {
        let config = Arc::new(config);
        let sessions = Arc::new(UploadSessionManager::new(
            transport,
            store,
            config.session_config(),
        ));
        let (commands, commands_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (reports_tx, reports_rx) = mpsc::unbounded_channel();

        let actor = Actor {
            queue: UploadQueue::new(config.max_concurrent_uploads),
            library: Arc::clone(&library),
            sessions: Arc::clone(&sessions),
            config: Arc::clone(&config),
            events: events.clone(),
            reports_tx,
            attempts: HashMap::new(),
            teardowns: Vec::new(),
            next_attempt: 0,
            shutdown: CancellationToken::new(),
        };
        tokio::spawn(actor.run(commands_rx, reports_rx));

        info!(
            max_concurrent = config.max_concurrent_uploads,
            max_retries = config.max_retries,
            "uploader started"
        );

        Self {
            commands,
            events,
            library,
            sessions,
            config,
        }
    }

    /// Validates and queues a new upload.
    ///
    /// Invalid requests are refused here with
    /// [`UploaderError::Validation`]; nothing is sent to the server.
    pub async fn add_upload(
        &self,
        media: MediaFile,
        metadata: ContentMetadata,
        priority: Priority,
    ) -> Result<UploadProgress, UploaderError> {
        self.enqueue(UploadId::new(), media, metadata, priority).await
    }

    /// Queues an upload under an existing id, resuming its persisted
    /// session if one is still valid.
    pub async fn resume_upload(
        &self,
        upload_id: UploadId,
        media: MediaFile,
        metadata: ContentMetadata,
        priority: Priority,
    ) -> Result<UploadProgress, UploaderError> {
        self.enqueue(upload_id, media, metadata, priority).await
    }

    /// Queues a saved draft and deletes it once queued.
    pub async fn submit_draft(
        &self,
        draft_id: Uuid,
        priority: Priority,
    ) -> Result<UploadProgress, UploaderError> {
        let draft = self
            .library
            .draft(draft_id)
            .ok_or(UploaderError::DraftNotFound(draft_id))?;
        let queued = self
            .add_upload(draft.media, draft.metadata, priority)
            .await?;
        self.library.delete_draft(draft_id)?;
        Ok(queued)
    }

    async fn enqueue(
        &self,
        upload_id: UploadId,
        media: MediaFile,
        metadata: ContentMetadata,
        priority: Priority,
    ) -> Result<UploadProgress, UploaderError> {
        let report = validate_upload(&media, &metadata, &self.config);
        if !report.is_valid {
            warn!(file = %media.name, errors = %report, "upload refused");
            return Err(UploaderError::Validation(report));
        }

        let item = UploadQueueItem::with_id(
            upload_id,
            media,
            metadata,
            priority,
            self.config.max_retries,
            Utc::now(),
        );
        self.request(|reply| Command::Add {
            item: Box::new(item),
            reply,
        })
        .await?
    }

    /// Cancels a queued or running upload and tears down its session.
    pub async fn cancel(&self, upload_id: UploadId) -> Result<UploadProgress, UploaderError> {
        self.request(|reply| Command::Cancel { upload_id, reply })
            .await?
    }

    /// Re-queues a failed upload. Already acknowledged chunks are kept.
    pub async fn retry(&self, upload_id: UploadId) -> Result<UploadProgress, UploaderError> {
        self.request(|reply| Command::Retry { upload_id, reply })
            .await?
    }

    /// Removes a failed upload and tears down its session.
    pub async fn dismiss(&self, upload_id: UploadId) -> Result<UploadProgress, UploaderError> {
        self.request(|reply| Command::Dismiss { upload_id, reply })
            .await?
    }

    /// Changes the admission limit (minimum 1). Returns the applied limit.
    pub async fn set_max_concurrent(&self, limit: usize) -> Result<usize, UploaderError> {
        self.request(|reply| Command::SetMaxConcurrent { limit, reply })
            .await
    }

    pub async fn get(&self, upload_id: UploadId) -> Result<Option<UploadProgress>, UploaderError> {
        self.request(|reply| Command::Get { upload_id, reply }).await
    }

    /// Every live upload in scheduling order.
    pub async fn snapshot(&self) -> Result<Vec<UploadProgress>, UploaderError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Edits the metadata of a completed upload in history.
    pub async fn update_history_metadata(
        &self,
        upload_id: UploadId,
        metadata: ContentMetadata,
    ) -> Result<UploadHistoryItem, UploaderError> {
        self.request(|reply| Command::UpdateHistoryMetadata {
            upload_id,
            metadata: Box::new(metadata),
            reply,
        })
        .await?
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UploadEvent> {
        self.events.subscribe()
    }

    pub fn history(&self) -> Vec<UploadHistoryItem> {
        self.library.history()
    }

    pub fn statistics(&self) -> UploadStatistics {
        self.library.statistics()
    }

    pub fn library(&self) -> &Arc<Library> {
        &self.library
    }

    /// Starts a debounced draft writer bound to this uploader's library.
    pub fn autosaver(&self) -> DraftAutosaver {
        DraftAutosaver::spawn(Arc::clone(&self.library), self.config.autosave_debounce())
    }

    /// Persisted sessions that can still be resumed.
    pub fn recoverable_sessions(&self) -> Result<Vec<UploadSession>, UploaderError> {
        Ok(self.sessions.recoverable_sessions()?)
    }

    pub fn config(&self) -> &UploaderConfig {
        &self.config
    }

    /// Stops every attempt and the actor.
    ///
    /// Session records are kept so interrupted uploads can be resumed.
    /// Waits for running attempts and pending teardowns to finish.
    pub async fn shutdown(&self) -> Result<(), UploaderError> {
        self.request(|reply| Command::Shutdown { reply }).await
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, UploaderError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| UploaderError::Stopped)?;
        rx.await.map_err(|_| UploaderError::Stopped)
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

struct Report {
    upload_id: UploadId,
    attempt: u64,
    outcome: Outcome,
}

enum Outcome {
    SessionReady { uploaded_bytes: u64 },
    Progress(TransferProgress),
    TransferFinished,
    Completed(Box<CompletionResult>),
    Failed { error: String, retryable: bool },
}

struct Attempt {
    id: u64,
    stop: CancellationToken,
    task: JoinHandle<()>,
}

struct Actor {
    queue: UploadQueue,
    library: Arc<Library>,
    sessions: Arc<UploadSessionManager>,
    config: Arc<UploaderConfig>,
    events: broadcast::Sender<UploadEvent>,
    reports_tx: mpsc::UnboundedSender<Report>,
    attempts: HashMap<UploadId, Attempt>,
    teardowns: Vec<JoinHandle<()>>,
    next_attempt: u64,
    shutdown: CancellationToken,
}

impl Actor {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut reports: mpsc::UnboundedReceiver<Report>,
    ) {
        loop {
            tokio::select! {
                Some(report) = reports.recv() => self.on_report(report).await,
                cmd = commands.recv() => match cmd {
                    Some(Command::Shutdown { reply }) => {
                        self.stop().await;
                        let _ = reply.send(());
                        break;
                    }
                    Some(cmd) => self.on_command(cmd).await,
                    None => {
                        self.stop().await;
                        break;
                    }
                },
            }
            self.admit_pending();
        }
        debug!("uploader stopped");
    }

    async fn on_command(&mut self, cmd: Command) {
        match cmd {
            Command::Add { item, reply } => {
                let result = self.add(*item);
                let _ = reply.send(result);
            }
            Command::Cancel { upload_id, reply } => {
                let _ = reply.send(self.cancel(upload_id).await);
            }
            Command::Retry { upload_id, reply } => {
                let result = self
                    .queue
                    .apply(UploadAction::Retry { upload_id })
                    .map_err(UploaderError::from)
                    .map(|t| {
                        info!(upload_id = %upload_id, attempt = t.item.manual_retries, "manual retry");
                        self.emit(UploadEvent::from_transition(t.clone()));
                        t.item
                    });
                // Report the state after admission.
                self.admit_pending();
                let _ = reply.send(result.map(|item| self.current(item)));
            }
            Command::Dismiss { upload_id, reply } => {
                let result = self
                    .queue
                    .apply(UploadAction::Dismiss { upload_id })
                    .map_err(UploaderError::from)
                    .map(|t| {
                        self.teardown(upload_id, None);
                        self.emit(UploadEvent::from_transition(t.clone()));
                        t.item
                    });
                let _ = reply.send(result);
            }
            Command::SetMaxConcurrent { limit, reply } => {
                let applied = self.queue.set_max_concurrent(limit);
                info!(limit = applied, "admission limit changed");
                let _ = reply.send(applied);
            }
            Command::Get { upload_id, reply } => {
                let _ = reply.send(self.queue.get(upload_id).cloned());
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.queue.snapshot());
            }
            Command::UpdateHistoryMetadata {
                upload_id,
                metadata,
                reply,
            } => {
                let library = Arc::clone(&self.library);
                let result = tokio::task::spawn_blocking(move || {
                    library.update_history_metadata(upload_id, *metadata)
                })
                .await;
                let _ = reply.send(match result {
                    Ok(updated) => updated.map_err(UploaderError::from),
                    Err(e) => Err(UploaderError::Io(std::io::Error::other(format!(
                        "task join error: {e}"
                    )))),
                });
            }
            // Handled by the run loop.
            Command::Shutdown { .. } => {}
        }
    }

    fn add(&mut self, item: UploadQueueItem) -> Result<UploadProgress, UploaderError> {
        let t = self.queue.apply(UploadAction::Enqueue { item })?;
        info!(
            upload_id = %t.upload_id,
            file = %t.item.media.name,
            size = t.item.total_bytes,
            "upload queued"
        );
        let upload_id = t.upload_id;
        self.emit(UploadEvent::from_transition(t.clone()));
        self.admit_pending();
        Ok(self.queue.get(upload_id).cloned().unwrap_or(t.item))
    }

    async fn cancel(&mut self, upload_id: UploadId) -> Result<UploadProgress, UploaderError> {
        let t = self.queue.apply(UploadAction::Cancel { upload_id })?;
        info!(upload_id = %upload_id, from = ?t.from, "upload cancelled");

        let running = self.attempts.remove(&upload_id).map(|a| {
            a.stop.cancel();
            a.task
        });
        self.teardown(upload_id, running);

        self.record(&t.item, HistoryStatus::Cancelled, None, Utc::now())
            .await;
        self.emit(UploadEvent::from_transition(t.clone()));
        Ok(t.item)
    }

    async fn on_report(&mut self, report: Report) {
        let Report {
            upload_id,
            attempt,
            outcome,
        } = report;
        if self
            .attempts
            .get(&upload_id)
            .is_none_or(|a| a.id != attempt)
        {
            debug!(upload_id = %upload_id, attempt, "ignoring report from a stale attempt");
            return;
        }

        match outcome {
            Outcome::SessionReady { uploaded_bytes } => {
                self.dispatch(UploadAction::SessionReady {
                    upload_id,
                    uploaded_bytes,
                });
            }
            Outcome::Progress(p) => {
                self.dispatch(UploadAction::Progress {
                    upload_id,
                    uploaded_bytes: p.uploaded_bytes,
                    bytes_per_second: p.bytes_per_second,
                    eta: p.eta,
                });
            }
            Outcome::TransferFinished => {
                self.dispatch(UploadAction::TransferFinished { upload_id });
            }
            Outcome::Completed(result) => {
                self.attempts.remove(&upload_id);
                let at = Utc::now();
                match self.queue.apply(UploadAction::Completed { upload_id, at }) {
                    Ok(t) => {
                        self.record(
                            &t.item,
                            HistoryStatus::Completed,
                            result.content_id.clone(),
                            at,
                        )
                        .await;
                        self.emit(UploadEvent::Completed {
                            item: t.item,
                            content_id: result.content_id,
                        });
                    }
                    Err(e) => warn!(upload_id = %upload_id, error = %e, "completion rejected"),
                }
            }
            Outcome::Failed { error, retryable } => {
                let action = UploadAction::AttemptFailed {
                    upload_id,
                    error,
                    retryable,
                };
                match self.queue.apply(action) {
                    Ok(t) if t.kind == TransitionKind::Retrying => {
                        let delay = self.config.retry.delay_for_attempt(t.item.retry_count);
                        warn!(
                            upload_id = %upload_id,
                            attempt = t.item.retry_count,
                            max_retries = t.item.max_retries,
                            delay_ms = delay.as_millis() as u64,
                            error = ?t.item.error,
                            "upload attempt failed, retrying"
                        );
                        self.start_attempt(upload_id, delay);
                        self.emit(UploadEvent::Retrying {
                            item: t.item,
                            delay,
                        });
                    }
                    Ok(t) => {
                        self.attempts.remove(&upload_id);
                        error!(
                            upload_id = %upload_id,
                            retries = t.item.retry_count,
                            error = ?t.item.error,
                            "upload failed"
                        );
                        self.record(&t.item, HistoryStatus::Failed, None, Utc::now())
                            .await;
                        self.emit(UploadEvent::from_transition(t));
                    }
                    Err(e) => warn!(upload_id = %upload_id, error = %e, "failure report rejected"),
                }
            }
        }
    }

    /// Admits pending uploads while slots are free.
    fn admit_pending(&mut self) {
        while let Some(upload_id) = self.queue.next_admissible() {
            let admit = UploadAction::Admit {
                upload_id,
                at: Utc::now(),
            };
            if self.dispatch(admit).is_none() {
                break;
            }
            debug!(upload_id = %upload_id, active = self.queue.active_count(), "upload admitted");
            self.start_attempt(upload_id, Duration::ZERO);
        }
    }

    fn start_attempt(&mut self, upload_id: UploadId, delay: Duration) {
        let Some(item) = self.queue.get(upload_id) else {
            return;
        };
        self.next_attempt += 1;
        let stop = self.shutdown.child_token();
        let ctx = AttemptContext {
            upload_id,
            attempt: self.next_attempt,
            media: item.media.clone(),
            metadata: item.metadata.clone(),
            sessions: Arc::clone(&self.sessions),
            reports: self.reports_tx.clone(),
            stop: stop.clone(),
        };
        let task = tokio::spawn(ctx.run(delay));
        self.attempts.insert(
            upload_id,
            Attempt {
                id: self.next_attempt,
                stop,
                task,
            },
        );
    }

    /// Tears down the session of `upload_id` once `running` (its stopped
    /// attempt, if any) has finished, so no persist can follow the delete.
    fn teardown(&mut self, upload_id: UploadId, running: Option<JoinHandle<()>>) {
        let sessions = Arc::clone(&self.sessions);
        self.teardowns.retain(|t| !t.is_finished());
        self.teardowns.push(tokio::spawn(async move {
            if let Some(task) = running {
                let _ = task.await;
            }
            if let Err(e) = sessions.cancel(upload_id).await {
                warn!(upload_id = %upload_id, error = %e, "session teardown failed");
            }
        }));
    }

    fn dispatch(&mut self, action: UploadAction) -> Option<Transition> {
        match self.queue.apply(action) {
            Ok(t) => {
                self.emit(UploadEvent::from_transition(t.clone()));
                Some(t)
            }
            Err(e) => {
                warn!(error = %e, "upload action rejected");
                None
            }
        }
    }

    /// Appends the outcome to history on the blocking pool. Finishes before
    /// the caller emits the final event.
    async fn record(
        &self,
        item: &UploadProgress,
        status: HistoryStatus,
        content_id: Option<String>,
        at: DateTime<Utc>,
    ) {
        let entry = history_entry(item, status, content_id, at);
        let library = Arc::clone(&self.library);
        match tokio::task::spawn_blocking(move || library.record_outcome(entry)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                error!(upload_id = %item.upload_id, error = %e, "failed to record upload outcome");
            }
            Err(e) => {
                error!(upload_id = %item.upload_id, error = %e, "history writer task failed");
            }
        }
    }

    fn emit(&self, event: UploadEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Latest state of `item` if it is still queued.
    fn current(&self, item: UploadProgress) -> UploadProgress {
        self.queue.get(item.upload_id).cloned().unwrap_or(item)
    }

    async fn stop(&mut self) {
        self.shutdown.cancel();
        let running: Vec<_> = self.attempts.drain().map(|(_, a)| a.task).collect();
        for task in running.into_iter().chain(self.teardowns.drain(..)) {
            let _ = task.await;
        }
    }
}

fn history_entry(
    item: &UploadProgress,
    status: HistoryStatus,
    content_id: Option<String>,
    at: DateTime<Utc>,
) -> UploadHistoryItem {
    let started = item.started_at.unwrap_or(item.created_at);
    UploadHistoryItem {
        upload_id: item.upload_id,
        content_id,
        file_name: item.media.name.clone(),
        metadata: item.metadata.clone(),
        status,
        uploaded_at: at,
        processing_time_ms: (at - started).num_milliseconds().max(0) as u64,
        file_size: item.total_bytes,
        error: item.error.clone(),
    }
}

// ---------------------------------------------------------------------------
// Attempt
// ---------------------------------------------------------------------------

/// Everything one attempt task needs; reports flow back to the actor.
struct AttemptContext {
    upload_id: UploadId,
    attempt: u64,
    media: MediaFile,
    metadata: ContentMetadata,
    sessions: Arc<UploadSessionManager>,
    reports: mpsc::UnboundedSender<Report>,
    stop: CancellationToken,
}

impl AttemptContext {
    async fn run(self, delay: Duration) {
        if !delay.is_zero() {
            tokio::select! {
                biased;
                _ = self.stop.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        match self.drive().await {
            Ok(result) => self.report(Outcome::Completed(Box::new(result))),
            Err(_) if self.stop.is_cancelled() => {
                debug!(upload_id = %self.upload_id, "attempt stopped");
            }
            Err(e) => self.report(Outcome::Failed {
                error: e.to_string(),
                retryable: e.is_retryable(),
            }),
        }
    }

    async fn drive(&self) -> Result<CompletionResult, TransferError> {
        let session = self
            .sessions
            .resume_or_start(self.upload_id, &self.media, &self.metadata)
            .await?;
        self.check_stopped()?;
        self.report(Outcome::SessionReady {
            uploaded_bytes: session.uploaded_bytes(),
        });

        self.sessions
            .transfer(self.upload_id, &self.media, &self.stop, |p| {
                self.report(Outcome::Progress(p))
            })
            .await?;
        self.check_stopped()?;
        self.report(Outcome::TransferFinished);

        self.sessions
            .complete(self.upload_id, &self.media, &self.metadata)
            .await
    }

    fn check_stopped(&self) -> Result<(), TransferError> {
        if self.stop.is_cancelled() {
            Err(TransferError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn report(&self, outcome: Outcome) {
        // The actor is gone only after shutdown.
        let _ = self.reports.send(Report {
            upload_id: self.upload_id,
            attempt: self.attempt,
            outcome,
        });
    }
}
