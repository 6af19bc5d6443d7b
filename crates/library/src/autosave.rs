use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::LibraryError;
use crate::draft::ContentDraft;
use crate::store::Library;

enum Command {
    Schedule(Box<ContentDraft>),
    Flush(oneshot::Sender<Result<usize, LibraryError>>),
}

/// Debounced draft writer.
///
/// Rapid [`schedule`](Self::schedule) calls for the same draft coalesce into
/// a single write once the draft has been quiet for the debounce period.
/// Pending drafts are written on [`flush`](Self::flush), on
/// [`shutdown`](Self::shutdown) and when the autosaver is dropped. A draft
/// deleted from the library before its write comes due stays deleted.
pub struct DraftAutosaver {
    tx: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl DraftAutosaver {
    /// Spawns the writer task on the current runtime.
    pub fn spawn(library: Arc<Library>, debounce: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(library, debounce, rx));
        Self { tx, task }
    }

    /// Queues `draft` for writing, replacing any pending version of it.
    pub fn schedule(&self, mut draft: ContentDraft) -> Result<(), LibraryError> {
        draft.auto_saved = true;
        self.tx
            .send(Command::Schedule(Box::new(draft)))
            .map_err(|_| LibraryError::AutosaverStopped)
    }

    /// Writes every pending draft now. Returns how many were written.
    pub async fn flush(&self) -> Result<usize, LibraryError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Command::Flush(reply_tx))
            .map_err(|_| LibraryError::AutosaverStopped)?;
        reply_rx.await.map_err(|_| LibraryError::AutosaverStopped)?
    }

    /// Flushes pending drafts and stops the writer task.
    pub async fn shutdown(self) -> Result<usize, LibraryError> {
        let written = self.flush().await;
        drop(self.tx);
        let _ = self.task.await;
        written
    }
}

struct Pending {
    draft: ContentDraft,
    due: Instant,
}

async fn run(library: Arc<Library>, debounce: Duration, mut rx: mpsc::UnboundedReceiver<Command>) {
    let mut pending: HashMap<Uuid, Pending> = HashMap::new();

    loop {
        let next_due = pending.values().map(|p| p.due).min();

        tokio::select! {
            biased;
            _ = sleep_until(next_due) => {
                let now = Instant::now();
                let due: Vec<Uuid> = pending
                    .iter()
                    .filter(|(_, p)| p.due <= now)
                    .map(|(id, _)| *id)
                    .collect();
                for id in due {
                    if let Some(p) = pending.remove(&id)
                        && let Err(e) = library.autosave_draft(p.draft)
                    {
                        warn!(draft = %id, error = %e, "autosave failed");
                    }
                }
            }
            cmd = rx.recv() => match cmd {
                Some(Command::Schedule(draft)) => {
                    let due = Instant::now() + debounce;
                    debug!(draft = %draft.id, "autosave scheduled");
                    pending.insert(draft.id, Pending { draft: *draft, due });
                }
                Some(Command::Flush(reply)) => {
                    let _ = reply.send(write_all(&library, &mut pending));
                }
                None => {
                    if let Err(e) = write_all(&library, &mut pending) {
                        warn!(error = %e, "final autosave flush failed");
                    }
                    break;
                }
            },
        }
    }
}

/// Resolves at `due`, or never when nothing is pending.
async fn sleep_until(due: Option<Instant>) {
    match due {
        Some(due) => tokio::time::sleep_until(due).await,
        None => std::future::pending().await,
    }
}

fn write_all(library: &Library, pending: &mut HashMap<Uuid, Pending>) -> Result<usize, LibraryError> {
    let mut written = 0;
    let mut first_err = None;
    for (_, p) in pending.drain() {
        match library.autosave_draft(p.draft) {
            Ok(Some(_)) => written += 1,
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "autosave failed");
                first_err.get_or_insert(e);
            }
        }
    }
    match first_err {
        Some(e) => Err(e),
        None => Ok(written),
    }
}
