//! Background subtree propagation worker.
//!
//! One worker thread drains a job queue. A job walks the subtree under its
//! root depth-first and flips every descendant still in the opposite state.
//! Failures on one node are logged and counted; the walk continues with the
//! remaining reachable nodes. A panicking job is contained and the worker
//! keeps serving the queue.

use crate::db::{lock, SharedConnection};
use crate::model::document::{DocumentId, UserId};
use crate::repo::document_repo::{DocumentRepoResult, DocumentRepository, SqliteDocumentRepository};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const WORKER_THREAD_NAME: &str = "pagetree-propagation";

/// Target state pushed down the subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropagationDirection {
    Archive,
    Restore,
}

impl PropagationDirection {
    /// Archived flag descendants must end up with.
    pub fn target_archived(self) -> bool {
        matches!(self, Self::Archive)
    }

    pub fn from_archived(archived: bool) -> Self {
        if archived {
            Self::Archive
        } else {
            Self::Restore
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Archive => "archive",
            Self::Restore => "restore",
        }
    }
}

/// One queued subtree walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropagationJob {
    /// Document whose descendants are updated. The root itself is not touched.
    pub root_id: DocumentId,
    /// Owner scope for every child lookup.
    pub owner_id: UserId,
    pub direction: PropagationDirection,
}

/// Errors from submitting work to the propagation worker.
#[derive(Debug)]
pub enum PropagationError {
    /// Worker thread could not be started.
    Spawn(std::io::Error),
    /// Worker is gone; the job was dropped.
    QueueClosed(DocumentId),
}

impl Display for PropagationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Spawn(err) => write!(f, "failed to start propagation worker: {err}"),
            Self::QueueClosed(id) => {
                write!(f, "propagation queue closed; dropped job for document {id}")
            }
        }
    }
}

impl Error for PropagationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Spawn(err) => Some(err),
            Self::QueueClosed(_) => None,
        }
    }
}

/// Snapshot of worker counters since start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PropagationStats {
    pub jobs_completed: u64,
    pub nodes_updated: u64,
    pub node_failures: u64,
    pub jobs_panicked: u64,
}

#[derive(Default)]
struct Counters {
    jobs_completed: AtomicU64,
    nodes_updated: AtomicU64,
    node_failures: AtomicU64,
    jobs_panicked: AtomicU64,
}

#[derive(Default)]
struct QueueState {
    pending: Mutex<usize>,
    drained: Condvar,
    counters: Counters,
}

impl QueueState {
    fn begin(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(|err| err.into_inner());
        *pending += 1;
    }

    fn finish(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(|err| err.into_inner());
        *pending = pending.saturating_sub(1);
        if *pending == 0 {
            self.drained.notify_all();
        }
    }
}

/// Owner of the propagation thread and its queue.
///
/// Dropping the worker closes the queue and joins the thread after already
/// queued jobs have run.
pub struct PropagationWorker {
    sender: Option<Sender<PropagationJob>>,
    handle: Option<JoinHandle<()>>,
    state: Arc<QueueState>,
}

impl PropagationWorker {
    /// Starts the worker thread over a shared, migrated connection.
    pub fn spawn(conn: SharedConnection) -> Result<Self, PropagationError> {
        let (sender, receiver) = mpsc::channel();
        let state = Arc::new(QueueState::default());
        let worker_state = Arc::clone(&state);
        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || run_worker(conn, receiver, worker_state))
            .map_err(PropagationError::Spawn)?;

        info!("event=propagation_worker module=tree status=ok action=spawn");
        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
            state,
        })
    }

    /// Queues one subtree walk. Never blocks on the walk itself.
    pub fn enqueue(&self, job: PropagationJob) -> Result<(), PropagationError> {
        let root_id = job.root_id;
        let sender = self
            .sender
            .as_ref()
            .ok_or(PropagationError::QueueClosed(root_id))?;

        self.state.begin();
        if sender.send(job).is_err() {
            self.state.finish();
            return Err(PropagationError::QueueClosed(root_id));
        }
        Ok(())
    }

    /// Blocks until every queued job has finished or `timeout` elapses.
    ///
    /// Returns `true` when the queue drained in time.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let pending = self.state.pending.lock().unwrap_or_else(|err| err.into_inner());
        match self
            .state
            .drained
            .wait_timeout_while(pending, timeout, |pending| *pending > 0)
        {
            Ok((pending, _)) => *pending == 0,
            Err(poisoned) => *poisoned.into_inner().0 == 0,
        }
    }

    pub fn stats(&self) -> PropagationStats {
        let counters = &self.state.counters;
        PropagationStats {
            jobs_completed: counters.jobs_completed.load(Ordering::Relaxed),
            nodes_updated: counters.nodes_updated.load(Ordering::Relaxed),
            node_failures: counters.node_failures.load(Ordering::Relaxed),
            jobs_panicked: counters.jobs_panicked.load(Ordering::Relaxed),
        }
    }
}

impl Drop for PropagationWorker {
    fn drop(&mut self) {
        drop(self.sender.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!(
                    "event=propagation_worker module=tree status=error action=join error_code=worker_panicked"
                );
            }
        }
    }
}

fn run_worker(conn: SharedConnection, receiver: Receiver<PropagationJob>, state: Arc<QueueState>) {
    while let Ok(job) = receiver.recv() {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            propagate_subtree(&conn, &job, &state.counters)
        }));
        if outcome.is_err() {
            state.counters.jobs_panicked.fetch_add(1, Ordering::Relaxed);
            error!(
                "event=subtree_propagation module=tree status=error root_id={} direction={} error_code=job_panicked",
                job.root_id,
                job.direction.label()
            );
        }
        state.counters.jobs_completed.fetch_add(1, Ordering::Relaxed);
        state.finish();
    }
    info!("event=propagation_worker module=tree status=ok action=stop");
}

/// Walks the subtree below `job.root_id`, returning the number of flipped
/// descendants.
fn propagate_subtree(conn: &SharedConnection, job: &PropagationJob, counters: &Counters) -> u64 {
    let started_at = Instant::now();
    let target = job.direction.target_archived();
    info!(
        "event=subtree_propagation module=tree status=start root_id={} direction={}",
        job.root_id,
        job.direction.label()
    );

    let mut updated = 0_u64;
    let mut failures = 0_u64;
    let mut stack = vec![job.root_id];

    while let Some(node_id) = stack.pop() {
        let children = match with_repo(conn, |repo| {
            repo.list_child_ids(&job.owner_id, node_id, !target)
        }) {
            Ok(children) => children,
            Err(err) => {
                failures += 1;
                error!(
                    "event=subtree_propagation module=tree status=error root_id={} node_id={} error_code=list_children_failed error={}",
                    job.root_id, node_id, err
                );
                continue;
            }
        };

        for child_id in children {
            match with_repo(conn, |repo| repo.flip_archived_if(child_id, target)) {
                Ok(true) => {
                    updated += 1;
                    stack.push(child_id);
                }
                // A concurrent job got there first; its walk owns this branch.
                Ok(false) => {}
                Err(err) => {
                    failures += 1;
                    error!(
                        "event=subtree_propagation module=tree status=error root_id={} node_id={} error_code=node_update_failed error={}",
                        job.root_id, child_id, err
                    );
                }
            }
        }
    }

    counters.nodes_updated.fetch_add(updated, Ordering::Relaxed);
    counters.node_failures.fetch_add(failures, Ordering::Relaxed);

    if failures > 0 {
        warn!(
            "event=subtree_propagation module=tree status=error root_id={} direction={} nodes_updated={} node_failures={} duration_ms={}",
            job.root_id,
            job.direction.label(),
            updated,
            failures,
            started_at.elapsed().as_millis()
        );
    } else {
        info!(
            "event=subtree_propagation module=tree status=ok root_id={} direction={} nodes_updated={} duration_ms={}",
            job.root_id,
            job.direction.label(),
            updated,
            started_at.elapsed().as_millis()
        );
    }
    updated
}

fn with_repo<T>(
    conn: &SharedConnection,
    f: impl FnOnce(&SqliteDocumentRepository<'_>) -> DocumentRepoResult<T>,
) -> DocumentRepoResult<T> {
    let guard = lock(conn);
    let repo = SqliteDocumentRepository::assume_ready(&guard);
    f(&repo)
}
