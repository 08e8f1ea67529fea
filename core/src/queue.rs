//! Background execution of jobs on a tokio worker.
//!
//! # Design
//! `enqueue` validates synchronously and pushes onto an unbounded channel, so
//! it never waits on I/O. A single worker task pulls jobs off the channel and
//! runs each one on the blocking pool, bounded by a semaphore. The blocking
//! task walks the job through its states and calls the finalizer.
//!
//! Handles own the only strong senders of the channel. The worker owns the
//! shared state jobs need (finalizers, states, pending count) and keeps just a
//! weak sender, so when the last `JobQueue` handle goes away the channel
//! closes, every job already queued still runs and is finalized, and then the
//! worker exits. `shutdown` stops it explicitly after draining.
//!
//! Jobs get no relative ordering guarantee. Once a job is dequeued it cannot
//! be cancelled.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch, Notify, Semaphore};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{error, info};

use crate::config::QueueConfig;
use crate::descriptor::{CallDescriptor, FrozenCall};
use crate::error::CalloutError;
use crate::executor::Executor;
use crate::finalizer::FinalizerRegistry;
use crate::job::{Job, JobId, JobState};
use crate::transport::Transport;

/// Handle to a running job queue. Clones share the same queue.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::UnboundedSender<Job>,
    shared: Arc<Shared>,
}

struct Shared {
    finalizers: FinalizerRegistry,
    states: DashMap<JobId, JobState>,
    /// Jobs enqueued and not yet done.
    pending: AtomicUsize,
    idle: Notify,
    closed: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Shared {
    fn finish_one(&self) {
        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// Marks a job as no longer pending when dropped, even if its finalizer
/// panicked.
struct PendingGuard<'a>(&'a Shared);

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.finish_one();
    }
}

impl JobQueue {
    /// Spawn the worker. Must be called from inside a tokio runtime.
    pub fn start<T>(
        executor: Executor<T>,
        finalizers: FinalizerRegistry,
        config: QueueConfig,
    ) -> Result<Self, CalloutError>
    where
        T: Transport + 'static,
    {
        let config = config.validate()?;
        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let shared = Arc::new(Shared {
            finalizers,
            states: DashMap::new(),
            pending: AtomicUsize::new(0),
            idle: Notify::new(),
            closed: AtomicBool::new(false),
            shutdown_tx,
            worker: Mutex::new(None),
        });

        let handle = tokio::spawn(run_worker(
            Arc::clone(&shared),
            tx.downgrade(),
            Arc::new(executor),
            rx,
            shutdown_rx,
            config.max_concurrent_jobs,
        ));
        *shared.worker.lock() = Some(handle);
        Ok(Self { tx, shared })
    }

    /// Submit `descriptor` for background execution; `finalizer` names the
    /// registered finalizer that will receive the outcome.
    ///
    /// Fails synchronously if the descriptor is invalid, the finalizer is
    /// unknown or the queue has been shut down. Never waits on the transport.
    pub fn enqueue(&self, descriptor: CallDescriptor, finalizer: &str) -> Result<JobId, CalloutError> {
        self.enqueue_frozen(descriptor.freeze()?, finalizer)
    }

    pub fn enqueue_frozen(&self, call: FrozenCall, finalizer: &str) -> Result<JobId, CalloutError> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(CalloutError::State("job queue is shut down".to_string()));
        }
        if !self.shared.finalizers.contains(finalizer) {
            return Err(CalloutError::Validation(format!(
                "no finalizer registered as `{finalizer}`"
            )));
        }

        let job = Job::new(call, finalizer);
        let id = job.id();
        let endpoint_key = job.call().endpoint_key().to_string();
        self.shared.states.insert(id, JobState::Queued);
        self.shared.pending.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(job).is_err() {
            self.shared.states.remove(&id);
            self.shared.finish_one();
            return Err(CalloutError::State("job queue is shut down".to_string()));
        }
        info!(job_id = %id, endpoint_key = %endpoint_key, finalizer, "job enqueued");
        Ok(id)
    }

    /// Last state published for `id`.
    pub fn state(&self, id: JobId) -> Option<JobState> {
        self.shared.states.get(&id).map(|state| *state)
    }

    /// Drop the recorded state of a finished job. Jobs that are not `Done`
    /// are left alone and `None` is returned.
    pub fn forget(&self, id: JobId) -> Option<JobState> {
        self.shared
            .states
            .remove_if(&id, |_, state| state.is_terminal())
            .map(|(_, state)| state)
    }

    /// Jobs enqueued and not yet done.
    pub fn pending(&self) -> usize {
        self.shared.pending.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Wait until every enqueued job, including jobs chained by finalizers,
    /// is done.
    pub async fn drain(&self) {
        loop {
            let idle = self.shared.idle.notified();
            if self.pending() == 0 {
                return;
            }
            idle.await;
        }
    }

    /// Drain, then stop the worker. Later `enqueue` calls fail with
    /// `CalloutError::State`.
    pub async fn shutdown(&self) {
        self.drain().await;
        self.shared.closed.store(true, Ordering::SeqCst);
        let _ = self.shared.shutdown_tx.send(true);

        let handle = self.shared.worker.lock().take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                error!(error = %err, "job worker ended abnormally");
            }
        }
    }
}

impl std::fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobQueue")
            .field("pending", &self.pending())
            .field("closed", &self.is_closed())
            .field("finalizers", &self.shared.finalizers)
            .finish()
    }
}

async fn run_worker<T>(
    shared: Arc<Shared>,
    tx: mpsc::WeakUnboundedSender<Job>,
    executor: Arc<Executor<T>>,
    mut rx: mpsc::UnboundedReceiver<Job>,
    mut shutdown_rx: watch::Receiver<bool>,
    max_concurrent_jobs: usize,
) where
    T: Transport + 'static,
{
    let semaphore = Arc::new(Semaphore::new(max_concurrent_jobs));
    let mut running = JoinSet::new();
    info!(max_concurrent_jobs, "job worker started");

    loop {
        tokio::select! {
            biased;
            Ok(()) = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    info!("job worker shutting down");
                    break;
                }
            },
            maybe_job = rx.recv() => {
                let Some(job) = maybe_job else {
                    info!("job channel closed");
                    break;
                };
                spawn_job(&mut running, &semaphore, job, &executor, &shared, &tx).await;
            }
        }
        while let Some(result) = running.try_join_next() {
            log_join(result);
        }
    }

    // Jobs that slipped in before the channel closed still run.
    rx.close();
    while let Some(job) = rx.recv().await {
        spawn_job(&mut running, &semaphore, job, &executor, &shared, &tx).await;
    }
    while let Some(result) = running.join_next().await {
        log_join(result);
    }
    info!("job worker stopped");
}

async fn spawn_job<T>(
    running: &mut JoinSet<()>,
    semaphore: &Arc<Semaphore>,
    job: Job,
    executor: &Arc<Executor<T>>,
    shared: &Arc<Shared>,
    tx: &mpsc::WeakUnboundedSender<Job>,
) where
    T: Transport + 'static,
{
    let Ok(permit) = Arc::clone(semaphore).acquire_owned().await else {
        error!(job_id = %job.id(), "job semaphore closed");
        return;
    };
    let executor = Arc::clone(executor);
    let shared = Arc::clone(shared);
    let tx = tx.clone();
    running.spawn_blocking(move || {
        let _permit = permit;
        run_job(job, &executor, shared, &tx);
    });
}

fn run_job<T: Transport>(
    job: Job,
    executor: &Executor<T>,
    shared: Arc<Shared>,
    tx: &mpsc::WeakUnboundedSender<Job>,
) {
    let _pending = PendingGuard(&shared);
    // With every handle gone, chained enqueues from the finalizer are refused.
    let tx = tx.upgrade().unwrap_or_else(|| mpsc::unbounded_channel().0);
    let queue = JobQueue {
        tx,
        shared: Arc::clone(&shared),
    };
    let id = job.id();

    job.run(
        executor,
        |id, state| {
            shared.states.insert(id, state);
        },
        |job, outcome| match shared.finalizers.instantiate(job.finalizer(), &queue) {
            Some(mut finalizer) => finalizer.execute(outcome),
            None => error!(job_id = %job.id(), finalizer = job.finalizer(), "finalizer vanished"),
        },
    );
    info!(job_id = %id, "job done");
}

fn log_join(result: Result<(), JoinError>) {
    if let Err(err) = result {
        error!(error = %err, "job task failed");
    }
}
