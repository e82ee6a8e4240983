//! Single-writer gateway for every mutation of a player store.
//!
//! # Responsibility
//! - Queue units of work and run them one at a time on a dedicated thread.
//! - Report each submission's outcome through an awaitable [`Completion`].
//!
//! # Invariants
//! - Submissions from one coordinator run in submission order.
//! - Each run is one store transaction: committed whole or rolled back whole.
//! - A failing or panicking unit of work never stops the writer thread.
//! - Change notification for a commit happens before its completion resolves.

use crate::logging::{payload_text, sanitize_message};
use crate::repo::{PlayerRepository, RepoError, RepoResult};
use crate::store::{PlayerStore, WriteOutcome};
use log::{debug, error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::thread::JoinHandle;
use tokio::sync::{mpsc, oneshot};

const WRITER_THREAD_NAME: &str = "scoreboard-writer";
const MAX_PANIC_MESSAGE_CHARS: usize = 160;

/// Shared unit of work; `Fn` so a batch can run it repeatedly.
pub type UnitOfWork = Arc<dyn Fn(&mut dyn PlayerRepository) -> RepoResult<()> + Send + Sync>;

/// Why a submission did not commit.
#[derive(Debug)]
pub enum WriteFailure {
    /// The unit of work or the store returned an error; effects rolled back.
    Rejected(RepoError),
    /// The unit of work panicked; effects rolled back.
    Panicked(String),
    /// The coordinator was shut down before the work could run.
    CoordinatorClosed,
}

impl Display for WriteFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rejected(err) => write!(f, "write rejected: {err}"),
            Self::Panicked(message) => write!(f, "unit of work panicked: {message}"),
            Self::CoordinatorClosed => write!(f, "write coordinator is closed"),
        }
    }
}

impl Error for WriteFailure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Rejected(err) => Some(err),
            Self::Panicked(_) | Self::CoordinatorClosed => None,
        }
    }
}

type CompletionResult = Result<(), WriteFailure>;

/// Outcome of a submission, resolved by the writer thread.
///
/// Await it from async code or call [`Completion::wait`] from a plain thread.
#[must_use = "a completion reports whether the write committed"]
pub struct Completion {
    rx: oneshot::Receiver<CompletionResult>,
}

impl Completion {
    fn resolved(result: CompletionResult) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(result);
        Self { rx }
    }

    /// Blocks the current thread until the submission finishes.
    ///
    /// # Panics
    /// Panics when called from inside an async runtime; `.await` instead.
    pub fn wait(self) -> CompletionResult {
        self.rx
            .blocking_recv()
            .unwrap_or(Err(WriteFailure::CoordinatorClosed))
    }

    /// Returns the result if the submission already finished.
    pub fn try_result(&mut self) -> Option<CompletionResult> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(WriteFailure::CoordinatorClosed)),
        }
    }
}

impl Future for Completion {
    type Output = CompletionResult;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(WriteFailure::CoordinatorClosed)))
    }
}

struct Job {
    ticket: u64,
    work: UnitOfWork,
    runs: usize,
    done: oneshot::Sender<CompletionResult>,
}

/// Serializes units of work against one type-erased store.
pub struct WriteCoordinator {
    store: Arc<dyn PlayerStore>,
    queue: Option<mpsc::UnboundedSender<Job>>,
    writer: Option<JoinHandle<()>>,
    next_ticket: AtomicU64,
}

impl WriteCoordinator {
    /// Starts the writer thread for `store`.
    ///
    /// # Errors
    /// Returns the OS error when the writer thread cannot be spawned.
    pub fn new(store: Arc<dyn PlayerStore>) -> std::io::Result<Self> {
        let (queue, jobs) = mpsc::unbounded_channel();
        let writer_store = Arc::clone(&store);
        let writer = std::thread::Builder::new()
            .name(WRITER_THREAD_NAME.to_string())
            .spawn(move || run_writer(writer_store, jobs))?;

        info!(
            "event=coordinator_start module=write_coordinator status=ok backend={}",
            store.backend_name()
        );

        Ok(Self {
            store,
            queue: Some(queue),
            writer: Some(writer),
            next_ticket: AtomicU64::new(1),
        })
    }

    /// Queues one unit of work.
    pub fn submit(
        &self,
        work: impl Fn(&mut dyn PlayerRepository) -> RepoResult<()> + Send + Sync + 'static,
    ) -> Completion {
        self.submit_shared(Arc::new(work), 1)
    }

    /// Queues `runs` independent transactions of the same unit of work.
    ///
    /// The runs execute back to back. The first failure skips the remaining
    /// runs and becomes the batch result; earlier runs stay committed.
    pub fn submit_batch(
        &self,
        runs: usize,
        work: impl Fn(&mut dyn PlayerRepository) -> RepoResult<()> + Send + Sync + 'static,
    ) -> Completion {
        self.submit_shared(Arc::new(work), runs)
    }

    /// Queues an already shared unit of work `runs` times.
    pub fn submit_shared(&self, work: UnitOfWork, runs: usize) -> Completion {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        if runs == 0 {
            return Completion::resolved(Ok(()));
        }

        let (done, rx) = oneshot::channel();
        let job = Job {
            ticket,
            work,
            runs,
            done,
        };

        let queued = match self.queue.as_ref() {
            Some(queue) => queue.send(job).is_ok(),
            None => false,
        };
        if !queued {
            warn!(
                "event=write_submit module=write_coordinator status=error ticket={ticket} error_code=coordinator_closed"
            );
            return Completion::resolved(Err(WriteFailure::CoordinatorClosed));
        }

        debug!("event=write_submit module=write_coordinator status=queued ticket={ticket} runs={runs}");
        Completion { rx }
    }
}

impl Drop for WriteCoordinator {
    fn drop(&mut self) {
        // Closing the queue lets the writer drain what is left and exit.
        self.queue.take();
        if let Some(writer) = self.writer.take() {
            if writer.join().is_err() {
                error!(
                    "event=coordinator_stop module=write_coordinator status=error error_code=writer_panicked"
                );
                return;
            }
        }
        info!(
            "event=coordinator_stop module=write_coordinator status=ok backend={}",
            self.store.backend_name()
        );
    }
}

fn run_writer(store: Arc<dyn PlayerStore>, mut jobs: mpsc::UnboundedReceiver<Job>) {
    while let Some(job) = jobs.blocking_recv() {
        let result = run_job(store.as_ref(), &job);
        // The caller may have dropped its completion.
        let _ = job.done.send(result);
    }
}

fn run_job(store: &dyn PlayerStore, job: &Job) -> CompletionResult {
    for run in 1..=job.runs {
        match run_once(store, &job.work) {
            Ok(outcome) => debug!(
                "event=write_commit module=write_coordinator status=ok ticket={} run={run}/{} revision={} changed_rows={}",
                job.ticket, job.runs, outcome.revision, outcome.changed_rows
            ),
            Err(failure) => {
                warn!(
                    "event=write_commit module=write_coordinator status=error ticket={} run={run}/{} error={failure}",
                    job.ticket, job.runs
                );
                return Err(failure);
            }
        }
    }
    Ok(())
}

fn run_once(store: &dyn PlayerStore, work: &UnitOfWork) -> Result<WriteOutcome, WriteFailure> {
    let attempt = catch_unwind(AssertUnwindSafe(|| {
        store.write(&mut |repo: &mut dyn PlayerRepository| work(repo))
    }));

    match attempt {
        Ok(Ok(outcome)) => Ok(outcome),
        Ok(Err(err)) => Err(WriteFailure::Rejected(err)),
        Err(payload) => Err(WriteFailure::Panicked(sanitize_message(
            &payload_text(&*payload),
            MAX_PANIC_MESSAGE_CHARS,
        ))),
    }
}
