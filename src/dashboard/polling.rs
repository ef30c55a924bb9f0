use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::protocols::http::FetchError;

pub type FetchFn<T> =
    Arc<dyn Fn(CancellationToken) -> BoxFuture<'static, Result<T, FetchError>> + Send + Sync>;

#[derive(Clone, Debug, PartialEq)]
pub enum TaskState<T> {
    /// No result yet for the current run
    Pending,
    Complete(T),
    Error(FetchError),
}

struct CurrentRun {
    generation: u64,
    cancel: CancellationToken,
}

struct Runs {
    generation: u64,
    current: Option<CurrentRun>,
}

/// A re-runnable fetch where starting a new run cancels the one in flight.
///
/// Only the newest run ever publishes a state; a superseded run has its
/// cancellation token fired, which aborts the underlying request.
pub struct PollingTask<T> {
    fetch: FetchFn<T>,
    state_tx: Arc<watch::Sender<TaskState<T>>>,
    latest_tx: Arc<watch::Sender<Option<T>>>,
    runs: Arc<Mutex<Runs>>,
    scope: CancellationToken,
}

impl<T> PollingTask<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(fetch: FetchFn<T>) -> Self {
        let (state_tx, _) = watch::channel(TaskState::Pending);
        let (latest_tx, _) = watch::channel(None);

        PollingTask {
            fetch,
            state_tx: Arc::new(state_tx),
            latest_tx: Arc::new(latest_tx),
            runs: Arc::new(Mutex::new(Runs {
                generation: 0,
                current: None,
            })),
            scope: CancellationToken::new(),
        }
    }

    /// Starts a new fetch, superseding any run still in flight.
    pub fn run(&self) {
        if self.scope.is_cancelled() {
            log::debug!("Ignoring run() on a cancelled polling task");
            return;
        }

        let (generation, cancel) = {
            let mut runs = lock(&self.runs);

            if let Some(previous) = runs.current.take() {
                log::debug!("Superseding polling run {}", previous.generation);
                previous.cancel.cancel();
            }

            runs.generation += 1;
            let cancel = self.scope.child_token();
            runs.current = Some(CurrentRun {
                generation: runs.generation,
                cancel: cancel.clone(),
            });

            (runs.generation, cancel)
        };

        self.state_tx.send_replace(TaskState::Pending);

        let fetch = (self.fetch)(cancel.clone());
        let state_tx = self.state_tx.clone();
        let latest_tx = self.latest_tx.clone();
        let runs = self.runs.clone();

        tokio::spawn(async move {
            // Poll the fetch first so it gets to observe its own cancellation;
            // the token branch only matters for fetches that ignore it.
            let result = tokio::select! {
                biased;
                result = fetch => result,
                _ = cancel.cancelled() => return,
            };

            // Publishing under the lock means run() can't slip in between the
            // generation check and the send.
            let mut runs = lock(&runs);
            let is_current = matches!(&runs.current, Some(run) if run.generation == generation);

            if !is_current || cancel.is_cancelled() {
                return;
            }

            runs.current = None;
            match result {
                Ok(value) => {
                    latest_tx.send_replace(Some(value.clone()));
                    state_tx.send_replace(TaskState::Complete(value));
                }
                Err(e) => {
                    log::debug!("Polling run {} failed: {}", generation, e);
                    state_tx.send_replace(TaskState::Error(e));
                }
            }
        });
    }

    /// Cancels the outstanding run, if any, and refuses further runs.
    pub fn cancel(&self) {
        self.scope.cancel();
        lock(&self.runs).current = None;
    }

    pub fn subscribe(&self) -> watch::Receiver<TaskState<T>> {
        self.state_tx.subscribe()
    }

    /// The value of the most recent successful run. Changes only when a run
    /// completes successfully, so pending and failed runs leave it showing.
    pub fn subscribe_latest(&self) -> watch::Receiver<Option<T>> {
        self.latest_tx.subscribe()
    }
}

impl<T> Drop for PollingTask<T> {
    fn drop(&mut self) {
        self.scope.cancel();
    }
}

fn lock(runs: &Mutex<Runs>) -> std::sync::MutexGuard<'_, Runs> {
    // A panic while holding the lock leaves the bookkeeping intact
    runs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
