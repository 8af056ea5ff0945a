use crate::{
    AssetStore, DedupQueue, Error, FlickerGenerator, Priority, RenderBackend, Result, Value,
    scheduler::worker::{JobSettings, worker_loop},
};
use parking_lot::Mutex;
use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};
use std::time::Duration;
use tokio::sync::{Notify, futures::Notified};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Point-in-time view of the scheduler, for introspection.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct SchedulerStatus {
    pub fresh: usize,
    pub refresh: usize,
    /// Value the worker is rendering right now, if any.
    pub in_flight: Option<Value>,
    pub completed: u64,
    pub failed: u64,
}

/// The two priority queues shared between request handlers and the worker.
///
/// Each queue sits behind its own mutex; pushes wake the worker through a
/// [`Notify`] permit, so a push that lands between an empty pop and the
/// worker going to sleep is never lost.
#[derive(Debug, Default)]
pub struct JobQueues {
    fresh: Mutex<DedupQueue<Value>>,
    refresh: Mutex<DedupQueue<Value>>,
    notify: Notify,
    closed: AtomicBool,
    in_flight: Mutex<Option<Value>>,
    completed: AtomicU64,
    failed: AtomicU64,
}

impl JobQueues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `value` with `priority`. Returns `true` if it was not queued
    /// in that class already.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServiceShutdown`] once the queues are closed.
    pub fn push(&self, priority: Priority, value: Value) -> Result<bool> {
        if self.is_closed() {
            return Err(Error::ServiceShutdown);
        }
        let added = match priority {
            Priority::Fresh => self.fresh.lock().push(value),
            Priority::Refresh => self.refresh.lock().push(value),
        };
        if added {
            tracing::debug!(%value, %priority, "queued render job");
            self.notify.notify_one();
        }
        Ok(added)
    }

    /// Pops the next job: the oldest fresh value, else the oldest refresh
    /// value.
    pub fn pop(&self) -> Option<(Priority, Value)> {
        if let Some(value) = self.fresh.lock().pop() {
            return Some((Priority::Fresh, value));
        }
        self.refresh
            .lock()
            .pop()
            .map(|value| (Priority::Refresh, value))
    }

    /// Queued values, fresh first then refresh. A value queued in both
    /// classes is listed once, at its first position.
    pub fn snapshot(&self) -> Vec<Value> {
        let fresh = self.fresh.lock();
        let refresh = self.refresh.lock();
        let mut values: Vec<Value> = fresh.iter().copied().collect();
        values.extend(refresh.iter().copied().filter(|v| !fresh.contains(v)));
        values
    }

    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            fresh: self.fresh.lock().len(),
            refresh: self.refresh.lock().len(),
            in_flight: *self.in_flight.lock(),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    /// Value the worker is rendering right now, if any.
    pub fn in_flight(&self) -> Option<Value> {
        *self.in_flight.lock()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Refuses further pushes. Already queued values stay queued.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub(crate) fn notified(&self) -> Notified<'_> {
        self.notify.notified()
    }

    pub(crate) fn begin(&self, value: Value) {
        *self.in_flight.lock() = Some(value);
    }

    pub(crate) fn finish(&self, succeeded: bool) {
        *self.in_flight.lock() = None;
        let counter = if succeeded {
            &self.completed
        } else {
            &self.failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Owns the render worker and its queues.
///
/// Created once at startup; the worker runs until [`shutdown`](Self::shutdown)
/// is called.
#[derive(Debug)]
pub struct JobScheduler {
    queues: Arc<JobQueues>,
    shutdown_token: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl JobScheduler {
    /// Spawns the worker on the current Tokio runtime.
    ///
    /// The backend has already passed its startup checks; the worker takes
    /// exclusive ownership of it.
    pub fn start<B, S>(
        backend: B,
        store: Arc<S>,
        generator: FlickerGenerator,
        settings: JobSettings,
    ) -> Self
    where
        B: RenderBackend,
        S: AssetStore + ?Sized,
    {
        Self::with_queues(Arc::new(JobQueues::new()), backend, store, generator, settings)
    }

    /// Like [`start`](Self::start), draining an existing set of queues.
    pub fn with_queues<B, S>(
        queues: Arc<JobQueues>,
        backend: B,
        store: Arc<S>,
        generator: FlickerGenerator,
        settings: JobSettings,
    ) -> Self
    where
        B: RenderBackend,
        S: AssetStore + ?Sized,
    {
        let shutdown_token = CancellationToken::new();
        let handle = tokio::spawn(worker_loop(
            Arc::clone(&queues),
            backend,
            store,
            generator,
            settings,
            shutdown_token.clone(),
        ));
        Self {
            queues,
            shutdown_token,
            handle: Mutex::new(Some(handle)),
        }
    }

    pub fn queues(&self) -> &Arc<JobQueues> {
        &self.queues
    }

    pub fn enqueue(&self, priority: Priority, value: Value) -> Result<bool> {
        self.queues.push(priority, value)
    }

    pub fn snapshot(&self) -> Vec<Value> {
        self.queues.snapshot()
    }

    pub fn status(&self) -> SchedulerStatus {
        self.queues.status()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// Stops accepting work, cancels the idle worker and waits up to
    /// `timeout` for an in-flight job to finish.
    ///
    /// Calling it again is a no-op.
    pub async fn shutdown(&self, timeout: Duration) -> Result<()> {
        tracing::info!("Initiating render worker shutdown");
        self.queues.close();
        self.shutdown_token.cancel();

        let Some(handle) = self.handle.lock().take() else {
            return Ok(());
        };
        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(())) => {
                tracing::info!("Render worker shut down gracefully");
                Ok(())
            }
            Ok(Err(e)) => Err(Error::ChannelError {
                context: format!("render worker ended abnormally: {e}"),
            }),
            Err(_) => {
                tracing::warn!(
                    in_flight = ?self.queues.status().in_flight,
                    "Render worker shutdown timeout after {:?}",
                    timeout
                );
                Ok(())
            }
        }
    }
}
