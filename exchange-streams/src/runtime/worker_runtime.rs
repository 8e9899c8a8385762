//! Bounded worker pool used to dispatch protocol signals off foreign threads.

use crate::config::BridgeConfig;
use crate::error::{BridgeError, StreamError};
use crate::observability::{events, fields};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::runtime::{Builder, Handle, Runtime};
use tracing::{debug, info, warn};

const COMPONENT: &str = "worker_runtime";

struct WorkerPoolInner {
    name: String,
    handle: Handle,
    // Present only when this pool built its own runtime.
    owned_runtime: Mutex<Option<Runtime>>,
    stopped: AtomicBool,
}

impl Drop for WorkerPoolInner {
    fn drop(&mut self) {
        if let Some(runtime) = self.owned_runtime.get_mut().take() {
            runtime.shutdown_background();
        }
    }
}

/// A job paired with the fallback that fires if the job never runs.
struct GuardedJob<F, G>
where
    F: FnOnce(),
    G: FnOnce(StreamError),
{
    job: Option<F>,
    on_dropped: Option<G>,
}

impl<F, G> GuardedJob<F, G>
where
    F: FnOnce(),
    G: FnOnce(StreamError),
{
    fn run(mut self) {
        self.on_dropped = None;
        if let Some(job) = self.job.take() {
            job();
        }
    }
}

impl<F, G> Drop for GuardedJob<F, G>
where
    F: FnOnce(),
    G: FnOnce(StreamError),
{
    fn drop(&mut self) {
        if self.job.take().is_some() {
            if let Some(on_dropped) = self.on_dropped.take() {
                on_dropped(StreamError::WorkerPoolStopped);
            }
        }
    }
}

/// Cheap-to-clone handle on the threads that run deferred deliveries.
///
/// `dispatch` never blocks the caller; jobs run on the pool's runtime.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<WorkerPoolInner>,
}

impl WorkerPool {
    /// Builds and owns a dedicated multi-thread runtime sized by `config`.
    pub fn new(config: &BridgeConfig) -> Result<Self, BridgeError> {
        let thread_name_prefix = config.thread_pool_name.clone();
        let thread_counter = Arc::new(AtomicUsize::new(0));

        let runtime = Builder::new_multi_thread()
            .worker_threads(config.worker_threads)
            .thread_name_fn(move || {
                let id = thread_counter.fetch_add(1, Ordering::Relaxed);
                format!("{thread_name_prefix}-{id}")
            })
            .enable_all()
            .build()
            .map_err(|source| {
                warn!(
                    event = events::RUNTIME_SPAWN_FAILED,
                    component = COMPONENT,
                    worker_pool = config.thread_pool_name.as_str(),
                    err = %source,
                    "unable to build worker runtime"
                );
                BridgeError::WorkerPool {
                    name: config.thread_pool_name.clone(),
                    source,
                }
            })?;

        info!(
            event = events::RUNTIME_SPAWN_OK,
            component = COMPONENT,
            worker_pool = config.thread_pool_name.as_str(),
            worker_threads = config.worker_threads,
            "worker runtime started"
        );

        Ok(Self {
            inner: Arc::new(WorkerPoolInner {
                name: config.thread_pool_name.clone(),
                handle: runtime.handle().clone(),
                owned_runtime: Mutex::new(Some(runtime)),
                stopped: AtomicBool::new(false),
            }),
        })
    }

    /// Borrows a runtime owned by the host; `shutdown` only stops accepting jobs.
    pub fn from_handle(name: &str, handle: Handle) -> Self {
        Self {
            inner: Arc::new(WorkerPoolInner {
                name: name.to_string(),
                handle,
                owned_runtime: Mutex::new(None),
                stopped: AtomicBool::new(false),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::Acquire)
    }

    /// Schedules `job` on the pool.
    ///
    /// `on_dropped` runs instead of `job` when the pool is stopped, or when the
    /// runtime discards the task before polling it. Exactly one of the two runs.
    pub fn dispatch<F, G>(&self, job: F, on_dropped: G)
    where
        F: FnOnce() + Send + 'static,
        G: FnOnce(StreamError) + Send + 'static,
    {
        let guarded = GuardedJob {
            job: Some(job),
            on_dropped: Some(on_dropped),
        };

        if self.is_stopped() {
            debug!(
                event = events::RUNTIME_DISPATCH_REJECTED,
                component = COMPONENT,
                worker_pool = self.inner.name.as_str(),
                reason = fields::REASON_SHUTDOWN,
                "worker pool stopped; job rejected"
            );
            drop(guarded);
            return;
        }

        // A runtime that shut down in the meantime drops the future, which fires `on_dropped`.
        self.inner.handle.spawn(async move { guarded.run() });
    }

    /// Stops accepting jobs and tears down an owned runtime. Idempotent.
    pub fn shutdown(&self) {
        if self.inner.stopped.swap(true, Ordering::AcqRel) {
            return;
        }

        let owned_runtime = self.inner.owned_runtime.lock().take();
        let owned = owned_runtime.is_some();
        if let Some(runtime) = owned_runtime {
            // Background shutdown is the only variant that is legal inside async contexts.
            runtime.shutdown_background();
        }

        info!(
            event = events::RUNTIME_SHUTDOWN,
            component = COMPONENT,
            worker_pool = self.inner.name.as_str(),
            owned,
            "worker pool shut down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::WorkerPool;
    use crate::config::BridgeConfig;
    use crate::error::StreamError;
    use std::sync::mpsc;
    use std::time::Duration;

    fn small_config(name: &str) -> BridgeConfig {
        BridgeConfig {
            thread_pool_name: name.to_string(),
            worker_threads: 2,
            ..Default::default()
        }
    }

    #[test]
    fn dispatch_runs_job_on_named_pool_thread() {
        let pool = WorkerPool::new(&small_config("test-pool")).expect("pool should build");
        let (tx, rx) = mpsc::channel();
        let dropped_tx = tx.clone();

        pool.dispatch(
            move || {
                let name = std::thread::current().name().map(str::to_string);
                tx.send(Ok(name)).expect("receiver alive");
            },
            move |err| dropped_tx.send(Err(err)).expect("receiver alive"),
        );

        let thread_name = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("job should run")
            .expect("job should not be dropped")
            .expect("pool threads are named");
        assert!(thread_name.starts_with("test-pool-"));
        pool.shutdown();
    }

    #[test]
    fn dispatch_after_shutdown_fires_fallback_inline() {
        let pool = WorkerPool::new(&small_config("stopped-pool")).expect("pool should build");
        pool.shutdown();
        pool.shutdown();
        let (tx, rx) = mpsc::channel();
        let ran_tx = tx.clone();

        pool.dispatch(
            move || ran_tx.send(None).expect("receiver alive"),
            move |err| tx.send(Some(err)).expect("receiver alive"),
        );

        assert!(pool.is_stopped());
        assert_eq!(rx.try_recv(), Ok(Some(StreamError::WorkerPoolStopped)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn jobs_discarded_by_a_dead_runtime_fire_fallback() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime should build");
        let pool = WorkerPool::from_handle("dying", runtime.handle().clone());
        drop(runtime);
        let (tx, rx) = mpsc::channel();
        let ran_tx = tx.clone();

        // The pool itself was never stopped; the host runtime went away underneath it.
        assert!(!pool.is_stopped());
        pool.dispatch(
            move || ran_tx.send(None).expect("receiver alive"),
            move |err| tx.send(Some(err)).expect("receiver alive"),
        );

        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)),
            Ok(Some(StreamError::WorkerPoolStopped))
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn borrowed_handle_runs_jobs_and_survives_shutdown() {
        let pool = WorkerPool::from_handle("borrowed", tokio::runtime::Handle::current());
        let (tx, rx) = tokio::sync::oneshot::channel();

        pool.dispatch(
            move || {
                let _ = tx.send(42);
            },
            |err| panic!("job dropped: {err}"),
        );

        assert_eq!(rx.await.expect("job should run"), 42);
        pool.shutdown();
        assert!(pool.is_stopped());
    }
}
