use anyhow::Result;
use futures::future::{AbortHandle, Abortable};
use std::{
    future::Future,
    sync::atomic::{AtomicBool, Ordering},
    sync::Arc,
    time::Duration,
};
use tokio::{task::JoinHandle, time::MissedTickBehavior};

/// Piece of work which can be cancelled
#[derive(Debug)]
pub struct Task {
    done: Arc<AtomicBool>,
    shutdown: AbortHandle,
    handle: JoinHandle<Result<()>>,
}

impl Task {
    /// Creates a new task and immediatly runs it in a `tokio::task`.
    pub fn new<F>(task: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (shutdown, abort_registration) = AbortHandle::new_pair();
        let done = Arc::new(AtomicBool::new(false));
        let done2 = done.clone();
        let future = Abortable::new(task, abort_registration);
        let handle = tokio::task::spawn(async move {
            future.await?;
            done2.store(true, Ordering::Relaxed);
            Ok(())
        });

        Self {
            done,
            shutdown,
            handle,
        }
    }

    /// Runs `job` right away and then once every `period` until cancelled.
    ///
    /// A run is never started while the previous one is still going, ticks
    /// missed in the meantime are skipped.
    pub fn periodic<F, Fut>(period: Duration, mut job: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::new(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                job().await;
            }
        })
    }

    /// Checks whether the task has completed
    pub fn has_finished(&self) -> bool {
        self.done.load(Ordering::Relaxed)
    }

    /// Cancels the task and joins it.
    pub async fn cancel(self) {
        self.shutdown.abort();
        let _ = self.handle.await;
    }
}
