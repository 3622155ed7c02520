//! Named periodic jobs.
//!
//! A job runs, then the task sleeps for its interval, then it runs again.
//! Errors and panics from a run are logged with the task name and the loop
//! carries on. Stopping is cooperative: an in-flight run always completes,
//! only the wait before the next one is cut short.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::events::panic_message;

/// One unit of recurring work.
#[async_trait]
pub trait Job: Send {
    async fn run(&mut self) -> Result<()>;
}

/// Adapts an async closure into a [`Job`].
pub struct FnJob<F>(pub F);

#[async_trait]
impl<F, Fut> Job for FnJob<F>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<()>> + Send,
{
    async fn run(&mut self) -> Result<()> {
        (self.0)().await
    }
}

/// Handle to a running periodic task. Dropping it stops the task.
#[derive(Debug)]
pub struct PeriodicTask {
    name: String,
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ask the loop to exit before its next run.
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop and wait for the in-flight run, if any, to complete.
    pub async fn shutdown(self) {
        self.stop();
        if let Err(e) = self.handle.await {
            log::error!("Periodic task {} did not exit cleanly: {e}", self.name);
        }
    }
}

/// Start `job` now and every `interval` after each run completes.
pub fn schedule<J>(name: impl Into<String>, interval: Duration, job: J) -> PeriodicTask
where
    J: Job + 'static,
{
    schedule_after(name, Duration::ZERO, interval, job)
}

/// Like [`schedule`], with the first run postponed by `delay`.
pub fn schedule_after<J>(
    name: impl Into<String>,
    delay: Duration,
    interval: Duration,
    job: J,
) -> PeriodicTask
where
    J: Job + 'static,
{
    let name = name.into();
    let (stop, stopped) = watch::channel(false);
    let handle = tokio::spawn(run_periodic(name.clone(), delay, interval, job, stopped));
    PeriodicTask { name, stop, handle }
}

async fn run_periodic<J: Job>(
    name: String,
    delay: Duration,
    interval: Duration,
    mut job: J,
    mut stopped: watch::Receiver<bool>,
) {
    log::debug!("Starting periodic task {name} every {interval:?}");
    if !delay.is_zero() && !wait(delay, &mut stopped).await {
        return;
    }

    while !*stopped.borrow() {
        match AssertUnwindSafe(job.run()).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::error!("Error in periodic task {name}: {e:?}"),
            Err(panic) => {
                log::error!("Periodic task {name} panicked: {}", panic_message(&*panic))
            }
        }
        if !wait(interval, &mut stopped).await {
            break;
        }
    }
    log::debug!("Stopped periodic task {name}");
}

/// Sleep for `duration` unless stopped first. Returns whether to keep going.
async fn wait(duration: Duration, stopped: &mut watch::Receiver<bool>) -> bool {
    if *stopped.borrow_and_update() {
        return false;
    }
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        // A dropped handle counts as a stop request.
        changed = stopped.changed() => changed.is_ok() && !*stopped.borrow(),
    }
}

/// Owns every periodic task of a running pipeline.
#[derive(Debug, Default)]
pub struct Scheduler {
    tasks: Vec<PeriodicTask>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule<J>(&mut self, name: impl Into<String>, interval: Duration, job: J)
    where
        J: Job + 'static,
    {
        self.tasks.push(schedule(name, interval, job));
    }

    pub fn schedule_after<J>(
        &mut self,
        name: impl Into<String>,
        delay: Duration,
        interval: Duration,
        job: J,
    ) where
        J: Job + 'static,
    {
        self.tasks.push(schedule_after(name, delay, interval, job));
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tasks.iter().map(PeriodicTask::name)
    }

    /// Signal every task to stop without waiting.
    pub fn stop_all(&self) {
        for task in &self.tasks {
            task.stop();
        }
    }

    /// Stop every task and wait for in-flight runs.
    pub async fn shutdown(self) {
        self.stop_all();
        for task in self.tasks {
            task.shutdown().await;
        }
    }
}
