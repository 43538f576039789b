use std::{
    future::Future,
    sync::atomic::{AtomicU64, Ordering},
};

use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
};

pub type JobId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Running(JobId),
    Finished(JobId),
    Cancelled(JobId),
}

#[derive(Debug)]
struct Running {
    id: JobId,
    handle: JoinHandle<()>,
    /// Closed once the job future is dropped, whether it completed or was aborted.
    done: watch::Receiver<()>,
}

#[derive(Debug)]
struct Inner {
    last: JobState,
    running: Option<Running>,
}

impl Inner {
    fn state(&self) -> JobState {
        match &self.running {
            Some(r) if !r.handle.is_finished() => JobState::Running(r.id),
            Some(r) => JobState::Finished(r.id),
            None => self.last,
        }
    }

    /// Returns the id of the job that was actually interrupted.
    async fn cancel(&mut self) -> Option<JobId> {
        let Running { id, handle, .. } = self.running.take()?;
        handle.abort();
        match handle.await {
            Ok(()) => {
                self.last = JobState::Finished(id);
                None
            }
            Err(e) if e.is_cancelled() => {
                log::debug!("Job {} cancelled", id);
                self.last = JobState::Cancelled(id);
                Some(id)
            }
            Err(e) => {
                log::error!("Job {} panicked: {}", id, e);
                self.last = JobState::Finished(id);
                None
            }
        }
    }
}

/// Holds at most one running job. Starting a job first stops the previous one.
#[derive(Debug)]
pub struct JobSlot {
    inner: Mutex<Inner>,
    next_id: AtomicU64,
}

impl Default for JobSlot {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Inner {
                last: JobState::Idle,
                running: None,
            }),
            next_id: AtomicU64::new(1),
        }
    }
}

impl JobSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels any running job, waits until it has stopped, then spawns `make_job(id)`.
    pub async fn start<F, Fut>(&self, make_job: F) -> JobId
    where
        F: FnOnce(JobId) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut inner = self.inner.lock().await;
        if let Some(prev) = inner.cancel().await {
            log::debug!("Job {} was replaced", prev);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (done_tx, done) = watch::channel(());
        let job = make_job(id);
        let handle = tokio::spawn(async move {
            let _done = done_tx;
            job.await
        });
        inner.running = Some(Running { id, handle, done });
        inner.last = JobState::Running(id);
        id
    }

    /// Stops the running job, if any. Dropping the job future kills its child process.
    pub async fn cancel(&self) -> Option<JobId> {
        self.inner.lock().await.cancel().await
    }

    pub async fn state(&self) -> JobState {
        self.inner.lock().await.state()
    }

    /// Waits until the running job has stopped, either on its own or through [`cancel`](Self::cancel).
    /// The slot stays usable while waiting.
    pub async fn join(&self) {
        let Some((id, mut done)) = self
            .inner
            .lock()
            .await
            .running
            .as_ref()
            .map(|r| (r.id, r.done.clone()))
        else {
            return;
        };
        while done.changed().await.is_ok() {}

        let mut inner = self.inner.lock().await;
        if !inner.running.as_ref().is_some_and(|r| r.id == id) {
            return; // cancelled or replaced meanwhile
        }
        let Some(Running { handle, .. }) = inner.running.take() else {
            return;
        };
        if let Err(e) = handle.await {
            log::error!("Job {} failed to complete: {}", id, e);
        }
        inner.last = JobState::Finished(id);
    }
}
