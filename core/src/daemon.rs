//! Long-running evaluator: one job at a time, triggered from stdin or HTTP.

pub mod ingest;
pub mod job;
pub mod slot;
pub mod watch;

use std::{
    path::{Path, PathBuf},
    sync::{Arc, PoisonError, RwLock},
    time::Duration,
};

use chrono::{DateTime, Local};
use tokio::sync::mpsc;

pub use self::{
    job::EvaluationJob,
    slot::{JobId, JobSlot, JobState},
    watch::CandidatePatterns,
};
use crate::testing::{Executor, LoadError, ResolutionError, TestBatch, TestOutcome, TestcaseDir};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestSource {
    Pushed { label: String },
    Directory(PathBuf),
}

/// Everything the daemon wants the user to see, in the order it happened.
#[derive(Debug, Clone, PartialEq)]
pub enum DaemonEvent {
    JobStarted {
        job: JobId,
        target: PathBuf,
        at: DateTime<Local>,
        source: TestSource,
        cases: usize,
    },
    CaseFinished {
        job: JobId,
        outcome: TestOutcome,
    },
    JobFinished {
        job: JobId,
    },
    JobFailed {
        job: JobId,
        reason: String,
    },
    JobCancelled {
        job: JobId,
    },
    NotExecutable {
        target: PathBuf,
        at: DateTime<Local>,
    },
    NoCandidate,
    InvalidTolerance {
        reason: String,
    },
    TestsReceived {
        batch: Arc<TestBatch>,
        at: DateTime<Local>,
    },
    Rejected {
        reason: String,
    },
}

pub type EventSink = mpsc::UnboundedSender<DaemonEvent>;

#[derive(Debug, thiserror::Error)]
pub enum EvaluateError {
    #[error(transparent)]
    NotExecutable(#[from] ResolutionError),

    #[error("Failed to load testcases: {0}")]
    Load(#[from] LoadError),

    #[error("Failed to scan candidates: {0}")]
    Scan(#[from] fsutil::Error),
}

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Working tree scanned for candidates. `/eval` targets must live under it.
    pub root: PathBuf,
    pub case_timeout: Duration,
    pub patterns: CandidatePatterns,
}

#[derive(Debug)]
pub struct Daemon {
    executor: Executor,
    config: DaemonConfig,
    slot: JobSlot,
    pushed: RwLock<Option<Arc<TestBatch>>>,
    events: EventSink,
}

impl Daemon {
    pub fn new(executor: Executor, config: DaemonConfig, events: EventSink) -> Self {
        Self {
            executor,
            config,
            slot: JobSlot::new(),
            pushed: RwLock::new(None),
            events,
        }
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    fn emit(&self, event: DaemonEvent) {
        if self.events.send(event).is_err() {
            log::debug!("Event receiver is gone");
        }
    }

    /// The last pushed batch. Unless it is empty, it takes precedence over on-disk testcases.
    pub fn current_tests(&self) -> Option<Arc<TestBatch>> {
        self.pushed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the test source wholesale. Does not start a job.
    pub fn push(&self, batch: TestBatch) {
        let batch = Arc::new(batch);
        *self.pushed.write().unwrap_or_else(PoisonError::into_inner) = Some(batch.clone());
        self.emit(DaemonEvent::TestsReceived {
            batch,
            at: Local::now(),
        });
    }

    pub(crate) fn reject(&self, reason: String) {
        self.emit(DaemonEvent::Rejected { reason });
    }

    pub async fn cancel(&self) -> Option<JobId> {
        let id = self.slot.cancel().await?;
        self.emit(DaemonEvent::JobCancelled { job: id });
        Some(id)
    }

    pub async fn state(&self) -> JobState {
        self.slot.state().await
    }

    /// Waits for the running job, if any, to complete.
    pub async fn wait(&self) {
        self.slot.join().await
    }

    /// Stops whatever is running, then starts evaluating `target` in the background.
    pub async fn evaluate(&self, target: &Path) -> Result<JobId, EvaluateError> {
        self.cancel().await;

        if let Err(e) = self.executor.resolve(target) {
            self.emit(DaemonEvent::NotExecutable {
                target: target.to_owned(),
                at: Local::now(),
            });
            return Err(e.into());
        }

        let dir = target.parent().unwrap_or(Path::new("."));
        let pushed = self.current_tests().filter(|batch| !batch.cases.is_empty());
        let (source, cases) = match pushed {
            Some(batch) => (
                TestSource::Pushed {
                    label: batch.label.clone(),
                },
                batch.cases.clone(),
            ),
            None => (TestSource::Directory(dir.to_owned()), TestcaseDir::load(dir)?),
        };
        let tolerance = TestcaseDir::load_tolerance(dir).unwrap_or_else(|e| {
            log::warn!("{}", e);
            self.emit(DaemonEvent::InvalidTolerance {
                reason: e.to_string(),
            });
            None
        });

        let job = EvaluationJob {
            target: target.to_owned(),
            cases,
            tolerance,
            case_timeout: self.config.case_timeout,
        };
        let executor = self.executor.clone();
        let events = self.events.clone();

        let id = self
            .slot
            .start(move |id| async move {
                let emit = |event| {
                    let _ = events.send(event);
                };
                emit(DaemonEvent::JobStarted {
                    job: id,
                    target: job.target.clone(),
                    at: Local::now(),
                    source,
                    cases: job.cases.len(),
                });
                let res = job
                    .run(&executor, |_, outcome| {
                        emit(DaemonEvent::CaseFinished {
                            job: id,
                            outcome: outcome.clone(),
                        })
                    })
                    .await;
                match res {
                    Ok(_) => emit(DaemonEvent::JobFinished { job: id }),
                    Err(e) => emit(DaemonEvent::JobFailed {
                        job: id,
                        reason: e.to_string(),
                    }),
                }
            })
            .await;
        Ok(id)
    }

    /// Evaluates the most recently modified candidate in the working tree.
    pub async fn evaluate_latest(&self) -> Result<Option<JobId>, EvaluateError> {
        let Some(target) = watch::latest_candidate(&self.config.root, &self.config.patterns)? else {
            self.emit(DaemonEvent::NoCandidate);
            return Ok(None);
        };
        self.evaluate(&target).await.map(Some)
    }
}

#[cfg(all(test, unix))]
mod test {
    use super::*;
    use crate::{
        serdable::GlobPattern,
        testing::{executor::test::script, JudgeCode},
    };
    use tokio::time::timeout;

    fn daemon(root: &Path) -> (Arc<Daemon>, mpsc::UnboundedReceiver<DaemonEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let config = DaemonConfig {
            root: root.to_owned(),
            case_timeout: Duration::from_secs(5),
            patterns: CandidatePatterns {
                compiled: vec![GlobPattern::parse("**/*.cc").unwrap()],
                scripts: vec![],
            },
        };
        (Arc::new(Daemon::new(Executor::default(), config, tx)), rx)
    }

    /// Collects events up to the end of job `id`.
    async fn events_of(rx: &mut mpsc::UnboundedReceiver<DaemonEvent>, id: JobId) -> Vec<DaemonEvent> {
        let mut res = Vec::new();
        loop {
            let ev = timeout(Duration::from_secs(10), rx.recv())
                .await
                .expect("job did not finish in time")
                .expect("event channel closed");
            let done = matches!(
                ev,
                DaemonEvent::JobFinished { job } | DaemonEvent::JobFailed { job, .. } if job == id
            );
            res.push(ev);
            if done {
                return res;
            }
        }
    }

    fn judges(events: &[DaemonEvent]) -> Vec<(String, JudgeCode)> {
        events
            .iter()
            .filter_map(|ev| match ev {
                DaemonEvent::CaseFinished { outcome, .. } => {
                    Some((outcome.name.clone(), outcome.judge))
                }
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn evaluates_directory_testcases() {
        let dir = tempfile::tempdir().unwrap();
        let d = dir.path();
        let target = script(d, "main", "read a b; echo $((a + b))");
        fsutil::write(d.join("in0"), "1 2\n").unwrap();
        fsutil::write(d.join("out0"), "3\n").unwrap();
        fsutil::write(d.join("in1"), "5 5\n").unwrap();
        fsutil::write(d.join("out1"), "11\n").unwrap();

        let (daemon, mut rx) = daemon(d);
        let id = daemon.evaluate(&target).await.unwrap();
        let events = events_of(&mut rx, id).await;

        assert!(matches!(
            &events[0],
            DaemonEvent::JobStarted { cases: 2, source: TestSource::Directory(_), .. }
        ));
        assert_eq!(
            judges(&events),
            [("in0".to_owned(), JudgeCode::AC), ("in1".to_owned(), JudgeCode::WA)]
        );
        assert_eq!(daemon.state().await, JobState::Finished(id));
    }

    #[tokio::test]
    async fn multi_line_input_is_accepted_without_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let d = dir.path();
        let target = script(d, "main", "read a; read b; echo $((a + b))");
        fsutil::write(d.join("in0"), "1\n2\n").unwrap();
        fsutil::write(d.join("out0"), "3\n").unwrap();

        let (daemon, mut rx) = daemon(d);
        let id = daemon.evaluate(&target).await.unwrap();
        let outcomes: Vec<_> = events_of(&mut rx, id)
            .await
            .into_iter()
            .filter_map(|ev| match ev {
                DaemonEvent::CaseFinished { outcome, .. } => Some(outcome),
                _ => None,
            })
            .collect();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].judge, JudgeCode::AC);
        assert_eq!(outcomes[0].output.stdout, "3\n");
        assert_eq!(outcomes[0].output.stderr, "");
    }

    #[tokio::test]
    async fn pushed_tests_take_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let d = dir.path();
        fsutil::write(d.join("in0"), "ignored\n").unwrap();
        let exact = script(d, "exact", "read a b; echo $((a + b))");
        let float = script(d, "float", "read a b; echo $((a + b)).0");

        let (daemon, mut rx) = daemon(d);
        daemon.push(TestBatch::from_pairs(
            "sample",
            vec![("4 5\n".to_owned(), "9\n".to_owned())],
        ));
        assert!(matches!(
            rx.recv().await,
            Some(DaemonEvent::TestsReceived { batch, .. }) if batch.cases.len() == 1
        ));

        let id = daemon.evaluate(&exact).await.unwrap();
        let events = events_of(&mut rx, id).await;
        assert_eq!(judges(&events), [("#1".to_owned(), JudgeCode::AC)]);

        let id = daemon.evaluate(&float).await.unwrap();
        let events = events_of(&mut rx, id).await;
        assert_eq!(judges(&events), [("#1".to_owned(), JudgeCode::WA)]);
    }

    #[tokio::test]
    async fn empty_push_falls_back_to_directory() {
        let dir = tempfile::tempdir().unwrap();
        let d = dir.path();
        let target = script(d, "main", "read a b; echo $((a + b))");
        fsutil::write(d.join("in0"), "1 2\n").unwrap();
        fsutil::write(d.join("out0"), "3\n").unwrap();

        let (daemon, mut rx) = daemon(d);
        daemon.push(TestBatch::from_pairs("p", Vec::new()));
        assert!(matches!(rx.recv().await, Some(DaemonEvent::TestsReceived { .. })));

        let id = daemon.evaluate(&target).await.unwrap();
        let events = events_of(&mut rx, id).await;
        assert!(matches!(
            &events[0],
            DaemonEvent::JobStarted { cases: 1, source: TestSource::Directory(_), .. }
        ));
        assert_eq!(judges(&events), [("in0".to_owned(), JudgeCode::AC)]);
    }

    #[tokio::test]
    async fn cancel_is_not_blocked_by_wait() {
        let dir = tempfile::tempdir().unwrap();
        let d = dir.path();
        let slow = script(d, "slow", "exec sleep 3");
        fsutil::write(d.join("in0"), "\n").unwrap();

        let (daemon, _rx) = daemon(d);
        let id = daemon.evaluate(&slow).await.unwrap();
        let waiter = tokio::spawn({
            let daemon = daemon.clone();
            async move { daemon.wait().await }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;

        let state = timeout(Duration::from_secs(1), daemon.state()).await;
        assert_eq!(state.unwrap(), JobState::Running(id));
        let cancelled = timeout(Duration::from_secs(1), daemon.cancel()).await;
        assert_eq!(cancelled.unwrap(), Some(id));
        timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn new_evaluation_cancels_the_running_one() {
        let dir = tempfile::tempdir().unwrap();
        let d = dir.path();
        let slow = script(d, "slow", "exec sleep 30");
        fsutil::write(d.join("in0"), "\n").unwrap();

        let (daemon, mut rx) = daemon(d);
        let first = daemon.evaluate(&slow).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        let second = daemon.evaluate(&slow).await.unwrap();
        assert_ne!(first, second);
        assert_eq!(daemon.state().await, JobState::Running(second));

        assert_eq!(daemon.cancel().await, Some(second));
        assert_eq!(daemon.state().await, JobState::Cancelled(second));
        assert_eq!(daemon.cancel().await, None);

        let mut cancelled = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            assert!(!matches!(ev, DaemonEvent::CaseFinished { .. }), "{:?}", ev);
            if let DaemonEvent::JobCancelled { job } = ev {
                cancelled.push(job);
            }
        }
        assert_eq!(cancelled, [first, second]);
    }

    #[tokio::test]
    async fn non_executable_target_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("main.cc");
        fsutil::write(&source, "int main() {}").unwrap();

        let (daemon, mut rx) = daemon(dir.path());
        let res = daemon.evaluate(&source).await;
        assert!(matches!(res, Err(EvaluateError::NotExecutable(_))));
        assert!(matches!(rx.recv().await, Some(DaemonEvent::NotExecutable { .. })));
        assert_eq!(daemon.state().await, JobState::Idle);
    }

    #[tokio::test]
    async fn latest_candidate_without_any() {
        let dir = tempfile::tempdir().unwrap();
        let (daemon, mut rx) = daemon(dir.path());
        assert_eq!(daemon.evaluate_latest().await.unwrap(), None);
        assert_eq!(rx.recv().await, Some(DaemonEvent::NoCandidate));
    }

    #[tokio::test]
    async fn latest_candidate_is_evaluated() {
        let dir = tempfile::tempdir().unwrap();
        let d = dir.path();
        fsutil::write(d.join("main.cc"), "").unwrap();
        script(d, "main", "echo hi");
        fsutil::write(d.join("in0"), "").unwrap();

        let (daemon, mut rx) = daemon(d);
        let id = daemon.evaluate_latest().await.unwrap().unwrap();
        let events = events_of(&mut rx, id).await;
        assert_eq!(judges(&events), [("in0".to_owned(), JudgeCode::IO)]);
    }
}
