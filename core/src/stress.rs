//! Repeated randomized rounds that stop at the first failing input.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use tokio::sync::mpsc;

use crate::{
    interactive::{InteractiveSession, InteractiveVerdict, TranscriptLine},
    judge::{self, JudgeVerdict, Tolerance},
    testing::{self, ExecutionRequest, ExecutionResult, Executor},
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Execution(#[from] testing::Error),

    #[error("Failed to save the failing input: {0}")]
    Save(#[from] fsutil::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Where the input of the last failing round is kept. Each failure overwrites it.
#[derive(Debug, Clone)]
pub struct FailureSlot {
    path: PathBuf,
}

impl FailureSlot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, input: &str) -> fsutil::Result<()> {
        fsutil::write_with_mkdir(&self.path, input)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StressOutcome<F> {
    /// Every round passed.
    Survived { rounds: u32 },
    /// `round` is 1-based.
    Failed { round: u32, failure: F },
}

#[derive(Debug, Clone, PartialEq)]
pub enum HackFailure {
    /// A program timed out or terminated abnormally. `input` is `None` when the generator failed.
    Abnormal {
        program: PathBuf,
        result: ExecutionResult,
        input: Option<String>,
    },
    /// The candidate disagreed with the reference.
    Mismatch {
        input: String,
        expected: String,
        actual: String,
        verdict: JudgeVerdict,
    },
}

impl HackFailure {
    pub fn input(&self) -> Option<&str> {
        match self {
            Self::Abnormal { input, .. } => input.as_deref(),
            Self::Mismatch { input, .. } => Some(input),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RandomHack {
    pub generator: PathBuf,
    pub candidate: PathBuf,
    /// Trusted solution. Without it only crashes and timeouts of the candidate are caught.
    pub reference: Option<PathBuf>,
    pub rounds: u32,
    pub timeout: Duration,
    pub tolerance: Option<Tolerance>,
}

impl RandomHack {
    /// `on_round` is called with the round index and program before each execution.
    pub async fn run(
        &self,
        executor: &Executor,
        slot: &FailureSlot,
        mut on_round: impl FnMut(u32, &Path),
    ) -> Result<StressOutcome<HackFailure>> {
        for round in 1..=self.rounds {
            if let Some(failure) = self.run_round(executor, round, &mut on_round).await? {
                if let Some(input) = failure.input() {
                    slot.save(input)?;
                }
                return Ok(StressOutcome::Failed { round, failure });
            }
        }
        Ok(StressOutcome::Survived {
            rounds: self.rounds,
        })
    }

    async fn run_round(
        &self,
        executor: &Executor,
        round: u32,
        on_round: &mut impl FnMut(u32, &Path),
    ) -> Result<Option<HackFailure>> {
        let run = |program: &Path, input: Option<&str>| {
            let mut req = ExecutionRequest::new(program).deadline(self.timeout);
            if let Some(input) = input {
                req = req.input(input);
            }
            async move { executor.execute(&req).await }
        };

        on_round(round, &self.generator);
        let generated = run(&self.generator, None).await?;
        if !generated.is_success() {
            return Ok(Some(HackFailure::Abnormal {
                program: self.generator.clone(),
                result: generated,
                input: None,
            }));
        }
        let input = generated.stdout;

        on_round(round, &self.candidate);
        let actual = run(&self.candidate, Some(&input)).await?;
        if !actual.is_success() {
            return Ok(Some(HackFailure::Abnormal {
                program: self.candidate.clone(),
                result: actual,
                input: Some(input),
            }));
        }

        let Some(reference) = &self.reference else {
            return Ok(None);
        };
        on_round(round, reference);
        let expected = run(reference, Some(&input)).await?;
        if !expected.is_success() {
            return Ok(Some(HackFailure::Abnormal {
                program: reference.clone(),
                result: expected,
                input: Some(input),
            }));
        }

        let verdict = judge::judge(&expected.stdout, &actual.stdout, self.tolerance);
        if verdict.is_accepted() {
            return Ok(None);
        }
        Ok(Some(HackFailure::Mismatch {
            input,
            expected: expected.stdout,
            actual: actual.stdout,
            verdict,
        }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InteractionFailure {
    pub verdict: InteractiveVerdict,
    pub transcript: Vec<TranscriptLine>,
}

#[derive(Debug, Clone)]
pub struct InteractiveHack {
    pub session: InteractiveSession,
    pub rounds: u32,
}

impl InteractiveHack {
    pub async fn run(
        &self,
        executor: &Executor,
        mut on_round: impl FnMut(u32),
    ) -> Result<StressOutcome<InteractionFailure>> {
        for round in 1..=self.rounds {
            on_round(round);
            let (tx, mut rx) = mpsc::unbounded_channel();
            let verdict = self.session.run(executor, tx).await?;
            if verdict.is_ok() {
                continue;
            }
            // all senders are gone once the session returns
            let mut transcript = Vec::new();
            while let Ok(line) = rx.try_recv() {
                transcript.push(line);
            }
            return Ok(StressOutcome::Failed {
                round,
                failure: InteractionFailure {
                    verdict,
                    transcript,
                },
            });
        }
        Ok(StressOutcome::Survived {
            rounds: self.rounds,
        })
    }
}
