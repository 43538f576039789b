use std::{fmt, time::Duration};

/// How a process ended. Exactly one of these holds for every execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExitState {
    Exited(i32),
    /// Killed by a signal, identified by its symbolic name (e.g. `SIGSEGV`).
    Signaled(String),
    TimedOut,
}

impl ExitState {
    pub fn is_success(&self) -> bool {
        *self == ExitState::Exited(0)
    }

    /// `RE:<signal-or-code>` style descriptor of an abnormal termination.
    /// `None` for a clean exit and for a timeout.
    pub fn abnormal(&self) -> Option<Abnormal> {
        match self {
            ExitState::Exited(0) | ExitState::TimedOut => None,
            ExitState::Exited(code) => Some(Abnormal::ExitCode(*code)),
            ExitState::Signaled(name) => Some(Abnormal::Signal(name.clone())),
        }
    }
}

impl fmt::Display for ExitState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ExitState::Exited(code) => write!(f, "{}", code),
            ExitState::Signaled(name) => write!(f, "{}", name),
            ExitState::TimedOut => write!(f, "TLE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Abnormal {
    ExitCode(i32),
    Signal(String),
}

impl fmt::Display for Abnormal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Abnormal::ExitCode(code) => write!(f, "RE:{}", code),
            Abnormal::Signal(name) => write!(f, "RE:{}", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub status: ExitState,
    pub stdout: String,
    pub stderr: String,
    pub execution_time: Duration,
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, strum::Display)]
pub enum JudgeCode {
    AC,
    WA,
    TLE,
    RE,
    /// Input-only testcase: executed and shown, never judged.
    IO,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestOutcome {
    pub name: String,
    pub judge: JudgeCode,
    /// Largest numeric error seen while judging, if any token was numeric.
    pub max_error: Option<f64>,
    pub expected: Option<String>,
    pub output: ExecutionResult,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn abnormal_descriptor() {
        assert_eq!(ExitState::Exited(0).abnormal(), None);
        assert_eq!(ExitState::TimedOut.abnormal(), None);
        assert_eq!(
            ExitState::Exited(3).abnormal().unwrap().to_string(),
            "RE:3"
        );
        assert_eq!(
            ExitState::Signaled("SIGSEGV".into())
                .abnormal()
                .unwrap()
                .to_string(),
            "RE:SIGSEGV"
        );
    }
}
