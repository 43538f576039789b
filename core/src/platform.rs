//! Process control that differs between operating systems.

use std::{borrow::Cow, io, process::ExitStatus};

use tokio::process::Child;

use crate::testing::ExitState;

pub trait Terminate {
    /// Politely ask the process to stop (SIGTERM on unix).
    fn terminate(&mut self) -> io::Result<()>;
}

impl Terminate for Child {
    #[cfg(unix)]
    fn terminate(&mut self) -> io::Result<()> {
        use nix::{sys::signal, unistd::Pid};

        let Some(pid) = self.id() else {
            return Ok(()); // already reaped
        };
        match signal::kill(Pid::from_raw(pid as i32), signal::Signal::SIGTERM) {
            Ok(()) | Err(nix::errno::Errno::ESRCH) => Ok(()),
            Err(errno) => Err(io::Error::from(errno)),
        }
    }

    #[cfg(not(unix))]
    fn terminate(&mut self) -> io::Result<()> {
        self.start_kill()
    }
}

/// Resolves each time the process is asked to terminate (SIGTERM).
/// Never resolves where there is no such request.
pub struct TerminationRequests {
    #[cfg(unix)]
    inner: tokio::signal::unix::Signal,
}

impl TerminationRequests {
    #[cfg(unix)]
    pub fn listen() -> io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self {
            inner: signal(SignalKind::terminate())?,
        })
    }

    #[cfg(not(unix))]
    pub fn listen() -> io::Result<Self> {
        Ok(Self {})
    }

    #[cfg(unix)]
    pub async fn recv(&mut self) {
        if self.inner.recv().await.is_none() {
            std::future::pending::<()>().await
        }
    }

    #[cfg(not(unix))]
    pub async fn recv(&mut self) {
        std::future::pending::<()>().await
    }
}

#[cfg(unix)]
const SIGNAL_NAMES: &[(i32, &str)] = {
    use nix::libc::*;
    &[
        (SIGHUP, "SIGHUP"),
        (SIGINT, "SIGINT"),
        (SIGQUIT, "SIGQUIT"),
        (SIGILL, "SIGILL"),
        (SIGTRAP, "SIGTRAP"),
        (SIGABRT, "SIGABRT"),
        (SIGBUS, "SIGBUS"),
        (SIGFPE, "SIGFPE"),
        (SIGKILL, "SIGKILL"),
        (SIGUSR1, "SIGUSR1"),
        (SIGSEGV, "SIGSEGV"),
        (SIGUSR2, "SIGUSR2"),
        (SIGPIPE, "SIGPIPE"),
        (SIGALRM, "SIGALRM"),
        (SIGTERM, "SIGTERM"),
        (SIGCHLD, "SIGCHLD"),
        (SIGCONT, "SIGCONT"),
        (SIGSTOP, "SIGSTOP"),
        (SIGTSTP, "SIGTSTP"),
        (SIGTTIN, "SIGTTIN"),
        (SIGTTOU, "SIGTTOU"),
        (SIGURG, "SIGURG"),
        (SIGXCPU, "SIGXCPU"),
        (SIGXFSZ, "SIGXFSZ"),
        (SIGVTALRM, "SIGVTALRM"),
        (SIGPROF, "SIGPROF"),
        (SIGWINCH, "SIGWINCH"),
        (SIGIO, "SIGIO"),
        (SIGSYS, "SIGSYS"),
    ]
};

#[cfg(not(unix))]
const SIGNAL_NAMES: &[(i32, &str)] = &[];

/// Symbolic name of a signal number, e.g. `11` -> `SIGSEGV`.
pub fn signal_name(signo: i32) -> Cow<'static, str> {
    SIGNAL_NAMES
        .iter()
        .find(|&&(n, _)| n == signo)
        .map(|&(_, name)| Cow::Borrowed(name))
        .unwrap_or_else(|| Cow::Owned(format!("SIG{}", signo)))
}

#[cfg(unix)]
pub fn exit_state(status: ExitStatus) -> ExitState {
    use std::os::unix::process::ExitStatusExt;
    match (status.code(), status.signal()) {
        (Some(code), _) => ExitState::Exited(code),
        (None, Some(signo)) => ExitState::Signaled(signal_name(signo).into_owned()),
        (None, None) => ExitState::Exited(-1),
    }
}

#[cfg(not(unix))]
pub fn exit_state(status: ExitStatus) -> ExitState {
    ExitState::Exited(status.code().unwrap_or(-1))
}

#[cfg(all(test, unix))]
mod test {
    use super::*;

    #[test]
    fn known_signals_have_names() {
        assert_eq!(signal_name(nix::libc::SIGSEGV), "SIGSEGV");
        assert_eq!(signal_name(nix::libc::SIGKILL), "SIGKILL");
        assert_eq!(signal_name(nix::libc::SIGTERM), "SIGTERM");
    }

    #[test]
    fn unknown_signal_falls_back_to_number() {
        assert_eq!(signal_name(1000), "SIG1000");
    }

    #[test]
    fn exit_state_from_raw_status() {
        use std::os::unix::process::ExitStatusExt;
        assert_eq!(exit_state(ExitStatus::from_raw(0)), ExitState::Exited(0));
        assert_eq!(exit_state(ExitStatus::from_raw(3 << 8)), ExitState::Exited(3));
        assert_eq!(
            exit_state(ExitStatus::from_raw(nix::libc::SIGABRT)),
            ExitState::Signaled("SIGABRT".to_owned())
        );
    }
}
