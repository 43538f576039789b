use std::{
    io,
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    process::{Child, ChildStdin},
    time::{timeout, Instant},
};

use super::{launch::*, result::*};
use crate::platform;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("Deadline must be a positive duration")]
    ZeroDeadline,

    #[error("Failed to spawn '{0}': {1}")]
    Spawn(String, #[source] io::Error),

    #[error("Failed to communicate with subprocess: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub program: PathBuf,
    pub input: Option<String>,
    pub deadline: Option<Duration>,
}

impl ExecutionRequest {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            input: None,
            deadline: None,
        }
    }

    pub fn input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }

    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct Executor {
    interpreters: Interpreters,
}

impl Executor {
    /// How long partial output is still drained after a timed-out process is killed.
    /// Pipes inherited by grandchildren may otherwise stay open forever.
    const DRAIN_GRACE: Duration = Duration::from_millis(500);

    pub fn new(interpreters: Interpreters) -> Self {
        Self { interpreters }
    }

    pub fn resolve(&self, program: &Path) -> std::result::Result<LaunchStrategy, ResolutionError> {
        LaunchStrategy::resolve(program, &self.interpreters)
    }

    /// Spawns `program` with all three standard streams piped.
    pub fn spawn_piped(&self, program: &Path) -> Result<Child> {
        let launch = self.resolve(program)?;
        launch
            .command()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Spawn(launch.to_string(), e))
    }

    pub async fn execute(&self, req: &ExecutionRequest) -> Result<ExecutionResult> {
        if req.deadline.map_or(false, |d| d.is_zero()) {
            return Err(Error::ZeroDeadline);
        }

        let launch = self.resolve(&req.program)?;
        let mut proc = launch
            .command()
            .stdin(match req.input {
                Some(_) => Stdio::piped(),
                None => Stdio::null(),
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Spawn(launch.to_string(), e))?;

        let stdin = proc.stdin.take();
        let mut stdout = proc.stdout.take().ok_or_else(|| pipe_error("stdout"))?;
        let mut stderr = proc.stderr.take().ok_or_else(|| pipe_error("stderr"))?;

        let mut stdout_buf = Vec::new();
        let mut stderr_buf = Vec::new();
        let start_at = Instant::now();

        let (status, execution_time) = {
            let communicate = async {
                let drain = async {
                    tokio::try_join!(
                        stdout.read_to_end(&mut stdout_buf),
                        stderr.read_to_end(&mut stderr_buf)
                    )
                };
                let ((), drained) = tokio::join!(feed_stdin(stdin, req.input.as_deref()), drain);
                drained
            };
            tokio::pin!(communicate);

            let finished = match req.deadline {
                None => Some(tokio::try_join!(communicate.as_mut(), proc.wait())?.1),
                Some(limit) => {
                    match timeout(limit, async {
                        tokio::try_join!(communicate.as_mut(), proc.wait())
                    })
                    .await
                    {
                        Ok(res) => Some(res?.1),
                        Err(_) => None,
                    }
                }
            };
            let execution_time = start_at.elapsed();

            let status = match finished {
                Some(exit_status) => platform::exit_state(exit_status),
                None => {
                    proc.start_kill()
                        .unwrap_or_else(|e| log::warn!("Failed to kill TLE process: {:#}", e));
                    if timeout(Self::DRAIN_GRACE, communicate.as_mut()).await.is_err() {
                        log::debug!("Output of killed process {} is still open", launch);
                    }
                    proc.wait()
                        .await
                        .map(drop)
                        .unwrap_or_else(|e| log::warn!("Failed to reap TLE process: {:#}", e));
                    ExitState::TimedOut
                }
            };
            (status, execution_time)
        };

        Ok(ExecutionResult {
            status,
            stdout: String::from_utf8_lossy(&stdout_buf).into(),
            stderr: String::from_utf8_lossy(&stderr_buf).into(),
            execution_time,
        })
    }
}

fn pipe_error(name: &str) -> Error {
    Error::Io(io::Error::new(
        io::ErrorKind::BrokenPipe,
        format!("Failed to open {}", name),
    ))
}

/// Writes the whole input and closes stdin. A peer that exits without reading is not an error.
async fn feed_stdin(stdin: Option<ChildStdin>, input: Option<&str>) {
    let (Some(mut stdin), Some(input)) = (stdin, input) else {
        return;
    };
    if let Err(e) = stdin.write_all(input.as_bytes()).await {
        if e.kind() != io::ErrorKind::BrokenPipe {
            log::debug!("Failed to pass input-data to stdin: {}", e);
        }
    }
    drop(stdin); // NOTE: closing stdin is what lets the program see EOF
}
