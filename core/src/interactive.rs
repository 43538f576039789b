//! Two programs wired stdout-to-stdin against each other under one deadline.

use std::{
    io,
    path::{Path, PathBuf},
    time::Duration,
};

use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader},
    process::{Child, ChildStderr, ChildStdin, ChildStdout},
    sync::mpsc,
    task::JoinHandle,
    time::{timeout, Instant},
};

use crate::{
    platform::{self, Terminate},
    testing::{self, Abnormal, ExitState, Executor},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    First,
    Second,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Forwarded to the peer.
    Out,
    /// Only observed.
    Err,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptLine {
    pub side: Side,
    pub channel: Channel,
    /// Line without its terminating newline.
    pub text: String,
}

pub type TranscriptSink = mpsc::UnboundedSender<TranscriptLine>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub lines: usize,
    pub bytes_forwarded: usize,
    /// The peer stopped accepting input before this side finished writing.
    pub downstream_closed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractiveVerdict {
    pub timed_out: bool,
    pub first: Option<Abnormal>,
    pub second: Option<Abnormal>,
    /// `[first -> second, second -> first]`
    pub relays: [RelayStats; 2],
}

impl InteractiveVerdict {
    pub fn is_ok(&self) -> bool {
        !self.timed_out && self.first.is_none() && self.second.is_none()
    }

    pub fn abnormal(&self, side: Side) -> Option<&Abnormal> {
        match side {
            Side::First => self.first.as_ref(),
            Side::Second => self.second.as_ref(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InteractiveSession {
    first: PathBuf,
    second: PathBuf,
    deadline: Duration,
}

impl InteractiveSession {
    /// How long a terminated peer may take to exit before it is killed.
    const TERMINATE_GRACE: Duration = Duration::from_millis(500);

    pub fn new(first: impl Into<PathBuf>, second: impl Into<PathBuf>, deadline: Duration) -> Self {
        Self {
            first: first.into(),
            second: second.into(),
            deadline,
        }
    }

    pub fn program(&self, side: Side) -> &Path {
        match side {
            Side::First => &self.first,
            Side::Second => &self.second,
        }
    }

    pub async fn run(
        &self,
        executor: &Executor,
        sink: TranscriptSink,
    ) -> testing::Result<InteractiveVerdict> {
        if self.deadline.is_zero() {
            return Err(testing::Error::ZeroDeadline);
        }
        let mut first = executor.spawn_piped(&self.first)?;
        let mut second = executor.spawn_piped(&self.second)?;
        let start_at = Instant::now();

        let (first_in, first_out, first_err) = take_pipes(&mut first)?;
        let (second_in, second_out, second_err) = take_pipes(&mut second)?;

        let forward_first: JoinHandle<RelayStats> =
            tokio::spawn(relay(first_out, second_in, Side::First, sink.clone()));
        let forward_second: JoinHandle<RelayStats> =
            tokio::spawn(relay(second_out, first_in, Side::Second, sink.clone()));
        let drain_first = tokio::spawn(drain(first_err, Side::First, sink.clone()));
        let drain_second = tokio::spawn(drain(second_err, Side::Second, sink));

        let mut timed_out = false;
        for child in [&mut first, &mut second] {
            let remaining = self.deadline.saturating_sub(start_at.elapsed());
            match timeout(remaining, child.wait()).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => log::warn!("Failed to wait for interactive peer: {:#}", e),
                Err(_) => {
                    timed_out = true;
                    break;
                }
            }
        }

        for child in [&mut first, &mut second] {
            child
                .terminate()
                .unwrap_or_else(|e| log::warn!("Failed to terminate interactive peer: {:#}", e));
        }
        let (first_status, second_status) =
            tokio::join!(Self::reap(&mut first), Self::reap(&mut second));

        let (forwarded_first, forwarded_second, ..) =
            tokio::join!(forward_first, forward_second, drain_first, drain_second);

        Ok(InteractiveVerdict {
            timed_out,
            first: first_status.abnormal(),
            second: second_status.abnormal(),
            relays: [
                forwarded_first.unwrap_or_default(),
                forwarded_second.unwrap_or_default(),
            ],
        })
    }

    async fn reap(child: &mut Child) -> ExitState {
        let status = match timeout(Self::TERMINATE_GRACE, child.wait()).await {
            Ok(status) => status,
            Err(_) => {
                child
                    .start_kill()
                    .unwrap_or_else(|e| log::warn!("Failed to kill interactive peer: {:#}", e));
                child.wait().await
            }
        };
        match status {
            Ok(status) => platform::exit_state(status),
            Err(e) => {
                log::warn!("Failed to reap interactive peer: {:#}", e);
                ExitState::Exited(-1)
            }
        }
    }
}

fn take_pipes(child: &mut Child) -> testing::Result<(ChildStdin, ChildStdout, ChildStderr)> {
    let missing = |name: &str| {
        testing::Error::Io(io::Error::new(
            io::ErrorKind::BrokenPipe,
            format!("Failed to open {}", name),
        ))
    };
    Ok((
        child.stdin.take().ok_or_else(|| missing("stdin"))?,
        child.stdout.take().ok_or_else(|| missing("stdout"))?,
        child.stderr.take().ok_or_else(|| missing("stderr"))?,
    ))
}

fn transcript_line(side: Side, channel: Channel, raw: &[u8]) -> TranscriptLine {
    let text = String::from_utf8_lossy(raw);
    TranscriptLine {
        side,
        channel,
        text: text.strip_suffix('\n').unwrap_or(&text).to_owned(),
    }
}

async fn forward(to: &mut ChildStdin, line: &[u8]) -> io::Result<()> {
    to.write_all(line).await?;
    to.flush().await
}

/// Forwards `from` line by line into `to`, mirroring every line to `sink`.
/// Keeps reading after the peer has gone away so `from` is always drained.
async fn relay(from: ChildStdout, to: ChildStdin, side: Side, sink: TranscriptSink) -> RelayStats {
    let mut reader = BufReader::new(from);
    let mut to = Some(to);
    let mut stats = RelayStats::default();
    let mut line = Vec::new();

    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                log::debug!("Relay read error: {}", e);
                break;
            }
        }
        stats.lines += 1;
        let _ = sink.send(transcript_line(side, Channel::Out, &line));

        let Some(w) = to.as_mut() else {
            continue;
        };
        match forward(w, &line).await {
            Ok(()) => stats.bytes_forwarded += line.len(),
            Err(e) => {
                if e.kind() != io::ErrorKind::BrokenPipe {
                    log::debug!("Relay write error: {}", e);
                }
                to = None;
                stats.downstream_closed = true;
            }
        }
    }
    stats // `to` is dropped here, closing the peer's stdin
}

async fn drain(from: impl AsyncRead + Unpin, side: Side, sink: TranscriptSink) {
    let mut reader = BufReader::new(from);
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {
                let _ = sink.send(transcript_line(side, Channel::Err, &line));
            }
            Err(e) => {
                log::debug!("Stderr read error: {}", e);
                break;
            }
        }
    }
}
