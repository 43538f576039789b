pub mod error {
    #[allow(unused_imports)]
    pub(crate) use anyhow::{anyhow, bail, ensure, Context as _};
    pub use anyhow::{Error, Result};
}
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use colored::Colorize;
use error::*;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::daemon::{self, Daemon, DaemonConfig, DaemonEvent, TestSource};
use crate::interactive::{InteractiveSession, InteractiveVerdict, Side};
use crate::judge::{JudgeVerdict, Tolerance};
use crate::platform::TerminationRequests;
use crate::stress::{
    FailureSlot, HackFailure, InteractionFailure, InteractiveHack, RandomHack, StressOutcome,
};
use crate::style;
use crate::testing::{Executor, JudgeCode, TestOutcome, TestcaseDir};

fn label(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Tolerance from the `tol` file in `dir`. An unreadable or invalid file is reported and ignored.
pub fn tolerance_beside(dir: &Path) -> Option<Tolerance> {
    TestcaseDir::load_tolerance(dir).unwrap_or_else(|e| {
        log::warn!("{}", e);
        println!("{}", "invalid tolerance".red());
        None
    })
}

/// Directory holding `path`; `.` for a bare file name.
pub fn dir_of(path: &Path) -> &Path {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

fn round_progress(rounds: u32) -> Result<ProgressBar> {
    let style = ProgressStyle::default_bar().template("{spinner} round {pos}/{len} {msg}")?;
    let bar = ProgressBar::new(rounds.into()).with_style(style);
    bar.enable_steady_tick(Duration::from_millis(100));
    Ok(bar)
}

pub async fn do_test(
    program_file: impl AsRef<Path>,
    executor: &Executor,
    timeout: Duration,
) -> Result<Vec<TestOutcome>> {
    let program_file = program_file.as_ref();
    let testcase_dir = dir_of(program_file);

    let testcases = TestcaseDir::load(testcase_dir).context("Failed to load testcases")?;
    if testcases.is_empty() {
        bail!(
            "No testcases are saved in {}",
            testcase_dir.to_string_lossy()
        );
    }
    let launch = executor.resolve(program_file)?;

    let job = daemon::EvaluationJob {
        target: program_file.to_owned(),
        cases: testcases,
        tolerance: tolerance_beside(testcase_dir),
        case_timeout: timeout,
    };

    let style = ProgressStyle::default_bar().template("{spinner} {msg}")?;
    let progress_bar_container = MultiProgress::new();
    let bars: Vec<_> = job
        .cases
        .iter()
        .map(|t| {
            let bar = progress_bar_container
                .add(ProgressBar::new(100))
                .with_style(style.clone())
                .with_message(format!("Testcase {} ...", t.name));
            bar.enable_steady_tick(Duration::from_millis(50));
            bar
        })
        .collect();

    log::info!("Running: {}", launch);

    let mut results = Vec::with_capacity(job.cases.len());
    for (t, bar) in job.cases.iter().zip(&bars) {
        let res = job.run_case(executor, t).await?;
        bar.finish_with_message({
            format!(
                "Testcase {} ... {}{} [{}ms]",
                t.name,
                style::judge_icon(res.judge),
                " ".repeat(3 - res.judge.to_string().len()),
                res.output.execution_time.as_millis(),
            )
            .cyan()
            .to_string()
        });
        results.push(res);
    }
    println!();

    results
        .iter()
        .filter(|x| x.judge != JudgeCode::AC)
        .for_each(|x| style::print_case_result(x, timeout.as_secs_f64()));

    style::print_test_result_summary(&results);
    Ok(results)
}

pub async fn do_hack(
    hack: &RandomHack,
    slot: &FailureSlot,
    executor: &Executor,
) -> Result<StressOutcome<HackFailure>> {
    println!("hacking...");
    let bar = round_progress(hack.rounds)?;
    let outcome = hack
        .run(executor, slot, |round, program| {
            bar.set_position(round.into());
            bar.set_message(label(program));
        })
        .await;
    bar.finish_and_clear();

    let outcome = outcome?;
    match &outcome {
        StressOutcome::Survived { rounds } => {
            println!("{}", format!("All {} rounds passed", rounds).green())
        }
        StressOutcome::Failed { round, failure } => {
            println!("{}", format!("Round {} failed", round).bright_red().bold());
            print_hack_failure(hack, failure, hack.timeout);
            if failure.input().is_some() {
                println!("Saved the input to {}", label(slot.path()).bold());
            }
        }
    }
    Ok(outcome)
}

fn print_hack_failure(hack: &RandomHack, failure: &HackFailure, timeout: Duration) {
    match failure {
        HackFailure::Abnormal {
            program, result, ..
        } => {
            let tag = style::status_tag(&result.status, timeout.as_secs_f64());
            println!("{}", format!("{}:{}", label(program), tag).red());
            if !result.stderr.is_empty() {
                println!("{}", "----- stderr -----".yellow());
                print!("{}", style::pretty(&result.stderr).yellow());
            }
        }
        HackFailure::Mismatch {
            expected,
            actual,
            verdict,
            ..
        } => {
            let reference = hack.reference.as_deref().unwrap_or(Path::new("reference"));
            style::print_unified_diff(expected, reference, actual, &hack.candidate);
            match verdict {
                JudgeVerdict::Undetermined => {
                    println!("{}", "(line or token count differs)".yellow())
                }
                v => {
                    if let Some(err) = v.max_error() {
                        println!("{}", format!("err:{:e}", err).yellow());
                    }
                }
            }
        }
    }
}

fn print_interaction_verdict(session: &InteractiveSession, verdict: &InteractiveVerdict) {
    if verdict.timed_out {
        println!("{}", "TLE".red());
    }
    for side in [Side::First, Side::Second] {
        if let Some(abnormal) = verdict.abnormal(side) {
            println!(
                "{}",
                format!("{}:{}", label(session.program(side)), abnormal).red()
            );
        }
    }
    if verdict.is_ok() {
        println!("{}", "OK".green());
    }
}

pub async fn do_interact(
    hack: &InteractiveHack,
    executor: &Executor,
) -> Result<StressOutcome<InteractionFailure>> {
    let session = &hack.session;
    let labels = [
        label(session.program(Side::First)),
        label(session.program(Side::Second)),
    ];
    let label_of = move |side: Side| match side {
        Side::First => labels[0].clone(),
        Side::Second => labels[1].clone(),
    };

    if hack.rounds == 1 {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let printer = tokio::spawn(async move {
            while let Some(line) = rx.recv().await {
                println!("{}", style::format_transcript_line(&line, &label_of(line.side)));
            }
        });
        let verdict = session.run(executor, tx).await?;
        printer.await?;
        print_interaction_verdict(session, &verdict);

        return Ok(if verdict.is_ok() {
            StressOutcome::Survived { rounds: 1 }
        } else {
            StressOutcome::Failed {
                round: 1,
                failure: InteractionFailure {
                    verdict,
                    transcript: Vec::new(),
                },
            }
        });
    }

    println!("hacking...");
    let bar = round_progress(hack.rounds)?;
    let outcome = hack
        .run(executor, |round| bar.set_position(round.into()))
        .await;
    bar.finish_and_clear();

    let outcome = outcome?;
    match &outcome {
        StressOutcome::Survived { rounds } => {
            println!("{}", format!("All {} rounds passed", rounds).green())
        }
        StressOutcome::Failed { round, failure } => {
            println!("{}", format!("Round {} failed", round).bright_red().bold());
            for line in &failure.transcript {
                println!("{}", style::format_transcript_line(line, &label_of(line.side)));
            }
            print_interaction_verdict(session, &failure.verdict);
        }
    }
    Ok(outcome)
}

fn print_event(ev: DaemonEvent, timeout_secs: f64) {
    match ev {
        DaemonEvent::JobStarted {
            target, at, source, ..
        } => {
            style::clear_screen();
            style::print_banner(at, label(&target));
            if let TestSource::Pushed { label } = source {
                println!("{}", format!("(testcases from {})", label).dimmed());
            }
        }
        DaemonEvent::CaseFinished { outcome, .. } => {
            style::print_case_result(&outcome, timeout_secs)
        }
        DaemonEvent::JobFinished { .. } => {}
        DaemonEvent::JobFailed { reason, .. } => println!("{}", reason.red()),
        DaemonEvent::JobCancelled { .. } => println!("{}", "(cancelled)".dimmed()),
        DaemonEvent::NotExecutable { target, at } => {
            style::clear_screen();
            style::print_banner(at, label(&target));
            println!("{}", "not an executable".red());
        }
        DaemonEvent::NoCandidate => println!("{}", "no executable found".yellow()),
        DaemonEvent::InvalidTolerance { .. } => println!("{}", "invalid tolerance".red()),
        DaemonEvent::TestsReceived { batch, at } => {
            style::clear_screen();
            style::print_banner(at, &batch.label);
            style::print_received_tests(&batch.cases);
        }
        DaemonEvent::Rejected { reason } => println!("{}", format!("rejected: {}", reason).dimmed()),
    }
}

pub struct ServeOptions {
    pub root: PathBuf,
    pub bind: String,
    pub port: u16,
    pub token: String,
    pub case_timeout: Duration,
    pub patterns: daemon::CandidatePatterns,
}

/// Runs until stdin is closed or termination is requested.
pub async fn serve(opts: ServeOptions, executor: Executor) -> Result<()> {
    ensure!(!opts.token.is_empty(), "Non-empty token required");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let timeout_secs = opts.case_timeout.as_secs_f64();
    let printer = tokio::spawn(async move {
        while let Some(ev) = rx.recv().await {
            print_event(ev, timeout_secs);
        }
    });

    let daemon = Arc::new(Daemon::new(
        executor,
        DaemonConfig {
            root: opts.root,
            case_timeout: opts.case_timeout,
            patterns: opts.patterns,
        },
        tx,
    ));

    let listener = TcpListener::bind((opts.bind.as_str(), opts.port))
        .await
        .with_context(|| format!("Failed to listen on {}:{}", opts.bind, opts.port))?;
    log::info!("Listening on {}", listener.local_addr()?);
    let app = daemon::ingest::router(daemon.clone(), opts.token);
    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            log::error!("HTTP server stopped: {}", e);
        }
    });

    let mut terminations = TerminationRequests::listen()?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_closed = false;
    loop {
        tokio::select! {
            line = lines.next_line(), if !stdin_closed => match line.context("Failed to read stdin")? {
                Some(_) => {
                    if let Err(e) = daemon.evaluate_latest().await {
                        log::warn!("{}", e);
                    }
                }
                None => stdin_closed = true,
            },
            // After EOF, exit once the running job has stopped on its own or been cancelled.
            _ = daemon.wait(), if stdin_closed => break,
            res = tokio::signal::ctrl_c() => {
                res.context("Failed to listen for Ctrl-C")?;
                if daemon.cancel().await.is_none() {
                    println!("{}", "Send EOF (Ctrl-D) to exit".dimmed());
                }
            },
            _ = terminations.recv() => {
                daemon.cancel().await;
                break;
            },
        }
    }

    server.abort();
    drop(daemon);
    let _ = server.await;
    let _ = printer.await;
    log::info!("Stopped at {}", Local::now().format("%H:%M:%S"));
    Ok(())
}

