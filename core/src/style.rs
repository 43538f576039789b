use std::borrow::Cow;
use std::collections::BTreeMap;
use std::io::{self, Write as _};
use std::path::Path;

use chrono::{DateTime, Local};
use colored::{Color, ColoredString, Colorize};
use crossterm::{cursor, execute, terminal};
use similar::TextDiff;

use crate::interactive::{Channel, Side, TranscriptLine};
use crate::testing::{ExecutionResult, ExitState, JudgeCode, TestCase, TestOutcome};

/// Outputs longer than this are not echoed.
pub const MAX_ECHO_CHARS: usize = 10000;

pub fn is_truecolor_supported() -> bool {
    let Ok(v) = std::env::var("COLORTERM") else {
        return false
    };
    matches!(v.as_str(), "truecolor" | "24bit")
}

pub trait ColorTheme {
    fn color(&self) -> Color;
}

impl ColorTheme for log::Level {
    fn color(&self) -> Color {
        use log::Level::*;
        match self {
            Error => Color::BrightRed,
            Warn => Color::BrightYellow,
            Info => Color::Cyan,
            Debug => Color::Magenta,
            Trace => Color::Blue,
        }
    }
}

impl ColorTheme for JudgeCode {
    fn color(&self) -> Color {
        use JudgeCode::*;
        if !self::is_truecolor_supported() {
            return match self {
                AC => Color::Green,
                WA => Color::Yellow,
                TLE => Color::Red,
                RE => Color::Magenta,
                IO => Color::Blue,
            };
        }

        match self {
            AC => Color::TrueColor {
                r: 30,
                g: 180,
                b: 40,
            },
            WA => Color::TrueColor {
                r: 210,
                g: 138,
                b: 4,
            },
            TLE => Color::TrueColor {
                r: 220,
                g: 42,
                b: 42,
            },
            RE => Color::TrueColor {
                r: 171,
                g: 40,
                b: 200,
            },
            IO => Color::TrueColor {
                r: 50,
                g: 110,
                b: 210,
            },
        }
    }
}

impl ColorTheme for Side {
    fn color(&self) -> Color {
        match self {
            Side::First => Color::Cyan,
            Side::Second => Color::Magenta,
        }
    }
}

pub fn judge_icon(judge: JudgeCode) -> ColoredString {
    let fg = if is_truecolor_supported() {
        Color::TrueColor {
            r: 255,
            g: 255,
            b: 255,
        }
    } else {
        Color::BrightBlack
    };
    format!(" {} ", judge)
        .on_color(judge.color())
        .bold()
        .color(fg)
}

/// Text as it should be echoed: marks empty text, a missing final newline,
/// and elides anything longer than [`MAX_ECHO_CHARS`]. Always ends with a newline.
pub fn pretty(text: &str) -> String {
    if text.is_empty() {
        "(empty)\n".to_owned()
    } else if text.chars().count() > MAX_ECHO_CHARS {
        "(too long)\n".to_owned()
    } else if !text.ends_with('\n') {
        format!("{}(no-eol)\n", text)
    } else {
        text.to_owned()
    }
}

pub fn clear_screen() {
    let mut stdout = io::stdout();
    execute!(
        stdout,
        terminal::Clear(terminal::ClearType::All),
        terminal::Clear(terminal::ClearType::Purge),
        cursor::MoveTo(0, 0)
    )
    .unwrap_or_else(|e| log::debug!("Failed to clear screen: {}", e));
}

pub fn timestamp(at: DateTime<Local>) -> String {
    format!("[{}]", at.format("%H:%M:%S"))
}

pub fn print_banner(at: DateTime<Local>, subject: impl AsRef<str>) {
    println!("{} {}", timestamp(at), subject.as_ref());
}

fn print_block(title: &str, color: Color, text: &str) {
    println!("{}", title.color(color));
    print!("{}", pretty(text));
}

fn print_stderr(output: &ExecutionResult) {
    if !output.stderr.is_empty() {
        print_block("---- stderr ----", Color::Yellow, &output.stderr);
    }
}

/// `TLE(10s)`, `RE:SIGSEGV`, ...
pub fn status_tag(status: &ExitState, timeout_secs: f64) -> String {
    match status {
        ExitState::TimedOut => format!("TLE({}s)", timeout_secs),
        ExitState::Exited(code) => format!("RE:{}", code),
        ExitState::Signaled(name) => format!("RE:{}", name),
    }
}

/// One line per case, followed by whatever is needed to understand a non-AC verdict.
pub fn print_case_result(res: &TestOutcome, timeout_secs: f64) {
    let mut suffix = String::new();
    if !res.output.stderr.is_empty() {
        suffix.push_str(" stderr");
    }
    if let Some(err) = res.max_error {
        suffix.push_str(&format!(" err:{:e}", err));
    }
    print!(
        "{} {}",
        format!("{}:", res.name).cyan(),
        self::judge_icon(res.judge)
    );

    match res.judge {
        JudgeCode::AC => println!("{} [{}ms]", suffix.yellow(), res.output.execution_time.as_millis()),
        JudgeCode::TLE | JudgeCode::RE => {
            println!(
                " {}{}",
                status_tag(&res.output.status, timeout_secs).red(),
                suffix.yellow()
            );
            print_stderr(&res.output);
        }
        JudgeCode::IO => {
            println!("{}", suffix.yellow());
            print_block("---- actual ----", Color::Magenta, &res.output.stdout);
            print_stderr(&res.output);
        }
        JudgeCode::WA => {
            println!("{}", suffix.yellow());
            print_block(
                "--- expected ---",
                Color::Magenta,
                res.expected.as_deref().unwrap_or_default(),
            );
            print_block("---- actual ----", Color::Magenta, &res.output.stdout);
            print_stderr(&res.output);
        }
    }
}

pub fn print_received_tests(cases: &[TestCase]) {
    for case in cases {
        print_block(&format!("---- {} in ----", case.name), Color::Cyan, &case.input);
        if let Some(expected) = &case.expected {
            print_block(&format!("---- {} out ---", case.name), Color::Cyan, expected);
        }
        println!();
    }
}

fn mark_missing_eol(text: &str) -> Cow<'_, str> {
    if text.is_empty() || text.ends_with('\n') {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(format!("{}(no-eol)\n", text))
    }
}

/// Unified diff from `expected` to `actual`. A missing final newline shows up as `(no-eol)`.
pub fn unified_diff(expected: &str, expected_label: &str, actual: &str, actual_label: &str) -> String {
    let expected = mark_missing_eol(expected);
    let actual = mark_missing_eol(actual);
    TextDiff::from_lines(expected.as_ref(), actual.as_ref())
        .unified_diff()
        .header(expected_label, actual_label)
        .to_string()
}

pub fn print_unified_diff(expected: &str, expected_label: &Path, actual: &str, actual_label: &Path) {
    let diff = unified_diff(
        expected,
        &expected_label.to_string_lossy(),
        actual,
        &actual_label.to_string_lossy(),
    );
    for line in diff.lines() {
        let line = if line.starts_with("@@") {
            line.cyan()
        } else if line.starts_with("---") || line.starts_with("+++") {
            line.bold()
        } else if line.starts_with('-') {
            line.red()
        } else if line.starts_with('+') {
            line.green()
        } else {
            line.normal()
        };
        println!("{}", line);
    }
}

pub fn format_transcript_line(line: &TranscriptLine, label: &str) -> ColoredString {
    match line.channel {
        Channel::Out => format!("[{}] {}", label, line.text).color(line.side.color()),
        Channel::Err => format!("[err:{}] {}", label, line.text).yellow(),
    }
}

pub fn print_test_result_summary(results: &[TestOutcome]) {
    let bar = "-".repeat(5);
    print!("{} ", bar);

    let count: BTreeMap<JudgeCode, usize> = results.iter().fold(BTreeMap::new(), |mut count, r| {
        *count.entry(r.judge).or_default() += 1;
        count
    });
    let num_of = |judge: JudgeCode| *count.get(&judge).unwrap_or(&0);

    let num_input_only = num_of(JudgeCode::IO);
    let num_judged = results.len() - num_input_only;
    let num_passed = num_of(JudgeCode::AC);
    let num_failed = num_judged - num_passed;

    if num_failed == 0 {
        let msg = format!("All {} tests passed ✨", num_judged);
        print!("{}", msg.green());
    } else {
        let summary_msg = if num_passed > 0 {
            format!("{}/{} tests failed 💣", num_failed, num_judged)
        } else {
            format!("All {} tests failed 💀", num_judged)
        };

        let detail_msg = count
            .iter()
            .filter(|(&judge, _)| judge != JudgeCode::AC && judge != JudgeCode::IO)
            .map(|(&judge, &cnt)| {
                format!(
                    "{}{}{}",
                    self::judge_icon(judge),
                    "x".dimmed(),
                    cnt.to_string().bold().bright_white(),
                )
            })
            .collect::<Vec<String>>()
            .join(", ");

        print!("{} ({})", summary_msg.bright_red(), detail_msg);
    }
    if num_input_only > 0 {
        print!(" {}", format!("+{} input-only", num_input_only).dimmed());
    }

    println!(" {}", bar);
    let _ = io::stdout().flush();
}
