//! Formatted console output for CLI commands.
//!
//! Progress and results go to stderr so stdout stays clean for
//! machine-readable output such as `grokdock tags`.

use std::time::Duration;

use grokdock_pipeline::publish::PublishOutcome;
use grokdock_pipeline::smoke::SmokeOutcome;
use grokdock_pipeline::suite::{CheckOutcome, SuiteReport};

const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const RESET: &str = "\x1b[0m";

/// Prints the tool banner.
pub fn header() {
    eprintln!();
    eprintln!("  {BOLD}grokdock{RESET} {DIM}v{}{RESET}", env!("CARGO_PKG_VERSION"));
    eprintln!();
}

/// Announces a step.
pub fn step(label: &str, detail: &str) {
    eprintln!("  {CYAN}{BOLD}{label}{RESET} {detail}");
}

/// Reports success.
pub fn ok(message: &str) {
    eprintln!("  {GREEN}✓{RESET} {message}");
}

/// Reports a non-fatal finding.
pub fn warn(message: &str) {
    eprintln!("  {YELLOW}!{RESET} {message}");
}

/// Prints a dimmed note.
pub fn note(message: &str) {
    eprintln!("  {DIM}{message}{RESET}");
}

/// Reports the fatal error that ends the run.
pub fn failure(error: &anyhow::Error) {
    eprintln!();
    eprintln!("  {RED}{BOLD}Error:{RESET} {error}");
    for cause in error.chain().skip(1) {
        eprintln!("         {DIM}caused by: {cause}{RESET}");
    }
}

/// Prints the smoke findings.
pub fn smoke_report(outcome: &SmokeOutcome) {
    ok(&format!(
        "{} ready after {}",
        outcome.image,
        format_duration(outcome.ready_after)
    ));
    if outcome.report.is_clean() {
        ok("Smoke checks passed");
        return;
    }
    for warning in &outcome.report.warnings {
        warn(&warning.to_string());
    }
    note(&format!(
        "{} warning(s); smoke findings do not fail the run",
        outcome.report.warnings.len()
    ));
}

/// Prints one line per suite check and a summary.
pub fn suite_report(report: &SuiteReport) {
    eprintln!();
    for check in &report.checks {
        eprintln!("{}", check_line(check));
    }
    eprintln!();
    let failed = report.failures().count();
    if failed == 0 {
        ok(&format!("All {} checks passed", report.checks.len()));
    } else {
        eprintln!(
            "  {RED}{BOLD}{failed} of {} checks failed{RESET}",
            report.checks.len()
        );
    }
}

/// Prints what the publisher did.
pub fn publish_outcome(outcome: &PublishOutcome) {
    match outcome {
        PublishOutcome::Skipped(reason) => note(&format!("Publish skipped: {reason}")),
        PublishOutcome::Planned(images) => {
            step("Dry run", "would push:");
            for image in images {
                eprintln!("    {DIM}→{RESET} {image}");
            }
        }
        PublishOutcome::Pushed(images) => {
            for image in images {
                ok(&format!("Pushed {BOLD}{image}{RESET}"));
            }
        }
    }
}

/// Formats one suite check as a status line.
#[must_use]
pub fn check_line(check: &CheckOutcome) -> String {
    let (mark, color) = if check.passed {
        ("✓", GREEN)
    } else {
        ("✗", RED)
    };
    format!(
        "  {color}{mark}{RESET} {:>2}. {}  {DIM}{} ({}){RESET}",
        check.order,
        check.name,
        check.message,
        format_duration(Duration::from_millis(check.duration_ms))
    )
}

/// Formats a duration compactly (e.g., "850ms", "12.0s", "3m05s").
#[must_use]
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 60 {
        format!("{}m{:02}s", secs / 60, secs % 60)
    } else if secs > 0 {
        format!("{:.1}s", d.as_secs_f64())
    } else {
        format!("{}ms", d.as_millis())
    }
}
