//! Ordered, gating verification of the image.
//!
//! One container is started for the whole suite and the checks run against
//! it in a fixed order. Every check runs and is recorded even if an earlier
//! one failed; the suite fails if any check did.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use grokdock_common::constants::{
    APP_USER, DATA_MOUNT, ETC_DIR, FATAL_MARKER, INDEX_DIR, SAMPLE_SOURCE_NAME, SRC_MOUNT,
    STARTUP_MARKER, WEB_BODY_MARKERS, WEBAPPS_DIR,
};
use grokdock_common::error::{CiError, Result};
use grokdock_common::types::{ContainerId, ImageRef};
use serde::Serialize;

use crate::context::RunContext;
use crate::probes;
use crate::readiness::ReadinessPolicy;
use crate::smoke;

/// Paths every image must provide.
const REQUIRED_PATHS: [&str; 4] = [SRC_MOUNT, DATA_MOUNT, ETC_DIR, WEBAPPS_DIR];

/// Verdict of a single check: `Ok` carries a pass note, `Err` the failure.
pub type Verdict = std::result::Result<String, String>;

/// A named, ordered check.
#[derive(Clone, Copy)]
pub struct Check {
    /// Position in the suite, starting at 1.
    pub order: u8,
    /// Human-readable name.
    pub name: &'static str,
    run: fn(&RunContext<'_>, &ContainerId) -> Result<Verdict>,
}

impl std::fmt::Debug for Check {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Check")
            .field("order", &self.order)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// The ten checks, in execution order.
pub const CHECKS: [Check; 10] = [
    Check {
        order: 1,
        name: "container is running",
        run: container_running,
    },
    Check {
        order: 2,
        name: "required directories exist",
        run: required_directories,
    },
    Check {
        order: 3,
        name: "file ownership is correct",
        run: file_ownership,
    },
    Check {
        order: 4,
        name: "volume mounts are writable",
        run: mounts_writable,
    },
    Check {
        order: 5,
        name: "web interface serves the UI",
        run: web_interface,
    },
    Check {
        order: 6,
        name: "REST API is responding",
        run: rest_api,
    },
    Check {
        order: 7,
        name: "logs show clean startup",
        run: clean_logs,
    },
    Check {
        order: 8,
        name: "indexer creates the index",
        run: index_created,
    },
    Check {
        order: 9,
        name: "source files are visible",
        run: source_visible,
    },
    Check {
        order: 10,
        name: "Tomcat runs as non-root",
        run: non_root_tomcat,
    },
];

/// Recorded result of one check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckOutcome {
    /// Position in the suite.
    pub order: u8,
    /// Check name.
    pub name: String,
    /// Whether the check passed.
    pub passed: bool,
    /// Pass note or failure reason.
    pub message: String,
    /// Time spent in the check.
    pub duration_ms: u64,
}

/// Results of a suite run.
#[derive(Debug, Clone, Serialize)]
pub struct SuiteReport {
    /// Image under test.
    pub image: String,
    /// Wall-clock start of the run.
    pub started_at: DateTime<Utc>,
    /// Seconds the container took to become ready.
    pub ready_after_secs: u64,
    /// Per-check results in order.
    pub checks: Vec<CheckOutcome>,
}

impl SuiteReport {
    /// Returns whether every check passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    /// The failed checks.
    pub fn failures(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.checks.iter().filter(|c| !c.passed)
    }

    /// Converts a failed report into `CiError::SuiteFailed`.
    ///
    /// # Errors
    ///
    /// Returns `CiError::SuiteFailed` if any check failed.
    pub fn into_result(self) -> Result<Self> {
        let failed = self.failures().count();
        if failed == 0 {
            Ok(self)
        } else {
            Err(CiError::SuiteFailed {
                failed,
                total: self.checks.len(),
            })
        }
    }

    /// Writes the report as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| CiError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Runs the suite against `image`.
///
/// Setup (scratch volumes with a sample source, container start, the
/// readiness wait) is fatal on failure. After that every check runs; the
/// returned report records which failed. Teardown runs on every path.
///
/// # Errors
///
/// Returns setup failures and `CiError::Interrupted`; failed checks are
/// reported, not returned.
pub fn run_suite(ctx: &RunContext<'_>, image: &ImageRef) -> Result<SuiteReport> {
    let started_at = Utc::now();
    tracing::info!(%image, checks = CHECKS.len(), "verification suite starting");

    let (mut guard, id, ready_after) =
        smoke::launch(ctx, image, true, &ReadinessPolicy::suite(ctx.config))?;

    let mut checks = Vec::with_capacity(CHECKS.len());
    for check in &CHECKS {
        checks.push(run_check(ctx, &id, check)?);
    }
    guard.release();

    let report = SuiteReport {
        image: image.to_string(),
        started_at,
        ready_after_secs: ready_after.as_secs(),
        checks,
    };
    tracing::info!(
        passed = report.checks.len() - report.failures().count(),
        failed = report.failures().count(),
        "verification suite finished"
    );
    Ok(report)
}

fn run_check(ctx: &RunContext<'_>, id: &ContainerId, check: &Check) -> Result<CheckOutcome> {
    ctx.cancel.check()?;
    let start = ctx.clock.now();
    let verdict = match (check.run)(ctx, id) {
        Ok(verdict) => verdict,
        Err(CiError::Interrupted) => return Err(CiError::Interrupted),
        Err(e) => Err(e.to_string()),
    };
    let duration = ctx.clock.now().saturating_sub(start);

    let (passed, message) = match verdict {
        Ok(note) => {
            tracing::info!(order = check.order, check = check.name, "check passed");
            (true, note)
        }
        Err(reason) => {
            tracing::error!(order = check.order, check = check.name, %reason, "check failed");
            (false, reason)
        }
    };
    Ok(CheckOutcome {
        order: check.order,
        name: check.name.to_string(),
        passed,
        message,
        duration_ms: millis(duration),
    })
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn container_running(ctx: &RunContext<'_>, id: &ContainerId) -> Result<Verdict> {
    Ok(if ctx.runtime.is_running(id)? {
        Ok(format!("container {} is running", id.short()))
    } else {
        Err(format!("container {} is not running", id.short()))
    })
}

fn required_directories(ctx: &RunContext<'_>, id: &ContainerId) -> Result<Verdict> {
    let mut missing = Vec::new();
    for path in REQUIRED_PATHS {
        if !probes::path_exists(ctx, id, path)? {
            missing.push(path);
        }
    }
    Ok(if missing.is_empty() {
        Ok(format!("{} paths present", REQUIRED_PATHS.len()))
    } else {
        Err(format!("missing: {}", missing.join(", ")))
    })
}

fn file_ownership(ctx: &RunContext<'_>, id: &ContainerId) -> Result<Verdict> {
    let expected = &ctx.config.expected_owner;
    let mut wrong = Vec::new();
    for path in REQUIRED_PATHS {
        let actual = probes::ownership(ctx, id, path)?;
        if &actual != expected {
            wrong.push(format!("{path} is {actual}"));
        }
    }
    Ok(if wrong.is_empty() {
        Ok(format!("all owned by {expected}"))
    } else {
        Err(format!("expected {expected}: {}", wrong.join(", ")))
    })
}

fn mounts_writable(ctx: &RunContext<'_>, id: &ContainerId) -> Result<Verdict> {
    let mut unwritable = Vec::new();
    for path in [SRC_MOUNT, DATA_MOUNT] {
        if !probes::is_writable(ctx, id, path)? {
            unwritable.push(path);
        }
    }
    Ok(if unwritable.is_empty() {
        Ok("mounts writable".to_string())
    } else {
        Err(format!("not writable: {}", unwritable.join(", ")))
    })
}

fn web_interface(ctx: &RunContext<'_>, id: &ContainerId) -> Result<Verdict> {
    let port = ctx.config.web_port;
    let Some(url) = probes::endpoint_url(ctx, id, port)? else {
        return Ok(Err(format!("port {port} is not published")));
    };
    Ok(match ctx.http.get(&url) {
        None => Err(format!("{url} did not respond")),
        Some(r) if r.status != 200 => Err(format!("{url} returned {}", r.status)),
        Some(r) if !WEB_BODY_MARKERS.iter().any(|m| r.body.contains(m)) => {
            Err(format!("{url} body does not look like the OpenGrok UI"))
        }
        Some(_) => Ok(format!("{url} returned 200")),
    })
}

fn rest_api(ctx: &RunContext<'_>, id: &ContainerId) -> Result<Verdict> {
    let port = ctx.config.rest_port;
    let Some(url) = probes::endpoint_url(ctx, id, port)? else {
        return Ok(Err(format!("port {port} is not published")));
    };
    Ok(match ctx.http.get(&url).map(|r| r.status) {
        Some(status @ (200 | 404)) => Ok(format!("{url} returned {status}")),
        Some(status) => Err(format!("{url} returned {status}, expected 404 or 200")),
        None => Err(format!("{url} did not respond")),
    })
}

fn clean_logs(ctx: &RunContext<'_>, id: &ContainerId) -> Result<Verdict> {
    let text = ctx.runtime.logs(id)?;
    Ok(if text.contains(FATAL_MARKER) {
        Err(format!("log contains {FATAL_MARKER}"))
    } else if !text.contains(STARTUP_MARKER) {
        Err(format!("log lacks {STARTUP_MARKER:?}"))
    } else {
        Ok("startup logged without fatal errors".to_string())
    })
}

fn index_created(ctx: &RunContext<'_>, id: &ContainerId) -> Result<Verdict> {
    ctx.pause(Duration::from_secs(ctx.config.timings.index_wait_secs))?;
    Ok(if probes::path_exists(ctx, id, INDEX_DIR)? {
        Ok(format!("{INDEX_DIR} exists"))
    } else {
        Err(format!("{INDEX_DIR} was not created"))
    })
}

fn source_visible(ctx: &RunContext<'_>, id: &ContainerId) -> Result<Verdict> {
    let path = format!("{SRC_MOUNT}/{SAMPLE_SOURCE_NAME}");
    Ok(if probes::path_exists(ctx, id, &path)? {
        Ok(format!("{path} visible"))
    } else {
        Err(format!("{path} not found in container"))
    })
}

fn non_root_tomcat(ctx: &RunContext<'_>, id: &ContainerId) -> Result<Verdict> {
    let output = ctx.runtime.exec(id, &["ps", "aux"])?;
    if !output.success() {
        return Ok(Err(format!("ps aux failed: {}", output.stderr.trim())));
    }
    Ok(check_process_table(&output.stdout))
}

/// Requires an `appuser` process and no root-owned Tomcat process.
fn check_process_table(table: &str) -> Verdict {
    let rows = table.lines().skip(1).filter_map(|line| {
        let mut fields = line.split_whitespace();
        fields.next().map(|user| (user, line))
    });

    let mut has_app_user = false;
    for (user, line) in rows {
        if user == APP_USER {
            has_app_user = true;
        }
        let lower = line.to_ascii_lowercase();
        if user == "root" && (lower.contains("catalina") || lower.contains("tomcat")) {
            return Err(format!("Tomcat runs as root: {}", line.trim()));
        }
    }
    if has_app_user {
        Ok(format!("processes run as {APP_USER}"))
    } else {
        Err(format!("no process runs as {APP_USER}"))
    }
}
