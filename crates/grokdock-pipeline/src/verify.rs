//! Advisory smoke verification of a ready container.
//!
//! Only unwritable mounts are fatal here. Slow endpoints, ownership drift,
//! error-level log lines and checks the runtime could not answer become
//! [`Warning`]s in the [`SmokeReport`]: this run informs, the structured
//! suite gates.

use std::fmt;

use grokdock_common::constants::{DATA_MOUNT, ERROR_LINE_PREFIXES, SRC_MOUNT};
use grokdock_common::error::{CiError, Result};
use grokdock_common::types::ContainerId;
use grokdock_runtime::logs;

use crate::context::RunContext;
use crate::probes;

/// A non-fatal finding of the smoke run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// The web endpoint never answered 200.
    WebUnavailable {
        /// Attempts made.
        attempts: u32,
        /// Status of the last response, if any arrived.
        last_status: Option<u16>,
    },
    /// The REST API did not respond at all.
    ApiNoResponse,
    /// A container port was not published.
    PortUnpublished {
        /// Container port.
        port: u16,
    },
    /// A mount has unexpected ownership.
    OwnershipMismatch {
        /// In-container path.
        path: String,
        /// Observed `owner:group`.
        actual: String,
        /// Expected `owner:group`.
        expected: String,
    },
    /// The log contains error-level lines.
    ErrorLines {
        /// Number of matching lines.
        count: usize,
    },
    /// The runtime failed while a check was running.
    CheckFailed {
        /// Check that could not complete.
        check: &'static str,
        /// Runtime error.
        message: String,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WebUnavailable {
                attempts,
                last_status: Some(status),
            } => write!(f, "web endpoint returned {status} after {attempts} attempt(s)"),
            Self::WebUnavailable {
                attempts,
                last_status: None,
            } => write!(f, "web endpoint did not respond after {attempts} attempt(s)"),
            Self::ApiNoResponse => write!(f, "REST API did not respond"),
            Self::PortUnpublished { port } => write!(f, "container port {port} is not published"),
            Self::OwnershipMismatch {
                path,
                actual,
                expected,
            } => write!(f, "{path} is owned by {actual}, expected {expected}"),
            Self::ErrorLines { count } => write!(f, "{count} error line(s) in container log"),
            Self::CheckFailed { check, message } => write!(f, "{check} check could not run: {message}"),
        }
    }
}

/// Everything the smoke run observed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SmokeReport {
    /// Status of the web endpoint's last response.
    pub web_status: Option<u16>,
    /// Status of the REST API's response.
    pub api_status: Option<u16>,
    /// Ownership per mount.
    pub ownership: Vec<(String, String)>,
    /// Error-level log lines counted.
    pub error_lines: usize,
    /// Non-fatal findings, in check order.
    pub warnings: Vec<Warning>,
}

impl SmokeReport {
    /// Returns whether the run produced no warnings.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Runs every smoke check in order against a ready container.
///
/// # Errors
///
/// Returns `CiError::MountNotWritable` for the first unwritable mount,
/// `CiError::Interrupted` on cancellation, or a runtime failure while
/// resolving endpoints or testing writability.
pub fn verify(ctx: &RunContext<'_>, id: &ContainerId) -> Result<SmokeReport> {
    let mut report = SmokeReport::default();

    check_web(ctx, id, &mut report)?;
    check_api(ctx, id, &mut report)?;
    check_writable(ctx, id)?;
    let ownership = check_ownership(ctx, id, &mut report);
    advisory(&mut report, "ownership", ownership)?;
    let log_scan = check_logs(ctx, id, &mut report);
    advisory(&mut report, "log scan", log_scan)?;

    for warning in &report.warnings {
        tracing::warn!(%warning, "smoke check");
    }
    tracing::info!(warnings = report.warnings.len(), "smoke verification finished");
    Ok(report)
}

fn check_web(ctx: &RunContext<'_>, id: &ContainerId, report: &mut SmokeReport) -> Result<()> {
    let port = ctx.config.web_port;
    let Some(url) = probes::endpoint_url(ctx, id, port)? else {
        report.warnings.push(Warning::PortUnpublished { port });
        return Ok(());
    };
    let timings = &ctx.config.timings;
    let got = probes::get_with_retries(ctx, &url, timings.web_attempts, timings.web_retry_delay())?;
    report.web_status = got.response.as_ref().map(|r| r.status);
    if report.web_status == Some(200) {
        tracing::info!(url, attempts = got.attempts, "web endpoint OK");
    } else {
        report.warnings.push(Warning::WebUnavailable {
            attempts: got.attempts,
            last_status: report.web_status,
        });
    }
    Ok(())
}

fn check_api(ctx: &RunContext<'_>, id: &ContainerId, report: &mut SmokeReport) -> Result<()> {
    let port = ctx.config.rest_port;
    let Some(url) = probes::endpoint_url(ctx, id, port)? else {
        report.warnings.push(Warning::PortUnpublished { port });
        return Ok(());
    };
    ctx.cancel.check()?;
    report.api_status = ctx.http.get(&url).map(|r| r.status);
    match report.api_status {
        Some(status) => tracing::info!(url, status, "REST API responding"),
        None => report.warnings.push(Warning::ApiNoResponse),
    }
    Ok(())
}

fn check_writable(ctx: &RunContext<'_>, id: &ContainerId) -> Result<()> {
    for path in [SRC_MOUNT, DATA_MOUNT] {
        if !probes::is_writable(ctx, id, path)? {
            return Err(CiError::MountNotWritable {
                path: path.to_string(),
            });
        }
        tracing::info!(path, "mount writable");
    }
    Ok(())
}

fn check_ownership(ctx: &RunContext<'_>, id: &ContainerId, report: &mut SmokeReport) -> Result<()> {
    let expected = &ctx.config.expected_owner;
    for path in [SRC_MOUNT, DATA_MOUNT] {
        let actual = probes::ownership(ctx, id, path)?;
        if &actual != expected {
            report.warnings.push(Warning::OwnershipMismatch {
                path: path.to_string(),
                actual: actual.clone(),
                expected: expected.clone(),
            });
        }
        report.ownership.push((path.to_string(), actual));
    }
    Ok(())
}

fn check_logs(ctx: &RunContext<'_>, id: &ContainerId, report: &mut SmokeReport) -> Result<()> {
    let text = ctx.runtime.logs(id)?;
    report.error_lines = logs::count_error_lines(&text, ERROR_LINE_PREFIXES);
    if report.error_lines > 0 {
        report.warnings.push(Warning::ErrorLines {
            count: report.error_lines,
        });
    }
    Ok(())
}

/// Records a runtime failure of an advisory check as a warning. Only an
/// interrupt propagates.
fn advisory(report: &mut SmokeReport, check: &'static str, result: Result<()>) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(CiError::Interrupted) => Err(CiError::Interrupted),
        Err(e) => {
            tracing::debug!(check, error = %e, "advisory check failed");
            report.warnings.push(Warning::CheckFailed {
                check,
                message: e.to_string(),
            });
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use grokdock_common::config::CiConfig;
    use grokdock_common::types::ImageRef;
    use grokdock_runtime::backend::RunSpec;
    use grokdock_runtime::clock::Clock;
    use grokdock_runtime::exec::ExecOutput;
    use grokdock_runtime::fakes::{FakeClock, FakeHttp, FakeRuntime};
    use grokdock_runtime::http::HttpResponse;

    use super::*;
    use crate::readiness::start_container;

    fn run(rt: &FakeRuntime, http: &FakeHttp, clock: &FakeClock) -> Result<SmokeReport> {
        let config = CiConfig::default();
        let ctx = RunContext::new(&config, rt, http, clock);
        let id = start_container(
            &ctx,
            &RunSpec {
                name: "n".into(),
                image: ImageRef::new("opengrok/docker", "master"),
                mounts: vec![],
                ports: vec![8080, 5000],
            },
        )?;
        verify(&ctx, &id)
    }

    #[test]
    fn healthy_container_produces_clean_report() {
        let clock = FakeClock::new();
        let rt = FakeRuntime::healthy(clock.clone());
        let report = run(&rt, &FakeHttp::healthy(), &clock).expect("verify");
        assert!(report.is_clean(), "unexpected warnings: {:?}", report.warnings);
        assert_eq!(report.web_status, Some(200));
        assert_eq!(report.api_status, Some(404));
    }

    #[test]
    fn unreachable_web_is_a_warning_after_three_attempts() {
        let clock = FakeClock::new();
        let rt = FakeRuntime::healthy(clock.clone());
        let http = FakeHttp::new().script(5000, [Some(HttpResponse::new(404, ""))]);
        let report = run(&rt, &http, &clock).expect("verify");

        assert_eq!(http.requests_to(8080), 3);
        assert_eq!(clock.now(), Duration::from_secs(10));
        assert_eq!(
            report.warnings,
            [Warning::WebUnavailable {
                attempts: 3,
                last_status: None
            }]
        );
    }

    #[test]
    fn silent_api_is_a_warning() {
        let clock = FakeClock::new();
        let rt = FakeRuntime::healthy(clock.clone());
        let http = FakeHttp::new().script(8080, [Some(HttpResponse::new(200, "OpenGrok"))]);
        let report = run(&rt, &http, &clock).expect("verify");
        assert_eq!(report.warnings, [Warning::ApiNoResponse]);
        assert_eq!(http.requests_to(5000), 1);
    }

    #[test]
    fn unwritable_mount_is_fatal() {
        let clock = FakeClock::new();
        let rt = FakeRuntime::healthy(clock.clone())
            .respond("test -w /opengrok/data", ExecOutput::failed(1, ""));
        let err = run(&rt, &FakeHttp::healthy(), &clock).unwrap_err();
        assert!(matches!(err, CiError::MountNotWritable { path } if path == "/opengrok/data"));
        assert_eq!(rt.count("exec stat"), 0, "ownership must not run after a fatal check");
    }

    #[test]
    fn ownership_mismatch_is_only_a_warning() {
        let clock = FakeClock::new();
        let rt = FakeRuntime::healthy(clock.clone())
            .respond("stat -c %U:%G /opengrok/src", ExecOutput::ok("root:root\n"));
        let report = run(&rt, &FakeHttp::healthy(), &clock).expect("verify");
        assert_eq!(
            report.warnings,
            [Warning::OwnershipMismatch {
                path: "/opengrok/src".into(),
                actual: "root:root".into(),
                expected: "appuser:appgroup".into(),
            }]
        );
    }

    #[test]
    fn error_log_lines_are_counted_as_a_warning() {
        let clock = FakeClock::new();
        let rt = FakeRuntime::healthy(clock.clone())
            .log_line("ERROR indexer: cannot read /opengrok/src/broken")
            .log_line("SEVERE: Context initialization failed");
        let report = run(&rt, &FakeHttp::healthy(), &clock).expect("verify");
        assert_eq!(report.error_lines, 2);
        assert_eq!(report.warnings, [Warning::ErrorLines { count: 2 }]);
    }

    #[test]
    fn runtime_failure_during_ownership_is_a_warning() {
        let clock = FakeClock::new();
        let rt = FakeRuntime::healthy(clock.clone()).failing("exec stat -c %U:%G /opengrok/data");
        let report = run(&rt, &FakeHttp::healthy(), &clock).expect("verify");

        assert!(matches!(
            report.warnings.as_slice(),
            [Warning::CheckFailed { check: "ownership", .. }]
        ));
        assert_eq!(report.ownership, [("/opengrok/src".to_string(), "appuser:appgroup".to_string())]);
        assert_eq!(rt.count("logs"), 1, "log scan still runs");
    }

    #[test]
    fn runtime_failure_during_log_scan_is_a_warning() {
        let clock = FakeClock::new();
        let rt = FakeRuntime::healthy(clock.clone()).failing("logs");
        let report = run(&rt, &FakeHttp::healthy(), &clock).expect("verify");

        assert_eq!(report.error_lines, 0);
        assert_eq!(report.ownership.len(), 2);
        assert!(matches!(
            report.warnings.as_slice(),
            [Warning::CheckFailed { check: "log scan", message }] if message.contains("Docker daemon")
        ));
    }

    #[test]
    fn unpublished_port_is_reported() {
        let clock = FakeClock::new();
        let rt = FakeRuntime::healthy(clock.clone()).unpublished(5000);
        let report = run(&rt, &FakeHttp::healthy(), &clock).expect("verify");
        assert_eq!(report.warnings, [Warning::PortUnpublished { port: 5000 }]);
    }

    #[test]
    fn warnings_render_readably() {
        let w = Warning::WebUnavailable {
            attempts: 3,
            last_status: Some(503),
        };
        assert_eq!(w.to_string(), "web endpoint returned 503 after 3 attempt(s)");
    }
}
