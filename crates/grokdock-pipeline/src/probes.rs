//! In-container and endpoint probes shared by the smoke run and the suite.

use grokdock_common::error::Result;
use grokdock_common::types::ContainerId;
use grokdock_runtime::http::{self, HttpResponse};

use crate::context::RunContext;

/// Ownership reported when `stat` cannot run.
pub const UNKNOWN_OWNER: &str = "unknown";

/// Returns whether `path` exists inside the container.
///
/// # Errors
///
/// Returns an error if the exec could not be issued.
pub fn path_exists(ctx: &RunContext<'_>, id: &ContainerId, path: &str) -> Result<bool> {
    Ok(ctx.runtime.exec(id, &["test", "-e", path])?.success())
}

/// Returns whether `path` is writable by the container's user.
///
/// # Errors
///
/// Returns an error if the exec could not be issued.
pub fn is_writable(ctx: &RunContext<'_>, id: &ContainerId, path: &str) -> Result<bool> {
    Ok(ctx.runtime.exec(id, &["test", "-w", path])?.success())
}

/// Returns the `owner:group` of `path`, or [`UNKNOWN_OWNER`].
///
/// # Errors
///
/// Returns an error if the exec could not be issued.
pub fn ownership(ctx: &RunContext<'_>, id: &ContainerId, path: &str) -> Result<String> {
    let output = ctx.runtime.exec(id, &["stat", "-c", "%U:%G", path])?;
    if output.success() {
        Ok(output.stdout_trimmed().to_string())
    } else {
        Ok(UNKNOWN_OWNER.to_string())
    }
}

/// Root URL of a published container port, if it is published.
///
/// # Errors
///
/// Returns an error if the runtime cannot be queried.
pub fn endpoint_url(ctx: &RunContext<'_>, id: &ContainerId, port: u16) -> Result<Option<String>> {
    Ok(ctx.runtime.published_port(id, port)?.map(http::root_url))
}

/// Result of a retried GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetriedGet {
    /// Last response seen, if any arrived.
    pub response: Option<HttpResponse>,
    /// Attempts made.
    pub attempts: u32,
}

/// GETs `url` until it answers 200, at most `attempts` times with a fixed
/// `delay` between attempts.
///
/// # Errors
///
/// Returns `CiError::Interrupted` if cancelled between attempts.
pub fn get_with_retries(
    ctx: &RunContext<'_>,
    url: &str,
    attempts: u32,
    delay: std::time::Duration,
) -> Result<RetriedGet> {
    let mut last = None;
    for attempt in 1..=attempts {
        let response = ctx.http.get(url);
        let status = response.as_ref().map(|r| r.status);
        tracing::debug!(url, attempt, ?status, "GET");
        if status == Some(200) {
            return Ok(RetriedGet {
                response,
                attempts: attempt,
            });
        }
        if response.is_some() {
            last = response;
        }
        if attempt < attempts {
            ctx.pause(delay)?;
        }
    }
    Ok(RetriedGet {
        response: last,
        attempts,
    })
}
