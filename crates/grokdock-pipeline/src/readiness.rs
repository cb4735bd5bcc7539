//! Container start and readiness polling.
//!
//! The poller is an explicit state machine. [`transition`] is pure over the
//! current state, the elapsed time and one poll observation; [`poll`]
//! feeds it real observations at a fixed interval.
//!
//! ```text
//! Starting ──handle──▶ RunningUnready ──marker──▶ Ready
//!                           │  │
//!                   exited  │  │ elapsed ≥ timeout
//!                           ▼  ▼
//!                     Crashed  Failed
//! ```

use std::fmt;
use std::time::Duration;

use grokdock_common::constants::STARTUP_MARKER;
use grokdock_common::error::{CiError, Result};
use grokdock_common::types::ContainerId;
use grokdock_runtime::backend::RunSpec;
use grokdock_runtime::logs;

use crate::context::RunContext;

/// Lines of container log included when a poll ends badly.
const LOG_DUMP_LINES: usize = 200;

/// Readiness state of the container under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessState {
    /// Start requested, no handle yet.
    Starting,
    /// Container running, startup marker not yet seen.
    RunningUnready,
    /// Startup marker observed while the container was alive.
    Ready,
    /// Bound exhausted without the marker.
    Failed,
    /// Container exited before becoming ready.
    Crashed,
    /// Operator cancelled the wait.
    Interrupted,
}

impl ReadinessState {
    /// Returns whether polling stops in this state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Ready | Self::Failed | Self::Crashed | Self::Interrupted
        )
    }

    /// State after the start call returned `handle`.
    #[must_use]
    pub fn after_start(handle: &ContainerId) -> Self {
        if handle.as_str().trim().is_empty() {
            Self::Starting
        } else {
            Self::RunningUnready
        }
    }
}

impl fmt::Display for ReadinessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Starting => write!(f, "starting"),
            Self::RunningUnready => write!(f, "running (not ready)"),
            Self::Ready => write!(f, "ready"),
            Self::Failed => write!(f, "failed"),
            Self::Crashed => write!(f, "crashed"),
            Self::Interrupted => write!(f, "interrupted"),
        }
    }
}

/// What one poll saw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    /// The container was running.
    pub alive: bool,
    /// The log contained the startup marker.
    pub marker_seen: bool,
}

/// Applies one poll observation.
///
/// Liveness is judged before readiness, so a dead container never counts as
/// ready even if its last log line was the marker. Terminal states absorb.
#[must_use]
pub const fn transition(
    state: ReadinessState,
    elapsed: Duration,
    observation: Observation,
    timeout: Duration,
) -> ReadinessState {
    if state.is_terminal() {
        return state;
    }
    if !observation.alive {
        return ReadinessState::Crashed;
    }
    if observation.marker_seen {
        return ReadinessState::Ready;
    }
    if elapsed.as_nanos() >= timeout.as_nanos() {
        return ReadinessState::Failed;
    }
    ReadinessState::RunningUnready
}

/// Poll cadence, bound and marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessPolicy {
    /// Interval between polls.
    pub interval: Duration,
    /// Total wait before giving up.
    pub timeout: Duration,
    /// Log substring that signals readiness.
    pub marker: String,
}

impl ReadinessPolicy {
    /// Policy with the default startup marker.
    #[must_use]
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            timeout,
            marker: STARTUP_MARKER.to_string(),
        }
    }

    /// Policy of the advisory smoke run.
    #[must_use]
    pub fn smoke(config: &grokdock_common::config::CiConfig) -> Self {
        Self::new(
            config.timings.poll_interval(),
            Duration::from_secs(config.timings.smoke_startup_timeout_secs),
        )
    }

    /// Policy of the structured suite.
    #[must_use]
    pub fn suite(config: &grokdock_common::config::CiConfig) -> Self {
        Self::new(
            config.timings.poll_interval(),
            Duration::from_secs(config.timings.suite_startup_timeout_secs),
        )
    }
}

/// Terminal result of a poll loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOutcome {
    /// Terminal state reached.
    pub state: ReadinessState,
    /// Time from the first poll to the terminal one.
    pub elapsed: Duration,
    /// Number of polls made.
    pub polls: u32,
}

/// Starts the container and returns its handle.
///
/// # Errors
///
/// Returns `CiError::ContainerStart` if the engine fails or hands back an
/// empty handle.
pub fn start_container(ctx: &RunContext<'_>, spec: &RunSpec) -> Result<ContainerId> {
    let id = ctx.runtime.start(spec)?;
    if ReadinessState::after_start(&id) == ReadinessState::Starting {
        return Err(CiError::ContainerStart {
            message: format!("runtime returned an empty handle for {}", spec.image),
        });
    }
    tracing::info!(id = %id.short(), image = %spec.image, "container started");
    Ok(id)
}

/// Polls until the container is ready, has exited, the bound elapses, or
/// the operator cancels.
///
/// # Errors
///
/// Returns an error only if the runtime cannot be queried for liveness.
pub fn poll(ctx: &RunContext<'_>, id: &ContainerId, policy: &ReadinessPolicy) -> Result<PollOutcome> {
    let start = ctx.clock.now();
    let mut state = ReadinessState::RunningUnready;
    let mut polls = 0_u32;

    loop {
        let elapsed = ctx.clock.now().saturating_sub(start);
        if ctx.cancel.is_cancelled() {
            return Ok(PollOutcome {
                state: ReadinessState::Interrupted,
                elapsed,
                polls,
            });
        }

        let alive = ctx.runtime.is_running(id)?;
        let marker_seen = alive && log_has_marker(ctx, id, &policy.marker);
        polls += 1;

        state = transition(state, elapsed, Observation { alive, marker_seen }, policy.timeout);
        tracing::debug!(id = %id.short(), %state, elapsed_secs = elapsed.as_secs(), polls, "readiness poll");
        if state.is_terminal() {
            return Ok(PollOutcome {
                state,
                elapsed,
                polls,
            });
        }
        ctx.clock.sleep(policy.interval);
    }
}

/// Polls and turns every non-ready ending into a fatal error, dumping the
/// container log first.
///
/// # Errors
///
/// Returns `CiError::ContainerCrashed`, `CiError::ReadinessTimeout` or
/// `CiError::Interrupted` for the corresponding terminal state.
pub fn wait_until_ready(
    ctx: &RunContext<'_>,
    id: &ContainerId,
    policy: &ReadinessPolicy,
) -> Result<PollOutcome> {
    tracing::info!(
        id = %id.short(),
        timeout_secs = policy.timeout.as_secs(),
        interval_secs = policy.interval.as_secs(),
        "waiting for container readiness"
    );
    let outcome = poll(ctx, id, policy)?;
    match outcome.state {
        ReadinessState::Ready => {
            tracing::info!(id = %id.short(), elapsed_secs = outcome.elapsed.as_secs(), "container ready");
            Ok(outcome)
        }
        ReadinessState::Crashed => {
            dump_logs(ctx, id);
            Err(CiError::ContainerCrashed {
                id: id.to_string(),
                elapsed_secs: outcome.elapsed.as_secs(),
            })
        }
        ReadinessState::Interrupted => Err(CiError::Interrupted),
        ReadinessState::Failed | ReadinessState::Starting | ReadinessState::RunningUnready => {
            dump_logs(ctx, id);
            Err(CiError::ReadinessTimeout {
                id: id.to_string(),
                timeout_secs: policy.timeout.as_secs(),
            })
        }
    }
}

fn log_has_marker(ctx: &RunContext<'_>, id: &ContainerId, marker: &str) -> bool {
    match ctx.runtime.logs(id) {
        Ok(text) => logs::contains_marker(&text, marker),
        Err(e) => {
            tracing::debug!(id = %id.short(), error = %e, "log read failed during poll");
            false
        }
    }
}

/// Emits the tail of the container log at error level.
pub fn dump_logs(ctx: &RunContext<'_>, id: &ContainerId) {
    match ctx.runtime.logs(id) {
        Ok(text) => tracing::error!(id = %id.short(), logs = %logs::tail(&text, LOG_DUMP_LINES), "container logs"),
        Err(e) => tracing::error!(id = %id.short(), error = %e, "container logs unavailable"),
    }
}
