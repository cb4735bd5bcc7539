//! In-memory stand-ins for the process, container, HTTP and clock seams.
//!
//! Enabled with the `fakes` feature; the pipeline crate's tests drive the
//! whole build-poll-verify-cleanup-publish flow through these.

#![allow(clippy::missing_panics_doc)]

use std::collections::{HashMap, VecDeque};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use grokdock_common::constants;
use grokdock_common::error::{CiError, Result};
use grokdock_common::types::{ContainerId, ImageRef};

use crate::backend::{ContainerRuntime, ImageRegistry, RunSpec};
use crate::clock::Clock;
use crate::exec::ExecOutput;
use crate::http::{HttpProbe, HttpResponse};
use crate::process::{CommandSpec, ProcessRunner};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Process runner
// ---------------------------------------------------------------------------

/// Runner that records every command and answers from a prefix table.
///
/// Commands with no matching prefix succeed with empty output.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    responses: Mutex<Vec<(String, ExecOutput)>>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl RecordingRunner {
    /// Creates a runner with no scripted responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers commands whose command line starts with `prefix`.
    pub fn respond(&self, prefix: impl Into<String>, output: ExecOutput) {
        lock(&self.responses).push((prefix.into(), output));
    }

    /// Every command run so far.
    #[must_use]
    pub fn calls(&self) -> Vec<CommandSpec> {
        lock(&self.calls).clone()
    }

    /// Command lines of every command run so far.
    #[must_use]
    pub fn command_lines(&self) -> Vec<String> {
        lock(&self.calls).iter().map(CommandSpec::command_line).collect()
    }
}

impl ProcessRunner for RecordingRunner {
    fn run(&self, spec: &CommandSpec) -> Result<ExecOutput> {
        lock(&self.calls).push(spec.clone());
        let line = spec.command_line();
        Ok(lock(&self.responses)
            .iter()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
            .map(|(_, out)| out.clone())
            .unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Clock that only advances when slept on.
#[derive(Debug, Default)]
pub struct FakeClock {
    now: Mutex<Duration>,
}

impl FakeClock {
    /// Creates a clock at time zero.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Moves time forward without a sleep call.
    pub fn advance(&self, by: Duration) {
        *lock(&self.now) += by;
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Duration {
        *lock(&self.now)
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

// ---------------------------------------------------------------------------
// Container runtime and registry
// ---------------------------------------------------------------------------

/// Scripted container engine whose behaviour follows a [`FakeClock`].
///
/// The container becomes ready (its log gains the startup marker) once
/// `ready_after` has elapsed since start, and stops running once
/// `exits_after` has elapsed.
#[derive(Debug)]
pub struct FakeRuntime {
    clock: Arc<FakeClock>,
    start_id: String,
    start_error: Option<String>,
    ready_after: Option<Duration>,
    exits_after: Option<Duration>,
    base_logs: Vec<String>,
    exec_responses: Vec<(String, ExecOutput)>,
    unpublished_ports: Vec<u16>,
    build_error: Option<String>,
    login_error: Option<String>,
    push_failures: Vec<String>,
    failing_calls: Vec<String>,
    state: Mutex<FakeState>,
}

#[derive(Debug, Default)]
struct FakeState {
    started_at: Option<Duration>,
    stopped: bool,
    removed: bool,
    calls: Vec<String>,
}

impl FakeRuntime {
    /// Creates a runtime whose container never becomes ready and never exits.
    #[must_use]
    pub fn new(clock: Arc<FakeClock>) -> Self {
        Self {
            clock,
            start_id: "f4ke0c0nta1ner".into(),
            start_error: None,
            ready_after: None,
            exits_after: None,
            base_logs: vec!["Starting OpenGrok container".into()],
            exec_responses: Vec::new(),
            unpublished_ports: Vec::new(),
            build_error: None,
            login_error: None,
            push_failures: Vec::new(),
            failing_calls: Vec::new(),
            state: Mutex::new(FakeState::default()),
        }
    }

    /// A container that becomes ready after 12 seconds and passes every
    /// in-container check.
    #[must_use]
    pub fn healthy(clock: Arc<FakeClock>) -> Self {
        let owner = ExecOutput::ok(format!("{}\n", constants::EXPECTED_OWNER));
        Self::new(clock)
            .ready_after(Duration::from_secs(12))
            .respond("stat -c %U:%G", owner)
            .respond(
                "ps aux",
                ExecOutput::ok(
                    "USER PID COMMAND\n\
                     root 1 /bin/sh /scripts/start.sh\n\
                     appuser 42 /opt/java/bin/java org.apache.catalina.startup.Bootstrap start\n",
                ),
            )
    }

    /// Sets the handle returned by `start`.
    #[must_use]
    pub fn start_id(mut self, id: impl Into<String>) -> Self {
        self.start_id = id.into();
        self
    }

    /// Makes `start` fail with the given engine message.
    #[must_use]
    pub fn start_error(mut self, message: impl Into<String>) -> Self {
        self.start_error = Some(message.into());
        self
    }

    /// Emits the startup marker once `after` has elapsed.
    #[must_use]
    pub const fn ready_after(mut self, after: Duration) -> Self {
        self.ready_after = Some(after);
        self
    }

    /// Stops the container once `after` has elapsed.
    #[must_use]
    pub const fn exits_after(mut self, after: Duration) -> Self {
        self.exits_after = Some(after);
        self
    }

    /// Appends a line that is always present in the log.
    #[must_use]
    pub fn log_line(mut self, line: impl Into<String>) -> Self {
        self.base_logs.push(line.into());
        self
    }

    /// Answers `exec` commands whose joined text starts with `prefix`.
    /// Later registrations take precedence.
    #[must_use]
    pub fn respond(mut self, prefix: impl Into<String>, output: ExecOutput) -> Self {
        self.exec_responses.insert(0, (prefix.into(), output));
        self
    }

    /// Leaves a container port unpublished.
    #[must_use]
    pub fn unpublished(mut self, port: u16) -> Self {
        self.unpublished_ports.push(port);
        self
    }

    /// Makes `build` fail.
    #[must_use]
    pub fn build_error(mut self, message: impl Into<String>) -> Self {
        self.build_error = Some(message.into());
        self
    }

    /// Makes `login` fail.
    #[must_use]
    pub fn login_error(mut self, message: impl Into<String>) -> Self {
        self.login_error = Some(message.into());
        self
    }

    /// Makes `push` fail for the given tag.
    #[must_use]
    pub fn push_failure(mut self, tag: impl Into<String>) -> Self {
        self.push_failures.push(tag.into());
        self
    }

    /// Makes `logs` and `exec` calls whose text starts with `prefix` fail
    /// as if the engine could not be reached, e.g. `logs` or
    /// `exec stat -c %U:%G /opengrok/data`.
    #[must_use]
    pub fn failing(mut self, prefix: impl Into<String>) -> Self {
        self.failing_calls.push(prefix.into());
        self
    }

    /// Every call made so far, e.g. `start`, `stop <id>`, `push repo:tag`.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        lock(&self.state).calls.clone()
    }

    /// Number of calls whose text starts with `prefix`.
    #[must_use]
    pub fn count(&self, prefix: &str) -> usize {
        lock(&self.state)
            .calls
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    /// Returns whether the most recently started container has been removed.
    #[must_use]
    pub fn is_removed(&self) -> bool {
        lock(&self.state).removed
    }

    fn record(&self, call: String) {
        lock(&self.state).calls.push(call);
    }

    fn since_start(&self) -> Option<Duration> {
        lock(&self.state)
            .started_at
            .map(|at| self.clock.now().saturating_sub(at))
    }

    fn check_failing(&self, call: &str) -> Result<()> {
        if self.failing_calls.iter().any(|prefix| call.starts_with(prefix.as_str())) {
            return Err(CiError::CommandFailed {
                program: "docker".into(),
                code: 1,
                stderr: "Cannot connect to the Docker daemon".into(),
            });
        }
        Ok(())
    }

    fn check_known(&self, id: &ContainerId) -> Result<()> {
        let state = lock(&self.state);
        if state.started_at.is_none() || state.removed || id.as_str() != self.start_id {
            return Err(CiError::CommandFailed {
                program: "docker".into(),
                code: 1,
                stderr: format!("No such container: {id}"),
            });
        }
        Ok(())
    }
}

impl ContainerRuntime for FakeRuntime {
    fn start(&self, spec: &RunSpec) -> Result<ContainerId> {
        self.record(format!("start {}", spec.image));
        if let Some(message) = &self.start_error {
            return Err(CiError::ContainerStart {
                message: message.clone(),
            });
        }
        let mut state = lock(&self.state);
        state.started_at = Some(self.clock.now());
        state.stopped = false;
        state.removed = false;
        Ok(ContainerId::new(self.start_id.clone()))
    }

    fn is_running(&self, id: &ContainerId) -> Result<bool> {
        self.record(format!("inspect {id}"));
        if self.check_known(id).is_err() || lock(&self.state).stopped {
            return Ok(false);
        }
        let elapsed = self.since_start().unwrap_or_default();
        Ok(self.exits_after.is_none_or(|exit| elapsed < exit))
    }

    fn logs(&self, id: &ContainerId) -> Result<String> {
        let call = format!("logs {id}");
        self.record(call.clone());
        self.check_known(id)?;
        self.check_failing(&call)?;
        let mut lines = self.base_logs.clone();
        let elapsed = self.since_start().unwrap_or_default();
        if self.ready_after.is_some_and(|ready| elapsed >= ready) {
            lines.push(format!("{} 1234 ms", constants::STARTUP_MARKER));
        }
        Ok(lines.join("\n") + "\n")
    }

    fn exec(&self, id: &ContainerId, cmd: &[&str]) -> Result<ExecOutput> {
        let line = cmd.join(" ");
        let call = format!("exec {line}");
        self.record(call.clone());
        self.check_known(id)?;
        self.check_failing(&call)?;
        Ok(self
            .exec_responses
            .iter()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
            .map(|(_, out)| out.clone())
            .unwrap_or_else(|| ExecOutput::ok("")))
    }

    fn published_port(&self, id: &ContainerId, port: u16) -> Result<Option<SocketAddr>> {
        self.record(format!("port {id} {port}"));
        if self.check_known(id).is_err() || self.unpublished_ports.contains(&port) {
            return Ok(None);
        }
        Ok(Some(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)))
    }

    fn stop(&self, id: &ContainerId) -> Result<()> {
        self.record(format!("stop {id}"));
        self.check_known(id)?;
        lock(&self.state).stopped = true;
        Ok(())
    }

    fn remove(&self, id: &ContainerId) -> Result<()> {
        self.record(format!("remove {id}"));
        self.check_known(id)?;
        lock(&self.state).removed = true;
        Ok(())
    }
}

impl ImageRegistry for FakeRuntime {
    fn build(&self, _dockerfile: &Path, _context: &Path, tags: &[ImageRef]) -> Result<()> {
        let names: Vec<String> = tags.iter().map(ToString::to_string).collect();
        self.record(format!("build {}", names.join(" ")));
        if let Some(message) = &self.build_error {
            return Err(CiError::CommandFailed {
                program: "docker build".into(),
                code: 1,
                stderr: message.clone(),
            });
        }
        Ok(())
    }

    fn login(&self, _registry: Option<&str>, username: &str, _token: &str) -> Result<()> {
        self.record(format!("login {username}"));
        if let Some(message) = &self.login_error {
            return Err(CiError::CommandFailed {
                program: "docker login".into(),
                code: 1,
                stderr: message.clone(),
            });
        }
        Ok(())
    }

    fn push(&self, image: &ImageRef) -> Result<()> {
        self.record(format!("push {image}"));
        if self.push_failures.contains(&image.tag) {
            return Err(CiError::CommandFailed {
                program: "docker push".into(),
                code: 1,
                stderr: format!("denied: {image}"),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

/// Probe that answers per port from a script.
///
/// Each request consumes the next scripted answer; the last one repeats.
/// Ports without a script never respond.
#[derive(Debug, Default)]
pub struct FakeHttp {
    scripts: Mutex<HashMap<u16, VecDeque<Option<HttpResponse>>>>,
    requests: Mutex<Vec<String>>,
}

impl FakeHttp {
    /// Creates a probe where nothing responds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A probe where the web port serves the UI and the API port answers 404.
    #[must_use]
    pub fn healthy() -> Self {
        Self::new()
            .script(
                constants::WEB_PORT,
                [Some(HttpResponse::new(200, "<title>OpenGrok</title>"))],
            )
            .script(constants::REST_PORT, [Some(HttpResponse::new(404, ""))])
    }

    /// Sets the answers for a port.
    #[must_use]
    pub fn script(
        self,
        port: u16,
        answers: impl IntoIterator<Item = Option<HttpResponse>>,
    ) -> Self {
        let _ = lock(&self.scripts).insert(port, answers.into_iter().collect());
        self
    }

    /// Number of requests made to a port.
    #[must_use]
    pub fn requests_to(&self, port: u16) -> usize {
        lock(&self.requests)
            .iter()
            .filter(|url| url_port(url) == Some(port))
            .count()
    }
}

impl HttpProbe for FakeHttp {
    fn get(&self, url: &str) -> Option<HttpResponse> {
        lock(&self.requests).push(url.to_string());
        let port = url_port(url)?;
        let mut scripts = lock(&self.scripts);
        let answers = scripts.get_mut(&port)?;
        if answers.len() > 1 {
            answers.pop_front().flatten()
        } else {
            answers.front().cloned().flatten()
        }
    }
}

fn url_port(url: &str) -> Option<u16> {
    url.trim_end_matches('/').rsplit(':').next()?.parse().ok()
}
