//! The record threaded through every pipeline step.

use std::path::PathBuf;
use std::time::Duration;

use grokdock_common::config::CiConfig;
use grokdock_runtime::backend::ContainerRuntime;
use grokdock_runtime::clock::Clock;
use grokdock_runtime::http::HttpProbe;

use crate::cancel::CancelToken;

/// Collaborators and settings shared by the container-facing steps.
pub struct RunContext<'a> {
    /// Run configuration.
    pub config: &'a CiConfig,
    /// Container engine.
    pub runtime: &'a dyn ContainerRuntime,
    /// HTTP probe for the published ports.
    pub http: &'a dyn HttpProbe,
    /// Time source for polling and retries.
    pub clock: &'a dyn Clock,
    /// Operator cancellation.
    pub cancel: CancelToken,
    /// Parent directory of the scratch volumes.
    pub scratch_root: PathBuf,
}

impl<'a> RunContext<'a> {
    /// Creates a context with a fresh cancellation token and scratch
    /// volumes under the system temporary directory.
    #[must_use]
    pub fn new(
        config: &'a CiConfig,
        runtime: &'a dyn ContainerRuntime,
        http: &'a dyn HttpProbe,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            config,
            runtime,
            http,
            clock,
            cancel: CancelToken::new(),
            scratch_root: std::env::temp_dir(),
        }
    }

    /// Uses the given cancellation token.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Creates scratch volumes under `root`.
    #[must_use]
    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = root.into();
        self
    }

    /// Sleeps on the context clock unless cancelled first.
    ///
    /// # Errors
    ///
    /// Returns `CiError::Interrupted` if cancellation was requested before
    /// or during the wait.
    pub fn pause(&self, duration: Duration) -> grokdock_common::error::Result<()> {
        self.cancel.check()?;
        self.clock.sleep(duration);
        self.cancel.check()
    }
}
