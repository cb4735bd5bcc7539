//! Conditional publication of the tag set.
//!
//! The gate is evaluated in a fixed order: pull-request events skip, builds
//! of forks skip, missing credentials fail. Only then does the registry see
//! a single login followed by one push per tag.

use std::fmt;

use grokdock_common::config::CiConfig;
use grokdock_common::error::{CiError, Result};
use grokdock_common::types::{ImageRef, TagSet};
use grokdock_runtime::backend::ImageRegistry;

/// Event names that denote a pull-request build.
pub const PULL_REQUEST_EVENTS: &[&str] = &["pull_request", "pull_request_target", "true"];

/// Environment-derived inputs to the publish gate.
#[derive(Clone, Default)]
pub struct PublishInputs {
    /// CI event that triggered the build.
    pub event: Option<String>,
    /// Repository slug the build runs in.
    pub repo_slug: Option<String>,
    /// Registry user.
    pub username: Option<String>,
    /// Registry token.
    pub token: Option<String>,
}

impl fmt::Debug for PublishInputs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublishInputs")
            .field("event", &self.event)
            .field("repo_slug", &self.repo_slug)
            .field("username", &self.username)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Why publication was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The build was triggered by a pull request.
    PullRequest {
        /// Triggering event.
        event: String,
    },
    /// The build does not run in the canonical repository.
    ForeignRepository {
        /// Slug of the repository the build runs in, if known.
        slug: Option<String>,
    },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PullRequest { event } => write!(f, "pull-request build ({event})"),
            Self::ForeignRepository { slug: Some(slug) } => {
                write!(f, "repository {slug} is not the canonical repository")
            }
            Self::ForeignRepository { slug: None } => write!(f, "repository slug is not set"),
        }
    }
}

/// Outcome of the publish gate.
#[derive(Debug, PartialEq, Eq)]
pub enum Gate<'a> {
    /// Publication proceeds with these credentials.
    Open {
        /// Registry user.
        username: &'a str,
        /// Registry token.
        token: &'a str,
    },
    /// Publication is skipped; the run still succeeds.
    Skip(SkipReason),
}

/// What [`publish`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Nothing was pushed, on purpose.
    Skipped(SkipReason),
    /// Dry run: the gate passed and these images would be pushed.
    Planned(Vec<ImageRef>),
    /// Every image was pushed.
    Pushed(Vec<ImageRef>),
}

/// Returns whether `event` denotes a pull-request build.
#[must_use]
pub fn is_pull_request(event: &str) -> bool {
    PULL_REQUEST_EVENTS.contains(&event.trim())
}

/// Evaluates the gate in order: event, repository, credentials.
///
/// # Errors
///
/// Returns `CiError::MissingCredential` when the gate would otherwise open
/// but the username or token is empty or absent.
pub fn evaluate_gate<'a>(config: &CiConfig, inputs: &'a PublishInputs) -> Result<Gate<'a>> {
    if let Some(event) = inputs.event.as_deref().filter(|e| is_pull_request(e)) {
        return Ok(Gate::Skip(SkipReason::PullRequest {
            event: event.to_string(),
        }));
    }

    let slug = inputs.repo_slug.as_deref().map(str::trim);
    if slug != Some(config.canonical_slug.as_str()) {
        return Ok(Gate::Skip(SkipReason::ForeignRepository {
            slug: slug.filter(|s| !s.is_empty()).map(str::to_string),
        }));
    }

    let username = non_empty(inputs.username.as_deref()).ok_or(CiError::MissingCredential {
        name: "DOCKER_USERNAME",
    })?;
    let token = non_empty(inputs.token.as_deref()).ok_or(CiError::MissingCredential {
        name: "DOCKER_PASSWORD",
    })?;
    Ok(Gate::Open { username, token })
}

/// Gates, logs in once, then pushes every tag with a single attempt each.
///
/// With `dry_run` the gate is evaluated but the registry is never touched.
///
/// # Errors
///
/// Returns `CiError::MissingCredential` from the gate, or the first login
/// or push failure.
pub fn publish(
    registry: &dyn ImageRegistry,
    config: &CiConfig,
    tags: &TagSet,
    inputs: &PublishInputs,
    dry_run: bool,
) -> Result<PublishOutcome> {
    let (username, token) = match evaluate_gate(config, inputs)? {
        Gate::Skip(reason) => {
            tracing::info!(%reason, "publish skipped");
            return Ok(PublishOutcome::Skipped(reason));
        }
        Gate::Open { username, token } => (username, token),
    };

    let images = tags.image_refs(&config.image);
    if dry_run {
        tracing::info!(%tags, "dry run: would push");
        return Ok(PublishOutcome::Planned(images));
    }

    registry.login(config.registry.as_deref(), username, token)?;
    tracing::info!(username, registry = config.registry.as_deref().unwrap_or("default"), "registry login succeeded");

    for image in &images {
        registry.push(image)?;
        tracing::info!(%image, "pushed");
    }
    Ok(PublishOutcome::Pushed(images))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
