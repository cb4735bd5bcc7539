//! CLI command definitions and dispatch.

pub mod build;
pub mod ci;
pub mod lint;
pub mod publish;
pub mod smoke;
pub mod suite;
pub mod tags;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use grokdock_common::config::CiConfig;
use grokdock_common::types::{ImageRef, TagSet};
use grokdock_pipeline::cancel::CancelToken;
use grokdock_pipeline::context::RunContext;
use grokdock_pipeline::publish::PublishInputs;
use grokdock_pipeline::version::resolve_tags;
use grokdock_runtime::backend::docker::DockerCli;
use grokdock_runtime::clock::SystemClock;
use grokdock_runtime::http::ReqwestProbe;

/// grokdock: CI driver for the OpenGrok container image.
#[derive(Parser, Debug)]
#[command(name = "grokdock", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Options shared by every subcommand.
    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Options shared by every subcommand.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// JSON configuration file; unspecified fields keep their defaults.
    #[arg(long, global = true, env = "GROKDOCK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Image repository, overriding the configuration.
    #[arg(long, global = true)]
    pub image: Option<String>,

    /// Dockerfile path, overriding the configuration.
    #[arg(long, global = true)]
    pub dockerfile: Option<PathBuf>,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per event.
    Json,
}

/// Git ref and explicit tag the version is derived from.
#[derive(Args, Debug, Clone)]
pub struct VersionArgs {
    /// Git ref of the build, e.g. `refs/tags/1.13.4`.
    #[arg(long = "ref", env = "OPENGROK_REF")]
    pub git_ref: Option<String>,

    /// Explicit release tag.
    #[arg(long, env = "OPENGROK_TAG")]
    pub tag: Option<String>,
}

impl VersionArgs {
    /// Resolves the tag set.
    ///
    /// # Errors
    ///
    /// Returns an error if a tag is present but empty.
    pub fn tags(&self) -> anyhow::Result<TagSet> {
        Ok(resolve_tags(self.git_ref.as_deref(), self.tag.as_deref())?)
    }
}

/// Inputs of the publish gate.
#[derive(Args, Debug, Clone)]
pub struct PublishArgs {
    /// CI event name; falls back to `GITHUB_EVENT_NAME`.
    #[arg(long, env = "OPENGROK_EVENT")]
    pub event: Option<String>,

    /// Repository slug of the build; falls back to `GITHUB_REPOSITORY`.
    #[arg(long, env = "OPENGROK_REPO_SLUG")]
    pub repo_slug: Option<String>,

    /// Registry user.
    #[arg(long, env = "DOCKER_USERNAME")]
    pub username: Option<String>,

    /// Registry token.
    #[arg(long = "password", env = "DOCKER_PASSWORD", hide_env_values = true)]
    pub token: Option<String>,

    /// Evaluate the gate and print the plan without pushing.
    #[arg(long)]
    pub dry_run: bool,
}

impl PublishArgs {
    /// Gate inputs, with the generic CI variables as fallbacks.
    #[must_use]
    pub fn inputs(&self) -> PublishInputs {
        PublishInputs {
            event: self
                .event
                .clone()
                .or_else(|| std::env::var("GITHUB_EVENT_NAME").ok()),
            repo_slug: self
                .repo_slug
                .clone()
                .or_else(|| std::env::var("GITHUB_REPOSITORY").ok()),
            username: self.username.clone(),
            token: self.token.clone(),
        }
    }
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the version tags derived from the git ref or explicit tag.
    Tags(tags::TagsArgs),
    /// Lint the Dockerfile.
    Lint(lint::LintArgs),
    /// Build the image with every version tag.
    Build(build::BuildArgs),
    /// Start the image and run the advisory smoke checks.
    Smoke(smoke::SmokeArgs),
    /// Run the ordered, gating verification suite.
    Suite(suite::SuiteArgs),
    /// Push every version tag when the publish gate allows it.
    Publish(publish::PublishCmdArgs),
    /// Lint, build, smoke-test, verify and publish.
    Ci(ci::CiArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli.global)?;
    match cli.command {
        Command::Tags(args) => tags::execute(&args),
        Command::Lint(args) => lint::execute(&args, &config),
        Command::Build(args) => build::execute(&args, &config),
        Command::Smoke(args) => smoke::execute(&args, &config),
        Command::Suite(args) => suite::execute(&args, &config),
        Command::Publish(args) => publish::execute(&args, &config),
        Command::Ci(args) => ci::execute(&args, &config),
    }
}

fn load_config(global: &GlobalArgs) -> anyhow::Result<CiConfig> {
    let mut config = match &global.config {
        Some(path) => CiConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => CiConfig::default(),
    };
    if let Some(image) = &global.image {
        config.image.clone_from(image);
    }
    if let Some(dockerfile) = &global.dockerfile {
        config.dockerfile.clone_from(dockerfile);
    }
    config.validate()?;
    Ok(config)
}

/// Production collaborators for the container-facing commands.
pub struct Session {
    docker: DockerCli,
    http: ReqwestProbe,
    clock: SystemClock,
    cancel: CancelToken,
}

impl Session {
    /// Creates the Docker backend and HTTP client and installs the Ctrl+C
    /// handler.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client or the signal handler cannot be
    /// set up.
    pub fn open(config: &CiConfig) -> anyhow::Result<Self> {
        let cancel = install_cancel_handler()?;

        Ok(Self {
            docker: DockerCli::new(),
            http: ReqwestProbe::new(config.timings.http_timeout())?,
            clock: SystemClock::new(),
            cancel,
        })
    }

    /// The Docker backend.
    #[must_use]
    pub const fn docker(&self) -> &DockerCli {
        &self.docker
    }

    /// A run context over this session.
    #[must_use]
    pub fn context<'a>(&'a self, config: &'a CiConfig) -> RunContext<'a> {
        RunContext::new(config, &self.docker, &self.http, &self.clock).with_cancel(self.cancel.clone())
    }
}

/// Installs the handler that turns SIGINT and SIGTERM into a cancellation.
fn install_cancel_handler() -> anyhow::Result<CancelToken> {
    let cancel = CancelToken::new();
    let flag = cancel.clone();
    ctrlc::set_handler(move || {
        flag.cancel();
    })
    .context("failed to set Ctrl+C handler")?;
    Ok(cancel)
}

/// The image the container-facing commands test.
#[must_use]
pub fn primary_image(config: &CiConfig, tags: &TagSet) -> ImageRef {
    ImageRef::new(&config.image, tags.primary())
}
