//! Unified error type for the grokdock workspace.
//!
//! Every variant is a fatal condition: it aborts the run with exit status 1
//! after cleanup. Advisory findings are not errors and never travel through
//! this type.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum CiError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// Version derivation produced an empty string.
    #[error("empty {field} derived from ref {input:?}")]
    EmptyVersion {
        /// Which derived value was empty (`version` or `short version`).
        field: &'static str,
        /// The input the value was derived from.
        input: String,
    },

    /// An external program could not be spawned.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        /// Program that failed to launch.
        program: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// An external program exited with a non-zero status.
    #[error("{program} exited with status {code}: {stderr}")]
    CommandFailed {
        /// Program and subcommand that failed.
        program: String,
        /// Exit code (-1 when killed by a signal).
        code: i32,
        /// Captured standard error.
        stderr: String,
    },

    /// The Dockerfile linter rejected the build descriptor.
    #[error("lint failed for {path}:\n{output}")]
    LintFailed {
        /// Dockerfile that was linted.
        path: PathBuf,
        /// Linter findings.
        output: String,
    },

    /// The container could not be started.
    #[error("container failed to start: {message}")]
    ContainerStart {
        /// Description of the failure.
        message: String,
    },

    /// The container exited before it became ready.
    #[error("container {id} exited after {elapsed_secs}s before becoming ready")]
    ContainerCrashed {
        /// Container identifier.
        id: String,
        /// Seconds elapsed when the exit was observed.
        elapsed_secs: u64,
    },

    /// The readiness marker did not appear within the bound.
    #[error("container {id} not ready within {timeout_secs}s")]
    ReadinessTimeout {
        /// Container identifier.
        id: String,
        /// The readiness bound in seconds.
        timeout_secs: u64,
    },

    /// A bind-mounted path is not writable inside the container.
    #[error("mount {path} is not writable inside the container")]
    MountNotWritable {
        /// In-container path.
        path: String,
    },

    /// A publish credential is missing.
    #[error("missing registry credential: {name}")]
    MissingCredential {
        /// Name of the missing credential.
        name: &'static str,
    },

    /// An HTTP client could not be constructed.
    #[error("HTTP client error: {message}")]
    Http {
        /// Description of the failure.
        message: String,
    },

    /// One or more structured verification checks failed.
    #[error("{failed} of {total} verification checks failed")]
    SuiteFailed {
        /// Number of failed checks.
        failed: usize,
        /// Number of checks run.
        total: usize,
    },

    /// The run was cancelled by the operator.
    #[error("interrupted")]
    Interrupted,

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, CiError>;
