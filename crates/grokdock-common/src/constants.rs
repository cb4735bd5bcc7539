//! System-wide constants and default values.

/// Default image repository the CI builds and publishes.
pub const DEFAULT_IMAGE: &str = "opengrok/docker";

/// Repository slug allowed to publish images.
pub const CANONICAL_REPO_SLUG: &str = "oracle/opengrok";

/// Default Dockerfile path relative to the build context.
pub const DEFAULT_DOCKERFILE: &str = "Dockerfile";

/// Default build context directory.
pub const DEFAULT_BUILD_CONTEXT: &str = ".";

/// Git ref prefix that marks a tagged build.
pub const TAG_REF_PREFIX: &str = "refs/tags/";

/// Tag used for every tagged release in addition to its version tags.
pub const LATEST_TAG: &str = "latest";

/// Tag used for untagged (branch) builds.
pub const MASTER_TAG: &str = "master";

/// Port of the web application inside the container.
pub const WEB_PORT: u16 = 8080;

/// Port of the REST API inside the container.
pub const REST_PORT: u16 = 5000;

/// Source mount point inside the container.
pub const SRC_MOUNT: &str = "/opengrok/src";

/// Data (index) mount point inside the container.
pub const DATA_MOUNT: &str = "/opengrok/data";

/// Configuration directory inside the container.
pub const ETC_DIR: &str = "/opengrok/etc";

/// Servlet container deployment directory inside the container.
pub const WEBAPPS_DIR: &str = "/usr/local/tomcat/webapps";

/// Index directory expected to appear once the indexer has run.
pub const INDEX_DIR: &str = "/opengrok/data/index";

/// Owner and group every application path must carry.
pub const EXPECTED_OWNER: &str = "appuser:appgroup";

/// Account name the application processes run under.
pub const APP_USER: &str = "appuser";

/// Log substring that marks a completed application startup.
pub const STARTUP_MARKER: &str = "Server startup in";

/// Log token that denotes a fatal-level message.
pub const FATAL_MARKER: &str = "FATAL";

/// Line prefixes counted by the log error scan.
pub const ERROR_LINE_PREFIXES: &[&str] = &["ERROR", "FATAL", "SEVERE"];

/// Body substrings accepted as proof the web UI rendered.
pub const WEB_BODY_MARKERS: &[&str] = &["OpenGrok", "Search"];

/// Name of the sample source file placed in the source volume.
pub const SAMPLE_SOURCE_NAME: &str = "test.java";

/// Contents of the sample source file.
pub const SAMPLE_SOURCE: &str =
    "public class Test {\n    public static void main(String[] args) {}\n}\n";

/// Interval between readiness polls, in seconds.
pub const POLL_INTERVAL_SECS: u64 = 3;

/// Readiness bound for the smoke run, in seconds.
pub const SMOKE_STARTUP_TIMEOUT_SECS: u64 = 90;

/// Readiness bound for the structured suite, in seconds.
pub const SUITE_STARTUP_TIMEOUT_SECS: u64 = 180;

/// Per-request HTTP timeout, in seconds.
pub const HTTP_TIMEOUT_SECS: u64 = 10;

/// Attempts made against the web endpoint before warning.
pub const WEB_ATTEMPTS: u32 = 3;

/// Delay between web endpoint attempts, in seconds.
pub const WEB_RETRY_DELAY_SECS: u64 = 5;

/// Wait before checking for index creation, in seconds.
pub const INDEX_WAIT_SECS: u64 = 10;

/// Linter image used when no local `hadolint` binary exists.
pub const HADOLINT_IMAGE: &str = "hadolint/hadolint";

/// Application name used in CLI output.
pub const APP_NAME: &str = "grokdock";

/// Prefix for scratch directories created on the host.
pub const SCRATCH_PREFIX: &str = "opengrok-test-";
