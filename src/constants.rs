//! # Constants
//!
//! Default values shared by the configuration loaders, the Docker client and the daemon.

/// Docker daemon endpoint used when `DOCKER_HOST` is not set
pub const DEFAULT_DOCKER_HOST: &str = "unix:///var/run/docker.sock";

/// Docker Engine API version used in request paths (`/v1.41/...`)
pub const DEFAULT_DOCKER_API_VERSION: &str = "1.41";

/// Timeout for a single Docker Engine API request (seconds)
pub const DEFAULT_DOCKER_TIMEOUT_SECS: u64 = 60;

/// Minutes between renewal checks (12 hours)
pub const DEFAULT_RENEWAL_INTERVAL_MINUTES: u64 = 720;

/// Intervals below this many minutes are accepted but logged as suspiciously short
pub const SHORT_RENEWAL_INTERVAL_MINUTES: u64 = 60;

/// ACME client executed by the daemon
pub const DEFAULT_RENEWAL_COMMAND: &str = "dehydrated";

/// Where the deploy hook leaves rotation metrics for the daemon when
/// `ROTATION_METRICS_DIR` is not set
pub const DEFAULT_ROTATION_METRICS_DIR: &str = "/tmp/swarm-secret-rotator/metrics";

/// Server startup timeout (seconds)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Server readiness poll interval (milliseconds)
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Log filter applied when neither `RUST_LOG` nor `LOG_LEVEL` is set
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Suffix marking an environment variable whose value is a path to the real value
pub const FILE_VALUE_SUFFIX: &str = "_FILE";

/// Maximum length of a Docker secret name
pub const MAX_SECRET_NAME_LEN: usize = 64;

/// Format of the version stamp embedded in versioned secret names
///
/// ISO-8601 with seconds precision. Characters not allowed in secret names
/// (the `:` separators) are replaced afterwards.
pub const VERSION_STAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
