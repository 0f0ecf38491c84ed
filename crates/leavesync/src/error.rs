//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use leavesync_config::ConfigError;
use leavesync_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Notification server is offline")]
    #[diagnostic(
        code(leavesync::offline),
        help(
            "The health probe failed: {reason}\n\
             Check the server URL (--server) and that the server is running.\n\
             Try: leavesync health -vv"
        )
    )]
    Offline { reason: String },

    #[error("Publish failed")]
    #[diagnostic(
        code(leavesync::publish_failed),
        help("The event was applied locally but not delivered: {reason}")
    )]
    PublishFailed { reason: String },

    #[error("Timed out after {millis}ms")]
    #[diagnostic(
        code(leavesync::timeout),
        help("Check server responsiveness or raise the timeouts in your profile.")
    )]
    Timeout { millis: u64 },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(leavesync::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(leavesync::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: leavesync config add <name> --url <URL> --tenant-id <ID>"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No configuration found")]
    #[diagnostic(
        code(leavesync::no_config),
        help(
            "Pass --server and --tenant, or create a profile with:\n  \
             leavesync config add default --url <URL> --tenant-id <ID>\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(leavesync::config))]
    Config(#[from] ConfigError),

    // ── Internal ─────────────────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(code(leavesync::internal))]
    Internal { message: String },

    // ── IO / Serialization ────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    #[diagnostic(code(leavesync::json), help("Details must be a JSON object, e.g. '{{\"id\": 5}}'."))]
    Json(#[from] serde_json::Error),

    #[error("YAML rendering failed: {0}")]
    #[diagnostic(code(leavesync::yaml))]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML rendering failed: {0}")]
    #[diagnostic(code(leavesync::toml))]
    Toml(#[from] toml::ser::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Offline { .. } | Self::PublishFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::Json(_) => exit_code::USAGE,
            Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Offline { reason } | CoreError::PollUnreachable { reason, .. } => {
                CliError::Offline { reason }
            }

            CoreError::ConnectTimeout { timeout_ms } | CoreError::PollTimeout { timeout_ms } => {
                CliError::Timeout { millis: timeout_ms }
            }

            CoreError::PublishFailure { reason } => CliError::PublishFailed { reason },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            other => CliError::Internal {
                message: other.to_string(),
            },
        }
    }
}
