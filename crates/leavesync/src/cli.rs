//! Clap derive structures for the `leavesync` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// leavesync -- real-time change notifications for leave tracking
#[derive(Debug, Parser)]
#[command(
    name = "leavesync",
    version,
    about = "Watch and publish leavesync change notifications",
    long_about = "Client for the leavesync change-notification server.\n\n\
        Keeps a live WebSocket subscription per tenant and falls back to\n\
        HTTP long-polling when the socket is unavailable.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Server profile to use
    #[arg(long, short = 'p', env = "LEAVESYNC_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Config file (defaults to the platform config dir)
    #[arg(long, env = "LEAVESYNC_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Server URL (overrides profile)
    #[arg(long, short = 's', env = "LEAVESYNC_SERVER", global = true)]
    pub server: Option<String>,

    /// Tenant id (overrides profile)
    #[arg(long, short = 't', env = "LEAVESYNC_TENANT", global = true)]
    pub tenant: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "LEAVESYNC_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "LEAVESYNC_INSECURE", global = true)]
    pub insecure: bool,

    /// Skip the WebSocket and poll only
    #[arg(long, global = true)]
    pub no_websocket: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Probe the server's health endpoint
    Health,

    /// Stream change events until interrupted
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Publish a change event to the other clients
    #[command(alias = "pub")]
    Publish(PublishArgs),

    /// Connect briefly and report the notifier status
    Status(StatusArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  WATCH
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Stop after this long (e.g. "30s", "5m")
    #[arg(long, short = 'd', value_parser = humantime::parse_duration)]
    pub duration: Option<Duration>,

    /// Stop after this many events
    #[arg(long, short = 'n')]
    pub max_events: Option<u64>,

    /// Poll interval override (e.g. "500ms")
    #[arg(long, value_parser = humantime::parse_duration)]
    pub poll_interval: Option<Duration>,

    /// Start without probing /health first
    #[arg(long)]
    pub skip_health_check: bool,

    /// Event queue capacity between the notifier and the printer
    #[arg(long, default_value = "256")]
    pub queue: usize,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  PUBLISH
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct PublishArgs {
    /// Change type tag (e.g. vacation_created)
    pub change_type: String,

    /// Event details as a JSON object
    #[arg(long, short = 'd', default_value = "{}")]
    pub details: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  STATUS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// How long to run before taking the snapshot
    #[arg(long, default_value = "2s", value_parser = humantime::parse_duration)]
    pub settle: Duration,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Add or replace a profile
    Add(ProfileArgs),

    /// Display current resolved configuration
    Show,

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Delete a profile
    Remove {
        /// Profile name
        name: String,
    },

    /// Print the config file path
    Path,
}

#[derive(Debug, Args)]
pub struct ProfileArgs {
    /// Profile name
    pub name: String,

    /// Server base URL
    #[arg(long = "url")]
    pub url: String,

    /// Tenant id
    #[arg(long = "tenant-id")]
    pub tenant_id: String,

    /// Explicit WebSocket URL
    #[arg(long)]
    pub websocket_url: Option<String>,

    /// Disable the WebSocket for this profile
    #[arg(long)]
    pub polling_only: bool,

    /// Path to a custom CA certificate
    #[arg(long)]
    pub ca_cert: Option<PathBuf>,

    /// Accept self-signed certificates for this profile
    #[arg(long)]
    pub allow_insecure: bool,

    /// Make this the default profile
    #[arg(long)]
    pub default: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
