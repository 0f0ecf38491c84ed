//! CLI configuration: thin wrapper around `leavesync_config`.
//!
//! Adds resolution that respects `GlobalOpts` overrides (--config,
//! --server, --tenant, --insecure, --no-websocket).

use std::path::PathBuf;

use leavesync_core::{NotifierConfig, TlsVerification};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use leavesync_config::{Config, Profile, profile_to_notifier_config};

/// The config file in effect: `--config` or the platform default.
pub fn config_file(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(leavesync_config::config_path)
}

pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(leavesync_config::load_config_from(&config_file(global))?)
}

pub fn save(global: &GlobalOpts, cfg: &Config) -> Result<(), CliError> {
    Ok(leavesync_config::save_config_to(cfg, &config_file(global))?)
}

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Sorted, comma-separated profile names for help text.
pub fn available_profiles(config: &Config) -> String {
    let mut names: Vec<_> = config.profiles.keys().map(String::as_str).collect();
    if names.is_empty() {
        return "(none)".into();
    }
    names.sort_unstable();
    names.join(", ")
}

/// Build the `NotifierConfig` for this invocation.
///
/// Flags take priority over the profile. Without a profile, `--server`
/// and `--tenant` alone are enough.
pub fn resolve_notifier_config(global: &GlobalOpts) -> Result<NotifierConfig, CliError> {
    let cfg = load(global)?;
    let profile_name = active_profile_name(global, &cfg);

    let profile = match cfg.profiles.get(&profile_name) {
        Some(profile) => {
            let mut profile = profile.clone();
            if let Some(ref server) = global.server {
                profile.server.clone_from(server);
            }
            if let Some(ref tenant) = global.tenant {
                profile.tenant_id.clone_from(tenant);
            }
            profile
        }
        None if global.profile.is_some() => {
            return Err(CliError::ProfileNotFound {
                available: available_profiles(&cfg),
                name: profile_name,
            });
        }
        None => {
            let Some(server) = global.server.clone() else {
                return Err(CliError::NoConfig {
                    path: config_file(global).display().to_string(),
                });
            };
            let tenant_id = global.tenant.clone().ok_or_else(|| CliError::Validation {
                field: "tenant".into(),
                reason: "--tenant is required when no profile is configured".into(),
            })?;
            Profile {
                server,
                tenant_id,
                ..Profile::default()
            }
        }
    };

    let mut config = profile_to_notifier_config(&profile, &cfg.defaults)?;
    if global.insecure {
        config.tls = TlsVerification::DangerAcceptInvalid;
    }
    if global.no_websocket {
        config.websocket_enabled = false;
    }
    tracing::debug!(profile = %profile_name, server = %config.server_url, tenant = %config.tenant_id, "resolved notifier config");
    Ok(config)
}
