//! Shared configuration for leavesync tools.
//!
//! TOML profiles layered with `LEAVESYNC_` environment overrides, and
//! translation to `leavesync_core::NotifierConfig`. The CLI adds
//! flag-aware wrappers on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use leavesync_core::{NotifierConfig, TlsVerification};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found")]
    ProfileNotFound { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named server profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Look up a profile by name.
    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::ProfileNotFound { name: name.into() })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default)]
    pub insecure: bool,

    /// Try the push socket before polling.
    #[serde(default = "default_websocket")]
    pub websocket: bool,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            insecure: false,
            websocket: default_websocket(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_websocket() -> bool {
    true
}
fn default_poll_interval_ms() -> u64 {
    1000
}

/// A named server profile. Unset tunables fall back to the notifier defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Profile {
    /// Server base URL (e.g., "https://sync.example.com").
    pub server: String,

    /// Tenant id every subscription is scoped to.
    pub tenant_id: String,

    /// Explicit push-socket URL; derived from `server` when unset.
    pub websocket_url: Option<String>,

    /// Override `defaults.websocket`.
    pub websocket: Option<bool>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override `defaults.insecure`.
    pub insecure: Option<bool>,

    pub connect_wait_ms: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub poll_wait_hint_ms: Option<u64>,
    pub poll_timeout_ms: Option<u64>,
    pub publish_timeout_ms: Option<u64>,
    pub health_timeout_ms: Option<u64>,
    pub shutdown_grace_ms: Option<u64>,
    pub max_errors: Option<u64>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "leavesync", "leavesync").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("leavesync");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file path + environment.
///
/// Nested keys use a double underscore:
/// `LEAVESYNC_PROFILES__PROD__TENANT_ID=acme`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("LEAVESYNC_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

/// Build a `NotifierConfig` from a profile and the global defaults.
pub fn profile_to_notifier_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<NotifierConfig, ConfigError> {
    let server_url: url::Url = profile
        .server
        .parse()
        .map_err(|_| ConfigError::Validation {
            field: "server".into(),
            reason: format!("invalid URL: {}", profile.server),
        })?;

    if profile.tenant_id.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "tenant_id".into(),
            reason: "must not be empty".into(),
        });
    }

    let mut config = NotifierConfig::new(server_url, profile.tenant_id.clone());

    config.tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };

    if let Some(ref ws) = profile.websocket_url {
        config.websocket_url = Some(ws.parse().map_err(|_| ConfigError::Validation {
            field: "websocket_url".into(),
            reason: format!("invalid URL: {ws}"),
        })?);
    }
    config.websocket_enabled = profile.websocket.unwrap_or(defaults.websocket);

    config.poll_interval =
        Duration::from_millis(profile.poll_interval_ms.unwrap_or(defaults.poll_interval_ms));
    apply_ms(&mut config.connect_wait, profile.connect_wait_ms);
    apply_ms(&mut config.poll_wait_hint, profile.poll_wait_hint_ms);
    apply_ms(&mut config.poll_timeout, profile.poll_timeout_ms);
    apply_ms(&mut config.publish_timeout, profile.publish_timeout_ms);
    apply_ms(&mut config.health_timeout, profile.health_timeout_ms);
    apply_ms(&mut config.shutdown_grace, profile.shutdown_grace_ms);
    if let Some(max) = profile.max_errors {
        config.max_errors = max;
    }

    config.validate().map_err(|e| ConfigError::Validation {
        field: "profile".into(),
        reason: e.to_string(),
    })?;
    Ok(config)
}

fn apply_ms(target: &mut Duration, ms: Option<u64>) {
    if let Some(ms) = ms {
        *target = Duration::from_millis(ms);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use figment::Jail;

    use super::*;

    fn profile() -> Profile {
        Profile {
            server: "https://sync.example.com".into(),
            tenant_id: "acme".into(),
            ..Profile::default()
        }
    }

    #[test]
    fn profile_defaults_match_notifier_defaults() {
        let cfg = profile_to_notifier_config(&profile(), &Defaults::default()).unwrap();
        assert_eq!(cfg.tenant_id, "acme");
        assert_eq!(cfg.poll_interval, Duration::from_secs(1));
        assert_eq!(cfg.poll_timeout, Duration::from_secs(2));
        assert!(cfg.websocket_enabled);
        assert_eq!(cfg.tls, TlsVerification::SystemDefaults);
    }

    #[test]
    fn profile_overrides_apply() {
        let p = Profile {
            websocket: Some(false),
            insecure: Some(true),
            poll_interval_ms: Some(250),
            poll_timeout_ms: Some(900),
            max_errors: Some(3),
            websocket_url: Some("ws://push.internal:9000/ws/tenants/acme".into()),
            ..profile()
        };
        let cfg = profile_to_notifier_config(&p, &Defaults::default()).unwrap();
        assert!(!cfg.websocket_enabled);
        assert_eq!(cfg.tls, TlsVerification::DangerAcceptInvalid);
        assert_eq!(cfg.poll_interval, Duration::from_millis(250));
        assert_eq!(cfg.poll_timeout, Duration::from_millis(900));
        assert_eq!(cfg.max_errors, 3);
        assert_eq!(
            cfg.resolved_websocket_url().unwrap().as_str(),
            "ws://push.internal:9000/ws/tenants/acme"
        );
    }

    #[test]
    fn invalid_server_is_rejected() {
        let p = Profile {
            server: "not a url".into(),
            ..profile()
        };
        let err = profile_to_notifier_config(&p, &Defaults::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "server"));
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let p = Profile {
            poll_interval_ms: Some(0),
            ..profile()
        };
        assert!(profile_to_notifier_config(&p, &Defaults::default()).is_err());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.default_profile.as_deref(), Some("default"));
        assert!(cfg.profiles.is_empty());
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.profiles.insert("prod".into(), profile());
        save_config_to(&cfg, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.profile("prod").unwrap().tenant_id, "acme");
        assert!(matches!(
            loaded.profile("staging"),
            Err(ConfigError::ProfileNotFound { .. })
        ));
    }

    #[test]
    fn environment_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                default_profile = "prod"

                [profiles.prod]
                server = "https://sync.example.com"
                tenant_id = "acme"
                "#,
            )?;
            jail.set_env("LEAVESYNC_DEFAULT_PROFILE", "staging");
            jail.set_env("LEAVESYNC_PROFILES__PROD__TENANT_ID", "globex");

            let cfg = load_config_from(Path::new("config.toml")).map_err(|e| e.to_string())?;
            assert_eq!(cfg.default_profile.as_deref(), Some("staging"));
            assert_eq!(cfg.profile("prod").map_err(|e| e.to_string())?.tenant_id, "globex");
            Ok(())
        });
    }
}
