//! Config subcommand handlers.

use serde::Serialize;
use tabled::Tabled;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat, ProfileArgs};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct ProfileRow {
    #[tabled(rename = "")]
    marker: &'static str,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Server")]
    server: String,
    #[tabled(rename = "Tenant")]
    tenant: String,
    #[tabled(rename = "WebSocket")]
    websocket: String,
}

#[derive(Serialize)]
struct ProfileEntry<'a> {
    name: &'a str,
    default: bool,
    #[serde(flatten)]
    profile: &'a Profile,
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Add(profile_args) => add(profile_args, global),

        ConfigCommand::Show => {
            let cfg = config::load(global)?;
            let out = match global.output {
                OutputFormat::Table | OutputFormat::Plain => toml::to_string_pretty(&cfg)?,
                _ => output::render_single(&global.output, &cfg, |_| String::new(), |_| String::new())?,
            };
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load(global)?;
            let default = config::active_profile_name(global, &cfg);
            let mut names: Vec<&String> = cfg.profiles.keys().collect();
            names.sort();

            let entries: Vec<ProfileEntry<'_>> = names
                .into_iter()
                .filter_map(|name| {
                    cfg.profiles.get(name).map(|profile| ProfileEntry {
                        name,
                        default: *name == default,
                        profile,
                    })
                })
                .collect();

            let out = output::render_list(
                &global.output,
                &entries,
                |e| ProfileRow {
                    marker: if e.default { "*" } else { "" },
                    name: e.name.to_owned(),
                    server: e.profile.server.clone(),
                    tenant: e.profile.tenant_id.clone(),
                    websocket: websocket_label(e.profile, &cfg),
                },
                |e| e.name.to_owned(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load(global)?;
            ensure_profile(&cfg, &name)?;
            cfg.default_profile = Some(name.clone());
            config::save(global, &cfg)?;
            output::print_output(&format!("default profile set to '{name}'"), global.quiet);
            Ok(())
        }

        ConfigCommand::Remove { name } => {
            let mut cfg = config::load(global)?;
            ensure_profile(&cfg, &name)?;
            cfg.profiles.remove(&name);
            if cfg.default_profile.as_deref() == Some(name.as_str()) {
                cfg.default_profile = None;
            }
            config::save(global, &cfg)?;
            output::print_output(&format!("removed profile '{name}'"), global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&config::config_file(global).display().to_string(), global.quiet);
            Ok(())
        }
    }
}

fn add(args: ProfileArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut cfg = config::load(global)?;

    let profile = Profile {
        server: args.url,
        tenant_id: args.tenant_id,
        websocket_url: args.websocket_url,
        websocket: args.polling_only.then_some(false),
        ca_cert: args.ca_cert,
        insecure: args.allow_insecure.then_some(true),
        ..Profile::default()
    };
    // Reject profiles the notifier could not run with before writing them.
    config::profile_to_notifier_config(&profile, &cfg.defaults)?;

    cfg.profiles.insert(args.name.clone(), profile);
    if args.default || cfg.profiles.len() == 1 {
        cfg.default_profile = Some(args.name.clone());
    }
    config::save(global, &cfg)?;

    output::print_output(
        &format!(
            "saved profile '{}' to {}",
            args.name,
            config::config_file(global).display()
        ),
        global.quiet,
    );
    Ok(())
}

fn ensure_profile(cfg: &Config, name: &str) -> Result<(), CliError> {
    if cfg.profiles.contains_key(name) {
        return Ok(());
    }
    Err(CliError::ProfileNotFound {
        name: name.into(),
        available: config::available_profiles(cfg),
    })
}

fn websocket_label(profile: &Profile, cfg: &Config) -> String {
    if !profile.websocket.unwrap_or(cfg.defaults.websocket) {
        return "off".into();
    }
    profile
        .websocket_url
        .clone()
        .unwrap_or_else(|| "derived".into())
}
