//! Command dispatch: bridges CLI args -> notifier -> output formatting.

pub mod config_cmd;
pub mod health;
pub mod publish;
pub mod status;
pub mod watch;

use leavesync_core::NotifierConfig;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a server-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    config: NotifierConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Health => health::handle(&config, global).await,
        Command::Watch(args) => watch::handle(config, args, global).await,
        Command::Publish(args) => publish::handle(config, args, global).await,
        Command::Status(args) => status::handle(config, args, global).await,
        Command::Config(_) | Command::Completions(_) => Err(CliError::Internal {
            message: "local command routed to the server dispatcher".into(),
        }),
    }
}
