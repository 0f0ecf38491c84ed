//! Health probe.

use leavesync_core::{Notifier, NotifierConfig};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

pub async fn handle(config: &NotifierConfig, global: &GlobalOpts) -> Result<(), CliError> {
    Notifier::check_health(config).await?;
    output::print_output(&format!("online ({})", config.server_url), global.quiet);
    Ok(())
}
