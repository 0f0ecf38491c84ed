//! Publish a change event and wait for delivery.

use leavesync_core::{Details, Notifier, NotifierConfig};
use serde_json::Value;

use crate::cli::{GlobalOpts, PublishArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(
    config: NotifierConfig,
    args: PublishArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let details = parse_details(&args.details)?;
    let notifier = Notifier::new(config, None)?;

    let event = notifier.publish_confirmed(&args.change_type, details).await?;
    let frame = event.to_outbound_frame();
    let out = output::render_single(
        &global.output,
        &frame,
        |f| format!("published {} for tenant {}", f.change_type, f.tenant_id),
        |f| f.change_type.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

fn parse_details(raw: &str) -> Result<Details, CliError> {
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(map) => Ok(map),
        other => Err(CliError::Validation {
            field: "details".into(),
            reason: format!("expected a JSON object, got {other}"),
        }),
    }
}
