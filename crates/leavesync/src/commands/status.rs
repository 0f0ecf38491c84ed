//! One-shot status: run the notifier briefly and report where it settled.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use leavesync_core::{Notifier, NotifierConfig, NotifierStatus, ReadCache, handler_fn};

use crate::cli::{GlobalOpts, StatusArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(
    config: NotifierConfig,
    args: StatusArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    Notifier::check_health(&config).await?;

    let notifier = Notifier::new(config, Some(Arc::new(ReadCache::default())))?;
    notifier.start(handler_fn(|_| Ok(()))).await?;
    tokio::time::sleep(args.settle).await;
    let status = notifier.status();
    notifier.stop().await;

    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        &status,
        |s| detail(s, color),
        |s| s.state.as_str().to_owned(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

fn detail(s: &NotifierStatus, color: bool) -> String {
    let latency = s
        .last_dispatch_latency
        .map_or_else(|| "-".into(), |d| humantime::format_duration(d).to_string());
    [
        format!("State:            {}", output::paint_state(s.state, color)),
        format!("Channel:          {}", s.active_channel),
        format!("Socket open:      {}", s.persistent_connected),
        format!("Poll interval:    {}", humantime::format_duration(s.poll_interval)),
        format!("Last poll:        {}", when(s.last_poll)),
        format!("Last good poll:   {}", when(s.last_successful_poll)),
        format!("Last event:       {}", when(s.last_event)),
        format!("Events:           {}", s.event_count),
        format!("Errors:           {} / {}", s.error_count, s.max_errors),
        format!("Handler failures: {}", s.callback_failures),
        format!("Dispatch latency: {latency}"),
    ]
    .join("\n")
}

fn when(ts: Option<DateTime<Utc>>) -> String {
    ts.map_or_else(|| "-".into(), |t| t.format("%Y-%m-%d %H:%M:%S%.3f UTC").to_string())
}
