//! Stream change events to stdout.

use std::sync::Arc;

use leavesync_core::{ChangeEvent, Notifier, NotifierConfig, ReadCache, change_queue};
use owo_colors::OwoColorize;

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(
    mut config: NotifierConfig,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if let Some(interval) = args.poll_interval {
        config.poll_interval = interval;
    }
    if !args.skip_health_check {
        Notifier::check_health(&config).await?;
    }

    let tenant = config.tenant_id.clone();
    let notifier = Notifier::new(config, Some(Arc::new(ReadCache::default())))?;
    let (handler, mut events) = change_queue(args.queue);
    notifier.start(handler).await?;

    if !global.quiet {
        eprintln!(
            "watching tenant {tenant} via {} (Ctrl-C to stop)",
            notifier.status().active_channel
        );
    }

    let color = output::should_color(&global.color);
    let deadline = async {
        match args.duration {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    let mut seen = 0_u64;
    let outcome = loop {
        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => break Ok(()),
            () = &mut deadline => break Ok(()),
            event = events.recv() => {
                let Some(event) = event else { break Ok(()) };
                if let Err(e) = print_event(&event, &global.output, color, global.quiet) {
                    break Err(e);
                }
                seen += 1;
                if args.max_events.is_some_and(|max| seen >= max) {
                    break Ok(());
                }
            }
        }
    };

    notifier.stop().await;
    tracing::debug!(events = seen, "watch finished");
    outcome
}

fn print_event(
    event: &ChangeEvent,
    format: &OutputFormat,
    color: bool,
    quiet: bool,
) -> Result<(), CliError> {
    let line = match format {
        OutputFormat::Json | OutputFormat::JsonCompact => {
            serde_json::to_string(&event.to_outbound_frame())?
        }
        OutputFormat::Yaml => format!("---\n{}", serde_yaml::to_string(&event.to_outbound_frame())?),
        OutputFormat::Plain => event.change_type().to_owned(),
        OutputFormat::Table => {
            let ts = event.timestamp().format("%H:%M:%S%.3f");
            let details = serde_json::to_string(event.details())?;
            let tag = if color {
                event.change_type().cyan().to_string()
            } else {
                event.change_type().to_owned()
            };
            format!("{ts}  {tag:<20}  {:<6}  {details}", event.source().as_str())
        }
    };
    output::print_output(&line, quiet);
    Ok(())
}
