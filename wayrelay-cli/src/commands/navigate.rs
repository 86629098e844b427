//! Navigate command - run the guidance loop on a live or recorded track.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use console::style;
use tokio::io::{AsyncBufRead, BufReader};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use wayrelay::config::ConfigFile;
use wayrelay::feed::{spawn_line_feed, FeedConfig};
use wayrelay::peripheral::PeripheralConfig;
use wayrelay::provider::{resolve_destination, RouteProvider, RoutingConfig};
use wayrelay::session::{GuidanceConfig, GuidanceSession, PositionFix, SessionEvent, SessionSummary};
use wayrelay::{Coordinate, GuidanceUpdate};

use super::common::{resolve_mode, ModeArg};
use crate::error::CliError;

/// Arguments for the navigate command.
pub struct NavigateArgs {
    pub from: Option<Coordinate>,
    pub to: String,
    pub mode: Option<ModeArg>,
    pub device: Option<String>,
    pub no_peripheral: bool,
    pub fixes: Option<PathBuf>,
    pub pace_ms: Option<u64>,
}

type FixSource = Box<dyn AsyncBufRead + Unpin + Send>;

/// Run the navigate command.
pub fn run(args: NavigateArgs) -> Result<(), CliError> {
    let runner = crate::runner::CliRunner::new()?;
    runner.log_startup("navigate");
    let config = runner.config().clone();

    let shutdown = CancellationToken::new();
    let handler_token = shutdown.clone();
    ctrlc::set_handler(move || {
        println!();
        println!("Received shutdown signal, stopping guidance...");
        handler_token.cancel();
    })
    .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    let summary = runner.block_on(navigate(args, config, shutdown))?;
    print_summary(&summary);
    Ok(())
}

async fn navigate(
    args: NavigateArgs,
    config: ConfigFile,
    shutdown: CancellationToken,
) -> Result<SessionSummary, CliError> {
    let routing = RoutingConfig::from_config_file(&config);
    let mode = resolve_mode(args.mode, &config);

    let geocoder = routing.geocoder()?;
    let destination = resolve_destination(&geocoder, &args.to).await?;
    let provider: Arc<dyn RouteProvider> = Arc::new(routing.route_provider()?);

    println!("Wayrelay Guidance v{}", wayrelay::VERSION);
    println!("========================");
    println!();
    println!("Destination: {}", destination);
    println!("Mode:        {}", mode);
    println!("Router:      {}", routing.osrm_url);

    let mut session = GuidanceSession::new(GuidanceConfig::from_config_file(&config), provider);

    let mut peripheral = PeripheralConfig::from_config_file(&config);
    if let Some(pattern) = args.device {
        peripheral = peripheral.with_device_pattern(pattern);
    }
    if args.no_peripheral {
        peripheral = peripheral.with_enabled(false);
    }
    attach_peripheral(&mut session, &peripheral).await;
    println!();

    let printer = tokio::spawn(print_updates(session.subscribe()));

    let (events, event_rx) = mpsc::channel(64);
    if let Some(from) = args.from {
        let _ = events.send(SessionEvent::Fix(PositionFix::from(from))).await;
    }
    let _ = events
        .send(SessionEvent::Navigate { destination, mode })
        .await;

    let source = open_fix_source(args.fixes.as_deref()).await?;
    let mut feed_config = FeedConfig::from_config_file(&config);
    // Recorded tracks replay at the filter rate unless told otherwise.
    let pace = args
        .pace_ms
        .map(Duration::from_millis)
        .or_else(|| args.fixes.is_some().then_some(feed_config.min_interval));
    feed_config = feed_config.with_pace(pace);

    let feed = spawn_line_feed(source, feed_config, events, shutdown.clone());
    let summary = session.run(event_rx, shutdown.clone()).await;

    shutdown.cancel();
    match feed.await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => warn!(error = %e, "Position feed failed"),
        Err(e) => warn!(error = %e, "Position feed task failed"),
    }
    let _ = printer.await;

    Ok(summary)
}

async fn attach_peripheral(session: &mut GuidanceSession, config: &PeripheralConfig) {
    if !config.enabled {
        println!("Peripheral:  disabled");
        return;
    }

    match config.connect().await {
        Ok(link) => {
            println!(
                "Peripheral:  {} ({})",
                link.device().name,
                link.device().path.display()
            );
            session.attach_peripheral(link, config.queue_capacity);
        }
        Err(e) => {
            warn!(error = %e, "Continuing without peripheral");
            println!("Peripheral:  {} (continuing without)", style(e).yellow());
        }
    }
}

async fn open_fix_source(path: Option<&Path>) -> Result<FixSource, CliError> {
    match path {
        Some(path) => {
            let file = tokio::fs::File::open(path).await.map_err(|e| {
                CliError::Config(format!("cannot open fix file {}: {}", path.display(), e))
            })?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => Ok(Box::new(BufReader::new(tokio::io::stdin()))),
    }
}

async fn print_updates(mut updates: broadcast::Receiver<GuidanceUpdate>) {
    loop {
        match updates.recv().await {
            Ok(update) => {
                let marker = if update.is_final_step() {
                    style("■").green().bold()
                } else {
                    style("▶").cyan().bold()
                };
                println!(
                    "{} [{}/{}] {}",
                    marker,
                    update.step_index + 1,
                    update.step_count,
                    update.message
                );
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!(missed, "Display fell behind guidance updates");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn print_summary(summary: &SessionSummary) {
    println!();
    println!("Session Summary");
    println!("───────────────");
    println!(
        "  Fixes:      {} processed, {} skipped",
        summary.fixes_processed, summary.fixes_skipped
    );
    println!("  Guidance:   {} updates", summary.emissions);
    println!(
        "  Routes:     {} installed, {} stale, {} failed, {} reroutes",
        summary.routes_installed, summary.stale_results, summary.route_failures, summary.reroutes
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncBufReadExt;

    #[tokio::test]
    async fn test_open_fix_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("track.txt");
        std::fs::write(&path, "1.0,2.0\n").unwrap();

        let mut source = open_fix_source(Some(&path)).await.unwrap();
        let mut line = String::new();
        source.read_line(&mut line).await.unwrap();
        assert_eq!(line, "1.0,2.0\n");
    }

    #[tokio::test]
    async fn test_missing_fix_file() {
        let result = open_fix_source(Some(Path::new("/nonexistent/track.txt"))).await;
        assert!(matches!(result, Err(CliError::Config(_))));
    }
}
