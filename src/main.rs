//! Cortex log stream - Entry Point
//!
//! Follows the dashboard's execution log channel and writes every log line
//! and status change through tracing until interrupted.

use std::sync::Arc;

use tokio::signal;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cortex::models::LogLevel;
use cortex::{ChannelEvent, Config, CortexError, LogAggregator, WsTransport};

#[tokio::main]
async fn main() -> cortex::Result<()> {
    // Load configuration first: it decides the log format
    let config = Config::from_env()?;

    // Initialize tracing
    let json = config.log.format == "json";
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter().into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();

    info!("Starting Cortex log stream");

    let aggregator = LogAggregator::from_config(&config, Arc::new(WsTransport::new()))?;
    info!(
        url = %aggregator.manager().url(),
        execution_id = ?aggregator.filter(),
        "Streaming execution logs"
    );

    let mut events = aggregator.subscribe();
    aggregator.connect();

    let shutdown = signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut gave_up = false;
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    report(&event);
                    let disconnected = matches!(event, ChannelEvent::Disconnected);
                    if disconnected && aggregator.manager().is_idle() {
                        error!("No reconnect pending, giving up on {}", aggregator.manager().url());
                        gave_up = true;
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Log stream lagged, missed {} events", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            result = &mut shutdown => {
                result?;
                info!("Received Ctrl-C, shutting down");
                break;
            }
        }
    }

    aggregator.disconnect();
    info!("Cortex log stream stopped");

    if gave_up {
        return Err(CortexError::Connection(format!(
            "lost connection to {}",
            aggregator.manager().url()
        )));
    }
    Ok(())
}

fn report(event: &ChannelEvent) {
    match event {
        ChannelEvent::Connected => info!("Connected to log stream"),
        ChannelEvent::Disconnected => warn!("Disconnected from log stream"),
        ChannelEvent::Cleared => debug!("Log buffer cleared"),
        ChannelEvent::Status(record) if record.status.is_terminal() => info!(
            execution_id = ?record.subject,
            exit_code = ?record.exit_code,
            error = ?record.error,
            end_time = ?record.end_time,
            "Execution finished: {}",
            record.status
        ),
        ChannelEvent::Status(record) => info!(
            execution_id = ?record.subject,
            start_time = %record.start_time,
            "Execution {}",
            record.status
        ),
        ChannelEvent::Log(entry) => {
            let subject = entry.subject.as_deref().unwrap_or("-");
            match entry.level {
                LogLevel::Error => error!(execution_id = subject, "{}", entry.message),
                LogLevel::Warn => warn!(execution_id = subject, "{}", entry.message),
                LogLevel::Debug => debug!(execution_id = subject, "{}", entry.message),
                LogLevel::Info => info!(execution_id = subject, "{}", entry.message),
            }
        }
    }
}
