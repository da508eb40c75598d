//! Logging setup for a host application
//!
//! Run with:
//! ```bash
//! cargo run --example logging_demo
//! cargo run --example logging_demo -- json
//! cargo run --example logging_demo -- compact "core_runtime=trace"
//! ```

use bridge_traits::time::LogLevel;
use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use core_runtime::logging::{init_logging, strip_path, LogFormat, LoggingConfig};
use std::env;
use tracing::{debug, info, instrument, warn};

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();

    let format = match args.get(1).map(String::as_str) {
        Some("json") => LogFormat::Json,
        Some("compact") => LogFormat::Compact,
        _ => LogFormat::Pretty,
    };

    let mut config = LoggingConfig::default()
        .with_format(format)
        .with_level(LogLevel::Debug)
        .with_spans(true);
    if let Some(filter) = args.get(2) {
        config = config.with_filter(filter.clone());
    }

    if let Err(e) = init_logging(config) {
        eprintln!("logging setup failed: {e}");
        return;
    }

    info!(format = ?format, "Logging initialized");

    let bus = EventBus::new(16);
    let mut events = bus.subscribe();
    simulate_sync(&bus, "/home/ana/Music/Albums/Blue Train/01 Blue Train.flac").await;

    while let Ok(event) = events.try_recv() {
        info!(severity = ?event.severity(), "{}", event.description());
    }
}

#[instrument(skip(bus))]
async fn simulate_sync(bus: &EventBus, sample_path: &str) {
    let source_id = "filesystem".to_string();
    bus.emit(CoreEvent::Sync(SyncEvent::Started {
        run_id: "demo-run".to_string(),
        source_id,
        scope: "full".to_string(),
    }))
    .ok();

    debug!(file = strip_path(sample_path), "Scanned file");
    warn!(file = strip_path(sample_path), "Unreadable tags; file skipped");
}
