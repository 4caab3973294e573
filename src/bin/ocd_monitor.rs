//! OpenOCD Monitor
//!
//! Connects to an OpenOCD Tcl server, logs target notifications and
//! periodically dumps the configured memory regions.
//!
//! Usage:
//!   ./ocd_monitor                        # config/ocd_monitor.yaml or $OCD_MONITOR_CONFIG
//!   ./ocd_monitor bench/stm32.yaml       # explicit config file

use anyhow::{Context, Result};
use ocd_monitor::bin_common::{
    init_logging_with_level, load_config_from_env, parse_args, ConfigType, MonitorConfig,
    WatchedRegion,
};
use ocdlink::{OcdClient, OcdError, ThreadDispatcher};
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args();
    let config_type = match args.first() {
        Some(path) => ConfigType::Custom(path.clone()),
        None => ConfigType::Monitor,
    };
    let config_path = load_config_from_env(config_type);
    let config = MonitorConfig::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    init_logging_with_level(&config.log_level);
    config.log();

    let dispatcher = ThreadDispatcher::new("ocd-events").context("starting event thread")?;
    let client = Arc::new(config.client_builder().dispatcher(dispatcher).build());

    client.on_connection_changed(|connected| {
        if connected {
            info!("Debug server connected");
        } else {
            warn!("Debug server disconnected");
        }
    });
    client.on_target_event(|event| info!("Target event: {}", event));
    client.on_target_state(|state| info!("Target state: {}", state));
    client.on_target_reset(|mode| info!("Target reset: {}", mode));

    client.start()?;

    print_banner(&config);

    let mut ticker = tokio::time::interval(config.poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                if let Err(e) = result {
                    error!("Failed to listen for Ctrl+C: {}", e);
                }
                info!("Shutdown requested");
                break;
            }
            _ = ticker.tick() => {
                if config.watch.is_empty() {
                    continue;
                }
                if !client.is_connected() {
                    debug!("Skipping poll while {}", client.connection_state());
                    continue;
                }

                let poll_client = Arc::clone(&client);
                let regions = config.watch.clone();
                match tokio::task::spawn_blocking(move || poll_regions(&poll_client, &regions)).await {
                    Ok(()) => {}
                    Err(e) => error!("Poll task failed: {}", e),
                }
            }
        }
    }

    let metrics = client.metrics();
    // Joins the worker thread
    tokio::task::spawn_blocking(move || client.shutdown()).await?;

    info!("========================================");
    info!("OpenOCD monitor stopped");
    info!(
        "Commands: {} sent, {} answered, {} failed",
        metrics.commands_sent, metrics.responses_received, metrics.commands_failed
    );
    info!(
        "Notifications: {} delivered, {} unrecognized, {} reconnects",
        metrics.notifications_published, metrics.unrecognized_frames, metrics.reconnect_count
    );
    info!("========================================");

    Ok(())
}

fn poll_regions(client: &OcdClient, regions: &[WatchedRegion]) {
    for region in regions {
        match client.read_memory_block(region.address, region.words) {
            Ok(words) => {
                for (index, word) in words.iter().enumerate() {
                    let address = region.address.wrapping_add((index as u32).wrapping_mul(4));
                    info!("{:>16} 0x{:08X} = 0x{:08X}", region.name, address, word);
                }
            }
            Err(OcdError::ConnectionLost) => {
                debug!("Connection lost while reading '{}'", region.name);
                return;
            }
            Err(e) => warn!("Failed to read '{}': {}", region.name, e),
        }
    }
}

fn print_banner(config: &MonitorConfig) {
    info!("");
    info!("========================================");
    info!("OpenOCD monitor");
    info!("Server: {}:{}", config.server.host, config.server.port);
    info!("Press Ctrl+C to stop");
    info!("========================================");
    info!("");
}
