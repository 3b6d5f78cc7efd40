mod command;
mod config;
mod schedule;
mod store;
mod transport;

use anyhow::Context;
use command::{LogTransmitter, PumpDriver, Resolver};
use config::BlasterConfig;
use irblaster_shared::transmit_channel;
use schedule::ScheduleMonitor;
use store::{FileStore, StoreGuard};
use transport::{
    event_channel, BleAdapter, CaptureFeed, StatusBoard, TcpLink, WebApi, WebListener, SERVICE_UUID,
};

use tracing::{debug, error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = BlasterConfig::from_env();
    info!("[IR] --- {} boot ---", config.device_name);

    let file_store = FileStore::open(&config.store_path)
        .with_context(|| format!("opening {}", config.store_path.display()))?;
    let store_path = file_store.path().display().to_string();
    let guard = StoreGuard::new(file_store, config.store_lock_timeout);
    let saved = guard.with_saved(|saved| saved.count()).await?;
    info!("[STORE] {} saved codes in {}", saved, store_path);

    // Transmit dispatcher, pumped from one task
    let (queue, pump) = transmit_channel(LogTransmitter::default());
    let _pump_handle = PumpDriver::new(pump, config.pump_interval).spawn();

    let resolver = Resolver::new(guard, queue);
    let status = StatusBoard::new();

    let schedule = ScheduleMonitor::new(resolver.clone(), status.clone());
    let _schedule_handle = schedule.start_monitoring(config.schedule_interval).await;
    info!("[SCHED] Monitor started");

    // Wireless link (TCP simulation)
    let adapter = BleAdapter::new(resolver.clone(), schedule.clone(), status.clone());
    let (events, source) = event_channel(64, "TCP simulation");
    let link = TcpLink::bind(&config.ble_listen, events, adapter.clone(), status.clone())
        .await
        .with_context(|| format!("binding wireless link on {}", config.ble_listen))?;
    info!(
        "[BLE] Service {} as {:?} on {}",
        SERVICE_UUID,
        config.device_name,
        link.local_addr()?
    );
    tokio::spawn(async move { adapter.run(source).await });
    tokio::spawn(async move {
        if let Err(e) = link.run().await {
            error!("[BLE] Link stopped: {}", e);
        }
    });

    // Web channel, also the entry point of received codes
    let captures = CaptureFeed::new(config.capture_backlog);
    let web = WebListener::bind(&config.web_listen, WebApi::new(resolver, schedule.clone(), captures))
        .await
        .with_context(|| format!("binding web channel on {}", config.web_listen))?;
    info!("[WEB] Channel on {}", web.local_addr()?);
    tokio::spawn(async move {
        if let Err(e) = web.run().await {
            error!("[WEB] Listener stopped: {}", e);
        }
    });

    // Status line
    let mut ticker = tokio::time::interval(config.status_interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match schedule.countdown().await {
                    Some(countdown) => info!(
                        "[IR] Running ({} s until {})",
                        countdown.seconds_remaining, countdown.command_name
                    ),
                    None => debug!("[IR] Running ({:?})", schedule.state().await),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("[IR] Shutting down");
                schedule.stop_monitoring().await;
                break;
            }
        }
    }

    Ok(())
}
