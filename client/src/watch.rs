use crate::settings::Settings;
use crate::{wants_device, CONNECT_TIMEOUT};
use anyhow::Result;
use log::{info, warn};
use respeaker_session::discovery::{spawn_discovery_watcher, DiscoveryEvent};
use respeaker_session::handle::SessionHandle;
use respeaker_session::poller::spawn_parameter_poller;
use respeaker_session::shutdown::Shutdown;
use respeaker_types::SessionState;
use tokio::sync::mpsc;
use tokio::{join, signal};

/// Connects to the wanted device whenever it appears, and prints everything that happens until
/// Ctrl+C is pressed.
pub async fn run_watch(
    handle: SessionHandle,
    settings: &Settings,
    serial: Option<String>,
) -> Result<()> {
    let mut shutdown = Shutdown::new();
    tokio::spawn(await_ctrl_c(shutdown.clone()));

    let session = handle.session().clone();
    let mut changes = handle.subscribe();

    let (discovery_tx, mut discovery_rx) = mpsc::unbounded_channel();
    let discovery_handle = tokio::spawn(spawn_discovery_watcher(
        session.bus().clone(),
        settings.discovery_interval(),
        discovery_tx,
        shutdown.clone(),
    ));

    let (update_tx, mut update_rx) = mpsc::unbounded_channel();
    let poller_handle = tokio::spawn(spawn_parameter_poller(
        session.clone(),
        settings.poll_interval(),
        update_tx,
        shutdown.clone(),
    ));

    println!("{}", handle.snapshot());
    loop {
        tokio::select! {
            Some(event) = discovery_rx.recv() => match event {
                DiscoveryEvent::Attached(device) => {
                    println!("Attached: {}", device);
                    let state = handle.snapshot().state;
                    if state != SessionState::Connected && wants_device(&device, serial.as_deref()) {
                        if let Err(error) = handle.connect_timeout(device, CONNECT_TIMEOUT).await {
                            warn!("Unable to connect: {}", error);
                        }
                    }
                }
                DiscoveryEvent::Removed(device) => {
                    println!("Removed: {}", device);
                    let current = handle.snapshot().device;
                    if current.is_some_and(|current| current.same_device(&device)) {
                        handle.disconnect().await?;
                    }
                }
            },
            Some(change) = changes.recv() => println!("{}", change.snapshot),
            Some(update) = update_rx.recv() => println!("{} = {}", update.name, update.value),
            () = shutdown.recv() => break,
        }
    }

    info!("Shutting down watcher");
    let _ = join!(discovery_handle, poller_handle);
    handle.disconnect().await?;
    Ok(())
}

async fn await_ctrl_c(shutdown: Shutdown) {
    if signal::ctrl_c().await.is_ok() {
        shutdown.trigger();
    }
}
