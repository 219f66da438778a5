use crate::error::SessionError;
use crate::shutdown::Shutdown;
use log::{debug, info, warn};
use respeaker_types::DeviceDescriptor;
use respeaker_usb::device::base::DeviceBus;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::sleep;

pub const DEFAULT_DISCOVERY_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiscoveryEvent {
    Attached(DeviceDescriptor),
    Removed(DeviceDescriptor),
}

/// A single pass over the attached devices.
pub fn scan(bus: &dyn DeviceBus) -> Result<Vec<DeviceDescriptor>, SessionError> {
    bus.scan().map_err(SessionError::TransportUnavailable)
}

/// Compares two scans by bus location, removals are reported before attachments.
pub fn diff_devices(
    previous: &[DeviceDescriptor],
    current: &[DeviceDescriptor],
) -> Vec<DiscoveryEvent> {
    let before: HashMap<(u8, u8), &DeviceDescriptor> =
        previous.iter().map(|device| (device.location(), device)).collect();
    let after: HashMap<(u8, u8), &DeviceDescriptor> =
        current.iter().map(|device| (device.location(), device)).collect();

    let mut events = vec![];
    for device in previous {
        if !after.contains_key(&device.location()) {
            events.push(DiscoveryEvent::Removed(device.clone()));
        }
    }
    for device in current {
        if !before.contains_key(&device.location()) {
            events.push(DiscoveryEvent::Attached(device.clone()));
        }
    }
    events
}

pub async fn spawn_discovery_watcher(
    bus: Arc<dyn DeviceBus>,
    interval: Duration,
    sender: UnboundedSender<DiscoveryEvent>,
    mut shutdown: Shutdown,
) {
    let scan_sleep = sleep(Duration::from_millis(0));
    tokio::pin!(scan_sleep);

    let mut known: Vec<DeviceDescriptor> = vec![];
    loop {
        tokio::select! {
            () = &mut scan_sleep => {
                let scanner = bus.clone();
                match tokio::task::spawn_blocking(move || scan(scanner.as_ref())).await {
                    Ok(Ok(devices)) => {
                        for event in diff_devices(&known, &devices) {
                            match &event {
                                DiscoveryEvent::Attached(device) => info!("Device Attached: {}", device),
                                DiscoveryEvent::Removed(device) => info!("Device Removed: {}", device),
                            }
                            if sender.send(event).is_err() {
                                debug!("Discovery receiver has gone, stopping watcher");
                                return;
                            }
                        }
                        known = devices;
                    }
                    Ok(Err(error)) => warn!("Unable to scan for devices: {}", error),
                    Err(error) => warn!("Device scan task failed: {}", error),
                }
                scan_sleep.as_mut().reset(tokio::time::Instant::now() + interval);
            }
            () = shutdown.recv() => {
                debug!("Shutdown triggered, stopping discovery");
                break;
            }
        }
    }
}
