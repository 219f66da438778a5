use crate::cli::{Cli, SubCommands};
use crate::preset::Preset;
use crate::settings::Settings;
use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use log::{debug, info};
use respeaker_session::discovery::scan;
use respeaker_session::handle::SessionHandle;
use respeaker_usb::commands::DeviceControl;
use respeaker_session::Session;
use respeaker_types::{
    Access, DeviceDescriptor, DeviceMode, ParameterKind, ParameterSpec, ParameterTable,
    ParameterValue,
};
use respeaker_usb::device::LibUsbBus;
use serde::Serialize;
use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};
use std::sync::Arc;
use std::time::Duration;

mod cli;
mod led;
mod preset;
mod settings;
mod watch;

const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct DumpEntry {
    name: &'static str,
    value: ParameterValue,
    access: &'static str,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    CombinedLogger::init(vec![TermLogger::new(
        args.log_level.into(),
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )])
    .context("Could not configure the logger")?;

    debug!("Starting ReSpeaker Client v{}", VERSION);
    let mut settings = Settings::load(&args.config)?;
    if let Some(timeout) = args.timeout_ms {
        settings.timeout_ms = timeout;
    }
    let serial = args.serial.or(settings.preferred_serial.clone());

    let table = ParameterTable::respeaker_v2();
    let bus = Arc::new(LibUsbBus::new(settings.timeout()));
    let session = Arc::new(Session::new(bus.clone(), table));
    let handle = SessionHandle::new(session);

    match args.command {
        SubCommands::List => {
            let devices = scan(bus.as_ref())?;
            if devices.is_empty() {
                println!("No ReSpeaker devices found.");
            }
            for device in devices {
                println!("{} - {}", device.mode, device);
            }
        }
        SubCommands::Params => {
            for spec in table.iter() {
                println!(
                    "{:<24} {:<3} {:<40} {}",
                    spec.name,
                    access_label(spec.access),
                    spec.kind.to_string(),
                    spec.description
                );
            }
        }
        SubCommands::Get { names } => {
            connect(&handle, serial.as_deref()).await?;
            for name in names {
                let spec = table.lookup(&name)?;
                let value = handle.get(spec.name).await?;
                println!("{} = {}", spec.name, describe(spec, value));
            }
        }
        SubCommands::Set { name, value } => {
            let spec = table.lookup(&name)?;
            let value = spec.parse_value(&value)?;
            connect(&handle, serial.as_deref()).await?;
            handle.set(spec.name, value).await?;
            info!("Set {} to {}", spec.name, value);
        }
        SubCommands::Dump { json } => {
            connect(&handle, serial.as_deref()).await?;
            let values = handle.refresh_all().await?;
            if json {
                let entries: Vec<DumpEntry> = values
                    .into_iter()
                    .filter_map(|(name, value)| {
                        let spec = table.lookup(name).ok()?;
                        Some(DumpEntry {
                            name,
                            value,
                            access: access_label(spec.access),
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                for (name, value) in values {
                    let spec = table.lookup(name)?;
                    println!("{:<24} {}", name, describe(spec, value));
                }
            }
        }
        SubCommands::Led { pattern } => {
            let command = led::to_command(&pattern)?;
            connect(&handle, serial.as_deref()).await?;
            handle.pixel_ring(command).await?;
        }
        SubCommands::Save { file } => {
            connect(&handle, serial.as_deref()).await?;
            let values = handle.refresh_all().await?;
            let preset = Preset::capture(&table, &values);
            preset.write(&file)?;
            println!(
                "Saved {} parameters to {}",
                preset.parameters.len(),
                file.to_string_lossy()
            );
        }
        SubCommands::Load { file } => {
            let preset = Preset::read(&file)?;
            let values = preset
                .resolve(&table)
                .context(format!("Preset {} is not valid", file.to_string_lossy()))?;
            connect(&handle, serial.as_deref()).await?;
            for (name, value) in &values {
                handle.set(name, *value).await?;
            }
            println!("Applied {} parameters", values.len());
        }
        SubCommands::Watch => {
            watch::run_watch(handle.clone(), &settings, serial).await?;
        }
        SubCommands::Persist => {
            control(&handle, serial.as_deref(), DeviceControl::SaveState).await?;
            println!("Parameters stored on the device");
        }
        SubCommands::Restore => {
            control(&handle, serial.as_deref(), DeviceControl::RestoreState).await?;
            println!("Parameters restored from the device's flash");
        }
        SubCommands::Reset => {
            control(&handle, serial.as_deref(), DeviceControl::ResetDevice).await?;
            println!("Device is rebooting");
        }
        SubCommands::RevertFactory => {
            control(&handle, serial.as_deref(), DeviceControl::RevertFactory).await?;
            println!("Factory firmware will be used from the next boot");
        }
        SubCommands::LeaveDfu => {
            let devices = scan(bus.as_ref())?;
            let device = select_dfu_device(devices, serial.as_deref())?;
            handle.leave_dfu(device).await?;
            println!("Device is rebooting into its runtime firmware");
        }
    }

    handle.disconnect().await?;
    Ok(())
}

/// Runtime mode devices only, matching the serial if one was asked for.
pub fn wants_device(device: &DeviceDescriptor, serial: Option<&str>) -> bool {
    if device.mode != DeviceMode::Runtime {
        return false;
    }
    match serial {
        Some(serial) => device.serial.as_deref() == Some(serial),
        None => true,
    }
}

fn select_device(
    devices: Vec<DeviceDescriptor>,
    serial: Option<&str>,
) -> Result<DeviceDescriptor> {
    if devices.is_empty() {
        bail!("No ReSpeaker devices are attached.");
    }
    if devices.iter().all(|device| device.mode == DeviceMode::Dfu) {
        bail!("The attached ReSpeaker is in DFU mode, run leave-dfu to reboot it.");
    }

    devices
        .into_iter()
        .find(|device| wants_device(device, serial))
        .ok_or_else(|| {
            anyhow!(
                "No ReSpeaker with serial {} is attached.",
                serial.unwrap_or("?")
            )
        })
}

fn select_dfu_device(
    devices: Vec<DeviceDescriptor>,
    serial: Option<&str>,
) -> Result<DeviceDescriptor> {
    devices
        .into_iter()
        .filter(|device| device.mode == DeviceMode::Dfu)
        .find(|device| serial.is_none() || device.serial.as_deref() == serial)
        .ok_or_else(|| anyhow!("No ReSpeaker in DFU mode is attached."))
}

async fn connect(handle: &SessionHandle, serial: Option<&str>) -> Result<()> {
    let bus = handle.session().bus().clone();
    let devices = tokio::task::spawn_blocking(move || scan(bus.as_ref())).await??;
    let device = select_device(devices, serial)?;

    info!("Connecting to {}", device);
    handle.connect_timeout(device, CONNECT_TIMEOUT).await?;
    Ok(())
}

async fn control(
    handle: &SessionHandle,
    serial: Option<&str>,
    control: DeviceControl,
) -> Result<()> {
    connect(handle, serial).await?;
    handle
        .device_control(control)
        .await
        .context(format!("Device control {} failed", control))
}

fn access_label(access: Access) -> &'static str {
    match access {
        Access::ReadWrite => "rw",
        Access::ReadOnly => "ro",
    }
}

fn describe(spec: &ParameterSpec, value: ParameterValue) -> String {
    if let ParameterKind::Enum { options } = spec.kind {
        if let Some(option) = options.iter().find(|option| option.code == value.as_i32()) {
            return format!("{} ({})", value, option.label);
        }
    }
    value.to_string()
}
