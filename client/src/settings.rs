use anyhow::{Context, Result};
use log::error;
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub timeout_ms: u64,
    pub discovery_interval_ms: u64,
    pub poll_interval_ms: u64,
    pub preferred_serial: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timeout_ms: 1000,
            discovery_interval_ms: 500,
            poll_interval_ms: 250,
            preferred_serial: None,
        }
    }
}

impl Settings {
    /// Reads the settings, then writes them straight back so a fresh install ends up with a
    /// complete file to edit.
    pub fn load(path: &Path) -> Result<Settings> {
        let settings = Settings::read(path)?;
        if let Err(e) = settings.write(path) {
            error!("Couldn't save settings to {}: {}", path.to_string_lossy(), e);
        }
        Ok(settings)
    }

    pub fn read(path: &Path) -> Result<Settings> {
        match File::open(path) {
            Ok(reader) => serde_json::from_reader(reader).context(format!(
                "Could not parse settings file at {}",
                path.to_string_lossy()
            )),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(Settings::default()),
            Err(error) => Err(error).context(format!(
                "Could not open settings file for reading at {}",
                path.to_string_lossy()
            )),
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if let Err(e) = create_dir_all(parent) {
                if e.kind() != ErrorKind::AlreadyExists {
                    return Err(e).context(format!(
                        "Could not create settings directory at {}",
                        parent.to_string_lossy()
                    ))?;
                }
            }
        }
        let writer = File::create(path).context(format!(
            "Could not open settings file for writing at {}",
            path.to_string_lossy()
        ))?;
        serde_json::to_writer_pretty(writer, self).context(format!(
            "Could not write to settings file at {}",
            path.to_string_lossy()
        ))?;
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn discovery_interval(&self) -> Duration {
        Duration::from_millis(self.discovery_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
