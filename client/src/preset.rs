use anyhow::{Context, Result};
use respeaker_session::ParameterValues;
use respeaker_types::{ParameterTable, ParameterValue, ValueError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

/// A saved set of writable parameter values.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub parameters: BTreeMap<String, ParameterValue>,
}

impl Preset {
    /// Keeps the writable values, read only status has no place in a preset.
    pub fn capture(table: &ParameterTable, values: &ParameterValues) -> Self {
        let parameters = values
            .iter()
            .filter(|(name, _)| table.lookup(name).is_ok_and(|spec| spec.is_writable()))
            .map(|(name, value)| (name.to_string(), *value))
            .collect();
        Self { parameters }
    }

    /// Resolves every entry against the table before anything is sent, so a bad preset is
    /// rejected as a whole. The result is in table order.
    pub fn resolve(
        &self,
        table: &ParameterTable,
    ) -> Result<Vec<(&'static str, ParameterValue)>, ValueError> {
        let mut resolved = Vec::with_capacity(self.parameters.len());
        for (name, value) in &self.parameters {
            let spec = table.lookup(name)?;
            if !spec.is_writable() {
                return Err(ValueError::ReadOnly(spec.name.to_string()));
            }
            resolved.push((spec.name, spec.validate(*value)?));
        }

        resolved.sort_by_key(|(name, _)| table.iter().position(|spec| spec.name == *name));
        Ok(resolved)
    }

    pub fn read(path: &Path) -> Result<Preset> {
        let reader = File::open(path)
            .context(format!("Could not open preset at {}", path.to_string_lossy()))?;
        serde_json::from_reader(reader)
            .context(format!("Could not parse preset at {}", path.to_string_lossy()))
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let writer = File::create(path).context(format!(
            "Could not open preset for writing at {}",
            path.to_string_lossy()
        ))?;
        serde_json::to_writer_pretty(writer, self)
            .context(format!("Could not write preset to {}", path.to_string_lossy()))
    }
}
