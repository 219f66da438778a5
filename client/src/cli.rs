use clap::{Parser, Subcommand, ValueEnum};
use directories::ProjectDirs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(about, version, author)]
pub struct Cli {
    /// Minimum log level to print out
    #[clap(long, value_enum, default_value = "warn")]
    pub log_level: LevelFilter,

    /// Location of the configuration file on disk
    #[clap(long, default_value_os_t = default_config_location())]
    pub config: PathBuf,

    /// The serial number of the device to work with, the first attached device is used if absent
    #[clap(long)]
    pub serial: Option<String>,

    /// Timeout for each USB control transfer, in milliseconds
    #[clap(long)]
    pub timeout_ms: Option<u64>,

    #[clap(subcommand)]
    pub command: SubCommands,
}

#[derive(Subcommand, Debug)]
pub enum SubCommands {
    /// List attached devices
    List,

    /// Describe every known parameter
    Params,

    /// Read one or more parameters
    Get {
        #[clap(required = true)]
        names: Vec<String>,
    },

    /// Change a parameter
    Set { name: String, value: String },

    /// Read every parameter from the device
    Dump {
        /// Print the values as JSON
        #[clap(long)]
        json: bool,
    },

    /// Control the LED ring
    Led {
        #[clap(subcommand)]
        pattern: LedPattern,
    },

    /// Save all writable parameters to a preset file
    Save { file: PathBuf },

    /// Apply a preset file to the device
    Load { file: PathBuf },

    /// Follow attach / removal, state and parameter changes until interrupted
    Watch,

    /// Store the current parameters in the device's flash, so they survive a power cycle
    Persist,

    /// Reload the parameters last stored with `persist`
    Restore,

    /// Reboot the device
    Reset,

    /// Discard any upgraded firmware, the factory image runs from the next boot
    RevertFactory,

    /// Reboot a device stuck in DFU mode back into its runtime firmware
    LeaveDfu,
}

#[derive(Subcommand, Debug, Clone)]
pub enum LedPattern {
    /// Turn all LEDs off
    Off,

    /// Follow the direction of arrival
    Trace,

    /// Light every LED with a single colour (RRGGBB)
    Mono { colour: String },

    Listen,
    Speak,
    Think,
    Spin,

    /// Set the brightness (0-31). The ring's LEDs have a 5 bit global brightness, the firmware
    /// masks off anything higher.
    Brightness { value: u8 },

    /// Set the two colours used by the animated patterns (RRGGBB)
    Palette { first: String, second: String },

    /// Enable or disable the voice activity LED
    Vad {
        #[clap(value_enum)]
        state: Toggle,
    },

    /// Show a volume level (0-12), one lit LED per step around the 12 LED ring
    Volume { value: u8 },
}

#[derive(ValueEnum, Copy, Clone, Eq, PartialEq, Debug)]
pub enum Toggle {
    On,
    Off,
}

fn default_config_location() -> PathBuf {
    match ProjectDirs::from("org", "respeaker-tools", "respeaker-configurator") {
        Some(dirs) => dirs.config_dir().join("settings.json"),
        None => PathBuf::from("settings.json"),
    }
}

#[repr(usize)]
#[derive(ValueEnum, Copy, Clone, Eq, PartialEq, Debug)]
pub enum LevelFilter {
    /// A level lower than all log levels.
    Off,
    /// Corresponds to the `Error` log level.
    Error,
    /// Corresponds to the `Warn` log level.
    Warn,
    /// Corresponds to the `Info` log level.
    Info,
    /// Corresponds to the `Debug` log level.
    Debug,
    /// Corresponds to the `Trace` log level.
    Trace,
}

impl From<LevelFilter> for log::LevelFilter {
    fn from(level: LevelFilter) -> Self {
        match level {
            LevelFilter::Off => log::LevelFilter::Off,
            LevelFilter::Error => log::LevelFilter::Error,
            LevelFilter::Warn => log::LevelFilter::Warn,
            LevelFilter::Info => log::LevelFilter::Info,
            LevelFilter::Debug => log::LevelFilter::Debug,
            LevelFilter::Trace => log::LevelFilter::Trace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_options_and_subcommands() {
        let cli = Cli::parse_from([
            "respeaker-client",
            "--serial",
            "ABC123",
            "--timeout-ms",
            "250",
            "set",
            "agc_enabled",
            "on",
        ]);
        assert_eq!(cli.serial.as_deref(), Some("ABC123"));
        assert_eq!(cli.timeout_ms, Some(250));
        assert!(matches!(
            cli.command,
            SubCommands::Set { ref name, ref value } if name == "agc_enabled" && value == "on"
        ));

        let cli = Cli::parse_from(["respeaker-client", "leave-dfu"]);
        assert!(matches!(cli.command, SubCommands::LeaveDfu));
        let cli = Cli::parse_from(["respeaker-client", "revert-factory"]);
        assert!(matches!(cli.command, SubCommands::RevertFactory));

        let cli = Cli::parse_from(["respeaker-client", "led", "vad", "off"]);
        assert!(matches!(
            cli.command,
            SubCommands::Led {
                pattern: LedPattern::Vad { state: Toggle::Off }
            }
        ));
    }
}
