use crate::cli::{LedPattern, Toggle};
use anyhow::{bail, Context, Result};
use respeaker_usb::pixelring::PixelRingCommand;

/// Accepts `RRGGBB`, optionally prefixed with `#` or `0x`.
pub fn parse_colour(text: &str) -> Result<u32> {
    let hex = text
        .trim()
        .trim_start_matches('#')
        .trim_start_matches("0x");
    if hex.len() != 6 {
        bail!("Colour '{}' should be six hex digits (RRGGBB)", text);
    }
    u32::from_str_radix(hex, 16).context(format!("Colour '{}' is not valid hex", text))
}

pub fn to_command(pattern: &LedPattern) -> Result<PixelRingCommand> {
    Ok(match pattern {
        LedPattern::Off => PixelRingCommand::off(),
        LedPattern::Trace => PixelRingCommand::Trace,
        LedPattern::Mono { colour } => PixelRingCommand::Mono(parse_colour(colour)?),
        LedPattern::Listen => PixelRingCommand::Listen,
        LedPattern::Speak => PixelRingCommand::Speak,
        LedPattern::Think => PixelRingCommand::Think,
        LedPattern::Spin => PixelRingCommand::Spin,
        LedPattern::Brightness { value } => {
            if *value > 0x1F {
                bail!("Brightness must be between 0 and 31");
            }
            PixelRingCommand::SetBrightness(*value)
        }
        LedPattern::Palette { first, second } => {
            PixelRingCommand::SetColourPalette(parse_colour(first)?, parse_colour(second)?)
        }
        LedPattern::Vad { state } => PixelRingCommand::SetVadLed(*state == Toggle::On),
        LedPattern::Volume { value } => {
            if *value > 12 {
                bail!("Volume must be between 0 and 12");
            }
            PixelRingCommand::SetVolume(*value)
        }
    })
}
