// The LED ring around the array is driven through its own control resource. Colours are packed
// as 0xRRGGBB, matching how the firmware documents them.

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PixelRingCommand {
    Trace,
    Mono(u32),
    Listen,
    Speak,
    Think,
    Spin,
    Show(Vec<u8>),
    SetBrightness(u8),
    SetColourPalette(u32, u32),
    SetVadLed(bool),
    SetVolume(u8),
}

impl PixelRingCommand {
    pub fn off() -> Self {
        PixelRingCommand::Mono(0)
    }

    pub fn rgb(red: u8, green: u8, blue: u8) -> Self {
        PixelRingCommand::Mono(((red as u32) << 16) | ((green as u32) << 8) | blue as u32)
    }

    pub fn id(&self) -> u8 {
        match self {
            PixelRingCommand::Trace => 0,
            PixelRingCommand::Mono(_) => 1,
            PixelRingCommand::Listen => 2,
            PixelRingCommand::Speak => 3,
            PixelRingCommand::Think => 4,
            PixelRingCommand::Spin => 5,
            PixelRingCommand::Show(_) => 6,
            PixelRingCommand::SetBrightness(_) => 0x20,
            PixelRingCommand::SetColourPalette(_, _) => 0x21,
            PixelRingCommand::SetVadLed(_) => 0x22,
            PixelRingCommand::SetVolume(_) => 0x23,
        }
    }

    pub fn payload(&self) -> Vec<u8> {
        match self {
            PixelRingCommand::Mono(colour) => colour_bytes(*colour).to_vec(),
            PixelRingCommand::Show(data) if !data.is_empty() => data.clone(),
            PixelRingCommand::SetBrightness(value) | PixelRingCommand::SetVolume(value) => {
                vec![*value]
            }
            PixelRingCommand::SetColourPalette(first, second) => {
                let mut payload = colour_bytes(*first).to_vec();
                payload.extend_from_slice(&colour_bytes(*second));
                payload
            }
            PixelRingCommand::SetVadLed(state) => vec![u8::from(*state)],

            // The firmware still expects a body, even if it ignores it.
            _ => vec![0],
        }
    }
}

fn colour_bytes(colour: u32) -> [u8; 4] {
    [
        ((colour >> 16) & 0xFF) as u8,
        ((colour >> 8) & 0xFF) as u8,
        (colour & 0xFF) as u8,
        0,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colour_payloads() {
        assert_eq!(PixelRingCommand::rgb(0x12, 0x34, 0x56), PixelRingCommand::Mono(0x123456));
        assert_eq!(
            PixelRingCommand::Mono(0x123456).payload(),
            vec![0x12, 0x34, 0x56, 0]
        );
        assert_eq!(PixelRingCommand::off().payload(), vec![0, 0, 0, 0]);
        assert_eq!(
            PixelRingCommand::SetColourPalette(0xFF0000, 0x0000FF).payload(),
            vec![0xFF, 0, 0, 0, 0, 0, 0xFF, 0]
        );
    }

    #[test]
    fn animations_send_a_placeholder_byte() {
        assert_eq!(PixelRingCommand::Spin.payload(), vec![0]);
        assert_eq!(PixelRingCommand::Show(vec![]).payload(), vec![0]);
        assert_eq!(PixelRingCommand::SetVadLed(true).payload(), vec![1]);
    }
}
