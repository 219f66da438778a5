pub use rusb;
pub mod commands;
pub mod device;
pub mod error;
pub mod pixelring;

pub const VID_RESPEAKER: u16 = 0x2886;
pub const PID_RESPEAKER_V2: u16 = 0x0018;

// Used when the product string descriptor can't be read (normally a permissions issue).
pub const DEFAULT_PRODUCT_NAME: &str = "ReSpeaker USB Mic Array v2.0";
