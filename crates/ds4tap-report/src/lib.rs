//! Decoder for the wired `DualShock` 4 input report.
//!
//! Everything here is pure: a raw report goes in, a [`Telemetry`] value
//! comes out.

mod battery;
mod decode;
mod types;

pub use battery::{BatteryStatus, Peripherals, FULL_LEVEL};
pub use decode::{
    decode, DecodeError, ReportDecoder, Telemetry, FULL_REPORT_LEN, MIN_REPORT_LEN,
    REPORT_ID, TOUCH_REPORT_LEN,
};
pub use types::{Axes3, Button, Buttons, DPad, Stick, TouchPoint, Touchpad};
