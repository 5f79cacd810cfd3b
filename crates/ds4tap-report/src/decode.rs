use std::time::Duration;

use thiserror::Error;

use crate::battery::{BatteryStatus, Peripherals};
use crate::types::{Axes3, Buttons, DPad, Stick, TouchPoint, Touchpad};

/// Report id of the wired input report.
pub const REPORT_ID: u8 = 0x01;

/// Shortest buffer that carries every mandatory field (status byte included).
pub const MIN_REPORT_LEN: usize = STATUS + 1;

/// Shortest buffer that also carries both touch points.
pub const TOUCH_REPORT_LEN: usize = TOUCH_POINTS + 8;

/// Size of a full wired report.
pub const FULL_REPORT_LEN: usize = 64;

const LEFT_STICK: usize = 1;
const RIGHT_STICK: usize = 3;
const HAT_AND_FACE: usize = 5;
const SHOULDER: usize = 6;
const SYSTEM_AND_COUNTER: usize = 7;
const TRIGGER_L: usize = 8;
const TRIGGER_R: usize = 9;
const SENSOR_TIMESTAMP: usize = 10;
const GYRO: usize = 13;
const ACCEL: usize = 19;
const STATUS: usize = 30;
const TOUCH_PACKETS: usize = 33;
const TOUCH_POINTS: usize = 35;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("report too short: {len} bytes, at least {required} required")]
    TooShort { len: usize, required: usize },
    #[error("unexpected report id {0:#04x}")]
    UnexpectedReportId(u8),
}

/// One decoded input report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Telemetry {
    pub left_stick: Stick,
    pub right_stick: Stick,
    pub trigger_l: u8,
    pub trigger_r: u8,
    pub gyro: Axes3,
    pub accel: Axes3,
    pub battery: BatteryStatus,
    pub buttons: Buttons,
    pub dpad: DPad,
    /// 6-bit counter incremented by the firmware for every report.
    pub counter: u8,
    /// Sensor clock, in firmware ticks.
    pub sensor_timestamp: u16,
    pub peripherals: Peripherals,
    /// Present only when the report is long enough to carry touch data.
    pub touchpad: Option<Touchpad>,
    /// Time since the session started.
    pub timestamp: Duration,
}

/// Stateless decoder with a fixed minimum report length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportDecoder {
    min_len: usize,
}

impl Default for ReportDecoder {
    fn default() -> Self {
        Self::new(MIN_REPORT_LEN)
    }
}

impl ReportDecoder {
    /// Lengths below [`MIN_REPORT_LEN`] are raised to it.
    pub const fn new(min_len: usize) -> Self {
        let min_len = if min_len < MIN_REPORT_LEN {
            MIN_REPORT_LEN
        } else {
            min_len
        };
        Self { min_len }
    }

    pub const fn min_len(&self) -> usize {
        self.min_len
    }

    pub fn decode(&self, raw: &[u8], timestamp: Duration) -> Result<Telemetry, DecodeError> {
        decode(raw, self.min_len, timestamp)
    }
}

/// Decodes a raw wired input report.
///
/// Fails with [`DecodeError::TooShort`] if `raw` is shorter than `min_len`
/// or [`MIN_REPORT_LEN`], whichever is larger.
pub fn decode(raw: &[u8], min_len: usize, timestamp: Duration) -> Result<Telemetry, DecodeError> {
    let required = min_len.max(MIN_REPORT_LEN);
    if raw.len() < required {
        return Err(DecodeError::TooShort {
            len: raw.len(),
            required,
        });
    }
    if raw[0] != REPORT_ID {
        return Err(DecodeError::UnexpectedReportId(raw[0]));
    }

    let status = raw[STATUS];
    let touchpad = (raw.len() >= TOUCH_REPORT_LEN).then(|| Touchpad {
        packets: raw[TOUCH_PACKETS],
        points: [
            TouchPoint::from_bytes(array_at(raw, TOUCH_POINTS)),
            TouchPoint::from_bytes(array_at(raw, TOUCH_POINTS + 4)),
        ],
    });

    Ok(Telemetry {
        left_stick: stick_at(raw, LEFT_STICK),
        right_stick: stick_at(raw, RIGHT_STICK),
        trigger_l: raw[TRIGGER_L],
        trigger_r: raw[TRIGGER_R],
        gyro: axes_at(raw, GYRO),
        accel: axes_at(raw, ACCEL),
        battery: BatteryStatus::from_status_byte(status),
        buttons: Buttons::from_report_bytes(
            raw[HAT_AND_FACE],
            raw[SHOULDER],
            raw[SYSTEM_AND_COUNTER],
        ),
        dpad: DPad::from_hat(raw[HAT_AND_FACE]),
        counter: raw[SYSTEM_AND_COUNTER] >> 2,
        sensor_timestamp: u16::from_le_bytes(array_at(raw, SENSOR_TIMESTAMP)),
        peripherals: Peripherals::from_status_byte(status),
        touchpad,
        timestamp,
    })
}

// Callers check the length first.
#[inline]
fn array_at<const N: usize>(raw: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&raw[offset..offset + N]);
    out
}

#[inline]
fn i16_at(raw: &[u8], offset: usize) -> i16 {
    i16::from_le_bytes(array_at(raw, offset))
}

#[inline]
fn axes_at(raw: &[u8], offset: usize) -> Axes3 {
    Axes3 {
        x: i16_at(raw, offset),
        y: i16_at(raw, offset + 2),
        z: i16_at(raw, offset + 4),
    }
}

#[inline]
fn stick_at(raw: &[u8], offset: usize) -> Stick {
    Stick {
        x: raw[offset],
        y: raw[offset + 1],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Button;

    fn golden_report() -> [u8; FULL_REPORT_LEN] {
        let mut raw = [0u8; FULL_REPORT_LEN];
        raw[0] = REPORT_ID;
        raw[1] = 0x10;
        raw[2] = 0x20;
        raw[3] = 0x7F;
        raw[4] = 0xF0;
        raw[5] = 0x22; // hat east, cross
        raw[6] = 0x05; // L1, L2
        raw[7] = (42 << 2) | 0x01; // counter 42, PS
        raw[8] = 0xC8;
        raw[9] = 0x05;
        raw[10..12].copy_from_slice(&0xBEEF_u16.to_le_bytes());
        raw[13..15].copy_from_slice(&(-2_i16).to_le_bytes());
        raw[15..17].copy_from_slice(&300_i16.to_le_bytes());
        raw[17..19].copy_from_slice(&i16::MIN.to_le_bytes());
        raw[19..21].copy_from_slice(&8192_i16.to_le_bytes());
        raw[21..23].copy_from_slice(&(-8192_i16).to_le_bytes());
        raw[23..25].copy_from_slice(&i16::MAX.to_le_bytes());
        raw[30] = 0x34; // cable, headphones, level 4
        raw[33] = 1;
        raw[35..39].copy_from_slice(&[0x03, 0x34, 0x12, 0xAB]);
        raw[39..43].copy_from_slice(&[0x80, 0x00, 0x00, 0x00]);
        raw
    }

    #[test]
    fn golden_report_decodes_to_expected_values() {
        let raw = golden_report();
        let at = Duration::from_millis(1500);
        let t = decode(&raw, MIN_REPORT_LEN, at).expect("golden report decodes");

        assert_eq!(t.left_stick, Stick { x: 0x10, y: 0x20 });
        assert_eq!(t.right_stick, Stick { x: 0x7F, y: 0xF0 });
        assert_eq!(t.trigger_l, 0xC8);
        assert_eq!(t.trigger_r, 0x05);
        assert_eq!(
            t.gyro,
            Axes3 {
                x: -2,
                y: 300,
                z: i16::MIN
            }
        );
        assert_eq!(
            t.accel,
            Axes3 {
                x: 8192,
                y: -8192,
                z: i16::MAX
            }
        );
        assert_eq!(
            t.battery,
            BatteryStatus {
                percent: 40,
                charging: true
            }
        );
        assert_eq!(t.dpad, DPad::Right);
        assert_eq!(
            t.buttons.pressed().as_slice(),
            &[Button::Cross, Button::L1, Button::L2, Button::Ps]
        );
        assert_eq!(t.counter, 42);
        assert_eq!(t.sensor_timestamp, 0xBEEF);
        assert!(t.peripherals.cable);
        assert!(t.peripherals.headphones);
        assert!(!t.peripherals.microphone);
        assert_eq!(t.timestamp, at);

        let touch = t.touchpad.expect("full report carries touch data");
        assert_eq!(touch.packets, 1);
        assert_eq!(touch.active_points().count(), 1);
        assert_eq!(touch.points[0].x, 0x234);
        assert_eq!(touch.points[0].y, 0xAB1);
    }

    #[test]
    fn every_short_prefix_is_rejected() {
        let raw = golden_report();
        for len in 0..MIN_REPORT_LEN {
            let err = decode(&raw[..len], 0, Duration::ZERO).unwrap_err();
            assert_eq!(
                err,
                DecodeError::TooShort {
                    len,
                    required: MIN_REPORT_LEN
                }
            );
        }
    }

    #[test]
    fn caller_minimum_above_layout_minimum_is_enforced() {
        let raw = golden_report();
        let err = decode(&raw[..40], FULL_REPORT_LEN, Duration::ZERO).unwrap_err();
        assert_eq!(
            err,
            DecodeError::TooShort {
                len: 40,
                required: FULL_REPORT_LEN
            }
        );
    }

    #[test]
    fn minimal_report_decodes_without_touchpad() {
        let raw = golden_report();
        let t = decode(&raw[..MIN_REPORT_LEN], 0, Duration::ZERO)
            .expect("minimal report decodes");
        assert!(t.touchpad.is_none());
        assert_eq!(t.battery.percent, 40);
    }

    #[test]
    fn foreign_report_id_is_rejected() {
        let mut raw = golden_report();
        raw[0] = 0x11;
        let err = decode(&raw, 0, Duration::ZERO).unwrap_err();
        assert_eq!(err, DecodeError::UnexpectedReportId(0x11));
    }

    #[test]
    fn decoder_raises_small_minimum_to_layout_minimum() {
        let decoder = ReportDecoder::new(4);
        assert_eq!(decoder.min_len(), MIN_REPORT_LEN);
        assert!(decoder.decode(&[REPORT_ID; 8], Duration::ZERO).is_err());
    }
}
