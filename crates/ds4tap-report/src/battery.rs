/// Level reported by the firmware for a full battery.
pub const FULL_LEVEL: u8 = 10;

const LEVEL_MASK: u8 = 0x0F;
const CABLE_BIT: u8 = 4;
const HEADPHONES_BIT: u8 = 5;
const MICROPHONE_BIT: u8 = 6;
const EXTENSION_BIT: u8 = 7;

/// Battery state derived from the controller status byte.
///
/// `percent` is always a multiple of ten in `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BatteryStatus {
    pub percent: u8,
    pub charging: bool,
}

impl BatteryStatus {
    /// Derives the battery state from the status byte.
    ///
    /// The low nibble is the level, bit 4 is set while a cable powers the
    /// controller. Unplugged controllers report one unit low, and a cabled
    /// level above full means the battery is idle rather than charging.
    pub const fn from_status_byte(byte: u8) -> Self {
        let cable = (byte >> CABLE_BIT) & 1 == 1;
        let mut level = byte & LEVEL_MASK;

        // Must be evaluated before the level is adjusted.
        let charging = cable && level <= FULL_LEVEL;

        if !cable {
            level += 1;
        }
        if level > FULL_LEVEL {
            level = FULL_LEVEL;
        }

        Self {
            percent: level * 10,
            charging,
        }
    }

    pub const fn is_full(&self) -> bool {
        self.percent == 100
    }
}

/// Accessories reported in the upper bits of the status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Peripherals {
    pub cable: bool,
    pub headphones: bool,
    pub microphone: bool,
    pub extension: bool,
}

impl Peripherals {
    pub const fn from_status_byte(byte: u8) -> Self {
        Self {
            cable: bit(byte, CABLE_BIT),
            headphones: bit(byte, HEADPHONES_BIT),
            microphone: bit(byte, MICROPHONE_BIT),
            extension: bit(byte, EXTENSION_BIT),
        }
    }
}

#[inline]
const fn bit(byte: u8, index: u8) -> bool {
    (byte >> index) & 1 == 1
}
