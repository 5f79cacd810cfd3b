use smallvec::SmallVec;

/// Raw stick position. `0x00` is left/up, `0xFF` right/down, centre is
/// around `0x7F`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Stick {
    pub x: u8,
    pub y: u8,
}

/// Signed 16-bit sensor reading for three axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Axes3 {
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

/// Digital controller buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Square,
    Cross,
    Circle,
    Triangle,
    L1,
    R1,
    L2,
    R2,
    Share,
    Options,
    L3,
    R3,
    Ps,
    Touchpad,
}

impl Button {
    pub const ALL: [Button; 14] = [
        Button::Square,
        Button::Cross,
        Button::Circle,
        Button::Triangle,
        Button::L1,
        Button::R1,
        Button::L2,
        Button::R2,
        Button::Share,
        Button::Options,
        Button::L3,
        Button::R3,
        Button::Ps,
        Button::Touchpad,
    ];

    #[inline]
    pub const fn bit(self) -> u16 {
        1 << self as u16
    }

    pub const fn name(self) -> &'static str {
        match self {
            Button::Square => "square",
            Button::Cross => "cross",
            Button::Circle => "circle",
            Button::Triangle => "triangle",
            Button::L1 => "l1",
            Button::R1 => "r1",
            Button::L2 => "l2",
            Button::R2 => "r2",
            Button::Share => "share",
            Button::Options => "options",
            Button::L3 => "l3",
            Button::R3 => "r3",
            Button::Ps => "ps",
            Button::Touchpad => "touchpad",
        }
    }
}

/// Set of pressed buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Buttons(u16);

impl Buttons {
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Builds the set from the three report bytes that carry button bits.
    ///
    /// `face` holds the face buttons in its high nibble, `shoulder` the
    /// shoulder/stick/menu buttons and `system` PS and touchpad click in
    /// bits 0 and 1.
    pub const fn from_report_bytes(face: u8, shoulder: u8, system: u8) -> Self {
        let face = (face >> 4) as u16;
        let shoulder = shoulder as u16;
        let system = (system & 0b11) as u16;
        Self(face | (shoulder << 4) | (system << 12))
    }

    #[inline]
    pub const fn contains(&self, button: Button) -> bool {
        self.0 & button.bit() != 0
    }

    #[inline]
    pub fn insert(&mut self, button: Button) {
        self.0 |= button.bit();
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn count(&self) -> u32 {
        self.0.count_ones()
    }

    /// Pressed buttons in report order.
    pub fn pressed(&self) -> SmallVec<[Button; 14]> {
        Button::ALL
            .iter()
            .copied()
            .filter(|b| self.contains(*b))
            .collect()
    }
}

impl FromIterator<Button> for Buttons {
    fn from_iter<I: IntoIterator<Item = Button>>(iter: I) -> Self {
        let mut buttons = Buttons::empty();
        for button in iter {
            buttons.insert(button);
        }
        buttons
    }
}

/// D-pad direction, decoded from the hat nibble (0 = north, clockwise).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DPad {
    Up,
    UpRight,
    Right,
    DownRight,
    Down,
    DownLeft,
    Left,
    UpLeft,
    #[default]
    Neutral,
}

impl DPad {
    /// Anything outside `0..=7` is neutral; firmware sends both 8 and 15.
    pub const fn from_hat(hat: u8) -> Self {
        match hat & 0x0F {
            0 => DPad::Up,
            1 => DPad::UpRight,
            2 => DPad::Right,
            3 => DPad::DownRight,
            4 => DPad::Down,
            5 => DPad::DownLeft,
            6 => DPad::Left,
            7 => DPad::UpLeft,
            _ => DPad::Neutral,
        }
    }

    pub const fn is_neutral(&self) -> bool {
        matches!(self, DPad::Neutral)
    }
}

/// One finger on the touchpad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TouchPoint {
    pub active: bool,
    /// Firmware tracking id, increments with every new touch.
    pub id: u8,
    /// 12-bit horizontal position.
    pub x: u16,
    /// 12-bit vertical position.
    pub y: u16,
}

impl TouchPoint {
    /// Decodes a 4-byte finger record. Bit 7 of the first byte is set when
    /// the finger is *not* touching.
    pub const fn from_bytes(bytes: [u8; 4]) -> Self {
        let [head, b1, b2, b3] = bytes;
        Self {
            active: head & 0x80 == 0,
            id: head & 0x7F,
            x: (b1 as u16) | (((b2 & 0x0F) as u16) << 8),
            y: ((b2 >> 4) as u16) | ((b3 as u16) << 4),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Touchpad {
    pub packets: u8,
    pub points: [TouchPoint; 2],
}

impl Touchpad {
    pub fn active_points(&self) -> impl Iterator<Item = &TouchPoint> {
        self.points.iter().filter(|p| p.active)
    }
}
