use crate::utils::consts::IDLE_BYTE;

/// Hard data or line bit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Bit {
    #[default]
    Zero,
    One,
}

impl Bit {
    pub fn as_u8(self) -> u8 {
        match self {
            Bit::Zero => 0,
            Bit::One => 1,
        }
    }

    pub fn is_set(self) -> bool {
        self == Bit::One
    }

    pub fn flip(self) -> Self {
        match self {
            Bit::Zero => Bit::One,
            Bit::One => Bit::Zero,
        }
    }
}

impl From<bool> for Bit {
    fn from(value: bool) -> Self {
        if value { Bit::One } else { Bit::Zero }
    }
}

/// Zero is `Zero`, anything else is `One`
impl From<u8> for Bit {
    fn from(value: u8) -> Self {
        Bit::from(value != 0)
    }
}

/// Bit-serial line symbol: a data bit or the idle filler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LineBit {
    Zero,
    One,
    #[default]
    Idle,
}

impl LineBit {
    /// Wire form: 0x00, 0x01 or 0xFF
    pub fn as_u8(self) -> u8 {
        match self {
            LineBit::Zero => 0,
            LineBit::One => 1,
            LineBit::Idle => IDLE_BYTE,
        }
    }

    /// `None` for idle
    pub fn bit(self) -> Option<Bit> {
        match self {
            LineBit::Zero => Some(Bit::Zero),
            LineBit::One => Some(Bit::One),
            LineBit::Idle => None,
        }
    }

    pub fn is_idle(self) -> bool {
        self == LineBit::Idle
    }
}

impl From<Bit> for LineBit {
    fn from(bit: Bit) -> Self {
        match bit {
            Bit::Zero => LineBit::Zero,
            Bit::One => LineBit::One,
        }
    }
}

/// 0xFF is idle, zero is `Zero`, any other value is `One`
impl From<u8> for LineBit {
    fn from(value: u8) -> Self {
        match value {
            IDLE_BYTE => LineBit::Idle,
            0 => LineBit::Zero,
            _ => LineBit::One,
        }
    }
}

/// Expand a byte into line bits, LSB first
pub fn byte_to_line_bits(byte: u8) -> [LineBit; 8] {
    let mut bits = [LineBit::Zero; 8];
    for (i, bit) in bits.iter_mut().enumerate() {
        *bit = Bit::from((byte >> i) & 1).into();
    }
    bits
}

/// Pack bits into a byte, LSB first
pub fn bits_to_byte(bits: &[Bit]) -> u8 {
    let mut byte = 0u8;
    for (i, bit) in bits.iter().enumerate().take(8) {
        if bit.is_set() {
            byte |= 1 << i;
        }
    }
    byte
}

pub fn bits_from_u8s(values: &[u8]) -> Vec<Bit> {
    values.iter().map(|&v| Bit::from(v)).collect()
}

pub fn line_bits_from_u8s(values: &[u8]) -> Vec<LineBit> {
    values.iter().map(|&v| LineBit::from(v)).collect()
}
