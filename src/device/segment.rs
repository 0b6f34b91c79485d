use std::{fmt, ops::RangeInclusive};

use phf::{phf_map, Map};

use super::{low_byte, Addr, Event, Fault, Peripheral, Word};

pub const SEGMENT_BASE_ADDR: Addr = 0x1000_0020;
pub const DIGITS: usize = 4;

const SEGMENT_NAMES: [char; 7] = ['a', 'b', 'c', 'd', 'e', 'f', 'g'];

/// Patterns the panel understands, bit 0 driving segment `a`.
/// Anything else leaves the digit blank.
static PATTERNS: Map<u8, char> = phf_map! {
    0x00u8 => ' ',
    0x3Fu8 => '0',
    0x06u8 => '1',
    0x5Bu8 => '2',
    0x4Fu8 => '3',
    0x66u8 => '4',
    0x6Du8 => '5',
    0x7Du8 => '6',
    0x07u8 => '7',
    0x7Fu8 => '8',
    0x6Fu8 => '9',
    0x77u8 => 'A',
    0x7Cu8 => 'b',
    0x39u8 => 'C',
    0x5Eu8 => 'd',
    0x79u8 => 'E',
    0x71u8 => 'F',
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Position {
    Left,
    MidLeft,
    MidRight,
    Right,
}

impl Position {
    const ALL: [Position; DIGITS] = [
        Position::Left,
        Position::MidLeft,
        Position::MidRight,
        Position::Right,
    ];
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Position::Left => "LEFT",
            Position::MidLeft => "MID-LEFT",
            Position::MidRight => "MID-RIGHT",
            Position::Right => "RIGHT",
        })
    }
}

/// One digit as it was last written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Digit {
    pub position: Position,
    pub raw: u8,
}

impl Digit {
    pub fn symbol(&self) -> Option<char> {
        PATTERNS.get(&self.raw).copied()
    }

    /// Lit segments, zero when the pattern is not recognised.
    pub fn segments(&self) -> u8 {
        if self.symbol().is_some() {
            self.raw & 0x7F
        } else {
            0
        }
    }
}

impl fmt::Display for Digit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let segments = self.segments();
        write!(f, "7SEG {}: [", self.position)?;
        for (i, name) in SEGMENT_NAMES.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            let lit = segments & (1 << i) != 0;
            write!(f, "{}", if lit { *name } else { '-' })?;
        }
        write!(
            f,
            "] '{}' [{:#x}]",
            self.symbol().unwrap_or(' '),
            self.raw
        )
    }
}

/// Four-digit seven-segment display, one word per digit.
#[derive(Debug, Clone)]
pub struct SevenSegment {
    base: Addr,
    digits: [u8; DIGITS],
}

impl SevenSegment {
    pub fn new(base: Addr) -> Self {
        SevenSegment {
            base,
            digits: [0; DIGITS],
        }
    }

    pub fn digit(&self, position: Position) -> Digit {
        Digit {
            position,
            raw: self.digits[position as usize],
        }
    }

    fn position(&self, addr: Addr) -> Result<Position, Fault> {
        let invalid = Fault::InvalidAddress {
            device: self.name(),
            addr,
        };

        match addr.checked_sub(self.base) {
            Some(offset) if offset % 4 == 0 && (offset / 4) < DIGITS as u32 => {
                Ok(Position::ALL[(offset / 4) as usize])
            }
            _ => Err(invalid),
        }
    }
}

impl Default for SevenSegment {
    fn default() -> Self {
        SevenSegment::new(SEGMENT_BASE_ADDR)
    }
}

impl Peripheral for SevenSegment {
    fn name(&self) -> &'static str {
        "seven-segment"
    }

    fn window(&self) -> RangeInclusive<Addr> {
        self.base..=self.base.saturating_add(4 * DIGITS as u32 - 1)
    }

    fn read(&mut self, addr: Addr) -> Result<u8, Fault> {
        let position = self.position(addr)?;
        Ok(self.digits[position as usize])
    }

    fn write(&mut self, addr: Addr, value: Word) -> Result<Option<Event>, Fault> {
        let position = self.position(addr)?;
        self.digits[position as usize] = low_byte(value);

        Ok(Some(Event::Digit(self.digit(position))))
    }
}

impl fmt::Display for SevenSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010X}: ", self.base)?;
        for position in Position::ALL {
            write!(f, "{}", self.digit(position).symbol().unwrap_or(' '))?;
        }
        Ok(())
    }
}
