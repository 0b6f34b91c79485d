//! Memory-mapped peripherals.
//!
//! Every device claims an inclusive window of the address space and is
//! reached only through [`Peripheral::read`] and [`Peripheral::write`].
//! Writes hand back an [`Event`] describing what changed;
//! deciding how (or whether) to show it is left to the caller.

pub mod led;
pub mod segment;
pub mod uart;

use std::{fmt, ops::RangeInclusive};

use thiserror::Error;

pub use led::{LedBank, LedRegister, LedState};
pub use segment::{Digit, SevenSegment};
pub use uart::Uart;

/// A machine address.
pub type Addr = u32;
/// A machine word as it leaves a store instruction.
pub type Word = u32;

/// Bottom of the reserved memory-mapped I/O region.
pub const MM_IO_BOT: Addr = 0xFFFF_0000;
/// Top of the reserved memory-mapped I/O region.
pub const MM_IO_TOP: Addr = 0xFFFF_00FF;

/// Whether `addr` falls in the reserved memory-mapped I/O region.
pub fn is_mmio(addr: Addr) -> bool {
    (MM_IO_BOT..=MM_IO_TOP).contains(&addr)
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    #[error("Invalid {device} address access: {addr:#x}")]
    InvalidAddress { device: &'static str, addr: Addr },
    #[error("address {addr:#x} outside of device window {base:#x}..={:#x}", .base + (.len - 1))]
    OutOfRange { addr: Addr, base: Addr, len: u32 },
    #[error("no device mapped at {addr:#x}")]
    Unmapped { addr: Addr },
    #[error("no mapped device accepts input")]
    NoReceiver,
}

/// A value change reported by a device after a successful store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Leds(LedState),
    LedSlot { index: u8, value: u8 },
    Digit(Digit),
    Transmit(u8),
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Leds(state) => write!(f, "{state}"),
            Event::LedSlot { index, value } => write!(f, "LED[{index}] = {value:#x}"),
            Event::Digit(digit) => write!(f, "{digit}"),
            Event::Transmit(byte) => {
                write!(f, "UART TX: '{}' [{byte:#x}]", (*byte as char).escape_default())
            }
        }
    }
}

pub trait Peripheral: fmt::Display {
    fn name(&self) -> &'static str;

    /// Inclusive address window claimed on the bus.
    fn window(&self) -> RangeInclusive<Addr>;

    fn read(&mut self, addr: Addr) -> Result<u8, Fault>;

    /// Stores the low byte of `value`.
    /// `Ok(None)` means the store landed but nothing observable changed.
    fn write(&mut self, addr: Addr, value: Word) -> Result<Option<Event>, Fault>;

    /// Accepts a byte arriving from outside the machine.
    /// Returns `false` if the device has no input side.
    fn receive(&mut self, _byte: u8) -> bool {
        false
    }
}

/// Keeps the low 8 bits of a stored word.
#[inline]
pub(crate) fn low_byte(value: Word) -> u8 {
    (value & 0xFF) as u8
}
