//! Routes addressed loads and stores to mapped peripherals.
//!
//! The bus never models RAM: an address no device claims is a
//! [`Fault::Unmapped`], left for the CPU core to deal with.

use std::ops::RangeInclusive;

use clap::{Args, ValueEnum};
use thiserror::Error;

use crate::device::{
    is_mmio, led::LED_BASE_ADDR, segment::SEGMENT_BASE_ADDR, uart::UART_BASE_ADDR, Addr, Event,
    Fault, LedBank, LedRegister, Peripheral, SevenSegment, Uart, Word,
};
use crate::monitor::parse_u32;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MapError {
    #[error("{name} window {start:#x}..={end:#x} overlaps {other}")]
    Overlap {
        name: &'static str,
        other: &'static str,
        start: Addr,
        end: Addr,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LedKind {
    /// Single 8-bit register
    Register,
    /// 256 byte-addressed slots
    Bank,
}

/// Which peripherals to map, and where.
#[derive(Debug, Clone, Args)]
pub struct MachineConfig {
    /// LED panel variant
    #[clap(long, value_enum, default_value_t = LedKind::Register)]
    pub led: LedKind,
    /// Base address of the LED panel
    #[clap(long, value_parser = parse_u32, default_value_t = LED_BASE_ADDR)]
    pub led_base: Addr,
    /// Leave the seven-segment display unmapped
    #[clap(long)]
    pub no_segments: bool,
    /// Leave the UART unmapped
    #[clap(long)]
    pub no_uart: bool,
}

impl Default for MachineConfig {
    fn default() -> Self {
        MachineConfig {
            led: LedKind::Register,
            led_base: LED_BASE_ADDR,
            no_segments: false,
            no_uart: false,
        }
    }
}

impl MachineConfig {
    pub fn build(&self) -> Result<Bus, MapError> {
        let mut bus = Bus::new();

        match self.led {
            LedKind::Register => bus.map(LedRegister::new(self.led_base))?,
            LedKind::Bank => bus.map(LedBank::new(self.led_base))?,
        }
        if !self.no_segments {
            bus.map(SevenSegment::new(SEGMENT_BASE_ADDR))?;
        }
        if !self.no_uart {
            bus.map(Uart::new(UART_BASE_ADDR))?;
        }

        Ok(bus)
    }
}

#[derive(Default)]
pub struct Bus {
    devices: Vec<Box<dyn Peripheral>>,
}

impl Bus {
    pub fn new() -> Self {
        Bus::default()
    }

    pub fn map<P: Peripheral + 'static>(&mut self, device: P) -> Result<(), MapError> {
        let window = device.window();

        if let Some(other) = self.devices.iter().find(|d| overlaps(&d.window(), &window)) {
            return Err(MapError::Overlap {
                name: device.name(),
                other: other.name(),
                start: *window.start(),
                end: *window.end(),
            });
        }

        log::debug!(
            "mapped {} at {:#x}..={:#x}{}",
            device.name(),
            window.start(),
            window.end(),
            if is_mmio(*window.start()) { " (reserved I/O region)" } else { "" }
        );
        self.devices.push(Box::new(device));
        Ok(())
    }

    pub fn devices(&self) -> impl Iterator<Item = &(dyn Peripheral + 'static)> + '_ {
        self.devices.iter().map(|d| d.as_ref())
    }

    fn route(&mut self, addr: Addr) -> Result<&mut Box<dyn Peripheral>, Fault> {
        self.devices
            .iter_mut()
            .find(|d| d.window().contains(&addr))
            .ok_or(Fault::Unmapped { addr })
    }

    pub fn store(&mut self, addr: Addr, value: Word) -> Result<Option<Event>, Fault> {
        let device = self.route(addr)?;
        log::trace!("store {value:#x} -> {addr:#x} ({})", device.name());
        device.write(addr, value)
    }

    pub fn load(&mut self, addr: Addr) -> Result<u8, Fault> {
        let device = self.route(addr)?;
        let value = device.read(addr)?;
        log::trace!("load {addr:#x} ({}) -> {value:#x}", device.name());
        Ok(value)
    }

    /// Hands a byte from the outside world to the first device that takes input.
    pub fn receive(&mut self, byte: u8) -> Result<(), Fault> {
        if self.devices.iter_mut().any(|d| d.receive(byte)) {
            Ok(())
        } else {
            Err(Fault::NoReceiver)
        }
    }
}

fn overlaps(a: &RangeInclusive<Addr>, b: &RangeInclusive<Addr>) -> bool {
    a.start() <= b.end() && b.start() <= a.end()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::segment::Position;
    use crate::device::{Digit, LedState};

    #[test]
    fn default_machine() {
        let mut bus = MachineConfig::default().build().unwrap();
        let names: Vec<_> = bus.devices().map(|d| d.name()).collect();
        assert_eq!(names, ["LED", "seven-segment", "UART"]);

        assert_eq!(
            bus.store(LED_BASE_ADDR, 0x05),
            Ok(Some(Event::Leds(LedState(0x05))))
        );
        assert_eq!(bus.load(LED_BASE_ADDR), Ok(0x05));

        assert_eq!(
            bus.store(SEGMENT_BASE_ADDR + 4, 0x06),
            Ok(Some(Event::Digit(Digit {
                position: Position::MidLeft,
                raw: 0x06
            })))
        );
        assert_eq!(bus.store(UART_BASE_ADDR, b'x' as Word), Ok(Some(Event::Transmit(b'x'))));
    }

    #[test]
    fn unmapped() {
        let mut bus = MachineConfig::default().build().unwrap();

        assert_eq!(bus.load(0), Err(Fault::Unmapped { addr: 0 }));
        assert_eq!(
            bus.store(LED_BASE_ADDR + 4, 1),
            Err(Fault::Unmapped {
                addr: LED_BASE_ADDR + 4
            })
        );
    }

    #[test]
    fn guarded_bytes_reach_led() {
        let mut bus = MachineConfig::default().build().unwrap();
        bus.store(LED_BASE_ADDR, 0x81).unwrap();

        assert!(matches!(
            bus.store(LED_BASE_ADDR + 1, 0xFF),
            Err(Fault::InvalidAddress { device: "LED", .. })
        ));
        assert_eq!(bus.load(LED_BASE_ADDR + 1), Ok(0));
        assert_eq!(bus.load(LED_BASE_ADDR), Ok(0x81));
    }

    #[test]
    fn overlap_rejected() {
        let mut bus = Bus::new();
        bus.map(LedRegister::new(0x100)).unwrap();

        assert_eq!(
            bus.map(LedBank::new(0x80)),
            Err(MapError::Overlap {
                name: "LED bank",
                other: "LED",
                start: 0x80,
                end: 0x17F,
            })
        );
        assert!(bus.map(LedBank::new(0x104)).is_ok());
    }

    #[test]
    fn bank_machine() {
        let config = MachineConfig {
            led: LedKind::Bank,
            led_base: 0x2000,
            no_segments: true,
            no_uart: true,
        };
        let mut bus = config.build().unwrap();

        assert_eq!(
            bus.store(0x20FF, 0x1AB),
            Ok(Some(Event::LedSlot {
                index: 0xFF,
                value: 0xAB
            }))
        );
        assert_eq!(bus.load(0x20FF), Ok(0xAB));
        assert_eq!(bus.receive(b'a'), Err(Fault::NoReceiver));
    }

    #[test]
    fn receive_goes_to_uart() {
        let mut bus = MachineConfig::default().build().unwrap();
        bus.receive(b'k').unwrap();

        assert_eq!(bus.load(UART_BASE_ADDR + 4), Ok(0b11));
        assert_eq!(bus.load(UART_BASE_ADDR), Ok(b'k'));
    }
}
