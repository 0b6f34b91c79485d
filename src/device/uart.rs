use std::{collections::VecDeque, fmt, ops::RangeInclusive};

use bitflags::bitflags;

use super::{low_byte, Addr, Event, Fault, Peripheral, Word};

pub const UART_BASE_ADDR: Addr = 0x1000_0040;

const DATA: Addr = 0;
const STATUS: Addr = 4;
const CONTROL: Addr = 8;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Status: u8 {
        /// Transmitter can take another byte
        const TX_READY = 1 << 0;
        /// Data register holds an unread byte
        const RX_DATA_AVAILABLE = 1 << 1;
        const TX_BUSY = 1 << 2;
        const RX_BUSY = 1 << 3;
    }
}

/// Polled UART with data, status and control registers.
#[derive(Debug, Clone)]
pub struct Uart {
    base: Addr,
    data: u8,
    status: Status,
    control: u8,
    rx: VecDeque<u8>,
}

impl Uart {
    pub fn new(base: Addr) -> Self {
        Uart {
            base,
            data: 0,
            status: Status::TX_READY,
            control: 0,
            rx: VecDeque::new(),
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Bytes waiting behind the data register.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    fn read_data(&mut self) -> u8 {
        if !self.status.contains(Status::RX_DATA_AVAILABLE) {
            return self.data;
        }

        let data = self.data;
        self.status.remove(Status::RX_DATA_AVAILABLE);

        if let Some(next) = self.rx.pop_front() {
            self.data = next;
            self.status.insert(Status::RX_DATA_AVAILABLE);
        }

        data
    }
}

impl Default for Uart {
    fn default() -> Self {
        Uart::new(UART_BASE_ADDR)
    }
}

impl Peripheral for Uart {
    fn name(&self) -> &'static str {
        "UART"
    }

    fn window(&self) -> RangeInclusive<Addr> {
        self.base..=self.base.saturating_add(CONTROL + 3)
    }

    fn read(&mut self, addr: Addr) -> Result<u8, Fault> {
        let value = match addr.wrapping_sub(self.base) {
            DATA => self.read_data(),
            STATUS => self.status.bits(),
            CONTROL => self.control,
            _ => {
                log::debug!("UART read from unknown register {addr:#x}");
                0
            }
        };

        Ok(value)
    }

    fn write(&mut self, addr: Addr, value: Word) -> Result<Option<Event>, Fault> {
        match addr.wrapping_sub(self.base) {
            DATA => {
                let byte = low_byte(value);
                self.status.insert(Status::TX_READY);
                self.status.remove(Status::TX_BUSY);
                Ok(Some(Event::Transmit(byte)))
            }
            STATUS => {
                self.status = Status::from_bits_retain(low_byte(value));
                Ok(None)
            }
            CONTROL => {
                self.control = low_byte(value);
                Ok(None)
            }
            _ => Err(Fault::InvalidAddress {
                device: self.name(),
                addr,
            }),
        }
    }

    fn receive(&mut self, byte: u8) -> bool {
        if self.status.contains(Status::RX_DATA_AVAILABLE) {
            self.rx.push_back(byte);
        } else {
            self.data = byte;
            self.status.insert(Status::RX_DATA_AVAILABLE);
        }

        true
    }
}

impl fmt::Display for Uart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:#010X}: UART DATA {:#04X} STATUS {:#010b} CONTROL {:#04X} ({} queued)",
            self.base,
            self.data,
            self.status().bits(),
            self.control,
            self.pending()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATA_ADDR: Addr = UART_BASE_ADDR;
    const STATUS_ADDR: Addr = UART_BASE_ADDR + 4;
    const CONTROL_ADDR: Addr = UART_BASE_ADDR + 8;

    #[test]
    fn starts_ready() {
        let mut uart = Uart::default();
        assert_eq!(uart.read(STATUS_ADDR), Ok(Status::TX_READY.bits()));
        assert_eq!(uart.read(DATA_ADDR), Ok(0));
    }

    #[test]
    fn transmit() {
        let mut uart = Uart::default();
        uart.write(STATUS_ADDR, Status::TX_BUSY.bits() as Word).unwrap();

        assert_eq!(uart.write(DATA_ADDR, 0x148), Ok(Some(Event::Transmit(b'H'))));
        assert_eq!(uart.status(), Status::TX_READY);
    }

    #[test]
    fn receive_in_order() {
        let mut uart = Uart::default();
        for byte in b"hi!" {
            assert!(uart.receive(*byte));
        }
        assert_eq!(uart.pending(), 2);

        let mut received = Vec::new();
        while uart.status().contains(Status::RX_DATA_AVAILABLE) {
            received.push(uart.read(DATA_ADDR).unwrap());
        }

        assert_eq!(received, b"hi!");
        assert_eq!(uart.pending(), 0);
        // without fresh data the register keeps its last byte
        assert_eq!(uart.read(DATA_ADDR), Ok(b'!'));
    }

    #[test]
    fn control_register() {
        let mut uart = Uart::default();
        assert_eq!(uart.write(CONTROL_ADDR, 0x1234), Ok(None));
        assert_eq!(uart.read(CONTROL_ADDR), Ok(0x34));
    }

    #[test]
    fn unknown_register() {
        let mut uart = Uart::default();

        assert!(matches!(
            uart.write(UART_BASE_ADDR + 1, 0),
            Err(Fault::InvalidAddress { device: "UART", .. })
        ));
        assert_eq!(uart.read(UART_BASE_ADDR + 2), Ok(0));
    }
}
