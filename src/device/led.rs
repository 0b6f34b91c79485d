use std::{fmt, ops::RangeInclusive};

use super::{low_byte, Addr, Event, Fault, Peripheral, Word};

/// Address of the LED panel register.
pub const LED_BASE_ADDR: Addr = 0xFFFF_0090;
/// Number of slots in an [`LedBank`].
pub const BANK_LEN: u32 = 1 << 8;

pub const GLYPH_ON: char = '●';
pub const GLYPH_OFF: char = '○';

/// The eight LEDs of the panel, bit 7 leftmost.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LedState(pub u8);

impl LedState {
    pub fn is_on(&self, led: u8) -> bool {
        self.0 & (1 << led) != 0
    }

    /// LED states, most significant bit first.
    pub fn lamps(self) -> impl Iterator<Item = bool> {
        (0..8).rev().map(move |led| self.is_on(led))
    }
}

impl fmt::Display for LedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LED State: ")?;
        for on in self.lamps() {
            write!(f, "{} ", if on { GLYPH_ON } else { GLYPH_OFF })?;
        }
        write!(f, " [{:#x}]", self.0)
    }
}

/// Single 8-bit LED register.
///
/// Claims the whole word at its base address so that byte stores to the
/// rest of the word are seen and refused.
#[derive(Debug, Clone)]
pub struct LedRegister {
    base: Addr,
    state: LedState,
}

impl LedRegister {
    pub fn new(base: Addr) -> Self {
        LedRegister {
            base,
            state: LedState::default(),
        }
    }

    pub fn state(&self) -> LedState {
        self.state
    }
}

impl Default for LedRegister {
    fn default() -> Self {
        LedRegister::new(LED_BASE_ADDR)
    }
}

impl Peripheral for LedRegister {
    fn name(&self) -> &'static str {
        "LED"
    }

    fn window(&self) -> RangeInclusive<Addr> {
        self.base..=self.base.saturating_add(3)
    }

    fn read(&mut self, addr: Addr) -> Result<u8, Fault> {
        if addr != self.base {
            return Ok(0);
        }

        Ok(self.state.0)
    }

    fn write(&mut self, addr: Addr, value: Word) -> Result<Option<Event>, Fault> {
        if addr != self.base {
            return Err(Fault::InvalidAddress {
                device: self.name(),
                addr,
            });
        }

        self.state = LedState(low_byte(value));
        Ok(Some(Event::Leds(self.state)))
    }
}

impl fmt::Display for LedRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010X}: {}", self.base, self.state())
    }
}

/// 256 independently addressed LED bytes.
#[derive(Debug, Clone)]
pub struct LedBank {
    base: Addr,
    slots: Box<[u8; BANK_LEN as usize]>,
}

impl LedBank {
    pub fn new(base: Addr) -> Self {
        LedBank {
            base,
            slots: Box::new([0; BANK_LEN as usize]),
        }
    }

    pub fn slots(&self) -> &[u8] {
        &self.slots[..]
    }

    fn index(&self, addr: Addr) -> Result<u8, Fault> {
        addr.checked_sub(self.base)
            .filter(|offset| *offset < BANK_LEN)
            .map(|offset| offset as u8)
            .ok_or(Fault::OutOfRange {
                addr,
                base: self.base,
                len: BANK_LEN,
            })
    }
}

impl Peripheral for LedBank {
    fn name(&self) -> &'static str {
        "LED bank"
    }

    fn window(&self) -> RangeInclusive<Addr> {
        self.base..=self.base.saturating_add(BANK_LEN - 1)
    }

    fn read(&mut self, addr: Addr) -> Result<u8, Fault> {
        let index = self.index(addr)?;
        Ok(self.slots[index as usize])
    }

    fn write(&mut self, addr: Addr, value: Word) -> Result<Option<Event>, Fault> {
        let index = self.index(addr)?;
        let value = low_byte(value);
        self.slots[index as usize] = value;

        Ok(Some(Event::LedSlot { index, value }))
    }
}

impl fmt::Display for LedBank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010X}: LED bank", self.base)?;
        for (row, chunk) in self.slots().chunks(16).enumerate() {
            if chunk.iter().all(|&b| b == 0) {
                continue;
            }
            write!(f, "\n  [{:02X}]", row * 16)?;
            for byte in chunk {
                write!(f, " {byte:02X}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn glyphs(state: LedState) -> String {
        state
            .lamps()
            .map(|on| if on { GLYPH_ON } else { GLYPH_OFF })
            .collect()
    }

    #[test]
    fn starts_dark() {
        let mut led = LedRegister::default();
        assert_eq!(led.state(), LedState(0));
        assert_eq!(led.read(LED_BASE_ADDR), Ok(0));
    }

    #[test]
    fn store_then_load() {
        let mut led = LedRegister::default();
        let event = led.write(LED_BASE_ADDR, 0x05).unwrap();

        assert_eq!(event, Some(Event::Leds(LedState(0x05))));
        assert_eq!(led.read(LED_BASE_ADDR), Ok(0x05));
        assert!(event.unwrap().to_string().contains("0x5"));
    }

    #[test]
    fn rendering() {
        assert_eq!(glyphs(LedState(0xFF)), "●●●●●●●●");
        assert_eq!(glyphs(LedState(0x00)), "○○○○○○○○");
        assert_eq!(glyphs(LedState(0x81)), "●○○○○○○●");
        assert_eq!(
            LedState(0x81).to_string(),
            "LED State: ● ○ ○ ○ ○ ○ ○ ●  [0x81]"
        );
    }

    #[test]
    fn wrong_address_is_refused() {
        let mut led = LedRegister::default();
        led.write(LED_BASE_ADDR, 0xAA).unwrap();

        assert_eq!(
            led.write(LED_BASE_ADDR + 1, 0x55),
            Err(Fault::InvalidAddress {
                device: "LED",
                addr: LED_BASE_ADDR + 1
            })
        );
        assert_eq!(led.state(), LedState(0xAA));
        assert_eq!(led.read(LED_BASE_ADDR + 2), Ok(0));
    }

    #[test]
    fn bank_rejects_outside_window() {
        let mut bank = LedBank::new(0x1000);

        assert!(matches!(bank.write(0xFFF, 1), Err(Fault::OutOfRange { .. })));
        assert!(matches!(bank.write(0x1100, 1), Err(Fault::OutOfRange { .. })));
        assert!(matches!(bank.read(0x1100), Err(Fault::OutOfRange { .. })));
        assert!(bank.slots().iter().all(|&b| b == 0));
    }

    #[test]
    fn bank_slot_event() {
        let mut bank = LedBank::new(0x1000);
        let event = bank.write(0x1003, 0x1FF).unwrap().unwrap();

        assert_eq!(event, Event::LedSlot { index: 3, value: 0xFF });
        assert_eq!(event.to_string(), "LED[3] = 0xff");
    }

    proptest! {
        #[test]
        fn register_round_trip(value in any::<u32>()) {
            let mut led = LedRegister::default();
            led.write(LED_BASE_ADDR, value).unwrap();
            prop_assert_eq!(led.read(LED_BASE_ADDR), Ok((value & 0xFF) as u8));
        }

        #[test]
        fn register_ignores_other_addresses(addr in any::<u32>(), value in any::<u32>()) {
            prop_assume!(addr != LED_BASE_ADDR);
            let mut led = LedRegister::default();
            led.write(LED_BASE_ADDR, 0x3C).unwrap();

            prop_assert!(led.write(addr, value).is_err());
            prop_assert_eq!(led.state(), LedState(0x3C));
            prop_assert_eq!(led.read(addr), Ok(0));
        }

        #[test]
        fn bank_touches_one_slot(index in 0u32..BANK_LEN, value in any::<u32>()) {
            let base = LED_BASE_ADDR;
            let mut bank = LedBank::new(base);
            let fill = |i: u32| (0xA5 ^ i) as u8;
            for i in 0..BANK_LEN {
                bank.write(base + i, fill(i) as Word).unwrap();
            }

            bank.write(base + index, value).unwrap();

            prop_assert_eq!(bank.read(base + index), Ok((value & 0xFF) as u8));
            for (i, slot) in bank.slots().iter().enumerate() {
                let i = i as u32;
                if i != index {
                    prop_assert_eq!(*slot, fill(i));
                }
            }
        }
    }
}
