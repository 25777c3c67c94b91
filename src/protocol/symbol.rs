//! Two-slice symbol transport
//!
//! Every symbol occupies two units; the first unit carries the high bit of
//! the code. Data bits travel as one symbol each, MSB first. An idle line
//! reads as STOP, a stuck-asserted line reads as START, so neither can be
//! mistaken for data.

use embedded_hal::blocking::delay::DelayUs;

use super::transport::Timed;
use crate::config::LinkTiming;
use crate::hal::Line;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Symbol {
    Stop = 0b00,
    D0 = 0b01,
    D1 = 0b10,
    Start = 0b11,
}

impl Symbol {
    pub const fn from_halves(first: bool, second: bool) -> Self {
        match (first, second) {
            (false, false) => Symbol::Stop,
            (false, true) => Symbol::D0,
            (true, false) => Symbol::D1,
            (true, true) => Symbol::Start,
        }
    }

    pub const fn halves(self) -> (bool, bool) {
        let code = self as u8;
        (code & 0b10 != 0, code & 0b01 != 0)
    }

    /// Data symbol for one bit.
    pub const fn bit(set: bool) -> Self {
        if set {
            Symbol::D1
        } else {
            Symbol::D0
        }
    }
}

/// Symbol-oriented transport over one line.
///
/// Packet framing lives in [`super::packet`].
pub struct SymbolLink<L, D> {
    pub(super) timed: Timed<L, D>,
}

impl<L: Line, D: DelayUs<u32>> SymbolLink<L, D> {
    pub fn new(line: L, delay: D, timing: LinkTiming) -> Self {
        Self {
            timed: Timed::new(line, delay, timing),
        }
    }

    pub fn timed(&mut self) -> &mut Timed<L, D> {
        &mut self.timed
    }

    pub fn send_sym(&mut self, sym: Symbol) {
        let (first, second) = sym.halves();
        self.timed.drive_unit(first);
        self.timed.drive_unit(second);
    }

    pub fn send_byte(&mut self, v: u8) {
        for i in (0..8).rev() {
            self.send_sym(Symbol::bit(v >> i & 1 != 0));
        }
    }

    /// Sample both halves of the symbol under the cursor.
    ///
    /// Must be called with the cursor in the middle of the first half; leaves
    /// it in the middle of the first half of the next symbol.
    pub fn recv_sym(&mut self) -> Symbol {
        let first = self.timed.sample_unit();
        let second = self.timed.sample_unit();
        Symbol::from_halves(first, second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Wire;

    #[test]
    fn halves_round_trip() {
        for sym in [Symbol::Stop, Symbol::D0, Symbol::D1, Symbol::Start] {
            let (a, b) = sym.halves();
            assert_eq!(Symbol::from_halves(a, b), sym);
        }
        assert_eq!(Symbol::Start.halves(), (true, true));
        assert_eq!(Symbol::D0.halves(), (false, true));
    }

    #[test]
    fn byte_is_eight_symbols_msb_first() {
        let wire = Wire::new();
        let mut link = SymbolLink::new(wire.line(), wire.delay(), LinkTiming::DEFAULT);
        link.send_byte(0b1000_0000);
        assert_eq!(wire.now(), 16_000);
        // D1 = asserted then idle
        assert!(wire.device_level_at(500));
        assert!(!wire.device_level_at(1_500));
        // D0 = idle then asserted
        assert!(!wire.device_level_at(2_500));
        assert!(wire.device_level_at(3_500));
    }

    #[test]
    fn recv_sym_reads_scheduled_symbols() {
        let wire = Wire::new();
        wire.peer_symbols(0, &[Symbol::D1, Symbol::D0, Symbol::Stop, Symbol::Start]);
        let mut link = SymbolLink::new(wire.line(), wire.delay(), LinkTiming::DEFAULT);
        link.timed().pause_us(500);
        assert_eq!(link.recv_sym(), Symbol::D1);
        assert_eq!(link.recv_sym(), Symbol::D0);
        assert_eq!(link.recv_sym(), Symbol::Stop);
        assert_eq!(link.recv_sym(), Symbol::Start);
    }
}
