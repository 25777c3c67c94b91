//! Host-side simulation of the optical link, program memory and supply sensor.
//!
//! Time is virtual: [`SimDelay`] advances the shared clock instead of
//! sleeping, [`SimLine`] answers `read_line` from the peer's scheduled
//! waveform at the current instant and records every level the device
//! drives. Peer frames are laid out with the same [`LinkTiming`] the device
//! uses, so a test reads as "peer sends X at t, device answers Y".

use std::cell::{Cell, RefCell};
use std::vec::Vec;

use embedded_hal::blocking::delay::DelayUs;

use crate::config::{LinkTiming, MemoryMap, FLASH_SIZE, PAGE_SIZE};
use crate::hal::{Line, PowerSensor, ProgramMemory};
use crate::protocol::Symbol;

/// Gap the simulated peer leaves between consecutive frames, in units
const PEER_GAP_UNITS: u64 = 2;

pub struct Wire {
    now: Cell<u64>,
    timing: LinkTiming,
    peer: RefCell<Vec<(u64, u64)>>,
    device: RefCell<Vec<(u64, bool)>>,
    receiver_on: Cell<bool>,
}

impl Wire {
    pub fn new() -> Self {
        Self::with_timing(LinkTiming::DEFAULT)
    }

    pub fn with_timing(timing: LinkTiming) -> Self {
        Self {
            now: Cell::new(0),
            timing,
            peer: RefCell::new(Vec::new()),
            device: RefCell::new(Vec::new()),
            receiver_on: Cell::new(true),
        }
    }

    pub fn line(&self) -> SimLine<'_> {
        SimLine { wire: self }
    }

    pub fn delay(&self) -> SimDelay<'_> {
        SimDelay { wire: self }
    }

    pub fn now(&self) -> u64 {
        self.now.get()
    }

    fn unit(&self) -> u64 {
        self.timing.unit_us as u64
    }

    pub fn receiver_on(&self) -> bool {
        self.receiver_on.get()
    }

    /// Peer holds the line asserted over `[start, end)`.
    pub fn assert_between(&self, start: u64, end: u64) {
        if end > start {
            self.peer.borrow_mut().push((start, end));
        }
    }

    fn peer_level_at(&self, t: u64) -> bool {
        self.peer.borrow().iter().any(|&(s, e)| s <= t && t < e)
    }

    /// Schedule one byte-variant frame starting at `at`; returns its end.
    pub fn peer_byte(&self, at: u64, mut byte: u8) -> u64 {
        let unit = self.unit();
        self.assert_between(at, at + unit);
        for i in 0..8u64 {
            if byte & 0x80 != 0 {
                let slot = at + unit * (1 + i);
                self.assert_between(slot, slot + unit);
            }
            byte <<= 1;
        }
        at + unit * 10
    }

    /// Schedule byte-variant frames back to back; returns the end of the last.
    pub fn peer_bytes(&self, mut at: u64, bytes: &[u8]) -> u64 {
        let mut end = at;
        for &b in bytes {
            end = self.peer_byte(at, b);
            at = end + PEER_GAP_UNITS * self.unit();
        }
        end
    }

    fn peer_symbol(&self, at: u64, sym: Symbol) -> u64 {
        let unit = self.unit();
        let (first, second) = sym.halves();
        if first {
            self.assert_between(at, at + unit);
        }
        if second {
            self.assert_between(at + unit, at + 2 * unit);
        }
        at + 2 * unit
    }

    /// Schedule a symbol-variant packet; returns its end.
    pub fn peer_packet(&self, at: u64, payload: &[u8]) -> u64 {
        let mut t = self.peer_symbol(at, Symbol::Start);
        for &b in payload {
            for i in (0..8).rev() {
                t = self.peer_symbol(t, Symbol::bit(b >> i & 1 != 0));
            }
        }
        self.peer_symbol(t, Symbol::Stop)
    }

    /// Schedule raw symbols, for malformed packets.
    pub fn peer_symbols(&self, mut at: u64, symbols: &[Symbol]) -> u64 {
        for &sym in symbols {
            at = self.peer_symbol(at, sym);
        }
        at
    }

    pub fn device_level_at(&self, t: u64) -> bool {
        self.device
            .borrow()
            .iter()
            .take_while(|&&(when, _)| when <= t)
            .last()
            .map(|&(_, level)| level)
            .unwrap_or(false)
    }

    fn device_rising_edges(&self) -> Vec<u64> {
        let mut edges = Vec::new();
        let mut prev = false;
        for &(when, level) in self.device.borrow().iter() {
            if level && !prev {
                edges.push(when);
            }
            prev = level;
        }
        edges
    }

    /// Decode everything the device transmitted with the byte variant.
    pub fn device_bytes(&self) -> Vec<u8> {
        let unit = self.unit();
        let mut out = Vec::new();
        let mut resume = 0;
        for start in self.device_rising_edges() {
            if start < resume {
                continue;
            }
            let mut v = 0u8;
            for i in 0..8u64 {
                v <<= 1;
                if self.device_level_at(start + unit * (1 + i) + unit / 2) {
                    v |= 1;
                }
            }
            assert!(
                !self.device_level_at(start + unit * 9 + unit / 2),
                "device left the stop slot asserted"
            );
            out.push(v);
            resume = start + unit * 10;
        }
        out
    }

    /// Decode every packet the device transmitted with the symbol variant.
    pub fn device_packets(&self) -> Vec<Vec<u8>> {
        let unit = self.unit();
        let mut packets = Vec::new();
        let mut resume = 0;
        for start in self.device_rising_edges() {
            if start < resume {
                continue;
            }
            let half = |k: u64| self.device_level_at(start + unit * k + unit / 2);
            assert_eq!(Symbol::from_halves(half(0), half(1)), Symbol::Start);

            let mut packet = Vec::new();
            let (mut byte, mut bits) = (0u8, 0u8);
            let mut k = 2;
            loop {
                match Symbol::from_halves(half(k), half(k + 1)) {
                    Symbol::Stop => break,
                    Symbol::Start => panic!("START inside a device packet"),
                    data => {
                        byte = byte << 1 | (data == Symbol::D1) as u8;
                        bits += 1;
                        if bits == 8 {
                            packet.push(byte);
                            byte = 0;
                            bits = 0;
                        }
                    }
                }
                k += 2;
            }
            assert_eq!(bits, 0, "device packet ended mid-byte");
            packets.push(packet);
            resume = start + unit * (k + 2);
        }
        packets
    }
}

impl Default for Wire {
    fn default() -> Self {
        Self::new()
    }
}

pub struct SimLine<'a> {
    wire: &'a Wire,
}

impl Line for SimLine<'_> {
    fn set_line(&mut self, level: bool) {
        let mut device = self.wire.device.borrow_mut();
        if device.last().map(|&(_, l)| l) != Some(level) {
            device.push((self.wire.now(), level));
        }
    }

    fn read_line(&mut self) -> bool {
        self.wire.receiver_on.get() && self.wire.peer_level_at(self.wire.now())
    }

    fn enable_receiver(&mut self, on: bool) {
        self.wire.receiver_on.set(on);
    }
}

pub struct SimDelay<'a> {
    wire: &'a Wire,
}

impl DelayUs<u32> for SimDelay<'_> {
    fn delay_us(&mut self, us: u32) {
        self.wire.now.set(self.wire.now.get() + us as u64);
    }
}

/// NOR-style program memory: erase sets bytes to 0xFF, writes can only
/// clear bits.
pub struct SimFlash {
    pub mem: Vec<u8>,
    staged: [u16; PAGE_SIZE / 2],
    pub erases: Vec<u16>,
    pub writes: Vec<u16>,
    pub fills: usize,
    cut_after_erase: bool,
}

impl SimFlash {
    pub fn new() -> Self {
        Self {
            mem: vec![0xFF; FLASH_SIZE as usize],
            staged: [0xFFFF; PAGE_SIZE / 2],
            erases: Vec::new(),
            writes: Vec::new(),
            fills: 0,
            cut_after_erase: false,
        }
    }

    /// Memory preloaded with `f(addr)` everywhere.
    pub fn with_pattern(f: impl Fn(usize) -> u8) -> Self {
        let mut flash = Self::new();
        for (addr, byte) in flash.mem.iter_mut().enumerate() {
            *byte = f(addr);
        }
        flash
    }

    /// Drop every page write issued after the next erase, as if power
    /// failed in between.
    pub fn cut_power_after_erase(&mut self) {
        self.cut_after_erase = true;
    }

    pub fn page(&self, addr: u16) -> &[u8] {
        let base = MemoryMap::page_base(addr) as usize;
        &self.mem[base..base + PAGE_SIZE]
    }

    pub fn touched(&self) -> bool {
        self.fills != 0 || !self.erases.is_empty() || !self.writes.is_empty()
    }
}

impl Default for SimFlash {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramMemory for SimFlash {
    fn read_byte(&mut self, addr: u16) -> u8 {
        self.mem[addr as usize % self.mem.len()]
    }

    fn fill_word(&mut self, addr: u16, word: u16) {
        self.fills += 1;
        self.staged[(addr as usize % PAGE_SIZE) / 2] = word;
    }

    fn erase_page(&mut self, addr: u16) {
        let base = MemoryMap::page_base(addr);
        self.erases.push(base);
        let base = base as usize;
        self.mem[base..base + PAGE_SIZE].fill(0xFF);
    }

    fn write_page(&mut self, addr: u16) {
        let base = MemoryMap::page_base(addr);
        if self.cut_after_erase && !self.erases.is_empty() {
            return;
        }
        self.writes.push(base);
        let base = base as usize;
        for (i, word) in self.staged.iter().enumerate() {
            let [lo, hi] = word.to_le_bytes();
            self.mem[base + 2 * i] &= lo;
            self.mem[base + 2 * i + 1] &= hi;
        }
        self.staged = [0xFFFF; PAGE_SIZE / 2];
    }
}

/// Supply sensor that always reads the same value.
pub struct FixedPower(pub u8);

impl PowerSensor for FixedPower {
    fn sample(&mut self) -> u8 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_waveform_is_sampled_at_current_time() {
        let wire = Wire::new();
        wire.assert_between(1_000, 2_000);
        let mut line = wire.line();
        let mut delay = wire.delay();
        assert!(!line.read_line());
        delay.delay_us(1_000);
        assert!(line.read_line());
        delay.delay_us(1_000);
        assert!(!line.read_line());
    }

    #[test]
    fn powered_down_receiver_sees_nothing() {
        let wire = Wire::new();
        wire.assert_between(0, 10);
        let mut line = wire.line();
        line.enable_receiver(false);
        assert!(!line.read_line());
    }

    #[test]
    fn flash_write_without_erase_only_clears_bits() {
        let mut flash = SimFlash::with_pattern(|_| 0x0F);
        flash.fill_word(0x100, 0xF0F0);
        flash.write_page(0x100);
        assert_eq!(flash.mem[0x100], 0x00);
        assert_eq!(flash.mem[0x102], 0x0F);
    }
}
