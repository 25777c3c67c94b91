//! Byte-timing transport
//!
//! Wire format, one unit per slot: START (asserted), eight data bits MSB
//! first, STOP (idle). There is no clock line; the receiver finds the START
//! edge by polling and then samples every bit at a fixed offset from it, so
//! call sites must not add work between `recv_byte` calls that would make
//! them miss the next edge.

use embedded_hal::blocking::delay::DelayUs;
use log::trace;

use super::{LinkError, Result};
use crate::config::LinkTiming;
use crate::hal::Line;

/// A [`Line`] paired with a delay source, stepping in fixed time slices.
///
/// Shared by the byte and symbol transports.
pub struct Timed<L, D> {
    line: L,
    delay: D,
    timing: LinkTiming,
}

impl<L: Line, D: DelayUs<u32>> Timed<L, D> {
    pub fn new(line: L, delay: D, timing: LinkTiming) -> Self {
        Self { line, delay, timing }
    }

    pub fn timing(&self) -> &LinkTiming {
        &self.timing
    }

    pub fn line_mut(&mut self) -> &mut L {
        &mut self.line
    }

    #[inline]
    pub fn pause_us(&mut self, us: u32) {
        self.delay.delay_us(us);
    }

    /// Drive `level` and hold it for one unit.
    #[inline]
    pub fn drive_unit(&mut self, level: bool) {
        self.line.set_line(level);
        self.delay.delay_us(self.timing.unit_us);
    }

    #[inline]
    pub fn sample(&mut self) -> bool {
        self.line.read_line()
    }

    /// Sample, then wait one unit.
    #[inline]
    pub fn sample_unit(&mut self) -> bool {
        let level = self.line.read_line();
        self.delay.delay_us(self.timing.unit_us);
        level
    }

    /// Poll for an asserted line for at most `rounds` polling rounds.
    ///
    /// On success the line was seen asserted and `start_settle_us` has
    /// elapsed since, which puts the caller in the middle of the first
    /// slot. Without activity this returns after exactly
    /// `rounds * round_us()`.
    pub fn hunt_start(&mut self, rounds: u8) -> bool {
        for _ in 0..rounds {
            for _ in 0..self.timing.polls_per_round {
                if self.line.read_line() {
                    self.delay.delay_us(self.timing.start_settle_us);
                    return true;
                }
                self.delay.delay_us(self.timing.poll_slice_us);
            }
        }
        false
    }

    /// Wait until the peer releases the line, for at most `rounds` rounds.
    pub fn wait_idle(&mut self, rounds: u8) -> bool {
        for _ in 0..rounds {
            for _ in 0..self.timing.polls_per_round {
                if !self.line.read_line() {
                    return true;
                }
                self.delay.delay_us(self.timing.poll_slice_us);
            }
        }
        false
    }
}

/// Byte-oriented transport over one line.
pub struct ByteLink<L, D> {
    timed: Timed<L, D>,
}

impl<L: Line, D: DelayUs<u32>> ByteLink<L, D> {
    pub fn new(line: L, delay: D, timing: LinkTiming) -> Self {
        Self {
            timed: Timed::new(line, delay, timing),
        }
    }

    pub fn timed(&mut self) -> &mut Timed<L, D> {
        &mut self.timed
    }

    /// Transmit `v` as START, eight bits MSB first, STOP.
    pub fn send_byte(&mut self, mut v: u8) {
        self.timed.drive_unit(true);
        for _ in 0..8 {
            self.timed.drive_unit(v & 0x80 != 0);
            v <<= 1;
        }
        self.timed.drive_unit(false);
    }

    /// Receive one byte, waiting at most `timeout` polling rounds for START.
    pub fn recv_byte(&mut self, timeout: u8) -> Result<u8> {
        if !self.timed.hunt_start(timeout) {
            return Err(LinkError::Timeout);
        }
        // middle of START -> middle of bit 7
        let unit = self.timed.timing().unit_us;
        self.timed.pause_us(unit);

        let mut v = 0u8;
        for _ in 0..8 {
            v <<= 1;
            if self.timed.sample_unit() {
                v |= 1;
            }
        }

        if self.timed.sample() {
            trace!("stop slot asserted, resyncing");
            self.timed.wait_idle(timeout);
            return Err(LinkError::Framing);
        }
        Ok(v)
    }

    /// Receive exactly `buf.len()` bytes, each with its own `timeout`.
    pub fn recv_exact(&mut self, buf: &mut [u8], timeout: u8) -> Result<()> {
        for slot in buf.iter_mut() {
            *slot = self.recv_byte(timeout)?;
        }
        Ok(())
    }

    /// Receive a big-endian 16-bit value.
    pub fn recv_u16(&mut self, timeout: u8) -> Result<u16> {
        let mut raw = [0u8; 2];
        self.recv_exact(&mut raw, timeout)?;
        Ok(u16::from_be_bytes(raw))
    }
}
