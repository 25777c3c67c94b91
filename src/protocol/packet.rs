//! Packet framing over the symbol transport and packet-variant requests
//!
//! A packet is START, any number of data bytes, STOP. Requests carry their
//! own length fields; writes repeat the address after the data and append a
//! rolling hash so a corrupted request is dropped instead of programmed.

use embedded_hal::blocking::delay::DelayUs;
use log::trace;

use super::checksum::xorshift_hash;
use super::symbol::{Symbol, SymbolLink};
use super::{LinkError, Result};
use crate::config::MAX_BLOCK;
use crate::hal::Line;

const OP_READ: u8 = 0x00;
const OP_WRITE: u8 = 0x01;
const OP_POWER: u8 = 0x02;

/// Status byte leading every packet-variant response
pub const STATUS_OK: u8 = 0x00;
pub const STATUS_OUT_OF_RANGE: u8 = 0x01;

impl<L: Line, D: DelayUs<u32>> SymbolLink<L, D> {
    pub fn send_packet(&mut self, payload: &[u8]) {
        self.send_sym(Symbol::Start);
        for &b in payload {
            self.send_byte(b);
        }
        self.send_sym(Symbol::Stop);
    }

    /// Receive one packet into `buf`, waiting at most `sync_rounds` polling
    /// rounds for its START.
    ///
    /// Returns the true payload length. Bytes beyond `buf.len()` are counted
    /// but not stored.
    pub fn recv_packet(&mut self, buf: &mut [u8], sync_rounds: u8) -> Result<usize> {
        if !self.timed.hunt_start(sync_rounds) {
            return Err(LinkError::NoSync);
        }
        if self.recv_sym() != Symbol::Start {
            return Err(self.desync(sync_rounds));
        }

        let mut count = 0usize;
        let mut byte = 0u8;
        let mut bits = 0u8;
        loop {
            match self.recv_sym() {
                Symbol::Stop if bits == 0 => return Ok(count),
                Symbol::Stop | Symbol::Start => return Err(self.desync(sync_rounds)),
                data => {
                    byte = byte << 1 | (data == Symbol::D1) as u8;
                    bits += 1;
                    if bits == 8 {
                        if let Some(slot) = buf.get_mut(count) {
                            *slot = byte;
                        }
                        count += 1;
                        byte = 0;
                        bits = 0;
                    }
                }
            }
        }
    }

    fn desync(&mut self, rounds: u8) -> LinkError {
        trace!("packet desync, waiting for idle line");
        self.timed.wait_idle(rounds);
        LinkError::Framing
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestError {
    /// Unknown opcode, wrong length or block too large
    Malformed,
    /// Hash or repeated address does not match
    Integrity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketRequest<'a> {
    Read { addr: u16, size: u8 },
    Write { addr: u16, data: &'a [u8] },
    Power,
}

impl<'a> PacketRequest<'a> {
    pub fn parse(packet: &'a [u8]) -> core::result::Result<Self, RequestError> {
        match packet {
            [OP_READ, hi, lo, size] => {
                if *size as usize > MAX_BLOCK {
                    return Err(RequestError::Malformed);
                }
                Ok(PacketRequest::Read {
                    addr: u16::from_be_bytes([*hi, *lo]),
                    size: *size,
                })
            }
            [OP_WRITE, hi, lo, size, rest @ ..] => {
                let size = *size as usize;
                if size > MAX_BLOCK || rest.len() != size + 3 {
                    return Err(RequestError::Malformed);
                }
                let (data, trailer) = rest.split_at(size);
                let addr = u16::from_be_bytes([*hi, *lo]);
                if u16::from_be_bytes([trailer[0], trailer[1]]) != addr {
                    return Err(RequestError::Integrity);
                }
                if xorshift_hash(data) != trailer[2] {
                    return Err(RequestError::Integrity);
                }
                Ok(PacketRequest::Write { addr, data })
            }
            [OP_POWER] => Ok(PacketRequest::Power),
            _ => Err(RequestError::Malformed),
        }
    }

    /// Encode the request into `out`, returning the used prefix.
    ///
    /// `out` must hold at least `MAX_REQUEST` bytes for writes.
    pub fn encode<'b>(&self, out: &'b mut [u8]) -> &'b [u8] {
        let len = match *self {
            PacketRequest::Read { addr, size } => {
                let [hi, lo] = addr.to_be_bytes();
                out[..4].copy_from_slice(&[OP_READ, hi, lo, size]);
                4
            }
            PacketRequest::Write { addr, data } => {
                let [hi, lo] = addr.to_be_bytes();
                let n = data.len();
                out[..4].copy_from_slice(&[OP_WRITE, hi, lo, n as u8]);
                out[4..4 + n].copy_from_slice(data);
                out[4 + n..7 + n].copy_from_slice(&[hi, lo, xorshift_hash(data)]);
                7 + n
            }
            PacketRequest::Power => {
                out[0] = OP_POWER;
                1
            }
        };
        &out[..len]
    }
}
