//! Programmer console
//!
//! Line-oriented shell on the programmer's serial port. Every response line
//! starts with `#` (human readable), `-` (success) or `!` (failure) and ends
//! in CR LF.
//!
//! | command   | effect                                                  |
//! |-----------|---------------------------------------------------------|
//! | `v`       | build epoch                                             |
//! | `d`       | hold the optical line asserted and reset the target     |
//! | `n`       | release the line and reset the target                   |
//! | `s<hex>`  | send one packet to the target                           |
//! | `r`       | receive one packet from the target, printed as hex      |

use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::digital::v2::OutputPin;
use embedded_hal::serial;
use ufmt::{uWrite, uwrite};

use crate::config::{MAX_PACKET, MAX_REQUEST};
use crate::hal::Line;
use crate::protocol::SymbolLink;

/// Longest accepted command line, terminator excluded
pub const LINE_CAPACITY: usize = 160;

/// Reset pulse phases: asserted, then released before talking to the target
const RESET_PULSE_US: u32 = 100_000;

/// Polling rounds `r` waits for the target's START symbol
const RECV_SYNC_ROUNDS: u8 = 250;

const HEX_CHARS: [u8; 16] = *b"0123456789ABCDEF";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HexError {
    OddLength,
    TooBig,
    BadDigit,
}

impl HexError {
    pub const fn as_str(self) -> &'static str {
        match self {
            HexError::OddLength => "hex parity mismatch",
            HexError::TooBig => "too big packet",
            HexError::BadDigit => "bad hex digit",
        }
    }
}

fn nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Decode hex `digits` into `out`, returning the byte count.
pub fn decode_hex(digits: &[u8], out: &mut [u8]) -> Result<usize, HexError> {
    if digits.len() % 2 != 0 {
        return Err(HexError::OddLength);
    }
    let len = digits.len() / 2;
    if len > out.len() {
        return Err(HexError::TooBig);
    }
    for (slot, pair) in out.iter_mut().zip(digits.chunks_exact(2)) {
        match (nibble(pair[0]), nibble(pair[1])) {
            (Some(hi), Some(lo)) => *slot = hi << 4 | lo,
            _ => return Err(HexError::BadDigit),
        }
    }
    Ok(len)
}

/// Blocking byte I/O on a serial port, with `ufmt` output.
///
/// Serial errors are dropped; a broken byte shows up to the host as a
/// garbled line, which it already has to handle.
pub struct Console<S> {
    serial: S,
}

impl<S> Console<S>
where
    S: serial::Read<u8> + serial::Write<u8>,
{
    pub fn new(serial: S) -> Self {
        Self { serial }
    }

    pub fn getch(&mut self) -> u8 {
        loop {
            if let Ok(byte) = nb::block!(self.serial.read()) {
                return byte;
            }
        }
    }

    pub fn putch(&mut self, byte: u8) {
        let _ = nb::block!(self.serial.write(byte));
    }

    /// Read one non-empty line into `buf`.
    ///
    /// A line that does not fit is consumed up to its terminator and
    /// reported as `None`.
    pub fn getline(&mut self, buf: &mut [u8]) -> Option<usize> {
        let mut n = 0;
        let mut overflow = false;
        loop {
            match self.getch() {
                b'\r' | b'\n' => {
                    if overflow {
                        return None;
                    }
                    if n > 0 {
                        return Some(n);
                    }
                }
                ch => match buf.get_mut(n) {
                    Some(slot) => {
                        *slot = ch;
                        n += 1;
                    }
                    None => overflow = true,
                },
            }
        }
    }

    pub fn putline(&mut self, line: &str) {
        let _ = self.write_str(line);
        let _ = self.write_str("\r\n");
    }

    pub fn put_hex(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.putch(HEX_CHARS[(b >> 4) as usize]);
            self.putch(HEX_CHARS[(b & 0xF) as usize]);
        }
    }
}

impl<S> uWrite for Console<S>
where
    S: serial::Read<u8> + serial::Write<u8>,
{
    type Error = core::convert::Infallible;

    fn write_str(&mut self, s: &str) -> Result<(), Self::Error> {
        for byte in s.bytes() {
            self.putch(byte);
        }
        Ok(())
    }
}

/// The programmer's command loop.
pub struct Shell<S, L, D, R> {
    console: Console<S>,
    link: SymbolLink<L, D>,
    reset: R,
    version: &'static str,
    line: [u8; LINE_CAPACITY],
    packet: [u8; MAX_PACKET],
}

impl<S, L, D, R> Shell<S, L, D, R>
where
    S: serial::Read<u8> + serial::Write<u8>,
    L: Line,
    D: DelayUs<u32>,
    R: OutputPin,
{
    pub fn new(serial: S, link: SymbolLink<L, D>, reset: R, version: &'static str) -> Self {
        Self {
            console: Console::new(serial),
            link,
            reset,
            version,
            line: [0; LINE_CAPACITY],
            packet: [0; MAX_PACKET],
        }
    }

    pub fn run(&mut self) -> ! {
        loop {
            self.poll();
        }
    }

    /// Read one command line and answer it.
    pub fn poll(&mut self) {
        let len = match self.console.getline(&mut self.line) {
            Some(len) => len,
            None => {
                self.console.putline("#command too long");
                return;
            }
        };

        match self.line[0] {
            b'v' => {
                let _ = uwrite!(self.console, "#version(epoch) {}\r\n", self.version);
                let _ = uwrite!(self.console, "-{}\r\n", self.version);
            }
            b'd' => {
                self.link.timed().line_mut().set_line(true);
                self.pulse_reset();
                self.console.putline("-");
            }
            b'n' => {
                self.link.timed().line_mut().set_line(false);
                self.pulse_reset();
                self.console.putline("-");
            }
            b's' => self.send(len),
            b'r' => self.receive(),
            _ => self.console.putline("#unknown command"),
        }
    }

    fn pulse_reset(&mut self) {
        let _ = self.reset.set_high();
        self.link.timed().pause_us(RESET_PULSE_US);
        let _ = self.reset.set_low();
        self.link.timed().pause_us(RESET_PULSE_US);
    }

    fn send(&mut self, len: usize) {
        let mut payload = [0u8; MAX_REQUEST];
        match decode_hex(&self.line[1..len], &mut payload) {
            Ok(n) => {
                self.link.send_packet(&payload[..n]);
                self.console.putline("-");
            }
            Err(err) => {
                let _ = uwrite!(self.console, "#{}\r\n", err.as_str());
                self.console.putline("!");
            }
        }
    }

    fn receive(&mut self) {
        match self.link.recv_packet(&mut self.packet, RECV_SYNC_ROUNDS) {
            Ok(n) if n <= self.packet.len() => {
                self.console.putch(b'-');
                self.console.put_hex(&self.packet[..n]);
                self.console.putline("");
            }
            Ok(_) => {
                self.console.putline("#too big packet");
                self.console.putline("!");
            }
            Err(err) => {
                let _ = uwrite!(self.console, "#{}\r\n!{}\r\n", err.as_str(), err.code());
            }
        }
    }
}
