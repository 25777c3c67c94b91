//! Bootloader command processing
//!
//! After reset the target samples the optical line once. A host holding the
//! line asserted gets the update session, otherwise the application at
//! address 0 runs. The session has no NACKs: a request that times out, names
//! an out-of-range index or address, or fails its integrity check gets no
//! answer at all, and the host resends after its own timeout.

pub mod packet;

use embedded_hal::blocking::delay::DelayUs;
use log::{debug, warn};

use crate::config::{BootTiming, PAGE_SIZE};
use crate::diagnostics::LinkStats;
use crate::drivers::flash::{FlashSequencer, RangeError};
use crate::hal::{Line, PowerSensor, ProgramMemory};
use crate::protocol::{xorshift_hash, ByteLink, LinkError, RequestError};

pub use packet::PacketSession;

// Page size travels in a single response byte
const _: () = assert!(PAGE_SIZE <= u8::MAX as usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    Link(LinkError),
    Range(RangeError),
    Integrity,
    Malformed,
    UnknownOpcode(u8),
}

impl From<LinkError> for SessionError {
    fn from(err: LinkError) -> Self {
        SessionError::Link(err)
    }
}

impl From<RangeError> for SessionError {
    fn from(err: RangeError) -> Self {
        SessionError::Range(err)
    }
}

impl From<RequestError> for SessionError {
    fn from(err: RequestError) -> Self {
        match err {
            RequestError::Malformed => SessionError::Malformed,
            RequestError::Integrity => SessionError::Integrity,
        }
    }
}

pub type Result<T> = core::result::Result<T, SessionError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    /// `[0, index]` -> stored byte
    ReadBuffer = 0,
    /// `[1, index, value]` -> value
    WriteBuffer = 1,
    /// `[2]` -> supply sample
    PowerStatus = 2,
    /// `[3]` -> hash of the whole page buffer
    HashBuffer = 3,
    /// `[4, addr_hi, addr_lo]` -> page size
    FillBuffer = 4,
    /// `[5, addr_hi, addr_lo]` -> page size
    CommitBuffer = 5,
}

impl TryFrom<u8> for Opcode {
    type Error = SessionError;

    fn try_from(raw: u8) -> Result<Self> {
        match raw {
            0 => Ok(Opcode::ReadBuffer),
            1 => Ok(Opcode::WriteBuffer),
            2 => Ok(Opcode::PowerStatus),
            3 => Ok(Opcode::HashBuffer),
            4 => Ok(Opcode::FillBuffer),
            5 => Ok(Opcode::CommitBuffer),
            other => Err(SessionError::UnknownOpcode(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootMode {
    /// Host is holding the line: serve the update session forever
    Update,
    /// Run the user application
    Application,
}

/// Power the receiver, wait out the grace window and sample the line once.
///
/// Both outcomes are followed by the protect delay, so a host that just
/// released reset has settled before anything else happens.
pub fn select_boot_mode<L, D>(line: &mut L, delay: &mut D, timing: &BootTiming) -> BootMode
where
    L: Line,
    D: DelayUs<u32>,
{
    line.enable_receiver(true);
    delay.delay_us(timing.grace_us);
    let asserted = line.read_line();
    delay.delay_us(timing.protect_us);

    if asserted {
        BootMode::Update
    } else {
        BootMode::Application
    }
}

fn page_index(index: u8) -> Result<usize> {
    if index as usize >= PAGE_SIZE {
        return Err(RangeError { addr: index as u16, len: 1 }.into());
    }
    Ok(index as usize)
}

/// Single-byte opcode processor over the byte-timing transport.
///
/// Owns the page buffer for the whole session; every opcode either
/// completes its buffer update or leaves the buffer as it was.
pub struct CommandProcessor<L, D, M, P> {
    link: ByteLink<L, D>,
    flash: FlashSequencer<M>,
    power: P,
    timing: BootTiming,
    page: [u8; PAGE_SIZE],
    stats: LinkStats,
}

impl<L, D, M, P> CommandProcessor<L, D, M, P>
where
    L: Line,
    D: DelayUs<u32>,
    M: ProgramMemory,
    P: PowerSensor,
{
    pub fn new(link: ByteLink<L, D>, flash: FlashSequencer<M>, power: P, timing: BootTiming) -> Self {
        Self {
            link,
            flash,
            power,
            timing,
            page: [0; PAGE_SIZE],
            stats: LinkStats::new(),
        }
    }

    pub fn page(&self) -> &[u8; PAGE_SIZE] {
        &self.page
    }

    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    pub fn flash(&self) -> &FlashSequencer<M> {
        &self.flash
    }

    /// Serve commands forever.
    pub fn run(&mut self) -> ! {
        loop {
            let _ = self.serve_once();
        }
    }

    /// Wait for one request and answer it.
    ///
    /// An `Err` means nothing was sent back.
    pub fn serve_once(&mut self) -> Result<Opcode> {
        let result = self.dispatch();
        match &result {
            Ok(op) => {
                debug!("served {:?}", op);
                self.stats.record_served();
            }
            Err(err) => {
                if !matches!(err, SessionError::Link(LinkError::Timeout)) {
                    warn!("request dropped: {:?}", err);
                }
                self.stats.record_error(err);
            }
        }
        result
    }

    fn dispatch(&mut self) -> Result<Opcode> {
        let op = Opcode::try_from(self.link.recv_byte(self.timing.opcode_timeout)?)?;
        match op {
            Opcode::ReadBuffer => {
                let index = self.link.recv_byte(self.timing.arg_timeout)?;
                let index = page_index(index)?;
                self.respond(self.page[index]);
            }
            Opcode::WriteBuffer => {
                // Take the whole request off the line before judging it, so
                // a rejected value byte is never read as the next opcode.
                let index = self.link.recv_byte(self.timing.arg_timeout)?;
                let value = self.link.recv_byte(self.timing.arg_timeout)?;
                let index = page_index(index)?;
                self.page[index] = value;
                self.respond(value);
            }
            Opcode::PowerStatus => {
                self.link.timed().pause_us(self.timing.response_delay_us);
                let sample = self.power.sample();
                self.link.send_byte(sample);
            }
            Opcode::HashBuffer => {
                self.respond(xorshift_hash(&self.page));
            }
            Opcode::FillBuffer => {
                let addr = self.link.recv_u16(self.timing.arg_timeout)?;
                self.flash.fill_page(addr, &mut self.page)?;
                self.link.send_byte(PAGE_SIZE as u8);
            }
            Opcode::CommitBuffer => {
                let addr = self.link.recv_u16(self.timing.arg_timeout)?;
                self.flash.commit_page(addr, &self.page)?;
                self.stats.record_commit();
                self.link.send_byte(PAGE_SIZE as u8);
            }
        }
        Ok(op)
    }

    fn respond(&mut self, value: u8) {
        self.link.timed().pause_us(self.timing.response_delay_us);
        self.link.send_byte(value);
    }
}
