//! Packet-variant session
//!
//! Reads and writes arbitrary ranges of user program memory in blocks of up
//! to 64 bytes. Out-of-range requests are answered with
//! [`STATUS_OUT_OF_RANGE`]; malformed requests, integrity failures and
//! transport errors get no answer.

use embedded_hal::blocking::delay::DelayUs;
use log::{debug, warn};

use super::{Result, SessionError};
use crate::config::{BootTiming, MAX_BLOCK, MAX_REQUEST};
use crate::diagnostics::LinkStats;
use crate::drivers::flash::FlashSequencer;
use crate::hal::{Line, PowerSensor, ProgramMemory};
use crate::protocol::packet::{STATUS_OK, STATUS_OUT_OF_RANGE};
use crate::protocol::{xorshift_hash, PacketRequest, SymbolLink};

pub struct PacketSession<L, D, M, P> {
    link: SymbolLink<L, D>,
    flash: FlashSequencer<M>,
    power: P,
    timing: BootTiming,
    rx: [u8; MAX_REQUEST],
    stats: LinkStats,
}

impl<L, D, M, P> PacketSession<L, D, M, P>
where
    L: Line,
    D: DelayUs<u32>,
    M: ProgramMemory,
    P: PowerSensor,
{
    pub fn new(link: SymbolLink<L, D>, flash: FlashSequencer<M>, power: P, timing: BootTiming) -> Self {
        Self {
            link,
            flash,
            power,
            timing,
            rx: [0; MAX_REQUEST],
            stats: LinkStats::new(),
        }
    }

    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    pub fn flash(&self) -> &FlashSequencer<M> {
        &self.flash
    }

    pub fn run(&mut self) -> ! {
        loop {
            let _ = self.serve_once();
        }
    }

    /// Wait for one request packet and answer it.
    pub fn serve_once(&mut self) -> Result<()> {
        let result = self.dispatch();
        match &result {
            Ok(()) => self.stats.record_served(),
            Err(err) => {
                if !matches!(err, SessionError::Link(_)) {
                    warn!("packet dropped: {:?}", err);
                }
                self.stats.record_error(err);
            }
        }
        result
    }

    fn dispatch(&mut self) -> Result<()> {
        let len = self.link.recv_packet(&mut self.rx, self.timing.sync_rounds)?;
        if len > self.rx.len() {
            return Err(SessionError::Malformed);
        }
        let request = PacketRequest::parse(&self.rx[..len])?;
        debug!("packet request {:?}", request);

        match request {
            PacketRequest::Read { addr, size } => {
                let mut response = [0u8; MAX_BLOCK + 2];
                let size = size as usize;
                if let Err(err) = self.flash.read_range(addr, &mut response[1..1 + size]) {
                    self.link.timed().pause_us(self.timing.packet_response_delay_us);
                    self.link.send_packet(&[STATUS_OUT_OF_RANGE]);
                    return Err(err.into());
                }
                response[1 + size] = xorshift_hash(&response[1..1 + size]);
                response[0] = STATUS_OK;
                self.link.timed().pause_us(self.timing.packet_response_delay_us);
                self.link.send_packet(&response[..size + 2]);
            }
            PacketRequest::Write { addr, data } => {
                let written = self.flash.write_range(addr, data);
                let status = if written.is_ok() { STATUS_OK } else { STATUS_OUT_OF_RANGE };
                self.link.timed().pause_us(self.timing.packet_response_delay_us);
                self.link.send_packet(&[status]);
                written?;
                self.stats.record_commit();
            }
            PacketRequest::Power => {
                self.link.timed().pause_us(self.timing.packet_response_delay_us);
                let sample = self.power.sample();
                self.link.send_packet(&[STATUS_OK, sample]);
            }
        }
        Ok(())
    }
}
