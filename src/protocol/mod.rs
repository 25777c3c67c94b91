//! Optical link protocol stack
//!
//! `transport` carries single bytes with fixed bit slices, `symbol` carries
//! two-slice symbols, `packet` frames symbol streams into packets and parses
//! the packet-variant requests, `checksum` is the rolling hash both variants
//! use for integrity checks.

pub mod checksum;
pub mod packet;
pub mod symbol;
pub mod transport;

pub use checksum::xorshift_hash;
pub use packet::{PacketRequest, RequestError};
pub use symbol::{Symbol, SymbolLink};
pub use transport::ByteLink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// No start edge within the polling budget
    Timeout,
    /// No START symbol within the packet sync budget
    NoSync,
    /// Line state violated the expected frame shape (asserted stop slot,
    /// START inside a packet, truncated byte)
    Framing,
}

impl LinkError {
    /// Numeric code used on the console: `-1` no activity, `-2` out of sync.
    pub const fn code(self) -> i16 {
        match self {
            LinkError::Timeout | LinkError::NoSync => -1,
            LinkError::Framing => -2,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            LinkError::Timeout => "timeout",
            LinkError::NoSync => "no sync",
            LinkError::Framing => "out of sync",
        }
    }
}

pub type Result<T> = core::result::Result<T, LinkError>;
