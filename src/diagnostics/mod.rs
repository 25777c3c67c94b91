//! Session diagnostics
//!
//! The wire protocol has no error channel, so failures are only visible
//! here. Counters saturate instead of wrapping.

use crate::bootloader::SessionError;
use crate::protocol::LinkError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Timeout,
    Framing,
    Range,
    Integrity,
    Malformed,
}

impl From<&SessionError> for ErrorCode {
    fn from(err: &SessionError) -> Self {
        match err {
            SessionError::Link(LinkError::Timeout | LinkError::NoSync) => ErrorCode::Timeout,
            SessionError::Link(LinkError::Framing) => ErrorCode::Framing,
            SessionError::Range(_) => ErrorCode::Range,
            SessionError::Integrity => ErrorCode::Integrity,
            SessionError::Malformed | SessionError::UnknownOpcode(_) => ErrorCode::Malformed,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub served: u16,
    pub pages_committed: u16,
    pub timeouts: u16,
    pub framing_errors: u16,
    pub range_rejects: u16,
    pub integrity_failures: u16,
    pub malformed: u16,
    last_error: Option<ErrorCode>,
}

impl LinkStats {
    pub const fn new() -> Self {
        Self {
            served: 0,
            pages_committed: 0,
            timeouts: 0,
            framing_errors: 0,
            range_rejects: 0,
            integrity_failures: 0,
            malformed: 0,
            last_error: None,
        }
    }

    pub fn record_served(&mut self) {
        self.served = self.served.saturating_add(1);
    }

    pub fn record_commit(&mut self) {
        self.pages_committed = self.pages_committed.saturating_add(1);
    }

    pub fn record_error(&mut self, err: &SessionError) {
        let code = ErrorCode::from(err);
        let counter = match code {
            ErrorCode::Timeout => &mut self.timeouts,
            ErrorCode::Framing => &mut self.framing_errors,
            ErrorCode::Range => &mut self.range_rejects,
            ErrorCode::Integrity => &mut self.integrity_failures,
            ErrorCode::Malformed => &mut self.malformed,
        };
        *counter = counter.saturating_add(1);
        self.last_error = Some(code);
    }

    pub fn last_error(&self) -> Option<ErrorCode> {
        self.last_error
    }

    /// Every failure except idle-line timeouts, which are the normal state
    /// of a session waiting for its next command.
    pub fn error_count(&self) -> u32 {
        self.framing_errors as u32
            + self.range_rejects as u32
            + self.integrity_failures as u32
            + self.malformed as u32
    }
}
