//! Configuration constants for the optical bootloader and programmer

/// Target board CPU frequency in Hz (ceramic resonator, CKDIV8 disabled)
pub const TARGET_CPU_FREQ_HZ: u32 = 6_000_000;

/// Programmer board CPU frequency in Hz
pub const PROGRAMMER_CPU_FREQ_HZ: u32 = 16_000_000;

/// IR carrier frequency the receiver module is tuned to
pub const CARRIER_HZ: u32 = 38_000;

/// Programmer console baud rate
pub const CONSOLE_BAUD: u32 = 19_200;

/// log2 of the flash page size
pub const PAGE_SHIFT: u8 = 7;

/// Flash page size in bytes
pub const PAGE_SIZE: usize = 1 << PAGE_SHIFT;

/// First byte address of the boot section; everything below is user program memory
pub const USER_END: u16 = 0x7000;

/// Total program memory in bytes
pub const FLASH_SIZE: u32 = 0x8000;

/// Largest data block carried by one packet-variant read or write request
pub const MAX_BLOCK: usize = 64;

/// Largest well-formed packet-variant request: a write of a full block
/// plus its opcode, address, size, repeated address and hash
pub const MAX_REQUEST: usize = MAX_BLOCK + 7;

/// Largest packet the framer stores
pub const MAX_PACKET: usize = 255;

/// Compare value for a timer toggling its output at `carrier_hz`, counting
/// from 0 to the returned top at the CPU clock.
pub const fn carrier_top(cpu_hz: u32, carrier_hz: u32) -> u16 {
    ((cpu_hz + carrier_hz) / (2 * carrier_hz) - 1) as u16
}

/// USART baud divisor, normal speed mode
pub const fn ubrr(cpu_hz: u32, baud: u32) -> u16 {
    (cpu_hz / (16 * baud) - 1) as u16
}

/// Bit-level timing of the optical link.
///
/// Every bit boundary is inferred from elapsed time since the detected start
/// edge, so only the ratios between these fields matter to the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkTiming {
    /// Duration of one bit (byte variant) or one symbol half (symbol variant)
    pub unit_us: u32,
    /// Sleep between two samples while hunting for a start edge
    pub poll_slice_us: u32,
    /// Samples per polling round; one round lasts `poll_slice_us * polls_per_round`
    pub polls_per_round: u8,
    /// Delay after the start edge is seen, before the first unit boundary
    pub start_settle_us: u32,
}

impl LinkTiming {
    pub const DEFAULT: Self = Self {
        unit_us: 1000,
        poll_slice_us: 100,
        polls_per_round: 10,
        start_settle_us: 500,
    };

    /// Same ratios as the default, scaled to a different unit length.
    pub const fn scaled(unit_us: u32) -> Self {
        Self {
            unit_us,
            poll_slice_us: unit_us / 10,
            polls_per_round: 10,
            start_settle_us: unit_us / 2,
        }
    }

    /// Length of one polling round in microseconds
    pub const fn round_us(&self) -> u32 {
        self.poll_slice_us * self.polls_per_round as u32
    }
}

impl Default for LinkTiming {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Delays and timeouts of the bootloader session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootTiming {
    /// Settling time after powering the receiver before the boot decision sample
    pub grace_us: u32,
    /// Delay after the boot decision, before either branch runs
    pub protect_us: u32,
    /// Pause between the end of a request and the start of its response
    pub response_delay_us: u32,
    /// Same for the packet session. Its peer is the programmer console,
    /// which only starts listening after a serial round trip to the host.
    pub packet_response_delay_us: u32,
    /// Polling rounds allowed for the opcode byte
    pub opcode_timeout: u8,
    /// Polling rounds allowed for each argument byte
    pub arg_timeout: u8,
    /// Polling rounds allowed for a packet's START symbol
    pub sync_rounds: u8,
}

impl BootTiming {
    pub const DEFAULT: Self = Self {
        grace_us: 5_000,
        protect_us: 200_000,
        response_delay_us: 10_000,
        packet_response_delay_us: 100_000,
        opcode_timeout: 100,
        arg_timeout: 100,
        sync_rounds: 100,
    };
}

impl Default for BootTiming {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Program memory partitioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryMap {
    /// Exclusive upper bound of the writable user region, page aligned
    pub user_end: u16,
    /// Total program memory size in bytes
    pub flash_size: u32,
}

impl MemoryMap {
    pub const DEFAULT: Self = Self {
        user_end: USER_END,
        flash_size: FLASH_SIZE,
    };

    /// Start of the page containing `addr`
    pub const fn page_base(addr: u16) -> u16 {
        addr & !((PAGE_SIZE as u16) - 1)
    }

    /// `addr` and all of `[addr, addr + len)` lie inside the user region
    pub fn in_user_region(&self, addr: u16, len: usize) -> bool {
        addr < self.user_end && (addr as usize) + len <= self.user_end as usize
    }

    /// `addr` lies inside program memory
    pub fn in_flash(&self, addr: u16) -> bool {
        (addr as u32) < self.flash_size
    }
}

impl Default for MemoryMap {
    fn default() -> Self {
        Self::DEFAULT
    }
}
