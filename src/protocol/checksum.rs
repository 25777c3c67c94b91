//! Rolling rotate-left-then-XOR hash.
//!
//! Cheap enough for the bootloader and table-free, but it is not a CRC:
//! the reduction is linear, so some reorderings and multi-bit errors cancel
//! out (`[0x00, 0xFF]` and `[0xFF, 0x00]` hash alike). Treat a match as
//! "probably intact", nothing stronger.

/// Hash `bytes` with `h = rotl(h, 1) ^ byte`, seeded at zero.
pub fn xorshift_hash(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |h, &b| h.rotate_left(1) ^ b)
}
