//! Self-programming bootloader over a half-duplex optical line.
//!
//! The target board's bootloader and the programmer's console share this
//! crate. Everything above [`hal`] is hardware independent and runs against
//! the simulated line and flash in the unit tests; the AVR register code is
//! only built with the `avr` feature on an AVR target.
//!
//! The bootloader image serves the single-byte opcode protocol by default.
//! The programmer console only speaks the packet protocol, so a target it
//! flashes must carry a bootloader built with the `packet-session` feature.

#![cfg_attr(not(test), no_std)]
#![cfg_attr(
    all(feature = "avr", target_arch = "avr"),
    feature(asm_experimental_arch)
)]

pub mod bootloader;
pub mod config;
pub mod diagnostics;
pub mod drivers;
pub mod hal;
pub mod protocol;

#[cfg(test)]
mod testing;
