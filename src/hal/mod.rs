//! Hardware seams used by the link and the bootloader.
//!
//! The core never touches registers; it drives the optical line, samples the
//! supply and programs flash through the traits below. The AVR modules
//! implement them for the ATmega328P boards, `gpio` adapts any embedded-hal
//! pin pair, and the test harness implements them in simulation.

pub mod gpio;

#[cfg(all(feature = "avr", target_arch = "avr"))]
pub mod adc;
#[cfg(all(feature = "avr", target_arch = "avr"))]
pub mod optical;
#[cfg(all(feature = "avr", target_arch = "avr"))]
pub mod spm;
#[cfg(all(feature = "avr", target_arch = "avr"))]
pub mod timer;
#[cfg(all(feature = "avr", target_arch = "avr"))]
pub mod uart;

pub use gpio::PinLine;

/// One half-duplex signal line.
///
/// `true` means asserted (carrier on / light seen), regardless of the
/// electrical polarity of the underlying pins.
pub trait Line {
    /// Drive the line to `level`.
    fn set_line(&mut self, level: bool);

    /// Sample the line as seen by our receiver.
    fn read_line(&mut self) -> bool;

    /// Power the receiver up or down. Boards with an always-on receiver
    /// ignore this.
    fn enable_receiver(&mut self, on: bool) {
        let _ = on;
    }
}

impl<L: Line + ?Sized> Line for &mut L {
    fn set_line(&mut self, level: bool) {
        (**self).set_line(level)
    }

    fn read_line(&mut self) -> bool {
        (**self).read_line()
    }

    fn enable_receiver(&mut self, on: bool) {
        (**self).enable_receiver(on)
    }
}

/// Supply voltage sensor answered by the power status opcode.
pub trait PowerSensor {
    /// One raw 8-bit sample.
    fn sample(&mut self) -> u8;
}

/// Self-programming capability of the program memory.
///
/// Mirrors the page-buffer model of AVR SPM: words are staged into a
/// temporary page buffer, then the target page is erased and the staged
/// buffer written. The pair erase/write is not atomic; losing power between
/// them leaves the page blank.
pub trait ProgramMemory {
    /// Read one byte of program memory.
    fn read_byte(&mut self, addr: u16) -> u8;

    /// Stage one little-endian word at `addr` in the temporary page buffer.
    fn fill_word(&mut self, addr: u16, word: u16);

    /// Erase the page containing `addr`.
    fn erase_page(&mut self, addr: u16);

    /// Write the temporary page buffer to the page containing `addr`.
    fn write_page(&mut self, addr: u16);
}
