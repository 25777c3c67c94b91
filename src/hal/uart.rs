use avr_device::atmega328p::USART0;
use embedded_hal::serial;

use crate::config::ubrr;

// UCSR0A
const RXC0: u8 = 1 << 7;
const UDRE0: u8 = 1 << 5;
const FE0: u8 = 1 << 4;
const DOR0: u8 = 1 << 3;

// UCSR0B
const RXEN0: u8 = 1 << 4;
const TXEN0: u8 = 1 << 3;

// UCSR0C: asynchronous, 8N1
const FORMAT_8N1: u8 = 0x06;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UartError {
    Framing,
    Overrun,
}

/// Polled USART0. The console blocks on every byte, so no interrupts or
/// buffering are needed.
pub struct Usart0 {
    usart: USART0,
}

impl Usart0 {
    pub fn new(usart: USART0, cpu_hz: u32, baud: u32) -> Self {
        unsafe {
            usart.ubrr0.write(|w| w.bits(ubrr(cpu_hz, baud)));
            usart.ucsr0c.write(|w| w.bits(FORMAT_8N1));
            usart.ucsr0b.write(|w| w.bits(RXEN0 | TXEN0));
        }
        Self { usart }
    }
}

impl serial::Read<u8> for Usart0 {
    type Error = UartError;

    fn read(&mut self) -> nb::Result<u8, Self::Error> {
        let status = self.usart.ucsr0a.read().bits();
        if status & RXC0 == 0 {
            return Err(nb::Error::WouldBlock);
        }
        // UDR0 must be read even on error to clear RXC0
        let byte = self.usart.udr0.read().bits();
        if status & FE0 != 0 {
            Err(nb::Error::Other(UartError::Framing))
        } else if status & DOR0 != 0 {
            Err(nb::Error::Other(UartError::Overrun))
        } else {
            Ok(byte)
        }
    }
}

impl serial::Write<u8> for Usart0 {
    type Error = core::convert::Infallible;

    fn write(&mut self, byte: u8) -> nb::Result<(), Self::Error> {
        if self.usart.ucsr0a.read().bits() & UDRE0 == 0 {
            return Err(nb::Error::WouldBlock);
        }
        unsafe { self.usart.udr0.write(|w| w.bits(byte)) };
        Ok(())
    }

    fn flush(&mut self) -> nb::Result<(), Self::Error> {
        if self.usart.ucsr0a.read().bits() & UDRE0 == 0 {
            Err(nb::Error::WouldBlock)
        } else {
            Ok(())
        }
    }
}
