//! IR LED / photodiode lines of both boards
//!
//! The LED is keyed with a 38 kHz carrier from a timer compare output: the
//! line is asserted by letting the timer toggle the pin and released by
//! disconnecting the compare output and pulling the pin low. Both receivers
//! are active low.

use avr_device::atmega328p::{PORTB, PORTD, TC0, TC1};
use embedded_hal::digital::v2::OutputPin;

use super::Line;
use crate::config::{carrier_top, CARRIER_HZ, PROGRAMMER_CPU_FREQ_HZ, TARGET_CPU_FREQ_HZ};

// Target board, port D
const RX_IN: u8 = 1 << 5;
const TX_LED: u8 = 1 << 6;
const RX_VCC: u8 = 1 << 7;

// Programmer board, port B
const RESET_OUT: u8 = 1 << 0;
const TX_OC1A: u8 = 1 << 1;
const RX_PB2: u8 = 1 << 2;

// TCCRnA
const COM_A0: u8 = 1 << 6;
const WGM_0: u8 = 1 << 0;
const WGM_1: u8 = 1 << 1;

/// Target board: LED on OC0A (PD6), receiver output on PD5, receiver
/// supply switched by PD7.
pub struct TargetLine {
    tc0: TC0,
    portd: PORTD,
}

impl TargetLine {
    pub fn new(tc0: TC0, portd: PORTD) -> Self {
        unsafe {
            portd.ddrd.write(|w| w.bits(RX_VCC | TX_LED));
            // Fast PWM with OCR0A as top, no prescaling
            tc0.tccr0a.write(|w| w.bits(WGM_1 | WGM_0));
            tc0.tccr0b.write(|w| w.bits((1 << 3) | 1));
            tc0.ocr0a
                .write(|w| w.bits(carrier_top(TARGET_CPU_FREQ_HZ, CARRIER_HZ) as u8));
        }
        Self { tc0, portd }
    }
}

impl Line for TargetLine {
    fn set_line(&mut self, level: bool) {
        unsafe {
            if level {
                self.tc0.tccr0a.modify(|r, w| w.bits(r.bits() | COM_A0));
            } else {
                self.tc0.tccr0a.modify(|r, w| w.bits(r.bits() & !COM_A0));
                self.portd.portd.modify(|r, w| w.bits(r.bits() & !TX_LED));
            }
        }
    }

    fn read_line(&mut self) -> bool {
        self.portd.pind.read().bits() & RX_IN == 0
    }

    fn enable_receiver(&mut self, on: bool) {
        unsafe {
            if on {
                self.portd.portd.modify(|r, w| w.bits(r.bits() | RX_VCC));
            } else {
                self.portd.portd.modify(|r, w| w.bits(r.bits() & !RX_VCC));
            }
        }
    }
}

/// Programmer board: LED on OC1A (PB1), receiver output on PB2.
pub struct ProgrammerLine {
    tc1: TC1,
}

/// Target reset driver on PB0 of the programmer board.
pub struct ResetPin {
    _private: (),
}

impl ProgrammerLine {
    /// Configure port B and Timer1, returning the line and the reset pin
    /// that shares the port.
    pub fn split(tc1: TC1, portb: PORTB) -> (Self, ResetPin) {
        unsafe {
            portb.ddrb.write(|w| w.bits(RESET_OUT | TX_OC1A));
            // Fast PWM with OCR1A as top (mode 15), no prescaling
            tc1.tccr1a.write(|w| w.bits(WGM_1 | WGM_0));
            tc1.tccr1b.write(|w| w.bits((1 << 4) | (1 << 3) | 1));
            tc1.ocr1a
                .write(|w| w.bits(carrier_top(PROGRAMMER_CPU_FREQ_HZ, CARRIER_HZ)));
        }
        (Self { tc1 }, ResetPin { _private: () })
    }
}

fn portb_modify(set: u8, clear: u8) {
    unsafe {
        (*PORTB::ptr())
            .portb
            .modify(|r, w| w.bits((r.bits() & !clear) | set));
    }
}

impl Line for ProgrammerLine {
    fn set_line(&mut self, level: bool) {
        unsafe {
            if level {
                self.tc1.tccr1a.modify(|r, w| w.bits(r.bits() | COM_A0));
            } else {
                self.tc1.tccr1a.modify(|r, w| w.bits(r.bits() & !COM_A0));
                portb_modify(0, TX_OC1A);
            }
        }
    }

    fn read_line(&mut self) -> bool {
        unsafe { (*PORTB::ptr()).pinb.read().bits() & RX_PB2 == 0 }
    }
}

impl OutputPin for ResetPin {
    type Error = core::convert::Infallible;

    fn set_high(&mut self) -> Result<(), Self::Error> {
        portb_modify(RESET_OUT, 0);
        Ok(())
    }

    fn set_low(&mut self) -> Result<(), Self::Error> {
        portb_modify(0, RESET_OUT);
        Ok(())
    }
}
