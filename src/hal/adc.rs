use avr_device::atmega328p::{ADC, CPU};

use super::PowerSensor;

// ADMUX: AVcc reference, 1.1 V bandgap as input
const REFS0: u8 = 1 << 6;
const MUX_BANDGAP: u8 = 0x0E;

// ADCSRA
const ADEN: u8 = 1 << 7;
const ADSC: u8 = 1 << 6;
const PRESCALER_128: u8 = 0x07;

// PRR
const PRADC: u8 = 1 << 0;

/// Supply sensor measuring the bandgap against Vcc.
///
/// The raw sample falls as Vcc rises; the host converts it. The ADC is
/// powered only for the duration of one conversion.
pub struct SupplySensor {
    adc: ADC,
    cpu: CPU,
}

impl SupplySensor {
    pub fn new(adc: ADC, cpu: CPU) -> Self {
        Self { adc, cpu }
    }
}

impl PowerSensor for SupplySensor {
    fn sample(&mut self) -> u8 {
        unsafe {
            self.cpu.prr.modify(|r, w| w.bits(r.bits() & !PRADC));
            self.adc.admux.write(|w| w.bits(REFS0 | MUX_BANDGAP));
            self.adc.adcsra.write(|w| w.bits(ADEN | ADSC | PRESCALER_128));
        }

        while self.adc.adcsra.read().bits() & ADSC != 0 {}
        // Low byte only
        let value = self.adc.adc.read().bits() as u8;

        unsafe {
            self.adc.adcsra.write(|w| w.bits(0));
            self.cpu.prr.modify(|r, w| w.bits(r.bits() | PRADC));
        }
        value
    }
}
