use embedded_hal::digital::v2::{InputPin, OutputPin};

use super::Line;

/// Receiver polarity of a [`PinLine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// Pin reads high while the line is asserted
    ActiveHigh,
    /// Pin reads low while the line is asserted (open-collector IR receivers)
    ActiveLow,
}

/// A [`Line`] built from a plain output pin and an input pin.
///
/// Pin errors are ignored: a failed write leaves the line idle, a failed
/// read reports it idle, and the caller notices through a timeout.
#[derive(Debug)]
pub struct PinLine<TX, RX> {
    tx: TX,
    rx: RX,
    polarity: Polarity,
}

impl<TX, RX> PinLine<TX, RX>
where
    TX: OutputPin,
    RX: InputPin,
{
    pub fn new(tx: TX, rx: RX, polarity: Polarity) -> Self {
        Self { tx, rx, polarity }
    }

    pub fn release(self) -> (TX, RX) {
        (self.tx, self.rx)
    }
}

impl<TX, RX> Line for PinLine<TX, RX>
where
    TX: OutputPin,
    RX: InputPin,
{
    #[inline]
    fn set_line(&mut self, level: bool) {
        let _ = if level {
            self.tx.set_high()
        } else {
            self.tx.set_low()
        };
    }

    #[inline]
    fn read_line(&mut self) -> bool {
        match self.polarity {
            Polarity::ActiveHigh => self.rx.is_high().unwrap_or(false),
            Polarity::ActiveLow => self.rx.is_low().unwrap_or(false),
        }
    }
}
