pub mod flash;
pub mod serial_console;

pub use flash::{FlashSequencer, RangeError};
pub use serial_console::{Console, Shell};
