#![no_std]
#![no_main]

use avr_device::atmega328p::Peripherals;
use panic_halt as _;

use optoboot::config::{LinkTiming, CONSOLE_BAUD, PROGRAMMER_CPU_FREQ_HZ};
use optoboot::drivers::Shell;
use optoboot::hal::optical::ProgrammerLine;
use optoboot::hal::timer::ProgrammerDelay;
use optoboot::hal::uart::Usart0;
use optoboot::protocol::SymbolLink;

#[avr_device::entry]
fn main() -> ! {
    let dp = Peripherals::take().unwrap();

    let serial = Usart0::new(dp.USART0, PROGRAMMER_CPU_FREQ_HZ, CONSOLE_BAUD);
    let (line, reset) = ProgrammerLine::split(dp.TC1, dp.PORTB);
    let delay = ProgrammerDelay::new(dp.TC2);
    let link = SymbolLink::new(line, delay, LinkTiming::DEFAULT);

    Shell::new(serial, link, reset, env!("BUILD_EPOCH")).run()
}
