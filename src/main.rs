#![no_std]
#![no_main]

use avr_device::atmega328p::Peripherals;
use panic_halt as _;

use optoboot::bootloader::{select_boot_mode, BootMode};
use optoboot::config::{BootTiming, LinkTiming, MemoryMap};
use optoboot::drivers::FlashSequencer;
use optoboot::hal::adc::SupplySensor;
use optoboot::hal::optical::TargetLine;
use optoboot::hal::spm::{start_application, SelfProgram};
use optoboot::hal::timer::TargetDelay;

#[avr_device::entry]
fn main() -> ! {
    let dp = Peripherals::take().unwrap();
    let timing = BootTiming::DEFAULT;

    let mut line = TargetLine::new(dp.TC0, dp.PORTD);
    let mut delay = TargetDelay::new(dp.TC2);

    if select_boot_mode(&mut line, &mut delay, &timing) == BootMode::Application {
        start_application();
    }

    let flash = FlashSequencer::new(SelfProgram::new(), MemoryMap::DEFAULT);
    let power = SupplySensor::new(dp.ADC, dp.CPU);

    #[cfg(not(feature = "packet-session"))]
    {
        use optoboot::bootloader::CommandProcessor;
        use optoboot::protocol::ByteLink;

        let link = ByteLink::new(line, delay, LinkTiming::DEFAULT);
        CommandProcessor::new(link, flash, power, timing).run()
    }

    #[cfg(feature = "packet-session")]
    {
        use optoboot::bootloader::PacketSession;
        use optoboot::protocol::SymbolLink;

        let link = SymbolLink::new(line, delay, LinkTiming::DEFAULT);
        PacketSession::new(link, flash, power, timing).run()
    }
}
