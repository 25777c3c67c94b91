//! Self-programming through LPM/SPM
//!
//! Runs from the boot section, so the CPU halts during erase and write of
//! the read-while-write section and resumes once the operation completes.
//! The RWW section is re-enabled after every write before it is read again.

use core::arch::asm;

use super::ProgramMemory;

// SPMCSR command bits
const SPMEN: u8 = 0x01;
const PGERS: u8 = 0x02;
const PGWRT: u8 = 0x04;
const RWWSRE: u8 = 0x10;

pub struct SelfProgram {
    _private: (),
}

impl SelfProgram {
    pub fn new() -> Self {
        Self { _private: () }
    }
}

impl Default for SelfProgram {
    fn default() -> Self {
        Self::new()
    }
}

fn spmcsr() -> u8 {
    let value: u8;
    unsafe { asm!("in {0}, 0x37", out(reg) value) };
    value
}

fn wait_ready() {
    while spmcsr() & SPMEN != 0 {}
}

/// SPMCSR must be written no more than four cycles before `spm`.
fn spm(command: u8, addr: u16) {
    wait_ready();
    unsafe {
        asm!(
            "out 0x37, {cmd}",
            "spm",
            cmd = in(reg) command,
            in("Z") addr,
        );
    }
}

impl ProgramMemory for SelfProgram {
    fn read_byte(&mut self, addr: u16) -> u8 {
        let byte: u8;
        unsafe { asm!("lpm {0}, Z", out(reg) byte, in("Z") addr) };
        byte
    }

    fn fill_word(&mut self, addr: u16, word: u16) {
        wait_ready();
        // Data goes in r1:r0; r1 is the zero register and is restored
        unsafe {
            asm!(
                "movw r0, {word}",
                "out 0x37, {cmd}",
                "spm",
                "clr r1",
                word = in(reg_pair) word,
                cmd = in(reg) SPMEN,
                in("Z") addr,
            );
        }
    }

    fn erase_page(&mut self, addr: u16) {
        spm(PGERS | SPMEN, addr);
        wait_ready();
    }

    fn write_page(&mut self, addr: u16) {
        spm(PGWRT | SPMEN, addr);
        wait_ready();
        spm(RWWSRE | SPMEN, 0);
        wait_ready();
    }
}

/// Hand over to the user application at address 0.
pub fn start_application() -> ! {
    unsafe { asm!("jmp 0", options(noreturn)) }
}
