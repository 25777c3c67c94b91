//! Flash programming sequencer
//!
//! Turns page buffers and byte ranges into the fill / erase / write sequence
//! of self-programming flash. Range checks run before the first fill, so a
//! rejected request never starts an erase.
//!
//! Power loss between erase and write leaves the page blank (all 0xFF). This
//! is not recoverable in place: there is no shadow page and no commit record.
//! The host must resend the page after the next reset into update mode.

use log::{debug, warn};

use crate::config::{MemoryMap, PAGE_SIZE};
use crate::hal::ProgramMemory;

/// Address or range outside the permitted region. No memory was touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeError {
    pub addr: u16,
    pub len: u16,
}

pub type Result<T> = core::result::Result<T, RangeError>;

pub struct FlashSequencer<M> {
    mem: M,
    map: MemoryMap,
}

impl<M: ProgramMemory> FlashSequencer<M> {
    pub fn new(mem: M, map: MemoryMap) -> Self {
        Self { mem, map }
    }

    pub fn memory(&self) -> &M {
        &self.mem
    }

    pub fn release(self) -> M {
        self.mem
    }

    /// Copy the page containing `addr` into `page`. Returns the page base.
    ///
    /// Any page of program memory may be read, the boot section included.
    pub fn fill_page(&mut self, addr: u16, page: &mut [u8; PAGE_SIZE]) -> Result<u16> {
        if !self.map.in_flash(addr) {
            return Err(RangeError { addr, len: PAGE_SIZE as u16 });
        }
        let base = MemoryMap::page_base(addr);
        for (i, byte) in page.iter_mut().enumerate() {
            *byte = self.mem.read_byte(base + i as u16);
        }
        Ok(base)
    }

    /// Program `page` into the page containing `addr`. Returns the page base.
    pub fn commit_page(&mut self, addr: u16, page: &[u8; PAGE_SIZE]) -> Result<u16> {
        if addr >= self.map.user_end {
            warn!("commit to {:#06x} rejected", addr);
            return Err(RangeError { addr, len: PAGE_SIZE as u16 });
        }
        let base = MemoryMap::page_base(addr);
        for (i, pair) in page.chunks_exact(2).enumerate() {
            let word = u16::from_le_bytes([pair[0], pair[1]]);
            self.mem.fill_word(base + 2 * i as u16, word);
        }
        self.program(base);
        Ok(base)
    }

    /// Copy `out.len()` bytes starting at `addr` out of the user region.
    pub fn read_range(&mut self, addr: u16, out: &mut [u8]) -> Result<()> {
        self.check_user_range(addr, out.len())?;
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = self.mem.read_byte(addr + i as u16);
        }
        Ok(())
    }

    /// Program `data` at `addr`, keeping the rest of every touched page.
    ///
    /// Each page overlapping the range is staged from `data` where the range
    /// covers it and from its current contents elsewhere, then erased and
    /// written.
    pub fn write_range(&mut self, addr: u16, data: &[u8]) -> Result<()> {
        self.check_user_range(addr, data.len())?;
        let start = addr as usize;
        let end = start + data.len();

        let mut base = MemoryMap::page_base(addr) as usize;
        while base < end {
            for offset in (0..PAGE_SIZE).step_by(2) {
                let lo = self.merged_byte(base + offset, start, data);
                let hi = self.merged_byte(base + offset + 1, start, data);
                self.mem.fill_word((base + offset) as u16, u16::from_le_bytes([lo, hi]));
            }
            self.program(base as u16);
            base += PAGE_SIZE;
        }
        Ok(())
    }

    fn merged_byte(&mut self, at: usize, start: usize, data: &[u8]) -> u8 {
        match at.checked_sub(start).and_then(|i| data.get(i)) {
            Some(&b) => b,
            None => self.mem.read_byte(at as u16),
        }
    }

    fn program(&mut self, base: u16) {
        debug!("programming page {:#06x}", base);
        self.mem.erase_page(base);
        self.mem.write_page(base);
    }

    fn check_user_range(&self, addr: u16, len: usize) -> Result<()> {
        if self.map.in_user_region(addr, len) {
            Ok(())
        } else {
            warn!("range {:#06x}+{} outside user region", addr, len);
            Err(RangeError { addr, len: len as u16 })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::SimFlash;

    fn sequencer(flash: SimFlash) -> FlashSequencer<SimFlash> {
        FlashSequencer::new(flash, MemoryMap::default())
    }

    #[test]
    fn commit_fills_erases_then_writes() {
        let mut seq = sequencer(SimFlash::new());
        let page: [u8; PAGE_SIZE] = core::array::from_fn(|i| i as u8);

        assert_eq!(seq.commit_page(0x0105, &page), Ok(0x0100));

        let flash = seq.release();
        assert_eq!(flash.fills, PAGE_SIZE / 2);
        assert_eq!(flash.erases, [0x0100]);
        assert_eq!(flash.writes, [0x0100]);
        assert_eq!(flash.page(0x0100), &page[..]);
    }

    #[test]
    fn commit_at_or_above_boot_section_touches_nothing() {
        let mut seq = sequencer(SimFlash::with_pattern(|a| a as u8));
        let page = [0u8; PAGE_SIZE];

        assert_eq!(
            seq.commit_page(0x7000, &page),
            Err(RangeError { addr: 0x7000, len: 128 })
        );
        assert!(seq.commit_page(0x7FFF, &page).is_err());

        let flash = seq.release();
        assert!(!flash.touched());
        assert_eq!(flash.mem[0x7000], 0x00);
        assert_eq!(flash.mem[0x7001], 0x01);
    }

    #[test]
    fn last_user_page_is_writable() {
        let mut seq = sequencer(SimFlash::new());
        assert_eq!(seq.commit_page(0x6FFF, &[0x5A; PAGE_SIZE]), Ok(0x6F80));
        assert_eq!(seq.memory().page(0x6F80), &[0x5A; PAGE_SIZE][..]);
    }

    #[test]
    fn fill_page_aligns_and_reads_boot_section() {
        let mut seq = sequencer(SimFlash::with_pattern(|a| (a >> 1) as u8));
        let mut page = [0u8; PAGE_SIZE];

        assert_eq!(seq.fill_page(0x7042, &mut page), Ok(0x7000));
        assert_eq!(page[0], 0x00);
        assert_eq!(page[127], 63);
        assert!(!seq.memory().touched());
    }

    #[test]
    fn write_range_merges_partial_pages() {
        let mut seq = sequencer(SimFlash::with_pattern(|_| 0x11));
        let data = [0xAA; 8];

        // straddles the 0x0180 page boundary
        seq.write_range(0x017C, &data).unwrap();

        let flash = seq.release();
        assert_eq!(flash.erases, [0x0100, 0x0180]);
        assert_eq!(flash.mem[0x017B], 0x11);
        assert_eq!(&flash.mem[0x017C..0x0184], &data);
        assert_eq!(flash.mem[0x0184], 0x11);
        assert_eq!(flash.mem[0x0100], 0x11);
        assert_eq!(flash.mem[0x01FF], 0x11);
    }

    #[test]
    fn write_range_rejects_boot_overlap_before_touching_memory() {
        let mut seq = sequencer(SimFlash::new());
        assert!(seq.write_range(0x6FF8, &[0u8; 16]).is_err());
        assert!(!seq.memory().touched());
    }

    #[test]
    fn read_range_is_limited_to_user_region() {
        let mut seq = sequencer(SimFlash::with_pattern(|a| a as u8));
        let mut out = [0u8; 4];
        seq.read_range(0x0010, &mut out).unwrap();
        assert_eq!(out, [0x10, 0x11, 0x12, 0x13]);
        assert!(seq.read_range(0x6FFE, &mut out).is_err());
    }

    #[test]
    fn power_cut_between_erase_and_write_leaves_page_blank() {
        let mut flash = SimFlash::with_pattern(|_| 0x42);
        flash.cut_power_after_erase();
        let mut seq = sequencer(flash);

        seq.commit_page(0x0200, &[0x00; PAGE_SIZE]).unwrap();

        let flash = seq.release();
        assert_eq!(flash.page(0x0200), &[0xFF; PAGE_SIZE][..]);
        assert_eq!(flash.mem[0x0280], 0x42);
    }
}
