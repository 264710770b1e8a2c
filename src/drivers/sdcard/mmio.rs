//! Memory-mapped LiteSDCard register interface

use core::hint::spin_loop;

use tock_registers::interfaces::{Readable, Writeable};

use super::regs::{CoreRegs, DmaRegs, PhyRegs, DMA_DONE};
use super::{Mem2BlockDma, SdCardRegisters};

/// LiteSDCard core mapped into the CPU address space.
///
/// `W` is `()` when the SoC has no memory to block DMA engine and
/// `&'static DmaRegs` when it does; only the latter implements
/// [`Mem2BlockDma`].
pub struct MmioSdCard<W = ()> {
    core: &'static CoreRegs,
    phy: &'static PhyRegs,
    block2mem: &'static DmaRegs,
    mem2block: W,
    /// Spin loop iterations per microsecond
    spins_per_us: u32,
    /// Data + L2 cache flush, if the CPU has caches
    flush: Option<fn()>,
}

impl MmioSdCard<()> {
    /// Map the core, PHY and block2mem CSR blocks.
    ///
    /// # Safety
    ///
    /// Each base must be the address of the corresponding LiteSDCard CSR
    /// block, valid for the lifetime of the program and not accessed by
    /// anything else.
    pub unsafe fn new(core_base: usize, phy_base: usize, block2mem_base: usize, spins_per_us: u32) -> Self {
        unsafe {
            Self {
                core: &*(core_base as *const CoreRegs),
                phy: &*(phy_base as *const PhyRegs),
                block2mem: &*(block2mem_base as *const DmaRegs),
                mem2block: (),
                spins_per_us,
                flush: None,
            }
        }
    }
}

impl<W> MmioSdCard<W> {
    /// Add the mem2block engine, enabling writes.
    ///
    /// # Safety
    ///
    /// Same requirements as [`MmioSdCard::new`] for `mem2block_base`.
    pub unsafe fn with_mem2block(self, mem2block_base: usize) -> MmioSdCard<&'static DmaRegs> {
        MmioSdCard {
            core: self.core,
            phy: self.phy,
            block2mem: self.block2mem,
            mem2block: unsafe { &*(mem2block_base as *const DmaRegs) },
            spins_per_us: self.spins_per_us,
            flush: self.flush,
        }
    }

    /// Install the cache flush run after reads on non-coherent SoCs
    pub fn with_cache_flush(mut self, flush: fn()) -> Self {
        self.flush = Some(flush);
        self
    }
}

/// 64-bit DMA addresses span two CSRs, high word first
fn write_dma_base(dma: &DmaRegs, value: u64) {
    dma.base_hi.set((value >> 32) as u32);
    dma.base_lo.set(value as u32);
}

impl<W> SdCardRegisters for MmioSdCard<W> {
    fn cmd_argument_write(&mut self, value: u32) {
        self.core.cmd_argument.set(value);
    }

    fn cmd_command_write(&mut self, value: u32) {
        self.core.cmd_command.set(value);
    }

    fn cmd_send_write(&mut self, value: u32) {
        self.core.cmd_send.set(value);
    }

    fn cmd_response_read(&self) -> [u32; 4] {
        let r = &self.core.cmd_response;
        [r[0].get(), r[1].get(), r[2].get(), r[3].get()]
    }

    fn cmd_event_read(&self) -> u32 {
        self.core.cmd_event.get()
    }

    fn data_event_read(&self) -> u32 {
        self.core.data_event.get()
    }

    fn block_length_write(&mut self, value: u32) {
        self.core.block_length.set(value);
    }

    fn block_count_write(&mut self, value: u32) {
        self.core.block_count.set(value);
    }

    fn phy_init_initialize_write(&mut self, value: u32) {
        self.phy.init_initialize.set(value);
    }

    fn phy_settings_write(&mut self, value: u32) {
        self.phy.settings.set(value);
    }

    fn phy_clocker_divider_write(&mut self, value: u32) {
        self.phy.clocker_divider.set(value);
    }

    fn block2mem_dma_enable_write(&mut self, value: u32) {
        self.block2mem.enable.set(value);
    }

    fn block2mem_dma_base_write(&mut self, value: u64) {
        write_dma_base(self.block2mem, value);
    }

    fn block2mem_dma_length_write(&mut self, value: u32) {
        self.block2mem.length.set(value);
    }

    fn block2mem_dma_done_read(&self) -> u32 {
        self.block2mem.done.read(DMA_DONE::DONE)
    }

    fn busy_wait_us(&mut self, us: u32) {
        let spins = us as u64 * self.spins_per_us as u64;
        for _ in 0..spins {
            spin_loop();
        }
    }

    fn flush_caches(&mut self) {
        if let Some(flush) = self.flush {
            flush();
        }
    }
}

impl Mem2BlockDma for MmioSdCard<&'static DmaRegs> {
    fn mem2block_dma_enable_write(&mut self, value: u32) {
        self.mem2block.enable.set(value);
    }

    fn mem2block_dma_base_write(&mut self, value: u64) {
        write_dma_base(self.mem2block, value);
    }

    fn mem2block_dma_length_write(&mut self, value: u32) {
        self.mem2block.length.set(value);
    }

    fn mem2block_dma_done_read(&self) -> u32 {
        self.mem2block.done.read(DMA_DONE::DONE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::sdcard::command::Command;
    use core::sync::atomic::{AtomicBool, Ordering};
    use std::boxed::Box;

    /// Backing memory for one CSR block
    fn csr_block(words: usize) -> usize {
        Box::leak(std::vec![0u32; words].into_boxed_slice()).as_mut_ptr() as usize
    }

    fn read(base: usize, word: usize) -> u32 {
        unsafe { core::ptr::read_volatile((base as *const u32).add(word)) }
    }

    fn write(base: usize, word: usize, value: u32) {
        unsafe { core::ptr::write_volatile((base as *mut u32).add(word), value) }
    }

    #[test]
    fn test_command_registers() {
        let core = csr_block(11);
        let phy = csr_block(6);
        let b2m = csr_block(7);
        let mut regs = unsafe { MmioSdCard::new(core, phy, b2m, 1) };

        let desc = Command::SetBlockLen(512).descriptor();
        regs.cmd_argument_write(desc.argument);
        regs.cmd_command_write(desc.command_word());
        regs.cmd_send_write(1);
        assert_eq!(read(core, 0), 512);
        assert_eq!(read(core, 1), (16 << 8) | 1);
        assert_eq!(read(core, 2), 1);

        for (i, v) in [0x11, 0x22, 0x33, 0x44].into_iter().enumerate() {
            write(core, 3 + i, v);
        }
        write(core, 7, 0x5);
        write(core, 8, 0x9);
        assert_eq!(regs.cmd_response_read(), [0x11, 0x22, 0x33, 0x44]);
        assert_eq!(regs.cmd_event_read(), 0x5);
        assert_eq!(regs.data_event_read(), 0x9);

        regs.block_length_write(512);
        regs.block_count_write(8);
        assert_eq!(read(core, 9), 512);
        assert_eq!(read(core, 10), 8);
    }

    #[test]
    fn test_phy_registers() {
        let core = csr_block(11);
        let phy = csr_block(6);
        let b2m = csr_block(7);
        let mut regs = unsafe { MmioSdCard::new(core, phy, b2m, 1) };

        regs.phy_clocker_divider_write(250);
        regs.phy_init_initialize_write(1);
        regs.phy_settings_write(2);
        assert_eq!(read(phy, 1), 250);
        assert_eq!(read(phy, 2), 1);
        assert_eq!(read(phy, 5), 2);
    }

    #[test]
    fn test_dma_registers() {
        let core = csr_block(11);
        let phy = csr_block(6);
        let b2m = csr_block(7);
        let m2b = csr_block(7);
        let mut regs = unsafe { MmioSdCard::new(core, phy, b2m, 1).with_mem2block(m2b) };

        regs.block2mem_dma_base_write(0x0000_0001_8000_0200);
        regs.block2mem_dma_length_write(5120);
        regs.block2mem_dma_enable_write(1);
        assert_eq!(read(b2m, 0), 0x1);
        assert_eq!(read(b2m, 1), 0x8000_0200);
        assert_eq!(read(b2m, 2), 5120);
        assert_eq!(read(b2m, 3), 1);

        assert_eq!(regs.block2mem_dma_done_read(), 0);
        write(b2m, 4, 0xFFFF_FFFF);
        assert_eq!(regs.block2mem_dma_done_read(), 1);

        regs.mem2block_dma_base_write(0x4000_0000);
        regs.mem2block_dma_length_write(512);
        regs.mem2block_dma_enable_write(1);
        assert_eq!(read(m2b, 0), 0);
        assert_eq!(read(m2b, 1), 0x4000_0000);
        assert_eq!(read(m2b, 2), 512);
        assert_eq!(read(m2b, 3), 1);
        write(m2b, 4, 1);
        assert_eq!(regs.mem2block_dma_done_read(), 1);
    }

    static FLUSHED: AtomicBool = AtomicBool::new(false);

    fn flush() {
        FLUSHED.store(true, Ordering::SeqCst);
    }

    #[test]
    fn test_cache_flush_hook() {
        let core = csr_block(11);
        let phy = csr_block(6);
        let b2m = csr_block(7);
        let mut regs = unsafe { MmioSdCard::new(core, phy, b2m, 1) };
        regs.flush_caches();
        assert!(!FLUSHED.load(Ordering::SeqCst));

        let mut regs = regs.with_cache_flush(flush);
        regs.flush_caches();
        assert!(FLUSHED.load(Ordering::SeqCst));
    }
}
