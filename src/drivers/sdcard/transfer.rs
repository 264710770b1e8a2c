//! Block transfers through the DMA engines
//!
//! Reads run the card's data phase into memory through the block2mem engine,
//! writes feed it from memory through the mem2block engine. A request is
//! split into chunks: the whole remaining count per command when the
//! multi-block command is enabled for that direction, one block otherwise.

use core::hint::spin_loop;

use super::command::Command;
use super::config::SdCardConfig;
use super::regs::SD_BLOCK_SIZE;
use super::{Mem2BlockDma, SdCard, SdCardError, SdCardRegisters};

/// Largest chunk one command may cover: the DMA length register is 32 bits
const MAX_CHUNK_BLOCKS: u32 = u32::MAX / SD_BLOCK_SIZE;

/// Blocks covered by the next command
const fn chunk_blocks(remaining: u32, multi_block: bool) -> u32 {
    if !multi_block {
        1
    } else if remaining > MAX_CHUNK_BLOCKS {
        MAX_CHUNK_BLOCKS
    } else {
        remaining
    }
}

/// Check that `len` bytes hold exactly `count` blocks
fn check_buffer(count: u32, len: usize) -> Result<(), SdCardError> {
    match (count as usize).checked_mul(SD_BLOCK_SIZE as usize) {
        Some(expected) if expected == len => Ok(()),
        _ => Err(SdCardError::InvalidParameter),
    }
}

impl<R: SdCardRegisters, C: SdCardConfig> SdCard<R, C> {
    /// Read `count` blocks starting at block `start` into `buf`.
    ///
    /// `buf` must be exactly `count * 512` bytes. The read commands are
    /// resent until the card accepts them (see `SdCardConfig::COMMAND_RETRIES`);
    /// data phase and STOP_TRANSMISSION failures are logged, not returned.
    pub fn read_blocks(&mut self, start: u32, count: u32, buf: &mut [u8]) -> Result<(), SdCardError> {
        if !self.card_initialized {
            return Err(SdCardError::NotInitialized);
        }
        check_buffer(count, buf.len())?;

        let mut block = start;
        let mut remaining = count;
        let mut offset = 0usize;

        while remaining > 0 {
            let nblocks = chunk_blocks(remaining, C::MULTI_BLOCK_READ);
            let len = nblocks * SD_BLOCK_SIZE;
            let chunk = &mut buf[offset..offset + len as usize];

            // DMA writer
            self.regs.block2mem_dma_enable_write(0);
            self.regs.block2mem_dma_base_write(chunk.as_mut_ptr() as u64);
            self.regs.block2mem_dma_length_write(len);
            self.regs.block2mem_dma_enable_write(1);

            if C::SET_BLOCK_COUNT {
                if let Err(e) = self.command(Command::SetBlockCount(nblocks)) {
                    log::warn!("SDCard: SET_BLOCK_COUNT({}) failed: {:?}", nblocks, e);
                }
            }

            let cmd = if nblocks > 1 {
                Command::ReadMultipleBlock { block, count: nblocks }
            } else {
                Command::ReadSingleBlock(block)
            };
            if let Err(e) = self.command_until_ok(cmd) {
                self.regs.block2mem_dma_enable_write(0);
                return Err(e);
            }
            if let Err(e) = self.wait_data_done() {
                log::warn!("SDCard: read data phase at block {} failed: {:?}", block, e);
            }

            // The last block must be in memory before the card is stopped
            while self.regs.block2mem_dma_done_read() & 1 == 0 {
                spin_loop();
            }

            if nblocks > 1 {
                if let Err(e) = self.command(Command::StopTransmission) {
                    log::warn!("SDCard: STOP_TRANSMISSION failed: {:?}", e);
                }
            }

            block = block.wrapping_add(nblocks);
            offset += len as usize;
            remaining -= nblocks;
        }

        if !C::COHERENT_DMA {
            self.regs.flush_caches();
        }

        Ok(())
    }
}

impl<R: Mem2BlockDma, C: SdCardConfig> SdCard<R, C> {
    /// Write `count` blocks from `buf` starting at block `start`.
    ///
    /// `buf` must be exactly `count * 512` bytes.
    pub fn write_blocks(&mut self, start: u32, count: u32, buf: &[u8]) -> Result<(), SdCardError> {
        if !self.card_initialized {
            return Err(SdCardError::NotInitialized);
        }
        check_buffer(count, buf.len())?;

        let mut block = start;
        let mut remaining = count;
        let mut offset = 0usize;

        while remaining > 0 {
            let nblocks = chunk_blocks(remaining, C::MULTI_BLOCK_WRITE);
            let len = nblocks * SD_BLOCK_SIZE;
            let chunk = &buf[offset..offset + len as usize];

            // DMA reader
            self.regs.mem2block_dma_enable_write(0);
            self.regs.mem2block_dma_base_write(chunk.as_ptr() as u64);
            self.regs.mem2block_dma_length_write(len);
            self.regs.mem2block_dma_enable_write(1);

            if C::SET_BLOCK_COUNT {
                if let Err(e) = self.command(Command::SetBlockCount(nblocks)) {
                    log::warn!("SDCard: SET_BLOCK_COUNT({}) failed: {:?}", nblocks, e);
                }
            }

            let cmd = if nblocks > 1 {
                Command::WriteMultipleBlock { block, count: nblocks }
            } else {
                Command::WriteSingleBlock(block)
            };
            if let Err(e) = self.command_until_ok(cmd) {
                self.regs.mem2block_dma_enable_write(0);
                return Err(e);
            }

            // The reader may still be draining its FIFO; stop the card first
            if nblocks > 1 {
                if let Err(e) = self.command(Command::StopTransmission) {
                    log::warn!("SDCard: STOP_TRANSMISSION failed: {:?}", e);
                }
            }

            while self.regs.mem2block_dma_done_read() & 1 == 0 {
                spin_loop();
            }

            block = block.wrapping_add(nblocks);
            offset += len as usize;
            remaining -= nblocks;
        }

        Ok(())
    }
}
