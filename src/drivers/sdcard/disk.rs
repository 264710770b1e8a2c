//! SD card block device
//!
//! Binds the controller to the generic block-device layer. The adapter owns
//! the disk status: it starts out not initialized, becomes ready after a
//! successful bring-up and falls back to not initialized when a later
//! bring-up fails.

use crate::drivers::block::{BlockDevice, BlockDeviceInfo, BlockError, DiskStatus, WritableBlockDevice};

use super::config::{BoardConfig, SdCardConfig};
use super::regs::SD_BLOCK_SIZE;
use super::{Mem2BlockDma, SdCard, SdCardError, SdCardRegisters};

impl From<SdCardError> for BlockError {
    fn from(e: SdCardError) -> Self {
        match e {
            SdCardError::NotInitialized => BlockError::NotReady,
            SdCardError::InvalidParameter => BlockError::InvalidParameter,
            _ => BlockError::DeviceError,
        }
    }
}

/// Card block addresses are 32 bits wide
fn block_address(lba: u64) -> Result<u32, BlockError> {
    u32::try_from(lba).map_err(|_| BlockError::InvalidParameter)
}

/// SD card exposed as a block device
pub struct SdCardDisk<R, C = BoardConfig> {
    card: SdCard<R, C>,
    status: DiskStatus,
}

impl<R: SdCardRegisters, C: SdCardConfig> SdCardDisk<R, C> {
    /// Wrap a controller; no bus traffic until [`BlockDevice::initialize`]
    pub fn new(regs: R) -> Self {
        Self {
            card: SdCard::new(regs),
            status: DiskStatus::NotInitialized,
        }
    }

    /// The underlying controller
    pub fn card(&self) -> &SdCard<R, C> {
        &self.card
    }

    /// Mutable access to the underlying controller
    pub fn card_mut(&mut self) -> &mut SdCard<R, C> {
        &mut self.card
    }
}

impl<R: SdCardRegisters, C: SdCardConfig> BlockDevice for SdCardDisk<R, C> {
    fn initialize(&mut self) -> DiskStatus {
        if self.status == DiskStatus::Ready {
            return self.status;
        }

        self.status = match self.card.init() {
            Ok(()) => DiskStatus::Ready,
            Err(e) => {
                log::warn!("SDCard: disk not ready: {:?}", e);
                DiskStatus::NotInitialized
            }
        };
        self.status
    }

    fn status(&self) -> DiskStatus {
        self.status
    }

    fn read_blocks(&mut self, lba: u64, count: u32, buffer: &mut [u8]) -> Result<(), BlockError> {
        if self.status != DiskStatus::Ready {
            return Err(BlockError::NotReady);
        }
        let block = block_address(lba)?;
        self.card.read_blocks(block, count, buffer)?;
        Ok(())
    }

    fn info(&self) -> BlockDeviceInfo {
        BlockDeviceInfo {
            block_size: SD_BLOCK_SIZE,
            num_blocks: self.card.num_blocks().unwrap_or(0),
        }
    }
}

impl<R: Mem2BlockDma, C: SdCardConfig> WritableBlockDevice for SdCardDisk<R, C> {
    fn write_blocks(&mut self, lba: u64, count: u32, buffer: &[u8]) -> Result<(), BlockError> {
        if self.status != DiskStatus::Ready {
            return Err(BlockError::NotReady);
        }
        let block = block_address(lba)?;
        self.card.write_blocks(block, count, buffer)?;
        Ok(())
    }
}
