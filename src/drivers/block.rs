//! Block device abstraction
//!
//! The contract a filesystem layer consumes from a storage driver: bring the
//! medium up, report its status and geometry, and move whole blocks.

/// Disk status reported to the filesystem layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskStatus {
    /// Not brought up, or the last bring-up failed
    NotInitialized,
    /// Ready for transfers
    Ready,
}

/// Block device error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockError {
    /// Device has not been initialized
    NotReady,
    /// Buffer or block range is invalid
    InvalidParameter,
    /// The device failed the transfer
    DeviceError,
}

/// Device geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockDeviceInfo {
    /// Block size in bytes
    pub block_size: u32,
    /// Number of blocks, 0 while unknown
    pub num_blocks: u64,
}

/// A readable block device
pub trait BlockDevice {
    /// Bring the device up if it is not ready yet
    fn initialize(&mut self) -> DiskStatus;

    /// Current status, without side effects
    fn status(&self) -> DiskStatus;

    /// Read `count` blocks starting at `lba` into `buffer`
    fn read_blocks(&mut self, lba: u64, count: u32, buffer: &mut [u8]) -> Result<(), BlockError>;

    /// Device geometry
    fn info(&self) -> BlockDeviceInfo;

    /// Read a single block
    fn read_block(&mut self, lba: u64, buffer: &mut [u8]) -> Result<(), BlockError> {
        self.read_blocks(lba, 1, buffer)
    }
}

/// A block device that also accepts writes
pub trait WritableBlockDevice: BlockDevice {
    /// Write `count` blocks from `buffer` starting at `lba`
    fn write_blocks(&mut self, lba: u64, count: u32, buffer: &[u8]) -> Result<(), BlockError>;

    /// Write a single block
    fn write_block(&mut self, lba: u64, buffer: &[u8]) -> Result<(), BlockError> {
        self.write_blocks(lba, 1, buffer)
    }
}
