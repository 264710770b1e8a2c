//! LiteSDCard Driver
//!
//! This module drives the LiteSDCard SD/SDHC controller core found in LiteX
//! SoCs. It brings a card online (identification, addressing, 4-bit bus,
//! high-speed switch) and moves 512-byte blocks between the card and memory
//! with the core's two DMA engines.
//!
//! Everything is polled: commands, data phases and DMA completion are all
//! busy-waited on status CSRs. Timeouts are enforced by the hardware, which
//! raises a timeout flag on the command or data event word.

pub mod card;
pub mod clock;
pub mod command;
pub mod config;
pub mod disk;
pub mod init;
pub mod mmio;
pub mod regs;
pub mod transfer;

#[cfg(test)]
pub(crate) mod mock;

use core::marker::PhantomData;

pub use card::{Cid, Csd};
pub use command::{Command, CommandDescriptor, EventStatus, Rca, ResponseKind, TransferDirection};
pub use config::{BoardConfig, SdCardConfig};
pub use disk::SdCardDisk;
pub use init::InitStep;
pub use mmio::MmioSdCard;

/// SD card driver error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdCardError {
    /// Card not initialized
    NotInitialized,
    /// Command timeout
    CommandTimeout,
    /// Command CRC error
    CommandCrcError,
    /// Data timeout
    DataTimeout,
    /// Data CRC error
    DataCrcError,
    /// No card answered the idle handshake
    NoCard,
    /// Card rejected the voltage range probe (pre-2.0 card)
    UnsupportedCard,
    /// A bring-up step failed
    CardInitFailed(InitStep),
    /// A retried command never succeeded within the configured bound
    RetriesExhausted,
    /// Buffer does not match the requested block count
    InvalidParameter,
}

/// Register interface of the LiteSDCard core.
///
/// One method per CSR access the driver performs, plus the two platform
/// services it needs (a microsecond delay and a cache flush). The real
/// implementation is [`MmioSdCard`]; tests substitute a scripted card.
pub trait SdCardRegisters {
    /// Write the command argument
    fn cmd_argument_write(&mut self, value: u32);
    /// Write the command word (opcode, transfer direction, response shape)
    fn cmd_command_write(&mut self, value: u32);
    /// Trigger the programmed command
    fn cmd_send_write(&mut self, value: u32);
    /// Read the four response words, most significant first
    fn cmd_response_read(&self) -> [u32; 4];
    /// Read the command event word
    fn cmd_event_read(&self) -> u32;
    /// Read the data event word
    fn data_event_read(&self) -> u32;
    /// Write the block length for the next data phase
    fn block_length_write(&mut self, value: u32);
    /// Write the block count for the next data phase
    fn block_count_write(&mut self, value: u32);

    /// Pulse the PHY initialization clock generator
    fn phy_init_initialize_write(&mut self, value: u32);
    /// Write the PHY bus width / speed settings
    fn phy_settings_write(&mut self, value: u32);
    /// Write the bus clock divider
    fn phy_clocker_divider_write(&mut self, value: u32);

    /// Enable or disable the block to memory DMA engine
    fn block2mem_dma_enable_write(&mut self, value: u32);
    /// Write the block to memory DMA destination address
    fn block2mem_dma_base_write(&mut self, value: u64);
    /// Write the block to memory DMA byte length
    fn block2mem_dma_length_write(&mut self, value: u32);
    /// Read the block to memory DMA done flag
    fn block2mem_dma_done_read(&self) -> u32;

    /// Busy-wait for the given number of microseconds
    fn busy_wait_us(&mut self, us: u32);
    /// Flush the CPU data and L2 caches
    fn flush_caches(&mut self) {}
}

/// The memory to block DMA engine.
///
/// Only SoCs that instantiate the engine implement this; without it the
/// driver has no write path at all.
pub trait Mem2BlockDma: SdCardRegisters {
    /// Enable or disable the memory to block DMA engine
    fn mem2block_dma_enable_write(&mut self, value: u32);
    /// Write the memory to block DMA source address
    fn mem2block_dma_base_write(&mut self, value: u64);
    /// Write the memory to block DMA byte length
    fn mem2block_dma_length_write(&mut self, value: u32);
    /// Read the memory to block DMA done flag
    fn mem2block_dma_done_read(&self) -> u32;
}

/// SD card controller
pub struct SdCard<R, C = BoardConfig> {
    /// Register interface
    regs: R,
    /// Relative Card Address (after initialization)
    rca: Option<Rca>,
    /// Card identification (after initialization)
    cid: Option<Cid>,
    /// Card specific data (after initialization)
    csd: Option<Csd>,
    /// Bring-up completed and block length fixed at 512
    card_initialized: bool,
    _config: PhantomData<C>,
}

impl<R: SdCardRegisters, C: SdCardConfig> SdCard<R, C> {
    /// Create a controller on top of a register interface.
    ///
    /// No bus traffic happens until [`SdCard::init`] is called.
    pub fn new(regs: R) -> Self {
        Self {
            regs,
            rca: None,
            cid: None,
            csd: None,
            card_initialized: false,
            _config: PhantomData,
        }
    }

    /// Check if the card completed bring-up
    pub fn is_ready(&self) -> bool {
        self.card_initialized
    }

    /// Relative Card Address assigned during bring-up
    pub fn rca(&self) -> Option<Rca> {
        self.rca
    }

    /// Card identification read during bring-up
    pub fn cid(&self) -> Option<&Cid> {
        self.cid.as_ref()
    }

    /// Card specific data read during bring-up
    pub fn csd(&self) -> Option<&Csd> {
        self.csd.as_ref()
    }

    /// Number of 512-byte blocks on the card, if known
    pub fn num_blocks(&self) -> Option<u64> {
        self.csd.as_ref().map(Csd::num_blocks)
    }

    /// Get the block size
    pub fn block_size(&self) -> u32 {
        regs::SD_BLOCK_SIZE
    }

    /// Access the register interface
    pub fn registers(&self) -> &R {
        &self.regs
    }

    /// Mutable access to the register interface
    pub fn registers_mut(&mut self) -> &mut R {
        &mut self.regs
    }

    /// Release the register interface
    pub fn into_registers(self) -> R {
        self.regs
    }
}
