//! LiteSDCard Register Definitions
//!
//! This module defines the CSR blocks exposed by the LiteSDCard core (command
//! engine, PHY, block2mem and mem2block DMA engines) using tock-registers,
//! together with the SD protocol constants the driver puts on the bus.
//!
//! The layouts follow the LiteX CSR map with 32-bit CSR data width: every CSR
//! occupies one 32-bit word, and wider CSRs are split into several words with
//! the most significant word first.

use tock_registers::register_bitfields;
use tock_registers::registers::{ReadOnly, ReadWrite, WriteOnly};

// ============================================================================
// Bitfield Definitions
// ============================================================================

register_bitfields! [
    u32,
    /// Command word (core `cmd_command`)
    pub CMD_COMMAND [
        /// Expected response shape
        RESPONSE OFFSET(0) NUMBITS(2) [
            None = 0,
            Short = 1,
            Long = 2,
            ShortBusy = 3
        ],
        /// Data phase direction
        TRANSFER OFFSET(5) NUMBITS(2) [
            None = 0,
            Read = 1,
            Write = 2
        ],
        /// Command index (0-63)
        OPCODE OFFSET(8) NUMBITS(6) []
    ],

    /// DMA completion word
    pub DMA_DONE [
        /// Programmed length fully transferred
        DONE OFFSET(0) NUMBITS(1) []
    ]
];

// ============================================================================
// Register Blocks
// ============================================================================

/// Command engine and block geometry (`sdcard_core`)
#[repr(C)]
pub struct CoreRegs {
    /// Command argument
    pub cmd_argument: ReadWrite<u32>,
    /// Opcode, transfer direction and response shape
    pub cmd_command: ReadWrite<u32, CMD_COMMAND::Register>,
    /// Writing 1 sends the programmed command
    pub cmd_send: WriteOnly<u32>,
    /// 128-bit response, most significant word first
    pub cmd_response: [ReadOnly<u32>; 4],
    /// Command phase event
    pub cmd_event: ReadOnly<u32>,
    /// Data phase event
    pub data_event: ReadOnly<u32>,
    /// Block length in bytes for the next data phase
    pub block_length: ReadWrite<u32>,
    /// Block count for the next data phase
    pub block_count: ReadWrite<u32>,
}

/// Physical layer control (`sdcard_phy`)
#[repr(C)]
pub struct PhyRegs {
    /// Card detect level
    pub card_detect: ReadOnly<u32>,
    /// Bus clock divider (2-256)
    pub clocker_divider: ReadWrite<u32>,
    /// Writing 1 generates the 80 initialization clocks
    pub init_initialize: WriteOnly<u32>,
    /// Write data path status
    pub dataw_status: ReadOnly<u32>,
    /// Read data path status
    pub datar_status: ReadOnly<u32>,
    /// Bus width / speed settings
    pub settings: ReadWrite<u32>,
}

/// One DMA engine (`sdcard_block2mem` or `sdcard_mem2block`)
#[repr(C)]
pub struct DmaRegs {
    /// Memory base address, high word
    pub base_hi: ReadWrite<u32>,
    /// Memory base address, low word
    pub base_lo: ReadWrite<u32>,
    /// Transfer length in bytes
    pub length: ReadWrite<u32>,
    /// Engine enable (0/1)
    pub enable: ReadWrite<u32>,
    /// Completion flag
    pub done: ReadOnly<u32, DMA_DONE::Register>,
    /// Loop mode
    pub loop_: ReadWrite<u32>,
    /// Current offset
    pub offset: ReadOnly<u32>,
}

// ============================================================================
// PHY Settings
// ============================================================================

/// 4-bit bus
pub const SD_PHY_SPEED_4X: u32 = 2;

// ============================================================================
// SD Commands
// ============================================================================

/// GO_IDLE_STATE - Resets the card to idle state
pub const SD_CMD_GO_IDLE_STATE: u8 = 0;

/// ALL_SEND_CID - Asks the card to send its CID
pub const SD_CMD_ALL_SEND_CID: u8 = 2;

/// SEND_RELATIVE_ADDR - Asks the card to publish a new RCA
pub const SD_CMD_SEND_RELATIVE_ADDR: u8 = 3;

/// SWITCH_FUNC - Checks or switches card function
pub const SD_CMD_SWITCH_FUNC: u8 = 6;

/// SELECT/DESELECT_CARD - Toggles card between stand-by and transfer states
pub const SD_CMD_SELECT_CARD: u8 = 7;

/// SEND_IF_COND - Sends the interface condition (voltage range probe)
pub const SD_CMD_SEND_IF_COND: u8 = 8;

/// SEND_CSD - Asks the card to send its CSD
pub const SD_CMD_SEND_CSD: u8 = 9;

/// SEND_CID - Asks the addressed card to send its CID
pub const SD_CMD_SEND_CID: u8 = 10;

/// STOP_TRANSMISSION - Forces the card to stop a multi-block transfer
pub const SD_CMD_STOP_TRANSMISSION: u8 = 12;

/// SEND_STATUS - Asks the card to send its status register
pub const SD_CMD_SEND_STATUS: u8 = 13;

/// SET_BLOCKLEN - Sets the block length for block commands
pub const SD_CMD_SET_BLOCKLEN: u8 = 16;

/// READ_SINGLE_BLOCK - Reads a single block
pub const SD_CMD_READ_SINGLE_BLOCK: u8 = 17;

/// READ_MULTIPLE_BLOCK - Reads blocks until STOP_TRANSMISSION
pub const SD_CMD_READ_MULTIPLE_BLOCK: u8 = 18;

/// SET_BLOCK_COUNT - Sets the block count for the next multi-block command
pub const SD_CMD_SET_BLOCK_COUNT: u8 = 23;

/// WRITE_SINGLE_BLOCK - Writes a single block
pub const SD_CMD_WRITE_SINGLE_BLOCK: u8 = 24;

/// WRITE_MULTIPLE_BLOCK - Writes blocks until STOP_TRANSMISSION
pub const SD_CMD_WRITE_MULTIPLE_BLOCK: u8 = 25;

/// APP_CMD - Next command is application specific
pub const SD_CMD_APP_CMD: u8 = 55;

/// SET_BUS_WIDTH (ACMD6) - Sets the data bus width
pub const SD_CMD_APP_SET_BUS_WIDTH: u8 = 6;

/// SD_SEND_OP_COND (ACMD41) - Sends host capacity support, reads OCR
pub const SD_CMD_APP_SEND_OP_COND: u8 = 41;

/// SEND_SCR (ACMD51) - Reads the SD Configuration Register
pub const SD_CMD_APP_SEND_SCR: u8 = 51;

// ============================================================================
// Command Arguments
// ============================================================================

/// SEND_IF_COND argument: 2.7-3.6V supply, check pattern 0xAA
pub const SD_IF_COND_ARG: u32 = 0x0000_01AA;

/// ACMD41 voltage window and XPC bits
pub const SD_OCR_ARG: u32 = 0x10FF_8000;

/// ACMD41 HCS (and S18R) bits for high-capacity hosts
pub const SD_OCR_ARG_HCS: u32 = 0x6000_0000;

/// OCR power-up complete (bit 31 = 1 once the card is ready)
pub const OCR_BUSY: u32 = 1 << 31;

/// SET_BUS_WIDTH argument for a 4-bit bus
pub const SD_BUS_WIDTH_4: u32 = 2;

/// SWITCH_FUNC check mode
pub const SD_SWITCH_CHECK: u32 = 0;

/// SWITCH_FUNC switch mode
pub const SD_SWITCH_SWITCH: u32 = 1;

/// SWITCH_FUNC function group 1 (access mode)
pub const SD_GROUP_ACCESSMODE: u32 = 0;

/// Access mode SDR25 (high speed)
pub const SD_SPEED_SDR25: u32 = 1;

/// SWITCH_FUNC status block length
pub const SD_SWITCH_STATUS_LEN: u32 = 64;

/// SCR length in bytes
pub const SD_SCR_LEN: u32 = 8;

// ============================================================================
// Geometry
// ============================================================================

/// Block size for all data transfers
pub const SD_BLOCK_SIZE: u32 = 512;

/// Slowest clock divider
pub const SD_CLK_DIV_MAX: u32 = 256;

/// Fastest clock divider
pub const SD_CLK_DIV_MIN: u32 = 2;
