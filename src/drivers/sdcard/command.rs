//! SD command engine
//!
//! Issues one command at a time on the LiteSDCard command engine and resolves
//! the command and data event words into results. Every SD command the driver
//! uses is a [`Command`] variant with a fixed opcode, argument shape and
//! response kind.

use bitflags::bitflags;
use tock_registers::fields::FieldValue;

use super::config::SdCardConfig;
use super::regs::*;
use super::{SdCard, SdCardError, SdCardRegisters};

/// Polling interval for the command and data event words
const EVENT_POLL_US: u32 = 10;

bitflags! {
    /// Command or data event word
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EventStatus: u32 {
        /// Phase completed
        const DONE = 1 << 0;
        /// Card reported a write error
        const WRITE_ERROR = 1 << 1;
        /// Hardware timeout expired
        const TIMEOUT = 1 << 2;
        /// CRC mismatch
        const CRC_ERROR = 1 << 3;
    }
}

/// Response shape expected from the card
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// No response
    None,
    /// 48-bit response
    Short,
    /// 48-bit response with busy signalling
    ShortBusy,
    /// 136-bit response (CID/CSD)
    Long,
}

impl ResponseKind {
    fn field(self) -> FieldValue<u32, CMD_COMMAND::Register> {
        match self {
            Self::None => CMD_COMMAND::RESPONSE::None,
            Self::Short => CMD_COMMAND::RESPONSE::Short,
            Self::ShortBusy => CMD_COMMAND::RESPONSE::ShortBusy,
            Self::Long => CMD_COMMAND::RESPONSE::Long,
        }
    }
}

/// Direction of the data phase following a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    /// No data phase
    None,
    /// Card to host
    Read,
    /// Host to card
    Write,
}

impl TransferDirection {
    fn field(self) -> FieldValue<u32, CMD_COMMAND::Register> {
        match self {
            Self::None => CMD_COMMAND::TRANSFER::None,
            Self::Read => CMD_COMMAND::TRANSFER::Read,
            Self::Write => CMD_COMMAND::TRANSFER::Write,
        }
    }
}

/// Relative Card Address published by the card
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rca(pub u16);

impl Rca {
    /// Decode the RCA from a SEND_RELATIVE_ADDR response
    pub const fn from_response(response: &[u32; 4]) -> Self {
        Self((response[3] >> 16) as u16)
    }

    /// The RCA placed in the upper half of a command argument
    pub const fn argument(self) -> u32 {
        (self.0 as u32) << 16
    }
}

/// One command as put on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandDescriptor {
    /// Command index (0-63)
    pub opcode: u8,
    /// 32-bit argument
    pub argument: u32,
    /// Expected response
    pub response: ResponseKind,
    /// Data phase direction
    pub transfer: TransferDirection,
}

impl CommandDescriptor {
    /// Command register value
    pub fn command_word(&self) -> u32 {
        (CMD_COMMAND::OPCODE.val(self.opcode as u32) + self.transfer.field() + self.response.field()).value
    }
}

/// SD commands used by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// CMD0: GO_IDLE_STATE
    GoIdle,
    /// CMD8: SEND_IF_COND, voltage range probe
    SendIfCond,
    /// CMD55: APP_CMD, before the RCA is known the argument is 0
    AppCmd(Option<Rca>),
    /// ACMD41: SD_SEND_OP_COND
    AppSendOpCond {
        /// Host supports high capacity cards
        hcs: bool,
    },
    /// CMD2: ALL_SEND_CID
    AllSendCid,
    /// CMD3: SEND_RELATIVE_ADDR
    SetRelativeAddress,
    /// CMD10: SEND_CID
    SendCid(Rca),
    /// CMD9: SEND_CSD
    SendCsd(Rca),
    /// CMD7: SELECT_CARD
    SelectCard(Rca),
    /// ACMD6: SET_BUS_WIDTH (4-bit)
    AppSetBusWidth,
    /// CMD6: SWITCH_FUNC
    SwitchFunc {
        /// Check (0) or switch (1)
        mode: u32,
        /// Function group (0-based)
        group: u32,
        /// Function within the group
        value: u32,
    },
    /// ACMD51: SEND_SCR
    AppSendScr,
    /// CMD16: SET_BLOCKLEN
    SetBlockLen(u32),
    /// CMD17: READ_SINGLE_BLOCK
    ReadSingleBlock(u32),
    /// CMD18: READ_MULTIPLE_BLOCK
    ReadMultipleBlock {
        /// First block address
        block: u32,
        /// Number of blocks
        count: u32,
    },
    /// CMD24: WRITE_SINGLE_BLOCK
    WriteSingleBlock(u32),
    /// CMD25: WRITE_MULTIPLE_BLOCK
    WriteMultipleBlock {
        /// First block address
        block: u32,
        /// Number of blocks
        count: u32,
    },
    /// CMD12: STOP_TRANSMISSION
    StopTransmission,
    /// CMD13: SEND_STATUS
    SendStatus(Rca),
    /// CMD23: SET_BLOCK_COUNT
    SetBlockCount(u32),
}

impl Command {
    /// Opcode, argument and response kind of this command
    pub const fn descriptor(&self) -> CommandDescriptor {
        use ResponseKind::{Long, Short, ShortBusy};
        use TransferDirection::{Read, Write};

        let (opcode, argument, response, transfer) = match *self {
            Self::GoIdle => (SD_CMD_GO_IDLE_STATE, 0, ResponseKind::None, TransferDirection::None),
            Self::SendIfCond => (SD_CMD_SEND_IF_COND, SD_IF_COND_ARG, Short, TransferDirection::None),
            Self::AppCmd(rca) => {
                let arg = match rca {
                    Some(rca) => rca.argument(),
                    None => 0,
                };
                (SD_CMD_APP_CMD, arg, Short, TransferDirection::None)
            }
            Self::AppSendOpCond { hcs } => {
                let arg = if hcs { SD_OCR_ARG | SD_OCR_ARG_HCS } else { SD_OCR_ARG };
                (SD_CMD_APP_SEND_OP_COND, arg, ShortBusy, TransferDirection::None)
            }
            Self::AllSendCid => (SD_CMD_ALL_SEND_CID, 0, Long, TransferDirection::None),
            Self::SetRelativeAddress => (SD_CMD_SEND_RELATIVE_ADDR, 0, Short, TransferDirection::None),
            Self::SendCid(rca) => (SD_CMD_SEND_CID, rca.argument(), Long, TransferDirection::None),
            Self::SendCsd(rca) => (SD_CMD_SEND_CSD, rca.argument(), Long, TransferDirection::None),
            Self::SelectCard(rca) => (SD_CMD_SELECT_CARD, rca.argument(), ShortBusy, TransferDirection::None),
            Self::AppSetBusWidth => (SD_CMD_APP_SET_BUS_WIDTH, SD_BUS_WIDTH_4, Short, TransferDirection::None),
            Self::SwitchFunc { mode, group, value } => {
                (SD_CMD_SWITCH_FUNC, switch_argument(mode, group, value), Short, Read)
            }
            Self::AppSendScr => (SD_CMD_APP_SEND_SCR, 0, Short, Read),
            Self::SetBlockLen(len) => (SD_CMD_SET_BLOCKLEN, len, Short, TransferDirection::None),
            Self::ReadSingleBlock(block) => (SD_CMD_READ_SINGLE_BLOCK, block, Short, Read),
            Self::ReadMultipleBlock { block, .. } => (SD_CMD_READ_MULTIPLE_BLOCK, block, Short, Read),
            Self::WriteSingleBlock(block) => (SD_CMD_WRITE_SINGLE_BLOCK, block, Short, Write),
            Self::WriteMultipleBlock { block, .. } => (SD_CMD_WRITE_MULTIPLE_BLOCK, block, Short, Write),
            Self::StopTransmission => (SD_CMD_STOP_TRANSMISSION, 0, ShortBusy, TransferDirection::None),
            Self::SendStatus(rca) => (SD_CMD_SEND_STATUS, rca.argument(), Short, TransferDirection::None),
            Self::SetBlockCount(count) => (SD_CMD_SET_BLOCK_COUNT, count, Short, TransferDirection::None),
        };

        CommandDescriptor {
            opcode,
            argument,
            response,
            transfer,
        }
    }

    /// Block length and count programmed before a data-bearing command
    pub const fn data_geometry(&self) -> Option<(u32, u32)> {
        match *self {
            Self::SwitchFunc { .. } => Some((SD_SWITCH_STATUS_LEN, 1)),
            Self::AppSendScr => Some((SD_SCR_LEN, 1)),
            Self::ReadSingleBlock(_) | Self::WriteSingleBlock(_) => Some((SD_BLOCK_SIZE, 1)),
            Self::ReadMultipleBlock { count, .. } | Self::WriteMultipleBlock { count, .. } => {
                Some((SD_BLOCK_SIZE, count))
            }
            _ => None,
        }
    }
}

/// SWITCH_FUNC argument: all groups "no change" except `group`, set to `value`
pub const fn switch_argument(mode: u32, group: u32, value: u32) -> u32 {
    let mut arg = (mode << 31) | 0x00FF_FFFF;
    arg &= !(0xF << (group * 4));
    arg |= value << (group * 4);
    arg
}

/// Map an event word to a result, timeout taking precedence over CRC
fn event_result(event: EventStatus, timeout: SdCardError, crc: SdCardError) -> Result<(), SdCardError> {
    if event.contains(EventStatus::TIMEOUT) {
        Err(timeout)
    } else if event.contains(EventStatus::CRC_ERROR) {
        Err(crc)
    } else {
        Ok(())
    }
}

impl<R: SdCardRegisters, C: SdCardConfig> SdCard<R, C> {
    /// Wait for the command engine to report completion
    fn wait_cmd_done(&mut self) -> Result<(), SdCardError> {
        let event = loop {
            let event = EventStatus::from_bits_truncate(self.regs.cmd_event_read());
            self.regs.busy_wait_us(EVENT_POLL_US);
            if event.contains(EventStatus::DONE) {
                break event;
            }
        };

        log::trace!("SDCard: cmdevt {:#x}", event.bits());
        event_result(event, SdCardError::CommandTimeout, SdCardError::CommandCrcError)
    }

    /// Wait for the data phase of the last command to complete
    pub fn wait_data_done(&mut self) -> Result<(), SdCardError> {
        let event = loop {
            let event = EventStatus::from_bits_truncate(self.regs.data_event_read());
            if event.contains(EventStatus::DONE) {
                break event;
            }
            self.regs.busy_wait_us(EVENT_POLL_US);
        };

        log::trace!("SDCard: dataevt {:#x}", event.bits());
        event_result(event, SdCardError::DataTimeout, SdCardError::DataCrcError)
    }

    /// Send one command and wait for the command phase to complete
    pub fn send_command(&mut self, desc: CommandDescriptor) -> Result<(), SdCardError> {
        self.regs.cmd_argument_write(desc.argument);
        self.regs.cmd_command_write(desc.command_word());
        self.regs.cmd_send_write(1);
        self.wait_cmd_done()
    }

    /// Program the data geometry of `cmd` (if any) and send it once
    pub fn command(&mut self, cmd: Command) -> Result<(), SdCardError> {
        let desc = self.prepare(&cmd);
        self.send_command(desc)
    }

    /// Program the data geometry of `cmd` and resend it until the command
    /// phase succeeds.
    ///
    /// Unbounded unless the configuration sets `COMMAND_RETRIES`.
    pub fn command_until_ok(&mut self, cmd: Command) -> Result<(), SdCardError> {
        let desc = self.prepare(&cmd);
        let mut attempts: u32 = 0;
        loop {
            match self.send_command(desc) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    attempts = attempts.saturating_add(1);
                    log::trace!("SDCard: CMD{} failed ({:?}), retrying", desc.opcode, e);
                    if let Some(limit) = C::COMMAND_RETRIES {
                        if attempts >= limit {
                            log::error!("SDCard: CMD{} failed {} times", desc.opcode, attempts);
                            return Err(SdCardError::RetriesExhausted);
                        }
                    }
                }
            }
        }
    }

    fn prepare(&mut self, cmd: &Command) -> CommandDescriptor {
        let desc = cmd.descriptor();
        log::trace!("SDCard: CMD{} {:?} arg={:#010x}", desc.opcode, cmd, desc.argument);

        if let Some((length, count)) = cmd.data_geometry() {
            self.regs.block_length_write(length);
            self.regs.block_count_write(count);
        }
        desc
    }

    /// Read the response words of the last command
    pub fn response(&self) -> [u32; 4] {
        self.regs.cmd_response_read()
    }

    /// Decode the RCA from the last SEND_RELATIVE_ADDR response
    pub fn decode_rca(&self) -> Rca {
        Rca::from_response(&self.response())
    }

    /// CMD13: read the card status register of the selected card
    pub fn send_status(&mut self) -> Result<u32, SdCardError> {
        let rca = self.rca.ok_or(SdCardError::NotInitialized)?;
        self.command(Command::SendStatus(rca))?;
        Ok(self.response()[3])
    }
}
