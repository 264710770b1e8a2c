//! Scripted register interface for driver tests
//!
//! `MockCard` records every CSR access as an [`Event`] and answers commands
//! like a well-behaved SDHC card, with knobs for the failure cases the driver
//! has to cope with.

use core::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::vec::Vec;

use super::command::EventStatus;
use super::config::SdCardConfig;
use super::regs::*;
use super::{Mem2BlockDma, SdCard, SdCardRegisters};

/// One register access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Event {
    CmdArgument(u32),
    CmdCommand(u32),
    CmdSend { opcode: u8, argument: u32 },
    BlockLength(u32),
    BlockCount(u32),
    PhyInit,
    PhySettings(u32),
    ClockDivider(u32),
    Block2MemEnable(u32),
    Block2MemBase(u64),
    Block2MemLength(u32),
    Block2MemDonePoll,
    Mem2BlockEnable(u32),
    Mem2BlockBase(u64),
    Mem2BlockLength(u32),
    Mem2BlockDonePoll,
    FlushCaches,
}

/// OCR reported once power-up completed: busy bit, CCS, 2.7-3.6V
pub(crate) const OCR_READY: u32 = 0xC0FF_8000;

/// OCR reported while the card is still powering up
pub(crate) const OCR_POWERING_UP: u32 = 0x00FF_8000;

pub(crate) struct MockCard {
    events: RefCell<Vec<Event>>,
    argument: u32,
    command: u32,
    cmd_event: u32,
    response: [u32; 4],
    cmd_latency: u32,
    pending_polls: Cell<u32>,
    cmd_polls: Cell<u32>,
    data_event: u32,
    failures: VecDeque<(u8, u32)>,
    absent: bool,
    reject_if_cond: bool,
    ocr_busy_after: u32,
    ocr_probes: u32,
    rca: u16,
    cid: [u32; 4],
    csd: [u32; 4],
    waited_us: u64,
}

impl MockCard {
    pub(crate) fn new() -> Self {
        Self {
            events: RefCell::new(Vec::new()),
            argument: 0,
            command: 0,
            cmd_event: 0,
            response: [0; 4],
            cmd_latency: 0,
            pending_polls: Cell::new(0),
            cmd_polls: Cell::new(0),
            data_event: EventStatus::DONE.bits(),
            failures: VecDeque::new(),
            absent: false,
            reject_if_cond: false,
            ocr_busy_after: 0,
            ocr_probes: 0,
            rca: 0xB368,
            // MID 0x03 "SD" "SU16G" rev 8.0 PSN 0x12345678 05/2019
            cid: [0x0353_4453, 0x5531_3647, 0x8012_3456, 0x7801_3501],
            // CSD v2, TRAN_SPEED 0x32, READ_BL_LEN 9, C_SIZE 30436 (16 GB)
            csd: [0x400E_0032, 0x5B59_0000, 0x76E4_7F80, 0x0A40_4000],
            waited_us: 0,
        }
    }

    /// A slot with no card: every command times out
    pub(crate) fn absent() -> Self {
        Self {
            absent: true,
            ..Self::new()
        }
    }

    /// Make the next send of `opcode` complete with `event` added to DONE
    pub(crate) fn fail_next(&mut self, opcode: u8, event: EventStatus) {
        self.failures.push_back((opcode, event.bits()));
    }

    /// Number of not-done polls before a command completes
    pub(crate) fn set_cmd_latency(&mut self, polls: u32) {
        self.cmd_latency = polls;
    }

    pub(crate) fn set_data_event(&mut self, event: EventStatus) {
        self.data_event = event.bits();
    }

    /// Card answers CMD8 with a timeout (pre-2.0 card)
    pub(crate) fn reject_if_cond(&mut self) {
        self.reject_if_cond = true;
    }

    /// Number of ACMD41 probes answered with the busy bit clear
    pub(crate) fn set_ocr_busy_after(&mut self, probes: u32) {
        self.ocr_busy_after = probes;
    }

    pub(crate) fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    pub(crate) fn clear_events(&mut self) {
        self.events.borrow_mut().clear();
    }

    /// Opcodes of every command sent, in order
    pub(crate) fn commands(&self) -> Vec<u8> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                Event::CmdSend { opcode, .. } => Some(*opcode),
                _ => None,
            })
            .collect()
    }

    /// Every command sent as (opcode, argument)
    pub(crate) fn sent(&self) -> Vec<(u8, u32)> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                Event::CmdSend { opcode, argument } => Some((*opcode, *argument)),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn count(&self, event: Event) -> usize {
        self.events.borrow().iter().filter(|e| **e == event).count()
    }

    pub(crate) fn cmd_event_polls(&self) -> u32 {
        self.cmd_polls.get()
    }

    pub(crate) fn waited_us(&self) -> u64 {
        self.waited_us
    }

    fn record(&self, event: Event) {
        self.events.borrow_mut().push(event);
    }

    fn answer(&mut self, opcode: u8) -> (u32, [u32; 4]) {
        if self.absent {
            return ((EventStatus::DONE | EventStatus::TIMEOUT).bits(), [0; 4]);
        }
        if let Some(idx) = self.failures.iter().position(|(op, _)| *op == opcode) {
            if let Some((_, bits)) = self.failures.remove(idx) {
                return (EventStatus::DONE.bits() | bits, [0; 4]);
            }
        }

        let response = match opcode {
            SD_CMD_SEND_IF_COND if self.reject_if_cond => {
                return ((EventStatus::DONE | EventStatus::TIMEOUT).bits(), [0; 4]);
            }
            SD_CMD_SEND_IF_COND => [0, 0, 0, SD_IF_COND_ARG],
            SD_CMD_APP_SEND_OP_COND => {
                self.ocr_probes += 1;
                let ocr = if self.ocr_probes > self.ocr_busy_after {
                    OCR_READY
                } else {
                    OCR_POWERING_UP
                };
                [0, 0, 0, ocr]
            }
            SD_CMD_SEND_RELATIVE_ADDR => [0, 0, 0, ((self.rca as u32) << 16) | 0x0500],
            SD_CMD_ALL_SEND_CID | SD_CMD_SEND_CID => self.cid,
            SD_CMD_SEND_CSD => self.csd,
            _ => [0, 0, 0, 0x0000_0900],
        };
        (EventStatus::DONE.bits(), response)
    }
}

impl SdCardRegisters for MockCard {
    fn cmd_argument_write(&mut self, value: u32) {
        self.argument = value;
        self.record(Event::CmdArgument(value));
    }

    fn cmd_command_write(&mut self, value: u32) {
        self.record(Event::CmdCommand(value));
        self.command = value;
    }

    fn cmd_send_write(&mut self, _value: u32) {
        let opcode = CMD_COMMAND::OPCODE.read(self.command) as u8;
        self.record(Event::CmdSend {
            opcode,
            argument: self.argument,
        });
        let (event, response) = self.answer(opcode);
        self.cmd_event = event;
        self.response = response;
        self.pending_polls.set(self.cmd_latency);
    }

    fn cmd_response_read(&self) -> [u32; 4] {
        self.response
    }

    fn cmd_event_read(&self) -> u32 {
        self.cmd_polls.set(self.cmd_polls.get() + 1);
        let pending = self.pending_polls.get();
        if pending > 0 {
            self.pending_polls.set(pending - 1);
            return 0;
        }
        self.cmd_event
    }

    fn data_event_read(&self) -> u32 {
        self.data_event
    }

    fn block_length_write(&mut self, value: u32) {
        self.record(Event::BlockLength(value));
    }

    fn block_count_write(&mut self, value: u32) {
        self.record(Event::BlockCount(value));
    }

    fn phy_init_initialize_write(&mut self, _value: u32) {
        self.record(Event::PhyInit);
    }

    fn phy_settings_write(&mut self, value: u32) {
        self.record(Event::PhySettings(value));
    }

    fn phy_clocker_divider_write(&mut self, value: u32) {
        self.record(Event::ClockDivider(value));
    }

    fn block2mem_dma_enable_write(&mut self, value: u32) {
        self.record(Event::Block2MemEnable(value));
    }

    fn block2mem_dma_base_write(&mut self, value: u64) {
        self.record(Event::Block2MemBase(value));
    }

    fn block2mem_dma_length_write(&mut self, value: u32) {
        self.record(Event::Block2MemLength(value));
    }

    fn block2mem_dma_done_read(&self) -> u32 {
        self.record(Event::Block2MemDonePoll);
        1
    }

    fn busy_wait_us(&mut self, us: u32) {
        self.waited_us += us as u64;
    }

    fn flush_caches(&mut self) {
        self.record(Event::FlushCaches);
    }
}

impl Mem2BlockDma for MockCard {
    fn mem2block_dma_enable_write(&mut self, value: u32) {
        self.record(Event::Mem2BlockEnable(value));
    }

    fn mem2block_dma_base_write(&mut self, value: u64) {
        self.record(Event::Mem2BlockBase(value));
    }

    fn mem2block_dma_length_write(&mut self, value: u32) {
        self.record(Event::Mem2BlockLength(value));
    }

    fn mem2block_dma_done_read(&self) -> u32 {
        self.record(Event::Mem2BlockDonePoll);
        1
    }
}

/// Multi-block reads and writes, unbounded retries
pub(crate) struct TestConfig;

impl SdCardConfig for TestConfig {
    const SYSTEM_CLOCK_HZ: u32 = 100_000_000;
}

/// One block per command in both directions
pub(crate) struct SingleBlockConfig;

impl SdCardConfig for SingleBlockConfig {
    const SYSTEM_CLOCK_HZ: u32 = 100_000_000;
    const MULTI_BLOCK_READ: bool = false;
    const MULTI_BLOCK_WRITE: bool = false;
}

/// SET_BLOCK_COUNT before every transfer, coherent DMA
pub(crate) struct BlockCountConfig;

impl SdCardConfig for BlockCountConfig {
    const SYSTEM_CLOCK_HZ: u32 = 100_000_000;
    const SET_BLOCK_COUNT: bool = true;
    const COHERENT_DMA: bool = true;
}

/// Retry-until-Ok loops give up after five attempts
pub(crate) struct BoundedConfig;

impl SdCardConfig for BoundedConfig {
    const SYSTEM_CLOCK_HZ: u32 = 100_000_000;
    const COMMAND_RETRIES: Option<u32> = Some(5);
}

/// A controller that completed bring-up, with the event log cleared
pub(crate) fn ready<C: SdCardConfig>() -> SdCard<MockCard, C> {
    let mut sd = SdCard::new(MockCard::new());
    sd.init().expect("mock card bring-up");
    sd.registers_mut().clear_events();
    sd
}
