//! Card bring-up
//!
//! Bring-up is a linear sequence of [`InitStep`]s. Each step either advances
//! to the next one or aborts the whole sequence; nothing is retried across
//! steps. Only the idle handshake and the OCR negotiation have a retry
//! budget of their own.

use super::card::{Cid, Csd};
use super::command::{Command, Rca};
use super::config::SdCardConfig;
use super::regs::*;
use super::{SdCard, SdCardError, SdCardRegisters};

/// Attempts of the idle handshake and of the OCR negotiation
const INIT_ATTEMPTS: u32 = 1000;

/// Settle time after clock changes, idle pulses and OCR probes
const INIT_DELAY_US: u32 = 1000;

/// Bring-up state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStep {
    /// Slow identification clock
    SetInitClock,
    /// Idle clocks followed by GO_IDLE_STATE
    ToggleAndIdle,
    /// SEND_IF_COND voltage probe
    ProbeVoltageRange,
    /// Full operating clock
    SetOperationalClock,
    /// APP_CMD + SD_SEND_OP_COND until power-up completes
    NegotiateOcr,
    /// ALL_SEND_CID
    Identify,
    /// SEND_RELATIVE_ADDR
    AssignAddress,
    /// SEND_CID
    ReadCid,
    /// SEND_CSD
    ReadCsd,
    /// SELECT_CARD
    Select,
    /// APP_CMD + SET_BUS_WIDTH (4-bit)
    SetBusWidth,
    /// SWITCH_FUNC to SDR25
    SwitchSpeed,
    /// APP_CMD + SEND_SCR
    ReadScr,
    /// SET_BLOCKLEN 512
    SetBlockLength,
    /// Card is usable
    Ready,
}

impl<R: SdCardRegisters, C: SdCardConfig> SdCard<R, C> {
    /// Bring the card from power-up to the transfer state.
    ///
    /// Any previous bring-up state is discarded first. On failure the card
    /// is left not ready and the error names the step that failed.
    pub fn init(&mut self) -> Result<(), SdCardError> {
        self.card_initialized = false;
        self.rca = None;
        self.cid = None;
        self.csd = None;

        let mut step = InitStep::SetInitClock;
        while step != InitStep::Ready {
            log::debug!("SDCard: {:?}", step);
            step = match self.run_step(step) {
                Ok(next) => next,
                Err(e) => {
                    log::error!("SDCard: initialization failed at {:?}: {:?}", step, e);
                    return Err(e);
                }
            };
        }

        self.card_initialized = true;
        log::info!(
            "SDCard: ready, RCA {:#06x}, {} blocks",
            self.rca.map_or(0, |r| r.0),
            self.num_blocks().unwrap_or(0)
        );
        Ok(())
    }

    /// Run one bring-up step and return the next one
    fn run_step(&mut self, step: InitStep) -> Result<InitStep, SdCardError> {
        let fail = |_: SdCardError| SdCardError::CardInitFailed(step);

        match step {
            InitStep::SetInitClock => {
                self.set_clock(C::INIT_CLOCK_HZ, false);
                self.regs.busy_wait_us(INIT_DELAY_US);
                Ok(InitStep::ToggleAndIdle)
            }

            InitStep::ToggleAndIdle => {
                for _ in 0..INIT_ATTEMPTS {
                    // 80 dummy clocks
                    self.regs.phy_init_initialize_write(1);
                    self.regs.busy_wait_us(INIT_DELAY_US);

                    if self.command(Command::GoIdle).is_ok() {
                        return Ok(InitStep::ProbeVoltageRange);
                    }
                    self.regs.busy_wait_us(INIT_DELAY_US);
                }
                Err(SdCardError::NoCard)
            }

            // Only version 2.00+ cards answer
            InitStep::ProbeVoltageRange => {
                self.command(Command::SendIfCond)
                    .map_err(|_| SdCardError::UnsupportedCard)?;
                Ok(InitStep::SetOperationalClock)
            }

            InitStep::SetOperationalClock => {
                self.set_clock(C::CLOCK_HZ, false);
                self.regs.busy_wait_us(INIT_DELAY_US);
                Ok(InitStep::NegotiateOcr)
            }

            InitStep::NegotiateOcr => {
                for _ in 0..INIT_ATTEMPTS {
                    // An APP_CMD failure surfaces as an ACMD41 failure
                    let _ = self.command(Command::AppCmd(None));
                    if self.command(Command::AppSendOpCond { hcs: true }).is_ok()
                        && self.response()[3] & OCR_BUSY != 0
                    {
                        return Ok(InitStep::Identify);
                    }
                    self.regs.busy_wait_us(INIT_DELAY_US);
                }
                Err(SdCardError::CardInitFailed(step))
            }

            InitStep::Identify => {
                self.command(Command::AllSendCid).map_err(fail)?;
                let cid = Cid::from_response(&self.response());
                log::debug!("SDCard: CID {:08x?}", self.response());
                self.cid = Some(cid);
                Ok(InitStep::AssignAddress)
            }

            InitStep::AssignAddress => {
                self.command(Command::SetRelativeAddress).map_err(fail)?;
                let rca = self.decode_rca();
                log::debug!("SDCard: RCA {:#06x}", rca.0);
                self.rca = Some(rca);
                Ok(InitStep::ReadCid)
            }

            InitStep::ReadCid => {
                let rca = self.assigned_rca(step)?;
                self.command(Command::SendCid(rca)).map_err(fail)?;
                let cid = Cid::from_response(&self.response());
                log::debug!(
                    "SDCard: manufacturer {:#04x}, OEM {}, product {} rev {}.{}, serial {:#010x}, {:02}/{}",
                    cid.manufacturer_id,
                    cid.oem(),
                    cid.name(),
                    cid.revision().0,
                    cid.revision().1,
                    cid.serial,
                    cid.month,
                    cid.year
                );
                self.cid = Some(cid);
                Ok(InitStep::ReadCsd)
            }

            InitStep::ReadCsd => {
                let rca = self.assigned_rca(step)?;
                self.command(Command::SendCsd(rca)).map_err(fail)?;
                let csd = Csd::from_response(&self.response());
                log::debug!(
                    "SDCard: CSD {:?}, max rate {} kbit/s, max read block {} bytes, {} MB",
                    csd.version,
                    csd.max_transfer_rate_kbps(),
                    csd.max_read_block_len(),
                    csd.capacity_bytes() / (1024 * 1024)
                );
                self.csd = Some(csd);
                Ok(InitStep::Select)
            }

            InitStep::Select => {
                let rca = self.assigned_rca(step)?;
                self.command(Command::SelectCard(rca)).map_err(fail)?;
                Ok(InitStep::SetBusWidth)
            }

            InitStep::SetBusWidth => {
                let rca = self.assigned_rca(step)?;
                self.command(Command::AppCmd(Some(rca))).map_err(fail)?;
                self.command(Command::AppSetBusWidth).map_err(fail)?;
                self.regs.phy_settings_write(SD_PHY_SPEED_4X);
                Ok(InitStep::SwitchSpeed)
            }

            InitStep::SwitchSpeed => {
                self.command_until_ok(Command::SwitchFunc {
                    mode: SD_SWITCH_SWITCH,
                    group: SD_GROUP_ACCESSMODE,
                    value: SD_SPEED_SDR25,
                })?;
                self.wait_data_done().map_err(fail)?;
                Ok(InitStep::ReadScr)
            }

            InitStep::ReadScr => {
                let rca = self.assigned_rca(step)?;
                self.command(Command::AppCmd(Some(rca))).map_err(fail)?;
                self.command_until_ok(Command::AppSendScr)?;
                self.wait_data_done().map_err(fail)?;
                Ok(InitStep::SetBlockLength)
            }

            InitStep::SetBlockLength => {
                self.command(Command::SetBlockLen(SD_BLOCK_SIZE)).map_err(fail)?;
                Ok(InitStep::Ready)
            }

            InitStep::Ready => Ok(InitStep::Ready),
        }
    }

    /// RCA published in `AssignAddress`; addressed commands require it
    fn assigned_rca(&self, step: InitStep) -> Result<Rca, SdCardError> {
        self.rca.ok_or(SdCardError::CardInitFailed(step))
    }
}
