//! SD bus clock control

use super::config::SdCardConfig;
use super::regs::{SD_CLK_DIV_MAX, SD_CLK_DIV_MIN};
use super::{SdCard, SdCardRegisters};

/// Divider programmed for a target bus frequency.
///
/// `ceil(system_hz / target_hz)` clamped to the clocker's 2..=256 range; a
/// target of 0 selects the slowest clock.
pub const fn clock_divider(system_hz: u32, target_hz: u32) -> u32 {
    if target_hz == 0 {
        return SD_CLK_DIV_MAX;
    }
    let div = (system_hz as u64).div_ceil(target_hz as u64);
    if div < SD_CLK_DIV_MIN as u64 {
        SD_CLK_DIV_MIN
    } else if div > SD_CLK_DIV_MAX as u64 {
        SD_CLK_DIV_MAX
    } else {
        div as u32
    }
}

/// Bus frequency the clocker actually produces for a divider.
///
/// The clocker only divides by even values, rounding odd dividers up.
pub const fn effective_frequency(system_hz: u32, divider: u32) -> u32 {
    system_hz / ((divider + 1) & !1)
}

impl<R: SdCardRegisters, C: SdCardConfig> SdCard<R, C> {
    /// Set the SD clock frequency
    ///
    /// With `show` set (or the `sdcard-debug` feature enabled) the effective
    /// frequency is logged.
    pub fn set_clock(&mut self, clock: u32, show: bool) {
        let divider = clock_divider(C::SYSTEM_CLOCK_HZ, clock);

        if show || cfg!(feature = "sdcard-debug") {
            let actual = effective_frequency(C::SYSTEM_CLOCK_HZ, divider);
            if actual > 1_000_000 {
                log::info!("Setting SDCard clk freq to {} MHz", actual / 1_000_000);
            } else {
                log::info!("Setting SDCard clk freq to {} KHz", actual / 1_000);
            }
        }

        self.regs.phy_clocker_divider_write(divider);
    }
}
