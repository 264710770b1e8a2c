//! Build-time driver configuration
//!
//! Every capability the driver can be built with is an associated constant of
//! [`SdCardConfig`]. The controller is generic over the configuration, so the
//! choices are resolved when the firmware is compiled rather than at runtime.

/// Capabilities and clock plan of one SoC build
pub trait SdCardConfig {
    /// System (CSR bus) clock feeding the SD clocker
    const SYSTEM_CLOCK_HZ: u32;

    /// Bus clock used during card identification
    const INIT_CLOCK_HZ: u32 = 400_000;

    /// Bus clock used once the card has left the identification phase
    const CLOCK_HZ: u32 = 25_000_000;

    /// One READ_MULTIPLE_BLOCK may cover a whole read request
    const MULTI_BLOCK_READ: bool = true;

    /// One WRITE_MULTIPLE_BLOCK may cover a whole write request
    const MULTI_BLOCK_WRITE: bool = true;

    /// Announce block counts with SET_BLOCK_COUNT before transfers
    const SET_BLOCK_COUNT: bool = false;

    /// The CPU observes DMA writes without a cache flush
    const COHERENT_DMA: bool = false;

    /// Bound on the retry-until-Ok loops around data-bearing commands.
    ///
    /// `None` retries forever: a card that never accepts the command hangs
    /// the caller. `Some(n)` gives up after `n` attempts with
    /// [`SdCardError::RetriesExhausted`](super::SdCardError::RetriesExhausted).
    const COMMAND_RETRIES: Option<u32> = None;
}

/// Configuration of the firmware image being built.
///
/// Capabilities come from Cargo features, clock frequencies from the
/// `LITESDCARD_SYS_CLK_FREQ`, `LITESDCARD_CLK_FREQ_INIT` and
/// `LITESDCARD_CLK_FREQ` environment variables at build time.
pub struct BoardConfig;

impl SdCardConfig for BoardConfig {
    const SYSTEM_CLOCK_HZ: u32 = env_hz(option_env!("LITESDCARD_SYS_CLK_FREQ"), 100_000_000);
    const INIT_CLOCK_HZ: u32 = env_hz(option_env!("LITESDCARD_CLK_FREQ_INIT"), 400_000);
    const CLOCK_HZ: u32 = env_hz(option_env!("LITESDCARD_CLK_FREQ"), 25_000_000);
    const MULTI_BLOCK_READ: bool = cfg!(feature = "multi-block-read");
    const MULTI_BLOCK_WRITE: bool = cfg!(feature = "multi-block-write");
    const SET_BLOCK_COUNT: bool = cfg!(feature = "set-block-count");
    const COHERENT_DMA: bool = cfg!(feature = "coherent-dma");
}

/// Parse a decimal frequency from a build-time variable.
///
/// Anything that is not a plain decimal number falls back to `default`.
const fn env_hz(value: Option<&str>, default: u32) -> u32 {
    let bytes = match value {
        Some(s) => s.as_bytes(),
        None => return default,
    };
    if bytes.is_empty() {
        return default;
    }

    let mut hz: u32 = 0;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b < b'0' || b > b'9' {
            return default;
        }
        hz = match hz.checked_mul(10) {
            Some(v) => match v.checked_add((b - b'0') as u32) {
                Some(v) => v,
                None => return default,
            },
            None => return default,
        };
        i += 1;
    }
    hz
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_hz() {
        assert_eq!(env_hz(None, 7), 7);
        assert_eq!(env_hz(Some(""), 7), 7);
        assert_eq!(env_hz(Some("50000000"), 7), 50_000_000);
        assert_eq!(env_hz(Some("25MHz"), 7), 7);
        assert_eq!(env_hz(Some("99999999999"), 7), 7);
    }

    #[test]
    fn test_board_defaults() {
        assert!(BoardConfig::SYSTEM_CLOCK_HZ > 0);
        assert!(BoardConfig::INIT_CLOCK_HZ <= BoardConfig::CLOCK_HZ);
        assert_eq!(BoardConfig::COMMAND_RETRIES, None);
    }
}
