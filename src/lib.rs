//! litesdcard - bare-metal driver for the LiteSDCard SD card core
//!
//! This library brings up an SD/SDHC card attached to a LiteX SoC's
//! LiteSDCard core and exposes it as a block device for a boot-time
//! filesystem layer. It runs in a single polled context: no interrupts,
//! no allocator.
//!
//! ```ignore
//! use litesdcard::drivers::block::{BlockDevice, DiskStatus};
//! use litesdcard::drivers::sdcard::{MmioSdCard, SdCardDisk};
//!
//! litesdcard::logger::init(uart_putc);
//! let regs = unsafe { MmioSdCard::new(CORE_BASE, PHY_BASE, BLOCK2MEM_BASE, SPINS_PER_US) };
//! let mut disk: SdCardDisk<_> = SdCardDisk::new(regs);
//! if disk.initialize() == DiskStatus::Ready {
//!     disk.read_block(0, &mut sector)?;
//! }
//! ```

#![cfg_attr(not(test), no_std)]

pub mod drivers;
pub mod logger;

/// Global panic handler
#[cfg(all(target_os = "none", not(test)))]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    if let Some(location) = info.location() {
        log::error!(
            "PANIC at {}:{}: {}",
            location.file(),
            location.line(),
            info.message()
        );
    } else {
        log::error!("PANIC: {}", info.message());
    }

    loop {
        core::hint::spin_loop();
    }
}
