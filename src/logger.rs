//! Logging infrastructure
//!
//! This module provides logging via the `log` crate, writing each record as
//! one ANSI-coloured line to a byte-output function supplied by the
//! platform, typically the SoC UART.
//!
//! The default level is `Info`; the `sdcard-debug` feature raises it to
//! `Trace` so every SD command is logged.

use core::fmt::{self, Write};
use log::{Level, LevelFilter, Metadata, Record};
use spin::Mutex;

/// Byte sink installed by [`init`]
static OUTPUT: Mutex<Option<fn(u8)>> = Mutex::new(None);

/// Console writer over a byte sink, translating `\n` to `\r\n`
struct ConsoleWriter(fn(u8));

impl Write for ConsoleWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for b in s.bytes() {
            if b == b'\n' {
                (self.0)(b'\r');
            }
            (self.0)(b);
        }
        Ok(())
    }
}

/// Level string with ANSI colours
fn level_str(level: Level) -> &'static str {
    match level {
        Level::Error => "\x1b[31mERROR\x1b[0m",
        Level::Warn => "\x1b[33mWARN\x1b[0m ",
        Level::Info => "\x1b[32mINFO\x1b[0m ",
        Level::Debug => "\x1b[34mDEBUG\x1b[0m",
        Level::Trace => "\x1b[35mTRACE\x1b[0m",
    }
}

fn write_record<W: Write>(w: &mut W, level: Level, args: &fmt::Arguments) -> fmt::Result {
    writeln!(w, "[{}] {}", level_str(level), args)
}

/// Serial console logger
struct ConsoleLogger;

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        // A record logged while the sink is held is dropped
        let Some(output) = OUTPUT.try_lock() else {
            return;
        };
        if let Some(putc) = *output {
            let _ = write_record(&mut ConsoleWriter(putc), record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: ConsoleLogger = ConsoleLogger;

/// Level selected by the build
const fn default_level() -> LevelFilter {
    if cfg!(feature = "sdcard-debug") {
        LevelFilter::Trace
    } else {
        LevelFilter::Info
    }
}

/// Initialize the logging subsystem
///
/// Calling it again only replaces the output function.
pub fn init(putc: fn(u8)) {
    *OUTPUT.lock() = Some(putc);

    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(default_level());
    }
}

/// Set the maximum log level
pub fn set_level(level: LevelFilter) {
    log::set_max_level(level);
}
