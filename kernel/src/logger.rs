//! Kernel logging backed by the `log` crate, writing to the PL011 UART.
//!
//! Installed once during boot stage 1 (before the heap exists, so no
//! allocation happens on the logging path).

use log::{Level, Metadata, Record};

struct UartLogger;

static LOGGER: UartLogger = UartLogger;

impl log::Log for UartLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Trace
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        crate::serial_println!("[{:<5}] {}", record.level(), record.args());
    }

    fn flush(&self) {}
}

/// Install the UART-backed logger as the global `log` sink.
///
/// Idempotent: a second call is a no-op (log::set_logger only ever
/// succeeds once per process).
pub fn init() {
    log::set_max_level(log::LevelFilter::Trace);
    let _ = log::set_logger(&LOGGER);
}
