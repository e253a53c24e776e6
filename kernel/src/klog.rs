//! `log` crate backend for the kernel.
//!
//! Installs a [`log::Log`] implementation that renders records to the
//! serial port (grounded on `arch::x86::serial`, carried from the teacher's
//! `uart_16550`-backed serial module). Kept entirely separate from
//! `print!`/`println!`, which write to the live VGA framebuffer and are the
//! terminal device's own output path, not a diagnostics channel.

use log::{Level, LevelFilter, Log, Metadata, Record};

struct KernelLogger;

static LOGGER: KernelLogger = KernelLogger;

impl Log for KernelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Trace
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        write_record(record);
    }

    fn flush(&self) {}
}

#[cfg(target_os = "none")]
fn write_record(record: &Record) {
    use core::fmt::Write;

    let mut port = crate::arch::x86::serial::SERIAL1.lock();
    let _ = writeln!(
        port,
        "[{:<5} {}] {}",
        record.level(),
        record.target(),
        record.args()
    );
}

#[cfg(not(target_os = "none"))]
fn write_record(record: &Record) {
    std::println!("[{:<5} {}] {}", record.level(), record.target(), record.args());
}

/// Install the kernel logger as the global `log` facade backend.
///
/// Safe to call once, early in [`crate::kernel_main`]; a second call is a
/// no-op error from `log::set_logger` that we deliberately ignore, since
/// the only caller is boot itself.
pub fn init() {
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(LevelFilter::Trace);
}
