//! COM1 serial port, used by [`crate::klog`] and the QEMU test harness.
//! Grounded on the teacher's `serial.rs`, trimmed to the one architecture
//! this kernel targets.

use core::fmt;
use lazy_static::lazy_static;
use spin::Mutex;
use uart_16550::SerialPort;

lazy_static! {
    pub static ref SERIAL1: Mutex<SerialPort> = {
        // SAFETY: 0x3F8 is COM1's well-known base port.
        let mut port = unsafe { SerialPort::new(0x3F8) };
        port.init();
        Mutex::new(port)
    };
}

#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    use core::fmt::Write;
    super::port::without_interrupts(|| {
        SERIAL1.lock().write_fmt(args).expect("serial write_fmt failed");
    });
}
