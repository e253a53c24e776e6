//! `no_std` test harness: serial reporting plus the QEMU debug-exit device.
//! Trimmed from the teacher's `test_framework.rs` down to what this kernel's
//! own unit/integration tests use — no benchmark runner, no package-manager
//! fixtures.

use core::panic::PanicInfo;

use crate::error::KernelError;
use crate::{serial_print, serial_println};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum QemuExitCode {
    Success = 0x10,
    Failed = 0x11,
}

pub trait Testable {
    fn run(&self) -> Result<(), KernelError>;
}

impl<T> Testable for T
where
    T: Fn() -> Result<(), KernelError>,
{
    fn run(&self) -> Result<(), KernelError> {
        serial_print!("{}...\t", core::any::type_name::<T>());
        match self() {
            Ok(()) => {
                serial_println!("[ok]");
                Ok(())
            }
            Err(e) => {
                serial_println!("[failed]: {}", e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
pub fn test_runner(tests: &[&dyn Testable]) -> ! {
    serial_println!("Running {} tests", tests.len());
    let mut passed = 0;
    let mut failed = 0;

    for test in tests {
        match test.run() {
            Ok(()) => passed += 1,
            Err(_) => failed += 1,
        }
    }

    serial_println!("\nTest Results: {} passed, {} failed", passed, failed);
    if failed == 0 {
        exit_qemu(QemuExitCode::Success);
    } else {
        exit_qemu(QemuExitCode::Failed);
    }
}

pub fn test_panic_handler(info: &PanicInfo) -> ! {
    serial_println!("[failed]\n");
    serial_println!("Error: {}\n", info);
    exit_qemu(QemuExitCode::Failed);
}

/// Writing to port 0xf4 is the QEMU `isa-debug-exit` device; present only
/// under the `-device isa-debug-exit` flag the test runner script passes.
pub fn exit_qemu(exit_code: QemuExitCode) -> ! {
    unsafe {
        crate::arch::x86::port::outb_at(0xf4, exit_code as u8);
        core::hint::unreachable_unchecked();
    }
}

#[macro_export]
macro_rules! kernel_test {
    ($name:ident, $test:expr) => {
        #[test_case]
        const $name: &dyn $crate::test_framework::Testable =
            &|| -> Result<(), $crate::error::KernelError> { $test };
    };
}

#[macro_export]
macro_rules! kernel_assert_eq {
    ($left:expr, $right:expr) => {
        if $left != $right {
            return Err($crate::error::KernelError::BadArgument);
        }
    };
}
