//! TerminalOS kernel library.
//!
//! Exposes every kernel subsystem so the bare-metal binary (`src/main.rs`)
//! and the host-side unit/integration tests can share one implementation.
//! The bare-metal build (`target_os = "none"`, via `i686-terminalos.json`)
//! is `no_std`; host builds (`cargo test` against the default host target)
//! pull in `std` so the custom test harness can use the system's process
//! exit and `println!` for reporting, the same split the teacher crate
//! uses between its bare-metal and coverage-test builds.

#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]
#![cfg_attr(target_os = "none", feature(custom_test_frameworks))]
#![cfg_attr(target_os = "none", test_runner(crate::test_framework::test_runner))]
#![cfg_attr(target_os = "none", reexport_test_harness_main = "test_main")]
#![feature(abi_x86_interrupt)]

#[cfg(not(target_os = "none"))]
extern crate std;

#[macro_use]
pub mod print;

pub mod arch;
pub mod error;
pub mod fs;
pub mod keyboard;
pub mod klog;
pub mod process;
pub mod rtc;
pub mod sched;
pub mod syscall;
pub mod terminal;

pub mod test_framework;

pub use error::{KernelError, KernelResult};

/// Kernel entry point shared by `main.rs` and the bare-metal test harness.
///
/// Brings up every subsystem in dependency order (spec.md §2): ports/VGA are
/// ready as soon as statics are constructed, so initialization starts at the
/// interrupt controller and works up to spawning the first shell.
pub fn kernel_main(multiboot_info_addr: u32) -> ! {
    klog::init();
    log::info!("TerminalOS kernel starting (multiboot info at {:#x})", multiboot_info_addr);

    arch::x86::gdt::init();
    arch::x86::paging::init();
    arch::x86::idt::init();
    arch::x86::pic::init();
    arch::x86::pit::init();
    arch::x86::rtc_hw::init();

    fs::init(multiboot_info_addr);
    terminal::init();
    process::table::init();
    sched::init();

    #[cfg(all(test, target_os = "none"))]
    test_main();

    log::info!("subsystems initialized, spawning the boot shell on terminal 1");
    // Terminal 1 is already foreground, so `terminal::switch_to` would be a
    // no-op here (spec.md §8 S1) — spawn its root shell directly instead,
    // the same call `terminal::switch_to` makes for terminals 2 and 3 the
    // first time they're switched to.
    let _ = process::execute_root(1, "shell");

    // `execute_root` only returns once terminal 1's whole process tree has
    // unwound back to its root shell halting, which tears the terminal down
    // and switches elsewhere (`process::halt`'s root-teardown branch) — from
    // here on there is nothing left for the boot thread to do but idle.
    loop {
        arch::x86::port::enable_interrupts();
        arch::x86::port::hlt();
    }
}

#[cfg(all(not(test), target_os = "none"))]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    log::error!("kernel panic: {}", info);
    arch::x86::port::disable_interrupts();
    loop {
        arch::x86::port::hlt();
    }
}

#[cfg(all(test, target_os = "none"))]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    test_framework::test_panic_handler(info)
}

#[cfg(all(test, target_os = "none"))]
#[no_mangle]
pub extern "C" fn _start() -> ! {
    test_main();
    loop {
        arch::x86::port::hlt();
    }
}
