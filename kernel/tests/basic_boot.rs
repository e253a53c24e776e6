//! Boots far enough to bring up the GDT, paging, IDT, and PIC, then reports
//! over serial. No `fs::init` here — this test doesn't carry a filesystem
//! module, so it stops short of `terminal::init`/`process::table::init`'s
//! dependents and only exercises the hardware bring-up order itself.

#![no_std]
#![no_main]

use core::panic::PanicInfo;

use terminalos_kernel::arch::x86::{gdt, idt, paging, pic};
use terminalos_kernel::test_framework::{exit_qemu, QemuExitCode};
use terminalos_kernel::{klog, serial_println};

const MULTIBOOT_BOOTLOADER_MAGIC: u32 = 0x2BADB002;

#[no_mangle]
pub extern "C" fn multiboot_entry(magic: u32, _info_addr: u32) -> ! {
    if magic != MULTIBOOT_BOOTLOADER_MAGIC {
        exit_qemu(QemuExitCode::Failed);
    }

    klog::init();
    serial_println!("basic_boot: bringing up gdt/paging/idt/pic");

    gdt::init();
    paging::init();
    idt::init();
    pic::init();

    serial_println!("basic_boot: all subsystems initialized without faulting");
    exit_qemu(QemuExitCode::Success)
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    terminalos_kernel::test_framework::test_panic_handler(info)
}
