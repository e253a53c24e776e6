//! Exercises the round-robin leaf scheduler (spec.md §4.4) against the real
//! process table — no hardware bring-up needed, `sched::on_timer_tick` and
//! `process::table` are pure data structures behind `spin::Mutex`.

#![no_std]
#![no_main]

use core::panic::PanicInfo;

use terminalos_kernel::error::KernelError;
use terminalos_kernel::process::table;
use terminalos_kernel::test_framework::{exit_qemu, QemuExitCode, Testable};
use terminalos_kernel::{sched, serial_println};

const MULTIBOOT_BOOTLOADER_MAGIC: u32 = 0x2BADB002;

#[no_mangle]
pub extern "C" fn multiboot_entry(magic: u32, _info_addr: u32) -> ! {
    if magic != MULTIBOOT_BOOTLOADER_MAGIC {
        exit_qemu(QemuExitCode::Failed);
    }

    table::init();
    sched::init();

    let tests: &[&dyn Testable] = &[
        &(single_leaf_never_switches as fn() -> Result<(), KernelError>),
        &(round_robins_between_two_leaves as fn() -> Result<(), KernelError>),
        &(idle_terminal_is_skipped as fn() -> Result<(), KernelError>),
    ];

    let mut failed = 0;
    for test in tests {
        if test.run().is_err() {
            failed += 1;
        }
    }

    serial_println!("scheduler_tests: {} failed", failed);
    if failed == 0 {
        exit_qemu(QemuExitCode::Success)
    } else {
        exit_qemu(QemuExitCode::Failed)
    }
}

/// With only one terminal ever marked running, the tick handler has nobody
/// else to switch to and must return 0 (spec.md §4.4 step 6's "no other
/// ready terminal" case).
fn single_leaf_never_switches() -> Result<(), KernelError> {
    let pid = table::allocate_pid()?;
    table::with_pcb_raw(pid, |p| p.reset_for_execute(pid, pid, 1));
    sched::set_running(1, pid);

    let next = sched::on_timer_tick(0x1000);
    table::free_pid(pid);
    if next != 0 {
        return Err(KernelError::BadArgument);
    }
    Ok(())
}

/// Two terminals each with a runnable leaf: a tick on one must hand back
/// the other's last recorded `esp`, and the next tick must hand back the
/// first's, in round-robin order (spec.md §4.4).
fn round_robins_between_two_leaves() -> Result<(), KernelError> {
    let pid_a = table::allocate_pid()?;
    let pid_b = table::allocate_pid()?;
    table::with_pcb_raw(pid_a, |p| p.reset_for_execute(pid_a, pid_a, 1));
    table::with_pcb_raw(pid_b, |p| p.reset_for_execute(pid_b, pid_b, 2));

    table::with_pcb(pid_b, |p| p.scheduler_esp = 0x2000)?;
    sched::set_running(1, pid_a);

    let first = sched::on_timer_tick(0x1000);
    if first != 0x2000 {
        table::free_pid(pid_a);
        table::free_pid(pid_b);
        return Err(KernelError::BadArgument);
    }

    table::with_pcb(pid_a, |p| p.scheduler_esp = 0x1000)?;
    let second = sched::on_timer_tick(0x2000);

    table::free_pid(pid_a);
    table::free_pid(pid_b);

    if second != 0x1000 {
        return Err(KernelError::BadArgument);
    }
    Ok(())
}

/// A terminal with no leaf recorded yet (its process hasn't called
/// `execute` since boot) must be skipped, not handed back as a bogus
/// `esp` of 0.
fn idle_terminal_is_skipped() -> Result<(), KernelError> {
    let pid = table::allocate_pid()?;
    table::with_pcb_raw(pid, |p| p.reset_for_execute(pid, pid, 3));
    table::with_pcb(pid, |p| p.scheduler_esp = 0x3000)?;
    sched::set_running(3, pid);

    let next = sched::on_timer_tick(0x9000);
    table::free_pid(pid);

    if next != 0 {
        return Err(KernelError::BadArgument);
    }
    Ok(())
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    terminalos_kernel::test_framework::test_panic_handler(info)
}
