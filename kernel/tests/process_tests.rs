//! Exercises the PCB table (spec.md §3) directly: pid allocation and reuse,
//! the fixed stdin/stdout fd binding, and `find_reading_pid`. Like
//! `scheduler_tests`, this needs no hardware bring-up.

#![no_std]
#![no_main]

use core::panic::PanicInfo;

use terminalos_kernel::error::KernelError;
use terminalos_kernel::process::pcb::FileKind;
use terminalos_kernel::process::table;
use terminalos_kernel::test_framework::{exit_qemu, QemuExitCode, Testable};
use terminalos_kernel::serial_println;

const MULTIBOOT_BOOTLOADER_MAGIC: u32 = 0x2BADB002;

#[no_mangle]
pub extern "C" fn multiboot_entry(magic: u32, _info_addr: u32) -> ! {
    if magic != MULTIBOOT_BOOTLOADER_MAGIC {
        exit_qemu(QemuExitCode::Failed);
    }

    table::init();

    let tests: &[&dyn Testable] = &[
        &(allocate_picks_lowest_free_pid as fn() -> Result<(), KernelError>),
        &(freed_pid_is_reused as fn() -> Result<(), KernelError>),
        &(reset_binds_stdin_stdout as fn() -> Result<(), KernelError>),
        &(set_args_truncates_and_terminates as fn() -> Result<(), KernelError>),
        &(kernel_stack_top_is_stable_across_calls as fn() -> Result<(), KernelError>),
        &(find_reading_pid_scans_only_the_given_terminal as fn() -> Result<(), KernelError>),
    ];

    let mut failed = 0;
    for test in tests {
        if test.run().is_err() {
            failed += 1;
        }
    }

    serial_println!("process_tests: {} failed", failed);
    if failed == 0 {
        exit_qemu(QemuExitCode::Success)
    } else {
        exit_qemu(QemuExitCode::Failed)
    }
}

/// spec.md §4.3's allocation rule: the smallest unused pid, not a
/// round-robin counter.
fn allocate_picks_lowest_free_pid() -> Result<(), KernelError> {
    let a = table::allocate_pid()?;
    let b = table::allocate_pid()?;
    let result = if a == 1 && b == 2 { Ok(()) } else { Err(KernelError::BadArgument) };
    table::free_pid(a);
    table::free_pid(b);
    result
}

/// Once six pids are live a seventh allocation must fail, and freeing one
/// must make that exact slot available again.
fn freed_pid_is_reused() -> Result<(), KernelError> {
    let mut pids = [0u8; 6];
    for slot in pids.iter_mut() {
        *slot = table::allocate_pid()?;
    }
    if table::allocate_pid().is_ok() {
        for pid in pids {
            table::free_pid(pid);
        }
        return Err(KernelError::BadArgument);
    }

    table::free_pid(pids[2]);
    let reused = table::allocate_pid()?;
    let ok = reused == pids[2];

    table::free_pid(reused);
    for pid in pids {
        if pid != pids[2] {
            table::free_pid(pid);
        }
    }
    if ok {
        Ok(())
    } else {
        Err(KernelError::BadArgument)
    }
}

/// `reset_for_execute` must bind fd 0 to stdin and fd 1 to stdout and mark
/// every other slot closed (spec.md §3's fixed fd invariant).
fn reset_binds_stdin_stdout() -> Result<(), KernelError> {
    let pid = table::allocate_pid()?;
    table::with_pcb_raw(pid, |p| p.reset_for_execute(pid, 0, 1));

    let (stdin, stdout, fd2) = table::with_pcb(pid, |p| (p.files[0].kind, p.files[1].kind, p.files[2].kind))?;
    table::free_pid(pid);

    if stdin == FileKind::TerminalStdin && stdout == FileKind::TerminalStdout && fd2 == FileKind::Closed {
        Ok(())
    } else {
        Err(KernelError::BadArgument)
    }
}

/// Argument bytes longer than the buffer must be truncated, and the stored
/// length must not include the null terminator `set_args` appends.
fn set_args_truncates_and_terminates() -> Result<(), KernelError> {
    let pid = table::allocate_pid()?;
    table::with_pcb_raw(pid, |p| p.reset_for_execute(pid, 0, 1));

    let long = [b'x'; 64];
    table::with_pcb(pid, |p| p.set_args(&long))?;
    let (args_len, terminator) = table::with_pcb(pid, |p| (p.args_len, p.args[p.args_len]))?;
    table::free_pid(pid);

    if args_len == 31 && terminator == 0 {
        Ok(())
    } else {
        Err(KernelError::BadArgument)
    }
}

/// `kernel_stack_top` must return the same address on every call for a
/// given pid — it backs `tss.esp0` and must not drift while a process is
/// running (spec.md §3's invariant 2).
fn kernel_stack_top_is_stable_across_calls() -> Result<(), KernelError> {
    let pid = table::allocate_pid()?;
    let first = table::kernel_stack_top(pid);
    let second = table::kernel_stack_top(pid);
    table::free_pid(pid);

    if first == second && first != 0 {
        Ok(())
    } else {
        Err(KernelError::BadArgument)
    }
}

/// At most one process per terminal is ever blocked in `terminal_read`
/// (spec.md §4.5); `find_reading_pid` must return that one and ignore
/// processes reading on other terminals.
fn find_reading_pid_scans_only_the_given_terminal() -> Result<(), KernelError> {
    let reader = table::allocate_pid()?;
    let other = table::allocate_pid()?;
    table::with_pcb_raw(reader, |p| {
        p.reset_for_execute(reader, 0, 1);
        p.is_reading = true;
    });
    table::with_pcb_raw(other, |p| {
        p.reset_for_execute(other, 0, 2);
        p.is_reading = true;
    });

    let found_terminal_1 = table::find_reading_pid(1);
    let found_terminal_2 = table::find_reading_pid(2);
    let found_terminal_3 = table::find_reading_pid(3);

    table::free_pid(reader);
    table::free_pid(other);

    if found_terminal_1 == Some(reader) && found_terminal_2 == Some(other) && found_terminal_3.is_none() {
        Ok(())
    } else {
        Err(KernelError::BadArgument)
    }
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    terminalos_kernel::test_framework::test_panic_handler(info)
}
