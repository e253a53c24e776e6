//! Process lifecycle: `execute`/`halt` (spec.md §4.3) built on top of the
//! fixed PCB table, the program loader, and the raw kernel-frame handoff in
//! [`context`].

mod context;
pub mod loader;
pub mod memory;
pub mod pcb;
pub mod table;

use crate::arch::x86::{gdt, paging};
use crate::error::{KernelError, KernelResult};

const MAX_ARGS_IN_CMD: usize = 128;

/// Sentinel `parent_pid` for a terminal's root shell — spawned by
/// `execute_root`, not by another process, so there is no PCB to resume
/// into when it halts (spec.md §4.3, original `execute`'s
/// `current_pcb == 0x0` boot case). Never allocated by
/// [`table::allocate_pid`].
pub const NO_PARENT: u8 = 0;

/// Splits `cmd` into a program name and an argument tail, as `sys_execute`
/// does before opening the file (spec.md §4.3 step 1).
fn split_command(cmd: &str) -> (&str, &str) {
    let cmd = cmd.trim();
    match cmd.find(' ') {
        Some(idx) => (&cmd[..idx], cmd[idx + 1..].trim_start()),
        None => (cmd, ""),
    }
}

/// Spawns `cmd` as a new process on `terminal_id` parented to `parent_pid`
/// ([`NO_PARENT`] for a terminal's root shell) and performs the ring-3
/// transfer, writing the parked return `esp` into `*save_slot`. Shared
/// plumbing behind [`execute`] and [`execute_root`] (spec.md §4.3 steps
/// 1–6).
fn spawn_and_transfer(parent_pid: u8, terminal_id: u8, cmd: &str, save_slot: &mut u32) -> KernelResult<i32> {
    let cmd = cmd.trim();
    if cmd.is_empty() || cmd.len() > MAX_ARGS_IN_CMD {
        return Err(KernelError::BadArgument);
    }
    let (program, args) = split_command(cmd);

    let child_pid = table::allocate_pid()?;

    // `loader::load_program` writes through whatever directory entry 32
    // currently maps, so the child's frame must be in place *before* the
    // load, not after — otherwise the image lands in the caller's memory.
    // SAFETY: `child_pid` was just reserved and owns a private frame in
    // process::memory that nothing else touches directory entry 32 for
    // the duration of this call.
    unsafe {
        paging::map_user_page(memory::frame_phys_addr(child_pid));
    }

    let image = match loader::load_program(program) {
        Ok(image) => image,
        Err(e) => {
            table::free_pid(child_pid);
            return Err(e);
        }
    };

    table::with_pcb_raw(child_pid, |p| {
        p.reset_for_execute(child_pid, parent_pid, terminal_id);
        p.set_args(args.as_bytes());
    });

    gdt::set_kernel_stack(table::kernel_stack_top(child_pid));
    crate::sched::set_running(terminal_id, child_pid);

    // SAFETY: the user page now backs `child_pid`'s freshly loaded image
    // and the stack pointer sits inside the same mapped region; `save_slot`
    // is valid for the duration of this call.
    Ok(unsafe { context::transfer_to_user(image.entry_point, image.user_stack_top, save_slot) })
}

/// Runs `cmd` as a child of `caller_pid` on `caller_pid`'s terminal,
/// blocking the caller until the child `halt`s, and returns the child's
/// exit status (spec.md §4.3).
///
/// Implemented as a real ring-0→ring-3→ring-0 round trip: this call does
/// not return in the ordinary sense until a *different* invocation of the
/// syscall path (the child's `halt`) unparks it via [`context::resume_parent`].
pub fn execute(caller_pid: u8, cmd: &str) -> KernelResult<i32> {
    let terminal_id = table::with_pcb(caller_pid, |p| p.terminal_id)?;

    // `save_slot` points directly at `caller_pid`'s own PCB field — `halt`
    // recovers it later via the child's recorded `parent_pid`, not through
    // any value kept on this stack frame.
    let save_slot = table::kernel_return_esp_ptr(caller_pid);
    // SAFETY: `save_slot` is valid for as long as `caller_pid` stays
    // allocated, which it does for the whole of this call.
    let status = spawn_and_transfer(caller_pid, terminal_id, cmd, unsafe { &mut *save_slot })?;

    gdt::set_kernel_stack(table::kernel_stack_top(caller_pid));
    Ok(status)
}

/// Spawns `cmd` as `terminal_id`'s root process: no caller process exists
/// to resume into, so the returned status (if this ever returns at all) is
/// discarded. Used for the boot-time first shell and to auto-spawn a fresh
/// shell the first time a terminal with nothing scheduled is switched to
/// (spec.md §8 S1, §4.5 S4; grounded on the original `execute`'s
/// `current_pcb == 0x0` boot case and `switch_terminal`'s synchronous
/// `execute("shell")`).
pub fn execute_root(terminal_id: u8, cmd: &str) -> KernelResult<i32> {
    let mut discarded_save_slot = 0u32;
    spawn_and_transfer(NO_PARENT, terminal_id, cmd, &mut discarded_save_slot)
}

/// Terminates the calling process with `status` and hands control back to
/// its parent's parked `execute` call, or, if `caller_pid` is a terminal's
/// root shell, tears the terminal down and switches the display elsewhere
/// (spec.md §4.3, original `halt`'s `current_pcb->pid ==
/// open_terminals[terminal_id]` branch).
pub fn halt(caller_pid: u8, status: i32) -> ! {
    let (parent_pid, terminal_id) = table::with_pcb(caller_pid, |p| (p.parent_pid, p.terminal_id))
        .expect("halt called from an unregistered pid");

    table::free_pid(caller_pid);

    if parent_pid == NO_PARENT {
        crate::sched::clear_terminal(terminal_id);
        crate::terminal::clear(terminal_id);
        if let Some(other) = crate::sched::any_other_running_terminal(terminal_id) {
            crate::terminal::switch_to(other);
        }
        loop {
            crate::arch::x86::port::enable_interrupts();
            crate::arch::x86::port::hlt();
        }
    }

    let kernel_return_esp = table::with_pcb(parent_pid, |p| p.kernel_return_esp)
        .expect("halting process's parent pcb is missing");

    gdt::set_kernel_stack(table::kernel_stack_top(parent_pid));
    crate::sched::set_running(terminal_id, parent_pid);

    // SAFETY: `kernel_return_esp` was written by the matching `execute`'s
    // call to `context::transfer_to_user` and has not been reused since.
    unsafe { context::resume_parent(kernel_return_esp, status) }
}
