//! Preemptive round-robin scheduler (spec.md §4.4).
//!
//! Only one process per terminal is ever runnable at a time — the leaf of
//! that terminal's `execute` call chain — so this is a round-robin over (up
//! to) three leaves, not over all six possible processes. The actual
//! context switch is a stack-pointer swap performed by the PIT interrupt
//! stub in `arch::x86::idt`; this module only decides *which* `esp` to
//! switch to.

use spin::Mutex;

use crate::arch::x86::{gdt, paging};
use crate::process::{memory, table};
use crate::terminal::NUM_TERMINALS;

struct State {
    current_terminal: u8,
    current_pid: Option<u8>,
    leaf: [Option<u8>; NUM_TERMINALS as usize],
}

static STATE: Mutex<State> = Mutex::new(State {
    current_terminal: 0,
    current_pid: None,
    leaf: [None; NUM_TERMINALS as usize],
});

pub fn init() {
    log::info!("sched: round-robin over {} terminals", NUM_TERMINALS);
}

/// The pid the CPU is currently executing, if any — used by
/// `syscall::dispatch` to know whose syscall it's servicing.
pub fn current_pid() -> Option<u8> {
    STATE.lock().current_pid
}

/// Records `pid` as the newly-running leaf for `terminal_id`
/// (1-indexed, per spec.md §4.5) — called by `process::execute` right
/// before the ring-3 transfer, and by `process::halt` right before
/// resuming the parent.
pub fn set_running(terminal_id: u8, pid: u8) {
    let mut state = STATE.lock();
    let idx = (terminal_id - 1) as usize;
    state.leaf[idx] = Some(pid);
    state.current_terminal = idx as u8;
    state.current_pid = Some(pid);
}

/// The pid currently scheduled as `terminal_id`'s leaf, if any — used by
/// `terminal::switch_to` to decide whether switching to a terminal needs to
/// auto-spawn a shell (spec.md §4.5/S4).
pub fn leaf_pid(terminal_id: u8) -> Option<u8> {
    STATE.lock().leaf[(terminal_id - 1) as usize]
}

/// Clears `terminal_id`'s leaf slot — called when its root shell halts and
/// the terminal has nothing left running (spec.md §4.3's teardown case).
pub fn clear_terminal(terminal_id: u8) {
    let mut state = STATE.lock();
    let idx = (terminal_id - 1) as usize;
    state.leaf[idx] = None;
    if state.current_pid.is_some() && state.current_terminal == idx as u8 {
        state.current_pid = None;
    }
}

/// Any terminal other than `exclude` that still has a leaf running, if one
/// exists — used by `process::halt`'s root-shell teardown to pick a
/// terminal to switch the display to (spec.md §4.3, grounded on the
/// original `halt`'s scan over `open_terminals`).
pub fn any_other_running_terminal(exclude: u8) -> Option<u8> {
    let state = STATE.lock();
    (1..=NUM_TERMINALS).find(|&id| id != exclude && state.leaf[(id - 1) as usize].is_some())
}

/// Called from the PIT interrupt stub with the `esp` of the
/// just-interrupted process's saved register block. Returns the `esp` to
/// switch to, or 0 to leave the current stack running (spec.md §4.4 steps
/// 1–6: record the tick, pick the next ready terminal, hand back its saved
/// context).
pub fn on_timer_tick(current_esp: u32) -> u32 {
    let mut state = STATE.lock();

    if let Some(pid) = state.current_pid {
        let _ = table::with_pcb(pid, |p| p.scheduler_esp = current_esp);
    }

    let start = state.current_terminal;
    for offset in 1..=NUM_TERMINALS {
        let idx = ((start as u32 + offset as u32) % NUM_TERMINALS as u32) as usize;
        let Some(pid) = state.leaf[idx] else { continue };
        if Some(pid) == state.current_pid {
            continue;
        }
        let esp = table::with_pcb(pid, |p| p.scheduler_esp).unwrap_or(0);
        if esp != 0 {
            state.current_terminal = idx as u8;
            state.current_pid = Some(pid);
            let terminal_id = idx as u8 + 1;
            drop(state);

            // spec.md §4.4 step 5: repoint directory entry 32 at the new
            // leaf's frame and update `tss.esp0`, so Testable Property 2
            // holds for preemptive switches too, not just `execute`/`halt`.
            gdt::set_kernel_stack(table::kernel_stack_top(pid));
            // SAFETY: `memory::frame_phys_addr(pid)` is a 4 KiB-aligned
            // frame reserved for `pid`'s exclusive use for as long as it is
            // allocated, which it is here.
            unsafe { paging::map_user_page(memory::frame_phys_addr(pid)) };

            // spec.md §4.4 step 4: repoint the vidmap window (entry 64) at
            // this terminal's current backing store.
            // SAFETY: `video_phys_base` returns either the live framebuffer
            // or a shadow, both identity-mapped 4 KiB-aligned regions that
            // outlive this call.
            unsafe { paging::map_video_page(crate::terminal::video_phys_base(terminal_id)) };

            return esp;
        }
    }
    0
}
