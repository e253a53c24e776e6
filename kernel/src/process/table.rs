//! Process table: the six fixed PCB/kernel-stack slabs (spec.md §3, §9).
//!
//! Redesign note from spec.md §9: rather than computing a PCB's address as
//! `8 MiB − pid × 8 KiB` and casting, each pid owns an explicit
//! [`KernelStackSlab`] in this table; the PCB is the slab's header, the
//! kernel stack is its body, and `esp0` is just "the address one past this
//! slab".

use spin::Mutex;

use crate::error::{KernelError, KernelResult};
use crate::process::pcb::{Pcb, MAX_PROCESSES};

const STACK_BYTES: usize = 8192 - core::mem::size_of::<Pcb>();

#[repr(C)]
struct KernelStackSlab {
    pcb: Pcb,
    stack: [u8; STACK_BYTES],
}

impl KernelStackSlab {
    const fn new() -> Self {
        KernelStackSlab { pcb: Pcb::empty(), stack: [0; STACK_BYTES] }
    }
}

struct Table {
    slabs: [KernelStackSlab; MAX_PROCESSES as usize],
}

static TABLE: Mutex<Table> = Mutex::new(Table {
    slabs: [
        KernelStackSlab::new(),
        KernelStackSlab::new(),
        KernelStackSlab::new(),
        KernelStackSlab::new(),
        KernelStackSlab::new(),
        KernelStackSlab::new(),
    ],
});

pub fn init() {
    log::info!("process: {} pid slots available", MAX_PROCESSES);
}

/// Pids are 1-indexed (spec.md's Testable Property 1 pid range `[1,6]` and
/// the `8 MiB − pid × 8 KiB` PCB-address formula both assume pid ≥ 1); pid 0
/// is reserved as [`super::NO_PARENT`]'s sentinel and never allocated. Slab
/// index `pid - 1` backs pid `pid`.
fn slot(pid: u8) -> Option<usize> {
    if pid == 0 || pid > MAX_PROCESSES {
        None
    } else {
        Some((pid - 1) as usize)
    }
}

/// Claims the lowest-numbered free pid in `1..=MAX_PROCESSES` (spec.md
/// §4.3's "smallest unused pid" allocation rule).
pub fn allocate_pid() -> KernelResult<u8> {
    let mut table = TABLE.lock();
    for idx in 0..MAX_PROCESSES as usize {
        if !table.slabs[idx].pcb.in_use {
            table.slabs[idx].pcb.in_use = true;
            return Ok(idx as u8 + 1);
        }
    }
    Err(KernelError::ResourceExhausted)
}

pub fn free_pid(pid: u8) {
    if let Some(idx) = slot(pid) {
        TABLE.lock().slabs[idx].pcb.in_use = false;
    }
}

/// Top-of-stack address for `pid`'s kernel stack slab — what `tss.esp0`
/// must hold while `pid` is running in ring 3, per spec.md §3's invariant.
pub fn kernel_stack_top(pid: u8) -> u32 {
    let idx = slot(pid).expect("kernel_stack_top called with an out-of-range pid");
    let table = TABLE.lock();
    let slab_ptr = &table.slabs[idx] as *const KernelStackSlab;
    unsafe { (slab_ptr as *const u8).add(core::mem::size_of::<KernelStackSlab>()) as u32 }
}

/// Runs `f` with exclusive access to `pid`'s PCB. Kept as a checked
/// accessor rather than raw pointer arithmetic scattered through the
/// codebase (spec.md §9).
pub fn with_pcb<R>(pid: u8, f: impl FnOnce(&mut Pcb) -> R) -> KernelResult<R> {
    let Some(idx) = slot(pid) else {
        return Err(KernelError::BadArgument);
    };
    let mut table = TABLE.lock();
    let pcb = &mut table.slabs[idx].pcb;
    if !pcb.in_use {
        return Err(KernelError::NotFound);
    }
    Ok(f(pcb))
}

/// Like [`with_pcb`] but does not check `in_use`, for use during the window
/// between `allocate_pid` and `reset_for_execute`.
pub fn with_pcb_raw<R>(pid: u8, f: impl FnOnce(&mut Pcb) -> R) -> R {
    let idx = slot(pid).expect("with_pcb_raw called with an out-of-range pid");
    let mut table = TABLE.lock();
    f(&mut table.slabs[idx].pcb)
}

/// Scans for the in-use process on `terminal_id` currently blocked in
/// `terminal_read` — at most one can be, since only a terminal's leaf
/// process ever runs (spec.md §4.5).
pub fn find_reading_pid(terminal_id: u8) -> Option<u8> {
    let table = TABLE.lock();
    table
        .slabs
        .iter()
        .find(|slab| slab.pcb.in_use && slab.pcb.terminal_id == terminal_id && slab.pcb.is_reading)
        .map(|slab| slab.pcb.pid)
}

/// Raw address of `pid`'s `kernel_return_esp` field, for
/// [`super::context::transfer_to_user`]'s `save_slot` out-parameter. The
/// slab array never moves, so this stays valid for as long as `pid` is
/// in use; no lock is held across the write, matching the single-core
/// cooperative model the rest of this table assumes.
pub fn kernel_return_esp_ptr(pid: u8) -> *mut u32 {
    let idx = slot(pid).expect("kernel_return_esp_ptr called with an out-of-range pid");
    let mut table = TABLE.lock();
    &mut table.slabs[idx].pcb.kernel_return_esp as *mut u32
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    // `TABLE` is one process-wide static; std's test harness runs `#[test]`
    // fns on separate threads by default, so every test here takes this
    // guard first to avoid one test's pids leaking into another's.
    static SERIAL: Mutex<()> = Mutex::new(());

    fn free_all() {
        for pid in 1..=MAX_PROCESSES {
            free_pid(pid);
        }
    }

    #[test]
    fn allocate_picks_lowest_free_pid() {
        let _guard = SERIAL.lock().unwrap();
        free_all();

        let a = allocate_pid().unwrap();
        let b = allocate_pid().unwrap();
        assert_eq!(a, 1);
        assert_eq!(b, 2);
        free_all();
    }

    #[test]
    fn exhausting_all_pids_fails_the_next_allocation() {
        let _guard = SERIAL.lock().unwrap();
        free_all();

        for _ in 0..MAX_PROCESSES {
            allocate_pid().unwrap();
        }
        assert_eq!(allocate_pid(), Err(KernelError::ResourceExhausted));
        free_all();
    }

    #[test]
    fn freeing_a_pid_makes_that_exact_slot_reusable() {
        let _guard = SERIAL.lock().unwrap();
        free_all();

        let pids: Vec<u8> = (0..MAX_PROCESSES).map(|_| allocate_pid().unwrap()).collect();
        free_pid(pids[2]);
        let reused = allocate_pid().unwrap();
        assert_eq!(reused, pids[2]);
        free_all();
    }

    #[test]
    fn with_pcb_rejects_a_pid_not_in_use() {
        let _guard = SERIAL.lock().unwrap();
        free_all();

        assert_eq!(with_pcb(1, |p| p.pid).unwrap_err(), KernelError::NotFound);
    }

    #[test]
    fn with_pcb_rejects_pid_zero_the_no_parent_sentinel() {
        let _guard = SERIAL.lock().unwrap();
        assert_eq!(with_pcb(0, |p| p.pid).unwrap_err(), KernelError::BadArgument);
    }

    #[test]
    fn with_pcb_rejects_an_out_of_range_pid() {
        let _guard = SERIAL.lock().unwrap();
        assert_eq!(with_pcb(MAX_PROCESSES + 1, |p| p.pid).unwrap_err(), KernelError::BadArgument);
    }

    #[test]
    fn kernel_stack_top_is_distinct_and_stable_per_pid() {
        let _guard = SERIAL.lock().unwrap();
        free_all();

        let a = allocate_pid().unwrap();
        let b = allocate_pid().unwrap();
        assert_ne!(kernel_stack_top(a), kernel_stack_top(b));
        assert_eq!(kernel_stack_top(a), kernel_stack_top(a));
        free_all();
    }

    #[test]
    fn find_reading_pid_requires_in_use_and_is_reading() {
        let _guard = SERIAL.lock().unwrap();
        free_all();

        let pid = allocate_pid().unwrap();
        assert_eq!(find_reading_pid(1), None);

        with_pcb_raw(pid, |p| {
            p.reset_for_execute(pid, 0, 1);
            p.is_reading = true;
        });
        assert_eq!(find_reading_pid(1), Some(pid));
        assert_eq!(find_reading_pid(2), None);

        free_all();
        assert_eq!(find_reading_pid(1), None);
    }
}
