//! Per-process backing storage for the user region (spec.md §6).
//!
//! Six fixed frames, one per pid slot, swapped into directory entry 32's
//! page table on every `execute`/context switch by
//! [`crate::arch::x86::paging::map_user_page`].

use crate::arch::x86::paging::USER_REGION_BYTES;
use crate::process::pcb::MAX_PROCESSES;

#[repr(align(4096))]
struct UserFrame([u8; USER_REGION_BYTES as usize]);

static mut USER_FRAMES: [UserFrame; MAX_PROCESSES as usize] = [
    UserFrame([0; USER_REGION_BYTES as usize]),
    UserFrame([0; USER_REGION_BYTES as usize]),
    UserFrame([0; USER_REGION_BYTES as usize]),
    UserFrame([0; USER_REGION_BYTES as usize]),
    UserFrame([0; USER_REGION_BYTES as usize]),
    UserFrame([0; USER_REGION_BYTES as usize]),
];

/// `pid` is 1-indexed (spec.md's pid range `[1,6]`); frame `pid - 1` backs it.
pub fn frame_phys_addr(pid: u8) -> u32 {
    unsafe { USER_FRAMES[(pid - 1) as usize].0.as_ptr() as u32 }
}
