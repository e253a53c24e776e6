//! The `execute`/`halt` kernel-frame handoff (spec.md §4.3, §9).
//!
//! `execute_transfer` parks its own call frame mid-function — the `iretd`
//! at its end never falls through to a `ret` the normal way. Later, when
//! the child calls `halt`, `resume_as_return` restores the parked `esp`,
//! pops exactly the registers `execute_transfer` pushed, and `ret`s,
//! landing back in `execute`'s caller with `eax` holding the exit status —
//! indistinguishable from `execute_transfer` having returned normally.
//! `resume_as_return`'s pop order must mirror `execute_transfer`'s push
//! order; if one changes, so must the other.

use core::arch::global_asm;

#[cfg(target_arch = "x86")]
extern "C" {
    /// Builds the ring-3 `iret` frame for `entry`/`user_esp`, records the
    /// post-prologue `esp` into `*save_slot`, and transfers to user mode.
    /// Returns (via `resume_as_return`, not a normal `ret`) the status
    /// passed to the eventual matching `halt`.
    fn execute_transfer(entry: u32, user_esp: u32, save_slot: *mut u32) -> i32;

    /// Restores `esp` and jumps back into the `execute_transfer` call frame
    /// parked at that address, handing it `status` as its return value.
    fn resume_as_return(esp: u32, status: i32) -> !;
}

/// # Safety
/// `entry`/`user_esp` must point into a currently-mapped, executable user
/// page (directory entry 32 already switched, TLB flushed).
#[cfg(target_arch = "x86")]
pub unsafe fn transfer_to_user(entry: u32, user_esp: u32, save_slot: &mut u32) -> i32 {
    execute_transfer(entry, user_esp, save_slot as *mut u32)
}

/// # Safety
/// `esp` must be a value previously written by [`transfer_to_user`]'s
/// `save_slot` for a frame that has not already been resumed.
#[cfg(target_arch = "x86")]
pub unsafe fn resume_parent(esp: u32, status: i32) -> ! {
    resume_as_return(esp, status)
}

// Host builds link `process::execute`/`halt` for their pure bookkeeping
// (pid allocation, PCB reset) but never actually cross into ring 3.
#[cfg(not(target_arch = "x86"))]
pub unsafe fn transfer_to_user(_entry: u32, _user_esp: u32, _save_slot: &mut u32) -> i32 {
    unimplemented!("ring-3 transfer only runs on the real 32-bit target")
}

#[cfg(not(target_arch = "x86"))]
pub unsafe fn resume_parent(_esp: u32, _status: i32) -> ! {
    unimplemented!("ring-3 transfer only runs on the real 32-bit target")
}

#[cfg(target_arch = "x86")]
global_asm!(
    r#"
.section .text
.global execute_transfer
execute_transfer:
    push ebp
    mov ebp, esp
    push ebx
    push esi
    push edi

    mov eax, [ebp+16]
    mov [eax], esp

    mov ecx, [ebp+8]
    mov edx, [ebp+12]

    push 0x23
    push edx
    pushfd
    or dword ptr [esp], 0x200
    push 0x1B
    push ecx

    mov ax, 0x23
    mov ds, ax
    mov es, ax
    mov fs, ax
    mov gs, ax
    iretd

.global resume_as_return
resume_as_return:
    mov eax, [esp+8]
    mov ecx, [esp+4]
    mov esp, ecx
    pop edi
    pop esi
    pop ebx
    pop ebp
    ret
"#
);
