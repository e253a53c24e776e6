//! 32-bit x86 architecture glue: everything that talks to real hardware.
//!
//! Brought up in the order `lib.rs::kernel_main` calls it: GDT/TSS before
//! IDT (the IDT's task gates reference GDT selectors), IDT before PIC/PIT/
//! RTC (their handlers must already be reachable before anything unmasks
//! them).

pub mod gdt;
pub mod idt;
pub mod multiboot;
pub mod paging;
pub mod pic;
pub mod pit;
pub mod port;
pub mod rtc_hw;
pub mod serial;
pub mod vga;

/// Kernel code segment selector (spec.md §6).
pub const KERNEL_CS: u16 = 0x08;
/// Kernel data/stack segment selector.
pub const KERNEL_DS: u16 = 0x10;
/// User code segment selector, already OR'd with RPL 3.
pub const USER_CS: u16 = 0x1B;
/// User data/stack segment selector, already OR'd with RPL 3.
pub const USER_DS: u16 = 0x23;
