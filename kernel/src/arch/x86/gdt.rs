//! Global descriptor table and task-state segment.
//!
//! Out of scope per spec.md §1 ("GDT/LDT/TSS/IDT descriptor table layouts
//! ... specified only where they touch the core") beyond the one thing that
//! does touch the core: `tss.esp0` must always point at the running
//! process's kernel-stack top (spec.md §4.4 invariant), so [`set_kernel_stack`]
//! is the one piece of this module the rest of the kernel calls directly.

use lazy_static::lazy_static;
use x86::bits32::task::TaskStateSegment;
use x86::dtables::{lgdt, DescriptorTablePointer};
use x86::segmentation::{
    BuildDescriptor, CodeSegmentType, DataSegmentType, Descriptor, DescriptorBuilder,
    SegmentDescriptorBuilder,
};
use x86::Ring;

const GDT_ENTRIES: usize = 6;

struct Gdt {
    table: [Descriptor; GDT_ENTRIES],
}

impl Gdt {
    const fn new() -> Self {
        Gdt {
            table: [Descriptor::NULL; GDT_ENTRIES],
        }
    }
}

lazy_static! {
    static ref TSS: spin::Mutex<TaskStateSegment> = {
        let mut tss = TaskStateSegment::new();
        tss.ss0 = super::KERNEL_DS;
        spin::Mutex::new(tss)
    };

    static ref GDT: Gdt = {
        let mut gdt = Gdt::new();
        gdt.table[1] = <DescriptorBuilder as BuildDescriptor<CodeSegmentType>>::finish(
            &DescriptorBuilder::code_descriptor(0, 0xFFFFF, x86::segmentation::SegmentDescriptorBuilder::Flat)
                .present()
                .dpl(Ring::Ring0)
                .limit_granularity_4kb(),
        );
        gdt.table[2] = <DescriptorBuilder as BuildDescriptor<DataSegmentType>>::finish(
            &DescriptorBuilder::data_descriptor(0, 0xFFFFF)
                .present()
                .dpl(Ring::Ring0)
                .limit_granularity_4kb(),
        );
        gdt.table[3] = <DescriptorBuilder as BuildDescriptor<CodeSegmentType>>::finish(
            &DescriptorBuilder::code_descriptor(0, 0xFFFFF, x86::segmentation::SegmentDescriptorBuilder::Flat)
                .present()
                .dpl(Ring::Ring3)
                .limit_granularity_4kb(),
        );
        gdt.table[4] = <DescriptorBuilder as BuildDescriptor<DataSegmentType>>::finish(
            &DescriptorBuilder::data_descriptor(0, 0xFFFFF)
                .present()
                .dpl(Ring::Ring3)
                .limit_granularity_4kb(),
        );

        let tss_ptr = &*TSS.lock() as *const TaskStateSegment as u32;
        let tss_limit = core::mem::size_of::<TaskStateSegment>() as u32 - 1;
        gdt.table[5] = <DescriptorBuilder as BuildDescriptor<x86::segmentation::SystemDescriptorTypes32>>::finish(
            &DescriptorBuilder::tss_descriptor(tss_ptr, tss_limit, true)
                .present()
                .dpl(Ring::Ring0),
        );
        gdt
    };
}

/// Reload segment registers and load the GDT/TSS. Called once from
/// [`crate::kernel_main`] before the IDT is installed.
#[cfg(target_arch = "x86")]
pub fn init() {
    let ptr = DescriptorTablePointer::new_from_slice(&GDT.table);
    unsafe {
        lgdt(&ptr);
        reload_segments();
        x86::task::load_tr(x86::segmentation::SegmentSelector::new(5, Ring::Ring0));
    }
}

// Host builds never actually load a GDT; keeping the GDT/TSS statics
// buildable and `set_kernel_stack` callable is enough for process/terminal
// logic to be unit-tested without a real descriptor table loaded.
#[cfg(not(target_arch = "x86"))]
pub fn init() {}

/// Update `tss.esp0` to point at `pid`'s kernel-stack top.
///
/// Must be called on every process switch before any ring-3→ring-0
/// transition (spec.md §4.4 invariant 2); [`super::super::super::sched`]
/// calls this from the tick handler and `process::loader::execute`.
pub fn set_kernel_stack(esp0: u32) {
    TSS.lock().esp0 = esp0;
}

/// # Safety
/// Must run with the new GDT already loaded; reloads every segment
/// register and far-jumps into the new code segment.
#[cfg(target_arch = "x86")]
unsafe fn reload_segments() {
    core::arch::asm!(
        "mov ax, {ds}",
        "mov ds, ax",
        "mov es, ax",
        "mov fs, ax",
        "mov gs, ax",
        "mov ss, ax",
        "push {cs}",
        "lea eax, [2f]",
        "push eax",
        "retf",
        "2:",
        ds = const 0x10u16,
        cs = const 0x08u16,
        out("eax") _,
        options(nostack),
    );
}
