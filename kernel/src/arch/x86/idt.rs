//! Interrupt descriptor table.
//!
//! Descriptor layout, gate types, and the exception handlers that merely
//! print and halt are out of scope (spec.md §1); what matters to the core
//! is that IRQ0/IRQ1/IRQ8 and `int 0x80` reach [`crate::sched`],
//! [`crate::keyboard`], [`crate::rtc`], and [`crate::syscall`] respectively.

#[cfg(target_arch = "x86")]
use lazy_static::lazy_static;
#[cfg(target_arch = "x86")]
use x86::bits32::irq::IdtEntry;
#[cfg(target_arch = "x86")]
use x86::dtables::{lidt, DescriptorTablePointer};

const IDT_ENTRIES: usize = 256;

/// Vector assignments (spec.md §5, §6).
pub const VEC_TIMER: u8 = 0x20;
pub const VEC_KEYBOARD: u8 = 0x21;
pub const VEC_RTC: u8 = 0x28;
pub const VEC_SYSCALL: u8 = 0x80;

#[cfg(target_arch = "x86")]
struct Idt([IdtEntry; IDT_ENTRIES]);

#[cfg(target_arch = "x86")]
unsafe impl Send for Idt {}
#[cfg(target_arch = "x86")]
unsafe impl Sync for Idt {}

#[cfg(target_arch = "x86")]
lazy_static! {
    static ref IDT: Idt = {
        let mut idt = Idt([IdtEntry::MISSING; IDT_ENTRIES]);

        idt.0[0] = gate(divide_error as usize);
        idt.0[6] = gate(invalid_opcode as usize);
        idt.0[8] = gate(double_fault as usize);
        idt.0[13] = gate(general_protection_fault as usize);
        idt.0[14] = gate(page_fault as usize);

        idt.0[VEC_TIMER as usize] = gate(timer_interrupt_stub as usize);
        idt.0[VEC_KEYBOARD as usize] = gate(keyboard_interrupt_stub as usize);
        idt.0[VEC_RTC as usize] = gate(rtc_interrupt_stub as usize);
        idt.0[VEC_SYSCALL as usize] = user_gate(syscall_interrupt_stub as usize);

        idt
    };
}

#[cfg(target_arch = "x86")]
fn gate(handler: usize) -> IdtEntry {
    IdtEntry::new(
        handler as u32,
        super::KERNEL_CS,
        x86::Ring::Ring0,
        false,
    )
}

/// The syscall gate alone is reachable from ring 3 (`int 0x80` from user code).
#[cfg(target_arch = "x86")]
fn user_gate(handler: usize) -> IdtEntry {
    IdtEntry::new(handler as u32, super::KERNEL_CS, x86::Ring::Ring3, false)
}

#[cfg(target_arch = "x86")]
pub fn init() {
    let ptr = DescriptorTablePointer::new(&IDT.0);
    unsafe { lidt(&ptr) };
}

// Host builds never install a real IDT; the rest of the kernel's pure
// logic is still reachable without one.
#[cfg(not(target_arch = "x86"))]
pub fn init() {}

// Exception handlers: print the interrupt frame and halt (spec.md §1's "The
// exception handlers that merely print diagnostic text and halt").

extern "x86-interrupt" fn divide_error(frame: x86::irq::InterruptStackFrame) {
    fatal("divide error", &frame, None);
}

extern "x86-interrupt" fn invalid_opcode(frame: x86::irq::InterruptStackFrame) {
    fatal("invalid opcode", &frame, None);
}

extern "x86-interrupt" fn double_fault(frame: x86::irq::InterruptStackFrame, code: u64) -> ! {
    fatal("double fault", &frame, Some(code));
    loop {
        super::port::hlt();
    }
}

extern "x86-interrupt" fn general_protection_fault(frame: x86::irq::InterruptStackFrame, code: u64) {
    fatal("general protection fault", &frame, Some(code));
}

extern "x86-interrupt" fn page_fault(frame: x86::irq::InterruptStackFrame, code: u64) {
    fatal("page fault", &frame, Some(code));
}

fn fatal(name: &str, frame: &x86::irq::InterruptStackFrame, code: Option<u64>) {
    log::error!("exception: {name} code={code:?} frame={frame:?}");
    super::port::disable_interrupts();
    loop {
        super::port::hlt();
    }
}

// IRQ/syscall entry points. These are thin `#[naked]` trampolines: the
// x86-interrupt ABI does not expose general-purpose registers, and the
// syscall gate needs eax/ebx/ecx/edx (spec.md §6's ABI) plus the ability to
// push a fabricated `iret` frame for `execute`, so both the IRQ handlers and
// the syscall gate save/restore registers by hand before calling into safe
// Rust dispatch functions.

#[cfg(target_arch = "x86")]
extern "C" {
    fn timer_interrupt_stub();
    fn keyboard_interrupt_stub();
    fn rtc_interrupt_stub();
    fn syscall_interrupt_stub();
}

#[cfg(target_arch = "x86")]
core::arch::global_asm!(
    "
    .global timer_interrupt_stub
    timer_interrupt_stub:
        pusha
        push esp
        call timer_interrupt_handler
        add esp, 4
        test eax, eax
        jz 2f
        mov esp, eax
    2:
        popa
        iretd

    .global keyboard_interrupt_stub
    keyboard_interrupt_stub:
        pusha
        call keyboard_interrupt_handler
        popa
        iretd

    .global rtc_interrupt_stub
    rtc_interrupt_stub:
        pusha
        call rtc_interrupt_handler
        popa
        iretd

    .global syscall_interrupt_stub
    syscall_interrupt_stub:
        push ebp
        mov ebp, esp
        push edx
        push ecx
        push ebx
        push eax
        call syscall_dispatch_trampoline
        add esp, 16
        pop ebp
        iretd
    "
);

/// `current_esp` is the stack address of the `pusha`-saved register block
/// for the process that was just interrupted. Returns the kernel `esp` to
/// switch to, or 0 to resume the interrupted stack unchanged (spec.md
/// §4.4's round-robin tick) — the asm trampoline only overwrites `esp`
/// when this is nonzero, so the no-op case never disturbs the current
/// stack.
#[no_mangle]
extern "C" fn timer_interrupt_handler(current_esp: u32) -> u32 {
    let next_esp = crate::sched::on_timer_tick(current_esp);
    crate::arch::x86::pic::send_eoi(0);
    next_esp
}

#[no_mangle]
extern "C" fn keyboard_interrupt_handler() {
    crate::keyboard::on_scancode(unsafe { super::port::inb_at(0x60) });
    crate::arch::x86::pic::send_eoi(1);
}

#[no_mangle]
extern "C" fn rtc_interrupt_handler() {
    super::rtc_hw::acknowledge_tick();
    crate::rtc::on_hardware_tick();
    crate::arch::x86::pic::send_eoi(8);
}

/// Called from the asm trampoline with `eax`=call number, `ebx,ecx,edx`=args
/// (spec.md §6). Returns the value the trampoline writes back into `eax`
/// for the `iretd` to hand to the caller.
#[no_mangle]
extern "C" fn syscall_dispatch_trampoline(eax: u32, ebx: u32, ecx: u32, edx: u32) -> u32 {
    crate::syscall::dispatch(eax, ebx, ecx, edx) as u32
}
