//! Cascaded 8259 PIC driver (spec.md §4.8).
//!
//! Cascade bring-up (ICW1-4) is the `pic8259` crate's job, same as the
//! teacher depends on. Per-line mask/unmask and the dual-EOI-for-slave-
//! lines behavior are spec-mandated and not exposed by that crate's safe
//! API, so they talk to the command/data ports directly, grounded on the
//! original `i8259.c`.

use pic8259::ChainedPics;
use spin::Mutex;

const MASTER_CMD: u16 = 0x20;
const MASTER_DATA: u16 = 0x21;
const SLAVE_CMD: u16 = 0xA0;
const SLAVE_DATA: u16 = 0xA1;

/// Master's vector offset; lines 0..7 land on 0x20..0x27.
pub const PIC1_OFFSET: u8 = 0x20;
/// Slave's vector offset; lines 8..15 land on 0x28..0x2F.
pub const PIC2_OFFSET: u8 = 0x28;

static PICS: Mutex<ChainedPics> =
    Mutex::new(unsafe { ChainedPics::new(PIC1_OFFSET, PIC2_OFFSET) });

pub fn init() {
    unsafe { PICS.lock().initialize() };
    // Start fully masked; individual drivers (pit, keyboard, rtc_hw) unmask
    // their own line once they are ready to take interrupts.
    mask_line(0);
    mask_line(1);
    mask_line(2);
    mask_line(8);
}

/// Unmask (enable) a single IRQ line, 0..15.
pub fn unmask_line(line: u8) {
    set_mask_bit(line, false);
}

/// Mask (disable) a single IRQ line, 0..15.
pub fn mask_line(line: u8) {
    set_mask_bit(line, true);
}

fn set_mask_bit(line: u8, masked: bool) {
    let (port, bit) = if line < 8 {
        (MASTER_DATA, line)
    } else {
        (SLAVE_DATA, line - 8)
    };
    unsafe {
        let current = super::port::inb_at(port);
        let updated = if masked {
            current | (1 << bit)
        } else {
            current & !(1 << bit)
        };
        super::port::outb_at(port, updated);
    }
}

/// Acknowledge an interrupt on `line` (0..15). Lines 8..15 need EOI sent to
/// both PICs, with the master's cascade bit (line 2) also set.
pub fn send_eoi(line: u8) {
    const EOI: u8 = 0x20;
    unsafe {
        if line >= 8 {
            super::port::outb_at(SLAVE_CMD, EOI);
        }
        super::port::outb_at(MASTER_CMD, EOI);
    }
}
