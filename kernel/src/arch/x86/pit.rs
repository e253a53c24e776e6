//! Programmable interval timer driver (spec.md §2 "PIT driver").
//!
//! Arms channel 0 for periodic interrupts that drive the scheduler tick.
//! Grounded on the original `pit.c`'s `start_pit`: mode/command byte 0x36
//! (channel 0, lobyte/hibyte access, mode 3 square wave, binary) written to
//! the command port, then the reload value split across the two data-port
//! writes.

const CMD_PORT: u16 = 0x43;
const CHANNEL0_PORT: u16 = 0x40;
const BASE_FREQUENCY_HZ: u32 = 1_193_182;

/// Scheduler tick rate (spec.md §4.4 leaves the exact rate to the
/// implementation; 100 Hz gives a responsive round robin without dominating
/// interrupt time).
pub const TICK_HZ: u32 = 100;

pub fn init() {
    let reload = (BASE_FREQUENCY_HZ / TICK_HZ) as u16;
    unsafe {
        super::port::outb_at(CMD_PORT, 0x36);
        super::port::outb_at(CHANNEL0_PORT, (reload & 0xFF) as u8);
        super::port::outb_at(CHANNEL0_PORT, (reload >> 8) as u8);
    }
    super::pic::unmask_line(0);
}
