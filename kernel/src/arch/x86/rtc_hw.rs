//! CMOS real-time clock hardware access (spec.md §2 "RTC driver").
//!
//! Only the register-level plumbing lives here — rate-code selection from a
//! requested frequency and the per-process virtual-RTC demultiplexing are
//! [`crate::rtc`]'s job (spec.md §4.7). Grounded on the original `rtc.c`:
//! register A's low nibble holds the rate divider, register B bit 6 enables
//! the periodic interrupt, and register C must be read after every tick or
//! the controller stops raising IRQ8.

const CMOS_ADDRESS: u16 = 0x70;
const CMOS_DATA: u16 = 0x71;

const REG_A: u8 = 0x8A;
const REG_B: u8 = 0x8B;
const REG_C: u8 = 0x8C;
const NMI_DISABLE: u8 = 0x80;

/// Power-of-two frequency (2..8192 per the chip, spec.md restricts virtual
/// RTCs to 1..1024) to divider-rate mapping. Rate 6 is the fastest the
/// original table uses (1024 Hz); `rate = 16 - log2(freq)` but the original
/// hand-writes the table, so this mirrors it directly instead of computing
/// the log.
pub fn rate_for_frequency(freq_hz: u32) -> Option<u8> {
    let rate = match freq_hz {
        2 => 15,
        4 => 14,
        8 => 13,
        16 => 12,
        32 => 11,
        64 => 10,
        128 => 9,
        256 => 8,
        512 => 7,
        1024 => 6,
        _ => return None,
    };
    Some(rate)
}

fn read_register(reg: u8) -> u8 {
    unsafe {
        super::port::outb_at(CMOS_ADDRESS, reg | NMI_DISABLE);
        super::port::inb_at(CMOS_DATA)
    }
}

fn write_register(reg: u8, value: u8) {
    unsafe {
        super::port::outb_at(CMOS_ADDRESS, reg | NMI_DISABLE);
        super::port::outb_at(CMOS_DATA, value);
    }
}

/// Program the hardware divider to `rate` (6..15, see [`rate_for_frequency`]).
pub fn set_rate(rate: u8) {
    super::port::without_interrupts(|| {
        let previous = read_register(REG_A);
        write_register(REG_A, (previous & 0xF0) | (rate & 0x0F));
    });
}

/// Acknowledge the current tick so the controller keeps raising IRQ8.
/// Must run in the IRQ8 handler before EOI (spec.md §5 ordering note).
pub fn acknowledge_tick() {
    read_register(REG_C);
}

pub fn init() {
    super::port::without_interrupts(|| {
        let previous = read_register(REG_B);
        write_register(REG_B, previous | 0x40);
        // Hardware always ticks at the fastest rate any virtual RTC can
        // request (spec.md §4.7); `crate::rtc` divides down in software
        // rather than reprogramming the divider per process.
        set_rate(rate_for_frequency(1024).expect("1024 Hz is always in the table"));
    });
    acknowledge_tick();
    super::pic::unmask_line(8);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_power_of_two_from_2_to_1024_maps_to_a_rate() {
        assert_eq!(rate_for_frequency(2), Some(15));
        assert_eq!(rate_for_frequency(1024), Some(6));
        assert_eq!(rate_for_frequency(64), Some(10));
    }

    #[test]
    fn rate_decreases_as_frequency_doubles() {
        let rates: Vec<u8> = [2u32, 4, 8, 16, 32, 64, 128, 256, 512, 1024]
            .iter()
            .map(|&f| rate_for_frequency(f).unwrap())
            .collect();
        for pair in rates.windows(2) {
            assert_eq!(pair[1], pair[0] - 1);
        }
    }

    #[test]
    fn non_power_of_two_frequencies_are_rejected() {
        assert_eq!(rate_for_frequency(0), None);
        assert_eq!(rate_for_frequency(3), None);
        assert_eq!(rate_for_frequency(2048), None);
    }
}
