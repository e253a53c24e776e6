//! Per-process virtual RTC (spec.md §4.7, original `rtc.c`).
//!
//! The hardware runs a single fixed 1024 Hz divider
//! (`arch::x86::rtc_hw::init`); every open virtual RTC gets its own counter
//! that counts hardware ticks up to `1024 / requested_frequency` before
//! `rtc_read` unblocks, so six processes can each run at their own
//! power-of-two rate off the one physical interrupt.

use spin::Mutex;

use crate::arch::x86::rtc_hw::rate_for_frequency;
use crate::error::{KernelError, KernelResult};

const HARDWARE_RATE_HZ: u32 = 1024;
const MAX_VIRTUAL_RTCS: usize = 6;

#[derive(Clone, Copy)]
struct VirtualRtc {
    in_use: bool,
    requested_frequency: u32,
    ticks_remaining: u32,
}

impl VirtualRtc {
    const fn closed() -> Self {
        VirtualRtc { in_use: false, requested_frequency: 2, ticks_remaining: 0 }
    }
}

static VIRTUAL: Mutex<[VirtualRtc; MAX_VIRTUAL_RTCS]> =
    Mutex::new([VirtualRtc::closed(); MAX_VIRTUAL_RTCS]);

/// Opens a virtual RTC at the default 2 Hz (spec.md §4.7's `rtc_open`
/// contract) and returns a handle for `read`/`write`/`close`.
pub fn open() -> KernelResult<usize> {
    let mut table = VIRTUAL.lock();
    let slot = table.iter().position(|v| !v.in_use).ok_or(KernelError::ResourceExhausted)?;
    table[slot] = VirtualRtc {
        in_use: true,
        requested_frequency: 2,
        ticks_remaining: HARDWARE_RATE_HZ / 2,
    };
    Ok(slot)
}

pub fn close(handle: usize) -> KernelResult<()> {
    let mut table = VIRTUAL.lock();
    let v = table.get_mut(handle).ok_or(KernelError::BadArgument)?;
    v.in_use = false;
    Ok(())
}

/// Changes the handle's virtual rate; only power-of-two frequencies from
/// 2 to 1024 are legal (spec.md §4.7).
pub fn write(handle: usize, frequency: u32) -> KernelResult<()> {
    if rate_for_frequency(frequency).is_none() {
        return Err(KernelError::BadArgument);
    }
    let mut table = VIRTUAL.lock();
    let v = table.get_mut(handle).ok_or(KernelError::BadArgument)?;
    if !v.in_use {
        return Err(KernelError::BadArgument);
    }
    v.requested_frequency = frequency;
    v.ticks_remaining = HARDWARE_RATE_HZ / frequency;
    Ok(())
}

/// Blocks until this handle's virtual tick has elapsed (spec.md §9's
/// second documented suspension point).
pub fn read(handle: usize) -> KernelResult<()> {
    loop {
        {
            let table = VIRTUAL.lock();
            let v = table.get(handle).ok_or(KernelError::BadArgument)?;
            if !v.in_use {
                return Err(KernelError::BadArgument);
            }
            if v.ticks_remaining == 0 {
                break;
            }
        }
        crate::arch::x86::port::enable_interrupts();
        crate::arch::x86::port::hlt();
    }
    let mut table = VIRTUAL.lock();
    let v = &mut table[handle];
    v.ticks_remaining = HARDWARE_RATE_HZ / v.requested_frequency;
    Ok(())
}

/// Called from the IRQ8 handler: decrements every open handle's counter
/// (spec.md §4.7's tick law).
pub fn on_hardware_tick() {
    let mut table = VIRTUAL.lock();
    for v in table.iter_mut() {
        if v.in_use && v.ticks_remaining > 0 {
            v.ticks_remaining -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    // `VIRTUAL` is one process-wide static; serialize the tests that touch
    // it so one test's handles don't bleed into another's. `read()` itself
    // is deliberately never called here — its blocking path executes `hlt`,
    // which is only valid from ring 0.
    static SERIAL: Mutex<()> = Mutex::new(());

    fn close_all() {
        for handle in 0..MAX_VIRTUAL_RTCS {
            let _ = close(handle);
        }
    }

    #[test]
    fn open_defaults_to_2_hz() {
        let _guard = SERIAL.lock().unwrap();
        close_all();

        let handle = open().unwrap();
        let ticks = VIRTUAL.lock()[handle].ticks_remaining;
        assert_eq!(ticks, HARDWARE_RATE_HZ / 2);
        close_all();
    }

    #[test]
    fn write_rejects_a_non_power_of_two_frequency() {
        let _guard = SERIAL.lock().unwrap();
        close_all();

        let handle = open().unwrap();
        assert_eq!(write(handle, 3), Err(KernelError::BadArgument));
        close_all();
    }

    #[test]
    fn write_resets_the_tick_counter_for_the_new_rate() {
        let _guard = SERIAL.lock().unwrap();
        close_all();

        let handle = open().unwrap();
        write(handle, 1024).unwrap();
        assert_eq!(VIRTUAL.lock()[handle].ticks_remaining, 1);

        write(handle, 2).unwrap();
        assert_eq!(VIRTUAL.lock()[handle].ticks_remaining, HARDWARE_RATE_HZ / 2);
        close_all();
    }

    #[test]
    fn on_hardware_tick_decrements_every_open_handle_independently() {
        let _guard = SERIAL.lock().unwrap();
        close_all();

        let fast = open().unwrap();
        write(fast, 1024).unwrap();
        let slow = open().unwrap();
        write(slow, 2).unwrap();

        on_hardware_tick();
        assert_eq!(VIRTUAL.lock()[fast].ticks_remaining, 0);
        assert_eq!(VIRTUAL.lock()[slow].ticks_remaining, HARDWARE_RATE_HZ / 2 - 1);
        close_all();
    }

    #[test]
    fn on_hardware_tick_never_underflows_a_spent_counter() {
        let _guard = SERIAL.lock().unwrap();
        close_all();

        let handle = open().unwrap();
        write(handle, 1024).unwrap();
        on_hardware_tick();
        on_hardware_tick();
        assert_eq!(VIRTUAL.lock()[handle].ticks_remaining, 0);
        close_all();
    }

    #[test]
    fn closed_handle_rejects_write() {
        let _guard = SERIAL.lock().unwrap();
        close_all();

        let handle = open().unwrap();
        close(handle).unwrap();
        assert_eq!(write(handle, 2), Err(KernelError::BadArgument));
    }
}
