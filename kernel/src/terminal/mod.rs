//! Three-way virtual terminal multiplexer over one physical screen
//! (spec.md §4.5, original `terminal.c`).
//!
//! Exactly one terminal is ever "foreground": its content lives at the
//! live VGA buffer (`0xB8000`) and its cursor drives the hardware cursor.
//! The other two keep their content in shadow framebuffers
//! (`arch::x86::vga::shadow_writer`) and are brought back to the live
//! buffer, cursor and all, on the next switch.

use spin::Mutex;

use crate::arch::x86::vga::{self, Writer};
use crate::error::{KernelError, KernelResult};
use crate::process::table;

pub const NUM_TERMINALS: u8 = 3;

struct Terminals {
    foreground: u8,
    shadow: [Writer; NUM_TERMINALS as usize],
}

// SAFETY: `Writer` is `Send`; the array is only ever touched through the
// `Mutex`.
unsafe impl Send for Terminals {}

static TERMINALS: Mutex<Option<Terminals>> = Mutex::new(None);

pub fn init() {
    let shadow = core::array::from_fn(|i| vga::shadow_writer((i + 1) as u8));
    let mut guard = TERMINALS.lock();
    *guard = Some(Terminals { foreground: 1, shadow });
    for id in 1..=NUM_TERMINALS {
        guard.as_mut().unwrap().shadow[(id - 1) as usize].clear_screen();
    }
    vga::LIVE.lock().clear_screen();
}

pub fn foreground() -> u8 {
    TERMINALS.lock().as_ref().map(|t| t.foreground).unwrap_or(1)
}

/// Physical address `id`'s vidmap window (directory entry 64) should point
/// at: the live framebuffer if `id` is foreground, its shadow otherwise
/// (spec.md §4.4 step 4). Used by `sched::on_timer_tick` to keep a
/// background process's `vidmap`-mapped writes off the displayed screen.
pub fn video_phys_base(id: u8) -> u32 {
    if id == foreground() {
        vga::LIVE_BASE as u32
    } else {
        (vga::LIVE_BASE + id as usize * vga::SHADOW_STRIDE) as u32
    }
}

/// Brings `id` to the front: the previously-foreground terminal's live
/// content is snapshotted into its own shadow buffer, `id`'s shadow
/// content is copied onto the live buffer, and the hardware cursor follows
/// (spec.md §4.5's `Alt-F{1,2,3}` behaviour, factored out from the keyboard
/// interception itself).
pub fn switch_to(id: u8) {
    if !(1..=NUM_TERMINALS).contains(&id) {
        return;
    }
    {
        let mut guard = TERMINALS.lock();
        let Some(terminals) = guard.as_mut() else { return };
        if terminals.foreground == id {
            return;
        }

        let old = (terminals.foreground - 1) as usize;
        let new = (id - 1) as usize;
        {
            let mut live = vga::LIVE.lock();
            live.snapshot_into(&mut terminals.shadow[old]);
            terminals.shadow[new].snapshot_into(&mut live);
            let (col, row) = live.cursor();
            vga::set_hardware_cursor(col, row);
        }
        terminals.foreground = id;
    }

    // `TERMINALS` must be unlocked before this: a fresh shell runs to
    // completion of its first ring-3 transfer right here, and may itself
    // write to this terminal's now-live buffer (spec.md §4.5/S4, grounded
    // on the original `switch_terminal`'s synchronous `execute("shell")`
    // on first switch to an unopened terminal).
    if crate::sched::leaf_pid(id).is_none() {
        let _ = crate::process::execute_root(id, "shell");
    }
}

pub fn clear(id: u8) {
    if id == foreground() {
        vga::LIVE.lock().clear_screen();
        let (col, row) = vga::LIVE.lock().cursor();
        vga::set_hardware_cursor(col, row);
    } else if let Some(terminals) = TERMINALS.lock().as_mut() {
        terminals.shadow[(id - 1) as usize].clear_screen();
    }
}

/// `Ctrl-L` (spec.md §4.5/§4.6, original `keyboard.c`'s clear handling):
/// clears the foreground terminal outright, but if a process is mid-
/// `terminal_read` on it, the line typed so far would otherwise vanish
/// into a blank screen until Enter — flag it instead so `terminal_read`'s
/// own loop reprints what's been typed once the clear has landed.
pub fn handle_clear_request() {
    let fg = foreground();
    clear(fg);
    if let Some(pid) = table::find_reading_pid(fg) {
        let _ = table::with_pcb(pid, |p| p.clear_pressed = true);
    }
}

/// Writes `bytes` to `terminal_id`'s display: the live buffer if it is the
/// foreground terminal, its shadow buffer otherwise — the core of the
/// multiplexer (spec.md §4.5's write semantics): a background process's
/// output never appears on screen until its terminal is switched to.
pub fn write_bytes(terminal_id: u8, bytes: &[u8]) {
    if terminal_id == foreground() {
        let mut live = vga::LIVE.lock();
        for &b in bytes {
            live.write_byte(b);
        }
        let (col, row) = live.cursor();
        vga::set_hardware_cursor(col, row);
    } else if let Some(terminals) = TERMINALS.lock().as_mut() {
        let writer = &mut terminals.shadow[(terminal_id - 1) as usize];
        for &b in bytes {
            writer.write_byte(b);
        }
    }
}

/// Echoes one keystroke onto whichever terminal is currently foreground —
/// the physical keyboard always targets the displayed terminal.
pub fn echo_foreground(byte: u8) {
    write_bytes(foreground(), &[byte]);
}

/// Line-discipline read (spec.md §4.5, §9's documented suspension point):
/// blocks `pid` until Enter is observed on its terminal, then copies the
/// accumulated line into `buf`.
pub fn terminal_read(pid: u8, buf: &mut [u8]) -> KernelResult<usize> {
    table::with_pcb(pid, |p| {
        p.is_reading = true;
        p.enter_pressed = false;
        p.clear_pressed = false;
        p.line_pos = 0;
    })?;

    loop {
        let ready = table::with_pcb(pid, |p| {
            if p.clear_pressed {
                p.clear_pressed = false;
                write_bytes(foreground(), &p.line_buffer[..p.line_pos]);
            }
            p.enter_pressed
        })?;
        if ready {
            break;
        }
        crate::arch::x86::port::enable_interrupts();
        crate::arch::x86::port::hlt();
    }

    table::with_pcb(pid, |p| {
        p.is_reading = false;
        let n = p.line_pos.min(buf.len());
        buf[..n].copy_from_slice(&p.line_buffer[..n]);
        n
    })
}

/// Called by [`crate::keyboard`] for every byte typed while `pid` has a
/// pending [`terminal_read`]: appends to the line buffer and, on Enter,
/// wakes the blocked reader.
pub fn feed_line_discipline(pid: u8, byte: u8) -> KernelResult<()> {
    table::with_pcb(pid, |p| {
        if !p.is_reading {
            return;
        }
        match byte {
            b'\n' => {
                if p.line_pos < p.line_buffer.len() {
                    p.line_buffer[p.line_pos] = b'\n';
                    p.line_pos += 1;
                }
                p.enter_pressed = true;
            }
            0x08 => {
                if p.line_pos > 0 {
                    p.line_pos -= 1;
                }
            }
            _ => {
                if p.line_pos < p.line_buffer.len() - 1 {
                    p.line_buffer[p.line_pos] = byte;
                    p.line_pos += 1;
                }
            }
        }
    })
    .map_err(|_| KernelError::NotFound)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use super::*;
    use crate::process::pcb::MAX_PROCESSES;

    // `feed_line_discipline` goes through `process::table`'s shared `TABLE`
    // static, so serialize against its own tests the same way.
    static SERIAL: StdMutex<()> = StdMutex::new(());

    fn free_all() {
        for pid in 1..=MAX_PROCESSES {
            table::free_pid(pid);
        }
    }

    fn reading_pid() -> u8 {
        let pid = table::allocate_pid().unwrap();
        table::with_pcb_raw(pid, |p| {
            p.reset_for_execute(pid, 0, 1);
            p.is_reading = true;
        });
        pid
    }

    #[test]
    fn normal_bytes_append_to_the_line_buffer() {
        let _guard = SERIAL.lock().unwrap();
        free_all();
        let pid = reading_pid();

        feed_line_discipline(pid, b'h').unwrap();
        feed_line_discipline(pid, b'i').unwrap();
        table::with_pcb(pid, |p| {
            assert_eq!(p.line_pos, 2);
            assert_eq!(&p.line_buffer[..2], b"hi");
            assert!(!p.enter_pressed);
        })
        .unwrap();
        free_all();
    }

    #[test]
    fn newline_appends_and_sets_enter_pressed() {
        let _guard = SERIAL.lock().unwrap();
        free_all();
        let pid = reading_pid();

        feed_line_discipline(pid, b'x').unwrap();
        feed_line_discipline(pid, b'\n').unwrap();
        table::with_pcb(pid, |p| {
            assert_eq!(p.line_pos, 2);
            assert_eq!(&p.line_buffer[..2], b"x\n");
            assert!(p.enter_pressed);
        })
        .unwrap();
        free_all();
    }

    #[test]
    fn backspace_decrements_line_pos_but_not_below_zero() {
        let _guard = SERIAL.lock().unwrap();
        free_all();
        let pid = reading_pid();

        feed_line_discipline(pid, 0x08).unwrap();
        table::with_pcb(pid, |p| assert_eq!(p.line_pos, 0)).unwrap();

        feed_line_discipline(pid, b'a').unwrap();
        feed_line_discipline(pid, b'b').unwrap();
        feed_line_discipline(pid, 0x08).unwrap();
        table::with_pcb(pid, |p| {
            assert_eq!(p.line_pos, 1);
            assert_eq!(p.line_buffer[0], b'a');
        })
        .unwrap();
        free_all();
    }

    #[test]
    fn bytes_are_ignored_when_the_process_is_not_reading() {
        let _guard = SERIAL.lock().unwrap();
        free_all();
        let pid = table::allocate_pid().unwrap();
        table::with_pcb_raw(pid, |p| p.reset_for_execute(pid, 0, 1));

        feed_line_discipline(pid, b'z').unwrap();
        table::with_pcb(pid, |p| assert_eq!(p.line_pos, 0)).unwrap();
        free_all();
    }

    #[test]
    fn feeding_an_unregistered_pid_is_an_error() {
        let _guard = SERIAL.lock().unwrap();
        free_all();
        assert_eq!(feed_line_discipline(0, b'a'), Err(KernelError::NotFound));
    }
}
