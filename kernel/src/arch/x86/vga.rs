//! Raw VGA text-mode framebuffer primitives (spec.md §1: "specified only as
//! a capability the terminal layer consumes"; §4.5's per-terminal shadows
//! live at `0xB8000 + terminal_id * 0x1000`, all inside the identity-mapped
//! low region, so no separate page-table dance is needed to reach them).
//!
//! Grounded on the teacher's `arch::x86_64::vga::Writer`, generalized from a
//! single fixed buffer to one parameterized by base address so the terminal
//! layer can address the live framebuffer and either shadow with the same
//! type.

use core::fmt;
use core::ptr::{read_volatile, write_volatile};
use lazy_static::lazy_static;
use spin::Mutex;

#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Color {
    Black = 0,
    Blue = 1,
    Green = 2,
    Cyan = 3,
    Red = 4,
    Magenta = 5,
    Brown = 6,
    LightGray = 7,
    DarkGray = 8,
    LightBlue = 9,
    LightGreen = 10,
    LightCyan = 11,
    LightRed = 12,
    Pink = 13,
    Yellow = 14,
    White = 15,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
struct ColorCode(u8);

impl ColorCode {
    fn new(foreground: Color, background: Color) -> ColorCode {
        ColorCode(((background as u8) << 4) | (foreground as u8))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
struct ScreenChar {
    ascii_character: u8,
    color_code: ColorCode,
}

pub const WIDTH: usize = 80;
pub const HEIGHT: usize = 25;
pub const LIVE_BASE: usize = 0xB8000;
pub const SHADOW_STRIDE: usize = 0x1000;

#[repr(transparent)]
struct Buffer {
    chars: [[ScreenChar; WIDTH]; HEIGHT],
}

const CRTC_INDEX_PORT: u16 = 0x3D4;
const CRTC_DATA_PORT: u16 = 0x3D5;

/// A writer bound to one physical base address: either the live framebuffer
/// (foreground terminal) or one of the two background shadows.
pub struct Writer {
    column_position: usize,
    row_position: usize,
    color_code: ColorCode,
    buffer: *mut Buffer,
}

unsafe impl Send for Writer {}

impl Writer {
    /// # Safety
    /// `base` must be a valid, identity-mapped `0xB8000`-style text-mode
    /// buffer address with `WIDTH * HEIGHT` character cells available.
    const unsafe fn at(base: usize) -> Writer {
        Writer {
            column_position: 0,
            row_position: 0,
            color_code: ColorCode::new(Color::LightGray, Color::Black),
            buffer: base as *mut Buffer,
        }
    }

    pub fn write_byte(&mut self, byte: u8) {
        match byte {
            b'\n' => self.new_line(),
            byte => {
                if self.column_position >= WIDTH {
                    self.new_line();
                }
                let row = self.row_position;
                let col = self.column_position;
                let color_code = self.color_code;
                // SAFETY: row/col are bounds-checked above and by new_line;
                // self.buffer points at a live WIDTH*HEIGHT cell buffer.
                unsafe {
                    write_volatile(
                        &mut (*self.buffer).chars[row][col],
                        ScreenChar {
                            ascii_character: byte,
                            color_code,
                        },
                    );
                }
                self.column_position += 1;
            }
        }
    }

    pub fn write_string(&mut self, s: &str) {
        for byte in s.bytes() {
            match byte {
                0x20..=0x7e | b'\n' => self.write_byte(byte),
                _ => self.write_byte(0xfe),
            }
        }
    }

    fn new_line(&mut self) {
        if self.row_position + 1 < HEIGHT {
            self.row_position += 1;
        } else {
            for row in 1..HEIGHT {
                for col in 0..WIDTH {
                    // SAFETY: row in 1..HEIGHT, col in 0..WIDTH, both in bounds.
                    unsafe {
                        let character = read_volatile(&(*self.buffer).chars[row][col]);
                        write_volatile(&mut (*self.buffer).chars[row - 1][col], character);
                    }
                }
            }
            self.clear_row(HEIGHT - 1);
        }
        self.column_position = 0;
    }

    fn clear_row(&mut self, row: usize) {
        let blank = ScreenChar {
            ascii_character: b' ',
            color_code: self.color_code,
        };
        for col in 0..WIDTH {
            // SAFETY: row passed in is always < HEIGHT, col < WIDTH.
            unsafe {
                write_volatile(&mut (*self.buffer).chars[row][col], blank);
            }
        }
    }

    /// Full-screen clear (`Ctrl-L` / `terminal_clear`, spec.md §4.5).
    pub fn clear_screen(&mut self) {
        for row in 0..HEIGHT {
            self.clear_row(row);
        }
        self.row_position = 0;
        self.column_position = 0;
    }

    pub fn cursor(&self) -> (usize, usize) {
        (self.column_position, self.row_position)
    }

    pub fn set_cursor(&mut self, col: usize, row: usize) {
        self.column_position = col.min(WIDTH - 1);
        self.row_position = row.min(HEIGHT - 1);
    }

    /// Raw copy of the entire buffer, used to save/restore shadows on
    /// terminal switch (spec.md §4.5 "copy current framebuffer into the old
    /// terminal's shadow").
    pub fn snapshot_into(&mut self, other: &mut Writer) {
        for row in 0..HEIGHT {
            for col in 0..WIDTH {
                // SAFETY: row/col always within HEIGHT/WIDTH bounds.
                unsafe {
                    let character = read_volatile(&(*self.buffer).chars[row][col]);
                    write_volatile(&mut (*other.buffer).chars[row][col], character);
                }
            }
        }
        other.column_position = self.column_position;
        other.row_position = self.row_position;
    }
}

impl fmt::Write for Writer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write_string(s);
        Ok(())
    }
}

lazy_static! {
    /// The live framebuffer the CRTC actually scans out.
    pub static ref LIVE: Mutex<Writer> =
        // SAFETY: 0xB8000 is the well-known physical VGA text buffer
        // address, identity-mapped in kernel space.
        Mutex::new(unsafe { Writer::at(LIVE_BASE) });
}

/// Writer bound to terminal `id`'s (1..=3) off-screen shadow.
pub fn shadow_writer(id: u8) -> Writer {
    // SAFETY: shadows occupy the identity-mapped region just past the live
    // buffer, spec.md §4.5.
    unsafe { Writer::at(LIVE_BASE + id as usize * SHADOW_STRIDE) }
}

/// Move the hardware cursor (foreground terminal only). Grounded on the
/// original `terminal.c`'s `update_cursor`.
pub fn set_hardware_cursor(col: usize, row: usize) {
    let pos = (row * WIDTH + col) as u16;
    unsafe {
        super::port::outb_at(CRTC_INDEX_PORT, 0x0F);
        super::port::outb_at(CRTC_DATA_PORT, (pos & 0xFF) as u8);
        super::port::outb_at(CRTC_INDEX_PORT, 0x0E);
        super::port::outb_at(CRTC_DATA_PORT, (pos >> 8) as u8);
    }
}

#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    use core::fmt::Write;
    super::port::without_interrupts(|| {
        LIVE.lock().write_fmt(args).expect("VGA write_fmt failed");
    });
}
