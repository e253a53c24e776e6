//! PS/2 keyboard driver: scancode decoding via `pc-keyboard`, modifier
//! counters, and the two key combinations the kernel itself intercepts
//! before anything reaches a process (spec.md §4.6, original `keyboard.c`).

use pc_keyboard::{layouts, DecodedKey, HandleControl, Keyboard, KeyCode, KeyEvent, KeyState, ScancodeSet1};
use spin::Mutex;

use crate::process::table;
use crate::terminal;

/// Counters rather than booleans: left and right Shift (and Ctrl, Alt)
/// each bump the same counter, so one key's stuck "down" scancode (missed
/// due to a dropped IRQ) can't permanently wedge the modifier the way a
/// pair of booleans driven by raw press/release would (spec.md §4.6).
struct Modifiers {
    shift: u8,
    ctrl: u8,
    alt: u8,
}

impl Modifiers {
    const fn new() -> Self {
        Modifiers { shift: 0, ctrl: 0, alt: 0 }
    }

    fn bump(counter: &mut u8, state: KeyState) {
        match state {
            KeyState::Down => *counter = counter.saturating_add(1),
            KeyState::Up => *counter = counter.saturating_sub(1),
            KeyState::UpDown => {}
        }
    }
}

static MODIFIERS: Mutex<Modifiers> = Mutex::new(Modifiers::new());
static DECODER: Mutex<Keyboard<layouts::Us104Key, ScancodeSet1>> = Mutex::new(Keyboard::new(
    ScancodeSet1::new(),
    layouts::Us104Key,
    HandleControl::Ignore,
));

fn ctrl_held() -> bool {
    MODIFIERS.lock().ctrl > 0
}

fn alt_held() -> bool {
    MODIFIERS.lock().alt > 0
}

/// Entry point from `arch::x86::idt`'s keyboard stub: one raw scancode
/// byte read off port `0x60`.
pub fn on_scancode(scancode: u8) {
    let event = {
        let mut decoder = DECODER.lock();
        match decoder.add_byte(scancode) {
            Ok(Some(event)) => event,
            _ => return,
        }
    };

    if track_modifier(&event) {
        return;
    }

    if event.state == KeyState::Down && alt_held() {
        if let Some(id) = terminal_switch_target(event.code) {
            terminal::switch_to(id);
            return;
        }
    }

    let decoded = {
        let mut decoder = DECODER.lock();
        decoder.process_keyevent(event)
    };
    let Some(DecodedKey::Unicode(ch)) = decoded else { return };
    if ch as u32 > 0x7f {
        return;
    }
    let byte = ch as u8;

    if ctrl_held() && (byte == b'l' || byte == b'L') {
        terminal::handle_clear_request();
        return;
    }

    deliver_to_reader(byte);
}

fn track_modifier(event: &KeyEvent) -> bool {
    let mut mods = MODIFIERS.lock();
    match event.code {
        KeyCode::ShiftLeft | KeyCode::ShiftRight => {
            Modifiers::bump(&mut mods.shift, event.state);
            true
        }
        KeyCode::ControlLeft | KeyCode::ControlRight => {
            Modifiers::bump(&mut mods.ctrl, event.state);
            true
        }
        KeyCode::AltLeft | KeyCode::AltRight => {
            Modifiers::bump(&mut mods.alt, event.state);
            true
        }
        _ => false,
    }
}

fn terminal_switch_target(code: KeyCode) -> Option<u8> {
    match code {
        KeyCode::F1 => Some(1),
        KeyCode::F2 => Some(2),
        KeyCode::F3 => Some(3),
        _ => None,
    }
}

/// Echoes the byte to the foreground terminal and, if some process on it
/// is blocked in `terminal_read`, feeds the line discipline.
fn deliver_to_reader(byte: u8) {
    let fg = terminal::foreground();
    terminal::echo_foreground(byte);
    if let Some(pid) = table::find_reading_pid(fg) {
        let _ = terminal::feed_line_discipline(pid, byte);
    }
}
