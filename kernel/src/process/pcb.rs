//! Process control block (spec.md §3).
//!
//! Replaces the source's bare struct-of-arrays-by-pointer-arithmetic with a
//! plain `#[repr(C)]` struct owned by [`super::table`] — see that module's
//! doc comment for how PCBs are actually addressed (spec.md §9's "Raw
//! physical addresses for PCB location" redesign note).

use crate::fs::DirEntry;

pub const MAX_PROCESSES: u8 = 6;
pub const FD_TABLE_SIZE: usize = 8;
pub const ARG_BUF_SIZE: usize = 32;
pub const LINE_BUF_SIZE: usize = 1024;

/// One file-descriptor slot: position, dispatch tag, EOF flag, the
/// directory entry it was opened from (spec.md §3's "file operations
/// vtable" becomes a `match` over [`FileKind`] rather than function
/// pointers — same dispatch, safe in Rust).
#[derive(Debug, Clone, Copy)]
pub struct FileDescriptor {
    pub kind: FileKind,
    pub position: u32,
    pub eof: bool,
    pub dentry: DirEntry,
}

impl FileDescriptor {
    pub const fn closed() -> Self {
        FileDescriptor {
            kind: FileKind::Closed,
            position: 0,
            eof: false,
            dentry: DirEntry::EMPTY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Closed,
    TerminalStdin,
    TerminalStdout,
    RegularFile,
    Directory,
    Rtc,
}

/// Snapshot of the preempted or about-to-resume register context, filled by
/// the scheduler tick handler and by the syscall entry trampoline
/// (spec.md §3, §4.4).
#[derive(Debug, Clone, Copy, Default)]
pub struct Context {
    pub eip: u32,
    pub cs: u32,
    pub eflags: u32,
    pub esp: u32,
    pub ebp: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct Pcb {
    pub pid: u8,
    pub parent_pid: u8,
    pub terminal_id: u8,
    pub in_use: bool,

    /// Kernel return point for `halt`: this process's own `esp`/`ebp` at the
    /// moment it called `execute`, so a `halt`'d child's parent can resume
    /// there (spec.md §9 "stashed kernel frame").
    pub kernel_return_esp: u32,
    /// Kernel `esp` at this process's last preemption, for the scheduler
    /// to switch back to (spec.md §4.4) — distinct from
    /// `kernel_return_esp`, which belongs to the `execute`/`halt` handoff.
    pub scheduler_esp: u32,

    pub resume: Context,

    pub line_buffer: [u8; LINE_BUF_SIZE],
    pub line_pos: usize,
    pub is_reading: bool,
    pub enter_pressed: bool,
    pub clear_pressed: bool,
    pub cursor_col: u8,
    pub cursor_row: u8,

    pub files: [FileDescriptor; FD_TABLE_SIZE],
    pub used_mask: u8,

    pub args: [u8; ARG_BUF_SIZE],
    pub args_len: usize,
}

impl Pcb {
    pub const fn empty() -> Self {
        Pcb {
            pid: 0,
            parent_pid: 0,
            terminal_id: 0,
            in_use: false,
            kernel_return_esp: 0,
            scheduler_esp: 0,
            resume: Context {
                eip: 0,
                cs: 0,
                eflags: 0,
                esp: 0,
                ebp: 0,
            },
            line_buffer: [0; LINE_BUF_SIZE],
            line_pos: 0,
            is_reading: false,
            enter_pressed: false,
            clear_pressed: false,
            cursor_col: 0,
            cursor_row: 0,
            files: [FileDescriptor::closed(); FD_TABLE_SIZE],
            used_mask: 0,
            args: [0; ARG_BUF_SIZE],
            args_len: 0,
        }
    }

    /// Reset to a freshly `execute`d process's initial state. Slots 0/1
    /// (terminal stdin/stdout) are bound for the lifetime of the process
    /// (spec.md §3 invariant).
    pub fn reset_for_execute(&mut self, pid: u8, parent_pid: u8, terminal_id: u8) {
        *self = Pcb::empty();
        self.pid = pid;
        self.parent_pid = parent_pid;
        self.terminal_id = terminal_id;
        self.in_use = true;
        self.files[0] = FileDescriptor {
            kind: FileKind::TerminalStdin,
            position: 0,
            eof: false,
            dentry: DirEntry::EMPTY,
        };
        self.files[1] = FileDescriptor {
            kind: FileKind::TerminalStdout,
            position: 0,
            eof: false,
            dentry: DirEntry::EMPTY,
        };
        self.used_mask = 0b0000_0011;
    }

    pub fn set_args(&mut self, args: &[u8]) {
        let n = args.len().min(ARG_BUF_SIZE - 1);
        self.args[..n].copy_from_slice(&args[..n]);
        self.args[n] = 0;
        self.args_len = n;
    }
}
