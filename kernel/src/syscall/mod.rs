//! `int 0x80` syscall dispatch (spec.md §4.3/§4.7/§6, original `sys_calls.c`).
//!
//! Ten call numbers, `eax`=number and `ebx,ecx,edx`=args in, `eax`=result
//! out. Every failure compresses to a single `-1` (spec.md §7's "single
//! failure code" design note) via [`KernelError::to_errno`].

use core::slice;

use crate::arch::x86::paging;
use crate::error::{KernelError, KernelResult};
use crate::fs::{self, FileType};
use crate::process::pcb::{FileDescriptor, FileKind, FD_TABLE_SIZE};
use crate::process::table;
use crate::{process, rtc, terminal};

const SYS_HALT: u32 = 1;
const SYS_EXECUTE: u32 = 2;
const SYS_READ: u32 = 3;
const SYS_WRITE: u32 = 4;
const SYS_OPEN: u32 = 5;
const SYS_CLOSE: u32 = 6;
const SYS_GETARGS: u32 = 7;
const SYS_VIDMAP: u32 = 8;
const SYS_SET_HANDLER: u32 = 9;
const SYS_SIGRETURN: u32 = 10;

/// Dispatched straight from the asm trampoline. `eax` selects the call;
/// `halt` diverges, so it's pulled out before the rest since it cannot
/// share the `Result`-returning shape of the others.
pub fn dispatch(eax: u32, ebx: u32, ecx: u32, edx: u32) -> i32 {
    let Some(caller_pid) = crate::sched::current_pid() else {
        return -1;
    };

    if eax == SYS_HALT {
        process::halt(caller_pid, ebx as i32);
    }

    let result = match eax {
        SYS_EXECUTE => sys_execute(caller_pid, ebx),
        SYS_READ => sys_read(caller_pid, ebx, ecx, edx),
        SYS_WRITE => sys_write(caller_pid, ebx, ecx, edx),
        SYS_OPEN => sys_open(caller_pid, ebx),
        SYS_CLOSE => sys_close(caller_pid, ebx),
        SYS_GETARGS => sys_getargs(caller_pid, ebx, ecx),
        SYS_VIDMAP => sys_vidmap(caller_pid, ebx),
        SYS_SET_HANDLER => Err(KernelError::BadArgument),
        SYS_SIGRETURN => Err(KernelError::BadArgument),
        _ => Err(KernelError::BadArgument),
    };

    match result {
        Ok(value) => value,
        Err(e) => e.to_errno(),
    }
}

/// Bounds-checks a user-space `(ptr, len)` pair against the calling
/// process's mapped region (spec.md §6: there is exactly one user region
/// per process, so this is the entire access-control story).
fn user_slice<'a>(ptr: u32, len: u32) -> KernelResult<&'a [u8]> {
    validate_user_range(ptr, len)?;
    Ok(unsafe { slice::from_raw_parts(ptr as *const u8, len as usize) })
}

fn user_slice_mut<'a>(ptr: u32, len: u32) -> KernelResult<&'a mut [u8]> {
    validate_user_range(ptr, len)?;
    Ok(unsafe { slice::from_raw_parts_mut(ptr as *mut u8, len as usize) })
}

fn validate_user_range(ptr: u32, len: u32) -> KernelResult<()> {
    let base = paging::user_page_virt_base();
    let end = base + paging::USER_REGION_BYTES;
    if ptr < base || len > end - base || ptr.saturating_add(len) > end {
        return Err(KernelError::BadArgument);
    }
    Ok(())
}

fn user_str<'a>(ptr: u32, max_len: u32) -> KernelResult<&'a str> {
    let bytes = user_slice(ptr, max_len)?;
    let len = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    core::str::from_utf8(&bytes[..len]).map_err(|_| KernelError::BadArgument)
}

fn sys_execute(caller_pid: u8, cmd_ptr: u32) -> KernelResult<i32> {
    let cmd = user_str(cmd_ptr, 128)?;
    process::execute(caller_pid, cmd)
}

fn with_fd<R>(caller_pid: u8, fd: u32, f: impl FnOnce(&mut FileDescriptor) -> KernelResult<R>) -> KernelResult<R> {
    let fd = fd as usize;
    if fd >= FD_TABLE_SIZE {
        return Err(KernelError::BadArgument);
    }
    table::with_pcb(caller_pid, |p| {
        if p.files[fd].kind == FileKind::Closed {
            return Err(KernelError::BadArgument);
        }
        f(&mut p.files[fd])
    })?
}

fn sys_read(caller_pid: u8, fd: u32, buf_ptr: u32, nbytes: u32) -> KernelResult<i32> {
    let buf = user_slice_mut(buf_ptr, nbytes)?;
    let kind = with_fd(caller_pid, fd, |f| Ok(f.kind))?;

    let n = match kind {
        FileKind::TerminalStdin => terminal::terminal_read(caller_pid, buf)?,
        FileKind::Rtc => {
            let handle = with_fd(caller_pid, fd, |f| Ok(f.position as usize))?;
            rtc::read(handle)?;
            0
        }
        FileKind::RegularFile => with_fd(caller_pid, fd, |f| {
            let n = fs::read_file(&f.dentry, f.position, buf)?;
            f.position += n as u32;
            Ok(n)
        })?,
        FileKind::Directory => with_fd(caller_pid, fd, |f| {
            let dentry = fs::dentry_by_index(f.position)?;
            f.position += 1;
            let name = dentry.name_str().as_bytes();
            let n = name.len().min(buf.len());
            buf[..n].copy_from_slice(&name[..n]);
            Ok(n)
        })?,
        FileKind::TerminalStdout | FileKind::Closed => return Err(KernelError::BadArgument),
    };
    Ok(n as i32)
}

fn sys_write(caller_pid: u8, fd: u32, buf_ptr: u32, nbytes: u32) -> KernelResult<i32> {
    let buf = user_slice(buf_ptr, nbytes)?;
    let kind = with_fd(caller_pid, fd, |f| Ok(f.kind))?;

    match kind {
        FileKind::TerminalStdout => {
            let terminal_id = table::with_pcb(caller_pid, |p| p.terminal_id)?;
            terminal::write_bytes(terminal_id, buf);
        }
        FileKind::Rtc => {
            let handle = with_fd(caller_pid, fd, |f| Ok(f.position as usize))?;
            if buf.len() < 4 {
                return Err(KernelError::BadArgument);
            }
            let frequency = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
            rtc::write(handle, frequency)?;
        }
        _ => return Err(KernelError::BadArgument),
    }
    Ok(buf.len() as i32)
}

fn sys_open(caller_pid: u8, name_ptr: u32) -> KernelResult<i32> {
    let name = user_str(name_ptr, fs::NAME_LEN as u32)?;

    // Dispatch by the dentry's own `file_type` rather than matching the
    // name directly — "rtc" is just another entry in the filesystem image,
    // distinguished from a regular file only by `FileType::Rtc` (spec.md
    // §4.1/§4.3's open dispatch-by-type).
    let dentry = fs::lookup(name)?;
    let kind = match dentry.file_type {
        FileType::Directory => FileKind::Directory,
        FileType::Regular => FileKind::RegularFile,
        FileType::Rtc => FileKind::Rtc,
    };
    let position = if kind == FileKind::Rtc { rtc::open()? as u32 } else { 0 };

    table::with_pcb(caller_pid, |p| {
        let free = (2..FD_TABLE_SIZE).find(|&i| p.files[i].kind == FileKind::Closed);
        let Some(fd) = free else { return Err(KernelError::ResourceExhausted) };
        p.files[fd] = FileDescriptor { kind, position, eof: false, dentry };
        p.used_mask |= 1 << fd;
        Ok(fd as i32)
    })?
}

fn sys_close(caller_pid: u8, fd: u32) -> KernelResult<i32> {
    if fd < 2 {
        // stdin/stdout are bound for the process's lifetime (spec.md §3).
        return Err(KernelError::BadArgument);
    }
    let kind = with_fd(caller_pid, fd, |f| Ok(f.kind))?;
    if kind == FileKind::Rtc {
        let handle = with_fd(caller_pid, fd, |f| Ok(f.position as usize))?;
        rtc::close(handle)?;
    }
    table::with_pcb(caller_pid, |p| {
        p.files[fd as usize] = FileDescriptor::closed();
        p.used_mask &= !(1 << fd);
    })?;
    Ok(0)
}

fn sys_getargs(caller_pid: u8, buf_ptr: u32, nbytes: u32) -> KernelResult<i32> {
    let buf = user_slice_mut(buf_ptr, nbytes)?;
    table::with_pcb(caller_pid, |p| {
        if p.args_len + 1 > buf.len() {
            return Err(KernelError::BadArgument);
        }
        buf[..p.args_len].copy_from_slice(&p.args[..p.args_len]);
        buf[p.args_len] = 0;
        Ok(0)
    })?
}

fn sys_vidmap(caller_pid: u8, screen_start_ptr: u32) -> KernelResult<i32> {
    validate_user_range(screen_start_ptr, 4)?;
    let _ = caller_pid;
    let addr = paging::video_page_virt_base();
    // SAFETY: `screen_start_ptr` was just range-checked against the
    // calling process's mapped region.
    unsafe {
        *(screen_start_ptr as *mut u32) = addr;
    }
    Ok(0)
}
