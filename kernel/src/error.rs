//! Kernel error taxonomy.
//!
//! The system-call ABI only has room for a single signed `i32` result
//! (spec.md §7), but internally every fallible path reports one of a small
//! set of typed errors so the failure kind is never lost before it reaches
//! a caller that can't do anything with it anyway. `to_errno` is the single
//! place that compresses a `KernelError` down to the ABI's `-1`.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "kernel errors must be handled, not silently discarded"]
pub enum KernelError {
    /// No directory entry, inode, process, or fd slot matched the lookup.
    NotFound,
    /// Null pointer, out-of-range fd/inode, bad RTC frequency, buffer too
    /// small, or a `vidmap` pointer outside the user page.
    BadArgument,
    /// No free pid (six processes already live) or no free fd slot.
    ResourceExhausted,
    /// The named file's magic number did not match the ELF magic.
    NotExecutable,
    /// A data-block index exceeded the block count in the read path.
    Corrupted,
    /// A hardware operation (port I/O, interrupt setup) could not proceed.
    Io,
}

pub type KernelResult<T> = Result<T, KernelError>;

impl KernelError {
    /// Compress to the syscall ABI's single failure code (spec.md §7, §9).
    pub const fn to_errno(self) -> i32 {
        -1
    }
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::NotFound => "not found",
            Self::BadArgument => "bad argument",
            Self::ResourceExhausted => "resource exhausted",
            Self::NotExecutable => "not executable",
            Self::Corrupted => "corrupted",
            Self::Io => "I/O error",
        };
        f.write_str(msg)
    }
}
