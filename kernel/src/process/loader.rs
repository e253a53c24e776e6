//! Program loader (spec.md §4.2, original `filesystem.c`'s ELF-adjacent
//! loading code): validates the magic number, copies the image into the
//! process's user page, and reports the entry point.

use crate::arch::x86::paging;
use crate::error::{KernelError, KernelResult};
use crate::fs::{self, DirEntry};

const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
const ENTRY_POINT_OFFSET: usize = 24;

pub struct LoadedImage {
    pub entry_point: u32,
    pub user_stack_top: u32,
}

/// Loads `name` into the currently-mapped user page and returns its entry
/// point. The caller must already have pointed directory entry 32 at the
/// backing physical frame for the target process (`execute`'s job, not
/// this function's) so that writes through [`paging::user_page_virt_base`]
/// land in the right place.
pub fn load_program(name: &str) -> KernelResult<LoadedImage> {
    let dentry = fs::lookup(name)?;
    load_from_dentry(&dentry)
}

fn load_from_dentry(dentry: &DirEntry) -> KernelResult<LoadedImage> {
    let length = fs::file_length(dentry)?;
    if length < 28 {
        return Err(KernelError::NotExecutable);
    }

    let mut header = [0u8; 28];
    fs::read_file(dentry, 0, &mut header)?;
    if header[0..4] != ELF_MAGIC {
        return Err(KernelError::NotExecutable);
    }

    if length > paging::USER_REGION_BYTES {
        return Err(KernelError::NotExecutable);
    }

    let image_base = paging::user_page_virt_base();
    // SAFETY: directory entry 32 is already pointed at this process's
    // private region by the caller.
    let dest = unsafe {
        core::slice::from_raw_parts_mut(image_base as *mut u8, length as usize)
    };
    fs::read_file(dentry, 0, dest)?;

    let entry_point = u32::from_le_bytes([
        header[ENTRY_POINT_OFFSET],
        header[ENTRY_POINT_OFFSET + 1],
        header[ENTRY_POINT_OFFSET + 2],
        header[ENTRY_POINT_OFFSET + 3],
    ]);

    Ok(LoadedImage { entry_point, user_stack_top: paging::user_stack_top() })
}
