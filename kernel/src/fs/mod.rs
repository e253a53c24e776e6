//! Read-only indexed filesystem used as the program loader and general file
//! store (spec.md §4.1, original `filesystem.c`).
//!
//! The image is a multiboot module: a single contiguous blob starting with
//! a boot block, followed by inode blocks, followed by data blocks, each
//! block a fixed 4 KiB. No submodules, no VFS trait object indirection —
//! one flat module matching the size of the thing it describes.

use core::{slice, str};

use log::info;

use crate::error::{KernelError, KernelResult};

pub const BLOCK_SIZE: usize = 4096;
pub const NAME_LEN: usize = 32;
pub const MAX_DENTRIES: usize = 63;
pub const DATA_BLOCKS_PER_INODE: usize = (BLOCK_SIZE - 4) / 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum FileType {
    Rtc = 0,
    Directory = 1,
    Regular = 2,
}

/// One 64-byte directory entry: name, type, inode number, padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    pub name: [u8; NAME_LEN],
    pub name_len: u8,
    pub file_type: FileType,
    pub inode: u32,
}

impl DirEntry {
    pub const EMPTY: DirEntry = DirEntry {
        name: [0; NAME_LEN],
        name_len: 0,
        file_type: FileType::Regular,
        inode: 0,
    };

    pub fn name_str(&self) -> &str {
        str::from_utf8(&self.name[..self.name_len as usize]).unwrap_or("")
    }
}

struct BootBlock {
    num_dentries: u32,
    num_inodes: u32,
    num_data_blocks: u32,
}

/// Handle onto the mapped filesystem image. Constructed once by [`init`]
/// and never mutated afterward (spec.md §4.1 non-goal: no writes, no
/// directory creation).
pub struct FileSystem {
    image: &'static [u8],
    boot: BootBlock,
}

static mut FS: Option<FileSystem> = None;

/// # Safety
/// Called once, before interrupts are enabled, from `kernel_main`.
pub fn init(multiboot_info_addr: u32) {
    let (base, len) = locate_filesystem_module(multiboot_info_addr);
    // SAFETY: the multiboot module region is reserved by the bootloader and
    // outlives the kernel.
    let image = unsafe { slice::from_raw_parts(base as *const u8, len) };
    let boot = BootBlock {
        num_dentries: read_u32(image, 0),
        num_inodes: read_u32(image, 4),
        num_data_blocks: read_u32(image, 8),
    };
    info!(
        "fs: {} dentries, {} inodes, {} data blocks",
        boot.num_dentries, boot.num_inodes, boot.num_data_blocks
    );
    unsafe {
        FS = Some(FileSystem { image, boot });
    }
}

/// Multiboot v1's module list gives us `(mod_start, mod_end)` for the
/// filesystem image passed on the GRUB command line; out of scope for this
/// kernel's own parsing is anything beyond the first module entry.
fn locate_filesystem_module(multiboot_info_addr: u32) -> (u32, usize) {
    const FLAG_MODS: u32 = 1 << 3;
    let flags = read_u32_phys(multiboot_info_addr, 0);
    if flags & FLAG_MODS == 0 {
        return (0, 0);
    }
    let mods_count = read_u32_phys(multiboot_info_addr, 20);
    if mods_count == 0 {
        return (0, 0);
    }
    let mods_addr = read_u32_phys(multiboot_info_addr, 24);
    let mod_start = read_u32_phys(mods_addr, 0);
    let mod_end = read_u32_phys(mods_addr, 4);
    (mod_start, (mod_end - mod_start) as usize)
}

fn read_u32_phys(base: u32, offset: u32) -> u32 {
    unsafe { core::ptr::read_unaligned((base + offset) as *const u32) }
}

fn read_u32(image: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(image[offset..offset + 4].try_into().unwrap())
}

fn fs() -> &'static FileSystem {
    unsafe { FS.as_ref().expect("fs::init not called") }
}

impl FileSystem {
    fn dentry_at(&self, index: u32) -> Option<DirEntry> {
        if index >= self.boot.num_dentries || index as usize >= MAX_DENTRIES {
            return None;
        }
        // Dentries are packed into the tail of the boot block itself (the
        // first 64 bytes hold the three stats fields plus reserved padding),
        // not a block of their own — inode block 0 starts right after the
        // boot block, at the same `BLOCK_SIZE` offset this would collide
        // with if dentries got a whole block to themselves.
        let offset = 64 + index as usize * 64;
        let raw = &self.image[offset..offset + 64];
        let name_len = raw.iter().take(NAME_LEN).position(|&b| b == 0).unwrap_or(NAME_LEN) as u8;
        let mut name = [0u8; NAME_LEN];
        name.copy_from_slice(&raw[0..NAME_LEN]);
        let file_type = match read_u32(raw, 32) {
            0 => FileType::Rtc,
            1 => FileType::Directory,
            _ => FileType::Regular,
        };
        let inode = read_u32(raw, 36);
        Some(DirEntry { name, name_len, file_type, inode })
    }

    fn dentry_by_name(&self, name: &str) -> Option<DirEntry> {
        (0..self.boot.num_dentries)
            .filter_map(|i| self.dentry_at(i))
            .find(|d| d.name_str() == name)
    }

    fn inode_length(&self, inode: u32) -> KernelResult<u32> {
        if inode >= self.boot.num_inodes {
            return Err(KernelError::NotFound);
        }
        let offset = BLOCK_SIZE * (1 + inode as usize);
        Ok(read_u32(self.image, offset))
    }

    fn read_inode_data(&self, inode: u32, position: u32, buf: &mut [u8]) -> KernelResult<usize> {
        let length = self.inode_length(inode)?;
        if position >= length {
            return Ok(0);
        }
        let inode_offset = BLOCK_SIZE * (1 + inode as usize);
        let to_read = buf.len().min((length - position) as usize);
        let data_region_start = BLOCK_SIZE * (1 + self.boot.num_inodes as usize);

        let mut written = 0;
        while written < to_read {
            let file_pos = position as usize + written;
            let block_index = file_pos / BLOCK_SIZE;
            let block_offset = file_pos % BLOCK_SIZE;
            let data_block_num = read_u32(self.image, inode_offset + 4 + block_index * 4) as usize;
            let block_base = data_region_start + data_block_num * BLOCK_SIZE;
            let chunk = (BLOCK_SIZE - block_offset).min(to_read - written);
            buf[written..written + chunk]
                .copy_from_slice(&self.image[block_base + block_offset..block_base + block_offset + chunk]);
            written += chunk;
        }
        Ok(written)
    }
}

/// Looks up `name` and returns the directory entry if present
/// (`sys_open`'s first step).
pub fn lookup(name: &str) -> KernelResult<DirEntry> {
    fs().dentry_by_name(name).ok_or(KernelError::NotFound)
}

/// Directory-read by index, used by `sys_read` on an open directory fd and
/// by the shell's `ls`.
pub fn dentry_by_index(index: u32) -> KernelResult<DirEntry> {
    fs().dentry_at(index).ok_or(KernelError::NotFound)
}

pub fn num_dentries() -> u32 {
    fs().boot.num_dentries
}

pub fn file_length(dentry: &DirEntry) -> KernelResult<u32> {
    fs().inode_length(dentry.inode)
}

pub fn read_file(dentry: &DirEntry, position: u32, buf: &mut [u8]) -> KernelResult<usize> {
    fs().read_inode_data(dentry.inode, position, buf)
}

#[cfg(test)]
mod tests {
    use std::boxed::Box;

    use super::*;

    /// Builds a tiny five-block image by hand: block 0 is boot stats +
    /// dentries, blocks 1-2 are inodes, blocks 3-4 are data. Exercises the
    /// same byte layout `init` would read off a real multiboot module.
    fn sample_fs() -> FileSystem {
        let mut image = vec![0u8; BLOCK_SIZE * 5];

        image[0..4].copy_from_slice(&2u32.to_le_bytes());
        image[4..8].copy_from_slice(&2u32.to_le_bytes());
        image[8..12].copy_from_slice(&2u32.to_le_bytes());

        write_dentry(&mut image, 0, "hello", FileType::Regular, 0);
        write_dentry(&mut image, 1, "rtcdev", FileType::Rtc, 1);

        // inode 0: a 10-byte file living in data block 0.
        let inode0_offset = BLOCK_SIZE;
        image[inode0_offset..inode0_offset + 4].copy_from_slice(&10u32.to_le_bytes());
        image[inode0_offset + 4..inode0_offset + 8].copy_from_slice(&0u32.to_le_bytes());

        // inode 1: empty file, no data blocks.
        let inode1_offset = BLOCK_SIZE * 2;
        image[inode1_offset..inode1_offset + 4].copy_from_slice(&0u32.to_le_bytes());

        let data0_offset = BLOCK_SIZE * 3;
        image[data0_offset..data0_offset + 10].copy_from_slice(b"hello file");

        let image: &'static [u8] = Box::leak(image.into_boxed_slice());
        FileSystem {
            image,
            boot: BootBlock { num_dentries: 2, num_inodes: 2, num_data_blocks: 2 },
        }
    }

    fn write_dentry(image: &mut [u8], index: usize, name: &str, file_type: FileType, inode: u32) {
        let offset = 64 + index * 64;
        image[offset..offset + name.len()].copy_from_slice(name.as_bytes());
        image[offset + 32..offset + 36].copy_from_slice(&(file_type as u32).to_le_bytes());
        image[offset + 36..offset + 40].copy_from_slice(&inode.to_le_bytes());
    }

    #[test]
    fn lookup_finds_by_name() {
        let fs = sample_fs();
        let dentry = fs.dentry_by_name("hello").unwrap();
        assert_eq!(dentry.name_str(), "hello");
        assert_eq!(dentry.file_type, FileType::Regular);
        assert_eq!(dentry.inode, 0);
    }

    #[test]
    fn lookup_missing_name_fails() {
        let fs = sample_fs();
        assert!(fs.dentry_by_name("nope").is_none());
    }

    #[test]
    fn dentry_by_index_respects_num_dentries() {
        let fs = sample_fs();
        assert!(fs.dentry_at(0).is_some());
        assert!(fs.dentry_at(1).is_some());
        assert!(fs.dentry_at(2).is_none());
    }

    #[test]
    fn read_file_returns_full_contents() {
        let fs = sample_fs();
        let dentry = fs.dentry_by_name("hello").unwrap();
        assert_eq!(fs.inode_length(dentry.inode).unwrap(), 10);

        let mut buf = [0u8; 16];
        let n = fs.read_inode_data(dentry.inode, 0, &mut buf).unwrap();
        assert_eq!(n, 10);
        assert_eq!(&buf[..n], b"hello file");
    }

    #[test]
    fn read_file_from_middle_returns_remainder() {
        let fs = sample_fs();
        let mut buf = [0u8; 16];
        let n = fs.read_inode_data(0, 5, &mut buf).unwrap();
        assert_eq!(&buf[..n], b"file");
    }

    #[test]
    fn read_file_at_eof_returns_zero() {
        let fs = sample_fs();
        let mut buf = [0u8; 16];
        let n = fs.read_inode_data(0, 10, &mut buf).unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn empty_file_reads_as_zero_bytes() {
        let fs = sample_fs();
        let mut buf = [0u8; 16];
        let n = fs.read_inode_data(1, 0, &mut buf).unwrap();
        assert_eq!(n, 0);
        assert_eq!(fs.inode_length(1).unwrap(), 0);
    }

    #[test]
    fn inode_out_of_range_is_not_found() {
        let fs = sample_fs();
        assert_eq!(fs.inode_length(5), Err(KernelError::NotFound));
    }
}
