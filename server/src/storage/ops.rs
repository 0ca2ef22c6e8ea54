//! File operations: open/close/read/write/copy-out, wired against the
//! block pool, inode table, directory, and open-file table above.

use std::io::Write as _;
use std::path::Path;

use tfs_types::{BLOCK_SIZE, DIRECT_BLOCKS, INDIRECT_ENTRIES, OpenFlags, ROOT_DIR_INUM};

use super::block::{BlockError, BlockPool};
use super::directory::{self, DirectoryError};
use super::inode::{InodeData, InodeError, InodeKind, InodeTable};
use super::open_file::{OpenFileError, OpenFileTable};

#[derive(Debug, thiserror::Error)]
pub enum OpsError {
    #[error("invalid path name")]
    InvalidArgument,
    #[error("file not found")]
    NotFound,
    #[error(transparent)]
    OpenFile(#[from] OpenFileError),
    #[error(transparent)]
    Inode(#[from] InodeError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error(transparent)]
    Block(#[from] BlockError),
    #[error("host filesystem error: {0}")]
    Io(#[from] std::io::Error),
}

fn valid_pathname(name: &str) -> bool {
    name.len() > 1 && name.starts_with('/')
}

fn indirect_offset(i: usize) -> usize {
    i * std::mem::size_of::<i32>()
}

fn read_indirect_entry(block: &[u8; BLOCK_SIZE], i: usize) -> i32 {
    let off = indirect_offset(i);
    i32::from_le_bytes(block[off..off + 4].try_into().unwrap())
}

fn write_indirect_entry(block: &mut [u8; BLOCK_SIZE], i: usize, value: i32) {
    let off = indirect_offset(i);
    block[off..off + 4].copy_from_slice(&value.to_le_bytes());
}

fn init_indirect_block(block: &mut [u8; BLOCK_SIZE]) {
    for i in 0..INDIRECT_ENTRIES {
        write_indirect_entry(block, i, -1);
    }
}

/// The whole in-memory file system: block pool, inode table, open-file
/// table, all sharing one root directory.
pub struct FileSystem {
    pub blocks: BlockPool,
    pub inodes: InodeTable,
    pub open_files: OpenFileTable,
}

impl FileSystem {
    pub fn new() -> Self {
        let fs = Self {
            blocks: BlockPool::new(),
            inodes: InodeTable::new(),
            open_files: OpenFileTable::new(),
        };
        fs.init_root();
        fs
    }

    fn init_root(&self) {
        let inumber = self.inodes.create(InodeKind::Directory).expect("root inode slot");
        debug_assert_eq!(inumber, ROOT_DIR_INUM, "root directory must be inode 0");
        let block_index = self.blocks.alloc().expect("root directory block");
        self.blocks.with_block(block_index, directory::init_block);
        let root = self.inodes.get(inumber).expect("root inode just created");
        root.data.write().unwrap().direct[0] = block_index as i32;
    }

    pub fn open(&self, name: &str, flags: OpenFlags) -> Result<i32, OpsError> {
        if !valid_pathname(name) {
            return Err(OpsError::InvalidArgument);
        }
        let bare_name = &name[1..];
        let found = directory::find_in_dir(&self.inodes, &self.blocks, ROOT_DIR_INUM, bare_name)?;

        let (inumber, offset) = if found >= 0 {
            let inode = self.inodes.get(found)?;
            let mut data = inode.data.write().unwrap();
            if flags.contains(OpenFlags::TRUNC) && data.size > 0 {
                self.truncate_locked(&mut data)?;
            }
            let offset = if flags.contains(OpenFlags::APPEND) { data.size } else { 0 };
            (found, offset)
        } else if flags.contains(OpenFlags::CREAT) {
            let inumber = self.inodes.create(InodeKind::File)?;
            if let Err(err) =
                directory::add_dir_entry(&self.inodes, &self.blocks, ROOT_DIR_INUM, inumber, bare_name)
            {
                // Directory full: undo the inode creation, same as the
                // original's `inode_delete(inum)` on this path.
                let _ = self.inodes.delete(inumber);
                return Err(err.into());
            }
            (inumber, 0)
        } else {
            return Err(OpsError::NotFound);
        };

        Ok(self.open_files.add(inumber, offset)?)
    }

    pub fn close(&self, handle: i32) -> i32 {
        match self.open_files.remove(handle) {
            Ok(()) => 0,
            Err(_) => -1,
        }
    }

    pub fn write(&self, handle: i32, buf: &[u8]) -> i64 {
        let result = self.open_files.with_entry(handle, |inumber, offset| {
            let inode = self.inodes.get(inumber)?;
            let mut data = inode.data.write().unwrap();

            let capacity = (BLOCK_SIZE * (DIRECT_BLOCKS + INDIRECT_ENTRIES)) as u64;
            let to_write = (buf.len() as u64).min(capacity.saturating_sub(*offset));
            if to_write == 0 {
                return Ok::<i64, OpsError>(0);
            }

            let mut written = 0u64;
            let mut pos = *offset;
            while written < to_write {
                let file_block = (pos / BLOCK_SIZE as u64) as usize;
                let intra = (pos % BLOCK_SIZE as u64) as usize;
                let phys = match self.block_for_write(&mut data, file_block) {
                    Ok(phys) => phys,
                    // Leave whatever was written so far in place: the
                    // original writer never rolls back a partial write.
                    Err(_) => break,
                };
                let chunk = ((BLOCK_SIZE - intra) as u64).min(to_write - written) as usize;
                let start = written as usize;
                self.blocks.with_block(phys, |block| {
                    block[intra..intra + chunk].copy_from_slice(&buf[start..start + chunk]);
                });
                written += chunk as u64;
                pos += chunk as u64;
            }

            *offset += written;
            if *offset > data.size {
                data.size = *offset;
            }
            Ok(written as i64)
        });
        result.unwrap_or(-1)
    }

    pub fn read(&self, handle: i32, len: u64) -> Result<Vec<u8>, OpsError> {
        self.open_files.with_entry(handle, |inumber, offset| {
            let inode = self.inodes.get(inumber)?;
            let data = inode.data.read().unwrap();

            let available = data.size.saturating_sub(*offset);
            let to_read = len.min(available);
            let mut out = Vec::with_capacity(to_read as usize);
            let mut pos = *offset;
            let mut remaining = to_read;
            while remaining > 0 {
                let file_block = (pos / BLOCK_SIZE as u64) as usize;
                let intra = (pos % BLOCK_SIZE as u64) as usize;
                let Some(phys) = self.block_for_read(&data, file_block) else {
                    break;
                };
                let chunk = ((BLOCK_SIZE - intra) as u64).min(remaining) as usize;
                self.blocks.with_block(phys, |block| {
                    out.extend_from_slice(&block[intra..intra + chunk]);
                });
                remaining -= chunk as u64;
                pos += chunk as u64;
            }
            *offset += out.len() as u64;
            Ok(out)
        })
    }

    /// Opens `source` inside the file system and copies its full
    /// contents to `dest` on the host file system, as raw bytes (the
    /// original used `fprintf("%s", ...)`, which truncated at embedded
    /// `NUL`s; this copies the byte count verbatim instead).
    pub fn copy_to_external_fs(&self, source: &str, dest: &Path) -> Result<(), OpsError> {
        let handle = self.open(source, OpenFlags::empty())?;
        let mut out = match std::fs::File::create(dest) {
            Ok(file) => file,
            Err(err) => {
                self.close(handle);
                return Err(err.into());
            }
        };
        loop {
            let chunk = match self.read(handle, BLOCK_SIZE as u64) {
                Ok(chunk) => chunk,
                Err(err) => {
                    self.close(handle);
                    return Err(err);
                }
            };
            if chunk.is_empty() {
                break;
            }
            if let Err(err) = out.write_all(&chunk) {
                self.close(handle);
                return Err(err.into());
            }
        }
        self.close(handle);
        Ok(())
    }

    fn truncate_locked(&self, data: &mut InodeData) -> Result<(), OpsError> {
        for slot in data.direct.iter_mut() {
            if *slot >= 0 {
                self.blocks.free(*slot as usize)?;
                *slot = -1;
            }
        }
        if data.indirect_index_block >= 0 {
            let ind_index = data.indirect_index_block as usize;
            let entries: Vec<i32> =
                self.blocks.with_block(ind_index, |b| (0..INDIRECT_ENTRIES).map(|i| read_indirect_entry(b, i)).collect());
            for entry in entries {
                if entry >= 0 {
                    self.blocks.free(entry as usize)?;
                }
            }
            self.blocks.free(ind_index)?;
            data.indirect_index_block = -1;
        }
        data.size = 0;
        Ok(())
    }

    fn block_for_write(&self, data: &mut InodeData, file_block: usize) -> Result<usize, OpsError> {
        if file_block < DIRECT_BLOCKS {
            if data.direct[file_block] < 0 {
                data.direct[file_block] = self.blocks.alloc()? as i32;
            }
            return Ok(data.direct[file_block] as usize);
        }
        let slot = file_block - DIRECT_BLOCKS;
        if data.indirect_index_block < 0 {
            let ind_index = self.blocks.alloc()?;
            self.blocks.with_block(ind_index, init_indirect_block);
            data.indirect_index_block = ind_index as i32;
        }
        let ind_index = data.indirect_index_block as usize;
        let existing = self.blocks.with_block(ind_index, |b| read_indirect_entry(b, slot));
        if existing >= 0 {
            return Ok(existing as usize);
        }
        let new_block = self.blocks.alloc()?;
        self.blocks.with_block(ind_index, |b| write_indirect_entry(b, slot, new_block as i32));
        Ok(new_block)
    }

    fn block_for_read(&self, data: &InodeData, file_block: usize) -> Option<usize> {
        if file_block < DIRECT_BLOCKS {
            let b = data.direct[file_block];
            return (b >= 0).then_some(b as usize);
        }
        let slot = file_block - DIRECT_BLOCKS;
        if data.indirect_index_block < 0 {
            return None;
        }
        let ind_index = data.indirect_index_block as usize;
        let e = self.blocks.with_block(ind_index, |b| read_indirect_entry(b, slot));
        (e >= 0).then_some(e as usize)
    }
}
