//! The root directory: a flat table of (name, inumber) entries packed
//! into the root inode's first data block.

use tfs_types::{BLOCK_SIZE, FAIL, MAX_DIR_ENTRIES, NAME_SIZE, WireName};

use super::block::BlockPool;
use super::inode::{InodeError, InodeTable};

const ENTRY_SIZE: usize = 4 + NAME_SIZE;

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("directory is full")]
    Full,
    #[error("name does not fit in a directory entry")]
    NameTooLong,
    #[error(transparent)]
    Inode(#[from] InodeError),
}

fn entry_at(block: &[u8; BLOCK_SIZE], slot: usize) -> (i32, [u8; NAME_SIZE]) {
    let base = slot * ENTRY_SIZE;
    let inumber = i32::from_le_bytes(block[base..base + 4].try_into().unwrap());
    let mut name = [0u8; NAME_SIZE];
    name.copy_from_slice(&block[base + 4..base + 4 + NAME_SIZE]);
    (inumber, name)
}

fn write_entry(block: &mut [u8; BLOCK_SIZE], slot: usize, inumber: i32, name: &[u8; NAME_SIZE]) {
    let base = slot * ENTRY_SIZE;
    block[base..base + 4].copy_from_slice(&inumber.to_le_bytes());
    block[base + 4..base + 4 + NAME_SIZE].copy_from_slice(name);
}

/// Initializes a freshly allocated directory data block to all-empty
/// entries (`inumber == FAIL`).
pub fn init_block(block: &mut [u8; BLOCK_SIZE]) {
    for slot in 0..MAX_DIR_ENTRIES {
        write_entry(block, slot, FAIL, &[0u8; NAME_SIZE]);
    }
}

/// Looks up `name` in the directory rooted at `dir_inumber`. Returns
/// `FAIL` if there is no such entry.
pub fn find_in_dir(
    inodes: &InodeTable,
    blocks: &BlockPool,
    dir_inumber: i32,
    name: &str,
) -> Result<i32, DirectoryError> {
    let dir = inodes.get(dir_inumber)?;
    let data = dir.data.read().unwrap();
    let root_block = data.direct[0];
    if root_block < 0 {
        return Ok(FAIL);
    }
    let found = blocks.with_block(root_block as usize, |block| {
        for slot in 0..MAX_DIR_ENTRIES {
            let (inumber, raw_name) = entry_at(block, slot);
            if inumber < 0 {
                continue;
            }
            if WireName::from_wire(raw_name).as_str().ok() == Some(name) {
                return Some(inumber);
            }
        }
        None
    });
    Ok(found.unwrap_or(FAIL))
}

/// Adds a (name, inumber) entry to the first empty slot. Fails with
/// `Full` if there isn't one.
pub fn add_dir_entry(
    inodes: &InodeTable,
    blocks: &BlockPool,
    dir_inumber: i32,
    inumber: i32,
    name: &str,
) -> Result<(), DirectoryError> {
    let wire_name = WireName::from_str(name).map_err(|_| DirectoryError::NameTooLong)?;
    let dir = inodes.get(dir_inumber)?;
    let data = dir.data.write().unwrap();
    let root_block = data.direct[0];
    if root_block < 0 {
        return Err(DirectoryError::Full);
    }
    let placed = blocks.with_block(root_block as usize, |block| {
        for slot in 0..MAX_DIR_ENTRIES {
            let (existing, _) = entry_at(block, slot);
            if existing < 0 {
                write_entry(block, slot, inumber, &wire_name.as_wire());
                return true;
            }
        }
        false
    });
    if placed {
        Ok(())
    } else {
        Err(DirectoryError::Full)
    }
}
