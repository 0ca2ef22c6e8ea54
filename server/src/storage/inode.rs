//! Fixed table of inode slots. Allocation is serialized by one mutex;
//! each slot's contents live behind their own `RwLock` so readers of one
//! inode never wait on writers of another.

use std::sync::RwLock;
use std::sync::Mutex;

use tfs_types::{DIRECT_BLOCKS, INODE_COUNT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeKind {
    File,
    Directory,
}

#[derive(Debug, Clone)]
pub struct InodeData {
    pub kind: InodeKind,
    pub size: u64,
    pub direct: [i32; DIRECT_BLOCKS],
    pub indirect_index_block: i32,
}

impl InodeData {
    fn fresh(kind: InodeKind) -> Self {
        Self {
            kind,
            size: 0,
            direct: [-1; DIRECT_BLOCKS],
            indirect_index_block: -1,
        }
    }
}

pub struct Inode {
    pub data: RwLock<InodeData>,
}

#[derive(Debug, thiserror::Error)]
pub enum InodeError {
    #[error("inode table exhausted")]
    OutOfInodes,
    #[error("invalid inumber {0}")]
    InvalidInumber(i32),
}

pub struct InodeTable {
    slots: Vec<Inode>,
    used: Mutex<Vec<bool>>,
}

impl InodeTable {
    pub fn new() -> Self {
        let slots = (0..INODE_COUNT)
            .map(|_| Inode { data: RwLock::new(InodeData::fresh(InodeKind::File)) })
            .collect();
        Self { slots, used: Mutex::new(vec![false; INODE_COUNT]) }
    }

    pub fn create(&self, kind: InodeKind) -> Result<i32, InodeError> {
        let mut used = self.used.lock().unwrap();
        let index = used.iter().position(|&taken| !taken).ok_or(InodeError::OutOfInodes)?;
        used[index] = true;
        drop(used);
        *self.slots[index].data.write().unwrap() = InodeData::fresh(kind);
        Ok(index as i32)
    }

    pub fn get(&self, inumber: i32) -> Result<&Inode, InodeError> {
        usize::try_from(inumber)
            .ok()
            .and_then(|idx| self.slots.get(idx))
            .ok_or(InodeError::InvalidInumber(inumber))
    }

    /// Frees `inumber`'s slot for reuse. Used for truncation and to roll
    /// back a `create` whose caller failed to link the inode anywhere.
    pub fn delete(&self, inumber: i32) -> Result<(), InodeError> {
        let index = usize::try_from(inumber)
            .ok()
            .filter(|&idx| idx < self.slots.len())
            .ok_or(InodeError::InvalidInumber(inumber))?;
        let mut used = self.used.lock().unwrap();
        if !used[index] {
            return Err(InodeError::InvalidInumber(inumber));
        }
        used[index] = false;
        Ok(())
    }
}
