//! Constants, fixed-width wire types, and opcodes shared between the
//! server's dispatcher/codec and its test harness.

use core::fmt;

use bitflags::bitflags;
use strum::FromRepr;

/// Bytes per data block.
pub const BLOCK_SIZE: usize = 1024;
/// Direct block pointers carried in every inode.
pub const DIRECT_BLOCKS: usize = 10;
/// Block pointers carried in one indirect-index block.
pub const INDIRECT_ENTRIES: usize = BLOCK_SIZE / size_of::<i32>();
/// Inode slots in the table.
pub const INODE_COUNT: usize = 64;
/// Data blocks in the pool.
pub const BLOCK_COUNT: usize = 1024;
/// Open-file-table slots.
pub const OPEN_FILE_COUNT: usize = 32;
/// Session slots (`S` in the spec); also the worker-pool size.
pub const SESSION_COUNT: usize = 20;
/// Fixed-width name field on the wire (file names and client pipe paths).
pub const NAME_SIZE: usize = 40;
/// Directory entries held in the root directory's single data block.
pub const MAX_DIR_ENTRIES: usize = BLOCK_SIZE / (NAME_SIZE + size_of::<i32>());

/// The inumber the root directory always occupies.
pub const ROOT_DIR_INUM: i32 = 0;

/// Sentinel used throughout the wire protocol and tables for "none"/"full".
pub const FAIL: i32 = -1;
/// Sentinel returned by MOUNT when no session slot is free.
pub const ALL_TAKEN: i32 = -1;

bitflags! {
    /// `tfs_open` flags, bit-compatible with the original C `TFS_O_*` values.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct OpenFlags: i32 {
        const CREAT = 0b001;
        const TRUNC = 0b010;
        const APPEND = 0b100;
    }
}

/// One wire-protocol opcode byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
#[repr(u8)]
pub enum OpCode {
    Mount = 1,
    Unmount = 2,
    Open = 3,
    Close = 4,
    Write = 5,
    Read = 6,
    ShutdownAfterAllClosed = 7,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown opcode byte {0}")]
pub struct UnknownOpCode(pub u8);

impl OpCode {
    pub fn from_byte(byte: u8) -> Result<Self, UnknownOpCode> {
        Self::from_repr(byte).ok_or(UnknownOpCode(byte))
    }

    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// A fixed-width, `NUL`-padded name field as carried on the wire.
///
/// Used for both file names (relative to the flat root directory) and
/// client pipe paths.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct WireName {
    bytes: [u8; NAME_SIZE],
}

#[derive(Debug, thiserror::Error)]
pub enum NameError {
    #[error("name longer than {NAME_SIZE} bytes (including NUL terminator)")]
    TooLong,
    #[error("name is not valid UTF-8")]
    NotUtf8,
}

impl WireName {
    pub fn from_str(s: &str) -> Result<Self, NameError> {
        let s = s.as_bytes();
        if s.len() >= NAME_SIZE {
            return Err(NameError::TooLong);
        }
        let mut bytes = [0u8; NAME_SIZE];
        bytes[..s.len()].copy_from_slice(s);
        Ok(Self { bytes })
    }

    pub fn from_wire(bytes: [u8; NAME_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_wire(&self) -> [u8; NAME_SIZE] {
        self.bytes
    }

    /// The name up to (not including) its first `NUL` byte.
    pub fn as_str(&self) -> Result<&str, NameError> {
        let end = self
            .bytes
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(NAME_SIZE);
        core::str::from_utf8(&self.bytes[..end]).map_err(|_| NameError::NotUtf8)
    }
}

impl fmt::Debug for WireName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Ok(s) => write!(f, "WireName({s:?})"),
            Err(_) => write!(f, "WireName({:?})", self.bytes),
        }
    }
}
