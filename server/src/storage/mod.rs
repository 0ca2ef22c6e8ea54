pub mod block;
pub mod directory;
pub mod inode;
pub mod open_file;
pub mod ops;

pub use ops::{FileSystem, OpsError};
