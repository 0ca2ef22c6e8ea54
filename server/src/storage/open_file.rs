//! Open-file table: maps a handle to the inode it was opened against and
//! a cursor offset. Each slot carries its own mutex so two different
//! handles never contend with one another.

use std::sync::Mutex;

use tfs_types::OPEN_FILE_COUNT;

#[derive(Debug, thiserror::Error)]
pub enum OpenFileError {
    #[error("open file table exhausted")]
    OutOfHandles,
    #[error("invalid file handle {0}")]
    InvalidHandle(i32),
}

enum Slot {
    Free,
    Taken { inumber: i32, offset: u64 },
}

pub struct OpenFileTable {
    slots: Vec<Mutex<Slot>>,
}

impl OpenFileTable {
    pub fn new() -> Self {
        Self { slots: (0..OPEN_FILE_COUNT).map(|_| Mutex::new(Slot::Free)).collect() }
    }

    pub fn add(&self, inumber: i32, offset: u64) -> Result<i32, OpenFileError> {
        for (index, slot) in self.slots.iter().enumerate() {
            let mut guard = slot.lock().unwrap();
            if matches!(*guard, Slot::Free) {
                *guard = Slot::Taken { inumber, offset };
                return Ok(index as i32);
            }
        }
        Err(OpenFileError::OutOfHandles)
    }

    pub fn remove(&self, handle: i32) -> Result<(), OpenFileError> {
        let slot = self.slot(handle)?;
        let mut guard = slot.lock().unwrap();
        if matches!(*guard, Slot::Free) {
            return Err(OpenFileError::InvalidHandle(handle));
        }
        *guard = Slot::Free;
        Ok(())
    }

    /// Runs `f` against the entry's (inumber, offset) while holding its
    /// mutex for the whole operation — this is what lets a write or read
    /// mutate the cursor atomically with the storage work it drives.
    pub fn with_entry<R, E>(
        &self,
        handle: i32,
        f: impl FnOnce(i32, &mut u64) -> Result<R, E>,
    ) -> Result<R, E>
    where
        E: From<OpenFileError>,
    {
        let slot = match self.slot(handle) {
            Ok(slot) => slot,
            Err(err) => return Err(E::from(err)),
        };
        let mut guard = slot.lock().unwrap();
        match &mut *guard {
            Slot::Taken { inumber, offset } => f(*inumber, offset),
            Slot::Free => Err(E::from(OpenFileError::InvalidHandle(handle))),
        }
    }

    fn slot(&self, handle: i32) -> Result<&Mutex<Slot>, OpenFileError> {
        usize::try_from(handle)
            .ok()
            .and_then(|idx| self.slots.get(idx))
            .ok_or(OpenFileError::InvalidHandle(handle))
    }
}
