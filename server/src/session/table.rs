//! Session table: `SESSION_COUNT` slots, each holding the client's pipe
//! once MOUNT has assigned it. Allocation is serialized by one mutex;
//! each slot's client handle lives behind its own mutex so writing a
//! response to one session never blocks mounting or unmounting another.

use std::fs::File;
use std::io::Write as _;
use std::sync::Mutex;

use tfs_types::SESSION_COUNT;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no free session slot")]
    AllTaken,
}

struct Slot {
    client: Mutex<Option<File>>,
}

pub struct SessionTable {
    slots: Vec<Slot>,
    taken: Mutex<Vec<bool>>,
}

impl SessionTable {
    pub fn new() -> Self {
        let slots = (0..SESSION_COUNT).map(|_| Slot { client: Mutex::new(None) }).collect();
        Self { slots, taken: Mutex::new(vec![false; SESSION_COUNT]) }
    }

    /// Reserves the first free slot without yet attaching a client
    /// handle. Mirrors the original server: the session id is claimed
    /// before the (possibly slow) client-pipe open happens.
    pub fn reserve(&self) -> Result<i32, SessionError> {
        let mut taken = self.taken.lock().unwrap();
        let index = taken.iter().position(|&t| !t).ok_or(SessionError::AllTaken)?;
        taken[index] = true;
        Ok(index as i32)
    }

    pub fn attach(&self, session_id: i32, client: File) {
        *self.slots[session_id as usize].client.lock().unwrap() = Some(client);
    }

    /// Frees a slot: UNMOUNT, an explicit client hangup, or rollback of
    /// a reservation whose client pipe never got attached.
    pub fn release(&self, session_id: i32) {
        if let Some(slot) = self.slots.get(session_id as usize) {
            *slot.client.lock().unwrap() = None;
        }
        if let Some(taken) = self.taken.lock().unwrap().get_mut(session_id as usize) {
            *taken = false;
        }
    }

    pub fn write_to_client(&self, session_id: i32, bytes: &[u8]) -> std::io::Result<()> {
        let slot = self.slots.get(session_id as usize).ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "invalid session id")
        })?;
        let mut guard = slot.client.lock().unwrap();
        match guard.as_mut() {
            Some(file) => file.write_all(bytes),
            None => Err(std::io::Error::new(std::io::ErrorKind::NotConnected, "session not mounted")),
        }
    }
}
