//! Pure encode/decode for the TecnicoFS wire protocol (§6 of the spec).
//!
//! This crate does no I/O. Sequencing the actual reads off a named pipe
//! (including short-read/`EINTR` handling and the end-of-stream reopen
//! dance) is the dispatcher's job; this crate only turns already-read
//! byte chunks into [`Request`]s and turns [`Response`]s into bytes.

use tfs_types::{NAME_SIZE, OpenFlags, WireName};

/// Width in bytes of an `int32` field on the wire.
pub const INT32_SIZE: usize = 4;
/// Width in bytes of a `size_t`/`ssize_t` field on the wire.
pub const LEN_SIZE: usize = 8;

pub fn encode_i32(v: i32) -> [u8; INT32_SIZE] {
    v.to_le_bytes()
}

pub fn decode_i32(bytes: [u8; INT32_SIZE]) -> i32 {
    i32::from_le_bytes(bytes)
}

pub fn encode_u64(v: u64) -> [u8; LEN_SIZE] {
    v.to_le_bytes()
}

pub fn decode_u64(bytes: [u8; LEN_SIZE]) -> u64 {
    u64::from_le_bytes(bytes)
}

pub fn encode_i64(v: i64) -> [u8; LEN_SIZE] {
    v.to_le_bytes()
}

/// A fully decoded client request, already addressed to a session.
#[derive(Debug, Clone)]
pub enum Request {
    Mount { client_pipe: WireName },
    Unmount { session_id: i32 },
    Open { session_id: i32, name: WireName, flags: OpenFlags },
    Close { session_id: i32, handle: i32 },
    Write { session_id: i32, handle: i32, data: Vec<u8> },
    Read { session_id: i32, handle: i32, len: u64 },
    Shutdown { session_id: i32 },
}

impl Request {
    /// The session this request is addressed to, if any (MOUNT has none
    /// yet — it is routed by the dispatcher before a session exists).
    pub fn session_id(&self) -> Option<i32> {
        match self {
            Self::Mount { .. } => None,
            Self::Unmount { session_id }
            | Self::Open { session_id, .. }
            | Self::Close { session_id, .. }
            | Self::Write { session_id, .. }
            | Self::Read { session_id, .. }
            | Self::Shutdown { session_id } => Some(*session_id),
        }
    }
}

pub fn decode_mount(name: [u8; NAME_SIZE]) -> Request {
    Request::Mount {
        client_pipe: WireName::from_wire(name),
    }
}

pub fn decode_unmount(session_id: i32) -> Request {
    Request::Unmount { session_id }
}

pub fn decode_open(session_id: i32, name: [u8; NAME_SIZE], flags: i32) -> Request {
    Request::Open {
        session_id,
        name: WireName::from_wire(name),
        flags: OpenFlags::from_bits_truncate(flags),
    }
}

pub fn decode_close(session_id: i32, handle: i32) -> Request {
    Request::Close { session_id, handle }
}

pub fn decode_write(session_id: i32, handle: i32, data: Vec<u8>) -> Request {
    Request::Write { session_id, handle, data }
}

pub fn decode_read(session_id: i32, handle: i32, len: u64) -> Request {
    Request::Read { session_id, handle, len }
}

pub fn decode_shutdown(session_id: i32) -> Request {
    Request::Shutdown { session_id }
}

/// Outcome of a READ operation, as it goes on the wire: a negative
/// length means error and no trailing bytes follow.
#[derive(Debug, Clone)]
pub enum ReadOutcome {
    Data(Vec<u8>),
    Error,
}

/// A response frame, ready to be written verbatim to a client pipe.
///
/// `Unmount` has no variant here: the protocol sends no response body
/// for UNMOUNT (see `spec.md` §6 and the original server's `unmount()`,
/// which never writes to the client pipe).
#[derive(Debug, Clone)]
pub enum Response {
    Mount(i32),
    Open(i32),
    Close(i32),
    Write(i64),
    Read(ReadOutcome),
    Shutdown(i32),
}

impl Response {
    /// Encodes this response into the exact bytes written to the client
    /// pipe. Bounded by the frame's own size — no unrelated allocation.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Mount(id) | Self::Open(id) | Self::Close(id) | Self::Shutdown(id) => {
                encode_i32(*id).to_vec()
            }
            Self::Write(n) => encode_i64(*n).to_vec(),
            Self::Read(ReadOutcome::Error) => encode_i64(-1).to_vec(),
            Self::Read(ReadOutcome::Data(data)) => {
                let mut out = Vec::with_capacity(LEN_SIZE + data.len());
                out.extend_from_slice(&encode_i64(data.len() as i64));
                out.extend_from_slice(data);
                out
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int32_round_trips() {
        assert_eq!(decode_i32(encode_i32(-7)), -7);
        assert_eq!(decode_i32(encode_i32(i32::MAX)), i32::MAX);
    }

    #[test]
    fn write_response_encodes_as_ssize_t() {
        let bytes = Response::Write(42).encode();
        assert_eq!(bytes.len(), LEN_SIZE);
        assert_eq!(i64::from_le_bytes(bytes.try_into().unwrap()), 42);
    }

    #[test]
    fn read_response_error_has_no_payload() {
        let bytes = Response::Read(ReadOutcome::Error).encode();
        assert_eq!(bytes.len(), LEN_SIZE);
        assert_eq!(i64::from_le_bytes(bytes.try_into().unwrap()), -1);
    }

    #[test]
    fn read_response_data_carries_len_then_bytes() {
        let bytes = Response::Read(ReadOutcome::Data(vec![1, 2, 3])).encode();
        assert_eq!(&bytes[..LEN_SIZE], &encode_i64(3));
        assert_eq!(&bytes[LEN_SIZE..], &[1, 2, 3]);
    }

    #[test]
    fn decode_open_parses_flags() {
        let req = decode_open(3, [0u8; NAME_SIZE], 0b011);
        match req {
            Request::Open { session_id, flags, .. } => {
                assert_eq!(session_id, 3);
                assert!(flags.contains(OpenFlags::CREAT | OpenFlags::TRUNC));
            }
            _ => panic!("wrong variant"),
        }
    }
}
