//! The single dispatcher thread: reads frames off the shared server
//! pipe, decodes them, and deposits them into the addressed session's
//! mailbox. Grounded on the original server's main loop, including its
//! "reopen the pipe on EOF" behavior (a named pipe reports EOF once its
//! last writer closes, not once forever).

use std::io::{Read, Write as _};
use std::path::Path;
use std::sync::atomic::Ordering;

use tfs_proto::Request;
use tfs_types::{ALL_TAKEN, NAME_SIZE, OpCode};
use tracing::warn;

use crate::ServerState;
use crate::channel;
use crate::error::ServerError;

pub fn run(state: &ServerState, server_pipe_path: &Path) -> Result<(), ServerError> {
    let mut server_file = channel::open_read(server_pipe_path).map_err(ServerError::PipeOpen)?;

    while state.running.load(Ordering::Acquire) {
        let mut opcode_byte = [0u8; 1];
        let n = server_file.read(&mut opcode_byte)?;
        if n == 0 {
            drop(server_file);
            server_file = channel::open_read(server_pipe_path).map_err(ServerError::PipeOpen)?;
            continue;
        }

        let opcode = match OpCode::from_byte(opcode_byte[0]) {
            Ok(opcode) => opcode,
            Err(err) => {
                warn!(%err, "dropping frame with unknown opcode");
                continue;
            }
        };

        if opcode == OpCode::Mount {
            handle_mount(state, &mut server_file)?;
            continue;
        }

        let mut session_bytes = [0u8; 4];
        server_file.read_exact(&mut session_bytes)?;
        let session_id = tfs_proto::decode_i32(session_bytes);

        let request = match opcode {
            OpCode::Unmount => tfs_proto::decode_unmount(session_id),
            OpCode::Open => {
                let mut name_bytes = [0u8; NAME_SIZE];
                server_file.read_exact(&mut name_bytes)?;
                let mut flags_bytes = [0u8; 4];
                server_file.read_exact(&mut flags_bytes)?;
                tfs_proto::decode_open(session_id, name_bytes, tfs_proto::decode_i32(flags_bytes))
            }
            OpCode::Close => {
                let mut handle_bytes = [0u8; 4];
                server_file.read_exact(&mut handle_bytes)?;
                tfs_proto::decode_close(session_id, tfs_proto::decode_i32(handle_bytes))
            }
            OpCode::Write => {
                let mut handle_bytes = [0u8; 4];
                server_file.read_exact(&mut handle_bytes)?;
                let mut len_bytes = [0u8; 8];
                server_file.read_exact(&mut len_bytes)?;
                let len = tfs_proto::decode_u64(len_bytes);
                let mut data = vec![0u8; len as usize];
                server_file.read_exact(&mut data)?;
                tfs_proto::decode_write(session_id, tfs_proto::decode_i32(handle_bytes), data)
            }
            OpCode::Read => {
                let mut handle_bytes = [0u8; 4];
                server_file.read_exact(&mut handle_bytes)?;
                let mut len_bytes = [0u8; 8];
                server_file.read_exact(&mut len_bytes)?;
                tfs_proto::decode_read(
                    session_id,
                    tfs_proto::decode_i32(handle_bytes),
                    tfs_proto::decode_u64(len_bytes),
                )
            }
            OpCode::ShutdownAfterAllClosed => tfs_proto::decode_shutdown(session_id),
            OpCode::Mount => unreachable!("handled above"),
        };

        if let Some(mailbox) = state.mailboxes.get(session_id as usize) {
            mailbox.deposit(request, || state.running.load(Ordering::Acquire));
        } else {
            warn!(session_id, "dropping frame addressed to an invalid session");
        }
    }

    Ok(())
}

fn handle_mount(state: &ServerState, server_file: &mut std::fs::File) -> Result<(), ServerError> {
    let mut name_bytes = [0u8; NAME_SIZE];
    server_file.read_exact(&mut name_bytes)?;
    let request = tfs_proto::decode_mount(name_bytes);
    let client_path = match &request {
        Request::Mount { client_pipe } => client_pipe.as_str().unwrap_or_default().to_string(),
        _ => unreachable!(),
    };

    match state.sessions.reserve() {
        Ok(session_id) => match channel::open_write(&client_path) {
            Ok(client_file) => {
                state.sessions.attach(session_id, client_file);
                state.mailboxes[session_id as usize]
                    .deposit(request, || state.running.load(Ordering::Acquire));
            }
            Err(err) => {
                warn!(%err, "failed to open client pipe for mount");
                state.sessions.release(session_id);
            }
        },
        Err(_all_taken) => {
            if let Ok(mut client_file) = channel::open_write(&client_path) {
                let _ = client_file.write_all(&tfs_proto::encode_i32(ALL_TAKEN));
            }
        }
    }
    Ok(())
}
