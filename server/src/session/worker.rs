//! One thread per session for its whole lifetime: wait on the mailbox,
//! execute exactly one request against the storage engine, answer the
//! client, repeat. Grounded on the original server's `work()` loop.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use tfs_proto::{ReadOutcome, Request, Response};
use tracing::{info, warn};

use crate::ServerState;

pub fn run(session_id: i32, state: Arc<ServerState>) {
    loop {
        let is_running = {
            let state = Arc::clone(&state);
            move || state.running.load(Ordering::Acquire)
        };
        let Some(request) = state.mailboxes[session_id as usize].take(is_running) else {
            break;
        };
        let is_shutdown = matches!(request, Request::Shutdown { .. });

        if let Err(err) = answer(session_id, request, &state) {
            warn!(session_id, error = %err, "client write failed, releasing session");
            state.sessions.release(session_id);
        }

        state.mailboxes[session_id as usize].finish();

        if is_shutdown {
            info!(session_id, "shutdown acknowledged, worker exiting");
            break;
        }
    }
}

fn answer(session_id: i32, request: Request, state: &ServerState) -> std::io::Result<()> {
    match request {
        Request::Mount { .. } => {
            state.sessions.write_to_client(session_id, &Response::Mount(session_id).encode())
        }
        Request::Unmount { .. } => {
            // The original `unmount()` never writes a response; it only
            // closes the client pipe and frees the slot.
            state.sessions.release(session_id);
            Ok(())
        }
        Request::Open { name, flags, .. } => {
            let answer = match name.as_str() {
                Ok(name) => state.fs.open(name, flags).unwrap_or(-1),
                Err(_) => -1,
            };
            state.sessions.write_to_client(session_id, &Response::Open(answer).encode())
        }
        Request::Close { handle, .. } => {
            let answer = state.fs.close(handle);
            state.sessions.write_to_client(session_id, &Response::Close(answer).encode())
        }
        Request::Write { handle, data, .. } => {
            let answer = state.fs.write(handle, &data);
            state.sessions.write_to_client(session_id, &Response::Write(answer).encode())
        }
        Request::Read { handle, len, .. } => {
            let outcome = match state.fs.read(handle, len) {
                Ok(bytes) => ReadOutcome::Data(bytes),
                Err(_) => ReadOutcome::Error,
            };
            state.sessions.write_to_client(session_id, &Response::Read(outcome).encode())
        }
        Request::Shutdown { .. } => {
            let result = state.sessions.write_to_client(session_id, &Response::Shutdown(0).encode());
            state.running.store(false, Ordering::Release);
            for mailbox in &state.mailboxes {
                mailbox.notify_shutdown();
            }
            result
        }
    }
}
