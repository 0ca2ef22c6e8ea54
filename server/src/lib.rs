pub mod channel;
pub mod config;
pub mod error;
pub mod session;
pub mod storage;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use tfs_types::SESSION_COUNT;
use tracing::info;

use error::ServerError;
use session::{dispatcher, mailbox::Mailbox, table::SessionTable, worker};
use storage::FileSystem;

/// All server-wide mutable state, owned for the process lifetime and
/// shared by reference with every dispatcher/worker thread. No global
/// or static storage.
pub struct ServerState {
    pub fs: FileSystem,
    pub sessions: SessionTable,
    pub mailboxes: Vec<Mailbox>,
    pub running: AtomicBool,
}

impl ServerState {
    pub fn new() -> Self {
        Self {
            fs: FileSystem::new(),
            sessions: SessionTable::new(),
            mailboxes: (0..SESSION_COUNT).map(|_| Mailbox::new()).collect(),
            running: AtomicBool::new(true),
        }
    }
}

/// Creates the server pipe, spawns one worker thread per session, and
/// runs the dispatcher on the calling thread until shutdown. Used by
/// both the `tfs-server` binary and the integration test harness.
pub fn run(server_pipe_path: &Path) -> Result<(), ServerError> {
    info!(path = %server_pipe_path.display(), "starting TecnicoFS server");

    channel::ignore_sigpipe().map_err(ServerError::Signal)?;
    channel::create_pipe(server_pipe_path).map_err(ServerError::PipeCreate)?;

    let state = Arc::new(ServerState::new());

    let mut worker_handles = Vec::with_capacity(SESSION_COUNT);
    for session_id in 0..SESSION_COUNT {
        let state = Arc::clone(&state);
        let handle = std::thread::Builder::new()
            .name(format!("tfs-worker-{session_id}"))
            .spawn(move || worker::run(session_id as i32, state))
            .map_err(ServerError::ThreadSpawn)?;
        worker_handles.push(handle);
    }

    let dispatch_result = dispatcher::run(&state, server_pipe_path);

    for handle in worker_handles {
        let _ = handle.join();
    }

    info!("server shut down");
    dispatch_result
}
