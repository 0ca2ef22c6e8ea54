use std::path::PathBuf;

use clap::Parser;

/// TecnicoFS server: binds a named server pipe and serves concurrent
/// clients until it receives a shutdown request.
#[derive(Debug, Parser)]
#[command(name = "tfs-server", version, about)]
pub struct Args {
    /// Path of the server's named pipe, created fresh on startup.
    pub server_pipe_path: PathBuf,
}
