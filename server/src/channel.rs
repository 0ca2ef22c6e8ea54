//! Named-pipe transport helpers. Creation goes through `nix` (`std` has
//! no `mkfifo`); actual reads and writes go through `std::fs::File`,
//! whose `Read`/`Write` impls already retry on `EINTR` and loop short
//! I/O the way the original server's hand-rolled retry loops did.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

use nix::sys::signal::{SigHandler, Signal, signal};
use nix::sys::stat::Mode;
use nix::unistd::mkfifo;

fn nix_to_io(err: nix::Error) -> io::Error {
    io::Error::from_raw_os_error(err as i32)
}

/// Creates the server's named pipe, removing any stale file left over
/// from a previous run first.
pub fn create_pipe(path: &Path) -> io::Result<()> {
    let _ = std::fs::remove_file(path);
    mkfifo(path, Mode::from_bits_truncate(0o666)).map_err(nix_to_io)
}

/// Opens a named pipe for reading. Blocks until a writer connects.
pub fn open_read(path: &Path) -> io::Result<File> {
    OpenOptions::new().read(true).open(path)
}

/// Opens a named pipe for writing. Blocks until a reader connects.
pub fn open_write(path: &Path) -> io::Result<File> {
    OpenOptions::new().write(true).open(path)
}

/// Ignores `SIGPIPE` so a write to a client that has vanished surfaces
/// as an `EPIPE` I/O error instead of killing the process.
pub fn ignore_sigpipe() -> io::Result<()> {
    unsafe { signal(Signal::SIGPIPE, SigHandler::SigIgn) }
        .map(|_| ())
        .map_err(nix_to_io)
}
