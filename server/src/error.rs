use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to create server pipe: {0}")]
    PipeCreate(#[source] std::io::Error),
    #[error("failed to open server pipe: {0}")]
    PipeOpen(#[source] std::io::Error),
    #[error("failed to ignore SIGPIPE: {0}")]
    Signal(#[source] std::io::Error),
    #[error("failed to spawn worker thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
