use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

use tokio::task::JoinError;

/// The master's result type.
pub type Result<T> = std::result::Result<T, MasterErr>;

/// All errors that can occur while coordinating a distributed run.
#[derive(Debug)]
pub enum MasterErr {
    /// Invalid configuration or data, caught before connecting.
    InvalidConfig(String),
    /// Failed to connect to a worker.
    ConnectionFailed { addr: String, source: io::Error },
    /// A worker reported an unrecoverable error.
    WorkerError { worker_id: usize, msg: String },
    /// A worker broke the protocol.
    UnexpectedMessage {
        worker_id: usize,
        expected: &'static str,
        got: &'static str,
    },
    /// A worker answered with a parameter vector of the wrong size.
    ParamsLengthMismatch {
        worker_id: usize,
        got: usize,
        expected: usize,
    },
    /// A session task panicked or was cancelled before finishing.
    SessionAborted {
        worker_id: Option<usize>,
        source: JoinError,
    },
    Io(io::Error),
}

impl Display for MasterErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::ConnectionFailed { addr, source } => {
                write!(f, "connection failed to {addr}: {source}")
            }
            Self::WorkerError { worker_id, msg } => write!(f, "worker {worker_id} error: {msg}"),
            Self::UnexpectedMessage {
                worker_id,
                expected,
                got,
            } => write!(
                f,
                "worker {worker_id} sent an unexpected message: expected {expected}, got {got}"
            ),
            Self::ParamsLengthMismatch {
                worker_id,
                got,
                expected,
            } => write!(
                f,
                "worker {worker_id} sent {got} parameters, expected {expected}"
            ),
            Self::SessionAborted {
                worker_id: Some(worker_id),
                source,
            } => write!(f, "worker {worker_id} session aborted: {source}"),
            Self::SessionAborted { source, .. } => write!(f, "worker session aborted: {source}"),
            Self::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for MasterErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ConnectionFailed { source, .. } => Some(source),
            Self::SessionAborted { source, .. } => Some(source),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for MasterErr {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for MasterErr {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidConfig(e.to_string())
    }
}

/// Boundary conversion for binaries / I/O APIs.
impl From<MasterErr> for io::Error {
    fn from(value: MasterErr) -> Self {
        match value {
            MasterErr::Io(e) => e,
            other => io::Error::other(other),
        }
    }
}
