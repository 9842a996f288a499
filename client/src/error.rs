use std::{error::Error, fmt, io};

use engine::EngineErr;

/// The client's result type.
pub type Result<T> = std::result::Result<T, ClientErr>;

/// Protocol violations from the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolErr {
    /// The instruction kind matches none of the known ones.
    Unreachable { kind: u32 },
}

impl fmt::Display for ProtocolErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolErr::Unreachable { kind } => {
                write!(f, "received an instruction of unknown kind {kind}")
            }
        }
    }
}

impl Error for ProtocolErr {}

/// Every failure that ends a session.
#[derive(Debug)]
pub enum ClientErr {
    Io(io::Error),
    Engine(EngineErr),
    Protocol(ProtocolErr),
    Join(tokio::task::JoinError),
    InvalidConfig { key: &'static str, detail: String },
}

impl fmt::Display for ClientErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientErr::Io(e) => write!(f, "io error: {e}"),
            ClientErr::Engine(e) => write!(f, "engine error: {e}"),
            ClientErr::Protocol(e) => write!(f, "protocol error: {e}"),
            ClientErr::Join(e) => write!(f, "an engine task didn't finish: {e}"),
            ClientErr::InvalidConfig { key, detail } => {
                write!(f, "invalid configuration for {key}: {detail}")
            }
        }
    }
}

impl Error for ClientErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ClientErr::Io(e) => Some(e),
            ClientErr::Engine(e) => Some(e),
            ClientErr::Protocol(e) => Some(e),
            ClientErr::Join(e) => Some(e),
            ClientErr::InvalidConfig { .. } => None,
        }
    }
}

impl From<io::Error> for ClientErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<EngineErr> for ClientErr {
    fn from(value: EngineErr) -> Self {
        Self::Engine(value)
    }
}

impl From<ProtocolErr> for ClientErr {
    fn from(value: ProtocolErr) -> Self {
        Self::Protocol(value)
    }
}

impl From<tokio::task::JoinError> for ClientErr {
    fn from(value: tokio::task::JoinError) -> Self {
        Self::Join(value)
    }
}

/// Boundary conversion for binaries / I/O APIs.
impl From<ClientErr> for io::Error {
    fn from(value: ClientErr) -> Self {
        match value {
            ClientErr::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
