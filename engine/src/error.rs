use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

/// The result type used in the entire engine module.
pub type Result<T> = std::result::Result<T, EngineErr>;

/// A failure reported by the inference engine itself.
///
/// It is carried up to the caller untouched, the training engine never retries.
#[derive(Debug)]
pub struct EngineFault(Box<dyn Error + Send + Sync>);

impl EngineFault {
    /// Wraps whatever error the underlying engine produced.
    pub fn new<E>(err: E) -> Self
    where
        E: Into<Box<dyn Error + Send + Sync>>,
    {
        Self(err.into())
    }

    /// Returns the wrapped error.
    pub fn into_inner(self) -> Box<dyn Error + Send + Sync> {
        self.0
    }
}

impl Display for EngineFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Error for EngineFault {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.0.source()
    }
}

/// The training engine's error type.
#[derive(Debug)]
pub enum EngineErr {
    LayerCountMismatch {
        got: usize,
        expected: usize,
    },
    Invocation {
        signature: &'static str,
        source: EngineFault,
    },
    MalformedOutput {
        signature: &'static str,
        detail: String,
    },
    Join(tokio::task::JoinError),
}

impl Display for EngineErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineErr::LayerCountMismatch { got, expected } => write!(
                f,
                "layer count mismatch, got {got} layers and expected {expected}"
            ),
            EngineErr::Invocation { signature, source } => {
                write!(f, "the inference engine failed running `{signature}`: {source}")
            }
            EngineErr::MalformedOutput { signature, detail } => {
                write!(f, "malformed output from `{signature}`: {detail}")
            }
            EngineErr::Join(e) => write!(f, "the training task didn't finish: {e}"),
        }
    }
}

impl Error for EngineErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            EngineErr::Invocation { source, .. } => Some(source),
            EngineErr::Join(e) => Some(e),
            _ => None,
        }
    }
}

impl From<tokio::task::JoinError> for EngineErr {
    fn from(value: tokio::task::JoinError) -> Self {
        Self::Join(value)
    }
}

/// Boundary conversion for binaries / I/O APIs.
impl From<EngineErr> for io::Error {
    fn from(value: EngineErr) -> Self {
        io::Error::new(io::ErrorKind::InvalidData, value)
    }
}
