use thiserror::Error;

/// Errors produced by the builder, the descent engine and the framer.
///
/// Every variant is terminal for the request that produced it. Callers are
/// expected to surface the message unchanged.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// The formula text could not be turned into an expression.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// A gradient evaluation produced a non-finite value mid-descent.
    #[error(transparent)]
    Numeric(#[from] NumericError),
    /// Input data has the wrong shape (empty, ragged or wrong dimension).
    #[error("shape error: {0}")]
    Shape(String),
    /// A numeric argument or declaration violates its precondition.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The VM ran out of operands; only reachable through hand-built bytecode.
    #[error("malformed bytecode: {0}")]
    MalformedBytecode(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Parser diagnostic with the byte offset it refers to.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

/// Failure of one descent iteration.
///
/// `iteration` is zero-based: iteration `k` computes trajectory element `k + 1`
/// from `point`, which is trajectory element `k`.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("descent stopped at iteration {iteration} from point {point:?}: {reason}")]
pub struct NumericError {
    pub iteration: usize,
    pub point: Vec<f64>,
    pub reason: String,
}

pub(crate) fn shape(message: impl Into<String>) -> Error {
    Error::Shape(message.into())
}

pub(crate) fn invalid(message: impl Into<String>) -> Error {
    Error::InvalidArgument(message.into())
}
