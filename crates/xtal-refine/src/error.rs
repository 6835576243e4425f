use thiserror::Error;
use xtal_core::CellError;

#[derive(Debug, Error)]
pub enum RefineError {
    #[error("array of {buffer} is too small: requested {requested} value(s) at offset {offset}, {remaining} remaining")]
    BufferTooSmall {
        buffer: &'static str,
        offset: usize,
        requested: usize,
        remaining: usize,
    },
    #[error("array of {buffer} is too large: {leftover} value(s) left after offset {consumed}")]
    BufferTooLarge {
        buffer: &'static str,
        consumed: usize,
        leftover: usize,
    },
    #[error("{what}: expected {expected} entries (one per site), got {found}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("precondition violated: {0}")]
    PreconditionViolated(String),
    #[error("negative u_iso for site {index} ({label}): u_iso = {u_iso}")]
    NegativeDisplacement {
        index: usize,
        label: String,
        u_iso: f64,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type RefineResult<T> = Result<T, RefineError>;

impl RefineError {
    /// Stable short name used in event streams.
    pub fn code(&self) -> &'static str {
        match self {
            Self::BufferTooSmall { .. } => "buffer_too_small",
            Self::BufferTooLarge { .. } => "buffer_too_large",
            Self::LengthMismatch { .. } => "length_mismatch",
            Self::PreconditionViolated(_) => "precondition_violated",
            Self::NegativeDisplacement { .. } => "negative_displacement",
            Self::Io(_) => "io",
            Self::Parse(_) => "parse",
            Self::Invalid(_) => "invalid",
        }
    }
}

impl From<CellError> for RefineError {
    fn from(err: CellError) -> Self {
        match err {
            CellError::InvalidCell(msg) => RefineError::Invalid(msg),
            CellError::Singular(msg) => RefineError::Invalid(format!("singular {msg}")),
        }
    }
}
