use thiserror::Error;

#[derive(Debug, Error)]
pub enum CellError {
    #[error("invalid unit cell: {0}")]
    InvalidCell(String),
    #[error("singular matrix: {0}")]
    Singular(String),
}

pub type CellResult<T> = Result<T, CellError>;
