use std::fmt;

/// Contract violations raised by the engine. Unsafe content and missing
/// sessions are not errors; these are reserved for genuine misuse.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreError {
    DimensionMismatch { expected: usize, actual: usize },
    EmptyInput(String),
    AlreadyInitialized(String),
    NotInitialized(String),
    InvalidOption(String),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::DimensionMismatch { expected, actual } => {
                write!(f, "dimension mismatch: expected {expected}, got {actual}")
            }
            CoreError::EmptyInput(what) => write!(f, "empty input: {what}"),
            CoreError::AlreadyInitialized(id) => {
                write!(f, "consciousness state {id} is already initialized")
            }
            CoreError::NotInitialized(id) => {
                write!(f, "consciousness state {id} has not been initialized")
            }
            CoreError::InvalidOption(msg) => write!(f, "invalid option: {msg}"),
        }
    }
}

impl std::error::Error for CoreError {}

pub type Result<T> = std::result::Result<T, CoreError>;
