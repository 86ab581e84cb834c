use std::fmt;

/// Unified error type for the skip list and packed list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A required operand was absent (e.g. comparing against a missing side).
    NullOperand,
    /// A packed-list value was neither an integer nor a byte string.
    UnknownValueType,
    /// A byte string's length exceeds the packed-list's 32-bit length field.
    ValueTooLarge,
    /// A decoded buffer's length fields reference outside the buffer, or the
    /// terminator byte is missing.
    CorruptBuffer(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NullOperand => write!(f, "null operand"),
            Error::UnknownValueType => write!(f, "unknown value type"),
            Error::ValueTooLarge => write!(f, "value too large"),
            Error::CorruptBuffer(msg) => write!(f, "corrupt buffer: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
