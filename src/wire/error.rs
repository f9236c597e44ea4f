// Decode errors.
//
// Every failure is fatal for the read call that produced it: the decoder never
// skips ahead or resynchronizes. Each variant records the cursor position at
// which the inconsistency was detected.

use super::tag::TypeTag;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// A read would pass the end of the buffer.
    #[error("out of bounds at {position}: need {needed} byte(s), buffer length {length}")]
    OutOfBounds {
        position: usize,
        needed: usize,
        length: usize,
    },

    /// The tag byte differs from the tag a typed reader requires.
    #[error("type mismatch at {position}: expected {expected}, found tag byte {found:#04X}")]
    TypeMismatch {
        position: usize,
        expected: TypeTag,
        found: u8,
    },

    /// A well-formed value that is not legal at this point of the grammar.
    #[error("protocol violation at {position}: {reason}")]
    ProtocolViolation { position: usize, reason: String },
}

impl DecodeError {
    pub(crate) fn violation(position: usize, reason: impl Into<String>) -> Self {
        Self::ProtocolViolation {
            position,
            reason: reason.into(),
        }
    }

    /// Cursor position at which the error was detected.
    pub fn position(&self) -> usize {
        match self {
            Self::OutOfBounds { position, .. }
            | Self::TypeMismatch { position, .. }
            | Self::ProtocolViolation { position, .. } => *position,
        }
    }
}

pub type Result<T> = std::result::Result<T, DecodeError>;
