//! Error types for encoding and decoding.

use std::path::PathBuf;

use thiserror::Error;

use crate::min_heap::HeapErr;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, HuffmanError>;

#[derive(Debug, Error)]
pub enum HuffmanError {
    /// The input path is missing or cannot be opened.
    #[error("cannot read input {}: {source}", .path.display())]
    Input {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The input exists but cannot be represented in a container.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The caller asked for something that makes no sense.
    #[error("usage error: {0}")]
    Usage(String),

    /// Malformed container. `offset` is the byte position the problem was
    /// detected at, when known.
    #[error("malformed container{}: {message}", offset_suffix(.offset))]
    Format {
        offset: Option<u64>,
        message: String,
    },

    /// An algorithm invariant did not hold. Never expected with valid inputs.
    #[error("internal consistency violated: {0}")]
    Consistency(String),

    /// A byte showed up during encoding that the codebook does not cover.
    #[error("symbol 0x{symbol:02x} at input offset {offset} has no code")]
    UnknownSymbol { symbol: u8, offset: u64 },

    /// I/O failure while reading or writing.
    #[error("I/O error: {0}")]
    Resource(#[from] std::io::Error),

    #[error("failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

fn offset_suffix(offset: &Option<u64>) -> String {
    match offset {
        Some(offset) => format!(" at byte {offset}"),
        None => String::new(),
    }
}

impl HuffmanError {
    pub fn format(offset: u64, message: impl Into<String>) -> Self {
        HuffmanError::Format {
            offset: Some(offset),
            message: message.into(),
        }
    }

    /// Format error whose position is filled in later by the caller.
    pub fn format_unplaced(message: impl Into<String>) -> Self {
        HuffmanError::Format {
            offset: None,
            message: message.into(),
        }
    }

    pub fn consistency(message: impl Into<String>) -> Self {
        HuffmanError::Consistency(message.into())
    }

    /// Attach a byte offset to a format error that has none yet.
    pub fn at_offset(self, at: u64) -> Self {
        match self {
            HuffmanError::Format {
                offset: None,
                message,
            } => HuffmanError::Format {
                offset: Some(at),
                message,
            },
            other => other,
        }
    }

    pub fn is_format(&self) -> bool {
        matches!(self, HuffmanError::Format { .. })
    }
}

impl From<HeapErr> for HuffmanError {
    fn from(e: HeapErr) -> Self {
        HuffmanError::Consistency(format!("heap error: {e:?}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_error_mentions_offset() {
        let err = HuffmanError::format(42, "missing sentinel");
        assert_eq!(
            err.to_string(),
            "malformed container at byte 42: missing sentinel"
        );
    }

    #[test]
    fn at_offset_only_fills_missing_position() {
        let placed = HuffmanError::format_unplaced("bad code").at_offset(7);
        assert!(matches!(placed, HuffmanError::Format { offset: Some(7), .. }));

        let kept = HuffmanError::format(3, "bad code").at_offset(7);
        assert!(matches!(kept, HuffmanError::Format { offset: Some(3), .. }));
    }
}
