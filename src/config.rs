use std::num::NonZeroUsize;
use std::thread;

use crate::adaptive::DEFAULT_SAMPLE_SIZE;
use crate::error::{HuffmanError, Result};
use crate::frequency::DEFAULT_CHUNK_SIZE;

/// How the encoder arrives at its codebook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CodebookMode {
    /// Count every byte first, then build the optimal code.
    #[default]
    Full,
    /// Sample until code lengths settle (see [`crate::adaptive`]).
    Partial,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecConfig {
    /// Worker threads used to encode and decode chunks.
    pub parallelism: usize,
    /// Bytes of input per chunk frame, and per read while scanning.
    pub chunk_size: usize,
    /// Bytes per sample in partial mode.
    pub sample_size: usize,
    pub mode: CodebookMode,
}

impl Default for CodecConfig {
    fn default() -> Self {
        CodecConfig {
            parallelism: default_parallelism(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            sample_size: DEFAULT_SAMPLE_SIZE,
            mode: CodebookMode::Full,
        }
    }
}

impl CodecConfig {
    /// `None` keeps the default of one worker per available CPU.
    pub fn with_parallelism(mut self, parallelism: Option<usize>) -> Self {
        self.parallelism = parallelism.unwrap_or_else(default_parallelism);
        self
    }

    /// `None` keeps the default chunk size.
    pub fn with_chunk_size(mut self, chunk_size: Option<usize>) -> Self {
        self.chunk_size = chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE);
        self
    }

    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size;
        self
    }

    pub fn with_mode(mut self, mode: CodebookMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.parallelism == 0 {
            return Err(HuffmanError::Usage("parallelism must be at least 1".into()));
        }
        if self.chunk_size == 0 {
            return Err(HuffmanError::Usage("chunk size must be at least 1 byte".into()));
        }
        if self.sample_size == 0 {
            return Err(HuffmanError::Usage("sample size must be at least 1 byte".into()));
        }
        Ok(())
    }
}

fn default_parallelism() -> usize {
    thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Encode,
    Decode,
}

impl Operation {
    /// Exactly one of the two flags must be set.
    pub fn from_flags(encode: bool, decode: bool) -> Result<Self> {
        match (encode, decode) {
            (true, false) => Ok(Operation::Encode),
            (false, true) => Ok(Operation::Decode),
            (true, true) => Err(HuffmanError::Usage(
                "encode and decode cannot be requested together".into(),
            )),
            (false, false) => Err(HuffmanError::Usage(
                "one of encode or decode is required".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = CodecConfig::default();
        assert!(config.parallelism >= 1);
        assert_eq!(config.chunk_size, 10 * 1024 * 1024);
        assert_eq!(config.sample_size, 9000);
        assert_eq!(config.mode, CodebookMode::Full);
        config.validate().unwrap();
    }

    #[test]
    fn optional_overrides() {
        let config = CodecConfig::default()
            .with_parallelism(Some(3))
            .with_chunk_size(None)
            .with_mode(CodebookMode::Partial);
        assert_eq!(config.parallelism, 3);
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.mode, CodebookMode::Partial);
    }

    #[test]
    fn zero_sizes_are_usage_errors() {
        let config = CodecConfig::default().with_chunk_size(Some(0));
        assert!(matches!(config.validate(), Err(HuffmanError::Usage(_))));
        let config = CodecConfig::default().with_parallelism(Some(0));
        assert!(matches!(config.validate(), Err(HuffmanError::Usage(_))));
    }

    #[test]
    fn exactly_one_operation() {
        assert_eq!(Operation::from_flags(true, false).unwrap(), Operation::Encode);
        assert_eq!(Operation::from_flags(false, true).unwrap(), Operation::Decode);
        assert!(matches!(Operation::from_flags(true, true), Err(HuffmanError::Usage(_))));
        assert!(matches!(Operation::from_flags(false, false), Err(HuffmanError::Usage(_))));
    }
}
