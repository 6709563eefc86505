//! # chunked_huffman
//!
//! Huffman file compression that works on files larger than memory.
//!
//! Input is scanned in bounded chunks to count symbols (or, in partial mode,
//! sampled until the code lengths stop changing), a deterministic Huffman
//! tree gives the codebook, and the body is encoded chunk by chunk on a
//! worker pool. The container records the original file name and
//! timestamps, which are restored on decode.
//!
//! ## Quick Start
//!
//! ```no_run
//! use chunked_huffman::{CodecConfig, HuffmanCodec};
//! use std::path::Path;
//!
//! let codec = HuffmanCodec::new(CodecConfig::default())?;
//!
//! // Writes out/input.hc
//! let packed = codec.encode_file(Path::new("input.txt"), Path::new("out"))?;
//!
//! // Writes restored/input.txt with the original timestamps
//! let _restored = codec.decode_file(&packed, Path::new("restored"))?;
//! # Ok::<(), chunked_huffman::HuffmanError>(())
//! ```

pub mod adaptive;
pub mod codebook;
pub mod compressed_data;
pub mod config;
pub mod error;
pub mod frequency;
pub mod huffman_codec;
pub mod hufftree;
pub mod metadata;
pub mod pipeline;

// Internal modules - not part of public API
mod min_heap;

// Re-export main types for convenience
pub use adaptive::{AdaptiveRefinement, RefinementOutcome};
pub use codebook::{Codebook, Decoder};
pub use config::{CodebookMode, CodecConfig, Operation};
pub use error::{HuffmanError, Result};
pub use frequency::FrequencyTable;
pub use huffman_codec::{run, HuffmanCodec, COMPRESSED_EXTENSION};
pub use hufftree::HuffmanTree;
pub use metadata::Properties;
