//! Partial-mode codebook construction.
//!
//! Instead of counting every byte before building the tree, the input is
//! sampled a few thousand bytes at a time and the tree rebuilt on the
//! running totals. Once a rebuild leaves every code length unchanged the
//! sampling stops and that codebook is used for the whole file.
//!
//! This is a heuristic: stable code lengths over two consecutive samples say
//! nothing certain about the rest of the file, so the result can be longer
//! than a codebook built from the full counts. It is always complete and
//! prefix-free, which is all decoding needs.

use std::io::{Read, Seek};

use tracing::{debug, trace};

use crate::codebook::Codebook;
use crate::error::Result;
use crate::frequency::{ChunkReader, FrequencyTable};

/// Bytes added to the running counts between rebuilds.
pub const DEFAULT_SAMPLE_SIZE: usize = 9000;

/// Which byte values occur in the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolSet([bool; 256]);

impl Default for SymbolSet {
    fn default() -> Self {
        SymbolSet([false; 256])
    }
}

impl SymbolSet {
    pub fn insert_all(&mut self, chunk: &[u8]) {
        for &byte in chunk {
            self.0[byte as usize] = true;
        }
    }

    pub fn contains(&self, symbol: u8) -> bool {
        self.0[symbol as usize]
    }

    pub fn len(&self) -> usize {
        self.0.iter().filter(|&&present| present).count()
    }

    pub fn is_empty(&self) -> bool {
        !self.0.iter().any(|&present| present)
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (0..=255u8).filter(move |&symbol| self.contains(symbol))
    }

    /// True once `table` has a non-zero count for every member.
    pub fn covered_by(&self, table: &FrequencyTable) -> bool {
        self.iter().all(|symbol| table.contains(symbol))
    }
}

/// Presence-only pass over the input. Returns the alphabet and total length.
pub fn discover_alphabet<R: Read>(reader: R, chunk_size: usize) -> Result<(SymbolSet, u64)> {
    let mut alphabet = SymbolSet::default();
    let mut chunks = ChunkReader::new(reader, chunk_size);
    while let Some(chunk) = chunks.next_chunk()? {
        alphabet.insert_all(chunk);
    }
    Ok((alphabet, chunks.consumed()))
}

#[derive(Debug, Clone)]
pub struct RefinementOutcome {
    pub codebook: Codebook,
    /// Running counts at the point sampling stopped.
    pub frequencies: FrequencyTable,
    pub samples: usize,
    pub bytes_sampled: u64,
    pub total_length: u64,
    /// False when the input ran out before code lengths settled.
    pub converged: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdaptiveRefinement {
    sample_size: usize,
    scan_chunk_size: usize,
}

impl AdaptiveRefinement {
    pub fn new(sample_size: usize, scan_chunk_size: usize) -> Self {
        AdaptiveRefinement {
            sample_size: sample_size.max(1),
            scan_chunk_size: scan_chunk_size.max(1),
        }
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    /// Discover the alphabet, rewind, then sample until code lengths settle.
    ///
    /// Samples taken while some symbol of the alphabet still has no count
    /// are added to the totals but not compared, since a codebook built
    /// from them could not encode the whole file.
    pub fn refine<R: Read + Seek>(&self, input: &mut R) -> Result<RefinementOutcome> {
        let (alphabet, total_length) = discover_alphabet(&mut *input, self.scan_chunk_size)?;
        input.rewind()?;
        if alphabet.is_empty() {
            debug!("empty input, nothing to sample");
            return Ok(RefinementOutcome {
                codebook: Codebook::default(),
                frequencies: FrequencyTable::new(),
                samples: 0,
                bytes_sampled: 0,
                total_length,
                converged: true,
            });
        }
        debug!(
            symbols = alphabet.len(),
            total_length, "alphabet discovered, sampling"
        );

        let mut frequencies = FrequencyTable::new();
        let mut samples = 0;
        let mut previous: Option<Codebook> = None;
        let mut chunks = ChunkReader::new(&mut *input, self.sample_size);

        while let Some(sample) = chunks.next_chunk()? {
            frequencies.add_chunk(sample);
            samples += 1;

            if !alphabet.covered_by(&frequencies) {
                trace!(samples, "sample not yet comparable, alphabet incomplete");
                continue;
            }

            let codebook = Codebook::from_frequencies(&frequencies)?;
            if let Some(prev) = &previous {
                if prev.same_code_lengths(&codebook) {
                    debug!(
                        samples,
                        bytes_sampled = chunks.consumed(),
                        total_length,
                        "code lengths settled"
                    );
                    return Ok(RefinementOutcome {
                        codebook,
                        frequencies,
                        samples,
                        bytes_sampled: chunks.consumed(),
                        total_length,
                        converged: true,
                    });
                }
            }
            trace!(samples, "code lengths changed");
            previous = Some(codebook);
        }

        // Whole input sampled; the last rebuild already saw every byte.
        let codebook = match previous {
            Some(codebook) => codebook,
            None => Codebook::from_frequencies(&frequencies)?,
        };
        debug!(samples, total_length, "input exhausted before code lengths settled");
        Ok(RefinementOutcome {
            codebook,
            frequencies,
            samples,
            bytes_sampled: chunks.consumed(),
            total_length,
            converged: false,
        })
    }
}

impl Default for AdaptiveRefinement {
    fn default() -> Self {
        AdaptiveRefinement::new(DEFAULT_SAMPLE_SIZE, crate::frequency::DEFAULT_CHUNK_SIZE)
    }
}
