//! Per-symbol occurrence counts gathered in bounded chunks.

use std::io::{self, Read};

/// Default number of bytes read per chunk when scanning a file.
pub const DEFAULT_CHUNK_SIZE: usize = 10 * 1024 * 1024;

/// Occurrence count of every byte value seen so far.
///
/// Counts only ever grow; `total_count` always equals the number of bytes
/// fed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencyTable {
    counts: [u64; 256],
    total: u64,
}

impl Default for FrequencyTable {
    fn default() -> Self {
        FrequencyTable {
            counts: [0; 256],
            total: 0,
        }
    }
}

impl FrequencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut table = Self::new();
        table.add_chunk(bytes);
        table
    }

    /// Read `reader` to the end, at most `chunk_size` bytes at a time.
    pub fn scan<R: Read>(reader: R, chunk_size: usize) -> io::Result<Self> {
        let mut table = Self::new();
        let mut chunks = ChunkReader::new(reader, chunk_size);
        while let Some(chunk) = chunks.next_chunk()? {
            table.add_chunk(chunk);
        }
        Ok(table)
    }

    pub fn add_chunk(&mut self, chunk: &[u8]) {
        for &byte in chunk {
            self.counts[byte as usize] += 1;
        }
        self.total += chunk.len() as u64;
    }

    pub fn count(&self, symbol: u8) -> u64 {
        self.counts[symbol as usize]
    }

    pub fn contains(&self, symbol: u8) -> bool {
        self.counts[symbol as usize] > 0
    }

    pub fn total_count(&self) -> u64 {
        self.total
    }

    /// Number of distinct symbols seen.
    pub fn distinct(&self) -> usize {
        self.counts.iter().filter(|&&c| c > 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// `(symbol, count)` for every symbol with a non-zero count, in symbol order.
    pub fn symbols(&self) -> impl Iterator<Item = (u8, u64)> + '_ {
        self.counts
            .iter()
            .enumerate()
            .filter(|(_, &count)| count > 0)
            .map(|(symbol, &count)| (symbol as u8, count))
    }
}

/// Hands out successive chunks of at most `chunk_size` bytes, reusing one
/// buffer so only a single chunk is resident at a time.
pub(crate) struct ChunkReader<R> {
    inner: R,
    chunk_size: usize,
    buffer: Vec<u8>,
    consumed: u64,
}

impl<R: Read> ChunkReader<R> {
    pub(crate) fn new(inner: R, chunk_size: usize) -> Self {
        ChunkReader {
            inner,
            chunk_size: chunk_size.max(1),
            buffer: Vec::new(),
            consumed: 0,
        }
    }

    /// Next chunk, or `None` at end of input. Only the last chunk is short.
    pub(crate) fn next_chunk(&mut self) -> io::Result<Option<&[u8]>> {
        self.buffer.clear();
        let n = self
            .inner
            .by_ref()
            .take(self.chunk_size as u64)
            .read_to_end(&mut self.buffer)?;
        if n == 0 {
            return Ok(None);
        }
        self.consumed += n as u64;
        Ok(Some(&self.buffer))
    }

    pub(crate) fn consumed(&self) -> u64 {
        self.consumed
    }
}
