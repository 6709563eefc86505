//! Parallel, order-preserving encode and decode of the container body.
//!
//! The outer loop over chunks is sequential: a chunk is read, coded on the
//! worker pool, and written out before the next one is read. Workers only
//! ever see shared references to the codebook or decoder.

use std::io::{BufRead, Read, Write};

use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::debug;

use crate::codebook::{Code, Codebook, Decoder};
use crate::compressed_data::{pack_frame, write_frame, ContainerReader, RawFrame};
use crate::error::{HuffmanError, Result};
use crate::frequency::ChunkReader;

// Below this, splitting a chunk across workers costs more than it saves.
const MIN_SLICE: usize = 4096;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BodyStats {
    /// Symbols encoded or decoded.
    pub symbols: u64,
    pub frames: u64,
    /// Container bytes written (encode) or consumed (decode), framing included.
    pub frame_bytes: u64,
}

pub struct ChunkPipeline {
    pool: ThreadPool,
    parallelism: usize,
    chunk_size: usize,
}

impl ChunkPipeline {
    pub fn new(parallelism: usize, chunk_size: usize) -> Result<Self> {
        let parallelism = parallelism.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(parallelism)
            .thread_name(|i| format!("huffman-worker-{i}"))
            .build()?;
        Ok(ChunkPipeline {
            pool,
            parallelism,
            chunk_size: chunk_size.max(1),
        })
    }

    /// Encode `input` one chunk at a time, writing one frame per chunk.
    pub fn encode_body<R: Read, W: Write>(
        &self,
        codebook: &Codebook,
        input: R,
        writer: &mut W,
    ) -> Result<BodyStats> {
        let mut stats = BodyStats::default();
        let mut chunks = ChunkReader::new(input, self.chunk_size);
        let mut offset = 0u64;

        while let Some(chunk) = chunks.next_chunk()? {
            let bits = self.encode_chunk(codebook, chunk, offset)?;
            let payload = pack_frame(&bits);
            let written = write_frame(writer, &payload)?;

            debug!(
                frame = stats.frames,
                symbols = chunk.len(),
                bits = bits.len(),
                written,
                "chunk encoded"
            );
            offset += chunk.len() as u64;
            stats.symbols += chunk.len() as u64;
            stats.frames += 1;
            stats.frame_bytes += written;
        }
        Ok(stats)
    }

    /// Split a chunk into contiguous slices, code them on the pool, and
    /// join the results back in slice order.
    pub fn encode_chunk(&self, codebook: &Codebook, chunk: &[u8], base_offset: u64) -> Result<Code> {
        let slice_len = chunk.len().div_ceil(self.parallelism).max(MIN_SLICE);

        let parts: Vec<Result<Code>> = self.pool.install(|| {
            chunk
                .par_chunks(slice_len)
                .enumerate()
                .map(|(i, part)| encode_symbols(codebook, part, base_offset + (i * slice_len) as u64))
                .collect()
        });

        let mut bits = Code::new();
        for part in parts {
            bits.extend_from_bitslice(part?.as_bitslice());
        }
        Ok(bits)
    }

    /// Decode frames until the input ends, `parallelism` frames per batch.
    pub fn decode_body<R: BufRead, W: Write>(
        &self,
        decoder: &Decoder,
        reader: &mut ContainerReader<R>,
        writer: &mut W,
    ) -> Result<BodyStats> {
        let mut stats = BodyStats::default();
        let body_start = reader.position();

        loop {
            let mut batch = Vec::with_capacity(self.parallelism);
            while batch.len() < self.parallelism {
                match reader.read_frame()? {
                    Some(frame) => batch.push(frame),
                    None => break,
                }
            }
            if batch.is_empty() {
                break;
            }

            let decoded: Vec<Result<Vec<u8>>> = self.pool.install(|| {
                batch
                    .par_iter()
                    .map(|frame| decode_frame(decoder, frame))
                    .collect()
            });

            for symbols in decoded {
                let symbols = symbols?;
                writer.write_all(&symbols)?;
                stats.symbols += symbols.len() as u64;
                stats.frames += 1;
            }
            debug!(frames = batch.len(), total = stats.frames, "batch decoded");
        }

        stats.frame_bytes = reader.position() - body_start;
        Ok(stats)
    }
}

fn encode_symbols(codebook: &Codebook, symbols: &[u8], offset: u64) -> Result<Code> {
    let mut bits = Code::new();
    for (i, &symbol) in symbols.iter().enumerate() {
        let code = codebook.get(symbol).ok_or(HuffmanError::UnknownSymbol {
            symbol,
            offset: offset + i as u64,
        })?;
        bits.extend_from_bitslice(code);
    }
    Ok(bits)
}

fn decode_frame(decoder: &Decoder, frame: &RawFrame) -> Result<Vec<u8>> {
    let bits = frame.unpack()?;
    if bits.is_empty() {
        return Err(HuffmanError::format(frame.offset, "frame carries no symbols"));
    }
    let mut out = Vec::with_capacity(bits.len() / 2);
    decoder
        .decode_into(&bits, &mut out)
        .map_err(|e| e.at_offset(frame.offset))?;
    Ok(out)
}
