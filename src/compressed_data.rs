//! Chunk frames and the byte-level reader shared by all container parsing.
//!
//! A frame is the guard bit followed by the code bits of one chunk, read as
//! a big-endian number and stored little-endian in as few bytes as
//! possible. Frames are terminated by [`SENTINEL`]; a payload byte equal to
//! `0xFF` is written as `FF 00` so the terminator can't occur inside one.

use std::io::{self, BufRead, Read, Write};

use bitvec::prelude::*;

use crate::codebook::Code;
use crate::error::{HuffmanError, Result};

/// Ends the codebook block and every frame.
pub const SENTINEL: [u8; 2] = [0xFF, 0xFF];

const ESCAPE: u8 = 0xFF;
const STUFFED: u8 = 0x00;

/// Prefix `bits` with the guard bit and pack into minimal little-endian bytes.
pub fn pack_frame(bits: &BitSlice<u8, Msb0>) -> Vec<u8> {
    let total = bits.len() + 1;
    let pad = (8 - total % 8) % 8;

    let mut be: BitVec<u8, Msb0> = BitVec::with_capacity(pad + total);
    be.resize(pad, false);
    be.push(true);
    be.extend_from_bitslice(bits);

    let mut bytes = be.into_vec();
    bytes.reverse();
    bytes
}

/// Inverse of [`pack_frame`]: recover the code bits, guard removed.
pub fn unpack_frame(payload: &[u8]) -> Result<Code> {
    match payload.last() {
        None => return Err(HuffmanError::format_unplaced("empty frame")),
        Some(0) => {
            return Err(HuffmanError::format_unplaced(
                "frame's most significant byte is zero (guard bit missing)",
            ))
        }
        Some(_) => {}
    }

    let mut be = payload.to_vec();
    be.reverse();
    let bits = BitVec::<u8, Msb0>::from_vec(be);
    let guard = bits
        .first_one()
        .ok_or_else(|| HuffmanError::format_unplaced("frame has no guard bit"))?;
    Ok(bits[guard + 1..].to_bitvec())
}

/// Write one escaped frame followed by the sentinel. Returns bytes written.
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> io::Result<u64> {
    let mut written = 0u64;
    for (i, part) in payload.split(|&b| b == ESCAPE).enumerate() {
        if i > 0 {
            writer.write_all(&[ESCAPE, STUFFED])?;
            written += 2;
        }
        writer.write_all(part)?;
        written += part.len() as u64;
    }
    writer.write_all(&SENTINEL)?;
    Ok(written + SENTINEL.len() as u64)
}

/// Un-escaped frame payload and the byte offset its encoding started at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub offset: u64,
    pub payload: Vec<u8>,
}

impl RawFrame {
    pub fn unpack(&self) -> Result<Code> {
        unpack_frame(&self.payload).map_err(|e| e.at_offset(self.offset))
    }
}

/// Buffered reader that keeps track of its byte position for error reports.
pub struct ContainerReader<R> {
    inner: R,
    position: u64,
}

impl<R: BufRead> ContainerReader<R> {
    pub fn new(inner: R) -> Self {
        ContainerReader { inner, position: 0 }
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let byte = match self.inner.fill_buf()?.first() {
            Some(&b) => b,
            None => return Ok(None),
        };
        self.inner.consume(1);
        self.position += 1;
        Ok(Some(byte))
    }

    /// Read up to and including `delim`, giving up after `limit` bytes.
    /// Returns whether the delimiter was found; it is left in `buf`.
    pub fn read_until_limited(&mut self, delim: u8, limit: u64, buf: &mut Vec<u8>) -> io::Result<bool> {
        let n = self.inner.by_ref().take(limit).read_until(delim, buf)?;
        self.position += n as u64;
        Ok(buf.last() == Some(&delim))
    }

    /// Next frame, or `None` when the input ends cleanly between frames.
    pub fn read_frame(&mut self) -> Result<Option<RawFrame>> {
        let offset = self.position;
        let mut payload = Vec::new();

        loop {
            let n = self.inner.read_until(ESCAPE, &mut payload)?;
            self.position += n as u64;

            if n == 0 && self.position == offset {
                return Ok(None);
            }
            if n == 0 || payload.last() != Some(&ESCAPE) {
                return Err(HuffmanError::format(
                    self.position,
                    format!("frame starting at byte {offset} has no terminator"),
                ));
            }
            payload.pop();

            match self.read_byte()? {
                Some(ESCAPE) => return Ok(Some(RawFrame { offset, payload })),
                Some(STUFFED) => payload.push(ESCAPE),
                Some(other) => {
                    return Err(HuffmanError::format(
                        self.position - 1,
                        format!("unexpected byte 0x{other:02x} after 0xff in frame"),
                    ))
                }
                None => {
                    return Err(HuffmanError::format(
                        self.position,
                        format!("frame starting at byte {offset} is truncated"),
                    ))
                }
            }
        }
    }
}
