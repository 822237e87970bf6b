// Copyright 2025 The gzstream Authors
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Block compression for parallel gzip assembly.
//!
//! [`BlockCompressor`] turns independent chunks of input into raw deflate
//! blocks that end on a byte boundary, so blocks produced by separate
//! workers can be concatenated into one gzip member. Each call resets the
//! codec, primes it with a dictionary carried over from the preceding
//! chunk, and reports the chunk's CRC-32 so per-block checksums can be
//! combined into one member checksum.
//!
//! With the `concurrent` feature, [`compress_gzip_parallel`] drives a pool
//! of block compressors over the input and assembles a complete gzip
//! stream.

use crate::checksum;
use crate::codec::{Deflate, Flush, Status};
use crate::constants::{DEFAULT_STRATEGY, DEFLATED, DEF_MEM_LEVEL, MAX_WBITS};
use crate::error::{Error, Result};

/// Dictionary length carried between adjacent blocks
pub const BLOCK_DICTIONARY_LEN: usize = 32;

/// Reusable compressor producing byte-aligned raw deflate blocks
pub struct BlockCompressor {
    codec: Deflate,
    scratch: Vec<u8>,
}

impl std::fmt::Debug for BlockCompressor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockCompressor").finish_non_exhaustive()
    }
}

impl BlockCompressor {
    /// Compressor with a fixed output buffer of `buffer_size` bytes.
    ///
    /// A block that does not fit the buffer fails with
    /// [`Error::CapacityExceeded`]; size the buffer above the worst-case
    /// expansion of one input chunk (see [`block_buffer_size`]).
    pub fn new(buffer_size: usize, level: i32) -> Result<BlockCompressor> {
        if buffer_size == 0 || buffer_size > u32::MAX as usize {
            return Err(Error::InvalidArgument(format!(
                "invalid block buffer size: {}",
                buffer_size
            )));
        }
        let codec = Deflate::new(level, DEFLATED, -MAX_WBITS, DEF_MEM_LEVEL, DEFAULT_STRATEGY)?;
        Ok(BlockCompressor {
            codec,
            scratch: vec![0; buffer_size],
        })
    }

    pub fn buffer_size(&self) -> usize {
        self.scratch.len()
    }

    /// Compress one chunk into a byte-aligned raw deflate block.
    ///
    /// `dictionary` holds the bytes immediately preceding `data` in the
    /// overall stream (empty for the first chunk). Returns the block and
    /// the CRC-32 of `data`; the block borrow is valid until the next
    /// call.
    pub fn compress_block(&mut self, data: &[u8], dictionary: &[u8]) -> Result<(&[u8], u32)> {
        if data.len() > u32::MAX as usize {
            return Err(Error::InvalidArgument(format!(
                "block of {} bytes exceeds the 32-bit limit",
                data.len()
            )));
        }
        self.codec.reset()?;
        if !dictionary.is_empty() {
            self.codec.set_dictionary(dictionary)?;
        }
        let crc = checksum::crc32(data, 0);
        let step = self.codec.step(data, &mut self.scratch, Flush::Sync)?;
        if step.produced == self.scratch.len() {
            return Err(Error::CapacityExceeded(self.scratch.len()));
        }
        if step.consumed != data.len() {
            return Err(Error::ResidualInput(data.len() - step.consumed));
        }
        if step.status != Status::Ok {
            return Err(Error::Codec {
                code: libz_sys::Z_STREAM_ERROR,
                message: "unexpected codec state after block flush".to_string(),
            });
        }
        Ok((&self.scratch[..step.produced], crc))
    }
}

/// Output buffer size that accommodates any input chunk of `block_size`
/// bytes, including incompressible ones
pub fn block_buffer_size(block_size: usize) -> usize {
    block_size + (block_size / 10).max(500)
}

/// Write the fixed gzip member header for the given compression level
#[cfg(any(feature = "concurrent", test))]
fn write_gzip_header(out: &mut Vec<u8>, level: i32) {
    out.extend_from_slice(&[0x1f, 0x8b, 8, 0]);
    out.extend_from_slice(&0u32.to_le_bytes());
    let xfl = match level {
        9 => 2,
        1 => 4,
        _ => 0,
    };
    out.push(xfl);
    out.push(0xff);
}

/// Compress `data` as one gzip member using a worker pool.
///
/// The input is split into `block_size` chunks, each compressed
/// independently with a 32-byte dictionary carried over from the previous
/// chunk, then concatenated and terminated with an empty finished deflate
/// stream. The member trailer carries the combined CRC-32, so the output
/// is a standard gzip stream readable by any decoder.
#[cfg(feature = "concurrent")]
pub fn compress_gzip_parallel(data: &[u8], block_size: usize, level: i32) -> Result<Vec<u8>> {
    use rayon::prelude::*;

    if block_size == 0 {
        return Err(Error::InvalidArgument("block size must be non-zero".to_string()));
    }
    let buffer_size = block_buffer_size(block_size);

    let blocks: Vec<(Vec<u8>, u32, usize)> = data
        .par_chunks(block_size)
        .enumerate()
        .map(|(index, chunk)| {
            let mut worker = BlockCompressor::new(buffer_size, level)?;
            let start = index * block_size;
            let dictionary = &data[start.saturating_sub(BLOCK_DICTIONARY_LEN)..start];
            let (block, crc) = worker.compress_block(chunk, dictionary)?;
            Ok((block.to_vec(), crc, chunk.len()))
        })
        .collect::<Result<_>>()?;

    let mut out = Vec::with_capacity(data.len() / 2 + 64);
    write_gzip_header(&mut out, level);
    let mut crc = 0u32;
    for (block, block_crc, len) in &blocks {
        out.extend_from_slice(block);
        crc = checksum::crc32_combine(crc, *block_crc, *len as u64);
    }
    // Terminate the member with an empty finished deflate stream.
    out.extend_from_slice(&crate::stream::compress(&[], level, -MAX_WBITS)?);
    out.extend_from_slice(&crc.to_le_bytes());
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    Ok(out)
}
