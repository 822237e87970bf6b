// Copyright 2025 The gzstream Authors
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! # Zlib and gzip streaming
//!
//! This library wraps the zlib codec into thread-shareable streaming
//! sessions, a reader for concatenated gzip members, and block
//! compression primitives for building gzip streams in parallel.
//!
//! It provides:
//! - One-shot [`compress`] / [`decompress`] for complete buffers
//! - Incremental [`Compressor`] and [`Decompressor`] sessions with flush
//!   control, preset dictionaries, output caps and session copies
//! - [`GzipReader`], a seekable reader over concatenated gzip members
//! - [`BlockCompressor`] for byte-aligned deflate blocks, with a
//!   rayon-backed gzip assembler behind the `concurrent` feature
//! - CRC-32 and Adler-32 helpers, including checksum combination
//!
//! ## One-shot Example
//!
//! ```rust
//! let data = b"Hello, World! This is a test of zlib compression.";
//! let compressed = gzstream::compress(data, 6, 15).expect("compression failed");
//! let decompressed = gzstream::decompress(&compressed, 15, 0).expect("decompression failed");
//! assert_eq!(data, &decompressed[..]);
//! ```
//!
//! ## Window Selection
//!
//! Operations taking `window_bits` follow the zlib convention: 9..=15
//! for a zlib container, negative values for a raw deflate stream, and
//! the window size plus 16 (e.g. 31) for a gzip container.

mod buffer;
mod checksum;
mod codec;
pub mod constants;
mod error;
mod gzip;
mod parallel;
mod stream;

pub use checksum::{adler32, crc32, crc32_combine};
pub use codec::Flush;
pub use error::{Error, Result};
pub use gzip::GzipReader;
pub use parallel::{block_buffer_size, BlockCompressor, BLOCK_DICTIONARY_LEN};
pub use stream::{compress, decompress, Compressor, Decompressor};

#[cfg(feature = "concurrent")]
pub use parallel::compress_gzip_parallel;

#[cfg(test)]
mod tests;
