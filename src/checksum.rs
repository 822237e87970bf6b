// Copyright 2025 The gzstream Authors
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! CRC-32 and Adler-32 helpers.
//!
//! CRC-32 (the gzip/zlib IEEE polynomial) goes through `crc32fast`, which
//! also supports combining the checksums of independently processed
//! segments. Adler-32 is delegated to the codec primitive.

use crc32fast::Hasher;

use crate::codec;

/// CRC-32 of `data`, continuing from `start` (0 for a fresh stream)
pub fn crc32(data: &[u8], start: u32) -> u32 {
    let mut hasher = Hasher::new_with_initial(start);
    hasher.update(data);
    hasher.finalize()
}

/// Combine two CRC-32 values computed over consecutive segments.
///
/// `crc2` must cover the `len2` bytes immediately following the bytes
/// covered by `crc1`; the result equals the CRC-32 over both segments.
pub fn crc32_combine(crc1: u32, crc2: u32, len2: u64) -> u32 {
    let mut combined = Hasher::new_with_initial_len(crc1, 0);
    let tail = Hasher::new_with_initial_len(crc2, len2);
    combined.combine(&tail);
    combined.finalize()
}

/// Adler-32 of `data`, continuing from `start` (1 for a fresh stream)
pub fn adler32(data: &[u8], start: u32) -> u32 {
    codec::adler32(start, data)
}
