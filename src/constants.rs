// Copyright 2025 The gzstream Authors
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

/// Maximum window bits (32 KiB history window)
pub const MAX_WBITS: i32 = 15;

/// Default memory level for deflate state
pub const DEF_MEM_LEVEL: i32 = 8;

/// Default output buffer size for streaming operations (16 KiB)
pub const DEF_BUF_SIZE: usize = 16 * 1024;

/// Upper bound on the initial allocation when a caller supplies a large
/// `max_length` (16 MiB)
pub const DEF_MAX_INITIAL_BUF_SIZE: usize = 16 * 1024 * 1024;

/// Default internal buffer size for `GzipReader` in streamed mode (32 KiB)
pub const GZIP_READER_BUFFER_SIZE: usize = 32 * 1024;

/// The only compression method defined for zlib/gzip containers
pub const DEFLATED: i32 = 8;

/// Compression levels
pub const NO_COMPRESSION: i32 = 0;
pub const BEST_SPEED: i32 = 1;
pub const BEST_COMPRESSION: i32 = 9;
pub const DEFAULT_COMPRESSION: i32 = -1;

/// Compression strategies
pub const DEFAULT_STRATEGY: i32 = 0;
pub const FILTERED: i32 = 1;
pub const HUFFMAN_ONLY: i32 = 2;
pub const RLE: i32 = 3;
pub const FIXED: i32 = 4;
