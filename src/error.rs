// Copyright 2025 The gzstream Authors
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::fmt;
use std::io;

/// Result type for gzstream operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for compression/decompression
#[derive(Debug)]
pub enum Error {
    /// A parameter was rejected before reaching the codec
    InvalidArgument(String),

    /// Buffer allocation failed
    OutOfMemory,

    /// The codec reported a structural stream problem
    Codec { code: i32, message: String },

    /// Gzip magic/method/header-CRC/trailer mismatch
    BadGzip(String),

    /// The source ended in the middle of a member
    UnexpectedEof,

    /// Decompression was attempted after the logical end of stream
    EndOfStream,

    /// The fixed scratch buffer filled before all input was consumed
    CapacityExceeded(usize),

    /// Input remained unconsumed after a sync-flushed block (a defect)
    ResidualInput(usize),

    /// The underlying byte source failed
    Io(io::Error),
}

impl Error {
    /// Error for operations on a session that was already finalized.
    ///
    /// zlib reports Z_STREAM_ERROR when a freed stream is used; the same
    /// code is kept so callers see one category for both.
    pub(crate) fn finalized() -> Error {
        Error::Codec {
            code: libz_sys::Z_STREAM_ERROR,
            message: "inconsistent stream state".to_string(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArgument(msg) => write!(f, "gzstream: invalid argument: {}", msg),
            Error::OutOfMemory => write!(f, "gzstream: out of memory"),
            Error::Codec { code, message } => write!(f, "gzstream: error {}: {}", code, message),
            Error::BadGzip(msg) => write!(f, "gzstream: bad gzip data: {}", msg),
            Error::UnexpectedEof => write!(
                f,
                "gzstream: compressed stream ended before the end-of-stream marker was reached"
            ),
            Error::EndOfStream => write!(f, "gzstream: end of stream already reached"),
            Error::CapacityExceeded(size) => {
                write!(f, "gzstream: compressed output exceeds buffer size of {}", size)
            }
            Error::ResidualInput(left) => {
                write!(f, "gzstream: {} input bytes were left unconsumed", left)
            }
            Error::Io(err) => write!(f, "gzstream: io error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> io::Error {
        match err {
            Error::Io(inner) => inner,
            other => {
                let kind = match &other {
                    Error::UnexpectedEof => io::ErrorKind::UnexpectedEof,
                    Error::InvalidArgument(_) => io::ErrorKind::InvalidInput,
                    Error::OutOfMemory => io::ErrorKind::OutOfMemory,
                    _ => io::ErrorKind::InvalidData,
                };
                io::Error::new(kind, other.to_string())
            }
        }
    }
}
