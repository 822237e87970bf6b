// Copyright 2025 The gzstream Authors
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Incremental compression and decompression sessions.
//!
//! A session wraps one codec session behind a mutex so it can be shared
//! between threads through `Arc`; exactly one operation runs against the
//! codec at a time. Input of any length is fed through 32-bit windows and
//! output grows geometrically, capped by the caller's `max_length` for
//! decompression.
//!
//! # Example
//!
//! ```
//! use gzstream::{Compressor, Decompressor, Flush};
//!
//! let comp = Compressor::new(6, 15).unwrap();
//! let mut stream = comp.compress(b"hello world").unwrap();
//! stream.extend(comp.flush(Flush::Finish).unwrap());
//!
//! let decomp = Decompressor::new(15).unwrap();
//! let plain = decomp.decompress(&stream, 0).unwrap();
//! assert_eq!(plain, b"hello world");
//! ```

use std::mem;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::buffer::{claim, OutputBuffer};
use crate::codec::{Deflate, Flush, Inflate, Status};
use crate::constants::{
    DEFAULT_STRATEGY, DEFLATED, DEF_BUF_SIZE, DEF_MAX_INITIAL_BUF_SIZE, DEF_MEM_LEVEL,
};
use crate::error::{Error, Result};

fn need_dict_error() -> Error {
    Error::Codec {
        code: libz_sys::Z_NEED_DICT,
        message: "a preset dictionary is required".to_string(),
    }
}

/// One-shot compression of `data`.
///
/// `window_bits` selects the container: 9..=15 for zlib, negative for a raw
/// deflate stream, 16+`n` for gzip.
pub fn compress(data: &[u8], level: i32, window_bits: i32) -> Result<Vec<u8>> {
    let mut codec = Deflate::new(level, DEFLATED, window_bits, DEF_MEM_LEVEL, DEFAULT_STRATEGY)?;
    let mut out = OutputBuffer::new(DEF_BUF_SIZE, usize::MAX);
    let mut input = data;

    loop {
        // Finish once the remaining input fits in a single 32-bit window.
        let flush = if input.len() > claim(input.len()) {
            Flush::None
        } else {
            Flush::Finish
        };
        let space = out.arrange()?.ok_or(Error::OutOfMemory)?;
        let step = codec.step(input, space, flush)?;
        input = &input[step.consumed..];
        out.commit(step.produced);
        if flush == Flush::Finish && step.status == Status::StreamEnd {
            break;
        }
    }
    Ok(out.into_vec())
}

/// One-shot decompression of a complete stream.
///
/// `bufsize` is the initial output allocation (0 picks a 1-byte start, as
/// the buffer grows geometrically anyway). Truncated input fails with
/// [`Error::UnexpectedEof`].
pub fn decompress(data: &[u8], window_bits: i32, bufsize: usize) -> Result<Vec<u8>> {
    let bufsize = bufsize.max(1);
    let mut codec = Inflate::new(window_bits)?;
    let mut out = OutputBuffer::new(bufsize, usize::MAX);
    let mut input = data;
    let mut status = Status::Ok;

    loop {
        let flush = if input.len() > claim(input.len()) {
            Flush::None
        } else {
            Flush::Finish
        };
        let space = out.arrange()?.ok_or(Error::OutOfMemory)?;
        let space_cap = claim(space.len());
        let step = codec.step(input, space, flush)?;
        input = &input[step.consumed..];
        out.commit(step.produced);
        status = step.status;
        match status {
            Status::StreamEnd => break,
            Status::NeedDict => return Err(need_dict_error()),
            _ => {}
        }
        if step.produced == space_cap {
            continue;
        }
        if input.is_empty() || (step.consumed == 0 && step.produced == 0) {
            break;
        }
    }
    if status != Status::StreamEnd {
        return Err(Error::UnexpectedEof);
    }
    Ok(out.into_vec())
}

/// Incremental compression session
///
/// Created by [`Compressor::new`] or [`Compressor::with_options`]; fed with
/// [`compress`](Compressor::compress) and drained with
/// [`flush`](Compressor::flush). `Flush::Finish` finalizes the session:
/// afterwards only [`try_clone`](Compressor::try_clone) fails gracefully
/// while feeding operations report a stream-state error.
pub struct Compressor {
    inner: Mutex<Option<Deflate>>,
}

impl std::fmt::Debug for Compressor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compressor").finish_non_exhaustive()
    }
}

impl Compressor {
    /// Session with default method, memory level and strategy
    pub fn new(level: i32, window_bits: i32) -> Result<Compressor> {
        Compressor::with_options(level, DEFLATED, window_bits, DEF_MEM_LEVEL, DEFAULT_STRATEGY, None)
    }

    /// Fully parameterized session, optionally seeded with a preset
    /// dictionary
    pub fn with_options(
        level: i32,
        method: i32,
        window_bits: i32,
        mem_level: i32,
        strategy: i32,
        dictionary: Option<&[u8]>,
    ) -> Result<Compressor> {
        let mut codec = Deflate::new(level, method, window_bits, mem_level, strategy)?;
        if let Some(dict) = dictionary {
            codec.set_dictionary(dict)?;
        }
        Ok(Compressor {
            inner: Mutex::new(Some(codec)),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Option<Deflate>> {
        self.inner.lock().unwrap_or_else(|err| err.into_inner())
    }

    /// Compress `data`, returning whatever output the codec produced.
    ///
    /// Output may be empty while the codec accumulates history; call
    /// [`flush`](Compressor::flush) to drain it.
    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut guard = self.lock();
        let codec = guard.as_mut().ok_or_else(Error::finalized)?;
        let mut out = OutputBuffer::new(DEF_BUF_SIZE, usize::MAX);
        let mut input = data;

        loop {
            let space = out.arrange()?.ok_or(Error::OutOfMemory)?;
            let space_cap = claim(space.len());
            let step = codec.step(input, space, Flush::None)?;
            input = &input[step.consumed..];
            out.commit(step.produced);
            if step.produced < space_cap && input.is_empty() {
                break;
            }
        }
        Ok(out.into_vec())
    }

    /// Drain buffered state with the given flush strength.
    ///
    /// `Flush::None` is a no-op returning empty output. `Flush::Finish`
    /// terminates the stream and releases the codec session.
    pub fn flush(&self, mode: Flush) -> Result<Vec<u8>> {
        if mode == Flush::None {
            return Ok(Vec::new());
        }
        let mut guard = self.lock();
        let codec = guard.as_mut().ok_or_else(Error::finalized)?;
        let mut out = OutputBuffer::new(DEF_BUF_SIZE, usize::MAX);
        let mut status = Status::Ok;

        loop {
            let space = out.arrange()?.ok_or(Error::OutOfMemory)?;
            let space_cap = claim(space.len());
            let step = codec.step(&[], space, mode)?;
            out.commit(step.produced);
            status = step.status;
            if step.produced < space_cap {
                break;
            }
        }
        if mode == Flush::Finish && status == Status::StreamEnd {
            *guard = None;
        }
        Ok(out.into_vec())
    }

    /// Duplicate the session, including the codec's internal state.
    ///
    /// Fails once the session was finalized by `flush(Flush::Finish)`.
    pub fn try_clone(&self) -> Result<Compressor> {
        let mut guard = self.lock();
        let codec = guard.as_mut().ok_or_else(|| {
            Error::InvalidArgument("cannot copy a finalized compressor".to_string())
        })?;
        Ok(Compressor {
            inner: Mutex::new(Some(codec.try_clone()?)),
        })
    }
}

struct DecompressorState {
    codec: Option<Inflate>,
    dictionary: Option<Arc<[u8]>>,
    /// Input that could not be consumed because the output cap was hit;
    /// automatically prepended on the next call
    retained: Vec<u8>,
    /// Bytes found after the logical end of stream; frozen once EOF is set
    unused: Vec<u8>,
    eof: bool,
}

/// Incremental decompression session
///
/// Decompression may be capped with `max_length`; input the codec could not
/// consume under the cap is retained and re-fed on the next call, so
/// calling [`decompress`](Decompressor::decompress) with an empty chunk
/// continues draining. Bytes past the logical stream end accumulate in
/// [`unused_data`](Decompressor::unused_data).
pub struct Decompressor {
    inner: Mutex<DecompressorState>,
}

impl std::fmt::Debug for Decompressor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decompressor").finish_non_exhaustive()
    }
}

impl Decompressor {
    pub fn new(window_bits: i32) -> Result<Decompressor> {
        Decompressor::build(window_bits, None)
    }

    /// Session with a preset dictionary.
    ///
    /// For raw windows (negative `window_bits`) the dictionary is installed
    /// immediately; for zlib windows it is installed when the stream
    /// requests it.
    pub fn with_dictionary(window_bits: i32, dictionary: &[u8]) -> Result<Decompressor> {
        Decompressor::build(window_bits, Some(dictionary))
    }

    fn build(window_bits: i32, dictionary: Option<&[u8]>) -> Result<Decompressor> {
        let mut codec = Inflate::new(window_bits)?;
        let dictionary: Option<Arc<[u8]>> = dictionary.map(Arc::from);
        if window_bits < 0 {
            if let Some(dict) = &dictionary {
                codec.set_dictionary(dict)?;
            }
        }
        Ok(Decompressor {
            inner: Mutex::new(DecompressorState {
                codec: Some(codec),
                dictionary,
                retained: Vec::new(),
                unused: Vec::new(),
                eof: false,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, DecompressorState> {
        self.inner.lock().unwrap_or_else(|err| err.into_inner())
    }

    /// Decompress `data`, producing at most `max_length` bytes (0 =
    /// unbounded).
    ///
    /// When the cap is hit before the input is exhausted, the remainder is
    /// retained internally; [`needs_input`](Decompressor::needs_input)
    /// turns false and subsequent calls (even with empty `data`) continue
    /// the drain. Calling again after the end of stream was observed fails
    /// with [`Error::EndOfStream`].
    pub fn decompress(&self, data: &[u8], max_length: usize) -> Result<Vec<u8>> {
        let mut guard = self.lock();
        let state = &mut *guard;
        if state.eof {
            return Err(Error::EndOfStream);
        }
        let codec = state.codec.as_mut().ok_or_else(Error::finalized)?;

        let stitched;
        let mut input: &[u8] = if state.retained.is_empty() {
            data
        } else {
            stitched = [state.retained.as_slice(), data].concat();
            &stitched
        };

        let hard = if max_length == 0 { usize::MAX } else { max_length };
        let initial = if max_length == 0 {
            DEF_BUF_SIZE
        } else {
            max_length.min(DEF_MAX_INITIAL_BUF_SIZE)
        };
        let mut out = OutputBuffer::new(initial, hard);
        let mut status = Status::Ok;

        loop {
            let space = match out.arrange()? {
                Some(space) => space,
                // Cap reached; leftovers are retained below.
                None => break,
            };
            let space_cap = claim(space.len());
            let step = codec.step(input, space, Flush::Sync)?;
            input = &input[step.consumed..];
            out.commit(step.produced);
            if step.status == Status::NeedDict {
                match &state.dictionary {
                    Some(dict) => {
                        codec.set_dictionary(dict)?;
                        continue;
                    }
                    None => return Err(need_dict_error()),
                }
            }
            status = step.status;
            if status == Status::StreamEnd {
                break;
            }
            if step.produced == space_cap {
                continue;
            }
            if input.is_empty() || (step.consumed == 0 && step.produced == 0) {
                break;
            }
        }

        if status == Status::StreamEnd {
            state.eof = true;
            state.unused.extend_from_slice(input);
            state.retained.clear();
        } else {
            let leftover = input.to_vec();
            state.retained = leftover;
        }
        Ok(out.into_vec())
    }

    /// Drain retained input through to the end of stream.
    ///
    /// `bufsize` is the initial output allocation (0 picks the default).
    /// Reaching the end of stream finalizes the session and releases the
    /// codec.
    pub fn flush(&self, bufsize: usize) -> Result<Vec<u8>> {
        let bufsize = if bufsize == 0 { DEF_BUF_SIZE } else { bufsize };
        let mut guard = self.lock();
        let state = &mut *guard;
        let codec = state.codec.as_mut().ok_or_else(Error::finalized)?;

        let retained = mem::take(&mut state.retained);
        let mut input: &[u8] = &retained;
        let mut out = OutputBuffer::new(bufsize, usize::MAX);
        let mut status = Status::Ok;

        loop {
            let flush = if input.len() > claim(input.len()) {
                Flush::None
            } else {
                Flush::Finish
            };
            let space = out.arrange()?.ok_or(Error::OutOfMemory)?;
            let space_cap = claim(space.len());
            let step = codec.step(input, space, flush)?;
            input = &input[step.consumed..];
            out.commit(step.produced);
            status = step.status;
            if status == Status::NeedDict {
                return Err(need_dict_error());
            }
            if status == Status::StreamEnd {
                break;
            }
            if step.produced == space_cap {
                continue;
            }
            if input.is_empty() || (step.consumed == 0 && step.produced == 0) {
                break;
            }
        }

        if status == Status::StreamEnd {
            state.eof = true;
            state.unused.extend_from_slice(input);
            state.codec = None;
        } else {
            state.retained = input.to_vec();
        }
        Ok(out.into_vec())
    }

    /// Duplicate the session: codec state, dictionary and pending buffers
    pub fn try_clone(&self) -> Result<Decompressor> {
        let mut guard = self.lock();
        let state = &mut *guard;
        let codec = state.codec.as_mut().ok_or_else(|| {
            Error::InvalidArgument("cannot copy a finalized decompressor".to_string())
        })?;
        let copy = codec.try_clone()?;
        Ok(Decompressor {
            inner: Mutex::new(DecompressorState {
                codec: Some(copy),
                dictionary: state.dictionary.clone(),
                retained: state.retained.clone(),
                unused: state.unused.clone(),
                eof: state.eof,
            }),
        })
    }

    /// True once the logical end of stream was observed
    pub fn is_eof(&self) -> bool {
        self.lock().eof
    }

    /// False while retained input is waiting for output capacity
    pub fn needs_input(&self) -> bool {
        let guard = self.lock();
        !guard.eof && guard.retained.is_empty()
    }

    /// Bytes found after the logical end of stream
    pub fn unused_data(&self) -> Vec<u8> {
        self.lock().unused.clone()
    }

    /// Input retained because the output cap was hit
    pub fn unconsumed_tail(&self) -> Vec<u8> {
        self.lock().retained.clone()
    }
}
