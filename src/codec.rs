// Copyright 2025 The gzstream Authors
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Safe wrapper around the zlib codec primitive.
//!
//! All FFI lives here. The rest of the crate drives `Deflate`/`Inflate`
//! sessions exclusively through `step`, which arranges the 32-bit
//! `avail_in`/`avail_out` windows and reports consumed/produced counts.

use std::ffi::CStr;
use std::mem;
use std::os::raw::{c_int, c_uint, c_ulong, c_void};
use std::ptr;

use libz_sys as zlib;

use crate::buffer::claim;
use crate::error::{Error, Result};

/// Flush modes accepted by [`step`](Deflate::step)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flush {
    /// Accumulate input, emit output only when internally convenient
    None,
    /// Flush pending output and align to a byte boundary with an empty block
    Partial,
    /// Flush pending output and align to a byte boundary
    Sync,
    /// Like `Sync`, additionally resetting the history window
    Full,
    /// Complete the stream; no further input may follow
    Finish,
    /// Stop at the next block boundary
    Block,
}

impl Flush {
    fn as_raw(self) -> c_int {
        match self {
            Flush::None => zlib::Z_NO_FLUSH,
            Flush::Partial => zlib::Z_PARTIAL_FLUSH,
            Flush::Sync => zlib::Z_SYNC_FLUSH,
            Flush::Full => zlib::Z_FULL_FLUSH,
            Flush::Finish => zlib::Z_FINISH,
            Flush::Block => zlib::Z_BLOCK,
        }
    }
}

/// Recoverable outcome of one codec step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Status {
    Ok,
    StreamEnd,
    BufError,
    NeedDict,
}

/// Byte counts and status produced by one codec step
#[derive(Debug, Clone, Copy)]
pub(crate) struct Step {
    pub consumed: usize,
    pub produced: usize,
    pub status: Status,
}

extern "C" fn zalloc(_opaque: *mut c_void, items: c_uint, size: c_uint) -> *mut c_void {
    match (items as libc::size_t).checked_mul(size as libc::size_t) {
        Some(total) => unsafe { libc::malloc(total) },
        None => ptr::null_mut(),
    }
}

extern "C" fn zfree(_opaque: *mut c_void, address: *mut c_void) {
    unsafe { libc::free(address) }
}

/// Heap-pinned `z_stream`. zlib keeps a back pointer from its internal
/// state to the stream, so the struct must not move between calls.
struct Stream {
    raw: Box<zlib::z_stream>,
}

impl Stream {
    fn new() -> Stream {
        Stream {
            raw: Box::new(zlib::z_stream {
                next_in: ptr::null_mut(),
                avail_in: 0,
                total_in: 0,
                next_out: ptr::null_mut(),
                avail_out: 0,
                total_out: 0,
                msg: ptr::null_mut(),
                state: ptr::null_mut(),
                zalloc,
                zfree,
                opaque: ptr::null_mut(),
                data_type: 0,
                adler: 0,
                reserved: 0,
            }),
        }
    }

    fn msg(&self) -> Option<String> {
        if self.raw.msg.is_null() {
            None
        } else {
            unsafe { CStr::from_ptr(self.raw.msg) }
                .to_str()
                .ok()
                .map(String::from)
        }
    }

    fn error(&self, code: c_int, context: &str) -> Error {
        let message = match self.msg() {
            Some(msg) => format!("{} {}", msg, context),
            None => context.to_string(),
        };
        Error::Codec {
            code: code as i32,
            message,
        }
    }

    /// Arrange the 32-bit windows, run `op`, and report byte movement.
    fn step<F>(&mut self, input: &[u8], output: &mut [u8], op: F, context: &str) -> Result<Step>
    where
        F: FnOnce(zlib::z_streamp) -> c_int,
    {
        let strm = &mut *self.raw;
        strm.next_in = input.as_ptr() as *mut u8;
        strm.avail_in = claim(input.len()) as c_uint;
        strm.next_out = output.as_mut_ptr();
        strm.avail_out = claim(output.len()) as c_uint;

        let avail_in_before = strm.avail_in;
        let avail_out_before = strm.avail_out;
        let rc = op(strm as *mut zlib::z_stream);
        let consumed = (avail_in_before - strm.avail_in) as usize;
        let produced = (avail_out_before - strm.avail_out) as usize;
        strm.next_in = ptr::null_mut();
        strm.next_out = ptr::null_mut();

        let status = match rc {
            zlib::Z_OK => Status::Ok,
            zlib::Z_STREAM_END => Status::StreamEnd,
            zlib::Z_BUF_ERROR => Status::BufError,
            zlib::Z_NEED_DICT => Status::NeedDict,
            zlib::Z_MEM_ERROR => return Err(Error::OutOfMemory),
            code => return Err(self.error(code, context)),
        };
        Ok(Step {
            consumed,
            produced,
            status,
        })
    }
}

fn init_error(stream: &Stream, rc: c_int, context: &str) -> Error {
    match rc {
        zlib::Z_MEM_ERROR => Error::OutOfMemory,
        zlib::Z_STREAM_ERROR => Error::InvalidArgument("invalid initialization option".to_string()),
        code => stream.error(code, context),
    }
}

/// One compression session of the codec primitive
pub(crate) struct Deflate {
    strm: Stream,
}

impl std::fmt::Debug for Deflate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deflate").finish_non_exhaustive()
    }
}

// The session state is heap allocated and only reached through `&mut`.
unsafe impl Send for Deflate {}

impl Deflate {
    pub fn new(
        level: i32,
        method: i32,
        window_bits: i32,
        mem_level: i32,
        strategy: i32,
    ) -> Result<Deflate> {
        let mut strm = Stream::new();
        let rc = unsafe {
            zlib::deflateInit2_(
                &mut *strm.raw,
                level as c_int,
                method as c_int,
                window_bits as c_int,
                mem_level as c_int,
                strategy as c_int,
                zlib::zlibVersion(),
                mem::size_of::<zlib::z_stream>() as c_int,
            )
        };
        if rc != zlib::Z_OK {
            return Err(init_error(&strm, rc, "while creating compression session"));
        }
        Ok(Deflate { strm })
    }

    pub fn step(&mut self, input: &[u8], output: &mut [u8], flush: Flush) -> Result<Step> {
        let raw_flush = flush.as_raw();
        self.strm.step(
            input,
            output,
            |strm| unsafe { zlib::deflate(strm, raw_flush) },
            "while compressing data",
        )
    }

    pub fn set_dictionary(&mut self, dictionary: &[u8]) -> Result<()> {
        if dictionary.len() > u32::MAX as usize {
            return Err(Error::InvalidArgument(
                "dictionary length does not fit in an unsigned 32-bit integer".to_string(),
            ));
        }
        let rc = unsafe {
            zlib::deflateSetDictionary(
                &mut *self.strm.raw,
                dictionary.as_ptr(),
                dictionary.len() as c_uint,
            )
        };
        match rc {
            zlib::Z_OK => Ok(()),
            zlib::Z_STREAM_ERROR => Err(Error::InvalidArgument("invalid dictionary".to_string())),
            code => Err(self.strm.error(code, "while setting dictionary")),
        }
    }

    pub fn reset(&mut self) -> Result<()> {
        let rc = unsafe { zlib::deflateReset(&mut *self.strm.raw) };
        if rc != zlib::Z_OK {
            return Err(self.strm.error(rc, "while resetting compression session"));
        }
        Ok(())
    }

    pub fn try_clone(&mut self) -> Result<Deflate> {
        let mut dest = Stream::new();
        let rc = unsafe { zlib::deflateCopy(&mut *dest.raw, &mut *self.strm.raw) };
        match rc {
            zlib::Z_OK => Ok(Deflate { strm: dest }),
            zlib::Z_MEM_ERROR => Err(Error::OutOfMemory),
            zlib::Z_STREAM_ERROR => Err(Error::finalized()),
            code => Err(self.strm.error(code, "while copying compression session")),
        }
    }
}

impl Drop for Deflate {
    fn drop(&mut self) {
        unsafe {
            zlib::deflateEnd(&mut *self.strm.raw);
        }
    }
}

/// One decompression session of the codec primitive
pub(crate) struct Inflate {
    strm: Stream,
}

unsafe impl Send for Inflate {}

impl Inflate {
    pub fn new(window_bits: i32) -> Result<Inflate> {
        let mut strm = Stream::new();
        let rc = unsafe {
            zlib::inflateInit2_(
                &mut *strm.raw,
                window_bits as c_int,
                zlib::zlibVersion(),
                mem::size_of::<zlib::z_stream>() as c_int,
            )
        };
        if rc != zlib::Z_OK {
            return Err(init_error(&strm, rc, "while creating decompression session"));
        }
        Ok(Inflate { strm })
    }

    pub fn step(&mut self, input: &[u8], output: &mut [u8], flush: Flush) -> Result<Step> {
        let raw_flush = flush.as_raw();
        self.strm.step(
            input,
            output,
            |strm| unsafe { zlib::inflate(strm, raw_flush) },
            "while decompressing data",
        )
    }

    pub fn set_dictionary(&mut self, dictionary: &[u8]) -> Result<()> {
        if dictionary.len() > u32::MAX as usize {
            return Err(Error::InvalidArgument(
                "dictionary length does not fit in an unsigned 32-bit integer".to_string(),
            ));
        }
        let rc = unsafe {
            zlib::inflateSetDictionary(
                &mut *self.strm.raw,
                dictionary.as_ptr(),
                dictionary.len() as c_uint,
            )
        };
        match rc {
            zlib::Z_OK => Ok(()),
            code => Err(self.strm.error(code, "while setting dictionary")),
        }
    }

    pub fn reset(&mut self) -> Result<()> {
        let rc = unsafe { zlib::inflateReset(&mut *self.strm.raw) };
        if rc != zlib::Z_OK {
            return Err(self.strm.error(rc, "while resetting decompression session"));
        }
        Ok(())
    }

    pub fn try_clone(&mut self) -> Result<Inflate> {
        let mut dest = Stream::new();
        let rc = unsafe { zlib::inflateCopy(&mut *dest.raw, &mut *self.strm.raw) };
        match rc {
            zlib::Z_OK => Ok(Inflate { strm: dest }),
            zlib::Z_MEM_ERROR => Err(Error::OutOfMemory),
            zlib::Z_STREAM_ERROR => Err(Error::finalized()),
            code => Err(self.strm.error(code, "while copying decompression session")),
        }
    }
}

impl Drop for Inflate {
    fn drop(&mut self) {
        unsafe {
            zlib::inflateEnd(&mut *self.strm.raw);
        }
    }
}

/// Adler-32 of `data`, continuing from `start` (1 for a fresh stream)
pub(crate) fn adler32(start: u32, data: &[u8]) -> u32 {
    let mut value = start as c_ulong;
    for chunk in data.chunks(u32::MAX as usize) {
        value = unsafe { zlib::adler32(value, chunk.as_ptr(), chunk.len() as c_uint) };
    }
    value as u32
}
