// Copyright 2025 The gzstream Authors
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Reader for concatenated gzip members.
//!
//! [`GzipReader`] decodes a source of one or more back-to-back gzip
//! members, verifying each member's header and trailer (CRC-32 and length)
//! and tolerating zero padding between members. It keeps its state machine
//! behind a mutex, so a reader can be shared through `Arc`, and implements
//! [`std::io::Read`] and [`std::io::Seek`]. Backward seeks rewind the
//! source and replay from the start, so the source only ever needs forward
//! decompression.
//!
//! # Example
//!
//! ```
//! use gzstream::GzipReader;
//!
//! let gz = gzstream::compress(b"hello", 6, 31).unwrap();
//! let reader = GzipReader::from_buffer(gz).unwrap();
//! assert_eq!(reader.read_all().unwrap(), b"hello");
//! ```

use std::io::{self, Read, Seek, SeekFrom};
use std::sync::{Mutex, MutexGuard};

use crate::checksum;
use crate::codec::{Flush, Inflate, Status};
use crate::constants::{GZIP_READER_BUFFER_SIZE, MAX_WBITS};
use crate::error::{Error, Result};

const FHCRC: u8 = 2;
const FEXTRA: u8 = 4;
const FNAME: u8 = 8;
const FCOMMENT: u8 = 16;

const REPLAY_CHUNK: usize = 8 * 1024;

fn closed_error() -> Error {
    Error::InvalidArgument("I/O operation on closed reader".to_string())
}

/// Fixed-size fields of a parsed member header
#[derive(Debug, Clone, Copy)]
struct HeaderInfo {
    /// Total header length in bytes, including optional sections
    length: usize,
    mtime: u32,
}

/// Parse a member header from the start of `data`.
///
/// Returns `Ok(None)` when `data` is a valid but incomplete prefix and more
/// input is required.
fn parse_header(data: &[u8]) -> Result<Option<HeaderInfo>> {
    if data.len() < 10 {
        return Ok(None);
    }
    if data[0] != 0x1f || data[1] != 0x8b {
        return Err(Error::BadGzip("incorrect header check".to_string()));
    }
    if data[2] != 8 {
        return Err(Error::BadGzip(format!(
            "unknown compression method: {}",
            data[2]
        )));
    }
    let flags = data[3];
    let mtime = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    let mut pos = 10usize;

    if flags & FEXTRA != 0 {
        if data.len() < pos + 2 {
            return Ok(None);
        }
        let xlen = u16::from_le_bytes([data[pos], data[pos + 1]]) as usize;
        pos += 2;
        if data.len() < pos + xlen {
            return Ok(None);
        }
        pos += xlen;
    }
    for flag in [FNAME, FCOMMENT] {
        if flags & flag != 0 {
            match data[pos..].iter().position(|&b| b == 0) {
                Some(i) => pos += i + 1,
                None => return Ok(None),
            }
        }
    }
    if flags & FHCRC != 0 {
        if data.len() < pos + 2 {
            return Ok(None);
        }
        let stored = u16::from_le_bytes([data[pos], data[pos + 1]]);
        let actual = (checksum::crc32(&data[..pos], 0) & 0xffff) as u16;
        if stored != actual {
            return Err(Error::BadGzip("header CRC check failed".to_string()));
        }
        pos += 2;
    }
    Ok(Some(HeaderInfo { length: pos, mtime }))
}

/// Parse a member trailer: CRC-32 and length (mod 2^32) of the
/// decompressed data. `None` while fewer than 8 bytes are available.
fn parse_trailer(data: &[u8]) -> Option<(u32, u32)> {
    if data.len() < 8 {
        return None;
    }
    let crc = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    let size = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    Some((crc, size))
}

/// Buffered input between the source and the decode state machine.
///
/// `fixed` windows (built by [`GzipReader::from_buffer`]) hold the entire
/// source up front and are never refilled or grown.
struct InputWindow {
    buf: Vec<u8>,
    start: usize,
    end: usize,
    fixed: bool,
    exhausted: bool,
}

impl InputWindow {
    fn available(&self) -> &[u8] {
        &self.buf[self.start..self.end]
    }

    fn consume(&mut self, n: usize) {
        self.start += n;
    }

    fn rewind(&mut self) {
        self.start = 0;
        if !self.fixed {
            self.end = 0;
            self.exhausted = false;
        }
    }
}

enum Phase {
    /// Waiting for a complete member header
    Header,
    /// Inflating the raw deflate body
    Body,
    /// Waiting for the 8-byte trailer
    Trailer,
    /// Skipping zero padding before the next member or end of source
    Padding,
}

struct GzipState<R> {
    source: R,
    window: InputWindow,
    phase: Phase,
    inflate: Inflate,
    /// Running CRC-32 of the current member's decompressed bytes
    crc: u32,
    /// Decompressed size of the current member, for the trailer check
    member_size: u64,
    /// Absolute decompressed position across all members
    pos: u64,
    /// Total decompressed size, known once a clean end of source was seen
    size: Option<u64>,
    mtime: Option<u32>,
    closed: bool,
}

impl<R: Read> GzipState<R> {
    fn refill(&mut self) -> Result<()> {
        if self.window.fixed {
            self.window.exhausted = true;
            return Ok(());
        }
        if self.window.start > 0 {
            self.window.buf.copy_within(self.window.start..self.window.end, 0);
            self.window.end -= self.window.start;
            self.window.start = 0;
        }
        if self.window.end == self.window.buf.len() {
            // A header section larger than the buffer; double it.
            let grow = self.window.buf.len();
            self.window
                .buf
                .try_reserve(grow)
                .map_err(|_| Error::OutOfMemory)?;
            self.window.buf.resize(self.window.buf.len() + grow, 0);
        }
        let n = self.source.read(&mut self.window.buf[self.window.end..])?;
        if n == 0 {
            self.window.exhausted = true;
        } else {
            self.window.end += n;
        }
        Ok(())
    }

    /// Decode into `out`, returning 0 only at a clean end of source.
    fn read_some(&mut self, out: &mut [u8]) -> Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        let mut written = 0;
        loop {
            loop {
                match self.phase {
                    Phase::Header => match parse_header(self.window.available())? {
                        Some(info) => {
                            self.window.consume(info.length);
                            self.mtime = Some(info.mtime);
                            self.crc = 0;
                            self.member_size = 0;
                            self.inflate.reset()?;
                            self.phase = Phase::Body;
                        }
                        None => break,
                    },
                    Phase::Body => {
                        if self.window.start == self.window.end {
                            break;
                        }
                        let avail = &self.window.buf[self.window.start..self.window.end];
                        let step = self.inflate.step(avail, &mut out[written..], Flush::Sync)?;
                        self.window.consume(step.consumed);
                        let produced = &out[written..written + step.produced];
                        self.crc = checksum::crc32(produced, self.crc);
                        self.member_size += step.produced as u64;
                        self.pos += step.produced as u64;
                        written += step.produced;
                        if step.status == Status::StreamEnd {
                            self.phase = Phase::Trailer;
                        } else if written == out.len() {
                            return Ok(written);
                        } else if step.consumed == 0 && step.produced == 0 {
                            break;
                        }
                    }
                    Phase::Trailer => {
                        let (crc, isize) = match parse_trailer(self.window.available()) {
                            Some(trailer) => trailer,
                            None => break,
                        };
                        if crc != self.crc {
                            return Err(Error::BadGzip(format!(
                                "CRC check failed {:#x} != {:#x}",
                                crc, self.crc
                            )));
                        }
                        if isize != (self.member_size & 0xffff_ffff) as u32 {
                            return Err(Error::BadGzip("incorrect length of data produced".to_string()));
                        }
                        self.window.consume(8);
                        self.phase = Phase::Padding;
                    }
                    Phase::Padding => {
                        let data = self.window.available();
                        match data.iter().position(|&b| b != 0) {
                            Some(i) => {
                                self.window.consume(i);
                                self.phase = Phase::Header;
                            }
                            None => {
                                self.window.consume(data.len());
                                break;
                            }
                        }
                    }
                }
            }
            if written > 0 {
                return Ok(written);
            }
            if self.window.exhausted {
                let at_boundary = match self.phase {
                    Phase::Padding => true,
                    Phase::Header => self.window.available().is_empty(),
                    _ => false,
                };
                if at_boundary {
                    if self.size.is_none() {
                        self.size = Some(self.pos);
                    }
                    return Ok(0);
                }
                return Err(Error::UnexpectedEof);
            }
            self.refill()?;
        }
    }

    fn read_exactish(&mut self, out: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < out.len() {
            let n = self.read_some(&mut out[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }

    fn read_to_end(&mut self) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        let mut chunk = vec![0u8; GZIP_READER_BUFFER_SIZE];
        loop {
            let n = self.read_some(&mut chunk)?;
            if n == 0 {
                break;
            }
            data.extend_from_slice(&chunk[..n]);
        }
        Ok(data)
    }
}

impl<R: Read + Seek> GzipState<R> {
    /// Restart decoding from the beginning of the source.
    fn restart(&mut self) -> Result<()> {
        self.source.seek(SeekFrom::Start(0))?;
        self.window.rewind();
        self.phase = Phase::Header;
        self.inflate.reset()?;
        self.crc = 0;
        self.member_size = 0;
        self.pos = 0;
        Ok(())
    }

    /// Decode and discard until `pos` reaches `target` or the source ends.
    fn skip_to(&mut self, target: u64) -> Result<()> {
        let mut scratch = vec![0u8; REPLAY_CHUNK];
        while self.pos < target {
            let want = ((target - self.pos).min(REPLAY_CHUNK as u64)) as usize;
            let n = self.read_some(&mut scratch[..want])?;
            if n == 0 {
                break;
            }
        }
        Ok(())
    }

    fn total_size(&mut self) -> Result<u64> {
        if let Some(size) = self.size {
            return Ok(size);
        }
        // Drain the rest of the source; read_some records the size at the
        // clean end.
        let mut scratch = vec![0u8; REPLAY_CHUNK];
        while self.read_some(&mut scratch)? != 0 {}
        match self.size {
            Some(size) => Ok(size),
            None => Err(Error::UnexpectedEof),
        }
    }
}

/// Streaming reader over concatenated gzip members
pub struct GzipReader<R> {
    inner: Mutex<GzipState<R>>,
}

impl GzipReader<io::Cursor<Vec<u8>>> {
    /// Reader over an in-memory buffer holding the entire source.
    ///
    /// The buffer is decoded in place; no input copies are made.
    pub fn from_buffer(data: Vec<u8>) -> Result<GzipReader<io::Cursor<Vec<u8>>>> {
        let end = data.len();
        Ok(GzipReader {
            inner: Mutex::new(GzipState {
                source: io::Cursor::new(Vec::new()),
                window: InputWindow {
                    buf: data,
                    start: 0,
                    end,
                    fixed: true,
                    exhausted: true,
                },
                phase: Phase::Header,
                inflate: Inflate::new(-MAX_WBITS)?,
                crc: 0,
                member_size: 0,
                pos: 0,
                size: None,
                mtime: None,
                closed: false,
            }),
        })
    }
}

impl<R: Read> GzipReader<R> {
    pub fn new(source: R) -> Result<GzipReader<R>> {
        GzipReader::with_buffer_size(source, GZIP_READER_BUFFER_SIZE)
    }

    /// Reader with an explicit input buffer size (must be non-zero).
    pub fn with_buffer_size(source: R, buffer_size: usize) -> Result<GzipReader<R>> {
        if buffer_size == 0 {
            return Err(Error::InvalidArgument(
                "buffer size must be non-zero".to_string(),
            ));
        }
        Ok(GzipReader {
            inner: Mutex::new(GzipState {
                source,
                window: InputWindow {
                    buf: vec![0; buffer_size],
                    start: 0,
                    end: 0,
                    fixed: false,
                    exhausted: false,
                },
                phase: Phase::Header,
                inflate: Inflate::new(-MAX_WBITS)?,
                crc: 0,
                member_size: 0,
                pos: 0,
                size: None,
                mtime: None,
                closed: false,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, GzipState<R>> {
        self.inner.lock().unwrap_or_else(|err| err.into_inner())
    }

    fn lock_open(&self) -> Result<MutexGuard<'_, GzipState<R>>> {
        let guard = self.lock();
        if guard.closed {
            return Err(closed_error());
        }
        Ok(guard)
    }

    /// Read up to `limit` decompressed bytes, or everything when `None`.
    ///
    /// Short output means the source ended.
    pub fn read(&self, limit: Option<usize>) -> Result<Vec<u8>> {
        let mut state = self.lock_open()?;
        match limit {
            None => state.read_to_end(),
            Some(0) => Ok(Vec::new()),
            Some(n) => {
                let mut out = vec![0u8; n];
                let filled = state.read_exactish(&mut out)?;
                out.truncate(filled);
                Ok(out)
            }
        }
    }

    /// Read all remaining decompressed bytes
    pub fn read_all(&self) -> Result<Vec<u8>> {
        self.read(None)
    }

    /// Fill `buf` as far as the source allows, returning the byte count.
    ///
    /// A short count means the source ended.
    pub fn read_into(&self, buf: &mut [u8]) -> Result<usize> {
        let mut state = self.lock_open()?;
        state.read_exactish(buf)
    }

    /// Current decompressed position
    pub fn position(&self) -> u64 {
        self.lock().pos
    }

    /// Modification time from the most recently parsed member header
    pub fn mtime(&self) -> Option<u32> {
        self.lock().mtime
    }

    /// True once a clean end of source was reached and fully consumed
    pub fn is_eof(&self) -> bool {
        let guard = self.lock();
        guard.size == Some(guard.pos)
    }

    /// Release the reader; subsequent operations fail
    pub fn close(&self) {
        self.lock().closed = true;
    }
}

impl<R: Read + Seek> GzipReader<R> {
    /// Seek to a decompressed position.
    ///
    /// Forward seeks decode and discard; backward seeks rewind the source
    /// and replay from the start. `SeekFrom::End` first determines the
    /// total decompressed size by draining the source. Seeking past the
    /// end stops at the end.
    pub fn seek(&self, pos: SeekFrom) -> Result<u64> {
        let mut state = self.lock_open()?;
        let target = match pos {
            SeekFrom::Start(n) => n,
            SeekFrom::Current(delta) => offset_from(state.pos, delta)?,
            SeekFrom::End(delta) => {
                let size = state.total_size()?;
                offset_from(size, delta)?
            }
        };
        if target < state.pos {
            state.restart()?;
        }
        state.skip_to(target)?;
        Ok(state.pos)
    }

    /// Rewind to the start of the decompressed stream
    pub fn rewind(&self) -> Result<()> {
        let mut state = self.lock_open()?;
        state.restart()
    }
}

fn offset_from(base: u64, delta: i64) -> Result<u64> {
    base.checked_add_signed(delta)
        .ok_or_else(|| Error::InvalidArgument("invalid seek offset".to_string()))
}

impl<R: Read> Read for GzipReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.lock_open()?;
        Ok(state.read_some(buf)?)
    }
}

impl<R: Read + Seek> Seek for GzipReader<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Ok(GzipReader::seek(self, pos)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::compress;

    const GZIP_WBITS: i32 = MAX_WBITS + 16;

    fn gz(data: &[u8]) -> Vec<u8> {
        compress(data, 6, GZIP_WBITS).unwrap()
    }

    #[test]
    fn test_parse_header_minimal() {
        let stream = gz(b"x");
        let info = parse_header(&stream).unwrap().unwrap();
        assert_eq!(info.length, 10);
    }

    #[test]
    fn test_parse_header_incomplete() {
        let stream = gz(b"x");
        assert!(parse_header(&stream[..6]).unwrap().is_none());
    }

    #[test]
    fn test_parse_header_bad_magic() {
        assert!(matches!(
            parse_header(b"not a gzip stream!"),
            Err(Error::BadGzip(_))
        ));
    }

    #[test]
    fn test_parse_header_optional_sections() {
        // FEXTRA + FNAME + FCOMMENT + FHCRC, all present
        let mut header = vec![0x1f, 0x8b, 8, FEXTRA | FNAME | FCOMMENT | FHCRC, 0, 0, 0, 0, 0, 0xff];
        header.extend_from_slice(&4u16.to_le_bytes());
        header.extend_from_slice(b"ABCD");
        header.extend_from_slice(b"file.txt\0");
        header.extend_from_slice(b"a comment\0");
        let crc = (checksum::crc32(&header, 0) & 0xffff) as u16;
        header.extend_from_slice(&crc.to_le_bytes());

        let info = parse_header(&header).unwrap().unwrap();
        assert_eq!(info.length, header.len());

        // Corrupt the header CRC
        let last = header.len() - 1;
        header[last] ^= 0xff;
        assert!(matches!(parse_header(&header), Err(Error::BadGzip(_))));
    }

    #[test]
    fn test_single_member() {
        let reader = GzipReader::from_buffer(gz(b"hello world")).unwrap();
        assert_eq!(reader.read_all().unwrap(), b"hello world");
        assert!(reader.is_eof());
    }

    #[test]
    fn test_concatenated_members() {
        let mut stream = gz(b"first ");
        stream.extend(gz(b"second "));
        stream.extend(gz(b"third"));
        let reader = GzipReader::from_buffer(stream).unwrap();
        assert_eq!(reader.read_all().unwrap(), b"first second third");
    }

    #[test]
    fn test_null_padding_between_members() {
        let mut stream = gz(b"before ");
        stream.extend(std::iter::repeat(0u8).take(37));
        stream.extend(gz(b"after"));
        stream.extend(std::iter::repeat(0u8).take(5));
        let reader = GzipReader::from_buffer(stream).unwrap();
        assert_eq!(reader.read_all().unwrap(), b"before after");
    }

    #[test]
    fn test_empty_source() {
        let reader = GzipReader::from_buffer(Vec::new()).unwrap();
        assert_eq!(reader.read_all().unwrap(), b"");
    }

    #[test]
    fn test_truncated_member() {
        let stream = gz(b"some data that will be cut short");
        let cut = stream.len() - 5;
        let reader = GzipReader::from_buffer(stream[..cut].to_vec()).unwrap();
        assert!(matches!(
            reader.read_all().unwrap_err(),
            Error::UnexpectedEof
        ));
    }

    #[test]
    fn test_corrupt_crc() {
        let mut stream = gz(b"checksummed payload");
        let at = stream.len() - 8;
        stream[at] ^= 0xff;
        let reader = GzipReader::from_buffer(stream).unwrap();
        assert!(matches!(reader.read_all().unwrap_err(), Error::BadGzip(_)));
    }

    #[test]
    fn test_corrupt_length() {
        let mut stream = gz(b"measured payload");
        let at = stream.len() - 4;
        stream[at] ^= 0xff;
        let reader = GzipReader::from_buffer(stream).unwrap();
        assert!(matches!(reader.read_all().unwrap_err(), Error::BadGzip(_)));
    }

    #[test]
    fn test_limited_reads_and_position() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 97) as u8).collect();
        let reader = GzipReader::from_buffer(gz(&data)).unwrap();
        let a = reader.read(Some(1000)).unwrap();
        assert_eq!(a, &data[..1000]);
        assert_eq!(reader.position(), 1000);
        let b = reader.read(Some(100_000)).unwrap();
        assert_eq!(b, &data[1000..]);
        assert_eq!(reader.read(Some(10)).unwrap(), b"");
    }

    #[test]
    fn test_read_into_short_at_eof() {
        let reader = GzipReader::from_buffer(gz(b"twelve bytes")).unwrap();
        let mut buf = [0u8; 64];
        assert_eq!(reader.read_into(&mut buf).unwrap(), 12);
        assert_eq!(&buf[..12], b"twelve bytes");
        assert_eq!(reader.read_into(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_parse_trailer_needs_eight_bytes() {
        assert!(parse_trailer(&[1, 2, 3]).is_none());
        assert_eq!(
            parse_trailer(&[1, 0, 0, 0, 2, 0, 0, 0]),
            Some((1, 2))
        );
    }

    #[test]
    fn test_read_zero() {
        let reader = GzipReader::from_buffer(gz(b"data")).unwrap();
        assert_eq!(reader.read(Some(0)).unwrap(), b"");
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn test_small_input_buffer() {
        let data: Vec<u8> = (0..5_000u32).map(|i| (i % 61) as u8).collect();
        let stream = gz(&data);
        let reader = GzipReader::with_buffer_size(io::Cursor::new(stream), 7).unwrap();
        assert_eq!(reader.read_all().unwrap(), data);
    }

    #[test]
    fn test_zero_buffer_size_rejected() {
        let source = io::Cursor::new(Vec::new());
        assert!(GzipReader::with_buffer_size(source, 0).is_err());
    }

    #[test]
    fn test_seek_forward_and_back() {
        let data: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
        let mut stream = gz(&data[..12_000]);
        stream.extend(gz(&data[12_000..]));
        let reader = GzipReader::from_buffer(stream).unwrap();

        assert_eq!(reader.seek(SeekFrom::Start(15_000)).unwrap(), 15_000);
        assert_eq!(reader.read(Some(10)).unwrap(), &data[15_000..15_010]);

        assert_eq!(reader.seek(SeekFrom::Start(5)).unwrap(), 5);
        assert_eq!(reader.read(Some(10)).unwrap(), &data[5..15]);

        assert_eq!(reader.seek(SeekFrom::Current(100)).unwrap(), 115);
        assert_eq!(reader.read(Some(5)).unwrap(), &data[115..120]);
    }

    #[test]
    fn test_seek_from_end() {
        let data: Vec<u8> = (0..4_000u32).map(|i| (i % 47) as u8).collect();
        let reader = GzipReader::from_buffer(gz(&data)).unwrap();
        assert_eq!(reader.seek(SeekFrom::End(-100)).unwrap(), 3_900);
        assert_eq!(reader.read_all().unwrap(), &data[3_900..]);
    }

    #[test]
    fn test_seek_past_end_clamps() {
        let reader = GzipReader::from_buffer(gz(b"short")).unwrap();
        assert_eq!(reader.seek(SeekFrom::Start(1_000)).unwrap(), 5);
    }

    #[test]
    fn test_seek_before_start_rejected() {
        let reader = GzipReader::from_buffer(gz(b"short")).unwrap();
        assert!(reader.seek(SeekFrom::Current(-1)).is_err());
    }

    #[test]
    fn test_mtime_surfaced() {
        let mut stream = gz(b"stamped");
        // Patch a known mtime into the fixed header.
        stream[4..8].copy_from_slice(&0x1234_5678u32.to_le_bytes());
        let reader = GzipReader::from_buffer(stream).unwrap();
        assert_eq!(reader.mtime(), None);
        reader.read_all().unwrap();
        assert_eq!(reader.mtime(), Some(0x1234_5678));
    }

    #[test]
    fn test_close_rejects_operations() {
        let reader = GzipReader::from_buffer(gz(b"data")).unwrap();
        reader.close();
        assert!(matches!(
            reader.read_all().unwrap_err(),
            Error::InvalidArgument(_)
        ));
    }

    #[test]
    fn test_io_read_trait() {
        let mut reader = GzipReader::from_buffer(gz(b"through the trait")).unwrap();
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "through the trait");
    }
}
