// Copyright 2025 The gzstream Authors
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Buffer sizing for the 32-bit codec windows.
//!
//! The codec primitive counts input and output in 32-bit fields while
//! logical buffers may be larger. `claim` picks the slice length for one
//! step; `OutputBuffer` owns the growable output arena, doubling up to a
//! hard cap so a stream of steps costs O(log n) resizes.

use crate::error::{Error, Result};

/// Bytes of a logical buffer that fit in one codec step
#[inline]
pub(crate) fn claim(remaining: usize) -> usize {
    remaining.min(u32::MAX as usize)
}

/// Growable output arena with an exact hard cap
pub(crate) struct OutputBuffer {
    buf: Vec<u8>,
    filled: usize,
    initial: usize,
    limit: usize,
}

impl OutputBuffer {
    /// `initial` is the first allocation; `limit` the hard cap. Both are
    /// clamped so the buffer always has at least one writable byte.
    pub fn new(initial: usize, limit: usize) -> OutputBuffer {
        let limit = limit.max(1);
        OutputBuffer {
            buf: Vec::new(),
            filled: 0,
            initial: initial.clamp(1, limit),
            limit,
        }
    }

    fn grow_to(&mut self, new_len: usize) -> Result<()> {
        let additional = new_len - self.buf.len();
        self.buf
            .try_reserve_exact(additional)
            .map_err(|_| Error::OutOfMemory)?;
        self.buf.resize(new_len, 0);
        Ok(())
    }

    /// Ensure writable space, doubling when full. Returns `None` when the
    /// buffer is full and already at the hard cap.
    pub fn arrange(&mut self) -> Result<Option<&mut [u8]>> {
        if self.buf.is_empty() {
            let initial = self.initial;
            self.grow_to(initial)?;
        } else if self.filled == self.buf.len() {
            let length = self.buf.len();
            debug_assert!(length <= self.limit);
            if length == self.limit {
                return Ok(None);
            }
            let new_length = if length <= self.limit / 2 {
                length * 2
            } else {
                self.limit
            };
            self.grow_to(new_length)?;
        }
        Ok(Some(&mut self.buf[self.filled..]))
    }

    /// Record bytes written into the space returned by `arrange`
    pub fn commit(&mut self, produced: usize) {
        self.filled += produced;
        debug_assert!(self.filled <= self.buf.len());
    }

    /// Trim to the written length and hand the buffer over
    pub fn into_vec(mut self) -> Vec<u8> {
        self.buf.truncate(self.filled);
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_caps_at_u32() {
        assert_eq!(claim(10), 10);
        assert_eq!(claim(usize::MAX), u32::MAX as usize);
    }

    #[test]
    fn test_first_arrange_allocates_initial() {
        let mut out = OutputBuffer::new(8, usize::MAX);
        let space = out.arrange().unwrap().unwrap();
        assert_eq!(space.len(), 8);
    }

    #[test]
    fn test_growth_doubles_until_cap() {
        let mut out = OutputBuffer::new(4, 10);
        let len = out.arrange().unwrap().unwrap().len();
        out.commit(len); // 4 filled
        let len = out.arrange().unwrap().unwrap().len();
        assert_eq!(len, 4); // grew to 8
        out.commit(len);
        let len = out.arrange().unwrap().unwrap().len();
        assert_eq!(len, 2); // capped at exactly 10
        out.commit(len);
        assert!(out.arrange().unwrap().is_none());
    }

    #[test]
    fn test_partial_fill_reuses_space() {
        let mut out = OutputBuffer::new(16, usize::MAX);
        let _ = out.arrange().unwrap().unwrap();
        out.commit(5);
        let space = out.arrange().unwrap().unwrap();
        assert_eq!(space.len(), 11);
    }

    #[test]
    fn test_into_vec_trims() {
        let mut out = OutputBuffer::new(16, usize::MAX);
        let space = out.arrange().unwrap().unwrap();
        space[..3].copy_from_slice(b"abc");
        out.commit(3);
        assert_eq!(out.into_vec(), b"abc");
    }

    #[test]
    fn test_initial_clamped_to_limit() {
        let mut out = OutputBuffer::new(1024, 6);
        let space = out.arrange().unwrap().unwrap();
        assert_eq!(space.len(), 6);
    }
}
