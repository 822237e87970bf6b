// Copyright 2025 The gzstream Authors
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Crate-level tests exercising the modules together.

use std::io::{Read, SeekFrom};

use crate::constants::MAX_WBITS;
use crate::{
    block_buffer_size, compress, crc32, crc32_combine, decompress, BlockCompressor, Compressor,
    Decompressor, Error, Flush, GzipReader,
};

const GZIP_WBITS: i32 = MAX_WBITS + 16;

fn sample(len: usize) -> Vec<u8> {
    let text = b"The quick brown fox jumps over the lazy dog. ";
    text.iter().cycle().take(len).copied().collect()
}

#[test]
fn test_session_output_feeds_gzip_reader() {
    let data = sample(40_000);
    let comp = Compressor::new(9, GZIP_WBITS).unwrap();
    let mut stream = Vec::new();
    for chunk in data.chunks(512) {
        stream.extend(comp.compress(chunk).unwrap());
    }
    stream.extend(comp.flush(Flush::Finish).unwrap());

    let reader = GzipReader::from_buffer(stream).unwrap();
    assert_eq!(reader.read_all().unwrap(), data);
}

#[test]
fn test_two_sessions_two_members() {
    let stream = {
        let mut out = compress(b"alpha ", 6, GZIP_WBITS).unwrap();
        out.extend(compress(b"beta", 1, GZIP_WBITS).unwrap());
        out
    };
    let reader = GzipReader::from_buffer(stream).unwrap();
    assert_eq!(reader.read_all().unwrap(), b"alpha beta");
}

#[test]
fn test_block_member_roundtrips_through_reader_and_oneshot() {
    let data = sample(30_000);
    let block_size = 1024;
    let mut worker = BlockCompressor::new(block_buffer_size(block_size), 6).unwrap();

    let mut member = vec![0x1f, 0x8b, 8, 0, 0, 0, 0, 0, 0, 0xff];
    let mut crc = 0u32;
    for (index, chunk) in data.chunks(block_size).enumerate() {
        let start = index * block_size;
        let dict = &data[start.saturating_sub(32)..start];
        let (block, block_crc) = worker.compress_block(chunk, dict).unwrap();
        member.extend_from_slice(block);
        crc = crc32_combine(crc, block_crc, chunk.len() as u64);
    }
    member.extend_from_slice(&compress(&[], 6, -MAX_WBITS).unwrap());
    member.extend_from_slice(&crc.to_le_bytes());
    member.extend_from_slice(&(data.len() as u32).to_le_bytes());

    assert_eq!(crc, crc32(&data, 0));
    let reader = GzipReader::from_buffer(member).unwrap();
    assert_eq!(reader.read_all().unwrap(), data);
}

#[test]
fn test_capped_session_decodes_gzip_member() {
    let data = sample(8_000);
    let member = compress(&data, 6, GZIP_WBITS).unwrap();

    let decomp = Decompressor::new(GZIP_WBITS).unwrap();
    let mut plain = Vec::new();
    let mut input: &[u8] = &member;
    while !decomp.is_eof() {
        let piece = decomp.decompress(input, 700).unwrap();
        input = &[];
        if piece.is_empty() && decomp.needs_input() {
            break;
        }
        plain.extend(piece);
    }
    assert_eq!(plain, data);
}

#[test]
fn test_reader_seek_matches_slicing() {
    let data = sample(25_000);
    let reader = GzipReader::from_buffer(compress(&data, 6, GZIP_WBITS).unwrap()).unwrap();
    for target in [0u64, 1, 24_999, 13_000, 13_000, 42] {
        reader.seek(SeekFrom::Start(target)).unwrap();
        let got = reader.read(Some(64)).unwrap();
        let t = target as usize;
        assert_eq!(got, &data[t..(t + 64).min(data.len())], "target {}", target);
    }
}

#[test]
fn test_reader_through_io_traits() {
    let data = sample(10_000);
    let stream = compress(&data, 6, GZIP_WBITS).unwrap();
    let reader = GzipReader::new(std::io::Cursor::new(stream)).unwrap();
    let mut buffered = std::io::BufReader::new(reader);
    let mut out = Vec::new();
    buffered.read_to_end(&mut out).unwrap();
    assert_eq!(out, data);
}

#[test]
fn test_shared_session_across_threads() {
    let data = std::sync::Arc::new(sample(64_000));
    let comp = std::sync::Arc::new(Compressor::new(6, MAX_WBITS).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let comp = std::sync::Arc::clone(&comp);
            let data = std::sync::Arc::clone(&data);
            std::thread::spawn(move || {
                let chunk = &data[worker * 16_000..(worker + 1) * 16_000];
                comp.compress(chunk).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    // Interleaving order is unspecified, but the session must stay
    // internally consistent and finish cleanly.
    comp.flush(Flush::Finish).unwrap();
}

#[test]
fn test_error_display_prefixed() {
    let err = decompress(b"garbage input", MAX_WBITS, 64).unwrap_err();
    assert!(err.to_string().starts_with("gzstream:"), "{}", err);
}

#[test]
fn test_error_converts_to_io_error() {
    let io_err: std::io::Error = Error::UnexpectedEof.into();
    assert_eq!(io_err.kind(), std::io::ErrorKind::UnexpectedEof);
}

#[test]
fn test_window_bits_matrix() {
    let data = sample(3_000);
    for wbits in [9, 12, 15] {
        for variant in [wbits, -wbits, wbits + 16] {
            let stream = compress(&data, 6, variant).unwrap();
            assert_eq!(
                decompress(&stream, variant, 0).unwrap(),
                data,
                "window_bits {}",
                variant
            );
        }
    }
}
