//! Stored/Deflate codec variants.
//!
//! Both directions are a closed set: an entry is either stored verbatim or
//! raw-deflated (no zlib framing). Anything else is rejected before a codec
//! is ever built.

use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use std::io::{self, Read, Write};

use crate::zip::CompressionMethod;

/// Compressing side of the codec.
pub enum Compressor<W: Write> {
    Stored(W),
    Deflate(DeflateEncoder<W>),
}

impl<W: Write> Compressor<W> {
    /// Panics if `method` is neither Stored nor Deflate; callers check first.
    pub fn new(inner: W, method: CompressionMethod, level: u32) -> Self {
        match method {
            CompressionMethod::Stored => Compressor::Stored(inner),
            CompressionMethod::Deflate => {
                Compressor::Deflate(DeflateEncoder::new(inner, Compression::new(level)))
            }
            other => unreachable!("no compressor for {other:?}"),
        }
    }

    /// Flush all pending compressed output and hand back the sink.
    pub fn finish(self) -> io::Result<W> {
        match self {
            Compressor::Stored(mut w) => {
                w.flush()?;
                Ok(w)
            }
            Compressor::Deflate(encoder) => encoder.finish(),
        }
    }
}

impl<W: Write> Write for Compressor<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Compressor::Stored(w) => w.write(buf),
            Compressor::Deflate(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Compressor::Stored(w) => w.flush(),
            Compressor::Deflate(w) => w.flush(),
        }
    }
}

/// Decompressing side of the codec.
pub enum Decompressor<R: Read> {
    Stored(R),
    Deflate(DeflateDecoder<R>),
}

impl<R: Read> Decompressor<R> {
    /// Panics if `method` is neither Stored nor Deflate; callers check first.
    pub fn new(inner: R, method: CompressionMethod) -> Self {
        match method {
            CompressionMethod::Stored => Decompressor::Stored(inner),
            CompressionMethod::Deflate => Decompressor::Deflate(DeflateDecoder::new(inner)),
            other => unreachable!("no decompressor for {other:?}"),
        }
    }
}

impl<R: Read> Read for Decompressor<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Decompressor::Stored(r) => r.read(buf),
            Decompressor::Deflate(r) => r.read(buf),
        }
    }
}
