//! Per-entry stream transforms and the chains built from them.
//!
//! Write order, plaintext first:
//!
//! ```text
//! plaintext -> Crc32Writer -> Compressor -> [buffer -> header + ZipCrypto] -> sink
//! ```
//!
//! Read order mirrors it:
//!
//! ```text
//! window -> [ZipCrypto, header consumed] -> Decompressor -> plaintext
//! ```
//!
//! Compression always happens before encryption. Swapping the two would
//! produce bytes no reader can recover.

pub mod cipher;
pub mod crc32;
pub mod deflate;

use std::io::{self, Read, Seek, Write};

use crate::io::SubStream;
use crate::zip::CompressionMethod;
use cipher::{CryptoReader, PasswordCheck};
use crc32::Crc32Writer;
use deflate::{Compressor, Decompressor};

/// The compressed-data source of an entry, optionally decrypted.
pub enum RawReader<S> {
    Plain(SubStream<S>),
    Encrypted(CryptoReader<SubStream<S>>),
}

impl<S: Read + Seek> Read for RawReader<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            RawReader::Plain(r) => r.read(buf),
            RawReader::Encrypted(r) => r.read(buf),
        }
    }
}

/// Fully assembled read chain yielding plaintext.
pub type ReadChain<S> = Decompressor<RawReader<S>>;

/// Outcome of building a read chain.
pub struct ReadChainBuilt<S: Read + Seek> {
    pub chain: ReadChain<S>,
    /// `None` for unencrypted entries, otherwise whether the header check passed.
    pub password_ok: Option<bool>,
}

/// Build the read chain over an entry's compressed-data window.
pub fn build_read_chain<S: Read + Seek>(
    window: SubStream<S>,
    method: CompressionMethod,
    crypto: Option<(&[u8], PasswordCheck)>,
) -> io::Result<ReadChainBuilt<S>> {
    let (raw, password_ok) = match crypto {
        Some((password, check)) => {
            let (reader, ok) = CryptoReader::new(window, password, check)?;
            (RawReader::Encrypted(reader), Some(ok))
        }
        None => (RawReader::Plain(window), None),
    };
    Ok(ReadChainBuilt {
        chain: Decompressor::new(raw, method),
        password_ok,
    })
}

/// Where compressed bytes land.
enum PayloadSink<W> {
    /// Unencrypted: straight to the sink, counting as we go.
    Direct { sink: W, written: u64 },
    /// Encrypted: held until the CRC is known and the header can be built.
    Buffered { sink: W, buf: Vec<u8> },
}

impl<W: Write> Write for PayloadSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            PayloadSink::Direct { sink, written } => {
                let n = sink.write(buf)?;
                *written += n as u64;
                Ok(n)
            }
            PayloadSink::Buffered { buf: pending, .. } => {
                pending.extend_from_slice(buf);
                Ok(buf.len())
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            PayloadSink::Direct { sink, .. } => sink.flush(),
            PayloadSink::Buffered { .. } => Ok(()),
        }
    }
}

/// Totals of a finished write chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainTotals {
    pub crc32: u32,
    pub uncompressed_size: u64,
    /// Bytes that reached the sink, including the encryption header.
    pub compressed_size: u64,
}

/// Write chain: CRC32 tee, then codec, then optional encryption.
pub struct WriteChain<W: Write> {
    inner: Crc32Writer<Compressor<PayloadSink<W>>>,
    password: Option<Vec<u8>>,
}

impl<W: Write> WriteChain<W> {
    pub fn new(sink: W, method: CompressionMethod, level: u32, password: Option<Vec<u8>>) -> Self {
        let payload = match password {
            Some(_) => PayloadSink::Buffered {
                sink,
                buf: Vec::new(),
            },
            None => PayloadSink::Direct { sink, written: 0 },
        };
        Self {
            inner: Crc32Writer::new(Compressor::new(payload, method, level)),
            password,
        }
    }

    /// Flush the codec, seal the payload if encrypting, and return totals and sink.
    pub fn finish(self) -> io::Result<(ChainTotals, W)> {
        let (crc32, uncompressed_size, compressor) = self.inner.finish();
        let (compressed_size, sink) = match compressor.finish()? {
            PayloadSink::Direct { sink, written } => (written, sink),
            PayloadSink::Buffered { mut sink, buf } => {
                let password = self.password.unwrap_or_default();
                let sealed = cipher::encrypt_payload(&password, crc32, &buf);
                sink.write_all(&sealed)?;
                (sealed.len() as u64, sink)
            }
        };
        Ok((
            ChainTotals {
                crc32,
                uncompressed_size,
                compressed_size,
            },
            sink,
        ))
    }
}

impl<W: Write> Write for WriteChain<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
