//! Traditional PKWARE ("ZipCrypto") stream cipher.
//!
//! Cryptographically broken; kept for compatibility with legacy archives.
//! Every encrypted payload starts with a 12-byte header whose tail lets a
//! reader cheaply test a password without decrypting the whole entry.

use rand::RngCore;
use std::io::{self, Read};
use tracing::{debug, trace};

/// Length of the encryption header prepended to every encrypted payload.
pub const HEADER_LEN: usize = 12;

const KEY0: u32 = 0x12345678;
const KEY1: u32 = 0x23456789;
const KEY2: u32 = 0x34567890;

const fn crc32_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut j = 0;
        while j < 8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xEDB88320;
            } else {
                crc >>= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

static CRC32_TABLE: [u32; 256] = crc32_table();

/// One byte step of the raw (non-inverted) CRC32 used by the key schedule.
fn crc32_lut(crc: u32, b: u8) -> u32 {
    CRC32_TABLE[((crc as u8) ^ b) as usize] ^ (crc >> 8)
}

/// Three-key cipher state.
#[derive(Debug, Clone)]
pub struct ZipCrypto {
    k0: u32,
    k1: u32,
    k2: u32,
}

impl ZipCrypto {
    /// Initialise the keys from a password.
    pub fn new(password: &[u8]) -> Self {
        let mut cipher = Self {
            k0: KEY0,
            k1: KEY1,
            k2: KEY2,
        };
        for &b in password {
            cipher.update_keys(b);
        }
        cipher
    }

    /// Mixes a plaintext byte into the three keys.
    fn update_keys(&mut self, c: u8) {
        self.k0 = crc32_lut(self.k0, c);
        self.k1 = self
            .k1
            .wrapping_add(self.k0 & 0xff)
            .wrapping_mul(134775813)
            .wrapping_add(1);
        self.k2 = crc32_lut(self.k2, (self.k1 >> 24) as u8);
    }

    fn stream_byte(&self) -> u8 {
        let temp = (self.k2 | 2) as u16;
        (temp.wrapping_mul(temp ^ 1) >> 8) as u8
    }

    pub fn encrypt(&mut self, buf: &mut [u8]) {
        for c in buf.iter_mut() {
            let plain = *c;
            *c ^= self.stream_byte();
            self.update_keys(plain);
        }
    }

    pub fn decrypt(&mut self, buf: &mut [u8]) {
        for c in buf.iter_mut() {
            *c ^= self.stream_byte();
            self.update_keys(*c);
        }
    }
}

/// What the decrypted header tail is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordCheck {
    /// High 16 bits of the entry CRC32, in header bytes 10 and 11.
    Word(u16),
    /// A single byte in header byte 11. Used by writers that stream with a
    /// data descriptor and so do not know the CRC up front.
    Byte(u8),
}

impl PasswordCheck {
    /// The check applicable to an entry with the given flags, CRC and DOS time.
    pub fn for_entry(flags: u16, crc32: u32, dos_time: u16) -> Self {
        if flags & crate::zip::FLAG_DATA_DESCRIPTOR != 0 {
            PasswordCheck::Byte((dos_time >> 8) as u8)
        } else {
            PasswordCheck::Word((crc32 >> 16) as u16)
        }
    }

    fn matches(&self, header: &[u8; HEADER_LEN]) -> bool {
        match *self {
            PasswordCheck::Word(w) => header[10] == w as u8 && header[11] == (w >> 8) as u8,
            PasswordCheck::Byte(b) => header[11] == b,
        }
    }
}

/// Encrypt a fully-compressed payload, prepending the 12-byte header.
///
/// The header's last two bytes carry the high 16 bits of `crc32`, which is
/// why the payload must be complete (and its CRC known) before encrypting.
pub fn encrypt_payload(password: &[u8], crc32: u32, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    let mut header = [0u8; HEADER_LEN];
    rand::thread_rng().fill_bytes(&mut header[..10]);
    header[10] = (crc32 >> 16) as u8;
    header[11] = (crc32 >> 24) as u8;
    out.extend_from_slice(&header);
    out.extend_from_slice(payload);
    ZipCrypto::new(password).encrypt(&mut out);
    out
}

/// Decrypting reader. The header is consumed at construction.
pub struct CryptoReader<R> {
    inner: R,
    cipher: ZipCrypto,
}

impl<R: Read> CryptoReader<R> {
    /// Read and decrypt the header, returning the reader positioned on the
    /// payload and whether the password check passed.
    ///
    /// A failed check is not an error: the reader is still returned and
    /// yields whatever the given password decrypts to.
    pub fn new(mut inner: R, password: &[u8], check: PasswordCheck) -> io::Result<(Self, bool)> {
        let mut header = [0u8; HEADER_LEN];
        inner.read_exact(&mut header)?;
        let mut cipher = ZipCrypto::new(password);
        cipher.decrypt(&mut header);
        let ok = check.matches(&header);
        if ok {
            trace!("password check passed ({check:?})");
        } else {
            debug!("password check failed ({check:?})");
        }
        Ok((Self { inner, cipher }, ok))
    }
}

impl<R: Read> Read for CryptoReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.cipher.decrypt(&mut buf[..n]);
        Ok(n)
    }
}
