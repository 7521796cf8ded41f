use std::collections::HashMap;

use crate::core::error::{Error, Result};

/// Sequential writer over one directory file, mirror of `IndexInput`
pub trait IndexOutput: Send {
    fn write_byte(&mut self, b: u8) -> Result<()>;

    fn write_bytes(&mut self, buf: &[u8]) -> Result<()>;

    fn position(&self) -> u64;

    /// Repositions the write cursor; bytes in between stay as written
    fn seek(&mut self, pos: u64) -> Result<()>;

    fn flush(&mut self) -> Result<()>;

    fn write_u32(&mut self, v: u32) -> Result<()> {
        self.write_bytes(&v.to_be_bytes())
    }

    fn write_u64(&mut self, v: u64) -> Result<()> {
        self.write_bytes(&v.to_be_bytes())
    }

    fn write_i32(&mut self, v: i32) -> Result<()> {
        self.write_u32(v as u32)
    }

    fn write_i64(&mut self, v: i64) -> Result<()> {
        self.write_u64(v as u64)
    }

    fn write_vint(&mut self, mut v: u32) -> Result<()> {
        while v & !0x7F != 0 {
            self.write_byte((v & 0x7F) as u8 | 0x80)?;
            v >>= 7;
        }
        self.write_byte(v as u8)
    }

    fn write_vlong(&mut self, mut v: u64) -> Result<()> {
        while v & !0x7F != 0 {
            self.write_byte((v & 0x7F) as u8 | 0x80)?;
            v >>= 7;
        }
        self.write_byte(v as u8)
    }

    fn write_string(&mut self, s: &str) -> Result<()> {
        self.write_vint(s.len() as u32)?;
        self.write_bytes(s.as_bytes())
    }

    /// Entries are written in sorted key order so identical maps produce
    /// identical bytes
    fn write_string_map(&mut self, map: &HashMap<String, String>) -> Result<()> {
        self.write_u32(map.len() as u32)?;
        let mut keys: Vec<&String> = map.keys().collect();
        keys.sort();
        for key in keys {
            self.write_string(key)?;
            self.write_string(&map[key])?;
        }
        Ok(())
    }
}

/// Output wrapper maintaining a running CRC32 of emitted bytes
pub struct ChecksumIndexOutput<'a> {
    inner: &'a mut dyn IndexOutput,
    hasher: crc32fast::Hasher,
}

impl<'a> ChecksumIndexOutput<'a> {
    pub fn new(inner: &'a mut dyn IndexOutput) -> Self {
        ChecksumIndexOutput {
            inner,
            hasher: crc32fast::Hasher::new(),
        }
    }

    pub fn checksum(&self) -> u32 {
        self.hasher.clone().finalize()
    }

    /// Appends the checksum itself, unchecksummed, as an i64 tail
    pub fn finish(self) -> Result<()> {
        let digest = self.hasher.finalize();
        self.inner.write_i64(digest as i64)
    }
}

impl IndexOutput for ChecksumIndexOutput<'_> {
    fn write_byte(&mut self, b: u8) -> Result<()> {
        self.hasher.update(&[b]);
        self.inner.write_byte(b)
    }

    fn write_bytes(&mut self, buf: &[u8]) -> Result<()> {
        self.hasher.update(buf);
        self.inner.write_bytes(buf)
    }

    fn position(&self) -> u64 {
        self.inner.position()
    }

    fn seek(&mut self, _pos: u64) -> Result<()> {
        Err(Error::unsupported("cannot seek a checksummed output"))
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }
}
