use std::collections::HashMap;

use crate::core::error::{Error, Result};

/// Random-access reader over one directory file
///
/// Multibyte integers are big-endian; `VInt`/`VLong` use base-128 groups
/// with the high bit as continuation. Strings are a VInt byte length
/// followed by UTF-8.
pub trait IndexInput: Send + Sync {
    fn read_byte(&mut self) -> Result<u8>;

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()>;

    fn seek(&mut self, pos: u64) -> Result<()>;

    fn position(&self) -> u64;

    fn length(&self) -> u64;

    /// Independent cursor over the same file
    fn clone_input(&self) -> Box<dyn IndexInput>;

    fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_bytes(&mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    fn read_u64(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_bytes(&mut buf)?;
        Ok(u64::from_be_bytes(buf))
    }

    fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_u32()? as i32)
    }

    fn read_i64(&mut self) -> Result<i64> {
        Ok(self.read_u64()? as i64)
    }

    /// Variable-length unsigned int, at most 5 bytes
    fn read_vint(&mut self) -> Result<u32> {
        let mut value = 0u32;
        let mut shift = 0;
        loop {
            let byte = self.read_byte()?;
            value |= ((byte & 0x7F) as u32) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
            if shift > 28 {
                return Err(Error::corrupt("VInt longer than 5 bytes"));
            }
        }
    }

    /// Variable-length unsigned long, at most 9 bytes
    fn read_vlong(&mut self) -> Result<u64> {
        let mut value = 0u64;
        let mut shift = 0;
        loop {
            let byte = self.read_byte()?;
            value |= ((byte & 0x7F) as u64) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
            if shift > 56 {
                return Err(Error::corrupt("VLong longer than 9 bytes"));
            }
        }
    }

    fn read_string(&mut self) -> Result<String> {
        let len = self.read_vint()? as usize;
        let mut buf = vec![0u8; len];
        self.read_bytes(&mut buf)?;
        String::from_utf8(buf).map_err(|e| Error::corrupt(format!("invalid UTF-8 string: {}", e)))
    }

    fn read_string_map(&mut self) -> Result<HashMap<String, String>> {
        let count = self.read_u32()?;
        let mut map = HashMap::with_capacity(count as usize);
        for _ in 0..count {
            let key = self.read_string()?;
            let value = self.read_string()?;
            map.insert(key, value);
        }
        Ok(map)
    }
}

/// Counts every byte pulled from the wrapped input
///
/// The counter is shared by cloned cursors, so all traffic against one
/// file accumulates in one place. Used by tests that assert skip lists
/// avoid reading skipped regions.
pub struct CountingIndexInput {
    inner: Box<dyn IndexInput>,
    bytes_read: std::sync::Arc<std::sync::atomic::AtomicU64>,
}

impl CountingIndexInput {
    pub fn new(inner: Box<dyn IndexInput>) -> Self {
        Self::with_counter(inner, Default::default())
    }

    pub fn with_counter(
        inner: Box<dyn IndexInput>,
        counter: std::sync::Arc<std::sync::atomic::AtomicU64>,
    ) -> Self {
        CountingIndexInput {
            inner,
            bytes_read: counter,
        }
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(std::sync::atomic::Ordering::Relaxed)
    }
}

impl IndexInput for CountingIndexInput {
    fn read_byte(&mut self) -> Result<u8> {
        self.bytes_read
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        self.inner.read_byte()
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        self.bytes_read
            .fetch_add(buf.len() as u64, std::sync::atomic::Ordering::Relaxed);
        self.inner.read_bytes(buf)
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        self.inner.seek(pos)
    }

    fn position(&self) -> u64 {
        self.inner.position()
    }

    fn length(&self) -> u64 {
        self.inner.length()
    }

    fn clone_input(&self) -> Box<dyn IndexInput> {
        Box::new(CountingIndexInput {
            inner: self.inner.clone_input(),
            bytes_read: self.bytes_read.clone(),
        })
    }
}

/// Input wrapper maintaining a running CRC32 of consumed bytes
pub struct ChecksumIndexInput {
    inner: Box<dyn IndexInput>,
    hasher: crc32fast::Hasher,
}

impl ChecksumIndexInput {
    pub fn new(inner: Box<dyn IndexInput>) -> Self {
        ChecksumIndexInput {
            inner,
            hasher: crc32fast::Hasher::new(),
        }
    }

    pub fn checksum(&self) -> u32 {
        self.hasher.clone().finalize()
    }
}

impl IndexInput for ChecksumIndexInput {
    fn read_byte(&mut self) -> Result<u8> {
        let b = self.inner.read_byte()?;
        self.hasher.update(&[b]);
        Ok(b)
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        self.inner.read_bytes(buf)?;
        self.hasher.update(buf);
        Ok(())
    }

    fn seek(&mut self, _pos: u64) -> Result<()> {
        Err(Error::unsupported("cannot seek a checksummed input"))
    }

    fn position(&self) -> u64 {
        self.inner.position()
    }

    fn length(&self) -> u64 {
        self.inner.length()
    }

    fn clone_input(&self) -> Box<dyn IndexInput> {
        Box::new(ChecksumIndexInput::new(self.inner.clone_input()))
    }
}

#[cfg(test)]
mod tests {
    use crate::store::output::IndexOutput;
    use crate::store::ram::RamDirectory;
    use crate::store::Directory;

    #[test]
    fn test_vint_round_trip() {
        let dir = RamDirectory::new();
        let values = [0u32, 1, 127, 128, 16383, 16384, 1 << 21, u32::MAX];
        {
            let mut out = dir.create_output("vints").unwrap();
            for &v in &values {
                out.write_vint(v).unwrap();
            }
            out.flush().unwrap();
        }
        let mut input = dir.open_input("vints").unwrap();
        for &v in &values {
            assert_eq!(input.read_vint().unwrap(), v);
        }
    }

    #[test]
    fn test_vlong_round_trip() {
        let dir = RamDirectory::new();
        // VLongs are unsigned; 54048498881988565 is the canonical probe value
        let values = [0u64, 1, 127, 128, 54048498881988565, u64::MAX];
        {
            let mut out = dir.create_output("vlongs").unwrap();
            for &v in &values {
                out.write_vlong(v).unwrap();
            }
            out.flush().unwrap();
        }
        let mut input = dir.open_input("vlongs").unwrap();
        for &v in &values {
            assert_eq!(input.read_vlong().unwrap(), v);
        }
    }

    #[test]
    fn test_string_and_map_round_trip() {
        let dir = RamDirectory::new();
        let mut map = std::collections::HashMap::new();
        map.insert("source".to_string(), "flush".to_string());
        map.insert("os".to_string(), "linux".to_string());
        {
            let mut out = dir.create_output("strings").unwrap();
            out.write_string("").unwrap();
            out.write_string("quick brown fox").unwrap();
            out.write_string("päällekkäisyys").unwrap();
            out.write_string_map(&map).unwrap();
            out.flush().unwrap();
        }
        let mut input = dir.open_input("strings").unwrap();
        assert_eq!(input.read_string().unwrap(), "");
        assert_eq!(input.read_string().unwrap(), "quick brown fox");
        assert_eq!(input.read_string().unwrap(), "päällekkäisyys");
        assert_eq!(input.read_string_map().unwrap(), map);
    }

    #[test]
    fn test_fixed_width_big_endian() {
        let dir = RamDirectory::new();
        {
            let mut out = dir.create_output("fixed").unwrap();
            out.write_u32(0xDEADBEEF).unwrap();
            out.write_i64(-1).unwrap();
            out.flush().unwrap();
        }
        let mut input = dir.open_input("fixed").unwrap();
        assert_eq!(input.read_byte().unwrap(), 0xDE);
        input.seek(0).unwrap();
        assert_eq!(input.read_u32().unwrap(), 0xDEADBEEF);
        assert_eq!(input.read_i64().unwrap(), -1);
    }
}
