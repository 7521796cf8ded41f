use roaring::RoaringBitmap;

use crate::core::error::{Error, Result};
use crate::store::input::IndexInput;
use crate::store::output::IndexOutput;

const DEL_VERSION: u32 = 1;

/// Per-segment deletion bitset, persisted as a `.del` file
///
/// Segments are immutable; deleting a doc writes a fresh bitset file under
/// the next delete generation.
#[derive(Debug, Clone, Default)]
pub struct DeletedDocs {
    bits: RoaringBitmap,
}

impl DeletedDocs {
    pub fn new() -> Self {
        DeletedDocs {
            bits: RoaringBitmap::new(),
        }
    }

    pub fn delete(&mut self, doc: u32) -> bool {
        self.bits.insert(doc)
    }

    pub fn is_deleted(&self, doc: u32) -> bool {
        self.bits.contains(doc)
    }

    pub fn count(&self) -> u32 {
        self.bits.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.bits.iter()
    }

    pub fn write(&self, out: &mut dyn IndexOutput) -> Result<()> {
        let mut bytes = Vec::with_capacity(self.bits.serialized_size());
        self.bits
            .serialize_into(&mut bytes)
            .map_err(|e| Error::corrupt(format!("bitset serialization failed: {}", e)))?;
        out.write_u32(DEL_VERSION)?;
        out.write_u32(bytes.len() as u32)?;
        out.write_bytes(&bytes)?;
        out.flush()
    }

    pub fn read(input: &mut dyn IndexInput) -> Result<Self> {
        let version = input.read_u32()?;
        if version != DEL_VERSION {
            return Err(Error::corrupt(format!(
                "unknown deletion bitset version {}",
                version
            )));
        }
        let len = input.read_u32()? as usize;
        let mut bytes = vec![0u8; len];
        input.read_bytes(&mut bytes)?;
        let bits = RoaringBitmap::deserialize_from(&bytes[..])
            .map_err(|e| Error::corrupt(format!("bad deletion bitset: {}", e)))?;
        Ok(DeletedDocs { bits })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ram::RamDirectory;
    use crate::store::Directory;

    #[test]
    fn test_del_round_trip() {
        let dir = RamDirectory::new();
        let mut del = DeletedDocs::new();
        del.delete(3);
        del.delete(77);
        del.delete(3);
        {
            let mut out = dir.create_output("_0.del").unwrap();
            del.write(out.as_mut()).unwrap();
        }
        let mut input = dir.open_input("_0.del").unwrap();
        let read = DeletedDocs::read(input.as_mut()).unwrap();
        assert_eq!(read.count(), 2);
        assert!(read.is_deleted(3));
        assert!(read.is_deleted(77));
        assert!(!read.is_deleted(4));
    }
}
