use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use memmap2::Mmap;

use crate::core::error::{Error, Result};
use crate::store::directory::{Directory, Lock};
use crate::store::fs::FsDirectory;
use crate::store::input::IndexInput;
use crate::store::output::IndexOutput;

/// Memory-mapped read path over a filesystem directory
///
/// Writes go through the plain fs output; `open_input` maps the file and
/// serves reads from the mapping. The map is shared by cloned cursors.
pub struct MmapDirectory {
    inner: FsDirectory,
}

impl MmapDirectory {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        Ok(MmapDirectory {
            inner: FsDirectory::open(root)?,
        })
    }
}

impl Directory for MmapDirectory {
    fn list(&self) -> Result<Vec<String>> {
        self.inner.list()
    }

    fn exists(&self, name: &str) -> Result<bool> {
        self.inner.exists(name)
    }

    fn length(&self, name: &str) -> Result<u64> {
        self.inner.length(name)
    }

    fn modified(&self, name: &str) -> Result<DateTime<Utc>> {
        self.inner.modified(name)
    }

    fn create_output(&self, name: &str) -> Result<Box<dyn IndexOutput>> {
        self.inner.create_output(name)
    }

    fn open_input(&self, name: &str) -> Result<Box<dyn IndexInput>> {
        let path = self.inner.root().join(name);
        let file = File::open(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::file_not_found(name)
            } else {
                e.into()
            }
        })?;
        // Zero-length files cannot be mapped
        if file.metadata()?.len() == 0 {
            return Ok(Box::new(MmapInput {
                map: None,
                pos: 0,
            }));
        }
        let map = unsafe { Mmap::map(&file)? };
        Ok(Box::new(MmapInput {
            map: Some(Arc::new(map)),
            pos: 0,
        }))
    }

    fn delete(&self, name: &str) -> Result<()> {
        self.inner.delete(name)
    }

    fn make_lock(&self, name: &str) -> Box<dyn Lock> {
        self.inner.make_lock(name)
    }

    fn sync(&self, name: &str) -> Result<()> {
        self.inner.sync(name)
    }
}

struct MmapInput {
    map: Option<Arc<Mmap>>,
    pos: u64,
}

impl MmapInput {
    fn data(&self) -> &[u8] {
        self.map.as_deref().map(|m| &m[..]).unwrap_or(&[])
    }
}

impl IndexInput for MmapInput {
    fn read_byte(&mut self) -> Result<u8> {
        let byte = *self
            .data()
            .get(self.pos as usize)
            .ok_or_else(|| Error::corrupt("read past end of file"))?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        let data = self.data();
        let start = self.pos as usize;
        let end = start + buf.len();
        if end > data.len() {
            return Err(Error::corrupt("read past end of file"));
        }
        buf.copy_from_slice(&data[start..end]);
        self.pos = end as u64;
        Ok(())
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        self.pos = pos;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn length(&self) -> u64 {
        self.data().len() as u64
    }

    fn clone_input(&self) -> Box<dyn IndexInput> {
        Box::new(MmapInput {
            map: self.map.clone(),
            pos: self.pos,
        })
    }
}
