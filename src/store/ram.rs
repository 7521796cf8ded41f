use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};

use crate::core::error::{Error, ErrorKind, Result};
use crate::store::directory::{Directory, Lock};
use crate::store::input::IndexInput;
use crate::store::output::IndexOutput;

struct RamFile {
    data: RwLock<Vec<u8>>,
    modified: RwLock<DateTime<Utc>>,
}

impl RamFile {
    fn new() -> Self {
        RamFile {
            data: RwLock::new(Vec::new()),
            modified: RwLock::new(Utc::now()),
        }
    }
}

/// Heap-backed directory
///
/// Open inputs hold an `Arc` to their file, so a reader keeps its bytes
/// alive even after the file is deleted from the directory.
pub struct RamDirectory {
    files: RwLock<HashMap<String, Arc<RamFile>>>,
    held_locks: Arc<Mutex<HashSet<String>>>,
}

impl RamDirectory {
    pub fn new() -> Self {
        RamDirectory {
            files: RwLock::new(HashMap::new()),
            held_locks: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    fn file(&self, name: &str) -> Result<Arc<RamFile>> {
        self.files
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::file_not_found(name))
    }
}

impl Default for RamDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl Directory for RamDirectory {
    fn list(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.files.read().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.files.read().contains_key(name))
    }

    fn length(&self, name: &str) -> Result<u64> {
        Ok(self.file(name)?.data.read().len() as u64)
    }

    fn modified(&self, name: &str) -> Result<DateTime<Utc>> {
        Ok(*self.file(name)?.modified.read())
    }

    fn create_output(&self, name: &str) -> Result<Box<dyn IndexOutput>> {
        let file = Arc::new(RamFile::new());
        self.files.write().insert(name.to_string(), file.clone());
        Ok(Box::new(RamOutput {
            file,
            buffer: Vec::new(),
            pos: 0,
        }))
    }

    fn open_input(&self, name: &str) -> Result<Box<dyn IndexInput>> {
        let file = self.file(name)?;
        let length = file.data.read().len() as u64;
        Ok(Box::new(RamInput {
            file,
            pos: 0,
            length,
        }))
    }

    fn delete(&self, name: &str) -> Result<()> {
        self.files.write().remove(name);
        Ok(())
    }

    fn make_lock(&self, name: &str) -> Box<dyn Lock> {
        Box::new(RamLock {
            name: name.to_string(),
            held_locks: self.held_locks.clone(),
            held: false,
        })
    }

    fn sync(&self, _name: &str) -> Result<()> {
        Ok(())
    }
}

struct RamInput {
    file: Arc<RamFile>,
    pos: u64,
    length: u64,
}

impl IndexInput for RamInput {
    fn read_byte(&mut self) -> Result<u8> {
        let data = self.file.data.read();
        let byte = *data
            .get(self.pos as usize)
            .ok_or_else(|| Error::corrupt("read past end of file"))?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        let data = self.file.data.read();
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
        self.length
    }

    fn clone_input(&self) -> Box<dyn IndexInput> {
        Box::new(RamInput {
            file: self.file.clone(),
            pos: self.pos,
            length: self.length,
        })
    }
}

struct RamOutput {
    file: Arc<RamFile>,
    buffer: Vec<u8>,
    pos: usize,
}

impl IndexOutput for RamOutput {
    fn write_byte(&mut self, b: u8) -> Result<()> {
        if self.pos == self.buffer.len() {
            self.buffer.push(b);
        } else {
            self.buffer[self.pos] = b;
        }
        self.pos += 1;
        Ok(())
    }

    fn write_bytes(&mut self, buf: &[u8]) -> Result<()> {
        for &b in buf {
            self.write_byte(b)?;
        }
        Ok(())
    }

    fn position(&self) -> u64 {
        self.pos as u64
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        if pos as usize > self.buffer.len() {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                format!("seek past end of file: {}", pos),
            ));
        }
        self.pos = pos as usize;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        *self.file.data.write() = self.buffer.clone();
        *self.file.modified.write() = Utc::now();
        Ok(())
    }
}

impl Drop for RamOutput {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

struct RamLock {
    name: String,
    held_locks: Arc<Mutex<HashSet<String>>>,
    held: bool,
}

impl Lock for RamLock {
    fn obtain(&mut self) -> Result<bool> {
        if self.held {
            return Ok(true);
        }
        let mut held_locks = self.held_locks.lock();
        if held_locks.contains(&self.name) {
            return Ok(false);
        }
        held_locks.insert(self.name.clone());
        self.held = true;
        Ok(true)
    }

    fn release(&mut self) {
        if self.held {
            self.held_locks.lock().remove(&self.name);
            self.held = false;
        }
    }

    fn is_locked(&self) -> bool {
        self.held || self.held_locks.lock().contains(&self.name)
    }
}

impl Drop for RamLock {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_truncates() {
        let dir = RamDirectory::new();
        {
            let mut out = dir.create_output("f").unwrap();
            out.write_bytes(b"hello world").unwrap();
            out.flush().unwrap();
        }
        assert_eq!(dir.length("f").unwrap(), 11);
        {
            let mut out = dir.create_output("f").unwrap();
            out.write_bytes(b"hi").unwrap();
            out.flush().unwrap();
        }
        assert_eq!(dir.length("f").unwrap(), 2);
    }

    #[test]
    fn test_open_input_missing_file() {
        let dir = RamDirectory::new();
        let err = match dir.open_input("absent") {
            Ok(_) => panic!("expected open_input to fail for missing file"),
            Err(err) => err,
        };
        assert_eq!(err.kind, ErrorKind::FileNotFound);
    }

    #[test]
    fn test_deleted_file_stays_readable() {
        let dir = RamDirectory::new();
        {
            let mut out = dir.create_output("f").unwrap();
            out.write_bytes(b"pinned").unwrap();
            out.flush().unwrap();
        }
        let mut input = dir.open_input("f").unwrap();
        dir.delete("f").unwrap();
        assert!(!dir.exists("f").unwrap());
        let mut buf = [0u8; 6];
        input.read_bytes(&mut buf).unwrap();
        assert_eq!(&buf, b"pinned");
    }

    #[test]
    fn test_lock_exclusion() {
        let dir = RamDirectory::new();
        let mut a = dir.make_lock("write.lock");
        let mut b = dir.make_lock("write.lock");
        assert!(a.obtain().unwrap());
        assert!(!b.obtain().unwrap());
        a.release();
        assert!(b.obtain().unwrap());
    }
}
