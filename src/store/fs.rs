use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::core::error::{Error, ErrorKind, Result};
use crate::store::directory::{Directory, Lock};
use crate::store::input::IndexInput;
use crate::store::output::IndexOutput;

/// Filesystem directory with flock-based advisory locks
pub struct FsDirectory {
    root: PathBuf,
}

impl FsDirectory {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(FsDirectory { root })
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl Directory for FsDirectory {
    fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.path(name).exists())
    }

    fn length(&self, name: &str) -> Result<u64> {
        Ok(fs::metadata(self.path(name))?.len())
    }

    fn modified(&self, name: &str) -> Result<DateTime<Utc>> {
        let mtime = fs::metadata(self.path(name))?.modified()?;
        Ok(DateTime::<Utc>::from(mtime))
    }

    fn create_output(&self, name: &str) -> Result<Box<dyn IndexOutput>> {
        let file = File::create(self.path(name))?;
        Ok(Box::new(FsOutput {
            writer: BufWriter::with_capacity(16 * 1024, file),
            pos: 0,
        }))
    }

    fn open_input(&self, name: &str) -> Result<Box<dyn IndexInput>> {
        let path = self.path(name);
        let file = File::open(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::file_not_found(name)
            } else {
                e.into()
            }
        })?;
        let length = file.metadata()?.len();
        Ok(Box::new(FsInput {
            file: Arc::new(file),
            pos: 0,
            length,
            buffer: Vec::new(),
            buffer_start: 0,
        }))
    }

    fn delete(&self, name: &str) -> Result<()> {
        match fs::remove_file(self.path(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn make_lock(&self, name: &str) -> Box<dyn Lock> {
        Box::new(NativeLock {
            path: self.path(name),
            file: None,
        })
    }

    fn sync(&self, name: &str) -> Result<()> {
        let file = File::open(self.path(name))?;
        file.sync_all()?;
        Ok(())
    }
}

const INPUT_BUFFER_SIZE: usize = 4096;

struct FsInput {
    file: Arc<File>,
    pos: u64,
    length: u64,
    buffer: Vec<u8>,
    buffer_start: u64,
}

impl FsInput {
    fn refill(&mut self) -> Result<()> {
        use std::os::unix::fs::FileExt;
        let want = INPUT_BUFFER_SIZE.min((self.length - self.pos) as usize);
        if want == 0 {
            return Err(Error::corrupt("read past end of file"));
        }
        let mut buf = vec![0u8; want];
        self.file.read_exact_at(&mut buf, self.pos)?;
        self.buffer = buf;
        self.buffer_start = self.pos;
        Ok(())
    }

    fn buffered(&self, pos: u64) -> Option<u8> {
        if pos >= self.buffer_start && pos < self.buffer_start + self.buffer.len() as u64 {
            Some(self.buffer[(pos - self.buffer_start) as usize])
        } else {
            None
        }
    }
}

impl IndexInput for FsInput {
    fn read_byte(&mut self) -> Result<u8> {
        if self.buffered(self.pos).is_none() {
            self.refill()?;
        }
        let byte = self.buffered(self.pos).unwrap();
        self.pos += 1;
        Ok(byte)
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        use std::os::unix::fs::FileExt;
        if self.pos + buf.len() as u64 > self.length {
            return Err(Error::corrupt("read past end of file"));
        }
        // Large reads bypass the buffer
        if buf.len() >= INPUT_BUFFER_SIZE {
            self.file.read_exact_at(buf, self.pos)?;
            self.pos += buf.len() as u64;
            return Ok(());
        }
        for slot in buf.iter_mut() {
            *slot = self.read_byte()?;
        }
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
        Box::new(FsInput {
            file: self.file.clone(),
            pos: self.pos,
            length: self.length,
            buffer: Vec::new(),
            buffer_start: 0,
        })
    }
}

struct FsOutput {
    writer: BufWriter<File>,
    pos: u64,
}

impl IndexOutput for FsOutput {
    fn write_byte(&mut self, b: u8) -> Result<()> {
        self.writer.write_all(&[b])?;
        self.pos += 1;
        Ok(())
    }

    fn write_bytes(&mut self, buf: &[u8]) -> Result<()> {
        self.writer.write_all(buf)?;
        self.pos += buf.len() as u64;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_mut().seek(SeekFrom::Start(pos))?;
        self.pos = pos;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

impl Drop for FsOutput {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

/// OS-level lock file, exclusive flock held for the lock's lifetime
pub struct NativeLock {
    path: PathBuf,
    file: Option<File>,
}

impl Lock for NativeLock {
    fn obtain(&mut self) -> Result<bool> {
        if self.file.is_some() {
            return Ok(true);
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&self.path)?;

        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;

            let fd = file.as_raw_fd();
            let rc = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
            if rc != 0 {
                return Ok(false);
            }
        }

        self.file = Some(file);
        Ok(true)
    }

    fn release(&mut self) {
        #[cfg(unix)]
        if let Some(file) = &self.file {
            use std::os::unix::io::AsRawFd;
            unsafe {
                libc::flock(file.as_raw_fd(), libc::LOCK_UN);
            }
        }
        self.file = None;
    }

    fn is_locked(&self) -> bool {
        self.file.is_some()
    }
}

impl Drop for NativeLock {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fs_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = FsDirectory::open(tmp.path()).unwrap();
        {
            let mut out = dir.create_output("data").unwrap();
            out.write_vint(300).unwrap();
            out.write_string("segment").unwrap();
            out.flush().unwrap();
        }
        let mut input = dir.open_input("data").unwrap();
        assert_eq!(input.read_vint().unwrap(), 300);
        assert_eq!(input.read_string().unwrap(), "segment");
        assert!(dir.list().unwrap().contains(&"data".to_string()));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = FsDirectory::open(tmp.path()).unwrap();
        dir.delete("never-existed").unwrap();
    }

    #[test]
    fn test_output_seek_patches_header() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = FsDirectory::open(tmp.path()).unwrap();
        {
            let mut out = dir.create_output("patched").unwrap();
            out.write_u64(0).unwrap();
            out.write_string("body").unwrap();
            out.seek(0).unwrap();
            out.write_u64(42).unwrap();
            out.flush().unwrap();
        }
        let mut input = dir.open_input("patched").unwrap();
        assert_eq!(input.read_u64().unwrap(), 42);
        assert_eq!(input.read_string().unwrap(), "body");
    }
}
