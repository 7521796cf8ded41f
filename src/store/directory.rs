use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::core::error::{Error, ErrorKind, Result};
use crate::store::input::IndexInput;
use crate::store::output::IndexOutput;

/// Name of the writer mutual-exclusion lock file
pub const WRITE_LOCK_NAME: &str = "write.lock";

/// Byte-addressable file store
///
/// A directory maps file names to immutable-once-written byte blobs. All
/// index components go through this trait; the concrete backing store
/// (heap, filesystem, mmap) is interchangeable.
pub trait Directory: Send + Sync {
    fn list(&self) -> Result<Vec<String>>;

    fn exists(&self, name: &str) -> Result<bool>;

    fn length(&self, name: &str) -> Result<u64>;

    fn modified(&self, name: &str) -> Result<DateTime<Utc>>;

    /// Opens a new file truncated to zero length
    fn create_output(&self, name: &str) -> Result<Box<dyn IndexOutput>>;

    /// Opens an existing file for random-access reads
    fn open_input(&self, name: &str) -> Result<Box<dyn IndexInput>>;

    /// Idempotent best-effort delete
    fn delete(&self, name: &str) -> Result<()>;

    fn make_lock(&self, name: &str) -> Box<dyn Lock>;

    /// Durably persists a previously written file
    fn sync(&self, name: &str) -> Result<()>;
}

/// Advisory named mutex scoped to a directory
pub trait Lock: Send {
    /// Non-blocking attempt; true if the lock is now held
    fn obtain(&mut self) -> Result<bool>;

    fn release(&mut self);

    fn is_locked(&self) -> bool;

    /// Retries `obtain` until the deadline passes
    fn obtain_within(&mut self, timeout_ms: u64) -> Result<()> {
        const POLL_INTERVAL_MS: u64 = 50;
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            if self.obtain()? {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(Error::new(
                    ErrorKind::LockFailed,
                    format!("lock obtain timed out after {}ms", timeout_ms),
                ));
            }
            thread::sleep(Duration::from_millis(POLL_INTERVAL_MS));
        }
    }
}
