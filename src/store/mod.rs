pub mod directory;
pub mod fs;
pub mod input;
pub mod mmap;
pub mod output;
pub mod ram;

pub use directory::{Directory, Lock, WRITE_LOCK_NAME};
pub use fs::FsDirectory;
pub use input::{ChecksumIndexInput, CountingIndexInput, IndexInput};
pub use mmap::MmapDirectory;
pub use output::{ChecksumIndexOutput, IndexOutput};
pub use ram::RamDirectory;
