use std::collections::HashMap;

use crate::core::error::{Error, Result};
use crate::store::directory::Directory;
use crate::store::input::{ChecksumIndexInput, IndexInput};
use crate::store::output::{ChecksumIndexOutput, IndexOutput};

/// Current layout marker of `segments_N`; negative so it can never be
/// confused with a legacy segment count at the same position
pub const SEGMENTS_FORMAT: i32 = -1;
const SEGMENTS_GEN_FORMAT: i32 = -2;

pub const SEGMENTS_PREFIX: &str = "segments_";
pub const SEGMENTS_GEN_FILE: &str = "segments.gen";

/// No deletions recorded for the segment
pub const NO_DEL_GEN: i64 = -1;

pub fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap()
}

pub fn from_base36(s: &str) -> Option<u64> {
    let mut n: u64 = 0;
    for c in s.chars() {
        let digit = c.to_digit(36)?;
        n = n.checked_mul(36)?.checked_add(digit as u64)?;
    }
    Some(n)
}

pub fn segments_file_name(generation: u64) -> String {
    format!("{}{}", SEGMENTS_PREFIX, to_base36(generation))
}

/// Descriptor of one immutable segment
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentInfo {
    pub name: String,
    pub doc_count: u32,
    /// Generation of the live `.del` file, or `NO_DEL_GEN`
    pub del_gen: i64,
    /// Per-field norm generations; empty while all norms live in the
    /// single `.nrm` file
    pub norm_gens: Vec<i64>,
    pub is_compound: bool,
    pub has_single_norm_file: bool,
    pub diagnostics: HashMap<String, String>,
}

impl SegmentInfo {
    pub fn new(name: impl Into<String>, doc_count: u32) -> Self {
        SegmentInfo {
            name: name.into(),
            doc_count,
            del_gen: NO_DEL_GEN,
            norm_gens: Vec::new(),
            is_compound: false,
            has_single_norm_file: true,
            diagnostics: HashMap::new(),
        }
    }

    pub fn has_deletions(&self) -> bool {
        self.del_gen != NO_DEL_GEN
    }

    pub fn del_file_name(&self) -> Option<String> {
        if self.has_deletions() {
            Some(format!(
                "{}_{}.del",
                self.name,
                to_base36(self.del_gen as u64)
            ))
        } else {
            None
        }
    }

    pub fn advance_del_gen(&mut self) {
        self.del_gen = if self.del_gen == NO_DEL_GEN {
            1
        } else {
            self.del_gen + 1
        };
    }

    pub fn file_name(&self, extension: &str) -> String {
        format!("{}.{}", self.name, extension)
    }
}

/// Extensions a segment may own, term vectors included
pub const SEGMENT_EXTENSIONS: [&str; 11] = [
    "fnm", "tis", "tii", "frq", "prx", "nrm", "fdt", "fdx", "tvx", "tvd", "tvf",
];

/// The ordered set of segments making up one commit
#[derive(Debug, Clone, Default)]
pub struct SegmentInfos {
    pub segments: Vec<SegmentInfo>,
    /// Bumped on every committed change
    pub version: i64,
    /// Source of fresh segment names
    pub counter: i64,
    /// Generation this instance was read from, 0 if never committed
    pub generation: u64,
}

impl SegmentInfos {
    pub fn new() -> Self {
        SegmentInfos::default()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn total_doc_count(&self) -> u32 {
        self.segments.iter().map(|s| s.doc_count).sum()
    }

    pub fn push(&mut self, info: SegmentInfo) {
        self.segments.push(info);
    }

    /// Next fresh segment name, e.g. `_0`, `_1`, … `_a`, …
    pub fn new_segment_name(&mut self) -> String {
        let name = format!("_{}", to_base36(self.counter as u64));
        self.counter += 1;
        name
    }

    /// Largest generation among `segments_N` files in the listing; the
    /// listing is authoritative, `segments.gen` is only a hint
    pub fn latest_generation(files: &[String]) -> Option<u64> {
        files
            .iter()
            .filter_map(|f| f.strip_prefix(SEGMENTS_PREFIX))
            .filter_map(from_base36)
            .max()
    }

    pub fn read_current(dir: &dyn Directory) -> Result<SegmentInfos> {
        let files = dir.list()?;
        match Self::latest_generation(&files) {
            Some(generation) => Self::read(dir, generation),
            None => Err(Error::file_not_found("segments_N (no commit present)")),
        }
    }

    pub fn read(dir: &dyn Directory, generation: u64) -> Result<SegmentInfos> {
        let name = segments_file_name(generation);
        let mut input = ChecksumIndexInput::new(dir.open_input(&name)?);

        let format = input.read_i32()?;
        if format != SEGMENTS_FORMAT {
            return Err(Error::corrupt(format!(
                "unrecognized segments file format {}",
                format
            )));
        }
        let version = input.read_i64()?;
        let counter = input.read_i64()?;
        let count = input.read_i32()?;
        if count < 0 {
            return Err(Error::corrupt(format!("negative segment count {}", count)));
        }
        let mut segments = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let seg_name = input.read_string()?;
            let doc_count = input.read_i32()?;
            if doc_count < 0 {
                return Err(Error::corrupt(format!(
                    "segment {} has negative doc count",
                    seg_name
                )));
            }
            let del_gen = input.read_i64()?;
            let norm_count = input.read_i32()?;
            let mut norm_gens = Vec::with_capacity(norm_count.max(0) as usize);
            for _ in 0..norm_count {
                norm_gens.push(input.read_i64()?);
            }
            let is_compound = input.read_byte()? != 0;
            let has_single_norm_file = input.read_byte()? != 0;
            let diagnostics = input.read_string_map()?;
            segments.push(SegmentInfo {
                name: seg_name,
                doc_count: doc_count as u32,
                del_gen,
                norm_gens,
                is_compound,
                has_single_norm_file,
                diagnostics,
            });
        }
        let expected = input.checksum() as i64;
        let actual = input.read_i64()?;
        if expected != actual {
            return Err(Error::corrupt(format!(
                "checksum mismatch in {}: stored {:x}, computed {:x}",
                name, actual, expected
            )));
        }
        Ok(SegmentInfos {
            segments,
            version,
            counter,
            generation,
        })
    }

    /// Atomically publishes this commit as `segments_<nextGen>`
    pub fn commit(&mut self, dir: &dyn Directory) -> Result<()> {
        let generation = self.generation + 1;
        let name = segments_file_name(generation);
        self.version += 1;

        {
            let mut raw = dir.create_output(&name)?;
            let mut out = ChecksumIndexOutput::new(raw.as_mut());
            out.write_i32(SEGMENTS_FORMAT)?;
            out.write_i64(self.version)?;
            out.write_i64(self.counter)?;
            out.write_i32(self.segments.len() as i32)?;
            for seg in &self.segments {
                out.write_string(&seg.name)?;
                out.write_i32(seg.doc_count as i32)?;
                out.write_i64(seg.del_gen)?;
                out.write_i32(seg.norm_gens.len() as i32)?;
                for &norm_gen in &seg.norm_gens {
                    out.write_i64(norm_gen)?;
                }
                out.write_byte(seg.is_compound as u8)?;
                out.write_byte(seg.has_single_norm_file as u8)?;
                out.write_string_map(&seg.diagnostics)?;
            }
            out.finish()?;
            raw.flush()?;
        }
        dir.sync(&name)?;
        self.generation = generation;

        // Best-effort hint; the directory listing stays authoritative
        if let Ok(mut gen_out) = dir.create_output(SEGMENTS_GEN_FILE) {
            let _ = gen_out.write_i32(SEGMENTS_GEN_FORMAT);
            let _ = gen_out.write_i64(generation as i64);
            let _ = gen_out.write_i64(generation as i64);
            let _ = gen_out.flush();
        }
        Ok(())
    }

    pub fn segments_file_name(&self) -> String {
        segments_file_name(self.generation)
    }

    /// Exactly the files this commit references: per-segment files that
    /// exist, the live deletion bitset generation, and the commit's own
    /// `segments_N`. Superseded `.del` generations are deliberately not
    /// referenced so retiring the older commit frees them.
    pub fn files(&self, dir: &dyn Directory) -> Result<Vec<String>> {
        let mut referenced = Vec::new();
        if self.generation > 0 {
            referenced.push(self.segments_file_name());
        }
        for seg in &self.segments {
            for ext in SEGMENT_EXTENSIONS {
                let name = seg.file_name(ext);
                if dir.exists(&name)? {
                    referenced.push(name);
                }
            }
            if let Some(del) = seg.del_file_name() {
                if dir.exists(&del)? {
                    referenced.push(del);
                }
            }
        }
        Ok(referenced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ram::RamDirectory;

    #[test]
    fn test_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(from_base36("z"), Some(35));
        assert_eq!(from_base36(&to_base36(123456789)), Some(123456789));
    }

    #[test]
    fn test_segments_round_trip() {
        let dir = RamDirectory::new();
        let mut infos = SegmentInfos::new();
        for docs in [10u32, 20, 5] {
            let name = infos.new_segment_name();
            let mut seg = SegmentInfo::new(name, docs);
            seg.diagnostics
                .insert("source".to_string(), "flush".to_string());
            seg.diagnostics
                .insert("uuid".to_string(), uuid::Uuid::new_v4().to_string());
            infos.push(seg);
        }
        infos.commit(&dir).unwrap();

        let read = SegmentInfos::read_current(&dir).unwrap();
        assert_eq!(read.segments, infos.segments);
        assert_eq!(read.version, infos.version);
        assert_eq!(read.counter, 3);
        assert_eq!(read.generation, 1);
    }

    #[test]
    fn test_generation_advances() {
        let dir = RamDirectory::new();
        let mut infos = SegmentInfos::new();
        infos.commit(&dir).unwrap();
        infos.commit(&dir).unwrap();
        assert_eq!(infos.generation, 2);
        let files = dir.list().unwrap();
        assert!(files.contains(&"segments_1".to_string()));
        assert!(files.contains(&"segments_2".to_string()));
        assert_eq!(
            SegmentInfos::latest_generation(&files),
            Some(2),
            "listing must pick the newest generation"
        );
    }

    #[test]
    fn test_corrupt_checksum_detected() {
        let dir = RamDirectory::new();
        let mut infos = SegmentInfos::new();
        infos.push(SegmentInfo::new("_0", 4));
        infos.commit(&dir).unwrap();

        // Flip one body byte and rewrite under the same name
        let name = infos.segments_file_name();
        let mut input = dir.open_input(&name).unwrap();
        let len = input.length() as usize;
        let mut bytes = vec![0u8; len];
        use crate::store::input::IndexInput;
        input.read_bytes(&mut bytes).unwrap();
        bytes[12] ^= 0x01;
        let mut out = dir.create_output(&name).unwrap();
        out.write_bytes(&bytes).unwrap();
        out.flush().unwrap();

        let err = SegmentInfos::read_current(&dir).unwrap_err();
        assert_eq!(err.kind, crate::core::error::ErrorKind::CorruptIndex);
    }
}
