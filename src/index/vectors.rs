use std::sync::Arc;

use crate::core::error::{Error, Result};
use crate::index::field_infos::FieldInfos;
use crate::store::directory::Directory;
use crate::store::input::IndexInput;
use crate::store::output::IndexOutput;

const TV_VERSION: u32 = 1;
pub const VECTORS_INDEX_EXT: &str = "tvx";
pub const VECTORS_DOCS_EXT: &str = "tvd";
pub const VECTORS_FIELDS_EXT: &str = "tvf";

const TVX_HEADER: u64 = 4;

const FLAG_POSITIONS: u8 = 0x01;
const FLAG_OFFSETS: u8 = 0x02;

/// One term inside a stored term vector
#[derive(Debug, Clone, PartialEq)]
pub struct TermVectorEntry {
    pub term: String,
    pub freq: u32,
    pub positions: Vec<u32>,
    pub offsets: Vec<(u32, u32)>,
}

/// All vectored terms of one (doc, field)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TermVector {
    pub entries: Vec<TermVectorEntry>,
}

impl TermVector {
    pub fn total_occurrences(&self) -> u64 {
        self.entries.iter().map(|e| e.freq as u64).sum()
    }
}

/// Per-field vector data handed to the writer at flush
pub struct FieldVector {
    pub field_number: u32,
    pub store_positions: bool,
    pub store_offsets: bool,
    /// Term-sorted
    pub entries: Vec<TermVectorEntry>,
}

/// Writes the optional `.tvx`/`.tvd`/`.tvf` term vector files
pub struct TermVectorsWriter {
    tvx: Box<dyn IndexOutput>,
    tvd: Box<dyn IndexOutput>,
    tvf: Box<dyn IndexOutput>,
    doc_count: u32,
}

impl TermVectorsWriter {
    pub fn open(dir: &dyn Directory, segment: &str) -> Result<Self> {
        let mut tvx = dir.create_output(&format!("{}.{}", segment, VECTORS_INDEX_EXT))?;
        let mut tvd = dir.create_output(&format!("{}.{}", segment, VECTORS_DOCS_EXT))?;
        let mut tvf = dir.create_output(&format!("{}.{}", segment, VECTORS_FIELDS_EXT))?;
        tvx.write_u32(TV_VERSION)?;
        tvd.write_u32(TV_VERSION)?;
        tvf.write_u32(TV_VERSION)?;
        Ok(TermVectorsWriter {
            tvx,
            tvd,
            tvf,
            doc_count: 0,
        })
    }

    pub fn doc_count(&self) -> u32 {
        self.doc_count
    }

    pub fn add_doc(&mut self, fields: &[FieldVector]) -> Result<()> {
        self.tvx.write_u64(self.tvd.position())?;
        self.tvx.write_u64(self.tvf.position())?;
        self.tvd.write_vint(fields.len() as u32)?;
        for field in fields {
            self.tvd.write_vint(field.field_number)?;
        }
        for field in fields {
            let start = self.tvf.position();
            self.write_field(field)?;
            self.tvd.write_vlong(self.tvf.position() - start)?;
        }
        self.doc_count += 1;
        Ok(())
    }

    fn write_field(&mut self, field: &FieldVector) -> Result<()> {
        let mut flags = 0u8;
        if field.store_positions {
            flags |= FLAG_POSITIONS;
        }
        if field.store_offsets {
            flags |= FLAG_OFFSETS;
        }
        self.tvf.write_byte(flags)?;
        self.tvf.write_vint(field.entries.len() as u32)?;
        let mut last_term: &str = "";
        for entry in &field.entries {
            let prefix = last_term
                .as_bytes()
                .iter()
                .zip(entry.term.as_bytes())
                .take_while(|(a, b)| a == b)
                .count();
            let suffix = &entry.term.as_bytes()[prefix..];
            self.tvf.write_vint(prefix as u32)?;
            self.tvf.write_vint(suffix.len() as u32)?;
            self.tvf.write_bytes(suffix)?;
            self.tvf.write_vint(entry.freq)?;
            if field.store_positions {
                let mut last = 0u32;
                for &pos in &entry.positions {
                    self.tvf.write_vint(pos - last)?;
                    last = pos;
                }
            }
            if field.store_offsets {
                let mut last = 0u32;
                for &(start, end) in &entry.offsets {
                    self.tvf.write_vint(start - last)?;
                    self.tvf.write_vint(end - start)?;
                    last = start;
                }
            }
            last_term = &entry.term;
        }
        Ok(())
    }

    /// Pads docs without vectors
    pub fn fill(&mut self, doc_count: u32) -> Result<()> {
        while self.doc_count < doc_count {
            self.add_doc(&[])?;
        }
        Ok(())
    }

    pub fn close(mut self) -> Result<()> {
        self.tvx.flush()?;
        self.tvd.flush()?;
        self.tvf.flush()
    }
}

/// Reads term vectors back by doc id
pub struct TermVectorsReader {
    tvx: Box<dyn IndexInput>,
    tvd: Box<dyn IndexInput>,
    tvf: Box<dyn IndexInput>,
    field_infos: Arc<FieldInfos>,
    doc_count: u32,
}

impl TermVectorsReader {
    pub fn open(
        dir: &dyn Directory,
        segment: &str,
        field_infos: Arc<FieldInfos>,
        doc_count: u32,
    ) -> Result<Option<Self>> {
        let tvx_name = format!("{}.{}", segment, VECTORS_INDEX_EXT);
        if !dir.exists(&tvx_name)? {
            return Ok(None);
        }
        let mut tvx = dir.open_input(&tvx_name)?;
        let mut tvd = dir.open_input(&format!("{}.{}", segment, VECTORS_DOCS_EXT))?;
        let mut tvf = dir.open_input(&format!("{}.{}", segment, VECTORS_FIELDS_EXT))?;
        for input in [tvx.as_mut(), tvd.as_mut(), tvf.as_mut()] {
            let version = input.read_u32()?;
            if version != TV_VERSION {
                return Err(Error::corrupt(format!(
                    "unknown term vectors version {}",
                    version
                )));
            }
        }
        Ok(Some(TermVectorsReader {
            tvx,
            tvd,
            tvf,
            field_infos,
            doc_count,
        }))
    }

    /// All vectored fields of one doc
    pub fn doc_vectors(&mut self, doc: u32) -> Result<Vec<(String, TermVector)>> {
        if doc >= self.doc_count {
            return Err(Error::invalid_argument(format!(
                "doc {} out of range (segment has {})",
                doc, self.doc_count
            )));
        }
        self.tvx.seek(TVX_HEADER + doc as u64 * 16)?;
        let tvd_ptr = self.tvx.read_u64()?;
        let tvf_base = self.tvx.read_u64()?;

        self.tvd.seek(tvd_ptr)?;
        let field_count = self.tvd.read_vint()?;
        let mut numbers = Vec::with_capacity(field_count as usize);
        for _ in 0..field_count {
            numbers.push(self.tvd.read_vint()?);
        }
        let mut lengths = Vec::with_capacity(field_count as usize);
        for _ in 0..field_count {
            lengths.push(self.tvd.read_vlong()?);
        }

        let mut out = Vec::with_capacity(field_count as usize);
        let mut offset = tvf_base;
        for (i, number) in numbers.iter().enumerate() {
            let name = self
                .field_infos
                .field_info(*number)
                .ok_or_else(|| Error::corrupt(format!("unknown field number {}", number)))?
                .name
                .clone();
            self.tvf.seek(offset)?;
            out.push((name, self.read_field()?));
            offset += lengths[i];
        }
        Ok(out)
    }

    /// One field's vector, if stored
    pub fn vector(&mut self, doc: u32, field: &str) -> Result<Option<TermVector>> {
        Ok(self
            .doc_vectors(doc)?
            .into_iter()
            .find(|(name, _)| name == field)
            .map(|(_, v)| v))
    }

    fn read_field(&mut self) -> Result<TermVector> {
        let flags = self.tvf.read_byte()?;
        let has_positions = flags & FLAG_POSITIONS != 0;
        let has_offsets = flags & FLAG_OFFSETS != 0;
        let term_count = self.tvf.read_vint()?;
        let mut entries = Vec::with_capacity(term_count as usize);
        let mut last_term: Vec<u8> = Vec::new();
        for _ in 0..term_count {
            let prefix = self.tvf.read_vint()? as usize;
            let suffix_len = self.tvf.read_vint()? as usize;
            last_term.truncate(prefix);
            let mut suffix = vec![0u8; suffix_len];
            self.tvf.read_bytes(&mut suffix)?;
            last_term.extend_from_slice(&suffix);
            let freq = self.tvf.read_vint()?;
            let mut positions = Vec::new();
            if has_positions {
                let mut last = 0u32;
                for _ in 0..freq {
                    last += self.tvf.read_vint()?;
                    positions.push(last);
                }
            }
            let mut offsets = Vec::new();
            if has_offsets {
                let mut last = 0u32;
                for _ in 0..freq {
                    let start = last + self.tvf.read_vint()?;
                    let end = start + self.tvf.read_vint()?;
                    offsets.push((start, end));
                    last = start;
                }
            }
            entries.push(TermVectorEntry {
                term: std::str::from_utf8(&last_term)?.to_string(),
                freq,
                positions,
                offsets,
            });
        }
        Ok(TermVector { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::field::FieldFlags;
    use crate::store::ram::RamDirectory;

    #[test]
    fn test_vector_round_trip() {
        let dir = RamDirectory::new();
        let mut infos = FieldInfos::new();
        infos.add(
            "body",
            &FieldFlags {
                indexed: true,
                store_term_vectors: true,
                store_positions: true,
                store_offsets: true,
                ..FieldFlags::default()
            },
            false,
        );
        let infos = Arc::new(infos);

        let field = FieldVector {
            field_number: 0,
            store_positions: true,
            store_offsets: true,
            entries: vec![
                TermVectorEntry {
                    term: "brown".into(),
                    freq: 1,
                    positions: vec![2],
                    offsets: vec![(10, 15)],
                },
                TermVectorEntry {
                    term: "quick".into(),
                    freq: 2,
                    positions: vec![1, 4],
                    offsets: vec![(4, 9), (20, 25)],
                },
            ],
        };
        {
            let mut writer = TermVectorsWriter::open(&dir, "_0").unwrap();
            writer.add_doc(&[field]).unwrap();
            writer.fill(2).unwrap();
            writer.close().unwrap();
        }

        let mut reader = TermVectorsReader::open(&dir, "_0", infos, 2)
            .unwrap()
            .unwrap();
        let vector = reader.vector(0, "body").unwrap().unwrap();
        assert_eq!(vector.entries.len(), 2);
        assert_eq!(vector.entries[0].term, "brown");
        assert_eq!(vector.entries[1].positions, vec![1, 4]);
        assert_eq!(vector.entries[1].offsets, vec![(4, 9), (20, 25)]);
        assert_eq!(vector.total_occurrences(), 3);
        assert!(reader.vector(1, "body").unwrap().is_none());
    }
}
