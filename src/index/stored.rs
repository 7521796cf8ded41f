use std::sync::Arc;

use crate::core::error::{Error, Result};
use crate::index::field::{Field, FieldFlags, FieldValue};
use crate::index::field_infos::FieldInfos;
use crate::store::directory::Directory;
use crate::store::input::IndexInput;
use crate::store::output::IndexOutput;

const FDT_VERSION: u32 = 1;
pub const STORED_EXT: &str = "fdt";
pub const STORED_INDEX_EXT: &str = "fdx";

const FDX_HEADER: u64 = 4;

const BIT_BINARY: u8 = 0x01;
const BIT_COMPRESSED: u8 = 0x02;
const BIT_TOKENIZED: u8 = 0x04;

/// Appends stored field values in doc-id order, one `.fdx` entry per doc
///
/// Docs without stored fields still get an (empty) record so the index
/// file stays addressable by doc id.
pub struct StoredFieldsWriter {
    fdt: Box<dyn IndexOutput>,
    fdx: Box<dyn IndexOutput>,
    doc_count: u32,
}

impl StoredFieldsWriter {
    pub fn open(dir: &dyn Directory, segment: &str) -> Result<Self> {
        let mut fdt = dir.create_output(&format!("{}.{}", segment, STORED_EXT))?;
        let mut fdx = dir.create_output(&format!("{}.{}", segment, STORED_INDEX_EXT))?;
        fdt.write_u32(FDT_VERSION)?;
        fdx.write_u32(FDT_VERSION)?;
        Ok(StoredFieldsWriter {
            fdt,
            fdx,
            doc_count: 0,
        })
    }

    pub fn doc_count(&self) -> u32 {
        self.doc_count
    }

    /// Writes one doc's stored fields; `fields` carries the segment field
    /// number of each stored field
    pub fn add_doc(&mut self, fields: &[(u32, &Field)]) -> Result<()> {
        self.fdx.write_u64(self.fdt.position())?;
        self.fdt.write_vint(fields.len() as u32)?;
        for (number, field) in fields {
            self.fdt.write_vint(*number)?;
            let binary = matches!(field.value, FieldValue::Bytes(_));
            let mut bits = 0u8;
            if binary {
                bits |= BIT_BINARY;
            }
            if field.flags.compressed {
                bits |= BIT_COMPRESSED;
            }
            if field.flags.tokenized {
                bits |= BIT_TOKENIZED;
            }
            self.fdt.write_byte(bits)?;
            if field.flags.compressed {
                let packed = lz4_flex::compress_prepend_size(field.value.as_bytes());
                self.fdt.write_vint(packed.len() as u32)?;
                self.fdt.write_bytes(&packed)?;
            } else {
                match &field.value {
                    FieldValue::Text(text) => self.fdt.write_string(text)?,
                    FieldValue::Bytes(bytes) => {
                        self.fdt.write_vint(bytes.len() as u32)?;
                        self.fdt.write_bytes(bytes)?;
                    }
                }
            }
        }
        self.doc_count += 1;
        Ok(())
    }

    /// Pads empty records until `doc_count` docs are addressable
    pub fn fill(&mut self, doc_count: u32) -> Result<()> {
        while self.doc_count < doc_count {
            self.add_doc(&[])?;
        }
        Ok(())
    }

    pub fn close(mut self) -> Result<()> {
        self.fdt.flush()?;
        self.fdx.flush()
    }
}

/// Random-access reader over one segment's stored fields
pub struct StoredFieldsReader {
    fdt: Box<dyn IndexInput>,
    fdx: Box<dyn IndexInput>,
    field_infos: Arc<FieldInfos>,
    doc_count: u32,
}

impl StoredFieldsReader {
    pub fn open(
        dir: &dyn Directory,
        segment: &str,
        field_infos: Arc<FieldInfos>,
        doc_count: u32,
    ) -> Result<Self> {
        let mut fdt = dir.open_input(&format!("{}.{}", segment, STORED_EXT))?;
        let mut fdx = dir.open_input(&format!("{}.{}", segment, STORED_INDEX_EXT))?;
        for input in [fdt.as_mut(), fdx.as_mut()] {
            let version = input.read_u32()?;
            if version != FDT_VERSION {
                return Err(Error::corrupt(format!(
                    "unknown stored fields version {}",
                    version
                )));
            }
        }
        Ok(StoredFieldsReader {
            fdt,
            fdx,
            field_infos,
            doc_count,
        })
    }

    /// Materializes the stored part of a document
    pub fn doc(&mut self, doc: u32) -> Result<Vec<Field>> {
        if doc >= self.doc_count {
            return Err(Error::invalid_argument(format!(
                "doc {} out of range (segment has {})",
                doc, self.doc_count
            )));
        }
        self.fdx.seek(FDX_HEADER + doc as u64 * 8)?;
        let pointer = self.fdx.read_u64()?;
        self.fdt.seek(pointer)?;

        let field_count = self.fdt.read_vint()?;
        let mut fields = Vec::with_capacity(field_count as usize);
        for _ in 0..field_count {
            let number = self.fdt.read_vint()?;
            let bits = self.fdt.read_byte()?;
            let info = self
                .field_infos
                .field_info(number)
                .ok_or_else(|| Error::corrupt(format!("unknown field number {}", number)))?;
            let compressed = bits & BIT_COMPRESSED != 0;
            let binary = bits & BIT_BINARY != 0;
            let value = if compressed {
                let len = self.fdt.read_vint()? as usize;
                let mut packed = vec![0u8; len];
                self.fdt.read_bytes(&mut packed)?;
                let raw = lz4_flex::decompress_size_prepended(&packed)
                    .map_err(|e| Error::corrupt(format!("bad compressed field: {}", e)))?;
                if binary {
                    FieldValue::Bytes(raw)
                } else {
                    FieldValue::Text(String::from_utf8(raw).map_err(|e| {
                        Error::corrupt(format!("invalid UTF-8 in stored field: {}", e))
                    })?)
                }
            } else if binary {
                let len = self.fdt.read_vint()? as usize;
                let mut bytes = vec![0u8; len];
                self.fdt.read_bytes(&mut bytes)?;
                FieldValue::Bytes(bytes)
            } else {
                FieldValue::Text(self.fdt.read_string()?)
            };
            let flags = FieldFlags {
                indexed: info.indexed,
                tokenized: bits & BIT_TOKENIZED != 0,
                stored: true,
                compressed,
                ..FieldFlags::default()
            };
            fields.push(Field::new(info.name.clone(), value, flags));
        }
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ram::RamDirectory;

    #[test]
    fn test_stored_round_trip_with_gaps_and_compression() {
        let dir = RamDirectory::new();
        let mut infos = FieldInfos::new();
        infos.add("title", &FieldFlags::default(), false);
        infos.add("blob", &FieldFlags::default(), false);
        let infos = Arc::new(infos);

        let title = Field::stored("title", FieldValue::Text("quick brown fox".into()));
        let mut blob = Field::stored("blob", FieldValue::Bytes(vec![0u8; 512]));
        blob.flags.compressed = true;

        {
            let mut writer = StoredFieldsWriter::open(&dir, "_0").unwrap();
            writer.add_doc(&[(0, &title), (1, &blob)]).unwrap();
            // Doc 1 stores nothing
            writer.fill(2).unwrap();
            writer.add_doc(&[(0, &title)]).unwrap();
            assert_eq!(writer.doc_count(), 3);
            writer.close().unwrap();
        }

        let mut reader = StoredFieldsReader::open(&dir, "_0", infos, 3).unwrap();
        let doc0 = reader.doc(0).unwrap();
        assert_eq!(doc0.len(), 2);
        assert_eq!(doc0[0].value.as_text(), Some("quick brown fox"));
        assert_eq!(doc0[1].value.as_bytes(), &[0u8; 512][..]);
        assert!(doc0[1].flags.compressed);

        assert!(reader.doc(1).unwrap().is_empty());
        assert_eq!(reader.doc(2).unwrap().len(), 1);
        assert!(reader.doc(3).is_err());
    }
}
