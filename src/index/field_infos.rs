use std::collections::HashMap;

use crate::core::error::{Error, Result};
use crate::index::field::FieldFlags;
use crate::store::input::IndexInput;
use crate::store::output::IndexOutput;

const FNM_VERSION: u32 = 1;

const IS_INDEXED: u8 = 0x01;
const IS_TOKENIZED: u8 = 0x02;
const STORE_TERM_VECTORS: u8 = 0x04;
const STORE_POSITIONS: u8 = 0x08;
const STORE_OFFSETS: u8 = 0x10;
const OMIT_NORMS: u8 = 0x20;
const OMIT_TF: u8 = 0x40;
const STORE_PAYLOADS: u8 = 0x80;

/// Per-segment state of one field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    pub name: String,
    pub number: u32,
    pub indexed: bool,
    pub tokenized: bool,
    pub store_term_vectors: bool,
    pub store_positions: bool,
    pub store_offsets: bool,
    pub omit_norms: bool,
    pub omit_term_freq_and_positions: bool,
    /// Set once any payload is seen for the field
    pub store_payloads: bool,
}

impl FieldInfo {
    pub fn has_norms(&self) -> bool {
        self.indexed && !self.omit_norms
    }
}

/// Dense field-name → field-number table for one segment
///
/// Numbers are stable within the segment and renumbered on merge.
#[derive(Debug, Clone, Default)]
pub struct FieldInfos {
    by_number: Vec<FieldInfo>,
    by_name: HashMap<String, u32>,
}

impl FieldInfos {
    pub fn new() -> Self {
        FieldInfos::default()
    }

    pub fn len(&self) -> usize {
        self.by_number.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_number.is_empty()
    }

    pub fn field_info(&self, number: u32) -> Option<&FieldInfo> {
        self.by_number.get(number as usize)
    }

    pub fn by_name(&self, name: &str) -> Option<&FieldInfo> {
        self.by_name
            .get(name)
            .map(|&n| &self.by_number[n as usize])
    }

    pub fn number(&self, name: &str) -> Option<u32> {
        self.by_name.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldInfo> {
        self.by_number.iter()
    }

    /// Adds the field or widens the flags of an existing one
    pub fn add(&mut self, name: &str, flags: &FieldFlags, has_payload: bool) -> u32 {
        if let Some(&number) = self.by_name.get(name) {
            let info = &mut self.by_number[number as usize];
            info.indexed |= flags.indexed;
            info.tokenized |= flags.tokenized;
            info.store_term_vectors |= flags.store_term_vectors;
            info.store_positions |= flags.store_positions;
            info.store_offsets |= flags.store_offsets;
            // A single omitting occurrence omits for the whole segment
            info.omit_norms |= flags.omit_norms;
            info.omit_term_freq_and_positions |= flags.omit_term_freq_and_positions;
            info.store_payloads |= has_payload;
            return number;
        }
        let number = self.by_number.len() as u32;
        self.by_number.push(FieldInfo {
            name: name.to_string(),
            number,
            indexed: flags.indexed,
            tokenized: flags.tokenized,
            store_term_vectors: flags.store_term_vectors,
            store_positions: flags.store_positions,
            store_offsets: flags.store_offsets,
            omit_norms: flags.omit_norms,
            omit_term_freq_and_positions: flags.omit_term_freq_and_positions,
            store_payloads: has_payload,
        });
        self.by_name.insert(name.to_string(), number);
        number
    }

    /// Records that a payload was seen for the field
    pub fn mark_payloads(&mut self, number: u32) {
        if let Some(info) = self.by_number.get_mut(number as usize) {
            info.store_payloads = true;
        }
    }

    pub fn add_info(&mut self, info: FieldInfo) -> u32 {
        let flags = FieldFlags {
            indexed: info.indexed,
            tokenized: info.tokenized,
            stored: false,
            store_term_vectors: info.store_term_vectors,
            store_positions: info.store_positions,
            store_offsets: info.store_offsets,
            omit_norms: info.omit_norms,
            omit_term_freq_and_positions: info.omit_term_freq_and_positions,
            compressed: false,
        };
        self.add(&info.name, &flags, info.store_payloads)
    }

    pub fn write(&self, out: &mut dyn IndexOutput) -> Result<()> {
        out.write_u32(FNM_VERSION)?;
        out.write_vint(self.by_number.len() as u32)?;
        for info in &self.by_number {
            out.write_string(&info.name)?;
            let mut bits = 0u8;
            if info.indexed {
                bits |= IS_INDEXED;
            }
            if info.tokenized {
                bits |= IS_TOKENIZED;
            }
            if info.store_term_vectors {
                bits |= STORE_TERM_VECTORS;
            }
            if info.store_positions {
                bits |= STORE_POSITIONS;
            }
            if info.store_offsets {
                bits |= STORE_OFFSETS;
            }
            if info.omit_norms {
                bits |= OMIT_NORMS;
            }
            if info.omit_term_freq_and_positions {
                bits |= OMIT_TF;
            }
            if info.store_payloads {
                bits |= STORE_PAYLOADS;
            }
            out.write_byte(bits)?;
        }
        out.flush()
    }

    pub fn read(input: &mut dyn IndexInput) -> Result<Self> {
        let version = input.read_u32()?;
        if version != FNM_VERSION {
            return Err(Error::corrupt(format!(
                "unknown field infos version {}",
                version
            )));
        }
        let count = input.read_vint()?;
        let mut infos = FieldInfos::new();
        for number in 0..count {
            let name = input.read_string()?;
            let bits = input.read_byte()?;
            infos.by_number.push(FieldInfo {
                name: name.clone(),
                number,
                indexed: bits & IS_INDEXED != 0,
                tokenized: bits & IS_TOKENIZED != 0,
                store_term_vectors: bits & STORE_TERM_VECTORS != 0,
                store_positions: bits & STORE_POSITIONS != 0,
                store_offsets: bits & STORE_OFFSETS != 0,
                omit_norms: bits & OMIT_NORMS != 0,
                omit_term_freq_and_positions: bits & OMIT_TF != 0,
                store_payloads: bits & STORE_PAYLOADS != 0,
            });
            infos.by_name.insert(name, number);
        }
        Ok(infos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ram::RamDirectory;
    use crate::store::Directory;

    #[test]
    fn test_fnm_round_trip() {
        let mut infos = FieldInfos::new();
        infos.add(
            "body",
            &FieldFlags {
                indexed: true,
                tokenized: true,
                ..FieldFlags::default()
            },
            true,
        );
        infos.add(
            "id",
            &FieldFlags {
                indexed: true,
                omit_norms: true,
                omit_term_freq_and_positions: true,
                ..FieldFlags::default()
            },
            false,
        );

        let dir = RamDirectory::new();
        {
            let mut out = dir.create_output("_0.fnm").unwrap();
            infos.write(out.as_mut()).unwrap();
        }
        let mut input = dir.open_input("_0.fnm").unwrap();
        let read = FieldInfos::read(input.as_mut()).unwrap();
        assert_eq!(read.len(), 2);
        let body = read.by_name("body").unwrap();
        assert!(body.indexed && body.tokenized && body.store_payloads);
        assert_eq!(body.number, 0);
        let id = read.by_name("id").unwrap();
        assert!(id.omit_norms && id.omit_term_freq_and_positions);
        assert!(!id.has_norms());
    }

    #[test]
    fn test_flag_widening() {
        let mut infos = FieldInfos::new();
        let n1 = infos.add("f", &FieldFlags::default(), false);
        let n2 = infos.add(
            "f",
            &FieldFlags {
                indexed: true,
                ..FieldFlags::default()
            },
            false,
        );
        assert_eq!(n1, n2);
        assert!(infos.by_name("f").unwrap().indexed);
    }
}
