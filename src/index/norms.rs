use std::collections::HashMap;
use std::sync::Arc;

use crate::core::error::{Error, Result};
use crate::index::field_infos::FieldInfos;
use crate::store::directory::Directory;
use crate::store::input::IndexInput;
use crate::store::output::IndexOutput;

const NRM_VERSION: u32 = 1;
pub const NORMS_EXT: &str = "nrm";

/// Writes the single `.nrm` file: one byte per (field, doc), fields in
/// number order, only for indexed fields that keep norms
pub fn write_norms(
    dir: &dyn Directory,
    segment: &str,
    field_infos: &FieldInfos,
    norms: &HashMap<u32, Vec<u8>>,
    doc_count: u32,
) -> Result<()> {
    let mut out = dir.create_output(&format!("{}.{}", segment, NORMS_EXT))?;
    out.write_u32(NRM_VERSION)?;
    for info in field_infos.iter() {
        if !info.has_norms() {
            continue;
        }
        match norms.get(&info.number) {
            Some(bytes) => {
                debug_assert_eq!(bytes.len(), doc_count as usize);
                out.write_bytes(bytes)?;
            }
            None => {
                // Field never occurred in this segment; docs carry the
                // zero norm
                out.write_bytes(&vec![0u8; doc_count as usize])?;
            }
        }
    }
    out.flush()
}

/// Loads every field's norms into memory
pub fn read_norms(
    dir: &dyn Directory,
    segment: &str,
    field_infos: &FieldInfos,
    doc_count: u32,
) -> Result<HashMap<u32, Arc<Vec<u8>>>> {
    let mut norms = HashMap::new();
    let name = format!("{}.{}", segment, NORMS_EXT);
    if !dir.exists(&name)? {
        return Ok(norms);
    }
    let mut input = dir.open_input(&name)?;
    let version = input.read_u32()?;
    if version != NRM_VERSION {
        return Err(Error::corrupt(format!("unknown norms version {}", version)));
    }
    for info in field_infos.iter() {
        if !info.has_norms() {
            continue;
        }
        let mut bytes = vec![0u8; doc_count as usize];
        input.read_bytes(&mut bytes)?;
        norms.insert(info.number, Arc::new(bytes));
    }
    Ok(norms)
}
