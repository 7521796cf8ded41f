use log::debug;

use crate::core::config::IndexConfig;
use crate::core::error::Result;
use crate::index::field::Field;
use crate::index::field_infos::FieldInfos;
use crate::index::norms::write_norms;
use crate::index::postings::{TermDocs, TermPositions};
use crate::index::postings_writer::{PositionEntry, PostingsWriter};
use crate::index::segment_infos::SegmentInfo;
use crate::index::segment_reader::SegmentReader;
use crate::index::stored::StoredFieldsWriter;
use crate::index::term::Term;
use crate::index::term_dict::{TermDictWriter, TermEnum};
use crate::index::vectors::{FieldVector, TermVectorsWriter};
use crate::store::directory::Directory;

/// Collates N segments into one, dropping deleted docs
///
/// Field numbers are freshly assigned from the union of field names; doc
/// ids are remapped by per-segment bases that skip deletions; postings
/// streams are re-encoded under the new doc ids.
pub struct SegmentMerger<'a> {
    dir: &'a dyn Directory,
    readers: &'a [SegmentReader],
    name: &'a str,
    config: &'a IndexConfig,
    field_infos: FieldInfos,
    doc_maps: Vec<Vec<Option<u32>>>,
    doc_count: u32,
}

impl<'a> SegmentMerger<'a> {
    pub fn new(
        dir: &'a dyn Directory,
        readers: &'a [SegmentReader],
        name: &'a str,
        config: &'a IndexConfig,
    ) -> Self {
        let mut field_infos = FieldInfos::new();
        for reader in readers {
            for info in reader.field_infos().iter() {
                field_infos.add_info(info.clone());
            }
        }
        let mut doc_maps = Vec::with_capacity(readers.len());
        let mut next = 0u32;
        for reader in readers {
            let mut map = Vec::with_capacity(reader.max_doc() as usize);
            for doc in 0..reader.max_doc() {
                if reader.is_deleted(doc) {
                    map.push(None);
                } else {
                    map.push(Some(next));
                    next += 1;
                }
            }
            doc_maps.push(map);
        }
        SegmentMerger {
            dir,
            readers,
            name,
            config,
            field_infos,
            doc_maps,
            doc_count: next,
        }
    }

    pub fn merge(mut self) -> Result<SegmentInfo> {
        debug!(
            "merging {} segments into {} ({} live docs)",
            self.readers.len(),
            self.name,
            self.doc_count
        );
        {
            let mut out = self.dir.create_output(&format!("{}.fnm", self.name))?;
            self.field_infos.write(out.as_mut())?;
        }
        self.merge_stored()?;
        self.merge_vectors()?;
        self.merge_postings()?;
        self.merge_norms()?;

        let mut info = SegmentInfo::new(self.name, self.doc_count);
        info.diagnostics
            .insert("source".to_string(), "merge".to_string());
        info.diagnostics
            .insert("uuid".to_string(), uuid::Uuid::new_v4().to_string());
        info.diagnostics.insert(
            "merged_segments".to_string(),
            self.readers.len().to_string(),
        );
        Ok(info)
    }

    fn merge_stored(&mut self) -> Result<()> {
        let mut writer = StoredFieldsWriter::open(self.dir, self.name)?;
        for reader in self.readers {
            for doc in 0..reader.max_doc() {
                if reader.is_deleted(doc) {
                    continue;
                }
                let document = reader.document(doc)?;
                let fields: Vec<(u32, Field)> = document
                    .fields
                    .into_iter()
                    .map(|f| {
                        let number = self.field_infos.number(&f.name).unwrap();
                        (number, f)
                    })
                    .collect();
                let refs: Vec<(u32, &Field)> = fields.iter().map(|(n, f)| (*n, f)).collect();
                writer.add_doc(&refs)?;
            }
        }
        writer.fill(self.doc_count)?;
        writer.close()
    }

    fn merge_vectors(&mut self) -> Result<()> {
        if !self.field_infos.iter().any(|f| f.store_term_vectors) {
            return Ok(());
        }
        let mut writer = TermVectorsWriter::open(self.dir, self.name)?;
        for reader in self.readers {
            for doc in 0..reader.max_doc() {
                if reader.is_deleted(doc) {
                    continue;
                }
                let mut fields = Vec::new();
                for (field_name, vector) in reader.term_vectors(doc)? {
                    let info = self.field_infos.by_name(&field_name).unwrap();
                    fields.push(FieldVector {
                        field_number: info.number,
                        store_positions: info.store_positions,
                        store_offsets: info.store_offsets,
                        entries: vector.entries,
                    });
                }
                fields.sort_by_key(|v| v.field_number);
                writer.add_doc(&fields)?;
            }
        }
        writer.fill(self.doc_count)?;
        writer.close()
    }

    fn merge_postings(&mut self) -> Result<()> {
        let freq_out = self.dir.create_output(&format!("{}.frq", self.name))?;
        let prox_out = self.dir.create_output(&format!("{}.prx", self.name))?;
        let mut postings_writer = PostingsWriter::new(
            freq_out,
            prox_out,
            self.config.skip_interval,
            self.config.max_skip_levels,
        );
        let mut dict_writer = TermDictWriter::open(
            self.dir,
            self.name,
            self.config.index_interval,
            self.config.skip_interval,
            self.config.max_skip_levels,
        )?;

        // Ordered multiway walk over the per-segment dictionaries
        let mut cursors: Vec<TermEnum> = Vec::with_capacity(self.readers.len());
        let mut alive: Vec<bool> = Vec::with_capacity(self.readers.len());
        for reader in self.readers {
            let mut cursor = reader.terms()?;
            alive.push(cursor.next()?);
            cursors.push(cursor);
        }

        loop {
            let mut min: Option<Term> = None;
            for (i, cursor) in cursors.iter().enumerate() {
                if !alive[i] {
                    continue;
                }
                let term = cursor.term().unwrap();
                if min.as_ref().map(|m| term < m).unwrap_or(true) {
                    min = Some(term.clone());
                }
            }
            let Some(term) = min else {
                break;
            };

            let merged_info = self.field_infos.by_name(&term.field).unwrap();
            let omit_tf = merged_info.omit_term_freq_and_positions;
            let store_payloads = merged_info.store_payloads && !omit_tf;
            postings_writer.start_term(omit_tf, store_payloads);

            let mut df = 0u32;
            for i in 0..cursors.len() {
                if !alive[i] || cursors[i].term() != Some(&term) {
                    continue;
                }
                let reader = &self.readers[i];
                let reader_info = reader.field_infos().by_name(&term.field).unwrap();
                let mut postings = reader.postings_for(
                    cursors[i].term_info(),
                    reader_info.omit_term_freq_and_positions,
                    reader_info.store_payloads,
                    !omit_tf,
                )?;
                while postings.next()? {
                    let mapped = self.doc_maps[i][postings.doc() as usize]
                        .expect("live posting mapped to a deleted doc");
                    let freq = postings.freq();
                    let mut positions = Vec::new();
                    if !omit_tf {
                        for _ in 0..freq {
                            let position = postings.next_position()?;
                            let payload = if store_payloads {
                                postings.payload()?
                            } else {
                                None
                            };
                            positions.push(PositionEntry { position, payload });
                        }
                    }
                    postings_writer.add_doc(mapped, freq, &positions)?;
                    df += 1;
                }
                alive[i] = cursors[i].next()?;
            }

            let term_info = postings_writer.finish_term()?;
            if df > 0 {
                dict_writer.add(&term, merged_info.number, &term_info)?;
            }
        }
        postings_writer.finish()?;
        dict_writer.close()
    }

    fn merge_norms(&mut self) -> Result<()> {
        let mut norms = std::collections::HashMap::new();
        for info in self.field_infos.iter() {
            if !info.has_norms() {
                continue;
            }
            let mut bytes = Vec::with_capacity(self.doc_count as usize);
            for (i, reader) in self.readers.iter().enumerate() {
                let segment_norms = reader.norms(&info.name);
                for doc in 0..reader.max_doc() {
                    if self.doc_maps[i][doc as usize].is_none() {
                        continue;
                    }
                    bytes.push(
                        segment_norms
                            .as_ref()
                            .map(|n| n[doc as usize])
                            .unwrap_or(0),
                    );
                }
            }
            norms.insert(info.number, bytes);
        }
        write_norms(self.dir, self.name, &self.field_infos, &norms, self.doc_count)
    }
}
