use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use crate::analysis::analyzer::Analyzer;
use crate::core::config::IndexConfig;
use crate::core::error::{Error, ErrorKind, Result};
use crate::index::field::{Document, Field};
use crate::index::field_infos::FieldInfos;
use crate::index::norms::write_norms;
use crate::index::postings_writer::{PositionEntry, PostingsWriter};
use crate::index::segment_infos::SegmentInfo;
use crate::index::stored::StoredFieldsWriter;
use crate::index::term::Term;
use crate::index::term_dict::TermDictWriter;
use crate::index::terms_hash::{ByteBlockAllocator, ByteBlockPool, FieldPostings, SliceReader};
use crate::index::vectors::{FieldVector, TermVectorEntry, TermVectorsWriter};
use crate::search::similarity::Similarity;
use crate::store::directory::Directory;

/// Per-field inversion state for one indexing session
struct InvertState {
    field_number: u32,
    postings: FieldPostings,
    /// Sparse (doc, norm byte) pairs, densified at flush
    norms: Vec<(u32, u8)>,
}

/// Transient per-doc, per-field counters
#[derive(Default)]
struct DocFieldState {
    position: u32,
    length: u32,
    offset_base: u32,
    boost: f32,
    /// term → (positions, offsets), only when the field stores vectors
    vector: Option<HashMap<String, (Vec<u32>, Vec<(u32, u32)>)>>,
}

/// Inverts buffered documents into in-memory postings and flushes them as
/// one segment
///
/// This is the explicit session replacing per-thread consumer state: one
/// writer owns one session at a time, and all shared memory (the byte
/// block pool) is returned to the allocator on flush or abort.
pub struct DocumentsWriter {
    pub field_infos: FieldInfos,
    pool: ByteBlockPool,
    fields: HashMap<u32, InvertState>,
    /// One entry per doc: the stored fields to persist
    stored: Vec<Vec<(u32, Field)>>,
    /// One entry per doc: term vectors of vectored fields
    vectors: Vec<Vec<FieldVector>>,
    doc_count: u32,
    stored_bytes: usize,
    similarity: Arc<dyn Similarity>,
}

impl DocumentsWriter {
    pub fn new(allocator: Arc<ByteBlockAllocator>, similarity: Arc<dyn Similarity>) -> Self {
        DocumentsWriter {
            field_infos: FieldInfos::new(),
            pool: ByteBlockPool::new(allocator),
            fields: HashMap::new(),
            stored: Vec::new(),
            vectors: Vec::new(),
            doc_count: 0,
            stored_bytes: 0,
            similarity,
        }
    }

    pub fn doc_count(&self) -> u32 {
        self.doc_count
    }

    /// Rough accounting of buffered bytes, driving auto-flush
    pub fn ram_used(&self) -> usize {
        let postings_overhead: usize = self.fields.values().map(|f| f.postings.overhead_bytes()).sum();
        self.pool.bytes_allocated() + postings_overhead + self.stored_bytes
    }

    pub fn add_document(&mut self, doc: &Document, analyzer: &dyn Analyzer) -> Result<()> {
        let doc_id = self.doc_count;
        let mut doc_states: HashMap<u32, DocFieldState> = HashMap::new();
        let mut stored_fields: Vec<(u32, Field)> = Vec::new();

        for field in &doc.fields {
            let has_payload_hint = false;
            let number = self
                .field_infos
                .add(&field.name, &field.flags, has_payload_hint);

            if field.flags.stored {
                self.stored_bytes += field.value.as_bytes().len() + field.name.len() + 16;
                stored_fields.push((number, field.clone()));
            }
            if !field.flags.indexed {
                continue;
            }
            let text = match field.value.as_text() {
                Some(text) => text,
                None => {
                    return Err(Error::new(
                        ErrorKind::InvalidArgument,
                        format!("field {} is indexed but not text", field.name),
                    ));
                }
            };

            let state = doc_states.entry(number).or_insert_with(|| DocFieldState {
                boost: doc.boost,
                vector: field.flags.store_term_vectors.then(HashMap::new),
                ..DocFieldState::default()
            });
            state.boost *= field.boost;

            if field.flags.tokenized {
                let mut stream = analyzer.token_stream(&field.name, text);
                while stream.increment_token()? {
                    let token = stream.token();
                    let term_text = token.term.clone();
                    let increment = token.position_increment;
                    let payload = token.payload.clone();
                    let offsets = (
                        state.offset_base + token.start_offset,
                        state.offset_base + token.end_offset,
                    );
                    state.position += increment;
                    state.length += 1;
                    let position = state.position;
                    self.invert_token(
                        number, doc_id, &term_text, position, payload, offsets, state,
                    )?;
                }
                stream.end()?;
                state.offset_base += stream.final_offset();
            } else {
                state.position += 1;
                state.length += 1;
                let position = state.position;
                let offsets = (state.offset_base, state.offset_base + text.chars().count() as u32);
                let term_text = text.to_string();
                self.invert_token(number, doc_id, &term_text, position, None, offsets, state)?;
                state.offset_base += text.chars().count() as u32;
            }
        }

        // Norms and term vectors settle once the whole doc is inverted
        let mut doc_vectors = Vec::new();
        for (number, state) in doc_states.iter_mut() {
            let info = self.field_infos.field_info(*number).unwrap();
            if info.has_norms() {
                let norm = self.similarity.encode_norm_value(
                    self.similarity.length_norm(&info.name, state.length) * state.boost,
                );
                if let Some(invert) = self.fields.get_mut(number) {
                    invert.norms.push((doc_id, norm));
                }
            }
            if let Some(vector) = state.vector.take() {
                let mut entries: Vec<TermVectorEntry> = vector
                    .into_iter()
                    .map(|(term, (positions, offsets))| TermVectorEntry {
                        term,
                        freq: positions.len().max(offsets.len()) as u32,
                        positions: if info.store_positions { positions } else { Vec::new() },
                        offsets: if info.store_offsets { offsets } else { Vec::new() },
                    })
                    .collect();
                entries.sort_by(|a, b| a.term.cmp(&b.term));
                doc_vectors.push(FieldVector {
                    field_number: *number,
                    store_positions: info.store_positions,
                    store_offsets: info.store_offsets,
                    entries,
                });
            }
        }
        doc_vectors.sort_by_key(|v| v.field_number);

        self.stored.push(stored_fields);
        self.vectors.push(doc_vectors);
        self.doc_count += 1;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn invert_token(
        &mut self,
        number: u32,
        doc_id: u32,
        text: &str,
        position: u32,
        payload: Option<Vec<u8>>,
        offsets: (u32, u32),
        state: &mut DocFieldState,
    ) -> Result<()> {
        let info = self.field_infos.field_info(number).unwrap();
        let omit_tf = info.omit_term_freq_and_positions;
        if payload.as_deref().map(|p| !p.is_empty()).unwrap_or(false) {
            self.field_infos.mark_payloads(number);
        }

        let invert = self.fields.entry(number).or_insert_with(|| InvertState {
            field_number: number,
            postings: FieldPostings::new(),
            norms: Vec::new(),
        });

        let (id, fresh) = invert.postings.get_or_insert(text, &mut self.pool);
        let term = &mut invert.postings.terms[id];

        if fresh {
            term.last_doc = doc_id;
            term.doc_code = if omit_tf { doc_id } else { doc_id << 1 };
            term.freq_in_doc = 1;
            term.last_position = 0;
        } else if term.last_doc != doc_id {
            // Close out the previous doc's entry in the freq stream
            if omit_tf {
                let code = term.doc_code;
                self.pool.write_vint(&mut term.freq_addr, code);
            } else if term.freq_in_doc == 1 {
                let code = term.doc_code | 1;
                self.pool.write_vint(&mut term.freq_addr, code);
            } else {
                let code = term.doc_code;
                let freq = term.freq_in_doc;
                self.pool.write_vint(&mut term.freq_addr, code);
                self.pool.write_vint(&mut term.freq_addr, freq);
            }
            let delta = doc_id - term.last_doc;
            term.doc_code = if omit_tf { delta } else { delta << 1 };
            term.last_doc = doc_id;
            term.freq_in_doc = 1;
            term.last_position = 0;
        } else {
            term.freq_in_doc += 1;
        }

        if !omit_tf {
            // In-memory prox entries always carry the payload flag bit;
            // the flush re-encodes per the field's final payload setting
            let delta = position - term.last_position;
            term.last_position = position;
            match payload.as_deref() {
                Some(p) if !p.is_empty() => {
                    let code = delta << 1 | 1;
                    let len = p.len() as u32;
                    self.pool.write_vint(&mut term.prox_addr, code);
                    self.pool.write_vint(&mut term.prox_addr, len);
                    let mut addr = term.prox_addr;
                    for &b in p {
                        self.pool.write_byte(&mut addr, b);
                    }
                    term.prox_addr = addr;
                }
                _ => {
                    let code = delta << 1;
                    self.pool.write_vint(&mut term.prox_addr, code);
                }
            }
        }

        if let Some(vector) = state.vector.as_mut() {
            let entry = vector.entry(text.to_string()).or_default();
            entry.0.push(position);
            entry.1.push(offsets);
        }
        Ok(())
    }

    /// Writes every buffered structure as segment `name` and resets the
    /// session
    pub fn flush(
        &mut self,
        dir: &dyn Directory,
        name: &str,
        config: &IndexConfig,
    ) -> Result<SegmentInfo> {
        debug!(
            "flushing segment {} ({} docs, {} bytes buffered)",
            name,
            self.doc_count,
            self.ram_used()
        );
        let result = self.write_segment(dir, name, config);
        self.reset();
        result
    }

    fn write_segment(
        &mut self,
        dir: &dyn Directory,
        name: &str,
        config: &IndexConfig,
    ) -> Result<SegmentInfo> {
        let doc_count = self.doc_count;

        {
            let mut out = dir.create_output(&format!("{}.fnm", name))?;
            self.field_infos.write(out.as_mut())?;
        }

        {
            let mut stored_writer = StoredFieldsWriter::open(dir, name)?;
            for doc_fields in &self.stored {
                let refs: Vec<(u32, &Field)> =
                    doc_fields.iter().map(|(n, f)| (*n, f)).collect();
                stored_writer.add_doc(&refs)?;
            }
            stored_writer.fill(doc_count)?;
            stored_writer.close()?;
        }

        if self.field_infos.iter().any(|f| f.store_term_vectors) {
            let mut vectors_writer = TermVectorsWriter::open(dir, name)?;
            for doc_vectors in &self.vectors {
                vectors_writer.add_doc(doc_vectors)?;
            }
            vectors_writer.fill(doc_count)?;
            vectors_writer.close()?;
        }

        self.write_postings(dir, name, config)?;

        let norms = self.dense_norms(doc_count);
        write_norms(dir, name, &self.field_infos, &norms, doc_count)?;

        let mut info = SegmentInfo::new(name, doc_count);
        info.diagnostics
            .insert("source".to_string(), "flush".to_string());
        info.diagnostics
            .insert("uuid".to_string(), uuid::Uuid::new_v4().to_string());
        info.diagnostics
            .insert("timestamp".to_string(), chrono::Utc::now().to_rfc3339());
        info.diagnostics
            .insert("os".to_string(), std::env::consts::OS.to_string());
        Ok(info)
    }

    fn dense_norms(&self, doc_count: u32) -> HashMap<u32, Vec<u8>> {
        let mut norms = HashMap::new();
        for invert in self.fields.values() {
            let info = self.field_infos.field_info(invert.field_number).unwrap();
            if !info.has_norms() {
                continue;
            }
            let mut bytes = vec![0u8; doc_count as usize];
            for &(doc, norm) in &invert.norms {
                bytes[doc as usize] = norm;
            }
            norms.insert(invert.field_number, bytes);
        }
        norms
    }

    fn write_postings(&mut self, dir: &dyn Directory, name: &str, config: &IndexConfig) -> Result<()> {
        let freq_out = dir.create_output(&format!("{}.frq", name))?;
        let prox_out = dir.create_output(&format!("{}.prx", name))?;
        let mut postings_writer = PostingsWriter::new(
            freq_out,
            prox_out,
            config.skip_interval,
            config.max_skip_levels,
        );
        let mut dict_writer = TermDictWriter::open(
            dir,
            name,
            config.index_interval,
            config.skip_interval,
            config.max_skip_levels,
        )?;

        // Terms stream out in (field name, text) order
        let mut field_numbers: Vec<u32> = self.fields.keys().copied().collect();
        field_numbers
            .sort_by(|a, b| {
                let fa = &self.field_infos.field_info(*a).unwrap().name;
                let fb = &self.field_infos.field_info(*b).unwrap().name;
                fa.cmp(fb)
            });

        for number in field_numbers {
            let info = self.field_infos.field_info(number).unwrap().clone();
            let omit_tf = info.omit_term_freq_and_positions;
            let store_payloads = info.store_payloads && !omit_tf;
            let invert = self.fields.get_mut(&number).unwrap();

            // Close pending per-doc entries before decoding
            for term in invert.postings.terms.iter_mut() {
                if term.freq_in_doc > 0 {
                    if omit_tf {
                        let code = term.doc_code;
                        self.pool.write_vint(&mut term.freq_addr, code);
                    } else if term.freq_in_doc == 1 {
                        let code = term.doc_code | 1;
                        self.pool.write_vint(&mut term.freq_addr, code);
                    } else {
                        let code = term.doc_code;
                        let freq = term.freq_in_doc;
                        self.pool.write_vint(&mut term.freq_addr, code);
                        self.pool.write_vint(&mut term.freq_addr, freq);
                    }
                    term.freq_in_doc = 0;
                }
            }

            for id in invert.postings.sorted_term_ids() {
                let term = &invert.postings.terms[id];
                postings_writer.start_term(omit_tf, store_payloads);

                let mut freq_reader =
                    SliceReader::new(&self.pool, term.freq_start, term.freq_addr);
                let mut prox_reader =
                    SliceReader::new(&self.pool, term.prox_start, term.prox_addr);

                let mut doc = 0u32;
                while !freq_reader.at_end() {
                    let (delta, freq) = if omit_tf {
                        (freq_reader.read_vint(), 1)
                    } else {
                        let code = freq_reader.read_vint();
                        if code & 1 != 0 {
                            (code >> 1, 1)
                        } else {
                            (code >> 1, freq_reader.read_vint())
                        }
                    };
                    doc += delta;

                    let mut positions = Vec::with_capacity(freq as usize);
                    if !omit_tf {
                        let mut position = 0u32;
                        for _ in 0..freq {
                            let code = prox_reader.read_vint();
                            position += code >> 1;
                            let payload = if code & 1 != 0 {
                                let len = prox_reader.read_vint() as usize;
                                Some(prox_reader.read_bytes(len))
                            } else {
                                None
                            };
                            positions.push(PositionEntry { position, payload });
                        }
                    }
                    postings_writer.add_doc(doc, freq, &positions)?;
                }
                let term_info = postings_writer.finish_term()?;
                dict_writer.add(
                    &Term::new(info.name.clone(), term.text.clone()),
                    number,
                    &term_info,
                )?;
            }
        }
        postings_writer.finish()?;
        dict_writer.close()
    }

    /// Discards all buffered state without touching the directory
    pub fn abort(&mut self) {
        debug!("aborting indexing session ({} buffered docs)", self.doc_count);
        self.reset();
    }

    fn reset(&mut self) {
        self.pool.release();
        self.fields.clear();
        self.stored.clear();
        self.vectors.clear();
        self.doc_count = 0;
        self.stored_bytes = 0;
        self.field_infos = FieldInfos::new();
    }
}
