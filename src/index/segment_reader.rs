use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::config::IndexConfig;
use crate::core::error::Result;
use crate::index::field::{Document, Field};
use crate::index::field_infos::FieldInfos;
use crate::index::norms::read_norms;
use crate::index::postings::SegmentPostings;
use crate::index::segment_infos::SegmentInfo;
use crate::index::stored::StoredFieldsReader;
use crate::index::term::Term;
use crate::index::term_dict::{TermDictReader, TermEnum};
use crate::index::term_info::TermInfo;
use crate::index::vectors::{TermVector, TermVectorsReader};
use crate::store::directory::Directory;
use crate::store::input::IndexInput;
use crate::util::bits::DeletedDocs;

/// Read view over the files of one immutable segment
pub struct SegmentReader {
    pub info: SegmentInfo,
    field_infos: Arc<FieldInfos>,
    term_dict: TermDictReader,
    freq_input: Box<dyn IndexInput>,
    prox_input: Box<dyn IndexInput>,
    norms: HashMap<u32, Arc<Vec<u8>>>,
    stored: Mutex<StoredFieldsReader>,
    vectors: Option<Mutex<TermVectorsReader>>,
    deleted: Option<Arc<DeletedDocs>>,
}

impl SegmentReader {
    pub fn open(dir: &dyn Directory, info: &SegmentInfo, config: &IndexConfig) -> Result<Self> {
        let field_infos = {
            let mut input = dir.open_input(&info.file_name("fnm"))?;
            Arc::new(FieldInfos::read(input.as_mut())?)
        };
        let term_dict = TermDictReader::open(
            dir,
            &info.name,
            field_infos.clone(),
            config.term_index_divisor,
            config.term_cache_size,
        )?;
        let freq_input = dir.open_input(&info.file_name("frq"))?;
        let prox_input = dir.open_input(&info.file_name("prx"))?;
        let norms = read_norms(dir, &info.name, &field_infos, info.doc_count)?;
        let stored = Mutex::new(StoredFieldsReader::open(
            dir,
            &info.name,
            field_infos.clone(),
            info.doc_count,
        )?);
        let vectors = TermVectorsReader::open(dir, &info.name, field_infos.clone(), info.doc_count)?
            .map(Mutex::new);

        let deleted = match info.del_file_name() {
            Some(del_file) => {
                let mut input = dir.open_input(&del_file)?;
                Some(Arc::new(DeletedDocs::read(input.as_mut())?))
            }
            None => None,
        };

        Ok(SegmentReader {
            info: info.clone(),
            field_infos,
            term_dict,
            freq_input,
            prox_input,
            norms,
            stored,
            vectors,
            deleted,
        })
    }

    pub fn max_doc(&self) -> u32 {
        self.info.doc_count
    }

    pub fn num_docs(&self) -> u32 {
        self.info.doc_count - self.deleted.as_ref().map(|d| d.count()).unwrap_or(0)
    }

    pub fn has_deletions(&self) -> bool {
        self.deleted.is_some()
    }

    pub fn is_deleted(&self, doc: u32) -> bool {
        self.deleted
            .as_ref()
            .map(|d| d.is_deleted(doc))
            .unwrap_or(false)
    }

    pub fn deleted_docs(&self) -> Option<&Arc<DeletedDocs>> {
        self.deleted.as_ref()
    }

    pub fn field_infos(&self) -> &Arc<FieldInfos> {
        &self.field_infos
    }

    pub fn term_info(&self, term: &Term) -> Result<Option<TermInfo>> {
        self.term_dict.get(term)
    }

    pub fn doc_freq(&self, term: &Term) -> Result<u32> {
        Ok(self.term_dict.get(term)?.map(|ti| ti.doc_freq).unwrap_or(0))
    }

    /// Doc iterator for one term; `None` when the term is absent
    pub fn term_docs(&self, term: &Term) -> Result<Option<SegmentPostings>> {
        self.postings(term, false)
    }

    /// Doc+position iterator for one term
    pub fn term_positions(&self, term: &Term) -> Result<Option<SegmentPostings>> {
        self.postings(term, true)
    }

    fn postings(&self, term: &Term, with_positions: bool) -> Result<Option<SegmentPostings>> {
        let Some(term_info) = self.term_dict.get(term)? else {
            return Ok(None);
        };
        let info = match self.field_infos.by_name(&term.field) {
            Some(info) => info,
            None => return Ok(None),
        };
        self.postings_for(term_info, info.omit_term_freq_and_positions, info.store_payloads, with_positions)
            .map(Some)
    }

    /// Iterator straight from a known dictionary entry, used by term
    /// enumerating callers that already hold the `TermInfo`
    pub fn postings_for(
        &self,
        term_info: TermInfo,
        omit_tf: bool,
        store_payloads: bool,
        with_positions: bool,
    ) -> Result<SegmentPostings> {
        SegmentPostings::new(
            self.freq_input.clone_input(),
            if with_positions && !omit_tf {
                Some(self.prox_input.clone_input())
            } else {
                None
            },
            self.deleted.clone(),
            term_info,
            self.term_dict.skip_interval(),
            self.term_dict.max_skip_levels(),
            omit_tf,
            store_payloads,
        )
    }

    pub fn terms(&self) -> Result<TermEnum> {
        self.term_dict.terms()
    }

    /// Enumerator positioned on the first term `>= target`
    pub fn terms_from(&self, target: &Term) -> Result<TermEnum> {
        self.term_dict.terms_from(target)
    }

    pub fn term_count(&self) -> u64 {
        self.term_dict.term_count()
    }

    pub fn norms(&self, field: &str) -> Option<Arc<Vec<u8>>> {
        self.field_infos
            .number(field)
            .and_then(|n| self.norms.get(&n).cloned())
    }

    /// Stored part of a document
    pub fn document(&self, doc: u32) -> Result<Document> {
        let fields: Vec<Field> = self.stored.lock().doc(doc)?;
        Ok(Document {
            fields,
            boost: 1.0,
        })
    }

    pub fn term_vector(&self, doc: u32, field: &str) -> Result<Option<TermVector>> {
        match &self.vectors {
            Some(vectors) => vectors.lock().vector(doc, field),
            None => Ok(None),
        }
    }

    pub fn term_vectors(&self, doc: u32) -> Result<Vec<(String, TermVector)>> {
        match &self.vectors {
            Some(vectors) => vectors.lock().doc_vectors(doc),
            None => Ok(Vec::new()),
        }
    }
}
