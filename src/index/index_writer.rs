use std::sync::Arc;

use log::{debug, info};

use crate::analysis::analyzer::Analyzer;
use crate::core::config::IndexConfig;
use crate::core::error::{Error, ErrorKind, Result};
use crate::index::deleter::{DeletionPolicy, IndexFileDeleter, KeepOnlyLastCommit};
use crate::index::documents_writer::DocumentsWriter;
use crate::index::field::Document;
use crate::index::merger::SegmentMerger;
use crate::index::postings::TermDocs;
use crate::index::segment_infos::{SegmentInfo, SegmentInfos};
use crate::index::segment_reader::SegmentReader;
use crate::index::term::Term;
use crate::index::terms_hash::ByteBlockAllocator;
use crate::search::similarity::{DefaultSimilarity, Similarity};
use crate::store::directory::{Directory, Lock, WRITE_LOCK_NAME};
use crate::util::bits::DeletedDocs;

/// Single writer over a directory
///
/// Exactly one writer may be open per directory, enforced by `write.lock`.
/// Documents buffer in memory and flush as immutable segments; deletes
/// buffer as terms and settle against all segments at flush time.
pub struct IndexWriter {
    dir: Arc<dyn Directory>,
    analyzer: Arc<dyn Analyzer>,
    config: IndexConfig,
    lock: Box<dyn Lock>,
    segment_infos: SegmentInfos,
    deleter: IndexFileDeleter,
    docs_writer: DocumentsWriter,
    buffered_deletes: Vec<Term>,
    /// Set once an I/O error poisons buffered state; all further
    /// operations fail fast
    broken: bool,
    closed: bool,
}

impl IndexWriter {
    pub fn open(
        dir: Arc<dyn Directory>,
        analyzer: Arc<dyn Analyzer>,
        config: IndexConfig,
    ) -> Result<Self> {
        Self::open_with(
            dir,
            analyzer,
            Arc::new(DefaultSimilarity),
            Box::new(KeepOnlyLastCommit),
            config,
        )
    }

    pub fn open_with(
        dir: Arc<dyn Directory>,
        analyzer: Arc<dyn Analyzer>,
        similarity: Arc<dyn Similarity>,
        policy: Box<dyn DeletionPolicy>,
        config: IndexConfig,
    ) -> Result<Self> {
        let mut lock = dir.make_lock(WRITE_LOCK_NAME);
        lock.obtain_within(config.write_lock_timeout_ms)?;

        let segment_infos = match SegmentInfos::read_current(dir.as_ref()) {
            Ok(infos) => infos,
            Err(e) if e.kind == ErrorKind::FileNotFound => {
                // Fresh directory: publish an empty first commit so
                // readers can open immediately
                let mut infos = SegmentInfos::new();
                infos.commit(dir.as_ref())?;
                infos
            }
            Err(e) => return Err(e),
        };
        // Older readers must never observe the version going backwards
        debug_assert!(segment_infos.version >= 0);

        let deleter = IndexFileDeleter::new(dir.clone(), policy)?;
        let docs_writer = DocumentsWriter::new(ByteBlockAllocator::new(), similarity);

        info!(
            "writer opened on generation {} with {} segments",
            segment_infos.generation,
            segment_infos.len()
        );
        Ok(IndexWriter {
            dir,
            analyzer,
            config,
            lock,
            segment_infos,
            deleter,
            docs_writer,
            buffered_deletes: Vec::new(),
            broken: false,
            closed: false,
        })
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::new(
                ErrorKind::InvalidState,
                "writer is closed".to_string(),
            ));
        }
        if self.broken {
            return Err(Error::new(
                ErrorKind::InvalidState,
                "writer hit an unrecoverable error; only abort/close are valid".to_string(),
            ));
        }
        Ok(())
    }

    pub fn add_document(&mut self, doc: &Document) -> Result<()> {
        self.ensure_open()?;
        let analyzer = self.analyzer.clone();
        if let Err(e) = self.docs_writer.add_document(doc, analyzer.as_ref()) {
            // Inversion failures poison only the buffered doc state when
            // they are argument errors; I/O failures poison the writer
            if e.kind == ErrorKind::Io {
                self.broken = true;
            }
            return Err(e);
        }
        self.maybe_flush()
    }

    /// Buffers a delete-by-term, applied to every segment at flush
    pub fn delete_documents(&mut self, term: Term) -> Result<()> {
        self.ensure_open()?;
        self.buffered_deletes.push(term);
        Ok(())
    }

    fn maybe_flush(&mut self) -> Result<()> {
        let docs_hit = self.config.max_buffered_docs > 0
            && self.docs_writer.doc_count() as usize >= self.config.max_buffered_docs;
        let ram_hit = self.docs_writer.ram_used() >= self.config.ram_buffer_bytes;
        if docs_hit || ram_hit {
            debug!(
                "auto-flush ({} docs, {} bytes)",
                self.docs_writer.doc_count(),
                self.docs_writer.ram_used()
            );
            self.flush()?;
        }
        Ok(())
    }

    /// Flushes buffered docs and deletes, publishes a new generation
    pub fn flush(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.docs_writer.doc_count() > 0 {
            let name = self.segment_infos.new_segment_name();
            match self.docs_writer.flush(self.dir.as_ref(), &name, &self.config) {
                Ok(info) => self.segment_infos.push(info),
                Err(e) => {
                    self.broken = true;
                    return Err(e);
                }
            }
        }
        if let Err(e) = self.apply_deletes() {
            self.broken = true;
            return Err(e);
        }
        self.maybe_merge()?;
        self.publish()
    }

    /// Durable flush: segment files are synced before the new generation
    /// is published
    pub fn commit(&mut self) -> Result<()> {
        self.flush()?;
        for file in self.segment_infos.files(self.dir.as_ref())? {
            self.dir.sync(&file)?;
        }
        Ok(())
    }

    fn publish(&mut self) -> Result<()> {
        self.segment_infos.commit(self.dir.as_ref())?;
        self.deleter.checkpoint(&self.segment_infos)
    }

    fn apply_deletes(&mut self) -> Result<()> {
        if self.buffered_deletes.is_empty() {
            return Ok(());
        }
        let terms = std::mem::take(&mut self.buffered_deletes);
        for info in &mut self.segment_infos.segments {
            let reader = SegmentReader::open(self.dir.as_ref(), info, &self.config)?;
            let mut deletions: DeletedDocs = reader
                .deleted_docs()
                .map(|d| (**d).clone())
                .unwrap_or_default();
            let before = deletions.count();
            for term in &terms {
                if let Some(mut postings) = reader.term_docs(term)? {
                    while postings.next()? {
                        deletions.delete(postings.doc());
                    }
                }
            }
            if deletions.count() != before {
                info.advance_del_gen();
                let del_file = info.del_file_name().unwrap();
                let mut out = self.dir.create_output(&del_file)?;
                deletions.write(out.as_mut())?;
                debug!(
                    "segment {}: {} deleted docs -> {}",
                    info.name,
                    deletions.count(),
                    del_file
                );
            }
        }
        Ok(())
    }

    /// Merges adjacent same-level runs until the merge factor holds
    fn maybe_merge(&mut self) -> Result<()> {
        let factor = self.config.merge_factor.max(2);
        loop {
            let n = self.segment_infos.len();
            if n < factor {
                return Ok(());
            }
            let levels: Vec<u32> = self
                .segment_infos
                .segments
                .iter()
                .map(|s| Self::level(s.doc_count, factor))
                .collect();
            let mut window = None;
            for start in 0..=(n - factor) {
                if levels[start..start + factor].iter().all(|&l| l == levels[start]) {
                    window = Some(start);
                    break;
                }
            }
            let Some(start) = window else {
                return Ok(());
            };
            self.merge_range(start, start + factor)?;
        }
    }

    fn level(doc_count: u32, factor: usize) -> u32 {
        let mut level = 0u32;
        let mut threshold = factor as u64;
        while (doc_count as u64) >= threshold {
            level += 1;
            threshold = threshold.saturating_mul(factor as u64);
        }
        level
    }

    fn merge_range(&mut self, start: usize, end: usize) -> Result<()> {
        let name = self.segment_infos.new_segment_name();
        let mut readers = Vec::with_capacity(end - start);
        for info in &self.segment_infos.segments[start..end] {
            readers.push(SegmentReader::open(self.dir.as_ref(), info, &self.config)?);
        }
        let merged =
            SegmentMerger::new(self.dir.as_ref(), &readers, &name, &self.config).merge()?;
        drop(readers);
        self.segment_infos
            .segments
            .splice(start..end, std::iter::once(merged));
        Ok(())
    }

    /// Merges everything into a single segment
    pub fn optimize(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.docs_writer.doc_count() > 0 || !self.buffered_deletes.is_empty() {
            self.flush()?;
        }
        if self.segment_infos.len() > 1
            || self.segment_infos.segments.iter().any(SegmentInfo::has_deletions)
        {
            self.merge_range(0, self.segment_infos.len())?;
            self.publish()?;
        }
        Ok(())
    }

    /// Docs visible to a reader opened now, plus the buffered tail
    pub fn num_docs(&self) -> Result<u32> {
        let mut total = self.docs_writer.doc_count();
        for info in &self.segment_infos.segments {
            total += info.doc_count;
            if info.has_deletions() {
                let reader = SegmentReader::open(self.dir.as_ref(), info, &self.config)?;
                total -= info.doc_count - reader.num_docs();
            }
        }
        Ok(total)
    }

    pub fn max_doc(&self) -> u32 {
        self.segment_infos.total_doc_count() + self.docs_writer.doc_count()
    }

    pub fn segment_count(&self) -> usize {
        self.segment_infos.len()
    }

    /// Discards all buffered docs and deletes
    pub fn abort(&mut self) {
        self.docs_writer.abort();
        self.buffered_deletes.clear();
        self.broken = false;
    }

    pub fn close(mut self) -> Result<()> {
        if !self.broken {
            self.commit()?;
        }
        self.closed = true;
        self.lock.release();
        Ok(())
    }
}

impl Drop for IndexWriter {
    fn drop(&mut self) {
        self.lock.release();
    }
}
