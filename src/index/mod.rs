pub mod deleter;
pub mod documents_writer;
pub mod field;
pub mod field_infos;
pub mod index_writer;
pub mod merger;
pub mod multi_reader;
pub mod norms;
pub mod postings;
pub mod postings_writer;
pub mod segment_infos;
pub mod segment_reader;
pub mod skip;
pub mod stored;
pub mod term;
pub mod term_dict;
pub mod term_info;
pub mod terms_hash;
pub mod vectors;

pub use deleter::{DeletionPolicy, KeepOnlyLastCommit, SnapshotDeletionPolicy};
pub use field::{Document, Field, FieldFlags, FieldValue};
pub use field_infos::{FieldInfo, FieldInfos};
pub use index_writer::IndexWriter;
pub use multi_reader::{IndexReader, MultiReader, TermIterator};
pub use postings::{TermDocs, TermPositions};
pub use segment_infos::{SegmentInfo, SegmentInfos};
pub use segment_reader::SegmentReader;
pub use term::Term;
pub use term_info::TermInfo;

use crate::core::config::IndexConfig;
use crate::core::error::Result;
use crate::store::directory::Directory;

/// Opens a reader on the latest committed generation
///
/// The reader pins that generation: files it references survive later
/// deletion-policy decisions until it is dropped.
pub fn open_reader(dir: &dyn Directory, config: &IndexConfig) -> Result<Box<dyn IndexReader>> {
    let infos = SegmentInfos::read_current(dir)?;
    let mut readers = Vec::with_capacity(infos.len());
    for info in &infos.segments {
        readers.push(SegmentReader::open(dir, info, config)?);
    }
    if readers.len() == 1 {
        Ok(Box::new(readers.pop().unwrap()))
    } else {
        Ok(Box::new(MultiReader::new(readers)))
    }
}
