use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;

use crate::core::error::{Error, Result};
use crate::index::field_infos::FieldInfos;
use crate::index::term::Term;
use crate::index::term_info::TermInfo;
use crate::store::directory::Directory;
use crate::store::input::IndexInput;
use crate::store::output::IndexOutput;

const TIS_VERSION: u32 = 1;
// Version tag, then the patched term count, then the three intervals
const HEADER_SIZE: u64 = 4 + 8 + 4 + 4 + 4;

pub const TERM_DICT_EXT: &str = "tis";
pub const TERM_INDEX_EXT: &str = "tii";

fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

struct RecordState {
    text: Vec<u8>,
    info: TermInfo,
}

impl RecordState {
    fn new() -> Self {
        RecordState {
            text: Vec::new(),
            info: TermInfo::default(),
        }
    }
}

/// Writes the paired term dictionary files of one segment
///
/// The `.tis` file holds every term as a shared-prefix delta against its
/// predecessor with delta-encoded file pointers; every `index_interval`-th
/// record is mirrored into `.tii` together with its absolute `.tis`
/// offset.
pub struct TermDictWriter {
    tis: Box<dyn IndexOutput>,
    tii: Box<dyn IndexOutput>,
    index_interval: u32,
    skip_interval: u32,
    size: u64,
    last: RecordState,
    last_term: Option<Term>,
    index_last: RecordState,
    last_index_pointer: u64,
}

impl TermDictWriter {
    pub fn open(
        dir: &dyn Directory,
        segment: &str,
        index_interval: u32,
        skip_interval: u32,
        max_skip_levels: u32,
    ) -> Result<Self> {
        let mut tis = dir.create_output(&format!("{}.{}", segment, TERM_DICT_EXT))?;
        let mut tii = dir.create_output(&format!("{}.{}", segment, TERM_INDEX_EXT))?;
        for out in [tis.as_mut(), tii.as_mut()] {
            out.write_u32(TIS_VERSION)?;
            out.write_u64(0)?; // patched with the term count on close
            out.write_u32(index_interval)?;
            out.write_u32(skip_interval)?;
            out.write_u32(max_skip_levels)?;
        }
        Ok(TermDictWriter {
            tis,
            tii,
            index_interval,
            skip_interval,
            size: 0,
            last: RecordState::new(),
            last_term: None,
            index_last: RecordState::new(),
            last_index_pointer: HEADER_SIZE,
        })
    }

    fn write_record(
        out: &mut dyn IndexOutput,
        prev: &mut RecordState,
        text: &[u8],
        field_number: u32,
        info: &TermInfo,
        skip_interval: u32,
    ) -> Result<()> {
        let prefix = common_prefix_len(&prev.text, text);
        let suffix = &text[prefix..];
        out.write_vint(prefix as u32)?;
        out.write_vint(suffix.len() as u32)?;
        out.write_bytes(suffix)?;
        out.write_vint(field_number)?;
        out.write_vint(info.doc_freq)?;
        out.write_vlong(info.freq_pointer - prev.info.freq_pointer)?;
        out.write_vlong(info.prox_pointer - prev.info.prox_pointer)?;
        if info.doc_freq >= skip_interval {
            out.write_vlong(info.skip_offset)?;
        }
        prev.text.clear();
        prev.text.extend_from_slice(text);
        prev.info = *info;
        Ok(())
    }

    /// Terms must arrive in increasing `(field, text)` order
    pub fn add(&mut self, term: &Term, field_number: u32, info: &TermInfo) -> Result<()> {
        if let Some(last_term) = &self.last_term {
            if term <= last_term {
                return Err(Error::corrupt(format!(
                    "terms out of order: {} after {}",
                    term, last_term
                )));
            }
        }
        Self::write_record(
            self.tis.as_mut(),
            &mut self.last,
            term.text.as_bytes(),
            field_number,
            info,
            self.skip_interval,
        )?;
        if self.size % self.index_interval as u64 == 0 {
            // The index names this term and points just past its record,
            // so a seeded enumerator resolves the next record's prefix
            // against the indexed term
            Self::write_record(
                self.tii.as_mut(),
                &mut self.index_last,
                term.text.as_bytes(),
                field_number,
                info,
                self.skip_interval,
            )?;
            let tis_pointer = self.tis.position();
            self.tii.write_vlong(tis_pointer - self.last_index_pointer)?;
            self.last_index_pointer = tis_pointer;
        }
        self.last_term = Some(term.clone());
        self.size += 1;
        Ok(())
    }

    pub fn close(mut self) -> Result<()> {
        for out in [self.tis.as_mut(), self.tii.as_mut()] {
            out.seek(4)?;
            out.write_u64(self.size)?;
            out.flush()?;
        }
        Ok(())
    }
}

struct DictHeader {
    term_count: u64,
    index_interval: u32,
    skip_interval: u32,
    max_skip_levels: u32,
}

fn read_header(input: &mut dyn IndexInput) -> Result<DictHeader> {
    let version = input.read_u32()?;
    if version != TIS_VERSION {
        return Err(Error::corrupt(format!(
            "unknown term dictionary version {}",
            version
        )));
    }
    Ok(DictHeader {
        term_count: input.read_u64()?,
        index_interval: input.read_u32()?,
        skip_interval: input.read_u32()?,
        max_skip_levels: input.read_u32()?,
    })
}

/// Sequential cursor over the `.tis` file
pub struct TermEnum {
    input: Box<dyn IndexInput>,
    field_infos: Arc<FieldInfos>,
    total: u64,
    /// Ordinal of the current term, `-1` before the first `next`
    ord: i64,
    text: Vec<u8>,
    term: Option<Term>,
    info: TermInfo,
    skip_interval: u32,
    pub max_skip_levels: u32,
}

impl TermEnum {
    /// Advances to the next term; false once the dictionary is exhausted
    pub fn next(&mut self) -> Result<bool> {
        if self.ord + 1 >= self.total as i64 {
            self.term = None;
            return Ok(false);
        }
        self.ord += 1;
        let prefix = self.input.read_vint()? as usize;
        let suffix_len = self.input.read_vint()? as usize;
        self.text.truncate(prefix);
        let mut suffix = vec![0u8; suffix_len];
        self.input.read_bytes(&mut suffix)?;
        self.text.extend_from_slice(&suffix);
        let field_number = self.input.read_vint()?;
        let doc_freq = self.input.read_vint()?;
        if doc_freq == 0 {
            return Err(Error::corrupt("doc freq must be positive"));
        }
        self.info.doc_freq = doc_freq;
        self.info.freq_pointer += self.input.read_vlong()?;
        self.info.prox_pointer += self.input.read_vlong()?;
        self.info.skip_offset = if doc_freq >= self.skip_interval {
            self.input.read_vlong()?
        } else {
            0
        };
        let field = self
            .field_infos
            .field_info(field_number)
            .ok_or_else(|| Error::corrupt(format!("unknown field number {}", field_number)))?
            .name
            .clone();
        let text = std::str::from_utf8(&self.text)?.to_string();
        self.term = Some(Term::new(field, text));
        Ok(true)
    }

    pub fn term(&self) -> Option<&Term> {
        self.term.as_ref()
    }

    pub fn term_info(&self) -> TermInfo {
        self.info
    }

    pub fn doc_freq(&self) -> u32 {
        self.info.doc_freq
    }

    pub fn ord(&self) -> i64 {
        self.ord
    }

    pub fn skip_interval(&self) -> u32 {
        self.skip_interval
    }
}

#[derive(Clone)]
struct IndexEntry {
    term: Term,
    info: TermInfo,
    tis_pointer: u64,
    ord: u64,
}

/// Reads the term dictionary of one segment
///
/// The sparse `.tii` index is held in memory (optionally sampled by
/// `index_divisor`); lookups binary-search it and then scan forward in
/// `.tis`. A bounded LRU memoises recent lookups together with their
/// ordinal so repeated probes of nearby terms stay cheap.
pub struct TermDictReader {
    tis: Box<dyn IndexInput>,
    field_infos: Arc<FieldInfos>,
    index: Vec<IndexEntry>,
    term_count: u64,
    index_interval: u32,
    skip_interval: u32,
    max_skip_levels: u32,
    cache: Mutex<LruCache<Term, (Option<TermInfo>, u64)>>,
}

impl TermDictReader {
    pub fn open(
        dir: &dyn Directory,
        segment: &str,
        field_infos: Arc<FieldInfos>,
        index_divisor: u32,
        cache_size: usize,
    ) -> Result<Self> {
        let mut tis = dir.open_input(&format!("{}.{}", segment, TERM_DICT_EXT))?;
        let header = read_header(tis.as_mut())?;

        let mut tii = dir.open_input(&format!("{}.{}", segment, TERM_INDEX_EXT))?;
        let index_header = read_header(tii.as_mut())?;
        let divisor = index_divisor.max(1);

        let mut index = Vec::new();
        let mut prev_text: Vec<u8> = Vec::new();
        let mut info = TermInfo::default();
        let mut tis_pointer = HEADER_SIZE;
        for i in 0..index_header.term_count {
            let prefix = tii.read_vint()? as usize;
            let suffix_len = tii.read_vint()? as usize;
            prev_text.truncate(prefix);
            let mut suffix = vec![0u8; suffix_len];
            tii.read_bytes(&mut suffix)?;
            prev_text.extend_from_slice(&suffix);
            let field_number = tii.read_vint()?;
            let doc_freq = tii.read_vint()?;
            info.doc_freq = doc_freq;
            info.freq_pointer += tii.read_vlong()?;
            info.prox_pointer += tii.read_vlong()?;
            info.skip_offset = if doc_freq >= index_header.skip_interval {
                tii.read_vlong()?
            } else {
                0
            };
            tis_pointer += tii.read_vlong()?;
            if i % divisor as u64 == 0 {
                let field = field_infos
                    .field_info(field_number)
                    .ok_or_else(|| {
                        Error::corrupt(format!("unknown field number {}", field_number))
                    })?
                    .name
                    .clone();
                index.push(IndexEntry {
                    term: Term::new(field, std::str::from_utf8(&prev_text)?.to_string()),
                    info,
                    tis_pointer,
                    ord: i * header.index_interval as u64,
                });
            }
        }

        let cache_cap = NonZeroUsize::new(cache_size.max(1)).unwrap();
        Ok(TermDictReader {
            tis,
            field_infos,
            index,
            term_count: header.term_count,
            index_interval: header.index_interval,
            skip_interval: header.skip_interval,
            max_skip_levels: header.max_skip_levels,
            cache: Mutex::new(LruCache::new(cache_cap)),
        })
    }

    pub fn term_count(&self) -> u64 {
        self.term_count
    }

    pub fn skip_interval(&self) -> u32 {
        self.skip_interval
    }

    pub fn max_skip_levels(&self) -> u32 {
        self.max_skip_levels
    }

    fn fresh_enum(&self) -> TermEnum {
        TermEnum {
            input: self.tis.clone_input(),
            field_infos: self.field_infos.clone(),
            total: self.term_count,
            ord: -1,
            text: Vec::new(),
            term: None,
            info: TermInfo::default(),
            skip_interval: self.skip_interval,
            max_skip_levels: self.max_skip_levels,
        }
    }

    /// Enumerator over the whole dictionary in term order
    pub fn terms(&self) -> Result<TermEnum> {
        let mut term_enum = self.fresh_enum();
        term_enum.input.seek(HEADER_SIZE)?;
        Ok(term_enum)
    }

    /// Enumerator seeded on the indexed term itself; its current term is
    /// valid immediately
    fn seek_entry(&self, entry: &IndexEntry) -> Result<TermEnum> {
        let mut term_enum = self.fresh_enum();
        term_enum.input.seek(entry.tis_pointer)?;
        term_enum.ord = entry.ord as i64;
        term_enum.text = entry.term.text.as_bytes().to_vec();
        term_enum.term = Some(entry.term.clone());
        term_enum.info = entry.info;
        Ok(term_enum)
    }

    /// Greatest index slot whose term is `<= target`, if any
    fn index_slot(&self, target: &Term) -> Option<usize> {
        if self.index.is_empty() || *target < self.index[0].term {
            return None;
        }
        let mut lo = 0usize;
        let mut hi = self.index.len() - 1;
        while lo < hi {
            let mid = (lo + hi + 1) / 2;
            if self.index[mid].term <= *target {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }
        Some(lo)
    }

    /// Exact lookup
    pub fn get(&self, target: &Term) -> Result<Option<TermInfo>> {
        if let Some((info, _ord)) = self.cache.lock().get(target) {
            return Ok(*info);
        }
        let result = match self.seek_scan(target)? {
            Some((term_enum, found)) => {
                let ord = term_enum.ord() as u64;
                let info = if found {
                    Some(term_enum.term_info())
                } else {
                    None
                };
                self.cache.lock().put(target.clone(), (info, ord));
                info
            }
            None => {
                self.cache.lock().put(target.clone(), (None, 0));
                None
            }
        };
        Ok(result)
    }

    /// Enumerator positioned on the first term `>= target`; the current
    /// term is already valid unless the dictionary is exhausted
    pub fn terms_from(&self, target: &Term) -> Result<TermEnum> {
        match self.seek_scan(target)? {
            Some((mut term_enum, found)) => {
                if !found && term_enum.term().map(|t| t < target).unwrap_or(false) {
                    term_enum.next()?;
                }
                Ok(term_enum)
            }
            None => {
                // Target sorts before the whole dictionary
                let mut term_enum = self.terms()?;
                term_enum.next()?;
                Ok(term_enum)
            }
        }
    }

    /// Positions an enumerator on the given term ordinal
    pub fn seek_ord(&self, ord: u64) -> Result<Option<TermEnum>> {
        if ord >= self.term_count || self.index.is_empty() {
            return Ok(None);
        }
        let per_slot = self.index[1..]
            .first()
            .map(|e| e.ord)
            .unwrap_or(self.index_interval as u64)
            .max(1);
        let slot = ((ord / per_slot) as usize).min(self.index.len() - 1);
        let mut term_enum = self.seek_entry(&self.index[slot])?;
        while term_enum.ord() < ord as i64 {
            if !term_enum.next()? {
                return Ok(None);
            }
        }
        Ok(Some(term_enum))
    }

    /// Binary search plus forward scan; returns the positioned enumerator
    /// and whether the landing term equals the target. `None` means the
    /// target sorts before every indexed term.
    fn seek_scan(&self, target: &Term) -> Result<Option<(TermEnum, bool)>> {
        let slot = match self.index_slot(target) {
            Some(slot) => slot,
            None => return Ok(None),
        };
        let mut term_enum = self.seek_entry(&self.index[slot])?;
        loop {
            let ordering = match term_enum.term() {
                Some(term) => term.cmp(target),
                None => return Ok(Some((term_enum, false))),
            };
            match ordering {
                std::cmp::Ordering::Less => {
                    if !term_enum.next()? {
                        return Ok(Some((term_enum, false)));
                    }
                }
                std::cmp::Ordering::Equal => return Ok(Some((term_enum, true))),
                std::cmp::Ordering::Greater => return Ok(Some((term_enum, false))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::field::FieldFlags;
    use crate::store::ram::RamDirectory;

    fn indexed_flags() -> FieldFlags {
        FieldFlags {
            indexed: true,
            tokenized: true,
            ..FieldFlags::default()
        }
    }

    fn build_dict(terms: &[(&str, &str)], index_interval: u32) -> (RamDirectory, Arc<FieldInfos>) {
        let dir = RamDirectory::new();
        let mut infos = FieldInfos::new();
        for (field, _) in terms {
            infos.add(field, &indexed_flags(), false);
        }
        let infos = Arc::new(infos);

        let mut sorted: Vec<Term> = terms
            .iter()
            .map(|(f, t)| Term::new(f.to_string(), t.to_string()))
            .collect();
        sorted.sort();

        let mut writer = TermDictWriter::open(&dir, "_0", index_interval, 16, 10).unwrap();
        for (i, term) in sorted.iter().enumerate() {
            let info = TermInfo::new(1 + i as u32, (i * 13) as u64, (i * 7) as u64, 0);
            let number = infos.number(&term.field).unwrap();
            writer.add(term, number, &info).unwrap();
        }
        writer.close().unwrap();
        (dir, infos)
    }

    #[test]
    fn test_lookup_hit_and_miss() {
        let terms = &[
            ("body", "brown"),
            ("body", "dog"),
            ("body", "fox"),
            ("body", "lazy"),
            ("body", "quick"),
            ("title", "alpha"),
        ];
        let (dir, infos) = build_dict(terms, 2);
        let reader = TermDictReader::open(&dir, "_0", infos, 1, 64).unwrap();
        assert_eq!(reader.term_count(), 6);

        let hit = reader.get(&Term::new("body", "fox")).unwrap();
        assert!(hit.is_some());
        assert!(reader.get(&Term::new("body", "foxes")).unwrap().is_none());
        assert!(reader.get(&Term::new("aaaa", "zzz")).unwrap().is_none());
        // Cached answer must agree
        assert_eq!(reader.get(&Term::new("body", "fox")).unwrap(), hit);
    }

    #[test]
    fn test_enumeration_order_and_pointers() {
        let terms = &[
            ("body", "a"),
            ("body", "ab"),
            ("body", "abc"),
            ("body", "b"),
            ("body", "ba"),
        ];
        let (dir, infos) = build_dict(terms, 128);
        let reader = TermDictReader::open(&dir, "_0", infos, 1, 64).unwrap();
        let mut term_enum = reader.terms().unwrap();
        let mut seen = Vec::new();
        let mut last_freq_ptr = 0;
        while term_enum.next().unwrap() {
            seen.push(term_enum.term().unwrap().text.clone());
            assert!(term_enum.term_info().freq_pointer >= last_freq_ptr);
            last_freq_ptr = term_enum.term_info().freq_pointer;
        }
        assert_eq!(seen, vec!["a", "ab", "abc", "b", "ba"]);
    }

    #[test]
    fn test_terms_from_positions_on_ceiling() {
        let terms = &[("body", "bb"), ("body", "dd"), ("body", "ff")];
        let (dir, infos) = build_dict(terms, 1);
        let reader = TermDictReader::open(&dir, "_0", infos, 1, 64).unwrap();

        let term_enum = reader.terms_from(&Term::new("body", "cc")).unwrap();
        assert_eq!(term_enum.term().unwrap().text, "dd");

        let term_enum = reader.terms_from(&Term::new("body", "aa")).unwrap();
        assert_eq!(term_enum.term().unwrap().text, "bb");

        let term_enum = reader.terms_from(&Term::new("body", "zz")).unwrap();
        assert!(term_enum.term().is_none());
    }

    #[test]
    fn test_seek_ord() {
        let terms: Vec<(String, String)> = (0..300)
            .map(|i| ("body".to_string(), format!("term{:04}", i)))
            .collect();
        let refs: Vec<(&str, &str)> = terms
            .iter()
            .map(|(f, t)| (f.as_str(), t.as_str()))
            .collect();
        let (dir, infos) = build_dict(&refs, 16);
        let reader = TermDictReader::open(&dir, "_0", infos, 1, 64).unwrap();

        let term_enum = reader.seek_ord(137).unwrap().unwrap();
        assert_eq!(term_enum.term().unwrap().text, "term0137");
        assert_eq!(term_enum.ord(), 137);
        assert!(reader.seek_ord(300).unwrap().is_none());
    }

    #[test]
    fn test_index_divisor_sampling() {
        let terms: Vec<(String, String)> = (0..300)
            .map(|i| ("body".to_string(), format!("term{:04}", i)))
            .collect();
        let refs: Vec<(&str, &str)> = terms
            .iter()
            .map(|(f, t)| (f.as_str(), t.as_str()))
            .collect();
        let (dir, infos) = build_dict(&refs, 16);
        let reader = TermDictReader::open(&dir, "_0", infos, 4, 64).unwrap();
        // Sampling keeps lookups correct, just with longer scans
        assert!(reader.get(&Term::new("body", "term0250")).unwrap().is_some());
        assert!(reader.get(&Term::new("body", "nope")).unwrap().is_none());
    }
}
