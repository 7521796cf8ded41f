use crate::core::error::Result;
use crate::store::input::IndexInput;
use crate::store::output::IndexOutput;

fn put_vint(buf: &mut Vec<u8>, mut v: u32) {
    while v & !0x7F != 0 {
        buf.push((v & 0x7F) as u8 | 0x80);
        v >>= 7;
    }
    buf.push(v as u8);
}

fn put_vlong(buf: &mut Vec<u8>, mut v: u64) {
    while v & !0x7F != 0 {
        buf.push((v & 0x7F) as u8 | 0x80);
        v >>= 7;
    }
    buf.push(v as u8);
}

/// Levels a posting list of `doc_freq` entries spans
pub fn skip_levels_for(doc_freq: u32, skip_interval: u32, max_levels: u32) -> u32 {
    if doc_freq < skip_interval {
        return 0;
    }
    let mut levels = 1u32;
    let mut n = (doc_freq / skip_interval) as u64;
    while n >= skip_interval as u64 && levels < max_levels {
        levels += 1;
        n /= skip_interval as u64;
    }
    levels
}

/// Buffers one term's multi-level skip data while its postings stream out
///
/// Level 0 gets an entry every `skip_interval` postings; level k every
/// `skip_interval^(k+1)`. An entry records the last doc of the block it
/// closes plus the freq/prox file positions of the next block, so a reader
/// landing on the entry resumes a linear scan without touching the skipped
/// bytes. Entries on levels above 0 carry a pointer to the position in the
/// level below just past the same skip point.
pub struct SkipListWriter {
    skip_interval: u32,
    max_levels: u32,
    store_payloads: bool,
    level_buffers: Vec<Vec<u8>>,
    last_doc: Vec<u32>,
    last_freq_ptr: Vec<u64>,
    last_prox_ptr: Vec<u64>,
    cur_doc: u32,
    cur_freq_ptr: u64,
    cur_prox_ptr: u64,
    cur_payload_length: u32,
}

impl SkipListWriter {
    pub fn new(skip_interval: u32, max_levels: u32) -> Self {
        SkipListWriter {
            skip_interval,
            max_levels,
            store_payloads: false,
            level_buffers: vec![Vec::new(); max_levels as usize],
            last_doc: vec![0; max_levels as usize],
            last_freq_ptr: vec![0; max_levels as usize],
            last_prox_ptr: vec![0; max_levels as usize],
            cur_doc: 0,
            cur_freq_ptr: 0,
            cur_prox_ptr: 0,
            cur_payload_length: 0,
        }
    }

    /// Clears buffered data for the next term
    pub fn reset(&mut self, freq_base: u64, prox_base: u64, store_payloads: bool) {
        for buf in &mut self.level_buffers {
            buf.clear();
        }
        for doc in &mut self.last_doc {
            *doc = 0;
        }
        for ptr in &mut self.last_freq_ptr {
            *ptr = freq_base;
        }
        for ptr in &mut self.last_prox_ptr {
            *ptr = prox_base;
        }
        self.store_payloads = store_payloads;
        self.cur_payload_length = 0;
    }

    /// Records the state at a block boundary; call before `buffer_skip`
    pub fn set_skip_data(
        &mut self,
        last_doc: u32,
        freq_ptr: u64,
        prox_ptr: u64,
        payload_length: u32,
    ) {
        self.cur_doc = last_doc;
        self.cur_freq_ptr = freq_ptr;
        self.cur_prox_ptr = prox_ptr;
        self.cur_payload_length = payload_length;
    }

    /// Buffers the pending skip point; `count` is the number of postings
    /// written so far and must be a multiple of the skip interval
    pub fn buffer_skip(&mut self, count: u32) {
        debug_assert_eq!(count % self.skip_interval, 0);
        // The point appears on as many levels as the interval divides it
        let mut num_levels = 1usize;
        let mut n = count / self.skip_interval;
        while n % self.skip_interval == 0 && num_levels < self.max_levels as usize {
            num_levels += 1;
            n /= self.skip_interval;
        }

        let mut child_pointer = 0u64;
        for level in 0..num_levels {
            let doc_delta = self.cur_doc - self.last_doc[level];
            {
                let buf = &mut self.level_buffers[level];
                put_vint(buf, doc_delta);
                if self.store_payloads {
                    put_vint(buf, self.cur_payload_length);
                }
            }
            let freq_delta = self.cur_freq_ptr - self.last_freq_ptr[level];
            let prox_delta = self.cur_prox_ptr - self.last_prox_ptr[level];
            {
                let buf = &mut self.level_buffers[level];
                put_vlong(buf, freq_delta);
                put_vlong(buf, prox_delta);
                if level != 0 {
                    put_vlong(buf, child_pointer);
                }
            }
            self.last_doc[level] = self.cur_doc;
            self.last_freq_ptr[level] = self.cur_freq_ptr;
            self.last_prox_ptr[level] = self.cur_prox_ptr;
            child_pointer = self.level_buffers[level].len() as u64;
        }
    }

    /// Appends all buffered levels, top level first, each length-prefixed
    /// so the reader can frame them without knowing the term's end.
    /// Returns the number of bytes written.
    pub fn write_to(&mut self, out: &mut dyn IndexOutput) -> Result<u64> {
        let start = out.position();
        for level in (0..self.level_buffers.len()).rev() {
            let buf = &self.level_buffers[level];
            if !buf.is_empty() {
                out.write_vlong(buf.len() as u64)?;
                out.write_bytes(buf)?;
            }
        }
        Ok(out.position() - start)
    }
}

/// One level's lazy cursor into the skip data
struct SkipLevel {
    input: Box<dyn IndexInput>,
    /// Absolute bounds of this level's entries in the file
    start: u64,
    end: u64,
    // the entry read ahead but not yet applied
    pending_doc: u32,
    pending_freq: u64,
    pending_prox: u64,
    pending_payload: u32,
    pending_child: u64,
    has_pending: bool,
    exhausted: bool,
    // the last applied skip point
    last_doc: u32,
    last_freq: u64,
    last_prox: u64,
    last_payload: u32,
    last_child: u64,
    /// Postings covered up to the applied point
    num_skipped: u32,
}

/// Walks one term's skip data top-down during `advance`
///
/// Entries stream from the file on demand; a level reads at most one
/// entry past the target, and descending seeks the child level straight
/// to the pointer recorded with the parent entry.
pub struct SkipListReader {
    levels: Vec<SkipLevel>,
    store_payloads: bool,
    skip_interval: u32,
}

impl SkipListReader {
    /// `input` must be positioned at the term's skip data; `doc_freq`
    /// determines how many levels were written
    pub fn open(
        mut input: Box<dyn IndexInput>,
        doc_freq: u32,
        skip_interval: u32,
        max_levels: u32,
        store_payloads: bool,
        freq_base: u64,
        prox_base: u64,
    ) -> Result<Self> {
        let num_levels = skip_levels_for(doc_freq, skip_interval, max_levels) as usize;
        let mut levels: Vec<SkipLevel> = Vec::with_capacity(num_levels);
        for _ in (0..num_levels).rev() {
            let len = input.read_vlong()?;
            let start = input.position();
            let mut level_input = input.clone_input();
            level_input.seek(start)?;
            levels.push(SkipLevel {
                input: level_input,
                start,
                end: start + len,
                pending_doc: 0,
                pending_freq: 0,
                pending_prox: 0,
                pending_payload: 0,
                pending_child: 0,
                has_pending: false,
                exhausted: false,
                last_doc: 0,
                last_freq: freq_base,
                last_prox: prox_base,
                last_payload: 0,
                last_child: 0,
                num_skipped: 0,
            });
            input.seek(start + len)?;
        }
        // Stored top-down; index by level number
        levels.reverse();
        Ok(SkipListReader {
            levels,
            store_payloads,
            skip_interval,
        })
    }

    /// Postings one entry on `level` spans
    fn span(&self, level: usize) -> u32 {
        self.skip_interval.saturating_pow(level as u32 + 1)
    }

    fn read_pending(&mut self, level: usize) -> Result<()> {
        let store_payloads = self.store_payloads;
        let lvl = &mut self.levels[level];
        if lvl.input.position() >= lvl.end {
            lvl.exhausted = true;
            return Ok(());
        }
        lvl.pending_doc = lvl.last_doc + lvl.input.read_vint()?;
        lvl.pending_payload = if store_payloads {
            lvl.input.read_vint()?
        } else {
            lvl.last_payload
        };
        lvl.pending_freq = lvl.last_freq + lvl.input.read_vlong()?;
        lvl.pending_prox = lvl.last_prox + lvl.input.read_vlong()?;
        lvl.pending_child = if level != 0 { lvl.input.read_vlong()? } else { 0 };
        lvl.has_pending = true;
        Ok(())
    }

    /// Makes the pending entry the applied point
    fn apply(&mut self, level: usize) {
        let span = self.span(level);
        let lvl = &mut self.levels[level];
        lvl.last_doc = lvl.pending_doc;
        lvl.last_freq = lvl.pending_freq;
        lvl.last_prox = lvl.pending_prox;
        lvl.last_payload = lvl.pending_payload;
        lvl.last_child = lvl.pending_child;
        lvl.num_skipped += span;
        lvl.has_pending = false;
    }

    /// Repositions `child` on the point just applied at `child + 1`
    fn seat_child(&mut self, child: usize) -> Result<()> {
        let parent = &self.levels[child + 1];
        let (doc, freq, prox, payload, pointer, skipped) = (
            parent.last_doc,
            parent.last_freq,
            parent.last_prox,
            parent.last_payload,
            parent.last_child,
            parent.num_skipped,
        );
        let lvl = &mut self.levels[child];
        lvl.input.seek(lvl.start + pointer)?;
        lvl.last_doc = doc;
        lvl.last_freq = freq;
        lvl.last_prox = prox;
        lvl.last_payload = payload;
        lvl.num_skipped = skipped;
        lvl.has_pending = false;
        lvl.exhausted = false;
        Ok(())
    }

    /// Consumes skip entries whose last doc is below `target`, descending
    /// level by level; returns true if the cursor moved at all
    pub fn skip_to(&mut self, target: u32) -> Result<bool> {
        if self.levels.is_empty() {
            return Ok(false);
        }
        let mut moved = false;
        for level in (0..self.levels.len()).rev() {
            loop {
                if !self.levels[level].has_pending {
                    if self.levels[level].exhausted {
                        break;
                    }
                    self.read_pending(level)?;
                    if !self.levels[level].has_pending {
                        break;
                    }
                }
                if self.levels[level].pending_doc >= target {
                    break;
                }
                self.apply(level);
                moved = true;
                if level > 0 {
                    self.seat_child(level - 1)?;
                }
            }
        }
        Ok(moved)
    }

    pub fn doc(&self) -> u32 {
        self.levels[0].last_doc
    }

    pub fn freq_pointer(&self) -> u64 {
        self.levels[0].last_freq
    }

    pub fn prox_pointer(&self) -> u64 {
        self.levels[0].last_prox
    }

    pub fn payload_length(&self) -> u32 {
        self.levels[0].last_payload
    }

    pub fn num_skipped(&self) -> u32 {
        self.levels[0].num_skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ram::RamDirectory;
    use crate::store::Directory;

    #[test]
    fn test_levels_for() {
        assert_eq!(skip_levels_for(5, 16, 10), 0);
        assert_eq!(skip_levels_for(16, 16, 10), 1);
        assert_eq!(skip_levels_for(255, 16, 10), 1);
        assert_eq!(skip_levels_for(256, 16, 10), 2);
        assert_eq!(skip_levels_for(4096, 16, 10), 3);
        assert_eq!(skip_levels_for(4096, 16, 2), 2);
    }

    // Write synthetic skip data for doc ids 0,1,2,…,df-1 where the
    // "file pointer" for doc d is d*10, then check skip landings.
    fn build(df: u32, interval: u32, levels: u32) -> RamDirectory {
        let dir = RamDirectory::new();
        let mut writer = SkipListWriter::new(interval, levels);
        writer.reset(0, 0, false);
        for count in (interval..=df).step_by(interval as usize) {
            let last_doc = count - 1;
            writer.set_skip_data(last_doc, last_doc as u64 * 10, last_doc as u64 * 100, 0);
            writer.buffer_skip(count);
        }
        let mut out = dir.create_output("skip").unwrap();
        writer.write_to(out.as_mut()).unwrap();
        out.flush().unwrap();
        dir
    }

    #[test]
    fn test_multi_level_skip_lands_before_target() {
        let df = 5000u32;
        let dir = build(df, 16, 10);
        let input = dir.open_input("skip").unwrap();
        let mut reader = SkipListReader::open(input, df, 16, 10, false, 0, 0).unwrap();

        assert!(reader.skip_to(4800).unwrap());
        // The cursor must sit on a skip point strictly below the target…
        assert!(reader.doc() < 4800);
        // …and within one block of it
        assert!(4800 - reader.doc() <= 16);
        assert_eq!(reader.freq_pointer(), reader.doc() as u64 * 10);
        assert_eq!(reader.prox_pointer(), reader.doc() as u64 * 100);
        assert_eq!(reader.num_skipped() % 16, 0);
        assert_eq!(reader.num_skipped(), (reader.doc() + 1));
    }

    #[test]
    fn test_skip_below_first_entry_is_noop() {
        let dir = build(1000, 16, 10);
        let input = dir.open_input("skip").unwrap();
        let mut reader = SkipListReader::open(input, 1000, 16, 10, false, 7, 9).unwrap();
        assert!(!reader.skip_to(3).unwrap());
        assert_eq!(reader.freq_pointer(), 7);
        assert_eq!(reader.prox_pointer(), 9);
        assert_eq!(reader.num_skipped(), 0);
    }

    #[test]
    fn test_successive_skips_are_monotonic() {
        let dir = build(5000, 16, 10);
        let input = dir.open_input("skip").unwrap();
        let mut reader = SkipListReader::open(input, 5000, 16, 10, false, 0, 0).unwrap();
        let mut last = 0;
        for target in [14u32, 17, 287, 1200, 4800] {
            reader.skip_to(target).unwrap();
            assert!(reader.doc() >= last);
            assert!(reader.doc() < target.max(1));
            last = reader.doc();
        }
    }
}
