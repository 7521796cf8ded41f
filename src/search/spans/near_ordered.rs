use crate::core::error::Result;
use crate::search::spans::Spans;

/// Ordered proximity spans: clauses must match left to right, gaps
/// summing to at most `slop`
///
/// Matching is a two-phase walk per doc: stretch the chain into clause
/// order, then shrink earlier clauses toward the match to find the
/// tightest alignment.
pub struct NearSpansOrdered {
    sub: Vec<Box<dyn Spans>>,
    slop: u32,
    collect_payloads: bool,
    more: bool,
    in_same_doc: bool,
    first_time: bool,
    match_doc: u32,
    match_start: u32,
    match_end: u32,
    match_payloads: Vec<Vec<u8>>,
}

impl NearSpansOrdered {
    pub fn new(sub: Vec<Box<dyn Spans>>, slop: u32, collect_payloads: bool) -> Self {
        NearSpansOrdered {
            sub,
            slop,
            collect_payloads,
            more: true,
            in_same_doc: false,
            first_time: true,
            match_doc: 0,
            match_start: 0,
            match_end: 0,
            match_payloads: Vec::new(),
        }
    }

    fn to_same_doc(&mut self) -> Result<bool> {
        let mut max_doc = self.sub.iter().map(|s| s.doc()).max().unwrap();
        loop {
            let mut all_equal = true;
            for span in self.sub.iter_mut() {
                if span.doc() < max_doc {
                    if !span.skip_to(max_doc)? {
                        self.more = false;
                        return Ok(false);
                    }
                }
                if span.doc() > max_doc {
                    max_doc = span.doc();
                    all_equal = false;
                }
            }
            if all_equal {
                self.in_same_doc = true;
                self.match_doc = max_doc;
                return Ok(true);
            }
        }
    }

    /// Two spans are in document order when the first starts earlier, or
    /// starts equal and ends earlier
    fn spans_ordered(a: &dyn Spans, b: &dyn Spans) -> bool {
        if a.start() == b.start() {
            a.end() < b.end()
        } else {
            a.start() < b.start()
        }
    }

    fn stretch_to_order(&mut self) -> Result<bool> {
        for i in 1..self.sub.len() {
            while self.in_same_doc
                && !Self::spans_ordered(self.sub[i - 1].as_ref(), self.sub[i].as_ref())
            {
                if !self.sub[i].next()? {
                    self.more = false;
                    self.in_same_doc = false;
                } else if self.match_doc != self.sub[i].doc() {
                    self.in_same_doc = false;
                }
            }
            if !self.in_same_doc {
                break;
            }
        }
        Ok(self.in_same_doc)
    }

    /// Pulls earlier clauses as close as possible to the later ones and
    /// accepts when the leftover gaps fit the slop
    fn shrink_to_after_shortest_match(&mut self) -> Result<bool> {
        let last = self.sub.len() - 1;
        self.match_start = self.sub[last].start();
        self.match_end = self.sub[last].end();
        self.match_payloads.clear();
        if self.collect_payloads && self.sub[last].is_payload_available() {
            self.match_payloads.extend(self.sub[last].payload()?);
        }

        let mut match_slop = 0u64;
        for i in (0..last).rev() {
            let mut prev_start = self.sub[i].start();
            let mut prev_end = self.sub[i].end();
            let mut prev_payloads = if self.collect_payloads && self.sub[i].is_payload_available()
            {
                self.sub[i].payload()?
            } else {
                Vec::new()
            };
            loop {
                if !self.sub[i].next()? {
                    self.more = false;
                    self.in_same_doc = false;
                    break;
                }
                if self.match_doc != self.sub[i].doc() {
                    self.in_same_doc = false;
                    break;
                }
                if self.sub[i].end() > self.match_start {
                    // Would overlap the match; keep the previous landing
                    break;
                }
                prev_start = self.sub[i].start();
                prev_end = self.sub[i].end();
                if self.collect_payloads && self.sub[i].is_payload_available() {
                    prev_payloads = self.sub[i].payload()?;
                }
            }
            if self.match_start > prev_end {
                match_slop += (self.match_start - prev_end) as u64;
            }
            self.match_start = prev_start;
            if self.collect_payloads {
                let mut combined = prev_payloads;
                combined.extend(std::mem::take(&mut self.match_payloads));
                self.match_payloads = combined;
            }
        }
        Ok(match_slop <= self.slop as u64)
    }

    fn advance_after_ordered(&mut self) -> Result<bool> {
        while self.more && (self.in_same_doc || self.to_same_doc()?) {
            if self.stretch_to_order()? && self.shrink_to_after_shortest_match()? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl Spans for NearSpansOrdered {
    fn next(&mut self) -> Result<bool> {
        if self.first_time {
            self.first_time = false;
            for span in self.sub.iter_mut() {
                if !span.next()? {
                    self.more = false;
                    return Ok(false);
                }
            }
        }
        self.advance_after_ordered()
    }

    fn skip_to(&mut self, target: u32) -> Result<bool> {
        if self.first_time {
            self.first_time = false;
            for span in self.sub.iter_mut() {
                if !span.skip_to(target)? {
                    self.more = false;
                    return Ok(false);
                }
            }
        } else if self.more && self.sub[0].doc() < target {
            if !self.sub[0].skip_to(target)? {
                self.more = false;
                return Ok(false);
            }
        }
        self.in_same_doc = false;
        self.advance_after_ordered()
    }

    fn doc(&self) -> u32 {
        self.match_doc
    }

    fn start(&self) -> u32 {
        self.match_start
    }

    fn end(&self) -> u32 {
        self.match_end
    }

    fn payload(&mut self) -> Result<Vec<Vec<u8>>> {
        Ok(self.match_payloads.clone())
    }

    fn is_payload_available(&self) -> bool {
        !self.match_payloads.is_empty()
    }
}
