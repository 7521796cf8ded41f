use crate::core::error::Result;
use crate::search::spans::Spans;

/// Union of sub-spans, emitted in (doc, start, end) order
pub struct SpanOrSpans {
    sub: Vec<Box<dyn Spans>>,
    alive: Vec<bool>,
    current: Option<usize>,
    first_time: bool,
}

impl SpanOrSpans {
    pub fn new(sub: Vec<Box<dyn Spans>>) -> Self {
        let alive = vec![true; sub.len()];
        SpanOrSpans {
            sub,
            alive,
            current: None,
            first_time: true,
        }
    }

    fn settle(&mut self) -> bool {
        let mut best: Option<usize> = None;
        for i in 0..self.sub.len() {
            if !self.alive[i] {
                continue;
            }
            let key = (self.sub[i].doc(), self.sub[i].start(), self.sub[i].end());
            match best {
                Some(b) => {
                    let best_key = (self.sub[b].doc(), self.sub[b].start(), self.sub[b].end());
                    if key < best_key {
                        best = Some(i);
                    }
                }
                None => best = Some(i),
            }
        }
        self.current = best;
        best.is_some()
    }
}

impl Spans for SpanOrSpans {
    fn next(&mut self) -> Result<bool> {
        if self.first_time {
            self.first_time = false;
            for i in 0..self.sub.len() {
                self.alive[i] = self.sub[i].next()?;
            }
        } else if let Some(current) = self.current {
            self.alive[current] = self.sub[current].next()?;
        }
        Ok(self.settle())
    }

    fn skip_to(&mut self, target: u32) -> Result<bool> {
        if self.first_time {
            self.first_time = false;
            for i in 0..self.sub.len() {
                self.alive[i] = self.sub[i].skip_to(target)?;
            }
        } else {
            for i in 0..self.sub.len() {
                if self.alive[i] && self.sub[i].doc() < target {
                    self.alive[i] = self.sub[i].skip_to(target)?;
                }
            }
        }
        Ok(self.settle())
    }

    fn doc(&self) -> u32 {
        self.sub[self.current.unwrap()].doc()
    }

    fn start(&self) -> u32 {
        self.sub[self.current.unwrap()].start()
    }

    fn end(&self) -> u32 {
        self.sub[self.current.unwrap()].end()
    }

    fn payload(&mut self) -> Result<Vec<Vec<u8>>> {
        let current = self.current.unwrap();
        if self.sub[current].is_payload_available() {
            self.sub[current].payload()
        } else {
            Ok(Vec::new())
        }
    }

    fn is_payload_available(&self) -> bool {
        self.current
            .map(|c| self.sub[c].is_payload_available())
            .unwrap_or(false)
    }
}

/// Spans of `include` that do not overlap any span of `exclude`
pub struct SpanNotSpans {
    include: Box<dyn Spans>,
    exclude: Box<dyn Spans>,
    more_exclude: bool,
    first_time: bool,
}

impl SpanNotSpans {
    pub fn new(include: Box<dyn Spans>, exclude: Box<dyn Spans>) -> Self {
        SpanNotSpans {
            include,
            exclude,
            more_exclude: true,
            first_time: true,
        }
    }

    /// True when the current include span survives the exclusion
    fn clear_of_exclusion(&mut self) -> Result<bool> {
        if !self.more_exclude {
            return Ok(true);
        }
        let doc = self.include.doc();
        if self.exclude.doc() < doc {
            self.more_exclude = self.exclude.skip_to(doc)?;
            if !self.more_exclude {
                return Ok(true);
            }
        }
        if self.exclude.doc() != doc {
            return Ok(true);
        }
        // Walk exclusion spans that end before the include span starts
        while self.exclude.doc() == doc && self.exclude.end() <= self.include.start() {
            self.more_exclude = self.exclude.next()?;
            if !self.more_exclude {
                return Ok(true);
            }
        }
        Ok(self.exclude.doc() != doc || self.include.end() <= self.exclude.start())
    }
}

impl Spans for SpanNotSpans {
    fn next(&mut self) -> Result<bool> {
        if self.first_time {
            self.first_time = false;
            self.more_exclude = self.exclude.next()?;
            if !self.include.next()? {
                return Ok(false);
            }
        } else if !self.include.next()? {
            return Ok(false);
        }
        loop {
            if self.clear_of_exclusion()? {
                return Ok(true);
            }
            if !self.include.next()? {
                return Ok(false);
            }
        }
    }

    fn skip_to(&mut self, target: u32) -> Result<bool> {
        if self.first_time {
            self.first_time = false;
            self.more_exclude = self.exclude.next()?;
            if !self.include.skip_to(target)? {
                return Ok(false);
            }
        } else if self.include.doc() < target && !self.include.skip_to(target)? {
            return Ok(false);
        }
        loop {
            if self.clear_of_exclusion()? {
                return Ok(true);
            }
            if !self.include.next()? {
                return Ok(false);
            }
        }
    }

    fn doc(&self) -> u32 {
        self.include.doc()
    }

    fn start(&self) -> u32 {
        self.include.start()
    }

    fn end(&self) -> u32 {
        self.include.end()
    }

    fn payload(&mut self) -> Result<Vec<Vec<u8>>> {
        if self.include.is_payload_available() {
            self.include.payload()
        } else {
            Ok(Vec::new())
        }
    }

    fn is_payload_available(&self) -> bool {
        self.include.is_payload_available()
    }
}
