use crate::core::error::Result;
use crate::search::spans::Spans;

/// Unordered proximity spans: all clauses in one doc, any order, with
/// `maxEnd - minStart - totalSpanLength <= slop`
pub struct NearSpansUnordered {
    cells: Vec<Box<dyn Spans>>,
    slop: u32,
    more: bool,
    first_time: bool,
}

impl NearSpansUnordered {
    pub fn new(cells: Vec<Box<dyn Spans>>, slop: u32) -> Self {
        NearSpansUnordered {
            cells,
            slop,
            more: true,
            first_time: true,
        }
    }

    /// Index of the cell with the smallest (start, end)
    fn min_cell(&self) -> usize {
        let mut min = 0;
        for i in 1..self.cells.len() {
            let a = (self.cells[i].start(), self.cells[i].end());
            let b = (self.cells[min].start(), self.cells[min].end());
            if a < b {
                min = i;
            }
        }
        min
    }

    fn max_end(&self) -> u32 {
        self.cells.iter().map(|c| c.end()).max().unwrap()
    }

    fn total_length(&self) -> u64 {
        self.cells.iter().map(|c| (c.end() - c.start()) as u64).sum()
    }

    /// Drags every cell onto one common doc
    fn to_same_doc(&mut self) -> Result<bool> {
        let mut max_doc = self.cells.iter().map(|c| c.doc()).max().unwrap();
        loop {
            let mut all_equal = true;
            for cell in self.cells.iter_mut() {
                if cell.doc() < max_doc {
                    if !cell.skip_to(max_doc)? {
                        self.more = false;
                        return Ok(false);
                    }
                }
                if cell.doc() > max_doc {
                    max_doc = cell.doc();
                    all_equal = false;
                }
            }
            if all_equal {
                return Ok(true);
            }
        }
    }

    fn at_match(&self) -> bool {
        let min_start = self.cells.iter().map(|c| c.start()).min().unwrap() as u64;
        let max_end = self.max_end() as u64;
        max_end - min_start <= self.total_length() + self.slop as u64
    }

    fn same_doc(&self) -> bool {
        let doc = self.cells[0].doc();
        self.cells.iter().all(|c| c.doc() == doc)
    }

    fn seek_match(&mut self) -> Result<bool> {
        while self.more {
            if !self.same_doc() && !self.to_same_doc()? {
                return Ok(false);
            }
            if self.at_match() {
                return Ok(true);
            }
            // Slide the leftmost cell and retry
            let min = self.min_cell();
            if !self.cells[min].next()? {
                self.more = false;
                return Ok(false);
            }
        }
        Ok(false)
    }
}

impl Spans for NearSpansUnordered {
    fn next(&mut self) -> Result<bool> {
        if self.first_time {
            self.first_time = false;
            for cell in self.cells.iter_mut() {
                if !cell.next()? {
                    self.more = false;
                    return Ok(false);
                }
            }
        } else if self.more {
            // Move past the emitted match through its leftmost cell
            let min = self.min_cell();
            if !self.cells[min].next()? {
                self.more = false;
                return Ok(false);
            }
        }
        self.seek_match()
    }

    fn skip_to(&mut self, target: u32) -> Result<bool> {
        if self.first_time {
            self.first_time = false;
            for cell in self.cells.iter_mut() {
                if !cell.skip_to(target)? {
                    self.more = false;
                    return Ok(false);
                }
            }
        } else if self.more && self.cells[0].doc() < target {
            for cell in self.cells.iter_mut() {
                if cell.doc() < target && !cell.skip_to(target)? {
                    self.more = false;
                    return Ok(false);
                }
            }
        }
        self.seek_match()
    }

    fn doc(&self) -> u32 {
        self.cells[0].doc()
    }

    fn start(&self) -> u32 {
        self.cells.iter().map(|c| c.start()).min().unwrap()
    }

    fn end(&self) -> u32 {
        self.max_end()
    }

    fn payload(&mut self) -> Result<Vec<Vec<u8>>> {
        let mut out = Vec::new();
        for cell in self.cells.iter_mut() {
            if cell.is_payload_available() {
                out.extend(cell.payload()?);
            }
        }
        Ok(out)
    }

    fn is_payload_available(&self) -> bool {
        self.cells.iter().any(|c| c.is_payload_available())
    }
}
