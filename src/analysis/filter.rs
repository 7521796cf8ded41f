use std::collections::HashSet;

use crate::analysis::token::Token;
use crate::analysis::tokenizer::TokenStream;
use crate::core::error::Result;

/// Lowercases every term
pub struct LowercaseFilter {
    input: Box<dyn TokenStream>,
}

impl LowercaseFilter {
    pub fn new(input: Box<dyn TokenStream>) -> Self {
        LowercaseFilter { input }
    }
}

impl TokenStream for LowercaseFilter {
    fn increment_token(&mut self) -> Result<bool> {
        if !self.input.increment_token()? {
            return Ok(false);
        }
        let token = self.input.token_mut();
        if token.term.chars().any(|c| c.is_uppercase()) {
            token.term = token.term.to_lowercase();
        }
        Ok(true)
    }

    fn token(&self) -> &Token {
        self.input.token()
    }

    fn token_mut(&mut self) -> &mut Token {
        self.input.token_mut()
    }

    fn reset(&mut self) {
        self.input.reset();
    }

    fn end(&mut self) -> Result<()> {
        self.input.end()
    }

    fn final_offset(&self) -> u32 {
        self.input.final_offset()
    }
}

/// Drops stop words
///
/// With `enable_position_increments` the increments of removed tokens are
/// folded into the next surviving token, so phrase positions stay faithful
/// to the original text.
pub struct StopFilter {
    input: Box<dyn TokenStream>,
    stop_words: HashSet<String>,
    enable_position_increments: bool,
}

impl StopFilter {
    pub fn new(
        input: Box<dyn TokenStream>,
        stop_words: HashSet<String>,
        enable_position_increments: bool,
    ) -> Self {
        StopFilter {
            input,
            stop_words,
            enable_position_increments,
        }
    }
}

impl TokenStream for StopFilter {
    fn increment_token(&mut self) -> Result<bool> {
        let mut skipped = 0u32;
        while self.input.increment_token()? {
            if !self.stop_words.contains(&self.input.token().term) {
                if self.enable_position_increments {
                    let token = self.input.token_mut();
                    token.position_increment += skipped;
                }
                return Ok(true);
            }
            skipped += self.input.token().position_increment;
        }
        Ok(false)
    }

    fn token(&self) -> &Token {
        self.input.token()
    }

    fn token_mut(&mut self) -> &mut Token {
        self.input.token_mut()
    }

    fn reset(&mut self) {
        self.input.reset();
    }

    fn end(&mut self) -> Result<()> {
        self.input.end()
    }

    fn final_offset(&self) -> u32 {
        self.input.final_offset()
    }
}

/// Attaches a fixed payload to every token, cycling through the given list
///
/// Test support for payload-carrying postings; mirrors how a real analyzer
/// would attach per-occurrence metadata.
pub struct PayloadSetterFilter {
    input: Box<dyn TokenStream>,
    payloads: Vec<Vec<u8>>,
    next: usize,
}

impl PayloadSetterFilter {
    pub fn new(input: Box<dyn TokenStream>, payloads: Vec<Vec<u8>>) -> Self {
        PayloadSetterFilter {
            input,
            payloads,
            next: 0,
        }
    }
}

impl TokenStream for PayloadSetterFilter {
    fn increment_token(&mut self) -> Result<bool> {
        if !self.input.increment_token()? {
            return Ok(false);
        }
        if !self.payloads.is_empty() {
            let payload = self.payloads[self.next % self.payloads.len()].clone();
            self.next += 1;
            self.input.token_mut().payload = Some(payload);
        }
        Ok(true)
    }

    fn token(&self) -> &Token {
        self.input.token()
    }

    fn token_mut(&mut self) -> &mut Token {
        self.input.token_mut()
    }

    fn reset(&mut self) {
        self.next = 0;
        self.input.reset();
    }

    fn end(&mut self) -> Result<()> {
        self.input.end()
    }

    fn final_offset(&self) -> u32 {
        self.input.final_offset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::tokenizer::WhitespaceTokenizer;

    fn stop_set(words: &[&str]) -> HashSet<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_stop_filter_accumulates_increments() {
        let tokenizer = Box::new(WhitespaceTokenizer::new("one two three four five six"));
        let mut filter = StopFilter::new(tokenizer, stop_set(&["two", "four", "five"]), true);

        let mut out = Vec::new();
        while filter.increment_token().unwrap() {
            let t = filter.token();
            out.push((t.term.clone(), t.position_increment));
        }
        assert_eq!(
            out,
            vec![
                ("one".to_string(), 1),
                ("three".to_string(), 2),
                ("six".to_string(), 3),
            ]
        );
    }

    #[test]
    fn test_stop_filter_without_increments() {
        let tokenizer = Box::new(WhitespaceTokenizer::new("one two three"));
        let mut filter = StopFilter::new(tokenizer, stop_set(&["two"]), false);
        let mut out = Vec::new();
        while filter.increment_token().unwrap() {
            let t = filter.token();
            out.push((t.term.clone(), t.position_increment));
        }
        assert_eq!(out, vec![("one".to_string(), 1), ("three".to_string(), 1)]);
    }
}
