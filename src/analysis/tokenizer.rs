use unicode_segmentation::UnicodeSegmentation;

use crate::analysis::token::Token;
use crate::core::error::Result;

/// Stateful token iterator
///
/// `increment_token` advances to the next token and returns false when the
/// stream is exhausted; the token accessor is valid only after a successful
/// increment. `end` runs once after the last token to finalize offsets.
pub trait TokenStream: Send {
    fn increment_token(&mut self) -> Result<bool>;

    fn token(&self) -> &Token;

    fn token_mut(&mut self) -> &mut Token;

    /// Rewinds to the start of the underlying text
    fn reset(&mut self);

    fn end(&mut self) -> Result<()>;

    /// Character offset just past the final token, valid after `end`
    fn final_offset(&self) -> u32;
}

/// Splits on runs of whitespace, preserving character offsets
pub struct WhitespaceTokenizer {
    chars: Vec<char>,
    pos: usize,
    token: Token,
    final_offset: u32,
}

impl WhitespaceTokenizer {
    pub fn new(text: &str) -> Self {
        WhitespaceTokenizer {
            chars: text.chars().collect(),
            pos: 0,
            token: Token::default(),
            final_offset: 0,
        }
    }
}

impl TokenStream for WhitespaceTokenizer {
    fn increment_token(&mut self) -> Result<bool> {
        while self.pos < self.chars.len() && self.chars[self.pos].is_whitespace() {
            self.pos += 1;
        }
        if self.pos >= self.chars.len() {
            return Ok(false);
        }
        let start = self.pos;
        while self.pos < self.chars.len() && !self.chars[self.pos].is_whitespace() {
            self.pos += 1;
        }
        self.token.clear();
        self.token.term = self.chars[start..self.pos].iter().collect();
        self.token.start_offset = start as u32;
        self.token.end_offset = self.pos as u32;
        Ok(true)
    }

    fn token(&self) -> &Token {
        &self.token
    }

    fn token_mut(&mut self) -> &mut Token {
        &mut self.token
    }

    fn reset(&mut self) {
        self.pos = 0;
        self.final_offset = 0;
    }

    fn end(&mut self) -> Result<()> {
        self.final_offset = self.chars.len() as u32;
        Ok(())
    }

    fn final_offset(&self) -> u32 {
        self.final_offset
    }
}

/// Unicode word-boundary tokenizer
pub struct UnicodeTokenizer {
    words: Vec<(u32, u32, String)>,
    idx: usize,
    token: Token,
    final_offset: u32,
}

impl UnicodeTokenizer {
    pub fn new(text: &str) -> Self {
        // Byte offsets from the segmenter are converted to char offsets
        let mut byte_to_char = vec![0u32; text.len() + 1];
        for (count, (byte_idx, _)) in text.char_indices().enumerate() {
            byte_to_char[byte_idx] = count as u32;
        }
        byte_to_char[text.len()] = text.chars().count() as u32;

        let words = text
            .unicode_word_indices()
            .map(|(byte_idx, word)| {
                (
                    byte_to_char[byte_idx],
                    byte_to_char[byte_idx + word.len()],
                    word.to_string(),
                )
            })
            .collect();
        UnicodeTokenizer {
            words,
            idx: 0,
            token: Token::default(),
            final_offset: 0,
        }
    }
}

impl TokenStream for UnicodeTokenizer {
    fn increment_token(&mut self) -> Result<bool> {
        if self.idx >= self.words.len() {
            return Ok(false);
        }
        let (start, end, ref word) = self.words[self.idx];
        self.token.clear();
        self.token.term = word.clone();
        self.token.start_offset = start;
        self.token.end_offset = end;
        self.idx += 1;
        Ok(true)
    }

    fn token(&self) -> &Token {
        &self.token
    }

    fn token_mut(&mut self) -> &mut Token {
        &mut self.token
    }

    fn reset(&mut self) {
        self.idx = 0;
        self.final_offset = 0;
    }

    fn end(&mut self) -> Result<()> {
        self.final_offset = self.words.last().map(|w| w.1).unwrap_or(0);
        Ok(())
    }

    fn final_offset(&self) -> u32 {
        self.final_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace_offsets() {
        let mut ts = WhitespaceTokenizer::new("the  quick brown");
        let mut seen = Vec::new();
        while ts.increment_token().unwrap() {
            let t = ts.token();
            seen.push((t.term.clone(), t.start_offset, t.end_offset));
        }
        ts.end().unwrap();
        assert_eq!(
            seen,
            vec![
                ("the".to_string(), 0, 3),
                ("quick".to_string(), 5, 10),
                ("brown".to_string(), 11, 16),
            ]
        );
        assert_eq!(ts.final_offset(), 16);
    }

    #[test]
    fn test_unicode_words() {
        let mut ts = UnicodeTokenizer::new("don't stop,now");
        let mut terms = Vec::new();
        while ts.increment_token().unwrap() {
            terms.push(ts.token().term.clone());
        }
        assert_eq!(terms, vec!["don't", "stop", "now"]);
    }
}
