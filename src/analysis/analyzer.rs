use std::collections::HashSet;

use crate::analysis::filter::{LowercaseFilter, PayloadSetterFilter, StopFilter};
use crate::analysis::tokenizer::{TokenStream, UnicodeTokenizer, WhitespaceTokenizer};

/// Produces a token stream for one field's text
pub trait Analyzer: Send + Sync {
    fn token_stream(&self, field: &str, text: &str) -> Box<dyn TokenStream>;
}

/// Whitespace splitting, nothing else
pub struct WhitespaceAnalyzer;

impl Analyzer for WhitespaceAnalyzer {
    fn token_stream(&self, _field: &str, text: &str) -> Box<dyn TokenStream> {
        Box::new(WhitespaceTokenizer::new(text))
    }
}

/// Whitespace splitting plus lowercasing
pub struct SimpleAnalyzer;

impl Analyzer for SimpleAnalyzer {
    fn token_stream(&self, _field: &str, text: &str) -> Box<dyn TokenStream> {
        Box::new(LowercaseFilter::new(Box::new(WhitespaceTokenizer::new(
            text,
        ))))
    }
}

/// Unicode word boundaries plus lowercasing
pub struct StandardAnalyzer;

impl Analyzer for StandardAnalyzer {
    fn token_stream(&self, _field: &str, text: &str) -> Box<dyn TokenStream> {
        Box::new(LowercaseFilter::new(Box::new(UnicodeTokenizer::new(text))))
    }
}

/// Whitespace + lowercase + stop word removal
pub struct StopAnalyzer {
    stop_words: HashSet<String>,
    enable_position_increments: bool,
}

impl StopAnalyzer {
    pub fn new(stop_words: HashSet<String>, enable_position_increments: bool) -> Self {
        StopAnalyzer {
            stop_words,
            enable_position_increments,
        }
    }
}

impl Analyzer for StopAnalyzer {
    fn token_stream(&self, _field: &str, text: &str) -> Box<dyn TokenStream> {
        Box::new(StopFilter::new(
            Box::new(LowercaseFilter::new(Box::new(WhitespaceTokenizer::new(
                text,
            )))),
            self.stop_words.clone(),
            self.enable_position_increments,
        ))
    }
}

/// Simple analysis with a cycling payload attached to selected fields
pub struct PayloadAnalyzer {
    payload_field: String,
    payloads: Vec<Vec<u8>>,
}

impl PayloadAnalyzer {
    pub fn new(payload_field: impl Into<String>, payloads: Vec<Vec<u8>>) -> Self {
        PayloadAnalyzer {
            payload_field: payload_field.into(),
            payloads,
        }
    }
}

impl Analyzer for PayloadAnalyzer {
    fn token_stream(&self, field: &str, text: &str) -> Box<dyn TokenStream> {
        let base = Box::new(LowercaseFilter::new(Box::new(WhitespaceTokenizer::new(
            text,
        ))));
        if field == self.payload_field {
            Box::new(PayloadSetterFilter::new(base, self.payloads.clone()))
        } else {
            base
        }
    }
}
