pub mod analyzer;
pub mod filter;
pub mod token;
pub mod tokenizer;

pub use analyzer::{
    Analyzer, PayloadAnalyzer, SimpleAnalyzer, StandardAnalyzer, StopAnalyzer, WhitespaceAnalyzer,
};
pub use filter::{LowercaseFilter, PayloadSetterFilter, StopFilter};
pub use token::Token;
pub use tokenizer::{TokenStream, UnicodeTokenizer, WhitespaceTokenizer};
