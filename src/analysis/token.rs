/// One token produced by analysis
///
/// `position_increment` is the gap to the previous token: 1 for adjacent
/// tokens, 0 for a synonym at the same position, larger when a filter
/// removed tokens in between.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub term: String,
    /// Start, in characters of the original input
    pub start_offset: u32,
    /// End, exclusive, in characters of the original input
    pub end_offset: u32,
    pub position_increment: u32,
    pub token_type: &'static str,
    pub payload: Option<Vec<u8>>,
}

pub const TOKEN_TYPE_WORD: &str = "word";

impl Token {
    pub fn new(term: String, start_offset: u32, end_offset: u32) -> Self {
        Token {
            term,
            start_offset,
            end_offset,
            position_increment: 1,
            token_type: TOKEN_TYPE_WORD,
            payload: None,
        }
    }

    /// Resets everything but keeps allocations reusable
    pub fn clear(&mut self) {
        self.term.clear();
        self.start_offset = 0;
        self.end_offset = 0;
        self.position_increment = 1;
        self.token_type = TOKEN_TYPE_WORD;
        self.payload = None;
    }
}

impl Default for Token {
    fn default() -> Self {
        Token::new(String::new(), 0, 0)
    }
}
