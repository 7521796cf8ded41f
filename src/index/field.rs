use serde::{Deserialize, Serialize};

/// A stored or indexed value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Text(String),
    Bytes(Vec<u8>),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Bytes(_) => None,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            FieldValue::Text(s) => s.as_bytes(),
            FieldValue::Bytes(b) => b,
        }
    }
}

/// Per-field indexing options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FieldFlags {
    pub indexed: bool,
    pub tokenized: bool,
    pub stored: bool,
    pub store_term_vectors: bool,
    /// Positions inside stored term vectors
    pub store_positions: bool,
    /// Character offsets inside stored term vectors
    pub store_offsets: bool,
    pub omit_norms: bool,
    /// Docs-only postings: no freqs, no positions, no payloads
    pub omit_term_freq_and_positions: bool,
    /// LZ4 the stored value
    pub compressed: bool,
}

/// One named value inside a document
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub value: FieldValue,
    pub flags: FieldFlags,
    pub boost: f32,
}

impl Field {
    pub fn new(name: impl Into<String>, value: FieldValue, flags: FieldFlags) -> Self {
        Field {
            name: name.into(),
            value,
            flags,
            boost: 1.0,
        }
    }

    /// Indexed, tokenized and stored
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Field::new(
            name,
            FieldValue::Text(value.into()),
            FieldFlags {
                indexed: true,
                tokenized: true,
                stored: true,
                ..FieldFlags::default()
            },
        )
    }

    /// Indexed and tokenized, not stored
    pub fn unstored(name: impl Into<String>, value: impl Into<String>) -> Self {
        Field::new(
            name,
            FieldValue::Text(value.into()),
            FieldFlags {
                indexed: true,
                tokenized: true,
                ..FieldFlags::default()
            },
        )
    }

    /// Indexed as a single token, stored
    pub fn keyword(name: impl Into<String>, value: impl Into<String>) -> Self {
        Field::new(
            name,
            FieldValue::Text(value.into()),
            FieldFlags {
                indexed: true,
                stored: true,
                ..FieldFlags::default()
            },
        )
    }

    /// Stored only
    pub fn stored(name: impl Into<String>, value: FieldValue) -> Self {
        Field::new(
            name,
            value,
            FieldFlags {
                stored: true,
                ..FieldFlags::default()
            },
        )
    }

    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    pub fn with_term_vectors(mut self, positions: bool, offsets: bool) -> Self {
        self.flags.store_term_vectors = true;
        self.flags.store_positions = positions;
        self.flags.store_offsets = offsets;
        self
    }
}

/// An ordered sequence of fields
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub fields: Vec<Field>,
    pub boost: f32,
}

impl Document {
    pub fn new() -> Self {
        Document {
            fields: Vec::new(),
            boost: 1.0,
        }
    }

    pub fn add(&mut self, field: Field) {
        self.fields.push(field);
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn get_value(&self, name: &str) -> Option<&FieldValue> {
        self.get(name).map(|f| &f.value)
    }
}
