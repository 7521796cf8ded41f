use std::cmp::Ordering;
use std::fmt;

/// A `(field, text)` pair, the unit of the term dictionary
///
/// Terms order lexicographically by field name first, then by text, which
/// is the order the dictionary file is written in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Term {
    pub field: String,
    pub text: String,
}

impl Term {
    pub fn new(field: impl Into<String>, text: impl Into<String>) -> Self {
        Term {
            field: field.into(),
            text: text.into(),
        }
    }
}

impl Ord for Term {
    fn cmp(&self, other: &Self) -> Ordering {
        self.field
            .cmp(&other.field)
            .then_with(|| self.text.cmp(&other.text))
    }
}

impl PartialOrd for Term {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.field, self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_orders_before_text() {
        let a = Term::new("author", "zz");
        let b = Term::new("body", "aa");
        assert!(a < b);
        assert!(Term::new("body", "aa") < Term::new("body", "ab"));
    }
}
