use levenshtein_automata::{Distance, LevenshteinAutomatonBuilder, DFA};
use regex::Regex;

use crate::core::error::Result;
use crate::index::multi_reader::{IndexReader, TermIterator};
use crate::index::term::Term;

/// Default cutover point from scoring booleans to a filter
pub const DEFAULT_TERM_COUNT_CUTOFF: usize = 350;
/// As a percentage of `max_doc`
pub const DEFAULT_DOC_COUNT_PERCENT: f64 = 0.1;
/// Expansion cap for fuzzy queries
pub const DEFAULT_FUZZY_EXPANSIONS: usize = 50;

/// Strategy for turning a term pattern into an executable query
#[derive(Debug, Clone, PartialEq)]
pub enum RewriteMethod {
    /// Scoring boolean while small, constant-score filter once the
    /// enumeration crosses either cutoff
    ConstantScoreAuto {
        term_count_cutoff: usize,
        doc_count_percent: f64,
    },
    ConstantScoreFilter,
    /// Boolean of scoring term queries; errors past the clause cap
    ScoringBoolean { max_clause_count: usize },
    /// Keep only the best `size` terms by boost
    TopTermsScoringBoolean { size: usize },
    /// Like top-terms, but each term scores its boost alone
    TopTermsBoostOnly { size: usize },
}

impl Default for RewriteMethod {
    fn default() -> Self {
        RewriteMethod::ConstantScoreAuto {
            term_count_cutoff: DEFAULT_TERM_COUNT_CUTOFF,
            doc_count_percent: DEFAULT_DOC_COUNT_PERCENT,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MultiTermKind {
    Prefix {
        prefix: String,
    },
    Wildcard {
        /// `*` matches any run, `?` any single character
        pattern: String,
    },
    Regex {
        pattern: String,
    },
    Range {
        lower: Option<String>,
        upper: Option<String>,
        include_lower: bool,
        include_upper: bool,
    },
    Fuzzy {
        term: String,
        max_edits: u8,
        /// Leading characters required to match exactly
        prefix_length: u32,
    },
}

/// A query standing for the set of dictionary terms matching a pattern
#[derive(Debug, Clone, PartialEq)]
pub struct MultiTermQuery {
    pub field: String,
    pub kind: MultiTermKind,
    pub rewrite: RewriteMethod,
    pub boost: f32,
}

impl MultiTermQuery {
    pub fn prefix(field: impl Into<String>, prefix: impl Into<String>) -> Self {
        MultiTermQuery {
            field: field.into(),
            kind: MultiTermKind::Prefix {
                prefix: prefix.into(),
            },
            rewrite: RewriteMethod::default(),
            boost: 1.0,
        }
    }

    pub fn wildcard(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        MultiTermQuery {
            field: field.into(),
            kind: MultiTermKind::Wildcard {
                pattern: pattern.into(),
            },
            rewrite: RewriteMethod::default(),
            boost: 1.0,
        }
    }

    pub fn regex(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        MultiTermQuery {
            field: field.into(),
            kind: MultiTermKind::Regex {
                pattern: pattern.into(),
            },
            rewrite: RewriteMethod::default(),
            boost: 1.0,
        }
    }

    pub fn range(
        field: impl Into<String>,
        lower: Option<String>,
        upper: Option<String>,
        include_lower: bool,
        include_upper: bool,
    ) -> Self {
        MultiTermQuery {
            field: field.into(),
            kind: MultiTermKind::Range {
                lower,
                upper,
                include_lower,
                include_upper,
            },
            rewrite: RewriteMethod::default(),
            boost: 1.0,
        }
    }

    /// Fuzzy queries default to the top-terms scoring rewrite
    pub fn fuzzy(
        field: impl Into<String>,
        term: impl Into<String>,
        max_edits: u8,
        prefix_length: u32,
    ) -> Self {
        MultiTermQuery {
            field: field.into(),
            kind: MultiTermKind::Fuzzy {
                term: term.into(),
                max_edits,
                prefix_length,
            },
            rewrite: RewriteMethod::TopTermsScoringBoolean {
                size: DEFAULT_FUZZY_EXPANSIONS,
            },
            boost: 1.0,
        }
    }

    pub fn with_rewrite(mut self, rewrite: RewriteMethod) -> Self {
        self.rewrite = rewrite;
        self
    }

    /// Lower bound of a range pattern
    pub fn min(&self) -> Option<&str> {
        match &self.kind {
            MultiTermKind::Range { lower, .. } => lower.as_deref(),
            _ => None,
        }
    }

    /// Upper bound of a range pattern
    pub fn max(&self) -> Option<&str> {
        match &self.kind {
            MultiTermKind::Range { upper, .. } => upper.as_deref(),
            _ => None,
        }
    }

    pub fn to_query_string(&self, _default_field: &str) -> String {
        match &self.kind {
            MultiTermKind::Prefix { prefix } => format!("{}:{}*", self.field, prefix),
            MultiTermKind::Wildcard { pattern } => format!("{}:{}", self.field, pattern),
            MultiTermKind::Regex { pattern } => format!("{}:/{}/", self.field, pattern),
            MultiTermKind::Range {
                lower,
                upper,
                include_lower,
                include_upper,
            } => format!(
                "{}:{}{} TO {}{}",
                self.field,
                if *include_lower { "[" } else { "{" },
                lower.as_deref().unwrap_or("*"),
                upper.as_deref().unwrap_or("*"),
                if *include_upper { "]" } else { "}" },
            ),
            MultiTermKind::Fuzzy {
                term, max_edits, ..
            } => format!("{}:{}~{}", self.field, term, max_edits),
        }
    }

    /// Walks the dictionary range this pattern can touch, invoking the
    /// callback with `(term, doc_freq, boost)` for every match; the
    /// callback returns false to stop early
    pub fn visit_matching_terms<F>(&self, reader: &dyn IndexReader, mut visit: F) -> Result<()>
    where
        F: FnMut(&Term, u32, f32) -> Result<bool>,
    {
        let matcher = TermMatcher::compile(&self.kind)?;
        let start = Term::new(self.field.clone(), matcher.scan_start().to_string());
        let mut cursor = reader.terms_from(&start)?;
        loop {
            let Some(term) = cursor.term() else {
                break;
            };
            if term.field != self.field {
                break;
            }
            match matcher.check(&term.text) {
                TermMatch::Accept(boost) => {
                    let df = cursor.doc_freq();
                    let term = term.clone();
                    if !visit(&term, df, boost)? {
                        return Ok(());
                    }
                }
                TermMatch::Reject => {}
                TermMatch::Stop => break,
            }
            if !cursor.next()? {
                break;
            }
        }
        Ok(())
    }
}

enum TermMatcher {
    Prefix {
        prefix: String,
    },
    Pattern {
        literal_prefix: String,
        regex: Regex,
    },
    Range {
        lower: Option<String>,
        upper: Option<String>,
        include_lower: bool,
        include_upper: bool,
    },
    Fuzzy {
        term: String,
        prefix: String,
        max_edits: u8,
        dfa: DFA,
    },
}

enum TermMatch {
    Accept(f32),
    Reject,
    /// Past the end of the reachable range
    Stop,
}

fn wildcard_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push('^');
    for c in pattern.chars() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            c if "\\.+()[]{}|^$".contains(c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push('$');
    out
}

fn literal_prefix_of_wildcard(pattern: &str) -> String {
    pattern
        .chars()
        .take_while(|&c| c != '*' && c != '?')
        .collect()
}

impl TermMatcher {
    fn compile(kind: &MultiTermKind) -> Result<TermMatcher> {
        Ok(match kind {
            MultiTermKind::Prefix { prefix } => TermMatcher::Prefix {
                prefix: prefix.clone(),
            },
            MultiTermKind::Wildcard { pattern } => TermMatcher::Pattern {
                literal_prefix: literal_prefix_of_wildcard(pattern),
                regex: Regex::new(&wildcard_to_regex(pattern))?,
            },
            MultiTermKind::Regex { pattern } => TermMatcher::Pattern {
                literal_prefix: String::new(),
                regex: Regex::new(&format!("^(?:{})$", pattern))?,
            },
            MultiTermKind::Range {
                lower,
                upper,
                include_lower,
                include_upper,
            } => TermMatcher::Range {
                lower: lower.clone(),
                upper: upper.clone(),
                include_lower: *include_lower,
                include_upper: *include_upper,
            },
            MultiTermKind::Fuzzy {
                term,
                max_edits,
                prefix_length,
            } => {
                let prefix: String = term.chars().take(*prefix_length as usize).collect();
                let builder = LevenshteinAutomatonBuilder::new(*max_edits, true);
                TermMatcher::Fuzzy {
                    term: term.clone(),
                    prefix,
                    max_edits: *max_edits,
                    dfa: builder.build_dfa(term),
                }
            }
        })
    }

    /// First dictionary text worth scanning from
    fn scan_start(&self) -> &str {
        match self {
            TermMatcher::Prefix { prefix } => prefix,
            TermMatcher::Pattern { literal_prefix, .. } => literal_prefix,
            TermMatcher::Range { lower, .. } => lower.as_deref().unwrap_or(""),
            TermMatcher::Fuzzy { prefix, .. } => prefix,
        }
    }

    fn check(&self, text: &str) -> TermMatch {
        match self {
            TermMatcher::Prefix { prefix } => {
                if text.starts_with(prefix) {
                    TermMatch::Accept(1.0)
                } else {
                    TermMatch::Stop
                }
            }
            TermMatcher::Pattern {
                literal_prefix,
                regex,
            } => {
                if !literal_prefix.is_empty() && !text.starts_with(literal_prefix.as_str()) {
                    return TermMatch::Stop;
                }
                if regex.is_match(text) {
                    TermMatch::Accept(1.0)
                } else {
                    TermMatch::Reject
                }
            }
            TermMatcher::Range {
                lower,
                upper,
                include_lower,
                include_upper,
            } => {
                if let Some(lower) = lower {
                    let below = if *include_lower {
                        text < lower.as_str()
                    } else {
                        text <= lower.as_str()
                    };
                    if below {
                        return TermMatch::Reject;
                    }
                }
                if let Some(upper) = upper {
                    let beyond = if *include_upper {
                        text > upper.as_str()
                    } else {
                        text >= upper.as_str()
                    };
                    if beyond {
                        return TermMatch::Stop;
                    }
                }
                TermMatch::Accept(1.0)
            }
            TermMatcher::Fuzzy {
                term,
                prefix,
                max_edits,
                dfa,
            } => {
                if !prefix.is_empty() && !text.starts_with(prefix.as_str()) {
                    // Candidates sharing the prefix are contiguous once
                    // the scan has entered them
                    return if text.as_bytes() < prefix.as_bytes() {
                        TermMatch::Reject
                    } else {
                        TermMatch::Stop
                    };
                }
                match dfa.eval(text.as_bytes()) {
                    Distance::Exact(d) if d <= *max_edits => {
                        let longer = term.chars().count().max(text.chars().count()).max(1);
                        let boost = 1.0 - d as f32 / longer as f32;
                        TermMatch::Accept(boost)
                    }
                    _ => TermMatch::Reject,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_translation() {
        assert_eq!(wildcard_to_regex("th*"), "^th.*$");
        assert_eq!(wildcard_to_regex("a?c"), "^a.c$");
        assert_eq!(wildcard_to_regex("a.b*"), "^a\\.b.*$");
        assert_eq!(literal_prefix_of_wildcard("abc*def"), "abc");
        assert_eq!(literal_prefix_of_wildcard("*x"), "");
    }

    #[test]
    fn test_range_accessors_return_configured_bounds() {
        let q = MultiTermQuery::range(
            "price",
            Some("100".to_string()),
            Some("900".to_string()),
            true,
            false,
        );
        assert_eq!(q.min(), Some("100"));
        assert_eq!(q.max(), Some("900"));
    }
}
