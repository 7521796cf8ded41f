use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use crate::core::error::{Error, Result};
use crate::index::multi_reader::IndexReader;
use crate::index::term::Term;
use crate::search::filter::{ConstantScoreWeight, Filter, FilteredWeight, MatchAllWeight};
use crate::search::multi_term::MultiTermQuery;
use crate::search::payload::PayloadTermQuery;
use crate::search::rewrite;
use crate::search::scorer::Weight;
use crate::search::searcher::IndexSearcher;
use crate::search::spans::SpanQuery;

/// Hard ceiling on boolean expansion, guarding rewrites that blow up
pub const DEFAULT_MAX_CLAUSE_COUNT: usize = 1024;

/// How a clause participates in a boolean query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Occur {
    Must,
    Should,
    MustNot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BooleanClause {
    pub query: Query,
    pub occur: Occur,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BooleanQuery {
    pub clauses: Vec<BooleanClause>,
    pub min_should_match: u32,
    pub boost: f32,
}

impl BooleanQuery {
    pub fn new() -> Self {
        BooleanQuery {
            clauses: Vec::new(),
            min_should_match: 0,
            boost: 1.0,
        }
    }

    pub fn with_must(mut self, query: Query) -> Self {
        self.clauses.push(BooleanClause {
            query,
            occur: Occur::Must,
        });
        self
    }

    pub fn with_should(mut self, query: Query) -> Self {
        self.clauses.push(BooleanClause {
            query,
            occur: Occur::Should,
        });
        self
    }

    pub fn with_must_not(mut self, query: Query) -> Self {
        self.clauses.push(BooleanClause {
            query,
            occur: Occur::MustNot,
        });
        self
    }

    pub fn with_min_should_match(mut self, n: u32) -> Self {
        self.min_should_match = n;
        self
    }

    pub fn count(&self, occur: Occur) -> usize {
        self.clauses.iter().filter(|c| c.occur == occur).count()
    }
}

impl Default for BooleanQuery {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TermQuery {
    pub term: Term,
    pub boost: f32,
}

/// Terms with explicit positions; `slop` is the allowed edit distance in
/// positions, 0 for exact phrases
#[derive(Debug, Clone, PartialEq)]
pub struct PhraseQuery {
    pub field: String,
    pub terms: Vec<String>,
    pub positions: Vec<u32>,
    pub slop: u32,
    pub boost: f32,
}

impl PhraseQuery {
    pub fn new(field: impl Into<String>) -> Self {
        PhraseQuery {
            field: field.into(),
            terms: Vec::new(),
            positions: Vec::new(),
            slop: 0,
            boost: 1.0,
        }
    }

    pub fn add(mut self, term: impl Into<String>) -> Self {
        let position = self.positions.last().map(|p| p + 1).unwrap_or(0);
        self.terms.push(term.into());
        self.positions.push(position);
        self
    }

    pub fn add_at(mut self, term: impl Into<String>, position: u32) -> Self {
        self.terms.push(term.into());
        self.positions.push(position);
        self
    }

    pub fn with_slop(mut self, slop: u32) -> Self {
        self.slop = slop;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchAllQuery {
    pub boost: f32,
}

/// What a constant-score query wraps
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantScoreInner {
    Filter(Filter),
    Query(Box<Query>),
}

/// Matches whatever the inner matches, scoring every hit the same
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantScoreQuery {
    pub inner: ConstantScoreInner,
    pub boost: f32,
}

/// Inner query intersected with a filter's doc set; scores come from the
/// query alone
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredQuery {
    pub query: Box<Query>,
    pub filter: Filter,
    pub boost: f32,
}

/// The whole query algebra as tagged variants
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Term(TermQuery),
    Phrase(PhraseQuery),
    Boolean(BooleanQuery),
    Span(SpanQuery),
    MultiTerm(MultiTermQuery),
    ConstantScore(ConstantScoreQuery),
    Filtered(FilteredQuery),
    Payload(PayloadTermQuery),
    MatchAll(MatchAllQuery),
}

impl Query {
    pub fn term(field: impl Into<String>, text: impl Into<String>) -> Query {
        Query::Term(TermQuery {
            term: Term::new(field, text),
            boost: 1.0,
        })
    }

    pub fn match_all() -> Query {
        Query::MatchAll(MatchAllQuery { boost: 1.0 })
    }

    pub fn boost(&self) -> f32 {
        match self {
            Query::Term(q) => q.boost,
            Query::Phrase(q) => q.boost,
            Query::Boolean(q) => q.boost,
            Query::Span(q) => q.boost(),
            Query::MultiTerm(q) => q.boost,
            Query::ConstantScore(q) => q.boost,
            Query::Filtered(q) => q.boost,
            Query::Payload(q) => q.boost,
            Query::MatchAll(q) => q.boost,
        }
    }

    pub fn set_boost(&mut self, boost: f32) {
        match self {
            Query::Term(q) => q.boost = boost,
            Query::Phrase(q) => q.boost = boost,
            Query::Boolean(q) => q.boost = boost,
            Query::Span(q) => q.set_boost(boost),
            Query::MultiTerm(q) => q.boost = boost,
            Query::ConstantScore(q) => q.boost = boost,
            Query::Filtered(q) => q.boost = boost,
            Query::MatchAll(q) => q.boost = boost,
            Query::Payload(q) => q.boost = boost,
        }
    }

    /// Concrete terms this query scores against, after rewrite
    pub fn extract_terms(&self, out: &mut HashSet<Term>) {
        match self {
            Query::Term(q) => {
                out.insert(q.term.clone());
            }
            Query::Phrase(q) => {
                for text in &q.terms {
                    out.insert(Term::new(q.field.clone(), text.clone()));
                }
            }
            Query::Boolean(q) => {
                for clause in &q.clauses {
                    if clause.occur != Occur::MustNot {
                        clause.query.extract_terms(out);
                    }
                }
            }
            Query::Span(q) => q.extract_terms(out),
            Query::MultiTerm(_) => {}
            Query::ConstantScore(q) => {
                if let ConstantScoreInner::Query(inner) = &q.inner {
                    inner.extract_terms(out);
                }
            }
            Query::Filtered(q) => q.query.extract_terms(out),
            Query::Payload(q) => {
                out.insert(q.term.clone());
            }
            Query::MatchAll(_) => {}
        }
    }

    /// Expands multi-term variants into an executable form; all other
    /// variants rewrite their children and otherwise return themselves
    pub fn rewrite(&self, reader: &dyn IndexReader) -> Result<Query> {
        match self {
            Query::MultiTerm(q) => rewrite::rewrite_multi_term(q, reader),
            Query::Boolean(q) => {
                let mut changed = false;
                let mut clauses = Vec::with_capacity(q.clauses.len());
                for clause in &q.clauses {
                    let rewritten = clause.query.rewrite(reader)?;
                    changed |= rewritten != clause.query;
                    clauses.push(BooleanClause {
                        query: rewritten,
                        occur: clause.occur,
                    });
                }
                // A lone positive clause collapses into its query
                if clauses.len() == 1
                    && q.min_should_match <= 1
                    && clauses[0].occur != Occur::MustNot
                {
                    let mut inner = clauses.into_iter().next().unwrap().query;
                    inner.set_boost(inner.boost() * q.boost);
                    return Ok(inner);
                }
                if changed {
                    Ok(Query::Boolean(BooleanQuery {
                        clauses,
                        min_should_match: q.min_should_match,
                        boost: q.boost,
                    }))
                } else {
                    Ok(self.clone())
                }
            }
            Query::Phrase(q) if q.terms.len() == 1 => {
                let mut term_query = Query::Term(TermQuery {
                    term: Term::new(q.field.clone(), q.terms[0].clone()),
                    boost: q.boost,
                });
                term_query.set_boost(q.boost);
                Ok(term_query)
            }
            Query::ConstantScore(q) => match &q.inner {
                ConstantScoreInner::Query(inner) => {
                    let rewritten = inner.rewrite(reader)?;
                    if rewritten == **inner {
                        Ok(self.clone())
                    } else {
                        Ok(Query::ConstantScore(ConstantScoreQuery {
                            inner: ConstantScoreInner::Query(Box::new(rewritten)),
                            boost: q.boost,
                        }))
                    }
                }
                ConstantScoreInner::Filter(_) => Ok(self.clone()),
            },
            Query::Filtered(q) => {
                let rewritten = q.query.rewrite(reader)?;
                if rewritten == *q.query {
                    Ok(self.clone())
                } else {
                    Ok(Query::Filtered(FilteredQuery {
                        query: Box::new(rewritten),
                        filter: q.filter.clone(),
                        boost: q.boost,
                    }))
                }
            }
            Query::Span(q) => {
                let rewritten = q.rewrite(reader)?;
                if &rewritten == q {
                    Ok(self.clone())
                } else {
                    Ok(Query::Span(rewritten))
                }
            }
            _ => Ok(self.clone()),
        }
    }

    pub fn create_weight(&self, searcher: &IndexSearcher) -> Result<Box<dyn Weight>> {
        match self {
            Query::Term(q) => Ok(Box::new(crate::search::term_scorer::TermWeight::new(
                searcher, &q.term, q.boost,
            )?)),
            Query::Phrase(q) => Ok(Box::new(crate::search::phrase_scorer::PhraseWeight::new(
                searcher, q,
            )?)),
            Query::Boolean(q) => Ok(Box::new(crate::search::boolean_query::BooleanWeight::new(
                searcher, q,
            )?)),
            Query::Span(q) => Ok(Box::new(crate::search::spans::SpanWeight::new(
                searcher,
                q.clone(),
                q.boost(),
            )?)),
            Query::Payload(q) => Ok(Box::new(crate::search::payload::PayloadTermWeight::new(
                searcher, q,
            )?)),
            Query::ConstantScore(q) => Ok(Box::new(ConstantScoreWeight::new(searcher, q.clone())?)),
            Query::Filtered(q) => Ok(Box::new(FilteredWeight::new(searcher, q)?)),
            Query::MatchAll(q) => Ok(Box::new(MatchAllWeight::new(q.boost))),
            Query::MultiTerm(_) => Err(Error::unsupported(
                "multi-term queries must be rewritten before weighting",
            )),
        }
    }

    /// Compact textual rendering, mainly for diagnostics
    pub fn to_query_string(&self, default_field: &str) -> String {
        fn boost_suffix(boost: f32) -> String {
            if (boost - 1.0).abs() < f32::EPSILON {
                String::new()
            } else {
                format!("^{}", boost)
            }
        }
        match self {
            Query::Term(q) => {
                if q.term.field == default_field {
                    format!("{}{}", q.term.text, boost_suffix(q.boost))
                } else {
                    format!("{}:{}{}", q.term.field, q.term.text, boost_suffix(q.boost))
                }
            }
            Query::Phrase(q) => {
                let mut out = String::new();
                if q.field != default_field {
                    out.push_str(&q.field);
                    out.push(':');
                }
                out.push('"');
                out.push_str(&q.terms.join(" "));
                out.push('"');
                if q.slop > 0 {
                    out.push_str(&format!("~{}", q.slop));
                }
                out.push_str(&boost_suffix(q.boost));
                out
            }
            Query::Boolean(q) => {
                let mut out = String::from("(");
                for (i, clause) in q.clauses.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    match clause.occur {
                        Occur::Must => out.push('+'),
                        Occur::MustNot => out.push('-'),
                        Occur::Should => {}
                    }
                    out.push_str(&clause.query.to_query_string(default_field));
                }
                out.push(')');
                out.push_str(&boost_suffix(q.boost));
                out
            }
            Query::Span(q) => q.to_query_string(default_field),
            Query::MultiTerm(q) => q.to_query_string(default_field),
            Query::ConstantScore(q) => match &q.inner {
                ConstantScoreInner::Filter(f) => {
                    format!("ConstantScore({:?}){}", f, boost_suffix(q.boost))
                }
                ConstantScoreInner::Query(inner) => format!(
                    "ConstantScore({}){}",
                    inner.to_query_string(default_field),
                    boost_suffix(q.boost)
                ),
            },
            Query::Filtered(q) => format!(
                "filtered({})->{:?}{}",
                q.query.to_query_string(default_field),
                q.filter,
                boost_suffix(q.boost)
            ),
            Query::Payload(q) => format!(
                "payload({}:{}){}",
                q.term.field,
                q.term.text,
                boost_suffix(q.boost)
            ),
            Query::MatchAll(q) => format!("*:*{}", boost_suffix(q.boost)),
        }
    }
}

fn hash_f32<H: Hasher>(state: &mut H, value: f32) {
    state.write_u32(value.to_bits());
}

impl Hash for Query {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Query::Term(q) => {
                q.term.hash(state);
                hash_f32(state, q.boost);
            }
            Query::Phrase(q) => {
                q.field.hash(state);
                q.terms.hash(state);
                q.positions.hash(state);
                q.slop.hash(state);
                hash_f32(state, q.boost);
            }
            Query::Boolean(q) => {
                for clause in &q.clauses {
                    clause.occur.hash(state);
                    clause.query.hash(state);
                }
                q.min_should_match.hash(state);
                hash_f32(state, q.boost);
            }
            Query::Span(q) => {
                // Structural hash via the rendered form keeps the
                // recursive impl in one place
                q.to_query_string("").hash(state);
                hash_f32(state, q.boost());
            }
            Query::MultiTerm(q) => {
                q.to_query_string("").hash(state);
                hash_f32(state, q.boost);
            }
            Query::ConstantScore(q) => {
                match &q.inner {
                    ConstantScoreInner::Filter(f) => format!("{:?}", f).hash(state),
                    ConstantScoreInner::Query(inner) => inner.hash(state),
                }
                hash_f32(state, q.boost);
            }
            Query::Filtered(q) => {
                q.query.hash(state);
                format!("{:?}", q.filter).hash(state);
                hash_f32(state, q.boost);
            }
            Query::Payload(q) => {
                q.term.hash(state);
                hash_f32(state, q.boost);
            }
            Query::MatchAll(q) => hash_f32(state, q.boost),
        }
    }
}
