use std::cmp::Reverse;
use std::collections::BinaryHeap;

use log::debug;

use crate::core::error::{Error, Result};
use crate::index::multi_reader::IndexReader;
use crate::index::term::Term;
use crate::search::filter::Filter;
use crate::search::multi_term::{MultiTermQuery, RewriteMethod};
use crate::search::query::{
    BooleanClause, BooleanQuery, ConstantScoreInner, ConstantScoreQuery, Occur, Query, TermQuery,
};
use crate::search::spans::{SpanOrQuery, SpanQuery, SpanTermQuery};

/// Candidate term kept by a top-terms heap, worst at the root
struct RankedTerm {
    boost: f32,
    term: Term,
}

impl PartialEq for RankedTerm {
    fn eq(&self, other: &Self) -> bool {
        self.boost == other.boost && self.term == other.term
    }
}
impl Eq for RankedTerm {}
impl PartialOrd for RankedTerm {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for RankedTerm {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Higher boost ranks higher; ties prefer the earlier term
        self.boost
            .total_cmp(&other.boost)
            .then_with(|| other.term.cmp(&self.term))
    }
}

fn collect_all(q: &MultiTermQuery, reader: &dyn IndexReader) -> Result<Vec<(Term, f32)>> {
    let mut terms = Vec::new();
    q.visit_matching_terms(reader, |term, _df, boost| {
        terms.push((term.clone(), boost));
        Ok(true)
    })?;
    Ok(terms)
}

fn top_terms(q: &MultiTermQuery, reader: &dyn IndexReader, size: usize) -> Result<Vec<(Term, f32)>> {
    let mut heap: BinaryHeap<Reverse<RankedTerm>> = BinaryHeap::with_capacity(size + 1);
    q.visit_matching_terms(reader, |term, _df, boost| {
        heap.push(Reverse(RankedTerm {
            boost,
            term: term.clone(),
        }));
        if heap.len() > size {
            heap.pop();
        }
        Ok(true)
    })?;
    let mut kept: Vec<(Term, f32)> = heap
        .into_iter()
        .map(|Reverse(rt)| (rt.term, rt.boost))
        .collect();
    kept.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(kept)
}

fn scoring_boolean(q: &MultiTermQuery, terms: Vec<(Term, f32)>) -> Query {
    let mut boolean = BooleanQuery::new();
    for (term, term_boost) in terms {
        boolean.clauses.push(BooleanClause {
            query: Query::Term(TermQuery {
                term,
                boost: term_boost,
            }),
            occur: Occur::Should,
        });
    }
    boolean.boost = q.boost;
    Query::Boolean(boolean)
}

fn filter_form(q: &MultiTermQuery) -> Query {
    Query::ConstantScore(ConstantScoreQuery {
        inner: ConstantScoreInner::Filter(Filter::MultiTerm(Box::new(q.clone()))),
        boost: q.boost,
    })
}

/// Expands a multi-term query per its rewrite method
pub fn rewrite_multi_term(q: &MultiTermQuery, reader: &dyn IndexReader) -> Result<Query> {
    match &q.rewrite {
        RewriteMethod::ScoringBoolean { max_clause_count } => {
            let terms = collect_all(q, reader)?;
            if terms.len() > *max_clause_count {
                return Err(Error::invalid_argument(format!(
                    "{} expands to {} clauses, over the {} cap",
                    q.to_query_string(""),
                    terms.len(),
                    max_clause_count
                )));
            }
            Ok(scoring_boolean(q, terms))
        }
        RewriteMethod::TopTermsScoringBoolean { size } => {
            let terms = top_terms(q, reader, *size)?;
            Ok(scoring_boolean(q, terms))
        }
        RewriteMethod::TopTermsBoostOnly { size } => {
            let terms = top_terms(q, reader, *size)?;
            let mut boolean = BooleanQuery::new();
            for (term, term_boost) in terms {
                boolean.clauses.push(BooleanClause {
                    query: Query::ConstantScore(ConstantScoreQuery {
                        inner: ConstantScoreInner::Filter(Filter::Term(term)),
                        boost: term_boost,
                    }),
                    occur: Occur::Should,
                });
            }
            boolean.boost = q.boost;
            Ok(Query::Boolean(boolean))
        }
        RewriteMethod::ConstantScoreFilter => Ok(filter_form(q)),
        RewriteMethod::ConstantScoreAuto {
            term_count_cutoff,
            doc_count_percent,
        } => {
            let doc_cutoff = (reader.max_doc() as f64 * doc_count_percent / 100.0) as u64;
            let mut terms = Vec::new();
            let mut docs_visited = 0u64;
            let mut overflowed = false;
            q.visit_matching_terms(reader, |term, df, boost| {
                terms.push((term.clone(), boost));
                docs_visited += df as u64;
                if terms.len() > *term_count_cutoff || docs_visited > doc_cutoff {
                    overflowed = true;
                    return Ok(false);
                }
                Ok(true)
            })?;
            if overflowed {
                debug!(
                    "auto rewrite of {} fell back to filter ({} terms, {} docs)",
                    q.to_query_string(""),
                    terms.len(),
                    docs_visited
                );
                return Ok(filter_form(q));
            }
            let boolean = scoring_boolean(q, terms);
            Ok(Query::ConstantScore(ConstantScoreQuery {
                inner: ConstantScoreInner::Query(Box::new(boolean)),
                boost: q.boost,
            }))
        }
    }
}

/// Span variant: expands into `SpanOr` of `SpanTerm` so the result can
/// nest inside other span queries
pub fn rewrite_multi_term_span(
    q: &MultiTermQuery,
    reader: &dyn IndexReader,
) -> Result<SpanQuery> {
    let terms = match &q.rewrite {
        RewriteMethod::TopTermsScoringBoolean { size }
        | RewriteMethod::TopTermsBoostOnly { size } => top_terms(q, reader, *size)?,
        _ => collect_all(q, reader)?,
    };
    let clauses = terms
        .into_iter()
        .map(|(term, term_boost)| {
            SpanQuery::Term(SpanTermQuery {
                term,
                boost: term_boost,
            })
        })
        .collect();
    Ok(SpanQuery::Or(SpanOrQuery {
        clauses,
        boost: q.boost,
    }))
}
