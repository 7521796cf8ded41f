pub mod boolean_query;
pub mod boolean_scorer;
pub mod collector;
pub mod conjunction;
pub mod disjunction;
pub mod filter;
pub mod multi_term;
pub mod payload;
pub mod phrase_scorer;
pub mod pool;
pub mod query;
pub mod rewrite;
pub mod scorer;
pub mod searcher;
pub mod similarity;
pub mod spans;
pub mod term_scorer;

pub use collector::{
    Collector, ScoreDoc, Sort, SortField, TopDocs, TopFieldCollector, TopScoreDocCollector,
    TotalHitCountCollector,
};
pub use filter::Filter;
pub use multi_term::{MultiTermKind, MultiTermQuery, RewriteMethod};
pub use payload::{PayloadFunction, PayloadTermQuery};
pub use pool::{TaskHandle, ThreadPool};
pub use query::{
    BooleanClause, BooleanQuery, ConstantScoreInner, ConstantScoreQuery, FilteredQuery,
    MatchAllQuery, Occur, PhraseQuery, Query, TermQuery, DEFAULT_MAX_CLAUSE_COUNT,
};
pub use scorer::{drive, DocIdSetIterator, Scorer, ScorerContext, Weight, NO_MORE_DOCS};
pub use searcher::{IndexSearcher, MultiSearcher, ParallelMultiSearcher};
pub use similarity::{DefaultSimilarity, PayloadByteSimilarity, Similarity};
pub use spans::{SpanQuery, Spans};
