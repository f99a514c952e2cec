//! Relevance ranking of identify results against the original query.

use unicode_normalization::UnicodeNormalization;

use crate::lookup::IdentifyQuery;
use crate::metadata::{identifier, BookMetadata, ISBN_SCHEME};

pub trait Ranker: Send + Sync {
    /// Sort `records` best match first. Must be stable so page order breaks ties.
    fn sort(&self, records: &mut [BookMetadata], query: &IdentifyQuery);
}

/// Ranks by ISBN match, cover presence, title similarity, matched authors, then comment length.
#[derive(Debug, Default, Clone, Copy)]
pub struct RelevanceRanker;

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct RankKey {
    isbn_match: bool,
    has_cover: bool,
    /// Title similarity in thousandths.
    title_score: u32,
    authors_matched: usize,
    comments_len: usize,
}

impl RelevanceRanker {
    fn key(&self, mi: &BookMetadata, query: &IdentifyQuery) -> RankKey {
        let query_isbn = identifier(&query.identifiers, ISBN_SCHEME).map(normalize_isbn);
        let isbn_match = match (&query_isbn, &mi.isbn) {
            (Some(q), Some(isbn)) => *q == normalize_isbn(isbn),
            _ => false,
        };

        let title_score = query
            .title
            .as_deref()
            .map(|t| strsim::normalized_levenshtein(&normalize_text(t), &normalize_text(&mi.title)))
            .map(|sim| (sim * 1000.0).round() as u32)
            .unwrap_or(0);

        let authors: Vec<String> = mi.authors.iter().map(|a| normalize_text(a)).collect();
        let authors_matched = query
            .authors
            .iter()
            .map(|a| normalize_text(a))
            .filter(|a| !a.is_empty() && authors.iter().any(|b| b == a))
            .count();

        RankKey {
            isbn_match,
            has_cover: mi.cover_url.is_some(),
            title_score,
            authors_matched,
            comments_len: mi.comments.as_deref().map(|c| c.chars().count()).unwrap_or(0),
        }
    }
}

impl Ranker for RelevanceRanker {
    fn sort(&self, records: &mut [BookMetadata], query: &IdentifyQuery) {
        records.sort_by_cached_key(|mi| std::cmp::Reverse(self.key(mi, query)));
    }
}

/// NFKC (folds full-width forms), lowercase, whitespace removed.
fn normalize_text(s: &str) -> String {
    s.nfkc()
        .flat_map(char::to_lowercase)
        .filter(|c| !c.is_whitespace())
        .collect()
}

fn normalize_isbn(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_alphanumeric()).collect::<String>().to_ascii_uppercase()
}
