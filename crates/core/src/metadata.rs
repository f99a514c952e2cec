use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Identifier scheme for books.com.tw catalog ids.
pub const BOKELAI_SCHEME: &str = "bokelai";
pub const ISBN_SCHEME: &str = "isbn";

/// Placeholder author used when a page yields no author names.
pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// Identifier scheme name -> value, e.g. `{"bokelai": "0010878888", "isbn": "9789571387850"}`.
pub type Identifiers = BTreeMap<String, String>;

/// Normalized metadata for one book, as handed to the host's result sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookMetadata {
    pub title: String,
    /// Never empty; falls back to [`UNKNOWN_AUTHOR`].
    pub authors: Vec<String>,
    pub publisher: Option<String>,
    pub comments: Option<String>,
    pub tags: Vec<String>,
    pub isbn: Option<String>,
    pub pubdate: Option<NaiveDate>,
    pub cover_url: Option<String>,
    pub identifiers: Identifiers,
    /// Name of the source that produced the record.
    pub source: String,
}

impl BookMetadata {
    pub fn new(title: impl Into<String>, authors: Vec<String>) -> Self {
        let authors = if authors.is_empty() {
            vec![UNKNOWN_AUTHOR.to_string()]
        } else {
            authors
        };
        Self {
            title: title.into(),
            authors,
            publisher: None,
            comments: None,
            tags: Vec::new(),
            isbn: None,
            pubdate: None,
            cover_url: None,
            identifiers: Identifiers::new(),
            source: String::new(),
        }
    }

    pub fn identifier(&self, scheme: &str) -> Option<&str> {
        self.identifiers.get(scheme).map(String::as_str)
    }

    /// Set the ISBN and mirror it into the identifier map.
    pub fn set_isbn(&mut self, isbn: impl Into<String>) {
        let isbn = isbn.into();
        self.identifiers.insert(ISBN_SCHEME.to_string(), isbn.clone());
        self.isbn = Some(isbn);
    }
}

/// Where a book lives on the source site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookUrl {
    pub source: String,
    pub id: String,
    pub url: String,
}

/// Look up a non-blank identifier value.
pub fn identifier<'a>(identifiers: &'a Identifiers, scheme: &str) -> Option<&'a str> {
    identifiers
        .get(scheme)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_defaults_empty_authors_to_unknown() {
        let mi = BookMetadata::new("書名", Vec::new());
        assert_eq!(mi.authors, vec!["Unknown".to_string()]);
    }

    #[test]
    fn set_isbn_updates_identifiers() {
        let mut mi = BookMetadata::new("Title", vec!["A".to_string()]);
        mi.set_isbn("9789571387850");
        assert_eq!(mi.isbn.as_deref(), Some("9789571387850"));
        assert_eq!(mi.identifier("isbn"), Some("9789571387850"));
    }

    #[test]
    fn blank_identifier_is_absent() {
        let mut ids = Identifiers::new();
        ids.insert("bokelai".to_string(), "  ".to_string());
        assert_eq!(identifier(&ids, "bokelai"), None);
        ids.insert("bokelai".to_string(), " 0010878888 ".to_string());
        assert_eq!(identifier(&ids, "bokelai"), Some("0010878888"));
    }
}
