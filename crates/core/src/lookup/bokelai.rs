//! books.com.tw (博客來) metadata source.
//!
//! Identify goes straight to the detail page when a `bokelai` id is known,
//! otherwise searches by ISBN or by title and authors and reads the detail page
//! of every hit. Covers are resolved through the host's cover URL cache, which
//! detail retrieval fills in.

use std::sync::Arc;
use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::cache::CoverUrlCache;
use crate::config::SourceConfig;
use crate::error::LookupError;
use crate::host::{LogSink, ResultQueue, SourceResult};
use crate::http::{Fetcher, HttpFetcher};
use crate::lookup::extract::{self, DetailPage};
use crate::lookup::{Capability, IdentifyQuery, LookupContext, MetadataSource, SourceInfo};
use crate::metadata::{identifier, BookMetadata, BookUrl, Identifiers, BOKELAI_SCHEME, ISBN_SCHEME};
use crate::rank::{Ranker, RelevanceRanker};

pub const SOURCE_NAME: &str = BOKELAI_SCHEME;

pub static INFO: SourceInfo = SourceInfo {
    name: "Bokelai Books.com.tw",
    author: "SamLangTen",
    version: (1, 0, 0),
    description: "Download metadata and cover from books.com.tw. \
                  Useful only for books published in Hong Kong and Taiwan. \
                  Not compatible with books published in Mainland China.",
    capabilities: &[Capability::Identify, Capability::Cover],
    touched_fields: &[
        "title",
        "authors",
        "tags",
        "publisher",
        "comments",
        "pubdate",
        "identifier:isbn",
        "identifier:bokelai",
    ],
    supports_gzip_transfer_encoding: true,
    cached_cover_url_is_reliable: true,
};

/// Characters escaped when the search terms are placed in a URL path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

pub struct Bokelai {
    config: SourceConfig,
    fetcher: Arc<dyn Fetcher>,
    cache: Arc<dyn CoverUrlCache>,
    ranker: Arc<dyn Ranker>,
}

impl Bokelai {
    pub fn new(config: SourceConfig, fetcher: Arc<dyn Fetcher>, cache: Arc<dyn CoverUrlCache>) -> Self {
        Self {
            config,
            fetcher,
            cache,
            ranker: Arc::new(RelevanceRanker),
        }
    }

    /// Use the real network with the configured user agent.
    pub fn with_http(config: SourceConfig, cache: Arc<dyn CoverUrlCache>) -> Result<Self, LookupError> {
        let fetcher = HttpFetcher::new(&config.user_agent)?;
        Ok(Self::new(config, Arc::new(fetcher), cache))
    }

    pub fn with_ranker(mut self, ranker: Arc<dyn Ranker>) -> Self {
        self.ranker = ranker;
        self
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    pub fn detail_url(&self, id: &str) -> String {
        self.config.detail_url.replace("{id}", id)
    }

    pub fn query_url(&self, terms: &str) -> String {
        let encoded = utf8_percent_encode(terms, PATH_SEGMENT).to_string();
        self.config.query_url.replace("{query}", &encoded)
    }

    /// Search terms for a query without a site id: the ISBN, else title and
    /// authors joined by the configured separator (empty by default).
    pub fn search_terms(&self, query: &IdentifyQuery) -> Option<String> {
        let isbn = identifier(&query.identifiers, ISBN_SCHEME)
            .map(|isbn| isbn.chars().filter(|c| *c != '-' && !c.is_whitespace()).collect::<String>())
            .filter(|isbn| !isbn.is_empty());
        if isbn.is_some() {
            return isbn;
        }
        let terms = query
            .title
            .iter()
            .chain(query.authors.iter())
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(&self.config.query_separator);
        (!terms.is_empty()).then_some(terms)
    }

    /// Fetch and parse one detail page, pushing a record on success.
    ///
    /// Failures are logged, never returned: one bad candidate must not stop the others.
    pub fn retrieve_detail(&self, id: &str, ctx: &LookupContext<'_>, timeout: Duration) {
        let url = self.detail_url(id);
        let raw = match self.fetcher.fetch(&url, timeout) {
            Ok(raw) => raw,
            Err(e) => {
                ctx.log.exception(&format!("Failed to load detail page: {url}"), &e);
                return;
            }
        };

        let page = match extract::parse_detail_page(&String::from_utf8_lossy(&raw), id) {
            Ok(page) => page,
            Err(e) => {
                ctx.log.exception(&format!("Failed to parse detail page: {url}"), &e);
                return;
            }
        };

        let mi = self.to_metadata(id, page, ctx.log);
        if let Some(cover) = &mi.cover_url {
            self.cache.set(id, cover);
        }
        tracing::debug!(id, title = %mi.title, "parsed detail page");
        ctx.results.put(SourceResult::Metadata(mi));
    }

    fn to_metadata(&self, id: &str, page: DetailPage, log: &dyn LogSink) -> BookMetadata {
        let mut mi = BookMetadata::new(page.title, page.authors);
        mi.source = SOURCE_NAME.to_string();
        mi.identifiers.insert(BOKELAI_SCHEME.to_string(), id.to_string());
        if let Some(isbn) = page.isbn {
            mi.set_isbn(isbn);
        }
        mi.publisher = page.publisher;
        mi.comments = page.comments;
        mi.tags = page.tags;
        mi.cover_url = page.cover_url;

        if let Some(raw) = page.date_published {
            match extract::parse_pubdate(&raw) {
                Ok(date) => mi.pubdate = Some(date),
                Err(e) => log.error(&format!("Failed to parse pubdate for {id}: {e}")),
            }
        }
        mi
    }

    /// Run identify into a private queue and take the cached cover of the best-ranked hit.
    fn resolve_cover_url(&self, ctx: &LookupContext<'_>, query: &IdentifyQuery, timeout: Duration) -> Option<String> {
        ctx.log.info("No cached cover found, running identify");
        let queue = ResultQueue::new();
        let private = LookupContext {
            log: ctx.log,
            results: &queue,
            abort: ctx.abort,
        };
        // A failed search has already been logged by identify.
        self.identify(&private, query, timeout).ok()?;

        let mut records = queue.drain_metadata();
        self.ranker.sort(&mut records, query);
        records
            .iter()
            .find_map(|mi| self.get_cached_cover_url(&mi.identifiers))
    }
}

impl MetadataSource for Bokelai {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn info(&self) -> &SourceInfo {
        &INFO
    }

    fn identify(
        &self,
        ctx: &LookupContext<'_>,
        query: &IdentifyQuery,
        timeout: Duration,
    ) -> Result<(), LookupError> {
        if let Some(id) = identifier(&query.identifiers, BOKELAI_SCHEME) {
            self.retrieve_detail(id, ctx, timeout);
            return Ok(());
        }

        let Some(terms) = self.search_terms(query) else {
            ctx.log.error("No result found: no id, ISBN, title or authors to search for");
            return Ok(());
        };

        let search_url = self.query_url(&terms);
        let raw = match self.fetcher.fetch(&search_url, timeout) {
            Ok(raw) => raw,
            Err(e) => {
                ctx.log.exception(&format!("Failed to make identify query: {search_url}"), &e);
                return Err(e);
            }
        };

        let candidates = extract::parse_query_page(&String::from_utf8_lossy(&raw));
        if candidates.is_empty() {
            ctx.log.error(&format!("No result found. query: {search_url}"));
            return Ok(());
        }
        tracing::debug!(count = candidates.len(), query = %terms, "search candidates");

        for id in &candidates {
            if ctx.abort.is_set() {
                ctx.log.info("Identify aborted");
                break;
            }
            self.retrieve_detail(id, ctx, timeout);
        }
        Ok(())
    }

    fn download_cover(
        &self,
        ctx: &LookupContext<'_>,
        query: &IdentifyQuery,
        timeout: Duration,
        _best_cover_only: bool,
    ) {
        if ctx.abort.is_set() {
            return;
        }

        let cover_url = self
            .get_cached_cover_url(&query.identifiers)
            .or_else(|| self.resolve_cover_url(ctx, query, timeout));
        let Some(cover_url) = cover_url else {
            ctx.log.info("No cover found");
            return;
        };
        if ctx.abort.is_set() {
            return;
        }

        ctx.log.info(&format!("Downloading cover from: {cover_url}"));
        match self.fetcher.fetch(&cover_url, timeout) {
            Ok(data) => ctx.results.put(SourceResult::Cover {
                source: SOURCE_NAME.to_string(),
                data,
            }),
            Err(e) => ctx.log.exception(&format!("Failed to download cover from: {cover_url}"), &e),
        }
    }

    fn get_cached_cover_url(&self, identifiers: &Identifiers) -> Option<String> {
        identifier(identifiers, BOKELAI_SCHEME).and_then(|id| self.cache.get(id))
    }

    fn get_book_url(&self, identifiers: &Identifiers) -> Option<BookUrl> {
        identifier(identifiers, BOKELAI_SCHEME).map(|id| BookUrl {
            source: SOURCE_NAME.to_string(),
            id: id.to_string(),
            url: self.detail_url(id),
        })
    }

    fn id_from_url(&self, url: &str) -> Option<(String, String)> {
        let prefix = self.config.detail_url.split("{id}").next()?;
        let rest = strip_scheme(url.trim()).strip_prefix(strip_scheme(prefix))?;
        let end = rest
            .find(|c| matches!(c, '?' | '/' | '#' | '&'))
            .unwrap_or(rest.len());
        let id = &rest[..end];
        (!id.is_empty()).then(|| (SOURCE_NAME.to_string(), id.to_string()))
    }
}

fn strip_scheme(url: &str) -> &str {
    url.strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url)
}
