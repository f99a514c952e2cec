//! Metadata source contract: what a host can ask of a source, and what it hands in.

pub mod bokelai;
pub mod extract;

use std::time::Duration;

use serde::Serialize;

use crate::error::LookupError;
use crate::host::{AbortSignal, LogSink, ResultSink};
use crate::metadata::{BookUrl, Identifiers};

/// A metadata source as driven by the host. All operations block the calling thread.
pub trait MetadataSource: Send + Sync {
    /// Identifier scheme and short name, e.g. `"bokelai"`.
    fn name(&self) -> &str;

    fn info(&self) -> &SourceInfo;

    /// Find books matching `query` and push each one to `ctx.results`.
    ///
    /// Returns an error only when the lookup could not be made at all; failures
    /// on individual candidates are logged and skipped.
    fn identify(
        &self,
        ctx: &LookupContext<'_>,
        query: &IdentifyQuery,
        timeout: Duration,
    ) -> Result<(), LookupError>;

    /// Resolve a cover for `query` and push the image bytes to `ctx.results`.
    fn download_cover(
        &self,
        ctx: &LookupContext<'_>,
        query: &IdentifyQuery,
        timeout: Duration,
        best_cover_only: bool,
    );

    fn get_cached_cover_url(&self, identifiers: &Identifiers) -> Option<String>;

    fn get_book_url(&self, identifiers: &Identifiers) -> Option<BookUrl>;

    /// Recognize a URL pointing at this source and return `(scheme, id)`.
    fn id_from_url(&self, _url: &str) -> Option<(String, String)> {
        None
    }
}

/// What the host knows about a book before asking.
#[derive(Debug, Clone, Default)]
pub struct IdentifyQuery {
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub identifiers: Identifiers,
}

/// Host collaborators for one operation.
#[derive(Clone, Copy)]
pub struct LookupContext<'a> {
    pub log: &'a dyn LogSink,
    pub results: &'a dyn ResultSink,
    pub abort: &'a AbortSignal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Identify,
    Cover,
}

/// Static description of a source for the host's plugin listing.
#[derive(Debug, Clone, Serialize)]
pub struct SourceInfo {
    pub name: &'static str,
    pub author: &'static str,
    pub version: (u32, u32, u32),
    pub description: &'static str,
    pub capabilities: &'static [Capability],
    /// Metadata fields this source may fill in.
    pub touched_fields: &'static [&'static str],
    pub supports_gzip_transfer_encoding: bool,
    /// Whether a cached cover URL can be trusted without re-running identify.
    pub cached_cover_url_is_reliable: bool,
}
