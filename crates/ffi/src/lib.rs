//! C-ABI FFI bindings for the books.com.tw metadata source.
//!
//! Strings returned by this library are owned by it; release them with
//! `bokelai_string_free`. A null return means the call produced nothing or
//! failed; the reason is logged through `tracing`.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::sync::Arc;
use std::time::Duration;

use bokelai_core::cache::MemoryCoverCache;
use bokelai_core::config::load_config;
use bokelai_core::host::{AbortSignal, ResultQueue, TracingLog};
use bokelai_core::lookup::bokelai::Bokelai;
use bokelai_core::lookup::{IdentifyQuery, LookupContext, MetadataSource};
use bokelai_core::metadata::{Identifiers, BOKELAI_SCHEME, ISBN_SCHEME};

/// Read an optional UTF-8 argument. `Err` means the pointer was non-null but not valid UTF-8.
fn opt_str<'a>(ptr: *const c_char) -> Result<Option<&'a str>, ()> {
    if ptr.is_null() {
        return Ok(None);
    }
    let s = unsafe { CStr::from_ptr(ptr) }.to_str().map_err(|_| ())?;
    Ok(Some(s).filter(|s| !s.trim().is_empty()))
}

fn into_c_string(s: String) -> *mut c_char {
    match CString::new(s) {
        Ok(c) => c.into_raw(),
        Err(_) => std::ptr::null_mut(),
    }
}

fn source() -> Option<Bokelai> {
    let cfg = load_config();
    match Bokelai::with_http(cfg.source, Arc::new(MemoryCoverCache::new())) {
        Ok(source) => Some(source),
        Err(e) => {
            tracing::error!(error = %e, "could not create source");
            None
        }
    }
}

/// Detail page URL for a books.com.tw id, or null.
#[no_mangle]
pub extern "C" fn bokelai_book_url(id: *const c_char) -> *mut c_char {
    let Ok(Some(id)) = opt_str(id) else {
        return std::ptr::null_mut();
    };
    let Some(source) = source() else {
        return std::ptr::null_mut();
    };
    let mut identifiers = Identifiers::new();
    identifiers.insert(BOKELAI_SCHEME.to_string(), id.to_string());
    match source.get_book_url(&identifiers) {
        Some(book_url) => into_c_string(book_url.url),
        None => std::ptr::null_mut(),
    }
}

/// Run identify and return the records as a JSON array, or null if the search failed.
///
/// Every argument may be null. `authors` is a comma-separated list.
/// `timeout_secs` of 0 uses the configured timeout.
#[no_mangle]
pub extern "C" fn bokelai_identify_json(
    id: *const c_char,
    isbn: *const c_char,
    title: *const c_char,
    authors: *const c_char,
    timeout_secs: u32,
) -> *mut c_char {
    let (Ok(id), Ok(isbn), Ok(title), Ok(authors)) =
        (opt_str(id), opt_str(isbn), opt_str(title), opt_str(authors))
    else {
        return std::ptr::null_mut();
    };
    let Some(source) = source() else {
        return std::ptr::null_mut();
    };
    let query = build_query(id, isbn, title, authors);
    let timeout = match timeout_secs {
        0 => source.config().timeout(),
        secs => Duration::from_secs(u64::from(secs)),
    };
    match identify_json(&source, &query, timeout) {
        Some(json) => into_c_string(json),
        None => std::ptr::null_mut(),
    }
}

fn build_query(id: Option<&str>, isbn: Option<&str>, title: Option<&str>, authors: Option<&str>) -> IdentifyQuery {
    let mut query = IdentifyQuery {
        title: title.map(String::from),
        authors: authors
            .map(|a| a.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default(),
        identifiers: Identifiers::new(),
    };
    if let Some(id) = id {
        query.identifiers.insert(BOKELAI_SCHEME.to_string(), id.to_string());
    }
    if let Some(isbn) = isbn {
        query.identifiers.insert(ISBN_SCHEME.to_string(), isbn.to_string());
    }
    query
}

/// Records found for `query` as a JSON array; `None` if the search itself failed.
fn identify_json(source: &Bokelai, query: &IdentifyQuery, timeout: Duration) -> Option<String> {
    let log = TracingLog;
    let results = ResultQueue::new();
    let abort = AbortSignal::new();
    let ctx = LookupContext {
        log: &log,
        results: &results,
        abort: &abort,
    };
    source.identify(&ctx, query, timeout).ok()?;
    match serde_json::to_string(&results.drain_metadata()) {
        Ok(json) => Some(json),
        Err(e) => {
            tracing::error!(error = %e, "could not serialize records");
            None
        }
    }
}

/// Free a string returned by this library. Null is ignored.
#[no_mangle]
pub extern "C" fn bokelai_string_free(s: *mut c_char) {
    if s.is_null() {
        return;
    }
    drop(unsafe { CString::from_raw(s) });
}
