//! books.com.tw page extraction: detail page (JSON-LD + HTML) and search result page.
//!
//! Pure functions over page text. The selectors and JSON paths here are the
//! whole contract with the site's markup.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use serde_json_path::JsonPath;

use crate::error::LookupError;

/// Label in front of the classification links on a detail page ("book classification:").
pub const CLASSIFICATION_LABEL: &str = "本書分類：";

/// Day used when a publication date has no usable day part.
pub const DEFAULT_PUB_DAY: u32 = 15;

struct PageSelectors {
    json_ld: Selector,
    content: Selector,
    list_item: Selector,
    anchor: Selector,
    result_image_link: Selector,
}

static SELECTORS: LazyLock<PageSelectors> = LazyLock::new(|| PageSelectors {
    json_ld: Selector::parse(r#"script[type="application/ld+json"]"#).unwrap(),
    content: Selector::parse(".content").unwrap(),
    list_item: Selector::parse("li").unwrap(),
    anchor: Selector::parse("a").unwrap(),
    result_image_link: Selector::parse(r#"form#searchlist a[rel~="mid_image"]"#).unwrap(),
});

struct JsonLdPaths {
    name: JsonPath,
    author: JsonPath,
    publisher: JsonPath,
    isbn: JsonPath,
    date_published: JsonPath,
    image: JsonPath,
}

static PATHS: LazyLock<JsonLdPaths> = LazyLock::new(|| JsonLdPaths {
    name: JsonPath::parse("$.name").unwrap(),
    author: JsonPath::parse("$.author[0].name").unwrap(),
    publisher: JsonPath::parse("$.publisher[0].name").unwrap(),
    isbn: JsonPath::parse("$.workExample.workExample.isbn").unwrap(),
    date_published: JsonPath::parse("$.datePublished").unwrap(),
    image: JsonPath::parse("$.image").unwrap(),
});

/// Raw fields scraped from one detail page, before normalization into metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailPage {
    pub title: String,
    /// May be empty; the caller substitutes a placeholder.
    pub authors: Vec<String>,
    pub publisher: Option<String>,
    pub isbn: Option<String>,
    /// Unparsed `datePublished`.
    pub date_published: Option<String>,
    pub comments: Option<String>,
    pub tags: Vec<String>,
    pub cover_url: Option<String>,
}

/// Parse a detail page for book `id`.
///
/// Fails only when the JSON-LD block is missing or unusable, or has no title.
/// Every other field is optional.
pub fn parse_detail_page(html: &str, id: &str) -> Result<DetailPage, LookupError> {
    let doc = Html::parse_document(html);
    let s = &*SELECTORS;

    let script = doc.select(&s.json_ld).next().ok_or(LookupError::MissingJsonLd)?;
    let info = parse_json_ld(&script.text().collect::<String>())?;
    let p = &*PATHS;

    let title = string_at(&p.name, &info).ok_or(LookupError::MissingField("name"))?;
    let authors = string_at(&p.author, &info)
        .map(|a| split_authors(&a))
        .unwrap_or_default();

    let cover_url = p
        .image
        .query(&info)
        .first()
        .and_then(|v| match v {
            Value::Array(items) => items.iter().find_map(Value::as_str),
            other => other.as_str(),
        })
        .and_then(|image| find_cover_url(image, id));

    Ok(DetailPage {
        title,
        authors,
        publisher: string_at(&p.publisher, &info),
        isbn: string_at(&p.isbn, &info),
        date_published: string_at(&p.date_published, &info),
        comments: extract_comments(&doc),
        tags: extract_tags(&doc),
        cover_url,
    })
}

fn parse_json_ld(text: &str) -> Result<Value, LookupError> {
    // The site emits raw line breaks inside string values, which strict JSON rejects.
    let cleaned: String = text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    let value: Value =
        serde_json::from_str(cleaned.trim()).map_err(|e| LookupError::MalformedJsonLd(e.to_string()))?;
    let not_object = || LookupError::MalformedJsonLd("expected an object".to_string());
    match value {
        Value::Object(_) => Ok(value),
        Value::Array(items) => items.into_iter().find(Value::is_object).ok_or_else(not_object),
        _ => Err(not_object()),
    }
}

fn string_at(path: &JsonPath, value: &Value) -> Option<String> {
    let s = match path.query(value).first()? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

fn extract_comments(doc: &Html) -> Option<String> {
    let content = doc.select(&SELECTORS.content).next()?;
    let text = content
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    (!text.is_empty()).then_some(text)
}

fn extract_tags(doc: &Html) -> Vec<String> {
    let s = &*SELECTORS;
    let anchors: Vec<String> = doc
        .select(&s.list_item)
        .filter(has_classification_label)
        .flat_map(|li| li.select(&s.anchor).map(|a| a.text().collect::<String>()))
        .collect();
    split_tags(anchors.iter().map(String::as_str))
}

fn has_classification_label(li: &ElementRef<'_>) -> bool {
    li.children()
        .filter_map(|n| n.value().as_text())
        .any(|t| t.contains(CLASSIFICATION_LABEL))
}

/// `"A,B, C"` -> `["A", "B", "C"]`. Blank entries are dropped.
pub fn split_authors(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(String::from)
        .collect()
}

/// Split each classification label on `／` or `/` and flatten, keeping first occurrences.
pub fn split_tags<'a>(labels: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for label in labels {
        for tag in label.split(['／', '/']).map(str::trim).filter(|t| !t.is_empty()) {
            if !tags.iter().any(|t| t == tag) {
                tags.push(tag.to_string());
            }
        }
    }
    tags
}

/// Parse `YYYY/MM/DD`. A missing or unusable day becomes the 15th.
pub fn parse_pubdate(raw: &str) -> Result<NaiveDate, LookupError> {
    let invalid = || LookupError::InvalidDate(raw.to_string());
    let mut parts = raw.trim().split(['/', '-']);

    let year: i32 = parts.next().and_then(|y| y.trim().parse().ok()).ok_or_else(invalid)?;
    let month: u32 = parts.next().and_then(|m| m.trim().parse().ok()).ok_or_else(invalid)?;
    let day = parts.next().and_then(|d| {
        let digits: String = d.trim().chars().take_while(char::is_ascii_digit).collect();
        digits.parse::<u32>().ok()
    });

    day.and_then(|d| NaiveDate::from_ymd_opt(year, month, d))
        .or_else(|| NaiveDate::from_ymd_opt(year, month, DEFAULT_PUB_DAY))
        .ok_or_else(invalid)
}

/// First run of characters other than `?`, `=`, `&` in `image` that contains `id`.
///
/// Cover links on the site are wrapped in a resizing proxy
/// (`getImage?i=<real url>&v=...`), so this picks out the real URL.
pub fn find_cover_url(image: &str, id: &str) -> Option<String> {
    if id.is_empty() {
        return None;
    }
    let re = Regex::new(&format!("[^?=&]*{}[^?=&]*", regex::escape(id))).ok()?;
    re.find(image).map(|m| m.as_str().to_string())
}

/// Candidate book ids from a search result page, in page order without duplicates.
pub fn parse_query_page(html: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    let mut ids: Vec<String> = Vec::new();
    for link in doc.select(&SELECTORS.result_image_link) {
        let Some(id) = link.value().attr("href").and_then(id_from_item_href) else {
            continue;
        };
        if !ids.iter().any(|known| known == id) {
            ids.push(id.to_string());
        }
    }
    ids
}

fn id_from_item_href(href: &str) -> Option<&str> {
    let start = href.find("item/")? + "item/".len();
    let rest = &href[start..];
    let end = rest
        .find(|c| matches!(c, '/' | '?' | '#' | '&'))
        .unwrap_or(rest.len());
    Some(&rest[..end]).filter(|id| !id.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn detail_html(json_ld: &str, body: &str) -> String {
        format!(
            r#"<html><head><script type="application/ld+json">{json_ld}</script></head><body>{body}</body></html>"#
        )
    }

    const FULL_JSON_LD: &str = r#"{
        "@context": "https://schema.org",
        "@type": "Book",
        "name": "被討厭的勇氣",
        "author": [{"@type": "Person", "name": "岸見一郎,古賀史健"}],
        "publisher": [{"@type": "Organization", "name": "究竟"}],
        "datePublished": "2014/10/30",
        "image": "https://im2.book.com.tw/image/getImage?i=https://www.books.com.tw/img/001/065/31/0010653153.jpg&v=5447b4d8&w=348&h=348",
        "workExample": {"@type": "Book", "workExample": {"@type": "Book", "isbn": "9789861371955"}}
    }"#;

    const FULL_BODY: &str = r#"
        <div class="type02_p003"><ul>
          <li>本書分類：<a href="/web/books_bmidm_0101">心理勵志</a>&gt; <a href="/web/books_bmidm_0103">自我成長／人生哲學</a></li>
          <li>規格：平裝 / 336頁</li>
        </ul></div>
        <div class="content">
          <p>這是一本關於勇氣的書。</p>
          <p>第二段。</p>
        </div>
    "#;

    #[test]
    fn parses_full_detail_page() {
        let page = parse_detail_page(&detail_html(FULL_JSON_LD, FULL_BODY), "0010653153").unwrap();
        assert_eq!(page.title, "被討厭的勇氣");
        assert_eq!(page.authors, vec!["岸見一郎", "古賀史健"]);
        assert_eq!(page.publisher.as_deref(), Some("究竟"));
        assert_eq!(page.isbn.as_deref(), Some("9789861371955"));
        assert_eq!(page.date_published.as_deref(), Some("2014/10/30"));
        assert_eq!(page.comments.as_deref(), Some("這是一本關於勇氣的書。\n第二段。"));
        assert_eq!(page.tags, vec!["心理勵志", "自我成長", "人生哲學"]);
        assert_eq!(
            page.cover_url.as_deref(),
            Some("https://www.books.com.tw/img/001/065/31/0010653153.jpg")
        );
    }

    #[test]
    fn missing_json_ld_is_an_error() {
        let err = parse_detail_page("<html><body><p>nothing</p></body></html>", "1").unwrap_err();
        assert!(matches!(err, LookupError::MissingJsonLd));
    }

    #[test]
    fn malformed_json_ld_is_an_error() {
        let err = parse_detail_page(&detail_html("{ not json", ""), "1").unwrap_err();
        assert!(matches!(err, LookupError::MalformedJsonLd(_)));
    }

    #[test]
    fn missing_title_is_an_error() {
        let err = parse_detail_page(&detail_html(r#"{"author": []}"#, ""), "1").unwrap_err();
        assert!(matches!(err, LookupError::MissingField("name")));
    }

    #[test]
    fn optional_fields_may_be_absent() {
        let page = parse_detail_page(&detail_html(r#"{"name": "Only a title"}"#, ""), "1").unwrap();
        assert_eq!(page.title, "Only a title");
        assert!(page.authors.is_empty());
        assert_eq!(page.publisher, None);
        assert_eq!(page.isbn, None);
        assert_eq!(page.date_published, None);
        assert_eq!(page.comments, None);
        assert!(page.tags.is_empty());
        assert_eq!(page.cover_url, None);
    }

    #[test]
    fn raw_newlines_inside_json_strings_are_tolerated() {
        let json = "{\"name\": \"Line one\nline two\"}";
        let page = parse_detail_page(&detail_html(json, ""), "1").unwrap();
        assert_eq!(page.title, "Line one line two");
    }

    #[test]
    fn split_authors_on_commas() {
        assert_eq!(split_authors("A,B,C"), vec!["A", "B", "C"]);
        assert_eq!(split_authors(" A , B "), vec!["A", "B"]);
        assert!(split_authors("").is_empty());
    }

    #[test]
    fn split_tags_on_both_slashes() {
        assert_eq!(
            split_tags(["Fiction／Drama", "Romance"]),
            vec!["Fiction", "Drama", "Romance"]
        );
        assert_eq!(split_tags(["A/B", "B／C", " "]), vec!["A", "B", "C"]);
    }

    #[test]
    fn classification_label_must_be_in_item_text() {
        let html = detail_html(
            r#"{"name": "x"}"#,
            r#"<ul><li>規格：<a>不是分類</a></li><li>本書分類：<a>Fiction／Drama</a><a>Romance</a></li></ul>"#,
        );
        let page = parse_detail_page(&html, "1").unwrap();
        assert_eq!(page.tags, vec!["Fiction", "Drama", "Romance"]);
    }

    #[test]
    fn pubdate_full() {
        let d = parse_pubdate("2020/05/03").unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2020, 5, 3).unwrap());
    }

    #[test]
    fn pubdate_day_defaults_to_fifteen() {
        assert_eq!(parse_pubdate("2020/05").unwrap(), NaiveDate::from_ymd_opt(2020, 5, 15).unwrap());
        assert_eq!(parse_pubdate("2020/05/xx").unwrap(), NaiveDate::from_ymd_opt(2020, 5, 15).unwrap());
        assert_eq!(parse_pubdate("2021/02/30").unwrap(), NaiveDate::from_ymd_opt(2021, 2, 15).unwrap());
    }

    #[test]
    fn pubdate_malformed() {
        assert!(matches!(parse_pubdate("not a date"), Err(LookupError::InvalidDate(_))));
        assert!(parse_pubdate("2020/13/01").is_err());
        assert!(parse_pubdate("").is_err());
    }

    #[test]
    fn cover_url_requires_id() {
        let image = "https://im2.book.com.tw/image/getImage?i=https://www.books.com.tw/img/001/087/88/0010878888.jpg&v=1";
        assert_eq!(
            find_cover_url(image, "0010878888").as_deref(),
            Some("https://www.books.com.tw/img/001/087/88/0010878888.jpg")
        );
        assert_eq!(find_cover_url(image, "0019999999"), None);
        assert_eq!(find_cover_url(image, ""), None);
    }

    #[test]
    fn query_page_ids_in_order() {
        let html = r#"<html><body>
            <form id="searchlist" name="searchlist">
              <a rel="mid_image" href="https://search.books.com.tw/redirect/move/key/x/area/mid/item/0010878888/page/1/idx/1/cat/001/pdf/1/spell/3"><img></a>
              <a rel="mid_name" href="https://search.books.com.tw/redirect/move/key/x/area/mid/item/0010878888/page/1/idx/1">name</a>
              <a rel="mid_image" href="//search.books.com.tw/redirect/move/key/x/item/E050012345?x=1"><img></a>
              <a rel="mid_image" href="https://search.books.com.tw/redirect/move/key/x/item/0010878888/page/1"><img></a>
              <a rel="mid_image" href="https://www.books.com.tw/products/0010000000"><img></a>
            </form>
            <a rel="mid_image" href="https://search.books.com.tw/item/0099999999/">outside form</a>
        </body></html>"#;
        assert_eq!(parse_query_page(html), vec!["0010878888", "E050012345"]);
    }

    #[test]
    fn empty_query_page_has_no_ids() {
        let html = r#"<html><body><form id="searchlist"><p>查無資料</p></form></body></html>"#;
        assert!(parse_query_page(html).is_empty());
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn pubdate_never_panics(raw in ".{0,24}") {
                let _ = parse_pubdate(&raw);
            }

            #[test]
            fn pubdate_valid_year_month_always_parses(y in 1900i32..2100, m in 1u32..=12, tail in "[a-z]{0,3}") {
                let d = parse_pubdate(&format!("{y}/{m:02}/{tail}")).unwrap();
                prop_assert_eq!(d, NaiveDate::from_ymd_opt(y, m, DEFAULT_PUB_DAY).unwrap());
            }
        }
    }
}
