//! Declarative field extraction over parsed markup.
//!
//! Every record kind declares its fields as [`Field`] values: a name, a CSS
//! selector and where the value lives (text, attribute or inner HTML).
//! Required fields fail with [`Error::MissingField`] instead of panicking
//! on unexpected markup.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::{error::Error, result::Result};

static DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("static regex"));

pub(crate) fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::Selector(format!("`{css}`: {e}")))
}

/// Anything CSS selectors can run against.
pub(crate) trait Scope {
    fn find_all<'a>(&'a self, css: &str) -> Result<Vec<ElementRef<'a>>>;

    fn find<'a>(&'a self, css: &str) -> Result<Option<ElementRef<'a>>> {
        Ok(self.find_all(css)?.into_iter().next())
    }

    fn contains(&self, css: &str) -> Result<bool> {
        Ok(self.find(css)?.is_some())
    }
}

impl Scope for Html {
    fn find_all<'a>(&'a self, css: &str) -> Result<Vec<ElementRef<'a>>> {
        let sel = selector(css)?;
        Ok(self.select(&sel).collect())
    }
}

impl<'e> Scope for ElementRef<'e> {
    fn find_all<'a>(&'a self, css: &str) -> Result<Vec<ElementRef<'a>>> {
        let sel = selector(css)?;
        let found: Vec<ElementRef<'e>> = self.select(&sel).collect();
        Ok(found)
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Source {
    Text,
    Attr(&'static str),
    Html,
}

/// One named value inside a document.
#[derive(Debug, Clone)]
pub(crate) struct Field {
    name: &'static str,
    css: Cow<'static, str>,
    source: Source,
}

impl Field {
    pub(crate) const fn text(name: &'static str, css: &'static str) -> Self {
        Self {
            name,
            css: Cow::Borrowed(css),
            source: Source::Text,
        }
    }

    pub(crate) const fn attr(name: &'static str, css: &'static str, attr: &'static str) -> Self {
        Self {
            name,
            css: Cow::Borrowed(css),
            source: Source::Attr(attr),
        }
    }

    pub(crate) const fn html(name: &'static str, css: &'static str) -> Self {
        Self {
            name,
            css: Cow::Borrowed(css),
            source: Source::Html,
        }
    }

    /// A field whose selector depends on the record being extracted.
    pub(crate) fn dynamic(name: &'static str, css: String, source: Source) -> Self {
        Self {
            name,
            css: Cow::Owned(css),
            source,
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn get(&self, scope: &impl Scope) -> Result<Option<String>> {
        let Some(el) = scope.find(&self.css)? else {
            return Ok(None);
        };
        Ok(match self.source {
            Source::Text => Some(text_of(el)),
            Source::Attr(attr) => el.value().attr(attr).map(ToString::to_string),
            Source::Html => Some(el.inner_html()),
        })
    }

    pub(crate) fn require(&self, entity: &'static str, scope: &impl Scope) -> Result<String> {
        self.get(scope)?.ok_or(Error::MissingField {
            entity,
            field: self.name,
        })
    }

    /// Reads the field as a count such as `1,204`.
    pub(crate) fn count(&self, entity: &'static str, scope: &impl Scope) -> Result<u64> {
        self.get(scope)?
            .as_deref()
            .and_then(parse_count)
            .ok_or(Error::MissingField {
                entity,
                field: self.name,
            })
    }

    /// Reads the field as a unix timestamp.
    pub(crate) fn time(&self, entity: &'static str, scope: &impl Scope) -> Result<DateTime<Utc>> {
        self.get(scope)?
            .as_deref()
            .and_then(parse_unix)
            .ok_or(Error::MissingField {
                entity,
                field: self.name,
            })
    }
}

/// Parses `root` as a full document.
pub(crate) fn document(root: &str) -> Html {
    Html::parse_document(root)
}

/// Whitespace-trimmed text content of an element.
pub(crate) fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Text content with every whitespace run collapsed to one space.
pub(crate) fn squashed_text(el: ElementRef<'_>) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parses forum counters, which use `,` as a thousands separator.
pub(crate) fn parse_count(raw: &str) -> Option<u64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, ',' | ' ' | '\u{a0}' | '\n' | '\t'))
        .collect();
    cleaned.parse().ok()
}

pub(crate) fn parse_unix(raw: &str) -> Option<DateTime<Utc>> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

/// The last run of digits in `raw`, which is where XenForo puts ids in
/// `slug.123` style path segments.
pub(crate) fn last_number(raw: &str) -> Option<u64> {
    DIGITS
        .find_iter(raw)
        .last()
        .and_then(|m| m.as_str().parse().ok())
}

/// The id in the path segment following `kind`, e.g. `412` in
/// `/forums/some-forum.412/` for `kind = "forums"`.
pub(crate) fn path_id(href: &str, kind: &str) -> Option<u64> {
    let marker = format!("{kind}/");
    let start = href.find(&marker)? + marker.len();
    let segment = href[start..]
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    last_number(segment)
}

/// Strips a known prefix from an id attribute such as `js-post-123`.
pub(crate) fn prefixed_id(raw: &str, prefix: &str) -> Option<u64> {
    raw.strip_prefix(prefix).and_then(|id| id.parse().ok())
}

/// Decodes HTML entities left in envelope titles.
pub(crate) fn unescape(raw: &str) -> String {
    html_escape::decode_html_entities(raw).into_owned()
}

/// Reads the pager's last page number, or `None` when there is no pager.
pub(crate) fn pages_count(scope: &impl Scope) -> Result<Option<u32>> {
    let pages = scope.find_all("ul.pageNav-main li.pageNav-page")?;
    let pages = if pages.is_empty() {
        scope.find_all("li.pageNav-page")?
    } else {
        pages
    };
    Ok(pages
        .last()
        .map(|li| text_of(*li))
        .and_then(|raw| parse_count(&raw))
        .and_then(|n| u32::try_from(n).ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html data-csrf="tok">
          <span class="userTitle"> Old timer </span>
          <a class="avatar avatar--l" href="/data/avatars/l/1.jpg">x</a>
          <time data-time="1700000000">now</time>
          <dl class="count"><dd>12,345</dd></dl>
          <ul class="pageNav-main">
            <li class="pageNav-page">1</li>
            <li class="pageNav-page">2</li>
            <li class="pageNav-page">17</li>
          </ul>
        </html>"#;

    #[test]
    fn fields_read_text_and_attributes() {
        let doc = document(PAGE);

        let title = Field::text("title", "span.userTitle").get(&doc).unwrap();
        let avatar = Field::attr("avatar", "a.avatar.avatar--l", "href")
            .get(&doc)
            .unwrap();
        let csrf = Field::attr("csrf", "html", "data-csrf").require("page", &doc).unwrap();

        assert_eq!(title.as_deref(), Some("Old timer"));
        assert_eq!(avatar.as_deref(), Some("/data/avatars/l/1.jpg"));
        assert_eq!(csrf, "tok");
    }

    #[test]
    fn missing_required_field_is_tagged() {
        let doc = document(PAGE);
        let err = Field::text("banner", "div.banner").require("member", &doc).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingField {
                entity: "member",
                field: "banner"
            }
        ));
    }

    #[test]
    fn counts_and_times() {
        let doc = document(PAGE);
        assert_eq!(Field::text("n", "dl.count dd").count("x", &doc).unwrap(), 12_345);
        assert_eq!(
            Field::attr("t", "time", "data-time")
                .time("x", &doc)
                .unwrap()
                .timestamp(),
            1_700_000_000
        );
    }

    #[test]
    fn squashes_whitespace() {
        let doc = document("<div class=\"m\">  Nick \n  <b>liked</b>\n your post </div>");
        let el = doc.find("div.m").unwrap().unwrap();
        assert_eq!(squashed_text(el), "Nick liked your post");
    }

    #[test]
    fn pager_reads_last_page() {
        assert_eq!(pages_count(&document(PAGE)).unwrap(), Some(17));
        assert_eq!(pages_count(&document("<p>no pager</p>")).unwrap(), None);
    }

    #[test]
    fn number_helpers() {
        assert_eq!(path_id("/threads/5/page-2", "threads"), Some(5));
        assert_eq!(path_id("/forums/2024-rules.412/", "forums"), Some(412));
        assert_eq!(path_id("https://x.y/threads/77?page=2", "threads"), Some(77));
        assert_eq!(path_id("/categories/3/", "forums"), None);
        assert_eq!(last_number("abc"), None);
        assert_eq!(prefixed_id("js-post-991", "js-post-"), Some(991));
        assert_eq!(prefixed_id("js-profilePost-3", "js-post-"), None);
        assert_eq!(parse_count(" 1,204 "), Some(1204));
        assert_eq!(unescape("Tom &amp; Jerry"), "Tom & Jerry");
    }
}
