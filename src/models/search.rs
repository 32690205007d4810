use std::fmt;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::ElementRef;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    error::Error,
    extract::{document, parse_unix, path_id, text_of, Field, Scope},
    models::macros::str_opt_ref,
    result::Result,
    session::Session,
};

/// Saved search that restricts results to threads.
const SEARCH_PATH: &str = "/search/24587779/";
const MODERATION_SUFFIX: &str = "| Причина:";

static ANSWERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Ответы:\s*([\d,]+)").expect("static regex"));

const TITLE_LINK: &str = "h3.contentRow-title a";
const LABEL: Field = Field::text("status", "span.label");
const CREATED: Field = Field::attr("create_date", "time.u-dt", "data-time");
const FORUM: Field = Field::text("forum", r#"a[href*="/forums/"]"#);
const SNIPPET: Field = Field::text("snippet", "div.contentRow-snippet");

/// Result ordering accepted by the search page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchOrder {
    /// Best match first.
    #[default]
    Relevance,
    /// Newest first.
    Date,
    /// Most replies first.
    Replies,
}

impl fmt::Display for SearchOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SearchOrder::Relevance => "relevance",
            SearchOrder::Date => "date",
            SearchOrder::Replies => "replies",
        })
    }
}

/// A thread found by [`SearchResult::threads`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    thread_id: u64,
    /// Title without the moderator's "reason" suffix.
    title: String,
    status: Option<String>,
    author: String,
    created_at: Option<DateTime<Utc>>,
    answers_count: u64,
    forum: Option<String>,
    snippet: Option<String>,
    url: String,
}

impl SearchResult {
    /// Searches thread titles and bodies for `query`.
    ///
    /// Only the first page of results is read.
    ///
    /// # Errors
    ///
    /// Fails on transport errors or when a result row has no title link.
    pub async fn threads(session: &Session, query: &str, order: SearchOrder) -> Result<Vec<Self>> {
        let page = session
            .client()
            .fetch_html(
                SEARCH_PATH,
                &[("q", query.to_string()), ("o", order.to_string())],
            )
            .await?;
        parse(&page, session.client().base())
    }

    /// Returns the thread ID.
    pub fn thread_id(&self) -> u64 {
        self.thread_id
    }

    /// Returns the thread title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the status label, e.g. "Закрыто".
    pub fn status(&self) -> Option<&str> {
        str_opt_ref!(self.status)
    }

    /// Returns the author's name.
    pub fn author(&self) -> &str {
        &self.author
    }

    /// Returns when the thread was created.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// Returns the number of answers.
    pub fn answers_count(&self) -> u64 {
        self.answers_count
    }

    /// Returns the forum the thread lives in.
    pub fn forum(&self) -> Option<&str> {
        str_opt_ref!(self.forum)
    }

    /// Returns the matching excerpt.
    pub fn snippet(&self) -> Option<&str> {
        str_opt_ref!(self.snippet)
    }

    /// Returns the absolute thread URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[cfg(feature = "display")]
impl fmt::Display for SearchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} by {} ({} answers)",
            self.thread_id, self.title, self.author, self.answers_count
        )
    }
}

fn parse(page: &str, base: &Url) -> Result<Vec<SearchResult>> {
    let doc = document(page);
    doc.find_all("li.block-row")?
        .into_iter()
        .map(|row| parse_row(row, base))
        .collect()
}

fn parse_row(row: ElementRef<'_>, base: &Url) -> Result<SearchResult> {
    let missing = |field| Error::MissingField {
        entity: "search_result",
        field,
    };

    let link = row.find(TITLE_LINK)?.ok_or_else(|| missing("title"))?;
    let href = link.value().attr("href").ok_or_else(|| missing("url"))?;
    let title = text_of(link);
    let title = title
        .split(MODERATION_SUFFIX)
        .next()
        .unwrap_or_default()
        .trim()
        .to_string();

    let answers_count = ANSWERS
        .captures(&row.text().collect::<String>())
        .and_then(|caps| caps[1].replace(',', "").parse().ok())
        .unwrap_or_default();

    Ok(SearchResult {
        thread_id: path_id(href, "threads").ok_or_else(|| missing("thread_id"))?,
        title,
        status: LABEL.get(&row)?,
        author: row
            .value()
            .attr("data-author")
            .unwrap_or_default()
            .to_string(),
        created_at: CREATED.get(&row)?.as_deref().and_then(parse_unix),
        answers_count,
        forum: FORUM.get(&row)?,
        snippet: SNIPPET.get(&row)?,
        url: base.join(href)?.to_string(),
    })
}
