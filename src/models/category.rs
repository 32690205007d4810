use std::collections::HashSet;

use chrono::{DateTime, Utc};
use scraper::ElementRef;
use serde::{Deserialize, Serialize};

use crate::{
    client::{Form, Submission},
    error::Error,
    extract::{document, pages_count, parse_unix, path_id, text_of, unescape, Field, Scope},
    models::{macros::str_opt_ref, username_color},
    result::Result,
    session::Session,
};

const ENTITY: &str = "category";

const THREAD_ITEM: &str = "div.structItem.structItem--thread";
const TITLE_LINKS: &str = "div.structItem-title a";
const PINNED: &str = r#"i[title="Закреплено"]"#;
const CLOSED: &str = r#"i[title="Закрыта"]"#;
const CHILD_NODE: &str = "div.node--depth2.node--forum";
const BREADCRUMBS: &str = "ul.p-breadcrumbs li";

const AUTHOR_LINK: &str =
    "div.structItem-cell--main div.structItem-minor ul.structItem-parts a.username";
const STARTED: Field = Field::attr(
    "created_date",
    "div.structItem-cell--main div.structItem-minor ul.structItem-parts li.structItem-startDate time.u-dt",
    "data-time",
);
const LAST_POSTER: &str = r#"div.structItem-cell--latest div.structItem-minor [class*="username"]"#;
const LAST_DATE: Field = Field::attr(
    "last_message_date",
    "div.structItem-cell--latest time.structItem-latestDate",
    "data-time",
);

/// A forum section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    id: u64,
    title: String,
    pages_count: u32,
}

impl Category {
    /// Fetches the first page of `category_id`.
    ///
    /// Returns `Ok(None)` when the category does not exist or is hidden.
    ///
    /// # Errors
    ///
    /// Fails on transport errors.
    pub async fn fetch(session: &Session, category_id: u64) -> Result<Option<Self>> {
        let envelope = session.envelope(&format!("/forums/{category_id}")).await?;
        let Some(html) = envelope.into_fragments() else {
            log::debug!("category {category_id} not available");
            return Ok(None);
        };
        let doc = document(&html.content);
        Ok(Some(Category {
            id: category_id,
            title: unescape(html.title.trim()),
            pages_count: pages_count(&doc)?.unwrap_or(1),
        }))
    }

    /// Pinned and regular thread ids on page `page` of `category_id`.
    ///
    /// # Errors
    ///
    /// Fails on transport errors.
    pub async fn threads(
        session: &Session,
        category_id: u64,
        page: u32,
    ) -> Result<Option<ThreadListing>> {
        let envelope = session
            .envelope(&format!("/forums/{category_id}/page-{page}"))
            .await?;
        match envelope.into_fragments() {
            Some(html) => parse_listing(&html.content).map(Some),
            None => Ok(None),
        }
    }

    /// Thread rows on page `page` of `category_id` with the details the list
    /// shows: author, dates, last poster and state.
    ///
    /// # Errors
    ///
    /// Fails on transport errors or when a row has no title link.
    pub async fn threads_extended(
        session: &Session,
        category_id: u64,
        page: u32,
    ) -> Result<Option<Vec<ThreadSummary>>> {
        let envelope = session
            .envelope(&format!("/forums/{category_id}/page-{page}"))
            .await?;
        match envelope.into_fragments() {
            Some(html) => parse_summaries(&html.content).map(Some),
            None => Ok(None),
        }
    }

    /// Ids of the sub-forums listed on the first page of `category_id`.
    ///
    /// # Errors
    ///
    /// Fails on transport errors.
    pub async fn children(session: &Session, category_id: u64) -> Result<Option<Vec<u64>>> {
        let envelope = session
            .envelope(&format!("/forums/{category_id}/page-1"))
            .await?;
        match envelope.into_fragments() {
            Some(html) => parse_children(&html.content).map(Some),
            None => Ok(None),
        }
    }

    /// The category `category_id` sits in, `None` at the top level.
    ///
    /// # Errors
    ///
    /// Fails on transport errors.
    pub async fn parent(session: &Session, category_id: u64) -> Result<Option<Category>> {
        let page = session.html(&format!("/forums/{category_id}")).await?;
        match parse_parent_id(&page)? {
            Some(parent_id) => Category::fetch(session, parent_id).await,
            None => Ok(None),
        }
    }

    /// Starts a new thread in `category_id`.
    ///
    /// # Errors
    ///
    /// Fails on transport errors.
    pub async fn create_thread(
        session: &Session,
        category_id: u64,
        thread: &NewThread,
    ) -> Result<Submission> {
        session
            .submit(
                &format!("/forums/{category_id}/post-thread?inline-mode=1"),
                thread.form(),
            )
            .await
    }

    /// Marks everything in `category_id` as read.
    ///
    /// # Errors
    ///
    /// Fails on transport errors.
    pub async fn mark_read(session: &Session, category_id: u64) -> Result<Submission> {
        session
            .submit(&format!("/forums/{category_id}/mark-read"), Form::new())
            .await
    }

    /// Changes how `category_id` is watched.
    ///
    /// # Errors
    ///
    /// Fails on transport errors.
    pub async fn watch(
        session: &Session,
        category_id: u64,
        watch: &CategoryWatch,
    ) -> Result<Submission> {
        session
            .submit(&format!("/forums/{category_id}/watch"), watch.form())
            .await
    }

    /// Returns the category ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the category title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the number of thread list pages.
    pub fn pages_count(&self) -> u32 {
        self.pages_count
    }
}

#[cfg(feature = "display")]
impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (#{}) | pages: {}", self.title, self.id, self.pages_count)
    }
}

/// Thread ids of one category page, split by pinning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadListing {
    pinned: Vec<u64>,
    unpinned: Vec<u64>,
}

impl ThreadListing {
    /// Returns the ids of pinned threads.
    pub fn pinned(&self) -> &[u64] {
        &self.pinned
    }

    /// Returns the ids of regular threads.
    pub fn unpinned(&self) -> &[u64] {
        &self.unpinned
    }
}

/// One row of a category's thread list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadSummary {
    thread_id: u64,
    title: String,
    prefix: Option<String>,
    author: Option<String>,
    author_color: Option<String>,
    created_at: Option<DateTime<Utc>>,
    last_poster: Option<String>,
    last_poster_color: Option<String>,
    last_message_at: Option<DateTime<Utc>>,
    is_pinned: bool,
    is_closed: bool,
}

impl ThreadSummary {
    /// Returns the thread ID.
    pub fn thread_id(&self) -> u64 {
        self.thread_id
    }

    /// Returns the thread title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the prefix label (if any).
    pub fn prefix(&self) -> Option<&str> {
        str_opt_ref!(self.prefix)
    }

    /// Returns the name of the thread starter (if shown).
    pub fn author(&self) -> Option<&str> {
        str_opt_ref!(self.author)
    }

    /// Returns the colour of the thread starter's name (if shown).
    pub fn author_color(&self) -> Option<&str> {
        str_opt_ref!(self.author_color)
    }

    /// Returns when the thread was started (if shown).
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// Returns the name of the last poster (if shown).
    pub fn last_poster(&self) -> Option<&str> {
        str_opt_ref!(self.last_poster)
    }

    /// Returns the colour of the last poster's name (if shown).
    pub fn last_poster_color(&self) -> Option<&str> {
        str_opt_ref!(self.last_poster_color)
    }

    /// Returns when the last message was posted (if shown).
    pub fn last_message_at(&self) -> Option<DateTime<Utc>> {
        self.last_message_at
    }

    /// Returns whether the thread is pinned.
    pub fn is_pinned(&self) -> bool {
        self.is_pinned
    }

    /// Returns whether the thread is closed.
    pub fn is_closed(&self) -> bool {
        self.is_closed
    }
}

/// Kind of thread to start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscussionType {
    /// A regular discussion.
    #[default]
    Discussion,
    /// An article.
    Article,
    /// A poll.
    Poll,
}

impl DiscussionType {
    fn as_str(self) -> &'static str {
        match self {
            DiscussionType::Discussion => "discussion",
            DiscussionType::Article => "article",
            DiscussionType::Poll => "poll",
        }
    }
}

/// A thread to be created with [`Category::create_thread`].
#[derive(Debug, Clone)]
pub struct NewThread {
    title: String,
    message_html: String,
    discussion_type: DiscussionType,
    watch: bool,
}

impl NewThread {
    /// A watched discussion with the given title and body.
    pub fn new(title: impl Into<String>, message_html: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message_html: message_html.into(),
            discussion_type: DiscussionType::default(),
            watch: true,
        }
    }

    /// Sets the kind of thread.
    #[must_use]
    pub fn discussion_type(mut self, discussion_type: DiscussionType) -> Self {
        self.discussion_type = discussion_type;
        self
    }

    /// Whether to watch the new thread.
    #[must_use]
    pub fn watch(mut self, watch: bool) -> Self {
        self.watch = watch;
        self
    }

    fn form(&self) -> Form {
        Form::new()
            .field("title", &self.title)
            .field("message_html", &self.message_html)
            .field("discussion_type", self.discussion_type.as_str())
            .flag("watch_thread", self.watch)
    }
}

/// What a category watch notifies about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WatchNotify {
    /// New threads.
    Thread,
    /// New messages.
    Message,
    /// Nothing; the category is only listed as watched.
    Nothing,
}

/// Watch settings for [`Category::watch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategoryWatch {
    /// Start or update watching.
    Start {
        /// What triggers a notification.
        notify: WatchNotify,
        /// Send on-site alerts.
        send_alert: bool,
        /// Send e-mails.
        send_email: bool,
    },
    /// Stop watching.
    Stop,
}

impl CategoryWatch {
    /// Watch with on-site alerts and no e-mail.
    pub fn alerts(notify: WatchNotify) -> Self {
        CategoryWatch::Start {
            notify,
            send_alert: true,
            send_email: false,
        }
    }

    fn form(&self) -> Form {
        match *self {
            CategoryWatch::Stop => Form::new().field("stop", 1),
            CategoryWatch::Start {
                notify,
                send_alert,
                send_email,
            } => Form::new()
                .flag("send_alert", send_alert)
                .flag("send_email", send_email)
                .field(
                    "notify",
                    match notify {
                        WatchNotify::Thread => "thread",
                        WatchNotify::Message => "message",
                        WatchNotify::Nothing => "",
                    },
                ),
        }
    }
}

/// The link to the thread is the last anchor in the title cell.
fn title_link<'a>(item: &'a ElementRef<'_>) -> Result<Option<ElementRef<'a>>> {
    Ok(item.find_all(TITLE_LINKS)?.into_iter().last())
}

fn parse_listing(content: &str) -> Result<ThreadListing> {
    let doc = document(content);
    let mut listing = ThreadListing::default();
    for item in doc.find_all(THREAD_ITEM)? {
        let Some(id) = title_link(&item)?
            .and_then(|link| link.value().attr("href"))
            .and_then(|href| path_id(href, "threads"))
        else {
            continue;
        };
        if item.contains(PINNED)? {
            listing.pinned.push(id);
        } else {
            listing.unpinned.push(id);
        }
    }
    Ok(listing)
}

fn parse_summaries(content: &str) -> Result<Vec<ThreadSummary>> {
    let doc = document(content);
    let mut seen = HashSet::new();
    let mut rows = Vec::new();

    for item in doc.find_all(THREAD_ITEM)? {
        let link = title_link(&item)?.ok_or(Error::MissingField {
            entity: ENTITY,
            field: "thread_title",
        })?;
        let thread_id = link
            .value()
            .attr("href")
            .and_then(|href| path_id(href, "threads"))
            .ok_or(Error::MissingField {
                entity: ENTITY,
                field: "thread_id",
            })?;
        if !seen.insert(thread_id) {
            continue;
        }

        let author = item.find(AUTHOR_LINK)?;
        let last_poster = item.find(LAST_POSTER)?;

        rows.push(ThreadSummary {
            thread_id,
            title: text_of(link),
            prefix: item.find("span.label")?.map(text_of),
            author: author.map(text_of),
            author_color: author.map(|el| username_color(&el.html()).to_string()),
            created_at: STARTED.get(&item)?.as_deref().and_then(parse_unix),
            last_poster: last_poster.map(text_of),
            last_poster_color: last_poster.map(|el| username_color(&el.html()).to_string()),
            last_message_at: LAST_DATE.get(&item)?.as_deref().and_then(parse_unix),
            is_pinned: item.contains(PINNED)?,
            is_closed: item.contains(CLOSED)?,
        });
    }
    Ok(rows)
}

fn parse_children(content: &str) -> Result<Vec<u64>> {
    let doc = document(content);
    let mut ids = Vec::new();
    for node in doc.find_all(CHILD_NODE)? {
        if let Some(id) = node
            .find("a")?
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| path_id(href, "forums"))
        {
            ids.push(id);
        }
    }
    Ok(ids)
}

fn parse_parent_id(page: &str) -> Result<Option<u64>> {
    let doc = document(page);
    Ok(doc
        .find_all(BREADCRUMBS)?
        .last()
        .map(|li| li.find("a"))
        .transpose()?
        .flatten()
        .and_then(|a| a.value().attr("href"))
        .and_then(|href| path_id(href, "forums")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const LIST: &str = r#"
        <div class="structItem structItem--thread is-prefix1 js-inlineModContainer">
          <div class="structItem-cell structItem-cell--main">
            <ul class="structItem-statuses"><li><i class="structItem-status--sticky" title="Закреплено"></i></li></ul>
            <div class="structItem-title">
              <a href="/forums/12/?prefix_id=1" class="labelLink"><span class="label label--blue">Info</span></a>
              <a href="/threads/100/">Read first</a>
            </div>
            <div class="structItem-minor">
              <ul class="structItem-parts">
                <li><a href="/members/5/" class="username" data-user-id="5"><span class="username--style4">Admin</span></a></li>
                <li class="structItem-startDate"><a href="/threads/100/"><time class="u-dt" data-time="1600000000">Sep</time></a></li>
              </ul>
            </div>
          </div>
          <div class="structItem-cell structItem-cell--latest">
            <a href="/threads/100/latest"><time class="structItem-latestDate u-dt" data-time="1700000000">Nov</time></a>
            <div class="structItem-minor"><a href="/members/6/" class="username" data-user-id="6">Bob</a></div>
          </div>
        </div>
        <div class="structItem structItem--thread js-inlineModContainer">
          <div class="structItem-cell structItem-cell--main">
            <ul class="structItem-statuses"><li><i class="structItem-status--locked" title="Закрыта"></i></li></ul>
            <div class="structItem-title"><a href="/threads/slug-2024.101/">Complaint</a></div>
            <div class="structItem-minor"><ul class="structItem-parts"></ul></div>
          </div>
          <div class="structItem-cell structItem-cell--latest"><div class="structItem-minor"></div></div>
        </div>
        <div class="structItem structItem--thread js-inlineModContainer">
          <div class="structItem-cell structItem-cell--main">
            <div class="structItem-title"><a href="/threads/100/">Read first</a></div>
          </div>
        </div>
        <div class="structItem structItem--thread">
          <div class="structItem-title"><a href="/threads/new">Broken</a></div>
        </div>"#;

    #[test]
    fn listing_splits_pins() {
        let listing = parse_listing(LIST).unwrap();
        assert_eq!(listing.pinned(), [100]);
        assert_eq!(listing.unpinned(), [101, 100]);
    }

    #[test]
    fn summaries_carry_row_details() {
        let content = LIST.replace(
            r#"<div class="structItem structItem--thread">
          <div class="structItem-title"><a href="/threads/new">Broken</a></div>
        </div>"#,
            "",
        );
        let rows = parse_summaries(&content).unwrap();
        assert_eq!(rows.len(), 2);

        let first = &rows[0];
        assert_eq!(first.thread_id(), 100);
        assert_eq!(first.title(), "Read first");
        assert_eq!(first.prefix(), Some("Info"));
        assert_eq!(first.author(), Some("Admin"));
        assert_eq!(first.author_color(), Some("#0080ff"));
        assert_eq!(first.created_at().map(|t| t.timestamp()), Some(1_600_000_000));
        assert_eq!(first.last_poster(), Some("Bob"));
        assert_eq!(first.last_poster_color(), Some("#fff"));
        assert_eq!(first.last_message_at().map(|t| t.timestamp()), Some(1_700_000_000));
        assert!(first.is_pinned());
        assert!(!first.is_closed());

        let second = &rows[1];
        assert_eq!(second.thread_id(), 101);
        assert_eq!(second.prefix(), None);
        assert_eq!(second.author(), None);
        assert_eq!(second.last_poster(), None);
        assert!(second.is_closed());
    }

    #[test]
    fn broken_row_is_an_error_in_extended_listing() {
        assert!(matches!(
            parse_summaries(LIST),
            Err(Error::MissingField {
                field: "thread_id",
                ..
            })
        ));
    }

    #[test]
    fn children_and_parent() {
        let nodes = r#"
            <div class="node node--id20 node--depth2 node--forum node--unread"><h3><a href="/forums/20/">A</a></h3></div>
            <div class="node node--id21 node--depth2 node--link"><h3><a href="/link-forums/21/">B</a></h3></div>
            <div class="node node--id22 node--depth2 node--forum"><h3><a href="/forums/sub.22/">C</a></h3></div>"#;
        assert_eq!(parse_children(nodes).unwrap(), vec![20, 22]);

        let crumbs = |last: &str| {
            format!(
                r#"<ul class="p-breadcrumbs"><li><a href="/">Forums</a></li>{last}</ul>"#
            )
        };
        assert_eq!(
            parse_parent_id(&crumbs(r#"<li><a href="/forums/7/">Parent</a></li>"#)).unwrap(),
            Some(7)
        );
        assert_eq!(
            parse_parent_id(&crumbs(r#"<li><a href="/categories/1/">Top</a></li>"#)).unwrap(),
            None
        );
    }

    #[test]
    fn watch_forms() {
        let stop: Vec<(String, String)> = CategoryWatch::Stop.form().fields().to_vec();
        assert_eq!(stop, vec![("stop".to_string(), "1".to_string())]);

        let start = CategoryWatch::alerts(WatchNotify::Nothing).form();
        let pairs: Vec<(&str, &str)> = start
            .fields()
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(pairs, vec![("send_alert", "1"), ("send_email", "0"), ("notify", "")]);
    }

    #[test]
    fn new_thread_form() {
        let form = NewThread::new("Title", "<p>Body</p>")
            .discussion_type(DiscussionType::Poll)
            .watch(false)
            .form();
        let pairs: Vec<(&str, &str)> = form
            .fields()
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("title", "Title"),
                ("message_html", "<p>Body</p>"),
                ("discussion_type", "poll"),
                ("watch_thread", "0"),
            ]
        );
    }
}
