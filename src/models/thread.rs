use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    client::{Form, Fragments, Submission},
    error::Error,
    extract::{document, pages_count, path_id, prefixed_id, text_of, unescape, Field, Scope},
    models::{category::Category, member::Member, Author},
    paginate::{collect_all_pages, AggregatedCollection, PageFetcher, PageResult},
    result::Result,
    session::Session,
};

const ENTITY: &str = "thread";

/// How many `redirect` hops a thread lookup follows before giving up.
const MAX_REDIRECTS: usize = 3;

const CREATED: Field = Field::attr("create_date", "time[data-time]", "data-time");
const CONTENT_HTML: Field = Field::html("content_html", "div.bbWrapper");
const CONTENT_TEXT: Field = Field::text("content", "div.bbWrapper");
const PREFIX: Field = Field::text("prefix", "span.label");
const CONTAINER: Field = Field::attr("data-container-key", "html", "data-container-key");
const POST_ARTICLE: &str = r#"article[id^="js-post-"]"#;
const CREATOR_LINK: &str = "a.username";
const CLOSED_BLOCK: &str = "dl.blockStatus";

/// A thread together with its opening post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    id: u64,
    creator: Author,
    created_at: DateTime<Utc>,
    title: String,
    /// Label shown before the title, such as "Closed" or "Approved".
    prefix: Option<String>,
    content: String,
    content_html: String,
    pages_count: u32,
    first_post_id: u64,
    is_closed: bool,
}

impl Thread {
    /// Fetches the first page of `thread_id`.
    ///
    /// Moved threads are followed through their redirect. Returns `Ok(None)`
    /// when the thread does not exist or is not visible to the session.
    ///
    /// # Errors
    ///
    /// Fails on transport errors or when the opening post cannot be read.
    pub async fn fetch(session: &Session, thread_id: u64) -> Result<Option<Self>> {
        let mut id = thread_id;
        for _ in 0..=MAX_REDIRECTS {
            let envelope = session.envelope(&format!("/threads/{id}/page-1")).await?;
            if envelope.is_error() {
                log::debug!("thread {id} not available");
                return Ok(None);
            }
            if let Some(redirect) = envelope.redirect.as_deref() {
                match path_id(redirect, "threads") {
                    Some(target) => {
                        log::debug!("thread {id} redirects to {target}");
                        id = target;
                        continue;
                    }
                    None => {
                        log::warn!("thread {id} redirects outside of threads: {redirect}");
                        return Ok(None);
                    }
                }
            }
            let html = envelope.html.unwrap_or_default();
            return parse(id, &html).map(Some);
        }
        log::warn!("thread {thread_id}: too many redirects");
        Ok(None)
    }

    /// Fetches the full profile of the thread's creator.
    ///
    /// # Errors
    ///
    /// See [`Member::fetch`].
    pub async fn creator_profile(&self, session: &Session) -> Result<Option<Member>> {
        Member::fetch(session, self.creator.id()).await
    }

    /// Returns the category `thread_id` was posted in.
    ///
    /// # Errors
    ///
    /// Fails on transport errors.
    pub async fn category(session: &Session, thread_id: u64) -> Result<Option<Category>> {
        let page = session.html(&format!("/threads/{thread_id}/page-1")).await?;
        match container_id(&page)? {
            Some(category_id) => Category::fetch(session, category_id).await,
            None => Ok(None),
        }
    }

    /// Lists post ids on page `page` of `thread_id`, top to bottom.
    ///
    /// # Errors
    ///
    /// Fails on transport errors.
    pub async fn posts_page(session: &Session, thread_id: u64, page: u32) -> Result<PageResult<u64>> {
        let envelope = session
            .envelope(&format!("/threads/{thread_id}/page-{page}"))
            .await?;
        match envelope.into_fragments() {
            Some(html) => parse_posts_page(&html.content),
            None => Ok(PageResult::error()),
        }
    }

    /// Post ids on one page, `None` when the page is not available.
    ///
    /// # Errors
    ///
    /// Fails on transport errors.
    pub async fn posts(session: &Session, thread_id: u64, page: u32) -> Result<Option<Vec<u64>>> {
        Ok(Self::posts_page(session, thread_id, page).await?.into_option())
    }

    /// Every post id of `thread_id`, in thread order.
    ///
    /// See [`collect_all_pages`] for how the walk ends.
    ///
    /// # Errors
    ///
    /// Fails on transport errors.
    pub async fn all_posts(session: &Session, thread_id: u64) -> Result<AggregatedCollection<u64>> {
        collect_all_pages(thread_id, &ThreadPostPages { session }).await
    }

    /// Replies to `thread_id`.
    ///
    /// # Errors
    ///
    /// Fails on transport errors.
    pub async fn reply(session: &Session, thread_id: u64, message_html: &str) -> Result<Submission> {
        session
            .submit(
                &format!("/threads/{thread_id}/add-reply"),
                Form::new().field("message_html", message_html),
            )
            .await
    }

    /// Starts or stops watching `thread_id`.
    ///
    /// # Errors
    ///
    /// Fails on transport errors.
    pub async fn watch(
        session: &Session,
        thread_id: u64,
        email_subscribe: bool,
        stop: bool,
    ) -> Result<Submission> {
        session
            .submit(
                &format!("/threads/{thread_id}/watch"),
                Form::new()
                    .flag("stop", stop)
                    .flag("email_subscribe", email_subscribe),
            )
            .await
    }

    /// Deletes `thread_id`, softly unless `hard_delete` is set.
    ///
    /// # Errors
    ///
    /// Fails on transport errors.
    pub async fn delete(
        session: &Session,
        thread_id: u64,
        reason: &str,
        hard_delete: bool,
    ) -> Result<Submission> {
        session
            .submit(
                &format!("/threads/{thread_id}/delete"),
                Form::new()
                    .field("reason", reason)
                    .flag("hard_delete", hard_delete),
            )
            .await
    }

    /// Replaces the body of the opening post of `thread_id`.
    ///
    /// # Errors
    ///
    /// Fails on transport errors or when the thread has no visible posts.
    pub async fn edit(session: &Session, thread_id: u64, message_html: &str) -> Result<Submission> {
        let post_id = first_post_id(session, thread_id).await?;
        session
            .submit(
                &format!("/posts/{post_id}/edit"),
                Form::new()
                    .field("message_html", message_html)
                    .field("message", message_html),
            )
            .await
    }

    /// Changes the title, prefix and state of `thread_id`.
    ///
    /// # Errors
    ///
    /// Fails on transport errors.
    pub async fn edit_info(session: &Session, thread_id: u64, edit: &ThreadEdit) -> Result<Submission> {
        session
            .submit(&format!("/threads/{thread_id}/edit"), edit.form())
            .await
    }

    /// Reacts to the opening post of `thread_id`.
    ///
    /// # Errors
    ///
    /// Fails on transport errors or when the thread has no visible posts.
    pub async fn react(session: &Session, thread_id: u64, reaction_id: u32) -> Result<Submission> {
        let post_id = first_post_id(session, thread_id).await?;
        session
            .submit(
                &format!("/posts/{post_id}/react?reaction_id={reaction_id}"),
                Form::new(),
            )
            .await
    }

    /// Returns the thread ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the thread creator.
    pub fn creator(&self) -> &Author {
        &self.creator
    }

    /// Returns when the thread was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the title without its prefix.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the prefix label (if any).
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Returns the text of the opening post.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Returns the HTML of the opening post.
    pub fn content_html(&self) -> &str {
        &self.content_html
    }

    /// Returns the number of pages.
    pub fn pages_count(&self) -> u32 {
        self.pages_count
    }

    /// Returns the id of the opening post.
    pub fn first_post_id(&self) -> u64 {
        self.first_post_id
    }

    /// Returns whether replies are closed.
    pub fn is_closed(&self) -> bool {
        self.is_closed
    }
}

#[cfg(feature = "display")]
impl std::fmt::Display for Thread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(prefix) = &self.prefix {
            write!(f, "[{prefix}] ")?;
        }
        write!(
            f,
            "{} (#{}) by {} | pages: {}",
            self.title,
            self.id,
            self.creator.username(),
            self.pages_count
        )
    }
}

/// New title, prefix and state for [`Thread::edit_info`].
///
/// `sticky` and `open` default to `true`, so a bare edit pins the thread and
/// keeps it open.
#[derive(Debug, Clone)]
pub struct ThreadEdit {
    title: String,
    prefix_id: Option<u64>,
    sticky: bool,
    open: bool,
}

impl ThreadEdit {
    /// Starts an edit that sets the title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            prefix_id: None,
            sticky: true,
            open: true,
        }
    }

    /// Sets the prefix.
    #[must_use]
    pub fn prefix(mut self, prefix_id: u64) -> Self {
        self.prefix_id = Some(prefix_id);
        self
    }

    /// Pins or unpins the thread.
    #[must_use]
    pub fn sticky(mut self, sticky: bool) -> Self {
        self.sticky = sticky;
        self
    }

    /// Opens or closes the thread for replies.
    #[must_use]
    pub fn open(mut self, open: bool) -> Self {
        self.open = open;
        self
    }

    // Unchecked boxes are sent by omitting the field.
    fn form(&self) -> Form {
        let mut form = Form::new().field("title", &self.title);
        if let Some(prefix_id) = self.prefix_id {
            form = form.field("prefix_id", prefix_id);
        }
        if self.open {
            form = form.field("discussion_open", 1);
        }
        if self.sticky {
            form = form.field("sticky", 1);
        }
        form
    }
}

struct ThreadPostPages<'s> {
    session: &'s Session,
}

#[async_trait]
impl PageFetcher for ThreadPostPages<'_> {
    type Item = u64;

    async fn fetch_page(&self, thread_id: u64, page: u32) -> Result<PageResult<u64>> {
        Thread::posts_page(self.session, thread_id, page).await
    }
}

async fn first_post_id(session: &Session, thread_id: u64) -> Result<u64> {
    let page = session.html(&format!("/threads/{thread_id}/page-1")).await?;
    parse_first_post_id(&page)?.ok_or(Error::MissingField {
        entity: ENTITY,
        field: "first_post_id",
    })
}

fn parse_first_post_id(page: &str) -> Result<Option<u64>> {
    let doc = document(page);
    Ok(doc
        .find(POST_ARTICLE)?
        .and_then(|article| article.value().id())
        .and_then(|id| prefixed_id(id, "js-post-")))
}

fn container_id(page: &str) -> Result<Option<u64>> {
    let doc = document(page);
    if !doc.contains(CREATOR_LINK)? {
        return Ok(None);
    }
    Ok(CONTAINER
        .get(&doc)?
        .and_then(|key| prefixed_id(&key, "node-")))
}

fn parse(thread_id: u64, html: &Fragments) -> Result<Thread> {
    let doc = document(&html.content);
    let h1 = document(&html.h1);

    let creator = doc
        .find(CREATOR_LINK)?
        .and_then(Author::from_link)
        .ok_or(Error::MissingField {
            entity: ENTITY,
            field: "creator",
        })?;

    let heading = h1
        .find("body")?
        .map(text_of)
        .map(|text| unescape(&text))
        .unwrap_or_default();
    let prefix = PREFIX.get(&h1)?.filter(|p| !p.is_empty());
    let title = match &prefix {
        Some(prefix) => heading
            .strip_prefix(prefix.as_str())
            .unwrap_or(&heading)
            .trim()
            .to_string(),
        None => heading,
    };

    let first_post_id = doc
        .find(POST_ARTICLE)?
        .and_then(|article| article.value().id())
        .and_then(|id| prefixed_id(id, "js-post-"))
        .ok_or(Error::MissingField {
            entity: ENTITY,
            field: "first_post_id",
        })?;

    Ok(Thread {
        id: thread_id,
        creator,
        created_at: CREATED.time(ENTITY, &doc)?,
        title,
        prefix,
        content: CONTENT_TEXT.require(ENTITY, &doc)?,
        content_html: CONTENT_HTML.require(ENTITY, &doc)?,
        pages_count: pages_count(&doc)?.unwrap_or(1),
        first_post_id,
        is_closed: doc.contains(CLOSED_BLOCK)?,
    })
}

fn parse_posts_page(content: &str) -> Result<PageResult<u64>> {
    let doc = document(content);
    let ids = doc
        .find_all(POST_ARTICLE)?
        .into_iter()
        .filter_map(|article| article.value().id())
        .filter_map(|id| prefixed_id(id, "js-post-"))
        .collect();
    let pages = pages_count(&doc)?;
    if pages.is_none() && doc.contains("li.pageNav-page")? {
        log::warn!("thread pager present but unreadable");
    }
    Ok(PageResult::ok(ids, pages))
}
