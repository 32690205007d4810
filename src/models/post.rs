use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    client::{Form, Submission},
    error::Error,
    extract::{document, prefixed_id, Field, Scope},
    models::{member::Member, thread::Thread, Author},
    result::Result,
    session::Session,
};

const CONTENT_KEY: Field = Field::attr("data-content-key", "html", "data-content-key");
const POST_AUTHOR: &str = r#"a[data-xf-init="member-tooltip"]"#;
const POST_TIME: Field = Field::attr("create_date", "time.u-dt", "data-time");
const PROFILE_POST_TIME: Field = Field::attr("create_date", "time", "data-time");
const BB_HTML: Field = Field::html("bb_content", "div.bbWrapper");
const BB_TEXT: Field = Field::text("text_content", "div.bbWrapper");
const PROFILE_OWNER: &str = "span.username[data-user-id]";

/// A message inside a thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    id: u64,
    author: Author,
    thread_id: u64,
    created_at: DateTime<Utc>,
    content_html: String,
    content: String,
}

impl Post {
    /// Fetches post `post_id`.
    ///
    /// Returns `Ok(None)` when the post was deleted or is not visible.
    ///
    /// # Errors
    ///
    /// Fails on transport errors or when the post markup is incomplete.
    pub async fn fetch(session: &Session, post_id: u64) -> Result<Option<Self>> {
        let page = session.html(&format!("/posts/{post_id}")).await?;
        parse_post(post_id, &page)
    }

    /// Fetches the thread the post belongs to.
    ///
    /// # Errors
    ///
    /// See [`Thread::fetch`].
    pub async fn thread(&self, session: &Session) -> Result<Option<Thread>> {
        Thread::fetch(session, self.thread_id).await
    }

    /// Fetches the author's full profile.
    ///
    /// # Errors
    ///
    /// See [`Member::fetch`].
    pub async fn author_profile(&self, session: &Session) -> Result<Option<Member>> {
        Member::fetch(session, self.author.id()).await
    }

    /// Reacts to `post_id` with `reaction_id` (1 is "like").
    ///
    /// # Errors
    ///
    /// Fails on transport errors.
    pub async fn react(session: &Session, post_id: u64, reaction_id: u32) -> Result<Submission> {
        session
            .submit(
                &format!("/posts/{post_id}/react?reaction_id={reaction_id}"),
                Form::new(),
            )
            .await
    }

    /// Replaces the body of `post_id`, keeping its thread title.
    ///
    /// # Errors
    ///
    /// Fails on transport errors, or with [`Error::MissingField`] when the
    /// post or its thread cannot be read.
    pub async fn edit(session: &Session, post_id: u64, message_html: &str) -> Result<Submission> {
        let missing = Error::MissingField {
            entity: "post",
            field: "thread_title",
        };
        let Some(post) = Self::fetch(session, post_id).await? else {
            return Err(missing);
        };
        let Some(thread) = post.thread(session).await? else {
            return Err(missing);
        };
        session
            .submit(
                &format!("/posts/{post_id}/edit"),
                Form::new()
                    .field("title", thread.title())
                    .field("message_html", message_html)
                    .field("message", message_html),
            )
            .await
    }

    /// Deletes `post_id`, softly unless `hard_delete` is set.
    ///
    /// # Errors
    ///
    /// Fails on transport errors.
    pub async fn delete(
        session: &Session,
        post_id: u64,
        reason: &str,
        hard_delete: bool,
    ) -> Result<Submission> {
        session
            .submit(
                &format!("/posts/{post_id}/delete"),
                Form::new()
                    .field("reason", reason)
                    .flag("hard_delete", hard_delete),
            )
            .await
    }

    /// Bookmarks `post_id`.
    ///
    /// # Errors
    ///
    /// Fails on transport errors.
    pub async fn bookmark(session: &Session, post_id: u64) -> Result<Submission> {
        session
            .submit(&format!("/posts/{post_id}/bookmark"), Form::new())
            .await
    }

    /// Returns the BB-code source of `post_id` in `thread_id`.
    ///
    /// The forum only exposes rendered HTML, so the edit form is loaded and
    /// its content is run through the editor's HTML to BB-code converter.
    /// An empty string means the edit form had no content.
    ///
    /// # Errors
    ///
    /// Fails on transport errors or malformed JSON.
    pub async fn bbcode(session: &Session, thread_id: u64, post_id: u64) -> Result<String> {
        let request_uri = format!("/threads/{thread_id}/");
        let envelope = session
            .envelope_with(
                &format!("/posts/{post_id}/edit"),
                vec![
                    ("_xfRequestUri", request_uri.clone()),
                    ("_xfWithData", "1".to_string()),
                ],
            )
            .await?;
        let html = envelope.html.map(|h| h.content).unwrap_or_default();
        if html.is_empty() {
            return Ok(String::new());
        }

        let converted: BbCode = session
            .submit_json(
                "/index.php?editor/to-bb-code",
                Form::new()
                    .field("_xfResponseType", "json")
                    .field("_xfRequestUri", &request_uri)
                    .field("_xfWithData", 1)
                    .field("html", html),
            )
            .await?;
        Ok(converted.bb_code.unwrap_or_default())
    }

    /// Returns the post ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the author.
    pub fn author(&self) -> &Author {
        &self.author
    }

    /// Returns the ID of the containing thread.
    pub fn thread_id(&self) -> u64 {
        self.thread_id
    }

    /// Returns when the post was made.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the rendered body.
    pub fn content_html(&self) -> &str {
        &self.content_html
    }

    /// Returns the body as plain text.
    pub fn content(&self) -> &str {
        &self.content
    }
}

#[derive(Debug, Deserialize)]
struct BbCode {
    #[serde(rename = "bbCode")]
    bb_code: Option<String>,
}

/// A message on a member's profile wall.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilePost {
    id: u64,
    author: Author,
    /// Owner of the wall the message was left on.
    profile: Author,
    created_at: DateTime<Utc>,
    content_html: String,
    content: String,
}

impl ProfilePost {
    /// Fetches profile post `post_id`.
    ///
    /// Returns `Ok(None)` when the message was deleted or is not visible.
    ///
    /// # Errors
    ///
    /// Fails on transport errors or when the markup is incomplete.
    pub async fn fetch(session: &Session, post_id: u64) -> Result<Option<Self>> {
        let page = session.html(&format!("/profile-posts/{post_id}")).await?;
        parse_profile_post(post_id, &page)
    }

    /// Reacts to `post_id` with `reaction_id`.
    ///
    /// # Errors
    ///
    /// Fails on transport errors.
    pub async fn react(session: &Session, post_id: u64, reaction_id: u32) -> Result<Submission> {
        session
            .submit(
                &format!("/profile-posts/{post_id}/react?reaction_id={reaction_id}"),
                Form::new(),
            )
            .await
    }

    /// Comments on `post_id`.
    ///
    /// # Errors
    ///
    /// Fails on transport errors.
    pub async fn comment(session: &Session, post_id: u64, message_html: &str) -> Result<Submission> {
        session
            .submit(
                &format!("/profile-posts/{post_id}/add-comment"),
                Form::new().field("message_html", message_html),
            )
            .await
    }

    /// Deletes `post_id`, softly unless `hard_delete` is set.
    ///
    /// # Errors
    ///
    /// Fails on transport errors.
    pub async fn delete(
        session: &Session,
        post_id: u64,
        reason: &str,
        hard_delete: bool,
    ) -> Result<Submission> {
        session
            .submit(
                &format!("/profile-posts/{post_id}/delete"),
                Form::new()
                    .field("reason", reason)
                    .flag("hard_delete", hard_delete),
            )
            .await
    }

    /// Replaces the body of `post_id`.
    ///
    /// # Errors
    ///
    /// Fails on transport errors.
    pub async fn edit(session: &Session, post_id: u64, message_html: &str) -> Result<Submission> {
        session
            .submit(
                &format!("/profile-posts/{post_id}/edit"),
                Form::new()
                    .field("message_html", message_html)
                    .field("message", message_html),
            )
            .await
    }

    /// Returns the profile post ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns who wrote the message.
    pub fn author(&self) -> &Author {
        &self.author
    }

    /// Returns the owner of the wall.
    pub fn profile(&self) -> &Author {
        &self.profile
    }

    /// Returns when the message was posted.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the rendered body.
    pub fn content_html(&self) -> &str {
        &self.content_html
    }

    /// Returns the body as plain text.
    pub fn content(&self) -> &str {
        &self.content
    }
}

fn missing(entity: &'static str, field: &'static str) -> Error {
    Error::MissingField { entity, field }
}

fn parse_post(post_id: u64, page: &str) -> Result<Option<Post>> {
    let doc = document(page);
    let Some(article) = doc.find(&format!("article#js-post-{post_id}"))? else {
        return Ok(None);
    };

    let author = article
        .find(POST_AUTHOR)?
        .and_then(Author::from_link)
        .ok_or_else(|| missing("post", "author"))?;
    let thread_id = CONTENT_KEY
        .get(&doc)?
        .and_then(|key| prefixed_id(&key, "thread-"))
        .ok_or_else(|| missing("post", "thread_id"))?;

    Ok(Some(Post {
        id: post_id,
        author,
        thread_id,
        created_at: POST_TIME.time("post", &article)?,
        content_html: BB_HTML.require("post", &article)?,
        content: BB_TEXT.require("post", &article)?,
    }))
}

fn parse_profile_post(post_id: u64, page: &str) -> Result<Option<ProfilePost>> {
    let doc = document(page);
    let Some(article) = doc.find(&format!("article#js-profilePost-{post_id}"))? else {
        return Ok(None);
    };

    let author = article
        .find("a.username")?
        .and_then(Author::from_link)
        .ok_or_else(|| missing("profile_post", "author"))?;
    let profile = doc
        .find(PROFILE_OWNER)?
        .and_then(Author::from_link)
        .ok_or_else(|| missing("profile_post", "profile"))?;

    Ok(Some(ProfilePost {
        id: post_id,
        author,
        profile,
        created_at: PROFILE_POST_TIME.time("profile_post", &article)?,
        content_html: BB_HTML.require("profile_post", &article)?,
        content: BB_TEXT.require("profile_post", &article)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const POST_PAGE: &str = r#"
        <html data-content-key="thread-9" data-logged-in="true">
        <body>
          <article id="js-post-500" class="message">
            <a href="/members/1/" data-xf-init="member-tooltip" data-user-id="1">Other</a>
          </article>
          <article id="js-post-501" class="message">
            <a href="/members/77/" class="username" data-xf-init="member-tooltip" data-user-id="77">Ann_Lee</a>
            <time class="u-dt" data-time="1700000100">Nov</time>
            <div class="bbWrapper">Reply <i>text</i></div>
          </article>
        </body></html>"#;

    const PROFILE_POST_PAGE: &str = r#"
        <html><body>
          <div class="memberHeader"><span class="username" data-user-id="12">Wall_Owner</span></div>
          <article id="js-profilePost-33" class="message">
            <a href="/members/40/" class="username" data-user-id="40">Visitor</a>
            <time class="u-dt" data-time="1690000000">Jul</time>
            <div class="bbWrapper">Hi!</div>
          </article>
        </body></html>"#;

    #[test]
    fn parses_post_by_id() {
        let post = parse_post(501, POST_PAGE).unwrap().unwrap();
        assert_eq!(post.author(), &Author::new(77, "Ann_Lee"));
        assert_eq!(post.thread_id(), 9);
        assert_eq!(post.created_at().timestamp(), 1_700_000_100);
        assert_eq!(post.content(), "Reply text");
        assert_eq!(post.content_html(), "Reply <i>text</i>");
    }

    #[test]
    fn absent_post_is_none() {
        assert!(parse_post(999, POST_PAGE).unwrap().is_none());
    }

    #[test]
    fn incomplete_post_is_an_error() {
        let err = parse_post(500, POST_PAGE).unwrap_err();
        assert!(matches!(err, Error::MissingField { entity: "post", .. }));
    }

    #[test]
    fn parses_profile_post() {
        let post = parse_profile_post(33, PROFILE_POST_PAGE).unwrap().unwrap();
        assert_eq!(post.author(), &Author::new(40, "Visitor"));
        assert_eq!(post.profile(), &Author::new(12, "Wall_Owner"));
        assert_eq!(post.created_at().timestamp(), 1_690_000_000);
        assert_eq!(post.content(), "Hi!");
        assert!(parse_profile_post(34, PROFILE_POST_PAGE).unwrap().is_none());
    }
}
