use async_trait::async_trait;
use scraper::ElementRef;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    client::{Form, Fragments, Submission},
    error::Error,
    extract::{document, pages_count, prefixed_id, text_of, unescape, Field, Scope, Source},
    models::{macros::str_opt_ref, username_color, DEFAULT_USERNAME_COLOR},
    paginate::{collect_all_pages, AggregatedCollection, PageFetcher, PageResult},
    result::Result,
    session::Session,
};

const ENTITY: &str = "member";

const USER_TITLE: Field = Field::text("user_title", "span.userTitle");
const AVATAR: Field = Field::attr("avatar", "a.avatar.avatar--l", "href");
const REACTIONS: Field = Field::text(
    "reactions_count",
    r#"dl[class="pairs pairs--rows pairs--rows--centered"] dd"#,
);
const BANNERS: &str = "div.memberHeader-banners";
const PROFILE_POST: &str = r#"article[id^="js-profilePost-"]"#;

/// A member profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    id: u64,
    username: String,
    user_title: Option<String>,
    /// Absolute URL of the large avatar.
    avatar: Option<String>,
    /// Group banners shown under the name, top to bottom.
    roles: Vec<String>,
    messages_count: u64,
    reactions_count: u64,
    trophies_count: u64,
    username_color: String,
}

impl Member {
    /// Fetches the profile of `member_id`.
    ///
    /// Returns `Ok(None)` when the member does not exist or hides the profile.
    ///
    /// # Errors
    ///
    /// Fails on transport errors or when the profile markup lacks one of the
    /// counters.
    pub async fn fetch(session: &Session, member_id: u64) -> Result<Option<Self>> {
        let envelope = session.envelope(&format!("/members/{member_id}")).await?;
        let Some(html) = envelope.into_fragments() else {
            log::debug!("member {member_id} not available");
            return Ok(None);
        };
        parse(member_id, &html, session.client().base()).map(Some)
    }

    /// Toggles following `member_id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SelfReference`] without sending anything when
    /// `member_id` is the current account.
    pub async fn follow(session: &Session, member_id: u64) -> Result<Submission> {
        ensure_not_self(session, member_id).await?;
        session
            .submit(&format!("/members/{member_id}/follow"), Form::new())
            .await
    }

    /// Toggles ignoring `member_id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SelfReference`] without sending anything when
    /// `member_id` is the current account.
    pub async fn ignore(session: &Session, member_id: u64) -> Result<Submission> {
        ensure_not_self(session, member_id).await?;
        session
            .submit(&format!("/members/{member_id}/ignore"), Form::new())
            .await
    }

    /// Leaves a message on the profile wall of `member_id`.
    ///
    /// # Errors
    ///
    /// Fails on transport errors.
    pub async fn post_on_profile(
        session: &Session,
        member_id: u64,
        message_html: &str,
    ) -> Result<Submission> {
        session
            .submit(
                &format!("/members/{member_id}/post"),
                Form::new().field("message_html", message_html),
            )
            .await
    }

    /// Lists profile-post ids on one page of the wall of `member_id`.
    ///
    /// # Errors
    ///
    /// Fails on transport errors.
    pub async fn profile_posts_page(
        session: &Session,
        member_id: u64,
        page: u32,
    ) -> Result<PageResult<u64>> {
        let envelope = session
            .envelope(&format!("/members/{member_id}/page-{page}"))
            .await?;
        match envelope.into_fragments() {
            Some(html) => parse_profile_posts(&html.content),
            None => Ok(PageResult::error()),
        }
    }

    /// Profile-post ids on one page, `None` when the wall is not visible.
    ///
    /// # Errors
    ///
    /// Fails on transport errors.
    pub async fn profile_posts(
        session: &Session,
        member_id: u64,
        page: u32,
    ) -> Result<Option<Vec<u64>>> {
        Ok(Self::profile_posts_page(session, member_id, page)
            .await?
            .into_option())
    }

    /// Every profile-post id on the wall of `member_id`, across all pages.
    ///
    /// # Errors
    ///
    /// Fails on transport errors.
    pub async fn all_profile_posts(
        session: &Session,
        member_id: u64,
    ) -> Result<AggregatedCollection<u64>> {
        collect_all_pages(member_id, &ProfilePostPages { session }).await
    }

    /// Returns the member id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the display name.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the custom title under the name (if set).
    pub fn user_title(&self) -> Option<&str> {
        str_opt_ref!(self.user_title)
    }

    /// Returns the absolute avatar URL (if the member uploaded one).
    pub fn avatar(&self) -> Option<&str> {
        str_opt_ref!(self.avatar)
    }

    /// Returns the group banners.
    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    /// Returns the number of messages.
    pub fn messages_count(&self) -> u64 {
        self.messages_count
    }

    /// Returns the reaction score.
    pub fn reactions_count(&self) -> u64 {
        self.reactions_count
    }

    /// Returns the number of trophies.
    pub fn trophies_count(&self) -> u64 {
        self.trophies_count
    }

    /// Returns the colour the username is painted in.
    pub fn username_color(&self) -> &str {
        &self.username_color
    }
}

#[cfg(feature = "display")]
impl std::fmt::Display for Member {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (#{}) | messages: {} | reactions: {} | trophies: {}",
            self.username, self.id, self.messages_count, self.reactions_count, self.trophies_count
        )
    }
}

struct ProfilePostPages<'s> {
    session: &'s Session,
}

#[async_trait]
impl PageFetcher for ProfilePostPages<'_> {
    type Item = u64;

    async fn fetch_page(&self, member_id: u64, page: u32) -> Result<PageResult<u64>> {
        Member::profile_posts_page(self.session, member_id, page).await
    }
}

async fn ensure_not_self(session: &Session, member_id: u64) -> Result<()> {
    if session.current_member_id().await? == member_id {
        return Err(Error::SelfReference(member_id));
    }
    Ok(())
}

fn parse(member_id: u64, html: &Fragments, base: &Url) -> Result<Member> {
    let doc = document(&html.content);

    let username = unescape(html.title.trim());
    let username_color = doc
        .find("span.username")?
        .map_or(DEFAULT_USERNAME_COLOR, |el| username_color(&el.html()))
        .to_string();

    let roles = match doc.find(BANNERS)? {
        Some(banners) => banners
            .children()
            .filter_map(ElementRef::wrap)
            .map(text_of)
            .filter(|text| !text.is_empty())
            .collect(),
        None => Vec::new(),
    };

    let user_title = USER_TITLE.get(&doc)?;
    let avatar = match AVATAR.get(&doc)? {
        Some(href) => Some(base.join(&href)?.to_string()),
        None => None,
    };

    let messages = Field::dynamic(
        "messages_count",
        format!(r#"a[href="/search/member?user_id={member_id}"]"#),
        Source::Text,
    );
    let trophies = Field::dynamic(
        "trophies_count",
        format!(r#"a[href="/members/{member_id}/trophies"]"#),
        Source::Text,
    );

    Ok(Member {
        id: member_id,
        username,
        user_title,
        avatar,
        roles,
        messages_count: messages.count(ENTITY, &doc)?,
        reactions_count: REACTIONS.count(ENTITY, &doc)?,
        trophies_count: trophies.count(ENTITY, &doc)?,
        username_color,
    })
}

fn parse_profile_posts(content: &str) -> Result<PageResult<u64>> {
    let doc = document(content);
    let ids = doc
        .find_all(PROFILE_POST)?
        .into_iter()
        .filter_map(|article| article.value().id())
        .filter_map(|id| prefixed_id(id, "js-profilePost-"))
        .collect();
    Ok(PageResult::ok(ids, pages_count(&doc)?))
}
