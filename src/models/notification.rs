use chrono::{DateTime, Utc};
use scraper::ElementRef;
use serde::{Deserialize, Serialize};

use crate::{
    client::{Form, Submission},
    extract::{document, parse_unix, squashed_text, text_of, Scope},
    models::macros::str_opt_ref,
    result::Result,
    session::Session,
};

const ALERT: &str = "li.js-alert[data-alert-id]";

/// One entry of the account's alert list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    id: u64,
    is_unread: bool,
    text: Option<String>,
    link: Option<String>,
    sender: Option<Sender>,
    /// `datetime` attribute as the forum printed it.
    time_iso: Option<String>,
    time: Option<DateTime<Utc>>,
}

/// Who triggered a notification.
///
/// Members without an uploaded avatar are drawn as a coloured square with
/// their initials, in which case `avatar` is empty and the other two are set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    id: u64,
    name: String,
    avatar: Option<String>,
    avatar_color: Option<String>,
    initials: Option<String>,
}

impl Notification {
    /// Lists the alerts on the first page of `/account/alerts`.
    ///
    /// # Errors
    ///
    /// Fails on transport errors.
    pub async fn fetch_all(session: &Session) -> Result<Vec<Self>> {
        let page = session.html("/account/alerts").await?;
        parse(&page)
    }

    /// Toggles the read state of `alert_ids`, marking unread alerts read.
    ///
    /// # Errors
    ///
    /// Fails on transport errors.
    pub async fn mark_read(session: &Session, alert_ids: &[u64]) -> Result<Submission> {
        let form = alert_ids
            .iter()
            .fold(Form::new(), |form, id| form.field("alert_id", id))
            .field("_xfAction", "toggle")
            .field("_xfWithData", 1);
        session.submit("/account/alert-toggle", form).await
    }

    /// Returns the alert id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether the alert has not been read yet.
    pub fn is_unread(&self) -> bool {
        self.is_unread
    }

    /// Returns the alert text.
    pub fn text(&self) -> Option<&str> {
        str_opt_ref!(self.text)
    }

    /// Returns the link the alert points at.
    pub fn link(&self) -> Option<&str> {
        str_opt_ref!(self.link)
    }

    /// Returns who triggered the alert (system alerts have no sender).
    pub fn sender(&self) -> Option<&Sender> {
        self.sender.as_ref()
    }

    /// Returns the ISO-8601 timestamp.
    pub fn time_iso(&self) -> Option<&str> {
        str_opt_ref!(self.time_iso)
    }

    /// Returns the timestamp.
    pub fn time(&self) -> Option<DateTime<Utc>> {
        self.time
    }
}

impl Sender {
    /// Returns the member id, `0` when the link carried none.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the avatar image URL.
    pub fn avatar(&self) -> Option<&str> {
        str_opt_ref!(self.avatar)
    }

    /// Returns the inline style of the placeholder avatar.
    pub fn avatar_color(&self) -> Option<&str> {
        str_opt_ref!(self.avatar_color)
    }

    /// Returns the initials of the placeholder avatar.
    pub fn initials(&self) -> Option<&str> {
        str_opt_ref!(self.initials)
    }
}

#[cfg(feature = "display")]
impl std::fmt::Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let marker = if self.is_unread { "*" } else { " " };
        write!(
            f,
            "{marker} [{}] {}",
            self.id,
            self.text.as_deref().unwrap_or_default()
        )
    }
}

fn parse(page: &str) -> Result<Vec<Notification>> {
    let doc = document(page);
    let mut alerts = Vec::new();
    for alert in doc.find_all(ALERT)? {
        let Some(id) = alert
            .value()
            .attr("data-alert-id")
            .and_then(|id| id.parse().ok())
        else {
            log::warn!("skipping alert with a malformed id");
            continue;
        };
        alerts.push(parse_alert(id, alert)?);
    }
    Ok(alerts)
}

fn parse_alert(id: u64, alert: ElementRef<'_>) -> Result<Notification> {
    let time = alert.find("time")?;
    Ok(Notification {
        id,
        is_unread: alert.value().classes().any(|class| class == "is-unread"),
        text: alert.find("div.contentRow-main")?.map(squashed_text),
        link: alert
            .find("a.fauxBlockLink-blockLink")?
            .and_then(|a| a.value().attr("href"))
            .map(ToString::to_string),
        sender: parse_sender(alert)?,
        time_iso: time
            .and_then(|t| t.value().attr("datetime"))
            .map(ToString::to_string),
        time: time
            .and_then(|t| t.value().attr("data-time"))
            .and_then(parse_unix),
    })
}

fn parse_sender(alert: ElementRef<'_>) -> Result<Option<Sender>> {
    let Some(link) = alert.find("a.username")? else {
        return Ok(None);
    };
    let mut sender = Sender {
        id: link
            .value()
            .attr("data-user-id")
            .and_then(|id| id.parse().ok())
            .unwrap_or_default(),
        name: text_of(link),
        avatar: None,
        avatar_color: None,
        initials: None,
    };

    let image = alert
        .find("img.avatar")?
        .and_then(|img| img.value().attr("src"));
    if let Some(src) = image {
        sender.avatar = Some(src.to_string());
    } else if let Some(placeholder) = alert.find("span.avatar-u")? {
        sender.avatar_color = placeholder.value().attr("style").map(ToString::to_string);
        sender.initials = Some(text_of(placeholder));
    }
    Ok(Some(sender))
}
