/// Forum sections, their thread listings and moderation actions.
pub mod category;
/// Answers to the forum's application forms.
pub mod form;
/// Member profiles, profile posts and follow/ignore actions.
pub mod member;
/// Account alerts.
pub mod notification;
/// Thread posts and profile posts.
pub mod post;
/// Thread search.
pub mod search;
/// Front page counters.
pub mod statistic;
/// Threads, their posts and thread actions.
pub mod thread;

use scraper::ElementRef;
use serde::{Deserialize, Serialize};

use crate::extract::text_of;

/// Colour shown for usernames without a group style.
pub const DEFAULT_USERNAME_COLOR: &str = "#fff";

/// Best-effort mapping from group style classes to username colours.
///
/// The colours are read off the forum's stylesheet by hand and can drift when
/// it changes. Styles missing here fall back to [`DEFAULT_USERNAME_COLOR`].
const ROLE_COLORS: &[(&str, &str)] = &[
    ("username--style3", "#ff0000"),
    ("username--style4", "#0080ff"),
    ("username--style5", "#00ff00"),
    ("username--style6", "#ff8000"),
    ("username--style7", "#ffff00"),
    ("username--style8", "#9932cc"),
    ("username--style9", "#ff69b4"),
    ("username--style10", "#00ffff"),
    ("username--style11", "#808080"),
    ("username--style12", "#ffd700"),
];

/// Picks the colour of the first known group style found in `markup`.
pub(crate) fn username_color(markup: &str) -> &'static str {
    ROLE_COLORS
        .iter()
        .find(|(class, _)| {
            markup
                .split(|c: char| !(c.is_alphanumeric() || c == '-'))
                .any(|token| token == *class)
        })
        .map_or(DEFAULT_USERNAME_COLOR, |(_, color)| color)
}

/// A member as linked from other content: just enough to fetch the profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    id: u64,
    username: String,
}

impl Author {
    pub(crate) fn new(id: u64, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
        }
    }

    /// Reads a `username` link carrying `data-user-id`.
    pub(crate) fn from_link(link: ElementRef<'_>) -> Option<Self> {
        let id = link.value().attr("data-user-id")?.parse().ok()?;
        Some(Self::new(id, text_of(link)))
    }

    /// Returns the member id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the display name.
    pub fn username(&self) -> &str {
        &self.username
    }
}

pub(crate) mod macros {
    macro_rules! str_opt_ref {
        ($x:expr) => {
            $x.as_ref().map(|x| x.as_ref())
        };
    }

    pub(crate) use str_opt_ref;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colour_by_style_class() {
        assert_eq!(
            username_color(r#"<span class="username--style4 username--staff">Nick</span>"#),
            "#0080ff"
        );
        assert_eq!(
            username_color(r#"<span class="username--style2">Nick</span>"#),
            DEFAULT_USERNAME_COLOR
        );
        // whole class names only
        assert_eq!(username_color(r#"class="username--style10""#), "#00ffff");
        assert_eq!(username_color(r#"class="username--style33""#), DEFAULT_USERNAME_COLOR);
    }
}
