#![deny(clippy::all, clippy::pedantic)]
#![deny(missing_docs)]
#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]
//! # arzforum
//!
//! arzforum is a client library for a XenForo based roleplay forum that has
//! no public API. It drives a logged-in browser session: pages and their
//! `_xfResponseType=json` fragments are scraped for data, and actions are
//! submitted as the same forms the site's own pages post.
//!
//! This library can read:
//! - [`Member`] profiles and their profile posts
//! - [`Thread`]s, their [`Post`]s and BB-code sources
//! - [`Category`] listings, children and parents
//! - [`Notification`]s, forum [`Statistic`]s and thread search results
//!
//! And act on them: reply, react, edit, delete, watch, follow and so on.
//! Every action fetches a fresh anti-forgery token and returns the raw
//! [`Submission`].
//!
//! ## Example: Printing every post of a thread.
//!
//! ```rust,no_run
//! # type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
//! use arzforum::{Post, Session, SessionConfig, Thread};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = SessionConfig::default()
//!         .with_user_agent("Mozilla/5.0")
//!         .with_cookie("xf_user", "...")
//!         .with_cookie("xf_session", "...")
//!         .with_antibot(false);
//!     let session = Session::initialize(config, None).await?;
//!
//!     for post_id in Thread::all_posts(&session, 5_432_100).await?.iter() {
//!         if let Some(post) = Post::fetch(&session, *post_id).await? {
//!             println!("{}: {}", post.author().username(), post.content());
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! [`Member`]:       crate::models::member::Member
//! [`Thread`]:       crate::models::thread::Thread
//! [`Post`]:         crate::models::post::Post
//! [`Category`]:     crate::models::category::Category
//! [`Notification`]: crate::models::notification::Notification
//! [`Statistic`]:    crate::models::statistic::Statistic

/// Anti-bot challenge hook run before the session is validated.
pub mod antibot;

pub(crate) mod client;

/// [`SessionConfig`] for bringing up a [`Session`].
///
/// [`SessionConfig`]: crate::config::SessionConfig
/// [`Session`]: crate::session::Session
pub mod config;

/// Contains [`Error`]s that can be thrown by the library.
///
/// [`Error`]: crate::error::Error
pub mod error;

pub(crate) mod extract;

/// Records read from the forum and the actions that apply to them.
pub mod models;

/// Walks paginated listings to the end.
pub mod paginate;

pub(crate) mod result;

/// Session module contains [`Session`], the entry point of every operation.
///
/// [`Session`]: crate::session::Session
pub mod session;

pub use antibot::{AntiBotCookie, AntiBotSolver, StaticCookie};
pub use client::Submission;
pub use config::SessionConfig;
pub use error::Error;
pub use models::{
    category::Category, form::FormAnswers, member::Member, notification::Notification,
    post::{Post, ProfilePost}, search::SearchResult, statistic::Statistic, thread::Thread, Author,
};
pub use paginate::{collect_all_pages, AggregatedCollection, PageFetcher, PageResult, PageStatus};
pub use result::Result;
pub use session::Session;
