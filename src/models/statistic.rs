use serde::{Deserialize, Serialize};

use crate::{
    extract::{document, Field, Scope},
    models::Author,
    result::Result,
    session::Session,
};

const ENTITY: &str = "statistic";

const THREADS: Field = Field::text("threads_count", "dl.count--threads dd");
const POSTS: Field = Field::text("posts_count", "dl.count--messages dd");
const USERS: Field = Field::text("users_count", "dl.count--users dd");
const LATEST_MEMBER: &str = r#"dl[class="pairs pairs--justified"] a[data-user-id]"#;

/// Forum-wide counters from the front page sidebar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistic {
    threads_count: u64,
    posts_count: u64,
    users_count: u64,
    last_registered_member: Option<Author>,
}

impl Statistic {
    /// Reads the counters off the front page.
    ///
    /// # Errors
    ///
    /// Fails on transport errors or when one of the counters is absent.
    pub async fn fetch(session: &Session) -> Result<Self> {
        let page = session.html("/").await?;
        parse(&page)
    }

    /// Returns the number of threads.
    pub fn threads_count(&self) -> u64 {
        self.threads_count
    }

    /// Returns the number of posts.
    pub fn posts_count(&self) -> u64 {
        self.posts_count
    }

    /// Returns the number of registered members.
    pub fn users_count(&self) -> u64 {
        self.users_count
    }

    /// Returns the newest member (if the sidebar shows one).
    pub fn last_registered_member(&self) -> Option<&Author> {
        self.last_registered_member.as_ref()
    }
}

#[cfg(feature = "display")]
impl std::fmt::Display for Statistic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "threads: {} | posts: {} | members: {}",
            self.threads_count, self.posts_count, self.users_count
        )
    }
}

fn parse(page: &str) -> Result<Statistic> {
    let doc = document(page);
    Ok(Statistic {
        threads_count: THREADS.count(ENTITY, &doc)?,
        posts_count: POSTS.count(ENTITY, &doc)?,
        users_count: USERS.count(ENTITY, &doc)?,
        last_registered_member: doc.find(LATEST_MEMBER)?.and_then(Author::from_link),
    })
}
