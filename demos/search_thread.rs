//! This example shows:
//! - Bringing up a session from cookies
//! - Searching threads by a query
//! - Printing the results as JSON

use arzforum::models::search::SearchOrder;
use arzforum::{SearchResult, Session, SessionConfig};

/// Type alias for simplifying error handling
type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[tokio::main]
async fn main() -> Result<()> {
    simple_logger::init_with_level(log::Level::Info)?;

    // Cookies copied from a logged-in browser
    let config = SessionConfig::default()
        .with_user_agent(std::env::var("FORUM_USER_AGENT").unwrap_or_else(|_| "Mozilla/5.0".into()))
        .with_cookie("xf_user", std::env::var("XF_USER").unwrap_or_default())
        .with_cookie("xf_tfa_trust", std::env::var("XF_TFA_TRUST").unwrap_or_default())
        .with_cookie("xf_session", std::env::var("XF_SESSION").unwrap_or_default())
        .with_antibot(false);
    let session = Session::initialize(config, None).await?;

    // Search threads mentioning "Nicolas_Reed"
    let threads = SearchResult::threads(&session, "Nicolas_Reed", SearchOrder::Relevance).await?;
    println!("{}", serde_json::to_string_pretty(&threads)?);

    session.logout();
    Ok(())
}
