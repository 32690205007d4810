//! This example shows:
//! - Bringing up a session from cookies
//! - Listing the account's notifications
//! - Marking the first one as read

use arzforum::{Notification, Session, SessionConfig};

/// Type alias for simplifying error handling
type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[tokio::main]
async fn main() -> Result<()> {
    simple_logger::init_with_level(log::Level::Info)?;

    let config = SessionConfig::default()
        .with_user_agent(std::env::var("FORUM_USER_AGENT").unwrap_or_else(|_| "Mozilla/5.0".into()))
        .with_cookie("xf_user", std::env::var("XF_USER").unwrap_or_default())
        .with_cookie("xf_tfa_trust", std::env::var("XF_TFA_TRUST").unwrap_or_default())
        .with_cookie("xf_session", std::env::var("XF_SESSION").unwrap_or_default())
        .with_antibot(false);
    let session = Session::initialize(config, None).await?;

    let notifications = Notification::fetch_all(&session).await?;

    // Mark the newest notification as read
    if let Some(first) = notifications.first() {
        let outcome = Notification::mark_read(&session, &[first.id()]).await?;
        println!("mark read: {}", outcome.status());
    }
    println!("{}", serde_json::to_string_pretty(&notifications)?);

    Ok(())
}
