use std::{collections::BTreeMap, time::Duration};

use serde::{Deserialize, Serialize};

/// Origin every request is sent to unless overridden.
pub const DEFAULT_BASE_URL: &str = "https://forum.arizona-rp.com";

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Everything needed to bring up a [`Session`].
///
/// The config can be built in code with the `with_*` methods or deserialized
/// from any serde format. Missing keys fall back to [`SessionConfig::default`].
///
/// ```rust
/// use arzforum::SessionConfig;
///
/// let config = SessionConfig::default()
///     .with_user_agent("my-agent/1.0")
///     .with_cookie("xf_user", "123,abc")
///     .with_cookie("xf_session", "deadbeef")
///     .with_antibot(false);
///
/// assert_eq!(config.cookies().len(), 2);
/// ```
///
/// [`Session`]: crate::Session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    base_url: String,
    user_agent: String,
    cookies: BTreeMap<String, String>,
    run_antibot: bool,
    /// Per-request timeout in milliseconds.
    timeout_ms: Option<u64>,
    /// Minimum gap between two requests in milliseconds.
    min_request_interval: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            cookies: BTreeMap::new(),
            run_antibot: true,
            timeout_ms: None,
            min_request_interval: None,
        }
    }
}

impl SessionConfig {
    /// Points the session at another origin.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the identity string sent as `User-Agent`.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Seeds one credential cookie.
    #[must_use]
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    /// Replaces the whole credential cookie set.
    #[must_use]
    pub fn with_cookies<I, K, V>(mut self, cookies: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.cookies = cookies
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    /// Whether the anti-bot challenge must be solved before logging in.
    #[must_use]
    pub fn with_antibot(mut self, run_antibot: bool) -> Self {
        self.run_antibot = run_antibot;
        self
    }

    /// Sets a per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Enforces a minimum gap between consecutive requests.
    #[must_use]
    pub fn with_min_request_interval(mut self, interval: Duration) -> Self {
        self.min_request_interval = Some(u64::try_from(interval.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Returns the origin requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the configured user agent.
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Returns the credential cookies, ordered by name.
    pub fn cookies(&self) -> &BTreeMap<String, String> {
        &self.cookies
    }

    /// Returns whether the anti-bot challenge runs at start-up.
    pub fn run_antibot(&self) -> bool {
        self.run_antibot
    }

    /// Returns the per-request timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Returns the minimum gap between requests, if any.
    pub fn min_request_interval(&self) -> Option<Duration> {
        self.min_request_interval.map(Duration::from_millis)
    }
}
