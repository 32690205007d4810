use thiserror::Error;

/// Everything that can go wrong while talking to the forum.
///
/// A resource that does not exist or is hidden from the current account is
/// not an error: fetchers report it as `Ok(None)`.
#[derive(Debug, Error)]
pub enum Error {
    /// The forum root reported the session as logged out.
    #[error("the forum did not accept the session cookies")]
    Authentication,

    /// The action cannot target the account that performs it.
    #[error("member {0} is the current account")]
    SelfReference(u64),

    /// A field the record cannot exist without was absent from the markup.
    #[error("{entity}: missing required field `{field}`")]
    MissingField {
        /// Kind of record being extracted.
        entity: &'static str,
        /// Name of the absent field.
        field: &'static str,
    },

    /// A CSS selector failed to parse.
    #[error("invalid selector: {0}")]
    Selector(String),

    /// The anti-bot step could not produce a usable cookie.
    #[error("anti-bot challenge: {0}")]
    AntiBot(String),

    /// The configured user agent is not a valid header value.
    #[error("{0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    /// Transport failure.
    #[error("{0}")]
    Reqwest(#[from] reqwest::Error),

    /// A path could not be joined onto the base URL.
    #[error("{0}")]
    Url(#[from] url::ParseError),

    /// The pseudo-JSON envelope was not valid JSON.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}
