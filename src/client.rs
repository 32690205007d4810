use std::{sync::Arc, time::Duration};

use crate::{config::SessionConfig, result::Result};
use reqwest::{
    cookie::Jar,
    header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT},
    Client as ReqwestClient, StatusCode,
};
use serde::{Deserialize, Serialize};
use tokio::{sync::Mutex, time::Instant};
use url::Url;

/// Name of the anti-forgery field every mutating request carries.
pub(crate) const TOKEN_FIELD: &str = "_xfToken";

/// Low level transport shared by every operation of a [`Session`].
///
/// [`Session`]: crate::Session
#[derive(Debug)]
pub(crate) struct Client {
    http: ReqwestClient,
    base: Url,
    limiter: RateLimit,
}

/// Keeps consecutive requests at least `interval` apart.
#[derive(Debug)]
pub(crate) struct RateLimit {
    interval: Option<Duration>,
    last: Mutex<Option<Instant>>,
}

impl RateLimit {
    pub(crate) fn new(interval: Option<Duration>) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    pub(crate) async fn acquire(&self) {
        let Some(interval) = self.interval else {
            return;
        };
        let mut last = self.last.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < interval {
                log::debug!("requesting too often! rate-limiting..");
                tokio::time::sleep(interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

impl Client {
    pub(crate) fn new(config: &SessionConfig, jar: Arc<Jar>) -> Result<Client> {
        let base = Url::parse(config.base_url())?;

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_str(config.user_agent())?);
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/json;q=0.9,*/*;q=0.8"),
        );

        let mut builder = ReqwestClient::builder()
            .default_headers(headers)
            .cookie_provider(jar);
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        let limiter = RateLimit::new(config.min_request_interval());

        Ok(Client {
            http,
            base,
            limiter,
        })
    }

    pub(crate) fn base(&self) -> &Url {
        &self.base
    }

    pub(crate) fn url(&self, path: &str) -> Result<Url> {
        self.base.join(path).map_err(Into::into)
    }

    /// Fetches a server-rendered page. The body is returned whatever the
    /// status, since the forum renders "not found" as a regular page.
    pub(crate) async fn fetch_html(&self, path: &str, query: &[(&str, String)]) -> Result<String> {
        let url = self.url(path)?;
        self.limiter.acquire().await;
        log::info!("request for {} dispatched", url);
        let response = self.http.get(url).query(query).send().await?;
        log::debug!("response status: {}", response.status());
        response.text().await.map_err(Into::into)
    }

    /// Fetches the pseudo-JSON variant of a page.
    pub(crate) async fn fetch_envelope(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Envelope> {
        let url = self.url(path)?;
        self.limiter.acquire().await;
        log::info!("request for {} dispatched (json)", url);
        let response = self
            .http
            .get(url)
            .query(&[("_xfResponseType", "json")])
            .query(query)
            .send()
            .await?;
        log::debug!("response status: {}", response.status());

        let body = response.text().await?;
        let envelope: Envelope = serde_json::from_str(&body)?;
        if envelope.is_error() {
            log::debug!("envelope reported an error for {}", path);
        }
        Ok(envelope)
    }

    /// Submits a url-encoded form and reports what came back verbatim.
    pub(crate) async fn post_form(&self, path: &str, form: &Form) -> Result<Submission> {
        let url = self.url(path)?;
        self.limiter.acquire().await;
        log::info!("form for {} dispatched", url);
        let response = self.http.post(url).form(&form.fields).send().await?;

        let status = response.status();
        let url = response.url().to_string();
        log::debug!("response status: {}", status);
        let body = response.text().await?;
        Ok(Submission { status, url, body })
    }

    /// Submits a form to an endpoint that answers with plain JSON.
    pub(crate) async fn post_json<T>(&self, path: &str, form: &Form) -> Result<T>
    where
        T: for<'a> Deserialize<'a>,
    {
        let submission = self.post_form(path, form).await?;
        serde_json::from_str(submission.body()).map_err(Into::into)
    }
}

/// The `_xfResponseType=json` wrapper: rendered fragments plus a status.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Envelope {
    #[serde(default)]
    pub(crate) status: String,
    #[serde(default)]
    pub(crate) html: Option<Fragments>,
    #[serde(default)]
    pub(crate) redirect: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Fragments {
    #[serde(default)]
    pub(crate) content: String,
    #[serde(default)]
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) h1: String,
}

impl Envelope {
    pub(crate) fn is_error(&self) -> bool {
        self.status == "error"
    }

    /// Fragments of a successful response, `None` when the forum said no.
    pub(crate) fn into_fragments(self) -> Option<Fragments> {
        if self.is_error() {
            None
        } else {
            Some(self.html.unwrap_or_default())
        }
    }
}

/// Url-encoded form fields. Keys may repeat.
#[derive(Debug, Clone, Default)]
pub(crate) struct Form {
    fields: Vec<(String, String)>,
}

impl Form {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn field(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.fields.push((key.into(), value.to_string()));
        self
    }

    /// Booleans travel as `1`/`0`.
    pub(crate) fn flag(self, key: impl Into<String>, value: bool) -> Self {
        self.field(key, u8::from(value))
    }

    pub(crate) fn token(self, token: &str) -> Self {
        self.field(TOKEN_FIELD, token)
    }

    #[cfg(test)]
    pub(crate) fn fields(&self) -> &[(String, String)] {
        &self.fields
    }
}

/// Raw outcome of a write action.
///
/// The forum answers most actions with a redirect or a re-rendered page; the
/// outcome is handed back as-is, so an accepted action and a silently ignored
/// one look the same at this level.
#[derive(Debug, Clone)]
pub struct Submission {
    status: StatusCode,
    url: String,
    body: String,
}

impl Submission {
    /// Returns the final HTTP status.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the URL the response came from, after redirects.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the response body.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Whether the transport reported a 2xx status.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_error_has_no_fragments() {
        let env: Envelope =
            serde_json::from_str(r#"{"status":"error","errors":["The requested member could not be found."]}"#)
                .unwrap();
        assert!(env.is_error());
        assert!(env.into_fragments().is_none());
    }

    #[test]
    fn envelope_ok_keeps_fragments() {
        let env: Envelope = serde_json::from_str(
            r#"{"status":"ok","html":{"content":"<p>x</p>","title":"Title","h1":"H"},"redirect":null}"#,
        )
        .unwrap();
        let html = env.into_fragments().unwrap();
        assert_eq!(html.content, "<p>x</p>");
        assert_eq!(html.title, "Title");
    }

    #[test]
    fn form_encodes_flags_and_repeats() {
        let form = Form::new()
            .flag("stop", true)
            .flag("email_subscribe", false)
            .field("alert_id", 1)
            .field("alert_id", 2)
            .token("t");
        let fields: Vec<(&str, &str)> = form
            .fields()
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(
            fields,
            vec![
                ("stop", "1"),
                ("email_subscribe", "0"),
                ("alert_id", "1"),
                ("alert_id", "2"),
                ("_xfToken", "t"),
            ]
        );
    }

    #[tokio::test]
    async fn rate_limit_spaces_requests() {
        let limiter = RateLimit::new(Some(Duration::from_millis(30)));
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}
