use std::sync::Arc;

use reqwest::cookie::Jar;
use tokio::sync::OnceCell;

use crate::{
    antibot::AntiBotSolver,
    client::{Client, Envelope, Form, Submission},
    config::SessionConfig,
    error::Error,
    extract::{document, Field},
    models::member::Member,
    result::Result,
};

const LOGGED_IN: Field = Field::attr("data-logged-in", "html", "data-logged-in");
const CSRF: Field = Field::attr("data-csrf", "html", "data-csrf");
const ACCOUNT_ID: Field = Field::attr("data-user-id", "span.avatar--xxs", "data-user-id");

/// An authenticated browser-like session against the forum.
///
/// A `Session` only exists once the forum has confirmed the cookies belong
/// to a logged-in account, so every operation taking `&Session` runs
/// against a validated login. Operations are meant to be used sequentially:
/// the anti-forgery token is fetched fresh for each write, but nothing
/// serializes two writes racing on the same session.
#[derive(Debug)]
pub struct Session {
    client: Client,
    me: OnceCell<u64>,
}

impl Session {
    /// Brings up a session and checks that the forum sees it as logged in.
    ///
    /// When `config` asks for the anti-bot challenge, `antibot` is invoked
    /// once and its cookie is merged into the jar before the check.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Authentication`] when the forum root reports the
    /// session as logged out, whatever the reason (bad cookies, bad anti-bot
    /// cookie). Returns [`Error::AntiBot`] when a challenge is required but no
    /// solver was given. Transport failures are returned as they are.
    pub async fn initialize(
        config: SessionConfig,
        antibot: Option<&dyn AntiBotSolver>,
    ) -> Result<Self> {
        let base = url::Url::parse(config.base_url())?;
        let jar = Arc::new(Jar::default());
        for (name, value) in config.cookies() {
            jar.add_cookie_str(&format!("{name}={value}"), &base);
        }

        if config.run_antibot() {
            let solver = antibot.ok_or_else(|| {
                Error::AntiBot("challenge requested but no solver was supplied".into())
            })?;
            let cookie = solver.solve(config.user_agent()).await?;
            log::debug!("anti-bot challenge produced cookie `{}`", cookie.name());
            jar.add_cookie_str(&cookie.to_string(), &base);
        }

        let client = Client::new(&config, jar)?;
        let root = client.fetch_html("/", &[]).await?;
        if !is_logged_in(&root)? {
            log::warn!("forum reports the session as logged out");
            return Err(Error::Authentication);
        }
        log::info!("session established against {}", client.base());

        Ok(Session {
            client,
            me: OnceCell::new(),
        })
    }

    /// Closes the session and drops its cookie jar.
    pub fn logout(self) {
        log::debug!("session closed");
    }

    /// Fetches a fresh anti-forgery token.
    ///
    /// # Errors
    ///
    /// Fails when the page cannot be fetched or carries no token.
    pub async fn token(&self) -> Result<String> {
        let page = self.client.fetch_html("/help/terms/", &[]).await?;
        read_token(&page)
    }

    /// Returns the member id of the logged-in account.
    ///
    /// The id is read once and remembered for the lifetime of the session.
    ///
    /// # Errors
    ///
    /// Fails when the account page cannot be fetched or parsed.
    pub async fn current_member_id(&self) -> Result<u64> {
        self.me
            .get_or_try_init(|| async {
                let page = self.client.fetch_html("/account", &[]).await?;
                read_account_id(&page)
            })
            .await
            .copied()
    }

    /// Returns the full profile of the logged-in account.
    ///
    /// # Errors
    ///
    /// Fails when the account page or the profile cannot be fetched. A
    /// profile the forum refuses to show is reported as `Ok(None)`.
    pub async fn current_member(&self) -> Result<Option<Member>> {
        let id = self.current_member_id().await?;
        Member::fetch(self, id).await
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }

    pub(crate) async fn html(&self, path: &str) -> Result<String> {
        self.client.fetch_html(path, &[]).await
    }

    /// Fetches the pseudo-JSON variant of `path` with a fresh token attached.
    pub(crate) async fn envelope(&self, path: &str) -> Result<Envelope> {
        self.envelope_with(path, Vec::new()).await
    }

    pub(crate) async fn envelope_with(
        &self,
        path: &str,
        mut query: Vec<(&str, String)>,
    ) -> Result<Envelope> {
        let token = self.token().await?;
        query.push((crate::client::TOKEN_FIELD, token));
        self.client.fetch_envelope(path, &query).await
    }

    /// Posts `form` to `path` with a token fetched for this call only.
    pub(crate) async fn submit(&self, path: &str, form: Form) -> Result<Submission> {
        let token = self.token().await?;
        self.client.post_form(path, &form.token(&token)).await
    }

    /// Like [`Session::submit`], for endpoints answering with plain JSON.
    pub(crate) async fn submit_json<T>(&self, path: &str, form: Form) -> Result<T>
    where
        T: for<'a> serde::Deserialize<'a>,
    {
        let token = self.token().await?;
        self.client.post_json(path, &form.token(&token)).await
    }
}

fn is_logged_in(page: &str) -> Result<bool> {
    let doc = document(page);
    Ok(LOGGED_IN.get(&doc)?.is_some_and(|v| v == "true"))
}

fn read_token(page: &str) -> Result<String> {
    let doc = document(page);
    CSRF.require("page", &doc)
}

fn read_account_id(page: &str) -> Result<u64> {
    let doc = document(page);
    ACCOUNT_ID
        .require("account", &doc)?
        .parse()
        .map_err(|_| Error::MissingField {
            entity: "account",
            field: ACCOUNT_ID.name(),
        })
}
