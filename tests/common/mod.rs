//! Common test utilities and helpers
//!
//! Every integration test runs against a `wiremock` server standing in for
//! the forum.

#![allow(dead_code)]

use arzforum::{Session, SessionConfig};
use serde_json::json;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

/// Token served by the mocked `/help/terms/` page.
pub const TOKEN: &str = "test-token";

/// Member id of the logged-in account.
pub const ME: u64 = 42;

/// Front page with the logged-in marker set to `logged_in`.
pub fn front_page(logged_in: bool) -> String {
    format!(r#"<html data-logged-in="{logged_in}"><body><p>Forum</p></body></html>"#)
}

/// Config pointing at `server` with the anti-bot step disabled.
pub fn config(server: &MockServer) -> SessionConfig {
    SessionConfig::default()
        .with_base_url(server.uri())
        .with_user_agent("arzforum-tests")
        .with_cookie("xf_user", "1")
        .with_antibot(false)
}

/// A successful pseudo-JSON envelope.
pub fn envelope(content: &str, title: &str, h1: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "status": "ok",
        "html": { "content": content, "title": title, "h1": h1 },
    }))
}

/// The envelope the forum sends for missing or forbidden resources.
pub fn envelope_error() -> ResponseTemplate {
    ResponseTemplate::new(404).set_body_json(json!({
        "status": "error",
        "errors": ["The requested page could not be found."],
    }))
}

pub fn html(body: impl Into<String>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_string(body.into())
}

/// Starts a forum that accepts the session and hands out [`TOKEN`].
pub async fn forum() -> MockServer {
    forum_with_front(&front_page(true)).await
}

/// Like [`forum`], serving `front` as the front page.
pub async fn forum_with_front(front: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(front))
        .mount(&server)
        .await;
    token_page().mount(&server).await;
    server
}

/// Like [`forum`], checking on drop that the token page was hit exactly
/// `fetches` times.
pub async fn forum_expecting_tokens(fetches: u64) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(front_page(true)))
        .mount(&server)
        .await;
    token_page().expect(fetches).mount(&server).await;
    server
}

fn token_page() -> Mock {
    Mock::given(method("GET"))
        .and(path("/help/terms/"))
        .respond_with(html(format!(r#"<html data-csrf="{TOKEN}"><body></body></html>"#)))
}

/// Mounts the account page identifying the session as [`ME`].
pub async fn mount_account(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/account"))
        .respond_with(html(format!(
            r#"<html><body><span class="avatar avatar--xxs" data-user-id="{ME}"></span></body></html>"#
        )))
        .mount(server)
        .await;
}

/// A logged-in session against `server`.
pub async fn session(server: &MockServer) -> Session {
    Session::initialize(config(server), None)
        .await
        .expect("session against mock forum")
}

/// Posts page fragment with the given post ids and a pager up to `pages`.
pub fn posts_page(ids: &[u64], pages: u32) -> String {
    let articles: String = ids
        .iter()
        .map(|id| format!(r#"<article class="message" id="js-post-{id}"></article>"#))
        .collect();
    let pager: String = (1..=pages)
        .map(|n| format!(r#"<li class="pageNav-page">{n}</li>"#))
        .collect();
    format!(r#"<div class="block-body">{articles}</div><ul class="pageNav-main">{pager}</ul>"#)
}
