use std::{fmt, str::FromStr};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{error::Error, result::Result};

/// The single cookie an anti-bot challenge yields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AntiBotCookie {
    name: String,
    value: String,
}

impl AntiBotCookie {
    /// Creates a cookie from its parts.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Returns the cookie name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the cookie value.
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Parses the `name=value` form solvers usually print.
impl FromStr for AntiBotCookie {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (name, value) = s
            .trim()
            .split_once('=')
            .ok_or_else(|| Error::AntiBot(format!("expected `name=value`, got `{s}`")))?;
        if name.is_empty() {
            return Err(Error::AntiBot("cookie name is empty".into()));
        }
        Ok(Self::new(name, value))
    }
}

impl fmt::Display for AntiBotCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// Solves the forum's anti-bot challenge.
///
/// The solver is opaque to this crate: it receives the user agent the session
/// will present and hands back one cookie that gets merged into the jar.
#[async_trait]
pub trait AntiBotSolver: Send + Sync {
    /// Runs the challenge for `user_agent`.
    async fn solve(&self, user_agent: &str) -> Result<AntiBotCookie>;
}

/// A solver that always returns the same, previously obtained cookie.
#[derive(Debug, Clone)]
pub struct StaticCookie(pub AntiBotCookie);

#[async_trait]
impl AntiBotSolver for StaticCookie {
    async fn solve(&self, _user_agent: &str) -> Result<AntiBotCookie> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_name_value() {
        let cookie: AntiBotCookie = "R3ACTLB=abc=def".parse().unwrap();
        assert_eq!(cookie.name(), "R3ACTLB");
        assert_eq!(cookie.value(), "abc=def");
        assert_eq!(cookie.to_string(), "R3ACTLB=abc=def");
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!("novalue".parse::<AntiBotCookie>(), Err(Error::AntiBot(_))));
        assert!(matches!("=x".parse::<AntiBotCookie>(), Err(Error::AntiBot(_))));
    }

    #[tokio::test]
    async fn static_cookie_is_returned_verbatim() {
        let solver = StaticCookie(AntiBotCookie::new("n", "v"));
        let cookie = solver.solve("ua").await.unwrap();
        assert_eq!(cookie, AntiBotCookie::new("n", "v"));
    }
}
