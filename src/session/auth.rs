// src/session/auth.rs
//! Auth backend client: login for a token, registration for an account.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::providers::http::join_url;

pub const IDENTIFIER_LEN: std::ops::RangeInclusive<usize> = 3..=20;
pub const SECRET_LEN: std::ops::RangeInclusive<usize> = 6..=40;

static RE_EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]{2,}$").expect("email regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub identifier: String,
    pub contact: String,
    pub secret: String,
}

impl Registration {
    /// Local field checks run before anything is sent.
    pub fn validate(&self) -> Result<(), RegisterError> {
        let id_len = self.identifier.trim().chars().count();
        if !IDENTIFIER_LEN.contains(&id_len) {
            return Err(RegisterError::Invalid {
                field: "identifier",
                reason: "Username must be between 3 and 20 characters.",
            });
        }
        if !RE_EMAIL.is_match(self.contact.trim()) {
            return Err(RegisterError::Invalid {
                field: "contact",
                reason: "Invalid email address.",
            });
        }
        if !SECRET_LEN.contains(&self.secret.chars().count()) {
            return Err(RegisterError::Invalid {
                field: "secret",
                reason: "Password must be between 6 and 40 characters.",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegisterError {
    #[error("{field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
    #[error("registration rejected: {0}")]
    Rejected(String),
    #[error("auth backend unreachable")]
    Unreachable,
}

#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Exchanges credentials for a bearer token.
    async fn login(&self, identifier: &str, secret: &str) -> Result<String>;

    /// Creates an account; returns the backend's confirmation message.
    async fn register(&self, registration: &Registration) -> Result<String, RegisterError>;
}

#[derive(Serialize)]
struct LoginReq<'a> {
    identifier: &'a str,
    secret: &'a str,
}

#[derive(Deserialize)]
struct LoginResp {
    token: Option<String>,
}

#[derive(Deserialize)]
struct MessageResp {
    message: Option<String>,
}

/// `POST {base}/auth/login` and `POST {base}/auth/register`.
pub struct HttpAuthBackend {
    base_url: String,
    client: Client,
}

impl HttpAuthBackend {
    pub fn new(base_url: impl Into<String>, client: Client) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }
}

#[async_trait]
impl AuthBackend for HttpAuthBackend {
    async fn login(&self, identifier: &str, secret: &str) -> Result<String> {
        let resp = self
            .client
            .post(join_url(&self.base_url, "auth/login"))
            .json(&LoginReq { identifier, secret })
            .send()
            .await
            .context("auth login request")?;

        let status = resp.status();
        if !status.is_success() {
            let body: Option<MessageResp> = resp.json().await.ok();
            let msg = body.and_then(|b| b.message).unwrap_or_default();
            bail!("login rejected with {status}: {msg}");
        }

        let body: LoginResp = resp.json().await.context("auth login body")?;
        body.token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| anyhow!("login response carried no token"))
    }

    async fn register(&self, registration: &Registration) -> Result<String, RegisterError> {
        let resp = self
            .client
            .post(join_url(&self.base_url, "auth/register"))
            .json(registration)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(target: "session", error = %e, "register request failed");
                RegisterError::Unreachable
            })?;

        let status = resp.status();
        let message = resp
            .json::<MessageResp>()
            .await
            .ok()
            .and_then(|b| b.message)
            .filter(|m| !m.trim().is_empty());

        if status.is_success() {
            Ok(message.unwrap_or_else(|| "User registered successfully!".to_string()))
        } else {
            Err(RegisterError::Rejected(
                message.unwrap_or_else(|| status.to_string()),
            ))
        }
    }
}
