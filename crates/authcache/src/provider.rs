//! The external auth provider interface and its HTTP implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::error::{AuthError, Result};

/// An external service that validates bearer tokens and account names.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Validate a token, returning the account name it belongs to. A
    /// rejected token fails with [`AuthError::InvalidToken`].
    async fn get_user(&self, token: &str) -> Result<String>;

    /// Check account names against the provider, returning the subset that
    /// are not valid accounts. The token authenticates the request.
    async fn validate_user_names(&self, names: &[String], token: &str) -> Result<Vec<String>>;
}

/// Auth provider over HTTP.
///
/// `GET {base}/token` with the raw token in the `Authorization` header
/// returns `{"user": "<account name>"}`; `GET {base}/users?list=a,b` returns
/// a name -> validity map.
#[derive(Debug, Clone)]
pub struct HttpAuthProvider {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    user: String,
}

impl HttpAuthProvider {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl AuthProvider for HttpAuthProvider {
    async fn get_user(&self, token: &str) -> Result<String> {
        let url = format!("{}/token", self.base_url);
        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, token)
            .send()
            .await
            .map_err(|e| AuthError::Provider(e.to_string()))?;

        match response.status() {
            status if status.is_success() => {
                let body: TokenResponse = response
                    .json()
                    .await
                    .map_err(|e| AuthError::Provider(e.to_string()))?;
                Ok(body.user)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AuthError::InvalidToken),
            status => Err(AuthError::Provider(format!(
                "auth service returned {}",
                status
            ))),
        }
    }

    async fn validate_user_names(&self, names: &[String], token: &str) -> Result<Vec<String>> {
        let url = format!("{}/users", self.base_url);
        let response = self
            .client
            .get(url)
            .query(&[("list", names.join(","))])
            .header(AUTHORIZATION, token)
            .send()
            .await
            .map_err(|e| AuthError::Provider(e.to_string()))?;

        match response.status() {
            status if status.is_success() => {
                let valid: HashMap<String, bool> = response
                    .json()
                    .await
                    .map_err(|e| AuthError::Provider(e.to_string()))?;
                Ok(names
                    .iter()
                    .filter(|name| !valid.get(*name).copied().unwrap_or(false))
                    .cloned()
                    .collect())
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AuthError::InvalidToken),
            status => Err(AuthError::Provider(format!(
                "auth service returned {}",
                status
            ))),
        }
    }
}
