//! Google OAuth token exchange.
//!
//! Users arrive with a long-lived refresh token stored alongside their
//! account; every batch run mints a short-lived access token from it. The
//! interactive consent flow that produced the refresh token is out of scope
//! here.

use serde::Deserialize;
use thiserror::Error;

const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Errors that can occur while exchanging credentials.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Network or connection error.
    #[error("connection error: {0}")]
    Connection(String),

    /// The token endpoint rejected the refresh token.
    #[error("token refresh failed ({status}): {body}")]
    Refresh { status: u16, body: String },

    /// The token endpoint returned something unparseable.
    #[error("invalid token response: {0}")]
    InvalidResponse(String),
}

/// OAuth token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[allow(dead_code)]
    expires_in: u64,
    #[allow(dead_code)]
    token_type: String,
}

/// Exchanges stored refresh tokens for access tokens.
///
/// One authenticator is constructed per process from the application's
/// OAuth client credentials and shared by the Gmail and Sheets clients.
#[derive(Debug, Clone)]
pub struct GoogleAuth {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
}

impl GoogleAuth {
    /// Creates an authenticator with the application's OAuth client credentials.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Mints an access token from a user's refresh token.
    pub async fn access_token(&self, refresh_token: &str) -> Result<String, AuthError> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .client
            .post(GOOGLE_TOKEN_URL)
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::Connection(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Refresh { status, body });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;

        Ok(token.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_error_display() {
        let err = AuthError::Refresh {
            status: 400,
            body: "invalid_grant".to_string(),
        };
        assert_eq!(err.to_string(), "token refresh failed (400): invalid_grant");

        let conn = AuthError::Connection("timed out".to_string());
        assert!(conn.to_string().contains("connection error"));
    }

    #[test]
    fn token_response_parses() {
        let json = r#"{"access_token": "ya29.abc", "expires_in": 3599, "token_type": "Bearer"}"#;
        let token: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(token.access_token, "ya29.abc");
    }
}
