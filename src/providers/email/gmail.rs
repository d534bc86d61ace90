//! Gmail API mail provider implementation.
//!
//! This module provides a [`MailProvider`] implementation using the Gmail
//! REST API:
//!
//! - `users.messages.list` for query-scoped message searches
//! - `users.messages.get` for full message content
//! - `users.messages.attachments.get` for attachment bytes
//!
//! The client holds a short-lived access token minted per batch run from
//! the user's stored refresh token (see [`crate::providers::auth`]).

use async_trait::async_trait;
use base64::prelude::*;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::Deserialize;

use super::traits::{
    FetchedMessage, MailProvider, MessagePart, PartBody, ProviderError, Result,
};
use crate::domain::{AttachmentId, MessageId, ThreadId};

const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

/// Gmail message list response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageListResponse {
    messages: Option<Vec<GmailMessageRef>>,
    #[allow(dead_code)]
    next_page_token: Option<String>,
    #[allow(dead_code)]
    result_size_estimate: Option<u32>,
}

/// Gmail message reference (id only).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GmailMessageRef {
    id: String,
    #[allow(dead_code)]
    thread_id: Option<String>,
}

/// Gmail API message.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GmailMessage {
    id: String,
    thread_id: String,
    payload: Option<GmailPart>,
    #[allow(dead_code)]
    snippet: Option<String>,
}

/// Gmail message part. The top-level payload is itself a part carrying the
/// addressing headers.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GmailPart {
    filename: Option<String>,
    mime_type: Option<String>,
    headers: Option<Vec<GmailHeader>>,
    body: Option<GmailBody>,
    parts: Option<Vec<GmailPart>>,
}

/// Gmail message header.
#[derive(Debug, Deserialize)]
struct GmailHeader {
    name: String,
    value: String,
}

/// Gmail part body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GmailBody {
    data: Option<String>,
    size: Option<u64>,
    attachment_id: Option<String>,
}

/// Gmail attachment download response.
#[derive(Debug, Deserialize)]
struct AttachmentResponse {
    data: Option<String>,
    #[allow(dead_code)]
    size: Option<u64>,
}

/// Gmail API mail provider.
///
/// Implements [`MailProvider`] against the Gmail REST API with a bearer
/// access token.
pub struct GmailClient {
    /// HTTP client for API requests.
    client: reqwest::Client,
    /// OAuth access token for this run.
    access_token: String,
}

impl GmailClient {
    /// Creates a client around an already-minted access token.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            access_token: access_token.into(),
        }
    }

    /// Builds authorization headers for API requests.
    fn auth_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.access_token))
                .map_err(|e| ProviderError::Internal(format!("invalid header: {}", e)))?,
        );
        Ok(headers)
    }

    /// Makes an authenticated GET request to the Gmail API.
    async fn get<T: for<'de> Deserialize<'de>>(&self, endpoint: &str) -> Result<T> {
        let url = format!("{}{}", GMAIL_API_BASE, endpoint);
        let headers = self.auth_headers()?;

        let response = self
            .client
            .get(&url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| ProviderError::Connection(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::handle_error(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::Internal(format!("parse response: {}", e)))
    }

    /// Handles API error responses.
    async fn handle_error(response: reqwest::Response) -> ProviderError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        match status.as_u16() {
            401 => ProviderError::Authentication(format!("unauthorized: {}", body)),
            404 => ProviderError::NotFound(body),
            429 => ProviderError::RateLimited {
                retry_after_secs: None,
            },
            _ => ProviderError::Internal(format!("API error ({}): {}", status, body)),
        }
    }

    /// Decodes Gmail's base64url content. Attachment payloads may arrive
    /// padded, body data never is.
    fn decode_base64url(data: &str) -> Option<Vec<u8>> {
        BASE64_URL_SAFE_NO_PAD
            .decode(data.trim_end_matches('='))
            .ok()
    }

    /// Converts a Gmail part tree into the provider-neutral shape, decoding
    /// inline body data to text along the way.
    fn map_part(part: &GmailPart) -> MessagePart {
        let body = part.body.as_ref().map(|b| PartBody {
            text: b
                .data
                .as_deref()
                .and_then(Self::decode_base64url)
                .and_then(|bytes| String::from_utf8(bytes).ok()),
            attachment_id: b.attachment_id.clone().map(AttachmentId::from),
            size: b.size.unwrap_or(0),
        });

        MessagePart {
            filename: part.filename.clone(),
            mime_type: part.mime_type.clone(),
            body,
            parts: part
                .parts
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(Self::map_part)
                .collect(),
        }
    }

    /// Looks up a header on the message payload, case-insensitively.
    fn header_value(payload: Option<&GmailPart>, name: &str) -> Option<String> {
        payload
            .and_then(|p| p.headers.as_ref())
            .and_then(|headers| {
                headers
                    .iter()
                    .find(|h| h.name.eq_ignore_ascii_case(name))
                    .map(|h| h.value.clone())
            })
    }
}

#[async_trait]
impl MailProvider for GmailClient {
    async fn search_messages(&self, query: &str, max_results: u32) -> Result<Vec<MessageId>> {
        let endpoint = format!(
            "/messages?q={}&maxResults={}",
            urlencode(query),
            max_results
        );

        let response: MessageListResponse = self.get(&endpoint).await?;

        Ok(response
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(|m| MessageId::from(m.id))
            .collect())
    }

    async fn fetch_message(&self, id: &MessageId) -> Result<FetchedMessage> {
        let endpoint = format!("/messages/{}?format=full", id.0);
        let msg: GmailMessage = self.get(&endpoint).await?;

        let payload = msg.payload.as_ref();
        let from = Self::header_value(payload, "From").unwrap_or_else(|| "Unknown Sender".into());
        let subject = Self::header_value(payload, "Subject").unwrap_or_else(|| "No Subject".into());

        Ok(FetchedMessage {
            id: MessageId::from(msg.id),
            thread_id: ThreadId::from(msg.thread_id),
            from,
            subject,
            payload: payload.map(Self::map_part).unwrap_or_default(),
        })
    }

    async fn fetch_attachment(
        &self,
        message_id: &MessageId,
        attachment_id: &AttachmentId,
    ) -> Result<Bytes> {
        let endpoint = format!("/messages/{}/attachments/{}", message_id.0, attachment_id.0);
        let response: AttachmentResponse = self.get(&endpoint).await?;

        let data = response
            .data
            .ok_or_else(|| ProviderError::NotFound(format!("attachment {}", attachment_id)))?;

        let bytes = Self::decode_base64url(&data)
            .ok_or_else(|| ProviderError::Internal("attachment data not base64url".into()))?;

        Ok(Bytes::from(bytes))
    }
}

/// Percent-encodes a query string for use in a URL parameter.
fn urlencode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}
