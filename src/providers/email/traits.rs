//! Mail provider trait definition.
//!
//! This module defines the [`MailProvider`] trait which abstracts over the
//! mailbox transport consumed by the scan pipeline: searching for message
//! ids, fetching full message content, and downloading attachment bytes.

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::{AttachmentId, MessageId, ThreadId};

/// Result type alias for mail provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Errors that can occur during mail provider operations.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Authentication failed or credentials expired.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Network or connection error.
    #[error("connection error: {0}")]
    Connection(String),

    /// Rate limit exceeded.
    #[error("rate limit exceeded, retry after {retry_after_secs:?} seconds")]
    RateLimited {
        /// Seconds to wait before retrying, if known.
        retry_after_secs: Option<u64>,
    },

    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// One node of a message's document-part tree.
///
/// Mirrors the shape mail providers expose for multipart messages: a part
/// may carry inline text, reference downloadable content, and contain
/// nested parts. The tree is provider-supplied and acyclic.
#[derive(Debug, Clone, Default)]
pub struct MessagePart {
    /// Filename, when the part represents a file.
    pub filename: Option<String>,
    /// Declared MIME type of this part.
    pub mime_type: Option<String>,
    /// Body content of this part, if any.
    pub body: Option<PartBody>,
    /// Nested parts, in message order.
    pub parts: Vec<MessagePart>,
}

/// Body content carried by a message part.
#[derive(Debug, Clone, Default)]
pub struct PartBody {
    /// Inline text content, already decoded from the transport encoding.
    pub text: Option<String>,
    /// Handle for downloading the part's bytes separately.
    pub attachment_id: Option<AttachmentId>,
    /// Declared size in bytes.
    pub size: u64,
}

/// A fully fetched message: addressing headers plus the part tree.
#[derive(Debug, Clone)]
pub struct FetchedMessage {
    /// Provider-assigned message id.
    pub id: MessageId,
    /// Conversation this message belongs to.
    pub thread_id: ThreadId,
    /// Raw `From` header value.
    pub from: String,
    /// Subject line.
    pub subject: String,
    /// Root of the document-part tree.
    pub payload: MessagePart,
}

/// Trait for mailbox transport implementations.
///
/// The pipeline consumes exactly three operations: a capped id search, a
/// full-content fetch per id, and a byte download per attachment handle.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailProvider: Send + Sync {
    /// Searches the mailbox with a provider-specific query string.
    ///
    /// Returns at most `max_results` message ids in provider order. An empty
    /// result is not an error.
    async fn search_messages(&self, query: &str, max_results: u32) -> Result<Vec<MessageId>>;

    /// Fetches a message's full content, including its part tree.
    async fn fetch_message(&self, id: &MessageId) -> Result<FetchedMessage>;

    /// Downloads an attachment's raw bytes.
    async fn fetch_attachment(
        &self,
        message_id: &MessageId,
        attachment_id: &AttachmentId,
    ) -> Result<Bytes>;
}
