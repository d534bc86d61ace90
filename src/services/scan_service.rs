//! Mailbox scan service.
//!
//! Turns a sync window into a normalized list of candidate invoice emails:
//! builds the search query, fans out full-content fetches, and resolves
//! each message's body text and attachments.

use std::sync::Arc;

use crate::domain::{EmailMessage, SyncWindow};
use crate::providers::email::{parts, MailProvider, ProviderError};

/// Fixed predicate every scan starts from: likely invoice subjects that
/// carry an attachment.
pub const BASE_QUERY: &str = "subject:(invoice OR bill OR receipt) has:attachment";

/// Hard cap on message ids fetched per scan.
pub const MAX_RESULTS_PER_SCAN: u32 = 50;

/// Scans one user's mailbox for candidate invoice emails.
///
/// Constructed per batch run around that user's token-scoped mail client.
pub struct ScanService {
    mail: Arc<dyn MailProvider>,
}

impl ScanService {
    /// Creates a scan service over a mail transport.
    pub fn new(mail: Arc<dyn MailProvider>) -> Self {
        Self { mail }
    }

    /// Builds the provider query for a window: the base predicate conjoined
    /// with `after:`/`before:` clauses for whichever bounds are set.
    pub fn build_query(window: &SyncWindow) -> String {
        let mut query = BASE_QUERY.to_string();

        if let Some(start) = window.start {
            query.push_str(&format!(" after:{}", start.format("%Y/%m/%d")));
        }
        if let Some(end) = window.end {
            query.push_str(&format!(" before:{}", end.format("%Y/%m/%d")));
        }

        query
    }

    /// Runs the scan for a window.
    ///
    /// Returns one [`EmailMessage`] per retrievable hit, preserving the
    /// provider's result order. Messages whose content cannot be fetched
    /// are logged and dropped; they never fail the scan. No hits is an
    /// empty list, not an error.
    pub async fn scan(&self, window: &SyncWindow) -> Result<Vec<EmailMessage>, ProviderError> {
        let query = Self::build_query(window);
        tracing::debug!(%query, "searching mailbox");

        let ids = self
            .mail
            .search_messages(&query, MAX_RESULTS_PER_SCAN)
            .await?;

        if ids.is_empty() {
            tracing::debug!("no messages matched the scan query");
            return Ok(Vec::new());
        }

        // Each fetch is independent and read-only, so they run concurrently;
        // join_all keeps the provider's ordering in the output.
        let fetches = ids.iter().map(|id| self.mail.fetch_message(id));
        let fetched = futures::future::join_all(fetches).await;

        let mut emails = Vec::with_capacity(fetched.len());
        for (id, result) in ids.iter().zip(fetched) {
            match result {
                Ok(message) => {
                    let body = parts::find_body_text(&message.payload)
                        .unwrap_or_else(|| "No Body".to_string());
                    let attachments = parts::collect_attachments(&message.payload);

                    emails.push(EmailMessage {
                        id: message.id,
                        thread_id: message.thread_id,
                        from: message.from,
                        subject: message.subject,
                        body,
                        attachments,
                    });
                }
                Err(e) => {
                    tracing::warn!(message_id = %id, error = %e, "could not fetch message content, skipping");
                }
            }
        }

        Ok(emails)
    }
}
