//! User account domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::UserId;

/// A user whose mailbox is scanned for invoice documents.
///
/// The stored refresh token is an opaque credential; accounts without one
/// are excluded from scheduled processing until the user reconnects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    /// Unique identifier for this user.
    pub id: UserId,
    /// Provider-side account identifier.
    pub google_id: String,
    /// Primary email address.
    pub email: String,
    /// Display name, if known.
    pub name: Option<String>,
    /// OAuth refresh token used to mint access tokens per run.
    pub refresh_token: Option<String>,
    /// Spreadsheet the user's saved invoices are mirrored into.
    pub sheet_id: Option<String>,
    /// When the last completed scheduled scan for this user started.
    ///
    /// Advances only after a batch finishes (including empty results);
    /// manual historical fetches never touch it.
    pub last_invoice_sync: Option<DateTime<Utc>>,
    /// When this account was created.
    pub created_at: DateTime<Utc>,
    /// When this account was last modified.
    pub updated_at: DateTime<Utc>,
}

impl UserAccount {
    /// Creates a new account with no sync history.
    pub fn new(id: UserId, google_id: impl Into<String>, email: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            google_id: google_id.into(),
            email: email.into(),
            name: None,
            refresh_token: None,
            sheet_id: None,
            last_invoice_sync: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this account can be processed by the scheduled fleet run.
    pub fn is_connected(&self) -> bool {
        self.refresh_token.is_some()
    }
}
