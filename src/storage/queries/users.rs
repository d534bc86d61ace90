//! User account CRUD operations.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::domain::{UserAccount, UserId};
use crate::storage::database::{Database, Result};

/// Inserts a new user account.
pub async fn insert(db: &Database, user: &UserAccount) -> Result<()> {
    let user = user.clone();

    db.with_conn(move |conn| {
        conn.execute(
            r#"
            INSERT INTO users (
                id, google_id, email, name, refresh_token, sheet_id,
                last_invoice_sync, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                user.id.0,
                user.google_id,
                user.email,
                user.name,
                user.refresh_token,
                user.sheet_id,
                user.last_invoice_sync.map(|t| t.to_rfc3339()),
                user.created_at.to_rfc3339(),
                user.updated_at.to_rfc3339(),
            ],
        )?;

        Ok(())
    })
    .await
}

/// Retrieves a user by id.
pub async fn get_by_id(db: &Database, user_id: &UserId) -> Result<Option<UserAccount>> {
    let user_id = user_id.clone();

    db.with_conn(move |conn| {
        let mut stmt = conn.prepare(
            r#"
            SELECT id, google_id, email, name, refresh_token, sheet_id,
                   last_invoice_sync, created_at, updated_at
            FROM users
            WHERE id = ?1
            "#,
        )?;

        let result = stmt.query_row([&user_id.0], row_to_user).optional()?;
        Ok(result)
    })
    .await
}

/// Retrieves every user eligible for scheduled processing: those with a
/// stored refresh token.
pub async fn list_connected(db: &Database) -> Result<Vec<UserAccount>> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            r#"
            SELECT id, google_id, email, name, refresh_token, sheet_id,
                   last_invoice_sync, created_at, updated_at
            FROM users
            WHERE refresh_token IS NOT NULL
            ORDER BY email
            "#,
        )?;

        let rows = stmt.query_map([], row_to_user)?;
        let users: std::result::Result<Vec<_>, _> = rows.collect();
        Ok(users?)
    })
    .await
}

/// Advances a user's sync cursor.
///
/// Called only after a batch run completes for that user; manual runs never
/// reach this.
pub async fn set_last_sync(
    db: &Database,
    user_id: &UserId,
    synced_at: DateTime<Utc>,
) -> Result<()> {
    let user_id = user_id.clone();

    db.with_conn(move |conn| {
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE users SET last_invoice_sync = ?1, updated_at = ?2 WHERE id = ?3",
            params![synced_at.to_rfc3339(), now, user_id.0],
        )?;
        Ok(())
    })
    .await
}

/// Stores or clears a user's refresh token.
pub async fn set_refresh_token(
    db: &Database,
    user_id: &UserId,
    refresh_token: Option<&str>,
) -> Result<()> {
    let user_id = user_id.clone();
    let refresh_token = refresh_token.map(|s| s.to_string());

    db.with_conn(move |conn| {
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE users SET refresh_token = ?1, updated_at = ?2 WHERE id = ?3",
            params![refresh_token, now, user_id.0],
        )?;
        Ok(())
    })
    .await
}

/// Points a user's mirror at a spreadsheet, or clears it.
pub async fn set_sheet_id(db: &Database, user_id: &UserId, sheet_id: Option<&str>) -> Result<()> {
    let user_id = user_id.clone();
    let sheet_id = sheet_id.map(|s| s.to_string());

    db.with_conn(move |conn| {
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE users SET sheet_id = ?1, updated_at = ?2 WHERE id = ?3",
            params![sheet_id, now, user_id.0],
        )?;
        Ok(())
    })
    .await
}

/// Maps a database row to a UserAccount.
fn row_to_user(row: &Row<'_>) -> rusqlite::Result<UserAccount> {
    let last_sync: Option<String> = row.get("last_invoice_sync")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(UserAccount {
        id: UserId(row.get("id")?),
        google_id: row.get("google_id")?,
        email: row.get("email")?,
        name: row.get("name")?,
        refresh_token: row.get("refresh_token")?,
        sheet_id: row.get("sheet_id")?,
        last_invoice_sync: last_sync.and_then(|s| parse_timestamp(&s)),
        created_at: parse_timestamp(&created_at).unwrap_or_else(Utc::now),
        updated_at: parse_timestamp(&updated_at).unwrap_or_else(Utc::now),
    })
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .ok()
}
