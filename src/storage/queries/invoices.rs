//! Invoice record operations.
//!
//! Invoice writes are insert-only: a record violating the identity index
//! (owner, invoice number, supplier name) is rejected by the database, and
//! callers are expected to check [`exists`] first and skip duplicates.

use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use crate::domain::{Invoice, InvoiceData, InvoiceId, Provenance, UserId};
use crate::storage::database::{Database, DatabaseError, Result};

/// Inserts a new invoice record.
pub async fn insert(db: &Database, invoice: &Invoice) -> Result<()> {
    let invoice = invoice.clone();

    db.with_conn(move |conn| {
        let data_json = serde_json::to_string(&invoice.data)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

        conn.execute(
            r#"
            INSERT INTO invoices (
                id, user_id, invoice_number, invoice_date, supplier_name,
                data_json, source, original_filename, processed_at, raw_text,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                invoice.id.0,
                invoice.user_id.0,
                invoice.data.metadata.number,
                invoice.data.metadata.date,
                invoice.data.parties.supplier.name,
                data_json,
                invoice.provenance.source,
                invoice.provenance.original_filename,
                invoice.provenance.processed_at.to_rfc3339(),
                invoice.raw_text,
                Utc::now().to_rfc3339(),
            ],
        )?;

        Ok(())
    })
    .await
}

/// Whether a record with this identity already exists for the owner.
pub async fn exists(
    db: &Database,
    user_id: &UserId,
    invoice_number: &str,
    supplier_name: &str,
) -> Result<bool> {
    let user_id = user_id.clone();
    let invoice_number = invoice_number.to_string();
    let supplier_name = supplier_name.to_string();

    db.with_conn(move |conn| {
        let count: i64 = conn.query_row(
            r#"
            SELECT COUNT(*)
            FROM invoices
            WHERE user_id = ?1 AND invoice_number = ?2 AND supplier_name = ?3
            "#,
            params![user_id.0, invoice_number, supplier_name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    })
    .await
}

/// Retrieves all invoices for a user, newest invoice date first.
pub async fn list_for_user(db: &Database, user_id: &UserId) -> Result<Vec<Invoice>> {
    let user_id = user_id.clone();

    db.with_conn(move |conn| {
        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, data_json, source, original_filename,
                   processed_at, raw_text
            FROM invoices
            WHERE user_id = ?1
            ORDER BY invoice_date DESC
            "#,
        )?;

        let rows = stmt.query_map([&user_id.0], row_to_invoice)?;
        let invoices: std::result::Result<Vec<_>, _> = rows.collect();
        Ok(invoices?)
    })
    .await
}

/// Number of saved invoices for a user.
pub async fn count_for_user(db: &Database, user_id: &UserId) -> Result<i64> {
    let user_id = user_id.clone();

    db.with_conn(move |conn| {
        let count = conn.query_row(
            "SELECT COUNT(*) FROM invoices WHERE user_id = ?1",
            [&user_id.0],
            |row| row.get(0),
        )?;
        Ok(count)
    })
    .await
}

/// Maps a database row to an Invoice.
fn row_to_invoice(row: &Row<'_>) -> rusqlite::Result<Invoice> {
    let data_json: String = row.get("data_json")?;
    let data: InvoiceData = serde_json::from_str(&data_json).unwrap_or_default();

    let processed_at: String = row.get("processed_at")?;
    let processed_at = DateTime::parse_from_rfc3339(&processed_at)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    Ok(Invoice {
        id: InvoiceId(row.get("id")?),
        user_id: UserId(row.get("user_id")?),
        data,
        provenance: Provenance {
            source: row.get("source")?,
            original_filename: row.get("original_filename")?,
            processed_at,
        },
        raw_text: row.get("raw_text")?,
    })
}
