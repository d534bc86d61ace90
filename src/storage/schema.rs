//! SQL schema definitions as const strings.
//!
//! Contains the complete SQLite schema for the invoice extraction service.

/// SQL to create the users table.
pub const CREATE_USERS: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    google_id TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL,
    name TEXT,
    refresh_token TEXT,
    sheet_id TEXT,
    last_invoice_sync TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
"#;

/// SQL to create user indexes.
pub const CREATE_USER_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_users_email ON users(email)
"#;

/// SQL to create the invoices table.
///
/// The extracted contents are stored whole as JSON; the columns used for
/// deduplication and listing are denormalized alongside.
pub const CREATE_INVOICES: &str = r#"
CREATE TABLE IF NOT EXISTS invoices (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id),
    invoice_number TEXT NOT NULL,
    invoice_date TEXT,
    supplier_name TEXT NOT NULL,
    data_json TEXT NOT NULL,
    source TEXT NOT NULL,
    original_filename TEXT NOT NULL,
    processed_at TEXT NOT NULL,
    raw_text TEXT NOT NULL,
    created_at TEXT NOT NULL
)
"#;

/// SQL to create invoice indexes.
///
/// The unique index enforces the record identity (owner, invoice number,
/// supplier name); inserts violating it are rejected, never merged.
pub const CREATE_INVOICE_INDEXES: &str = r#"
CREATE UNIQUE INDEX IF NOT EXISTS idx_invoices_identity
    ON invoices(user_id, invoice_number, supplier_name);
CREATE INDEX IF NOT EXISTS idx_invoices_user ON invoices(user_id);
CREATE INDEX IF NOT EXISTS idx_invoices_date ON invoices(invoice_date DESC)
"#;

/// Returns all migrations in execution order.
pub fn all_migrations() -> Vec<&'static str> {
    vec![
        CREATE_USERS,
        CREATE_USER_INDEXES,
        CREATE_INVOICES,
        CREATE_INVOICE_INDEXES,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_ordered_users_first() {
        let migrations = all_migrations();
        assert_eq!(migrations.len(), 4);
        assert!(migrations[0].contains("users"));
        assert!(migrations[2].contains("invoices"));
    }

    #[test]
    fn identity_index_is_unique() {
        assert!(CREATE_INVOICE_INDEXES.contains("UNIQUE INDEX"));
        assert!(CREATE_INVOICE_INDEXES.contains("user_id, invoice_number, supplier_name"));
    }
}
