//! Invoice domain types.
//!
//! [`InvoiceData`] is the structured shape the extraction model must return
//! (missing scalars default to empty strings and zeros; the two party
//! objects are always present). [`Invoice`] wraps that data with ownership,
//! provenance, and the raw source text, and is immutable once saved.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{InvoiceId, UserId};

/// Structured invoice contents as extracted from document text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InvoiceData {
    /// Document-level metadata.
    pub metadata: InvoiceMetadata,
    /// The two transacting parties.
    pub parties: Parties,
    /// Monetary totals.
    pub amounts: Amounts,
    /// Line items, possibly empty.
    pub items: Vec<LineItem>,
}

/// Invoice number, dates, and currency.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InvoiceMetadata {
    /// Invoice number as printed on the document.
    pub number: String,
    /// Issue date, YYYY-MM-DD.
    pub date: String,
    /// Due date, YYYY-MM-DD.
    pub due_date: String,
    /// Currency code (e.g. INR, USD).
    pub currency: String,
}

/// Supplier and customer. Both are always present, even if empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Parties {
    /// The party issuing the invoice.
    pub supplier: Party,
    /// The party being billed.
    pub customer: Party,
}

/// One transacting party.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Party {
    /// Legal or trading name.
    pub name: String,
    /// Tax registration details.
    pub tax_info: TaxInfo,
    /// Postal address.
    pub address: PostalAddress,
}

/// Tax registration identifiers for a party.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxInfo {
    /// Goods-and-services tax identification number.
    pub gstin: String,
}

/// Postal address for a party.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PostalAddress {
    /// Street line.
    pub line1: String,
    /// City.
    pub city: String,
    /// State or region.
    pub state: String,
    /// Country.
    pub country: String,
}

/// Monetary totals for the invoice.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Amounts {
    /// Sum of line amounts before tax.
    pub subtotal: f64,
    /// Tax breakdown.
    pub tax: TaxAmounts,
    /// Final grand total.
    pub total: f64,
}

/// Tax portion of the invoice amounts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxAmounts {
    /// Total tax charged.
    pub total: f64,
}

/// One billed line item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LineItem {
    /// Description of the goods or service.
    pub description: String,
    /// Quantity billed.
    pub quantity: f64,
    /// Unit rate.
    pub rate: f64,
    /// Line amount.
    pub amount: f64,
}

/// Where a saved invoice came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provenance {
    /// Ingestion channel. Currently always `"email"`.
    pub source: String,
    /// Filename of the originating attachment.
    pub original_filename: String,
    /// When the record was created.
    pub processed_at: DateTime<Utc>,
}

impl Provenance {
    /// Provenance for a record extracted from an email attachment,
    /// stamped with the current time.
    pub fn email(original_filename: impl Into<String>) -> Self {
        Self {
            source: "email".to_string(),
            original_filename: original_filename.into(),
            processed_at: Utc::now(),
        }
    }
}

/// A persisted invoice record owned by one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    /// Unique record identifier.
    pub id: InvoiceId,
    /// Owning user.
    pub user_id: UserId,
    /// Extracted structured contents.
    pub data: InvoiceData,
    /// Ingestion provenance.
    pub provenance: Provenance,
    /// Raw text the extraction ran on.
    pub raw_text: String,
}

impl Invoice {
    /// Builds a new record from an extraction result, stamping provenance
    /// at construction time.
    pub fn from_extraction(
        user_id: UserId,
        data: InvoiceData,
        original_filename: impl Into<String>,
        raw_text: impl Into<String>,
    ) -> Self {
        Self {
            id: InvoiceId::generate(),
            user_id,
            data,
            provenance: Provenance::email(original_filename),
            raw_text: raw_text.into(),
        }
    }

    /// The tuple that identifies a logical invoice within one owner:
    /// (invoice number, supplier name). Records sharing this tuple are
    /// duplicates and must not be inserted twice.
    pub fn dedup_key(&self) -> (&str, &str) {
        (
            self.data.metadata.number.as_str(),
            self.data.parties.supplier.name.as_str(),
        )
    }
}
