//! Google Sheets mirror for saved invoices.
//!
//! Users can point their account at a spreadsheet; every saved invoice is
//! appended there as one row. The mirror is strictly best-effort: a failure
//! here is logged by the caller and never blocks invoice persistence.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::domain::Invoice;

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Column headers written once to a fresh target sheet.
const SHEET_HEADERS: [&str; 9] = [
    "Invoice Date",
    "Invoice Number",
    "Supplier Name",
    "Supplier GSTIN",
    "Customer Name",
    "Subtotal",
    "Tax Total",
    "Grand Total",
    "Currency",
];

/// Errors that can occur while mirroring to a spreadsheet.
#[derive(Debug, Error)]
pub enum SheetsError {
    /// Network or connection error.
    #[error("connection error: {0}")]
    Connection(String),

    /// The Sheets API rejected the request. Usually a permissions problem
    /// or an invalid sheet id.
    #[error("sheets API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The API returned something unparseable.
    #[error("invalid sheets response: {0}")]
    InvalidResponse(String),
}

/// Trait for the spreadsheet mirror target.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SheetMirror: Send + Sync {
    /// Appends one invoice as a row, writing the header row first if the
    /// sheet is empty.
    async fn append_invoice(&self, sheet_id: &str, invoice: &Invoice) -> Result<(), SheetsError>;
}

/// Sheets values range response.
#[derive(Debug, Deserialize)]
struct ValueRange {
    values: Option<Vec<Vec<Value>>>,
}

/// Google Sheets API client.
pub struct GoogleSheetsClient {
    client: reqwest::Client,
    access_token: String,
}

impl GoogleSheetsClient {
    /// Creates a client around an already-minted access token.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            access_token: access_token.into(),
        }
    }

    fn auth_headers(&self) -> Result<HeaderMap, SheetsError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.access_token))
                .map_err(|e| SheetsError::InvalidResponse(format!("invalid header: {}", e)))?,
        );
        Ok(headers)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, SheetsError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(SheetsError::Api { status, body })
    }

    /// Whether the target sheet already carries a header row.
    async fn has_header_row(&self, sheet_id: &str) -> Result<bool, SheetsError> {
        let url = format!("{}/{}/values/Sheet1!A1:I1", SHEETS_API_BASE, sheet_id);

        let response = self
            .client
            .get(&url)
            .headers(self.auth_headers()?)
            .send()
            .await
            .map_err(|e| SheetsError::Connection(e.to_string()))?;

        let range: ValueRange = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| SheetsError::InvalidResponse(e.to_string()))?;

        Ok(range.values.map(|v| !v.is_empty()).unwrap_or(false))
    }

    async fn write_header_row(&self, sheet_id: &str) -> Result<(), SheetsError> {
        let url = format!(
            "{}/{}/values/Sheet1!A1?valueInputOption=RAW",
            SHEETS_API_BASE, sheet_id
        );
        let body = json!({ "values": [SHEET_HEADERS] });

        let response = self
            .client
            .put(&url)
            .headers(self.auth_headers()?)
            .json(&body)
            .send()
            .await
            .map_err(|e| SheetsError::Connection(e.to_string()))?;

        Self::check_status(response).await?;
        tracing::debug!(sheet_id, "wrote header row to sheet");
        Ok(())
    }

    /// Flattens an invoice into one row matching [`SHEET_HEADERS`].
    fn invoice_row(invoice: &Invoice) -> Vec<Value> {
        let data = &invoice.data;
        vec![
            json!(data.metadata.date),
            json!(data.metadata.number),
            json!(data.parties.supplier.name),
            json!(data.parties.supplier.tax_info.gstin),
            json!(data.parties.customer.name),
            json!(data.amounts.subtotal),
            json!(data.amounts.tax.total),
            json!(data.amounts.total),
            json!(data.metadata.currency),
        ]
    }
}

#[async_trait]
impl SheetMirror for GoogleSheetsClient {
    async fn append_invoice(&self, sheet_id: &str, invoice: &Invoice) -> Result<(), SheetsError> {
        if !self.has_header_row(sheet_id).await? {
            self.write_header_row(sheet_id).await?;
        }

        // 'A:A' tells Sheets to find the first empty row.
        let url = format!(
            "{}/{}/values/Sheet1!A:A:append?valueInputOption=USER_ENTERED&insertDataOption=INSERT_ROWS",
            SHEETS_API_BASE, sheet_id
        );
        let body = json!({ "values": [Self::invoice_row(invoice)] });

        let response = self
            .client
            .post(&url)
            .headers(self.auth_headers()?)
            .json(&body)
            .send()
            .await
            .map_err(|e| SheetsError::Connection(e.to_string()))?;

        Self::check_status(response).await?;
        tracing::debug!(
            sheet_id,
            invoice_number = %invoice.data.metadata.number,
            "appended invoice row to sheet"
        );
        Ok(())
    }
}
