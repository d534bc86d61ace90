//! Business services layer.
//!
//! This module contains the services that orchestrate the invoice pipeline,
//! coordinating between providers, storage, and domain types.
//!
//! # Pipeline
//!
//! ```text
//! SyncService (scheduled fleet run / on-demand per user)
//!      |
//!      v
//! ScanService (window -> candidate emails)
//!      |
//!      v
//! InvoiceService (email -> at most one saved record)
//!      |
//!      v
//! ExtractionService (document text -> structured data)
//! ```

mod extraction_service;
mod invoice_service;
mod scan_service;
mod sync_service;

pub use extraction_service::{ExtractionError, ExtractionService};
pub use invoice_service::{InvoiceService, ProcessError};
pub use scan_service::{ScanService, BASE_QUERY, MAX_RESULTS_PER_SCAN};
pub use sync_service::{parse_cron, SyncError, SyncReport, SyncService};
