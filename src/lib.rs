//! facture - an automated invoice extraction service for Gmail mailboxes
//!
//! This crate scans users' mailboxes for invoice documents, extracts
//! structured financial data from PDF attachments via an LLM, persists
//! deduplicated records, and optionally mirrors them into a spreadsheet.

pub mod config;
pub mod domain;
pub mod providers;
pub mod services;
pub mod storage;
