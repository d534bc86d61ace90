//! External collaborator implementations.
//!
//! This module contains the capability objects the pipeline depends on:
//!
//! - [`auth`] - OAuth token exchange for stored refresh tokens
//! - [`email`] - Mailbox transport (Gmail REST) and part-tree walks
//! - [`ai`] - LLM providers for structured extraction
//! - [`pdf`] - Document-to-text conversion
//! - [`sheets`] - Spreadsheet mirror for saved invoices
//!
//! Each capability is constructed once per process (or per batch, for
//! token-scoped clients) and passed by parameter into the services layer;
//! nothing here is global state.

pub mod ai;
pub mod auth;
pub mod email;
pub mod pdf;
pub mod sheets;
