//! Mailbox transport implementations.
//!
//! This module contains the [`MailProvider`] trait, the Gmail REST
//! implementation, and the document-part tree walks used to turn a fetched
//! message into body text and attachment descriptors.

mod gmail;
pub mod parts;
mod traits;

pub use gmail::GmailClient;
pub use traits::{
    FetchedMessage, MailProvider, MessagePart, PartBody, ProviderError, Result,
};

#[cfg(test)]
pub use traits::MockMailProvider;
