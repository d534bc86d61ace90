//! Scanned email domain types.
//!
//! These are transient descriptors produced by a mailbox scan. They are
//! never persisted; each scan constructs them fresh from provider data.

use serde::{Deserialize, Serialize};

use super::{AttachmentId, MessageId, ThreadId};

/// One email surfaced by a mailbox scan, with its attachments resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailMessage {
    /// Provider-assigned message identifier.
    pub id: MessageId,
    /// Conversation this message belongs to.
    pub thread_id: ThreadId,
    /// Raw `From` header value.
    pub from: String,
    /// Subject line.
    pub subject: String,
    /// Decoded body text, best effort. Plain text preferred over HTML.
    pub body: String,
    /// Downloadable attachments, in the order they appear in the message.
    pub attachments: Vec<AttachmentRef>,
}

impl EmailMessage {
    /// Whether this message carries any downloadable attachment.
    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }
}

/// A downloadable attachment discovered in a message's part tree.
///
/// A part qualifies as an attachment only when it carries both a non-empty
/// filename and a content handle; multipart containers never qualify
/// themselves but contribute their children.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentRef {
    /// Original filename.
    pub filename: String,
    /// Declared MIME content type.
    pub mime_type: String,
    /// Declared size in bytes.
    pub size: u64,
    /// Handle used to fetch the attachment bytes.
    pub attachment_id: AttachmentId,
}

impl AttachmentRef {
    /// Whether this attachment is a PDF document.
    pub fn is_pdf(&self) -> bool {
        self.mime_type == "application/pdf"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attachment(mime_type: &str) -> AttachmentRef {
        AttachmentRef {
            filename: "invoice.pdf".to_string(),
            mime_type: mime_type.to_string(),
            size: 2048,
            attachment_id: AttachmentId::from("att-1"),
        }
    }

    #[test]
    fn pdf_attachment_is_pdf() {
        assert!(attachment("application/pdf").is_pdf());
        assert!(!attachment("image/png").is_pdf());
    }

    #[test]
    fn message_with_attachments() {
        let msg = EmailMessage {
            id: MessageId::from("msg-1"),
            thread_id: ThreadId::from("thread-1"),
            from: "Acme Billing <billing@acme.example>".to_string(),
            subject: "Invoice INV-100".to_string(),
            body: "Please find attached.".to_string(),
            attachments: vec![attachment("application/pdf")],
        };

        assert!(msg.has_attachments());
    }

    #[test]
    fn attachment_serialization_round_trip() {
        let att = attachment("application/pdf");
        let json = serde_json::to_string(&att).unwrap();
        let deserialized: AttachmentRef = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.filename, "invoice.pdf");
        assert_eq!(deserialized.attachment_id, AttachmentId::from("att-1"));
    }
}
