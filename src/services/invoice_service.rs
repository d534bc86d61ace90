//! Per-email invoice extraction orchestration.
//!
//! For one scanned email, walks its attachments in order: download, convert
//! to text, run structured extraction, check for duplicates, persist, and
//! optionally mirror. Attachment-level failures degrade to "try the next
//! attachment"; they are never fatal to the email. An email yields at most
//! one saved record.

use std::sync::Arc;

use thiserror::Error;

use crate::domain::{AttachmentRef, EmailMessage, Invoice, UserAccount};
use crate::providers::email::{MailProvider, ProviderError};
use crate::providers::pdf::{TextExtractError, TextExtractor};
use crate::providers::sheets::SheetMirror;
use crate::storage::{queries, Database, DatabaseError};

use super::extraction_service::{ExtractionError, ExtractionService};

/// Errors that can occur while processing one attachment.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Downloading the attachment bytes failed.
    #[error("attachment download failed: {0}")]
    Download(#[from] ProviderError),

    /// Converting the document to text failed.
    #[error("text extraction failed: {0}")]
    Text(#[from] TextExtractError),

    /// The extraction model failed or returned an unusable shape.
    #[error("invoice extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    /// Reading or writing the record store failed.
    #[error("store operation failed: {0}")]
    Store(#[from] DatabaseError),
}

/// Outcome of one attachment attempt.
enum AttachmentOutcome {
    /// A new record was saved.
    Saved(Invoice),
    /// A record with the same identity already exists.
    Duplicate,
}

/// Processes scanned emails into persisted invoice records.
///
/// Constructed per batch run: the mail client and mirror are scoped to one
/// user's credentials; the store and extraction backends are shared.
pub struct InvoiceService {
    db: Database,
    mail: Arc<dyn MailProvider>,
    text: Arc<dyn TextExtractor>,
    extraction: ExtractionService,
    mirror: Option<Arc<dyn SheetMirror>>,
}

impl InvoiceService {
    /// Creates an invoice service around the run's capabilities.
    pub fn new(
        db: Database,
        mail: Arc<dyn MailProvider>,
        text: Arc<dyn TextExtractor>,
        extraction: ExtractionService,
        mirror: Option<Arc<dyn SheetMirror>>,
    ) -> Self {
        Self {
            db,
            mail,
            text,
            extraction,
            mirror,
        }
    }

    /// Processes one email's attachments in order.
    ///
    /// Returns the saved record as soon as one attachment yields one;
    /// remaining attachments are not inspected. Returns `Ok(None)` when the
    /// attachment list is exhausted without a save: none were PDFs, all
    /// failed, or all were duplicates. None of those are errors.
    pub async fn process_email(
        &self,
        user: &UserAccount,
        email: &EmailMessage,
    ) -> Result<Option<Invoice>, ProcessError> {
        if !email.has_attachments() {
            tracing::debug!(message_id = %email.id, "skipping email with no attachments");
            return Ok(None);
        }

        for attachment in &email.attachments {
            if !attachment.is_pdf() {
                tracing::debug!(
                    filename = %attachment.filename,
                    mime_type = %attachment.mime_type,
                    "skipping non-PDF attachment"
                );
                continue;
            }

            match self.try_attachment(user, email, attachment).await {
                Ok(AttachmentOutcome::Saved(invoice)) => {
                    self.mirror_invoice(user, &invoice).await;
                    return Ok(Some(invoice));
                }
                Ok(AttachmentOutcome::Duplicate) => continue,
                Err(e) => {
                    tracing::warn!(
                        message_id = %email.id,
                        filename = %attachment.filename,
                        error = %e,
                        "failed to process attachment, trying next"
                    );
                    continue;
                }
            }
        }

        Ok(None)
    }

    /// Runs the full extraction chain for one attachment.
    async fn try_attachment(
        &self,
        user: &UserAccount,
        email: &EmailMessage,
        attachment: &AttachmentRef,
    ) -> Result<AttachmentOutcome, ProcessError> {
        let bytes = self
            .mail
            .fetch_attachment(&email.id, &attachment.attachment_id)
            .await?;

        let raw_text = self.text.extract_text(&bytes)?;

        let data = self.extraction.extract_invoice(&raw_text).await?;

        let already_saved = queries::invoices::exists(
            &self.db,
            &user.id,
            &data.metadata.number,
            &data.parties.supplier.name,
        )
        .await?;

        if already_saved {
            tracing::info!(
                user_id = %user.id,
                invoice_number = %data.metadata.number,
                "skipping duplicate invoice"
            );
            return Ok(AttachmentOutcome::Duplicate);
        }

        let invoice = Invoice::from_extraction(
            user.id.clone(),
            data,
            attachment.filename.clone(),
            raw_text,
        );
        queries::invoices::insert(&self.db, &invoice).await?;

        tracing::info!(
            user_id = %user.id,
            invoice_number = %invoice.data.metadata.number,
            filename = %attachment.filename,
            "saved new invoice"
        );

        Ok(AttachmentOutcome::Saved(invoice))
    }

    /// Appends the saved record to the user's spreadsheet, if configured.
    ///
    /// Mirror failures are logged and swallowed; the canonical record is
    /// already persisted.
    async fn mirror_invoice(&self, user: &UserAccount, invoice: &Invoice) {
        let (Some(mirror), Some(sheet_id)) = (&self.mirror, &user.sheet_id) else {
            return;
        };

        if let Err(e) = mirror.append_invoice(sheet_id, invoice).await {
            tracing::warn!(
                user_id = %user.id,
                sheet_id = %sheet_id,
                error = %e,
                "failed to mirror invoice to sheet"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AttachmentId, InvoiceData, MessageId, ThreadId, UserId};
    use crate::providers::ai::{CompletionResponse, MockLlmProvider, TokenUsage};
    use crate::providers::email::MockMailProvider;
    use crate::providers::pdf::MockTextExtractor;
    use crate::providers::sheets::MockSheetMirror;
    use bytes::Bytes;

    fn attachment(filename: &str, mime_type: &str, id: &str) -> AttachmentRef {
        AttachmentRef {
            filename: filename.to_string(),
            mime_type: mime_type.to_string(),
            size: 4096,
            attachment_id: AttachmentId::from(id),
        }
    }

    fn email_with(attachments: Vec<AttachmentRef>) -> EmailMessage {
        EmailMessage {
            id: MessageId::from("msg-1"),
            thread_id: ThreadId::from("thread-1"),
            from: "Acme <billing@acme.example>".to_string(),
            subject: "Invoice INV-100".to_string(),
            body: "Attached.".to_string(),
            attachments,
        }
    }

    async fn user_in_db(db: &Database, id: &str) -> UserAccount {
        let user = UserAccount::new(
            UserId::from(id),
            format!("google-{}", id),
            format!("{}@example.com", id),
        );
        queries::users::insert(db, &user).await.unwrap();
        user
    }

    fn extraction_returning(json: &'static str) -> ExtractionService {
        let mut llm = MockLlmProvider::new();
        llm.expect_complete().returning(move |_| {
            Ok(CompletionResponse {
                text: json.to_string(),
                tokens_used: TokenUsage::default(),
            })
        });
        ExtractionService::new(Arc::new(llm))
    }

    fn text_returning(text: &'static str) -> Arc<MockTextExtractor> {
        let mut extractor = MockTextExtractor::new();
        extractor
            .expect_extract_text()
            .returning(move |_| Ok(text.to_string()));
        Arc::new(extractor)
    }

    const ACME_INVOICE: &str =
        r#"{"metadata": {"number": "INV-100"}, "parties": {"supplier": {"name": "Acme"}}, "amounts": {"total": 1180.0}}"#;

    #[tokio::test]
    async fn first_valid_pdf_wins_and_second_is_never_inspected() {
        let db = Database::open_in_memory().await.unwrap();
        let user = user_in_db(&db, "u1").await;

        let mut mail = MockMailProvider::new();
        // Only the first attachment may ever be downloaded.
        mail.expect_fetch_attachment()
            .times(1)
            .returning(|_, attachment_id| {
                assert_eq!(attachment_id.0, "att-1");
                Ok(Bytes::from_static(b"%PDF-1.4"))
            });

        let service = InvoiceService::new(
            db.clone(),
            Arc::new(mail),
            text_returning("Invoice INV-100 from Acme, total 1180.00"),
            extraction_returning(ACME_INVOICE),
            None,
        );

        let email = email_with(vec![
            attachment("first.pdf", "application/pdf", "att-1"),
            attachment("second.pdf", "application/pdf", "att-2"),
        ]);

        let saved = service.process_email(&user, &email).await.unwrap().unwrap();
        assert_eq!(saved.data.metadata.number, "INV-100");
        assert_eq!(saved.provenance.original_filename, "first.pdf");

        assert_eq!(
            queries::invoices::count_for_user(&db, &user.id).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn non_pdf_attachments_are_skipped() {
        let db = Database::open_in_memory().await.unwrap();
        let user = user_in_db(&db, "u1").await;

        let mut mail = MockMailProvider::new();
        mail.expect_fetch_attachment().never();

        let service = InvoiceService::new(
            db,
            Arc::new(mail),
            Arc::new(MockTextExtractor::new()),
            extraction_returning(ACME_INVOICE),
            None,
        );

        let email = email_with(vec![attachment("photo.png", "image/png", "att-1")]);
        let result = service.process_email(&user, &email).await.unwrap();

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn duplicate_extraction_saves_nothing_new() {
        let db = Database::open_in_memory().await.unwrap();
        let user = user_in_db(&db, "u1").await;

        let mut data = InvoiceData::default();
        data.metadata.number = "INV-100".to_string();
        data.parties.supplier.name = "Acme".to_string();
        let existing = Invoice::from_extraction(user.id.clone(), data, "old.pdf", "raw");
        queries::invoices::insert(&db, &existing).await.unwrap();

        let mut mail = MockMailProvider::new();
        mail.expect_fetch_attachment()
            .returning(|_, _| Ok(Bytes::from_static(b"%PDF-1.4")));

        let service = InvoiceService::new(
            db.clone(),
            Arc::new(mail),
            text_returning("Invoice INV-100 from Acme"),
            extraction_returning(ACME_INVOICE),
            None,
        );

        let email = email_with(vec![attachment("dup.pdf", "application/pdf", "att-1")]);
        let result = service.process_email(&user, &email).await.unwrap();

        assert!(result.is_none());
        assert_eq!(
            queries::invoices::count_for_user(&db, &user.id).await.unwrap(),
            1
        );

        // The pre-existing record is untouched.
        let listed = queries::invoices::list_for_user(&db, &user.id).await.unwrap();
        assert_eq!(listed[0].provenance.original_filename, "old.pdf");
    }

    #[tokio::test]
    async fn download_failure_falls_through_to_next_attachment() {
        let db = Database::open_in_memory().await.unwrap();
        let user = user_in_db(&db, "u1").await;

        let mut mail = MockMailProvider::new();
        mail.expect_fetch_attachment()
            .times(2)
            .returning(|_, attachment_id| {
                if attachment_id.0 == "att-1" {
                    Err(ProviderError::Connection("reset".to_string()))
                } else {
                    Ok(Bytes::from_static(b"%PDF-1.4"))
                }
            });

        let service = InvoiceService::new(
            db,
            Arc::new(mail),
            text_returning("Invoice INV-100 from Acme"),
            extraction_returning(ACME_INVOICE),
            None,
        );

        let email = email_with(vec![
            attachment("broken.pdf", "application/pdf", "att-1"),
            attachment("good.pdf", "application/pdf", "att-2"),
        ]);

        let saved = service.process_email(&user, &email).await.unwrap().unwrap();
        assert_eq!(saved.provenance.original_filename, "good.pdf");
    }

    #[tokio::test]
    async fn malformed_document_is_skipped() {
        let db = Database::open_in_memory().await.unwrap();
        let user = user_in_db(&db, "u1").await;

        let mut mail = MockMailProvider::new();
        mail.expect_fetch_attachment()
            .returning(|_, _| Ok(Bytes::from_static(b"not a pdf")));

        let mut text = MockTextExtractor::new();
        text.expect_extract_text()
            .returning(|_| Err(TextExtractError::Malformed("bad xref".to_string())));

        let service = InvoiceService::new(
            db.clone(),
            Arc::new(mail),
            Arc::new(text),
            extraction_returning(ACME_INVOICE),
            None,
        );

        let email = email_with(vec![attachment("bad.pdf", "application/pdf", "att-1")]);
        let result = service.process_email(&user, &email).await.unwrap();

        assert!(result.is_none());
        assert_eq!(
            queries::invoices::count_for_user(&db, &user.id).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn unschematic_model_response_is_skipped() {
        let db = Database::open_in_memory().await.unwrap();
        let user = user_in_db(&db, "u1").await;

        let mut mail = MockMailProvider::new();
        mail.expect_fetch_attachment()
            .returning(|_, _| Ok(Bytes::from_static(b"%PDF-1.4")));

        let service = InvoiceService::new(
            db.clone(),
            Arc::new(mail),
            text_returning("some invoice text"),
            extraction_returning("I could not find an invoice in this text."),
            None,
        );

        let email = email_with(vec![attachment("odd.pdf", "application/pdf", "att-1")]);
        let result = service.process_email(&user, &email).await.unwrap();

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn mirror_failure_does_not_fail_the_save() {
        let db = Database::open_in_memory().await.unwrap();
        let mut user = user_in_db(&db, "u1").await;
        user.sheet_id = Some("sheet-1".to_string());

        let mut mail = MockMailProvider::new();
        mail.expect_fetch_attachment()
            .returning(|_, _| Ok(Bytes::from_static(b"%PDF-1.4")));

        let mut mirror = MockSheetMirror::new();
        mirror.expect_append_invoice().times(1).returning(|_, _| {
            Err(crate::providers::sheets::SheetsError::Api {
                status: 403,
                body: "forbidden".to_string(),
            })
        });

        let service = InvoiceService::new(
            db.clone(),
            Arc::new(mail),
            text_returning("Invoice INV-100 from Acme"),
            extraction_returning(ACME_INVOICE),
            Some(Arc::new(mirror)),
        );

        let email = email_with(vec![attachment("inv.pdf", "application/pdf", "att-1")]);
        let saved = service.process_email(&user, &email).await.unwrap();

        assert!(saved.is_some());
        assert_eq!(
            queries::invoices::count_for_user(&db, &user.id).await.unwrap(),
            1
        );
    }
}
