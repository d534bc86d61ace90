//! Structured invoice extraction from raw document text.
//!
//! Owns the fixed extraction prompt and the strict parse of the model's
//! response into [`InvoiceData`]. Anything that does not come back as the
//! expected JSON shape is a hard failure for the attachment being processed.

use std::sync::Arc;

use thiserror::Error;

use crate::domain::InvoiceData;
use crate::providers::ai::{CompletionRequest, LlmError, LlmProvider};

/// Errors that can occur during structured extraction.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Extraction was asked to run on empty text.
    #[error("raw text for extraction cannot be empty")]
    EmptyInput,

    /// The model request itself failed.
    #[error("model request failed: {0}")]
    Llm(#[from] LlmError),

    /// The model responded, but not with the expected JSON shape.
    #[error("model response did not match the invoice shape: {0}")]
    Schema(String),
}

/// Extracts structured invoice data from document text via an LLM.
pub struct ExtractionService {
    llm: Arc<dyn LlmProvider>,
}

impl ExtractionService {
    /// Creates an extraction service over an LLM backend.
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Extracts an [`InvoiceData`] from raw document text.
    pub async fn extract_invoice(&self, raw_text: &str) -> Result<InvoiceData, ExtractionError> {
        if raw_text.trim().is_empty() {
            return Err(ExtractionError::EmptyInput);
        }

        let request = CompletionRequest::new(build_prompt(raw_text)).with_temperature(0.0);
        let response = self.llm.complete(&request).await?;

        let cleaned = strip_code_fences(&response.text);
        serde_json::from_str(cleaned).map_err(|e| ExtractionError::Schema(e.to_string()))
    }
}

/// The fixed extraction prompt: target shape plus the document text.
fn build_prompt(raw_text: &str) -> String {
    format!(
        r#"You are an expert data extraction AI. Your task is to analyze the following raw text from an invoice and extract its information into a structured JSON object.

The desired JSON structure is as follows. Do not add any fields that are not in this structure.
If a value is not found, use an empty string "" for string fields, 0 for number fields, or an empty object for nested address/tax/contact schemas. The 'items' array can be empty if no line items are found. The 'parties' objects (supplier, customer) must always be present.

{{
  "metadata": {{
    "number": "string",
    "date": "string (YYYY-MM-DD format)",
    "dueDate": "string (YYYY-MM-DD format)",
    "currency": "string (e.g., INR, USD)"
  }},
  "parties": {{
    "supplier": {{ "name": "string", "taxInfo": {{ "gstin": "string" }}, "address": {{ "line1": "string", "city": "string", "state": "string", "country": "string" }} }},
    "customer": {{ "name": "string", "taxInfo": {{ "gstin": "string" }}, "address": {{ "line1": "string", "city": "string", "state": "string", "country": "string" }} }}
  }},
  "amounts": {{
    "subtotal": "number",
    "tax": {{ "total": "number" }},
    "total": "number (this is the final grand total)"
  }},
  "items": [
    {{
      "description": "string",
      "quantity": "number",
      "rate": "number",
      "amount": "number"
    }}
  ]
}}

Here is the raw text from the invoice:
---
{raw_text}
---

Please provide only the JSON object as the output, without any additional commentary or explanations."#
    )
}

/// Strips markdown code fences models like to wrap JSON in.
fn strip_code_fences(text: &str) -> &str {
    text.trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ai::{CompletionResponse, MockLlmProvider, TokenUsage};

    fn responding_with(text: &'static str) -> Arc<MockLlmProvider> {
        let mut llm = MockLlmProvider::new();
        llm.expect_complete().returning(move |_| {
            Ok(CompletionResponse {
                text: text.to_string(),
                tokens_used: TokenUsage::default(),
            })
        });
        Arc::new(llm)
    }

    #[tokio::test]
    async fn empty_text_is_rejected_without_a_model_call() {
        let mut llm = MockLlmProvider::new();
        llm.expect_complete().never();

        let service = ExtractionService::new(Arc::new(llm));
        let result = service.extract_invoice("   \n  ").await;

        assert!(matches!(result, Err(ExtractionError::EmptyInput)));
    }

    #[tokio::test]
    async fn well_formed_response_parses() {
        let service = ExtractionService::new(responding_with(
            r#"{"metadata": {"number": "INV-100"}, "parties": {"supplier": {"name": "Acme"}}, "amounts": {"total": 1180.0}}"#,
        ));

        let data = service.extract_invoice("Invoice INV-100 ...").await.unwrap();
        assert_eq!(data.metadata.number, "INV-100");
        assert_eq!(data.parties.supplier.name, "Acme");
        assert_eq!(data.amounts.total, 1180.0);
    }

    #[tokio::test]
    async fn fenced_response_is_unwrapped() {
        let service = ExtractionService::new(responding_with(
            "```json\n{\"metadata\": {\"number\": \"INV-7\"}}\n```",
        ));

        let data = service.extract_invoice("some text").await.unwrap();
        assert_eq!(data.metadata.number, "INV-7");
    }

    #[tokio::test]
    async fn non_json_response_is_a_schema_error() {
        let service = ExtractionService::new(responding_with("Sorry, I cannot help with that."));

        let result = service.extract_invoice("some text").await;
        assert!(matches!(result, Err(ExtractionError::Schema(_))));
    }

    #[tokio::test]
    async fn model_failure_propagates() {
        let mut llm = MockLlmProvider::new();
        llm.expect_complete().returning(|_| {
            Err(LlmError::ApiError {
                status: 500,
                message: "overloaded".to_string(),
            })
        });

        let service = ExtractionService::new(Arc::new(llm));
        let result = service.extract_invoice("some text").await;

        assert!(matches!(result, Err(ExtractionError::Llm(_))));
    }

    #[test]
    fn prompt_embeds_the_document_text() {
        let prompt = build_prompt("TOTAL DUE: 1180.00");
        assert!(prompt.contains("TOTAL DUE: 1180.00"));
        assert!(prompt.contains("\"dueDate\""));
        assert!(prompt.contains("only the JSON object"));
    }
}
