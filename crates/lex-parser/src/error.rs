//! Parser error types for lex-parser.

use thiserror::Error;

/// Truncate an HTML payload to a debuggable snippet (200 chars).
#[must_use]
pub fn html_snippet(html: &str) -> String {
    html.chars().take(200).collect()
}

/// Errors raised by the HTML parsers. Shape drift is non-recoverable: the
/// same payload will never parse on retry.
#[derive(Debug, Error)]
pub enum ParserError {
    /// Expected structural element is missing — the upstream page shape has
    /// drifted. Carries a truncated snippet of the offending HTML.
    #[error("Unrecognized page shape: {message}")]
    Shape { message: String, snippet: String },
}

impl ParserError {
    #[must_use]
    pub fn shape(message: impl Into<String>, html: &str) -> Self {
        Self::Shape {
            message: message.into(),
            snippet: html_snippet(html),
        }
    }
}

/// Errors raised during PDF text extraction.
#[derive(Debug, Error)]
pub enum PdfError {
    /// Zero bytes were handed to the extractor.
    #[error("Empty PDF input")]
    EmptyInput,

    /// The bytes are not a readable PDF.
    #[error("Corrupted PDF: {0}")]
    Corrupted(String),

    /// The PDF is encrypted and no password is available.
    #[error("Password-protected PDF: {0}")]
    PasswordProtected(String),

    /// The PDF opened but its text layer is empty. Recoverable — a re-fetch
    /// may return the complete file.
    #[error("PDF has no extractable text")]
    EmptyText,
}

impl PdfError {
    /// Whether a retry can plausibly succeed.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::EmptyText)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_is_truncated_on_char_boundary() {
        let html = "á".repeat(500);
        let snippet = html_snippet(&html);
        assert_eq!(snippet.chars().count(), 200);
    }

    #[test]
    fn pdf_recoverability() {
        assert!(PdfError::EmptyText.is_recoverable());
        assert!(!PdfError::Corrupted("x".into()).is_recoverable());
        assert!(!PdfError::PasswordProtected("x".into()).is_recoverable());
        assert!(!PdfError::EmptyInput.is_recoverable());
    }
}
