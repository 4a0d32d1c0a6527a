//! PDF text-layer extraction with a quality confidence score.
//!
//! Gazette PDFs from the portal normally carry a proper text layer;
//! extraction goes through `pdf-extract`. Scanned documents without a text
//! layer surface as [`PdfError::EmptyText`] — OCR is out of scope. The
//! confidence score estimates extraction quality from text statistics tuned
//! for Spanish legal prose.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::PdfError;

static SPECIAL_CHARS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[§¶@#$%&*]").expect("static regex"));
static SENTENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+[.!?]\s+\w+").expect("static regex"));
static SPANISH_CHARS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[áéíóúüñÁÉÍÓÚÜÑ]").expect("static regex"));

/// Result of a successful extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfText {
    pub text: String,
    /// Estimated quality in `[0, 1]`.
    pub confidence: f64,
}

/// Extract the text layer from PDF bytes.
///
/// # Errors
///
/// - [`PdfError::EmptyInput`] for zero bytes
/// - [`PdfError::PasswordProtected`] for encrypted files
/// - [`PdfError::Corrupted`] when the bytes are not a readable PDF
/// - [`PdfError::EmptyText`] when the file opens but yields no text
pub fn extract_pdf_text(bytes: &[u8]) -> Result<PdfText, PdfError> {
    if bytes.is_empty() {
        return Err(PdfError::EmptyInput);
    }

    let text = pdf_extract::extract_text_from_mem(bytes).map_err(classify_extract_error)?;

    if text.trim().is_empty() {
        return Err(PdfError::EmptyText);
    }

    let confidence = extraction_confidence(&text);
    Ok(PdfText { text, confidence })
}

fn classify_extract_error(error: pdf_extract::OutputError) -> PdfError {
    let message = error.to_string();
    let lowered = message.to_lowercase();
    if lowered.contains("password") || lowered.contains("encrypt") {
        PdfError::PasswordProtected(message)
    } else {
        PdfError::Corrupted(message)
    }
}

/// Score extraction quality from text statistics.
///
/// Components: average word length within the Spanish-typical `[3, 12]`
/// band, special-symbol density below 2%, evidence of sentence structure,
/// and a short-word ratio below 30%. Spanish characters apply a 1.1
/// multiplier. The result is clamped to `[0, 1]`.
#[must_use]
pub fn extraction_confidence(text: &str) -> f64 {
    if text.is_empty() {
        return 0.0;
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return 0.0;
    }

    #[allow(clippy::cast_precision_loss)]
    let word_count = words.len() as f64;
    #[allow(clippy::cast_precision_loss)]
    let avg_word_length =
        words.iter().map(|w| w.chars().count()).sum::<usize>() as f64 / word_count;
    let word_length_score = if (3.0..=12.0).contains(&avg_word_length) {
        1.0
    } else {
        0.3
    };

    #[allow(clippy::cast_precision_loss)]
    let special_ratio =
        SPECIAL_CHARS_RE.find_iter(text).count() as f64 / text.chars().count() as f64;
    let special_char_score = if special_ratio < 0.02 { 1.0 } else { 0.2 };

    let sentence_score = if SENTENCE_RE.is_match(text) { 1.0 } else { 0.5 };

    let spanish_score = if SPANISH_CHARS_RE.is_match(text) {
        1.1
    } else {
        1.0
    };

    #[allow(clippy::cast_precision_loss)]
    let short_word_ratio =
        words.iter().filter(|w| w.chars().count() <= 2).count() as f64 / word_count;
    let short_word_score = if short_word_ratio < 0.3 { 1.0 } else { 0.2 };

    let confidence: f64 = (word_length_score * 0.25
        + special_char_score * 0.25
        + sentence_score * 0.2
        + short_word_score * 0.3)
        * spanish_score;

    confidence.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_distinct_error() {
        assert!(matches!(extract_pdf_text(&[]), Err(PdfError::EmptyInput)));
    }

    #[test]
    fn garbage_bytes_are_corrupted() {
        let result = extract_pdf_text(b"definitely not a pdf");
        assert!(matches!(result, Err(PdfError::Corrupted(_))));
    }

    #[test]
    fn clean_spanish_prose_scores_high() {
        let text = "Artículo 1. La presente Ley es de observancia general en toda la \
                    República. Sus disposiciones son de orden público e interés social.";
        let confidence = extraction_confidence(text);
        assert!(confidence > 0.9, "got {confidence}");
        assert!(confidence <= 1.0);
    }

    #[test]
    fn garbled_text_scores_low() {
        let text = "a b c d e f §§ ¶¶ @@ ## x y z q w r t §§ ¶¶ @@ ##";
        let confidence = extraction_confidence(text);
        assert!(confidence < 0.5, "got {confidence}");
    }

    #[test]
    fn empty_text_scores_zero() {
        assert!((extraction_confidence("") - 0.0).abs() < f64::EPSILON);
        assert!((extraction_confidence("   ") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn confidence_is_clamped() {
        // Spanish bonus cannot push past 1.0.
        let text = "La educación es un derecho. Toda persona tiene derecho a recibirla.";
        assert!(extraction_confidence(text) <= 1.0);
    }
}
