//! # lex-parser
//!
//! Boundary contract with the upstream SCJN legislation portal:
//!
//! - [`search`] — search-results grid and pagination parsing
//! - [`detail`] — document detail pages: metadata, articles, reform table
//! - [`pdf`] — PDF text-layer extraction with a quality confidence score
//! - [`chunker`] — legal-boundary-aware text chunking for embedding
//!
//! All parsers fail closed: when the page shape has drifted (expected
//! containers missing) they return [`error::ParserError::Shape`] carrying a
//! truncated HTML snippet. Empty results are not errors.

pub mod chunker;
pub mod detail;
pub mod error;
pub mod pdf;
pub mod search;

pub use error::{ParserError, PdfError};
