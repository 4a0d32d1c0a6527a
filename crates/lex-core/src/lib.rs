//! # lex-core
//!
//! Core types, ID generation, and error types for Lexmex.
//!
//! This crate provides the foundational types shared across all Lexmex crates:
//! - Entity structs for the legislation domain (documents, articles, reforms,
//!   text chunks, embeddings, checkpoints)
//! - Closed-set enums resolved from upstream Spanish labels with documented
//!   defaults
//! - ID prefix-free UUID helpers and the chunk-ID format
//! - Cross-cutting error types

pub mod entities;
pub mod enums;
pub mod errors;
pub mod ids;
