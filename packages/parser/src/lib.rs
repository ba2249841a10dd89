//! Nomothesia Parser - Recover the structure of Greek legislative text.
//!
//! Bills and consultation drafts arrive as long, loosely formatted text.
//! Article headers may be decorated with Markdown emphasis, numbered with
//! digits or ordinal words, expressed as ranges, or quoted inside amendment
//! text where they must not count as boundaries. This crate turns such text
//! into an ordered, lossless list of article chunks and maps article titles
//! onto a Part/Chapter tree.
//!
//! # Example
//!
//! ```
//! use nomothesia_parser::chunk::chunk_document;
//!
//! let text = "Άρθρο 1\nΣκοπός\n«Άρθρο 5\nνέο κείμενο»\nΆρθρο 2\nΑντικείμενο";
//! let chunks = chunk_document(text);
//! assert_eq!(chunks.len(), 2);
//! assert_eq!(chunks.iter().map(|c| c.content_text.as_str()).collect::<String>(), text);
//! ```
//!
//! # Architecture
//!
//! - [`config`]: Shared constants and static patterns
//! - [`numeral`]: Greek alphabetic and ordinal-word numerals
//! - [`grammar`]: Staged article-header grammar
//! - [`boundary`]: Quote-aware true-header detection with range expansion
//! - [`gap_fill`]: Ranked mentions standing in for missing headers
//! - [`sequence`]: Expected ranges, sequence completion and integrity checks
//! - [`chunk`]: Lossless chunk reconstruction
//! - [`hierarchy`]: Part/Chapter mapping, continuity checks and tree building
//! - [`report`]: Dry-run hierarchy views
//! - [`error`]: Error types and Result alias
//! - [`cli`]: Command-line interface

pub mod boundary;
pub mod chunk;
pub mod cli;
pub mod config;
pub mod error;
pub mod gap_fill;
pub mod grammar;
pub mod hierarchy;
pub mod numeral;
pub mod report;
pub mod sequence;

// Re-export the main entry points
pub use boundary::{detect, HeaderLocation};
pub use chunk::{chunk_document, chunk_document_with_title, reconstruct, ArticleChunk, ChunkKind};
pub use gap_fill::{fill, Mention};
pub use hierarchy::{map, BillHierarchy, HierarchyAssignment, HierarchyMapping, NumeralLabel, TitleLine};

// Re-export commonly used items
pub use error::{ParserError, Result};
pub use numeral::{greek_to_int, int_to_greek};
