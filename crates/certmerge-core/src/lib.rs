//! # certmerge-core
//!
//! Shared types for the certmerge workspace: the error taxonomy, recipient
//! records, per-recipient replacement maps, and the run journal.
//!
//! The heavier machinery lives in sibling crates: `certmerge-docx` (template
//! model and substitution engine), `certmerge-roster` (XLSX roster reader),
//! `certmerge-pdf` (conversion and concatenation), and `certmerge-cli` (the
//! batch controller).

pub mod error;
pub mod journal;
pub mod mapping;
pub mod recipient;

pub use error::{CertMergeError, Result};
pub use journal::Journal;
pub use mapping::{marker_token, CertificateInfo, ReplacementMap};
pub use recipient::{sanitize_file_name, Recipient};
