//! Error types for certificate generation.
//!
//! Input errors (missing template, missing roster, missing required column)
//! are fatal to a whole run. Everything else is recoverable at the
//! per-recipient level: the batch controller logs the failure and moves on
//! to the next recipient.

use std::path::PathBuf;
use thiserror::Error;

/// Error conditions across the generation pipeline.
#[derive(Error, Debug)]
pub enum CertMergeError {
    /// Underlying filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No `.docx` template in the templates folder. Fatal to the run.
    #[error("no certificate template (.docx) found in {}", .0.display())]
    TemplateNotFound(PathBuf),

    /// No roster workbook in the input folder. Fatal to the run.
    #[error("no roster workbook (.xlsx/.xls) found in {}", .0.display())]
    RosterNotFound(PathBuf),

    /// The roster sheet has no column with the required header. Fatal.
    #[error("roster is missing required column {0:?}")]
    MissingColumn(String),

    /// Roster workbook could not be opened or read.
    #[error("roster error: {0}")]
    Roster(String),

    /// The template archive or one of its XML parts is malformed.
    #[error("template package error: {0}")]
    Package(String),

    /// The engine visited every region and replaced nothing. Reported
    /// separately from serialization failures so the controller can try a
    /// fallback engine before marking the recipient failed.
    #[error("no placeholder was replaced in the template")]
    NoReplacements,

    /// A builder strategy failed for a reason other than zero replacements.
    #[error("document build error: {0}")]
    Build(String),

    /// DOCX to PDF conversion failed.
    #[error("PDF conversion error: {0}")]
    Conversion(String),

    /// No converter binary on PATH. The per-recipient document is kept as
    /// DOCX and only the fixed-layout step is skipped.
    #[error("PDF converter not found on PATH")]
    ConverterUnavailable,

    /// Combined-PDF concatenation failed. Per-recipient outputs are kept.
    #[error("PDF merge error: {0}")]
    Merge(String),

    /// Configuration file could not be parsed.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias used throughout the certmerge crates.
pub type Result<T> = std::result::Result<T, CertMergeError>;
