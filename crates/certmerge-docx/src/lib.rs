//! # certmerge-docx
//!
//! DOCX template model and placeholder substitution engine.
//!
//! A `.docx` file is a ZIP archive of XML parts. This crate loads the
//! archive, exposes every text-bearing region (body paragraphs, table
//! cells at any nesting depth, headers/footers of every section variant,
//! floating text boxes) through a uniform adapter, and replaces literal
//! `<<Name>>` markers while preserving the run formatting in effect where
//! text remains. Markers split across adjacent runs by earlier formatting
//! edits are handled by reconstructing each region's logical text before
//! searching.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use certmerge_core::{Journal, ReplacementMap};
//! use certmerge_docx::{engine, DocxPackage};
//!
//! let mut package = DocxPackage::open("templates/certificate.docx".as_ref())?;
//! let outcome = engine::substitute(&mut package, &map, &Journal::disabled())?;
//! assert!(outcome.regions_replaced > 0);
//! package.save("output/001_An.docx".as_ref())?;
//! # Ok::<(), certmerge_core::CertMergeError>(())
//! ```

pub mod builder;
pub mod engine;
pub mod host;
pub mod model;
pub mod package;
pub mod xml;

pub use builder::{build_certificate, default_builders, BuildOutcome, CertificateBuilder, EngineBuilder};
pub use engine::{check_template_placeholders, substitute, SubstitutionOutcome};
pub use host::HostBuilder;
pub use model::{RegionKind, RegionRef, Run, RunFormat};
pub use package::{find_template_file, DocxPackage};
