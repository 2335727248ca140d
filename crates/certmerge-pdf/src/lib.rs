//! # certmerge-pdf
//!
//! The fixed-layout stage: per-recipient DOCX files are converted to PDF
//! through a headless LibreOffice process, and the batch optionally ends
//! with one combined PDF concatenating every recipient's pages in
//! filename-sorted order.
//!
//! Both halves degrade gracefully: a missing converter keeps the DOCX
//! outputs, and a failed merge keeps the per-recipient PDFs.

pub mod convert;
pub mod merge;
pub mod name;

pub use convert::PdfConverter;
pub use merge::merge_pdfs;
pub use name::combined_pdf_name;
