//! DOCX to PDF conversion through a headless LibreOffice process.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use certmerge_core::{CertMergeError, Result};

/// Handle to a converter binary found on this machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfConverter {
    binary: PathBuf,
}

impl PdfConverter {
    /// Probe PATH for a LibreOffice binary. `None` means the fixed-layout
    /// stage is skipped and per-recipient DOCX files are kept instead.
    #[must_use]
    pub fn locate() -> Option<Self> {
        let path = env::var_os("PATH")?;
        for dir in env::split_paths(&path) {
            for name in ["soffice", "libreoffice", "soffice.exe"] {
                let candidate = dir.join(name);
                if candidate.is_file() {
                    return Some(Self { binary: candidate });
                }
            }
        }
        None
    }

    /// Converter around a known binary (used by tests).
    #[must_use]
    pub fn from_binary(binary: PathBuf) -> Self {
        Self { binary }
    }

    /// The binary driving conversions.
    #[must_use]
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Convert one document; returns the produced PDF path.
    pub fn convert(&self, docx: &Path, out_dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(out_dir)?;
        let output = Command::new(&self.binary)
            .args(["--headless", "--norestore", "--convert-to", "pdf", "--outdir"])
            .arg(out_dir)
            .arg(docx)
            .output()
            .map_err(|e| CertMergeError::Conversion(format!("failed to launch converter: {e}")))?;

        if !output.status.success() {
            return Err(CertMergeError::Conversion(format!(
                "converter exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let stem = docx
            .file_stem()
            .ok_or_else(|| CertMergeError::Conversion("input has no file name".to_string()))?;
        let produced = out_dir.join(stem).with_extension("pdf");
        if !produced.is_file() {
            // LibreOffice reports success on some failures; trust the file.
            return Err(CertMergeError::Conversion(format!(
                "converter produced no output for {}",
                docx.display()
            )));
        }
        Ok(produced)
    }
}
