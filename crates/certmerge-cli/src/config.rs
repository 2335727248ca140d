//! Configuration file handling (certmerge.toml).
//!
//! Configuration files can be placed in:
//! - User home directory: ~/.certmerge.toml (user defaults)
//! - Working directory: ./certmerge.toml (run defaults)
//! - Custom location via --config flag (used alone, no merging)
//!
//! Precedence order (highest to lowest): run config, user config,
//! built-in defaults. Every field is optional.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use certmerge_core::CertificateInfo;
use certmerge_roster::RosterOptions;
use serde::Deserialize;

/// Raw configuration file contents; all fields optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    certificate: Option<CertificateSection>,
    excel: Option<ExcelSection>,
    output: Option<OutputSection>,
    /// Every key K becomes an extra marker `<<K>>`.
    placeholders: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
struct CertificateSection {
    issued_by: Option<String>,
    issued_at: Option<String>,
    /// Blank means "today".
    issued_date: Option<String>,
    no_dharma_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
struct ExcelSection {
    header_row: Option<usize>,
    filter_column: Option<String>,
    filter_value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
struct OutputSection {
    create_combined_pdf: Option<bool>,
    combined_pdf_name: Option<String>,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub certificate: CertificateInfo,
    pub roster: RosterOptions,
    pub create_combined_pdf: bool,
    pub combined_pdf_name: String,
    pub placeholders: BTreeMap<String, String>,
}

impl ConfigFile {
    /// Load one configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// Discover configuration: an explicit `--config` path is used alone;
    /// otherwise the user file and the run file are merged, run values
    /// winning. Returns the config plus the files it came from.
    pub fn discover(explicit: Option<&Path>, base_dir: &Path) -> Result<(Self, Vec<PathBuf>)> {
        if let Some(path) = explicit {
            return Ok((Self::load(path)?, vec![path.to_path_buf()]));
        }

        let mut sources = Vec::new();
        let user = dirs::home_dir()
            .map(|home| home.join(".certmerge.toml"))
            .filter(|path| path.is_file())
            .map(|path| {
                sources.push(path.clone());
                Self::load(&path)
            })
            .transpose()?
            .unwrap_or_default();
        let run_path = base_dir.join("certmerge.toml");
        let run = if run_path.is_file() {
            sources.push(run_path.clone());
            Self::load(&run_path)?
        } else {
            Self::default()
        };

        Ok((Self::merge(user, run), sources))
    }

    /// Field-wise merge; `over` wins wherever it defines a value.
    fn merge(base: Self, over: Self) -> Self {
        Self {
            certificate: merge_sections(base.certificate, over.certificate, |b, o| {
                CertificateSection {
                    issued_by: o.issued_by.or(b.issued_by),
                    issued_at: o.issued_at.or(b.issued_at),
                    issued_date: o.issued_date.or(b.issued_date),
                    no_dharma_name: o.no_dharma_name.or(b.no_dharma_name),
                }
            }),
            excel: merge_sections(base.excel, over.excel, |b, o| ExcelSection {
                header_row: o.header_row.or(b.header_row),
                filter_column: o.filter_column.or(b.filter_column),
                filter_value: o.filter_value.or(b.filter_value),
            }),
            output: merge_sections(base.output, over.output, |b, o| OutputSection {
                create_combined_pdf: o.create_combined_pdf.or(b.create_combined_pdf),
                combined_pdf_name: o.combined_pdf_name.or(b.combined_pdf_name),
            }),
            placeholders: match (base.placeholders, over.placeholders) {
                (Some(mut base), Some(over)) => {
                    base.extend(over);
                    Some(base)
                }
                (base, over) => over.or(base),
            },
        }
    }

    /// Apply built-in defaults.
    pub fn resolve(self) -> Settings {
        let defaults = CertificateInfo::default();
        let certificate = self.certificate.unwrap_or_default();
        let excel = self.excel.unwrap_or_default();
        let output = self.output.unwrap_or_default();

        Settings {
            certificate: CertificateInfo {
                issued_by: certificate.issued_by.unwrap_or(defaults.issued_by),
                issued_at: certificate.issued_at.unwrap_or(defaults.issued_at),
                issued_date: certificate.issued_date.unwrap_or(defaults.issued_date),
                no_dharma_name: certificate.no_dharma_name.unwrap_or(defaults.no_dharma_name),
            },
            roster: RosterOptions {
                header_row: excel.header_row.unwrap_or(5),
                filter_column: excel.filter_column.filter(|s| !s.trim().is_empty()),
                filter_value: excel.filter_value.filter(|s| !s.trim().is_empty()),
            },
            create_combined_pdf: output.create_combined_pdf.unwrap_or(true),
            combined_pdf_name: output
                .combined_pdf_name
                .unwrap_or_else(|| "Chung_chi_%Y%m%d_%H%M%S".to_string()),
            placeholders: self.placeholders.unwrap_or_default(),
        }
    }
}

fn merge_sections<T>(
    base: Option<T>,
    over: Option<T>,
    combine: impl FnOnce(T, T) -> T,
) -> Option<T> {
    match (base, over) {
        (Some(base), Some(over)) => Some(combine(base, over)),
        (base, over) => over.or(base),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_any_file() {
        let settings = ConfigFile::default().resolve();
        assert_eq!(settings.certificate.issued_at, "Đà Nẵng");
        assert_eq!(settings.roster.header_row, 5);
        assert!(settings.create_combined_pdf);
        assert!(settings.placeholders.is_empty());
    }

    #[test]
    fn test_parse_full_file() {
        let config: ConfigFile = toml::from_str(
            r#"
[certificate]
issued_by = "BHD Trung Ương"
issued_date = "ngày 01 tháng 06 năm 2025"

[excel]
header_row = 3
filter_column = "Ghi chú"
filter_value = "Đạt"

[output]
create_combined_pdf = false

[placeholders]
Khoa_hoc = "Bậc Kiên"
"#,
        )
        .expect("parse");
        let settings = config.resolve();
        assert_eq!(settings.certificate.issued_by, "BHD Trung Ương");
        assert_eq!(settings.certificate.issued_at, "Đà Nẵng");
        assert_eq!(settings.roster.header_row, 3);
        assert_eq!(settings.roster.filter_value.as_deref(), Some("Đạt"));
        assert!(!settings.create_combined_pdf);
        assert_eq!(
            settings.placeholders.get("Khoa_hoc").map(String::as_str),
            Some("Bậc Kiên")
        );
    }

    #[test]
    fn test_merge_prefers_run_config() {
        let user: ConfigFile = toml::from_str(
            "[certificate]\nissued_by = \"user\"\nissued_at = \"user-place\"\n",
        )
        .expect("user");
        let run: ConfigFile =
            toml::from_str("[certificate]\nissued_by = \"run\"\n").expect("run");
        let merged = ConfigFile::merge(user, run).resolve();
        assert_eq!(merged.certificate.issued_by, "run");
        assert_eq!(merged.certificate.issued_at, "user-place");
    }

    #[test]
    fn test_blank_filter_resolves_to_none() {
        let config: ConfigFile =
            toml::from_str("[excel]\nfilter_column = \"\"\n").expect("parse");
        assert_eq!(config.resolve().roster.filter_column, None);
    }
}
