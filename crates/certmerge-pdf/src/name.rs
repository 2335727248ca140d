//! Combined-PDF file naming.
//!
//! The configured name may carry strftime passes (`Chung_chi_%Y%m%d`). A
//! name without any pass gets a timestamp suffix so repeated runs never
//! overwrite an earlier combined document; an invalid pass falls back to a
//! fixed stem.

use std::fmt::Write;

use chrono::{DateTime, Local};

const FALLBACK_STEM: &str = "GiayKhen_TongHop";

/// Render the combined-PDF file stem (extension excluded).
#[must_use]
pub fn combined_pdf_name(template: &str, now: &DateTime<Local>) -> String {
    let template = template.trim();
    let timestamp = now.format("%Y%m%d_%H%M%S");

    if template.is_empty() {
        return format!("{FALLBACK_STEM}_{timestamp}");
    }
    if !template.contains('%') {
        return format!("{template}_{timestamp}");
    }

    // chrono reports bad format passes through the writer, not a panic.
    let mut rendered = String::new();
    if write!(&mut rendered, "{}", now.format(template)).is_ok() {
        rendered
    } else {
        log::warn!("invalid date passes in combined name {template:?}, using fallback");
        format!("{FALLBACK_STEM}_{timestamp}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 6, 1, 8, 30, 0).unwrap()
    }

    #[test]
    fn test_strftime_passes_are_rendered() {
        assert_eq!(
            combined_pdf_name("Chung_chi_%Y%m%d", &fixed_now()),
            "Chung_chi_20250601"
        );
    }

    #[test]
    fn test_static_name_gets_timestamp_suffix() {
        assert_eq!(
            combined_pdf_name("TongHop", &fixed_now()),
            "TongHop_20250601_083000"
        );
    }

    #[test]
    fn test_invalid_pass_falls_back() {
        let name = combined_pdf_name("bad_%Q_pass", &fixed_now());
        assert_eq!(name, "GiayKhen_TongHop_20250601_083000");
    }

    #[test]
    fn test_blank_template_falls_back() {
        let name = combined_pdf_name("  ", &fixed_now());
        assert_eq!(name, "GiayKhen_TongHop_20250601_083000");
    }
}
