//! Replacement map construction.
//!
//! A replacement map is built fresh for every recipient and is immutable
//! during that recipient's document build. Keys are full marker tokens
//! including the delimiters (`<<Ho_va_ten>>`), values are the resolved
//! display strings. Precedence when keys collide: recipient-derived values,
//! then static certificate values, then custom configured placeholders --
//! later stages never overwrite a key an earlier stage defined.

use std::collections::BTreeMap;

use chrono::Local;

use crate::recipient::Recipient;

/// Wrap a bare placeholder name in marker delimiters.
#[must_use]
pub fn marker_token(name: &str) -> String {
    format!("<<{name}>>")
}

/// Static certificate values resolved from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CertificateInfo {
    /// Issuing body, rendered for `<<Do>>`.
    pub issued_by: String,
    /// Issuing location, rendered for `<<Tai>>`.
    pub issued_at: String,
    /// Issue date, rendered for `<<Ngay>>`. Blank means "today".
    pub issued_date: String,
    /// Display string used when a recipient has no dharma name.
    pub no_dharma_name: String,
}

impl Default for CertificateInfo {
    fn default() -> Self {
        Self {
            issued_by: "Ban Hướng Dẫn GĐPT".to_string(),
            issued_at: "Đà Nẵng".to_string(),
            issued_date: String::new(),
            no_dharma_name: "Không có".to_string(),
        }
    }
}

impl CertificateInfo {
    /// The issue date to render: the configured string, or today in the
    /// traditional `ngày D tháng M năm Y` form when none is configured.
    #[must_use]
    pub fn issue_date(&self) -> String {
        let configured = self.issued_date.trim();
        if configured.is_empty() {
            Local::now()
                .format("ngày %d tháng %m năm %Y")
                .to_string()
        } else {
            configured.to_string()
        }
    }
}

/// Marker token to replacement string, with deterministic iteration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplacementMap {
    entries: BTreeMap<String, String>,
}

impl ReplacementMap {
    /// Empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a token unless an earlier stage already defined it.
    /// Returns whether the entry was inserted.
    pub fn insert_if_absent(
        &mut self,
        token: impl Into<String>,
        value: impl Into<String>,
    ) -> bool {
        let token = token.into();
        if self.entries.contains_key(&token) {
            return false;
        }
        self.entries.insert(token, value.into());
        true
    }

    /// Build the full map for one recipient.
    ///
    /// `custom` holds extra bare placeholder names from configuration; each
    /// key `K` produces a `<<K>>` token.
    #[must_use]
    pub fn for_recipient(
        recipient: &Recipient,
        certificate: &CertificateInfo,
        custom: &BTreeMap<String, String>,
    ) -> Self {
        let mut map = Self::new();

        let dharma = if recipient.dharma_name.trim().is_empty() {
            certificate.no_dharma_name.clone()
        } else {
            recipient.dharma_name.trim().to_string()
        };

        // Stage 1: recipient-derived values.
        map.insert_if_absent(marker_token("Ho_va_ten"), recipient.full_name.clone());
        map.insert_if_absent(marker_token("Phap_danh"), dharma);
        map.insert_if_absent(marker_token("Nam_sinh"), recipient.birth_year.clone());
        map.insert_if_absent(marker_token("Don_vi"), recipient.unit.clone());

        // Stage 2: static certificate values.
        map.insert_if_absent(marker_token("Do"), certificate.issued_by.clone());
        map.insert_if_absent(marker_token("Tai"), certificate.issued_at.clone());
        map.insert_if_absent(marker_token("Ngay"), certificate.issue_date());

        // Stage 3: custom configured placeholders.
        for (key, value) in custom {
            map.insert_if_absent(marker_token(key), value.clone());
        }

        map
    }

    /// Look up a token (delimiters included).
    #[must_use]
    pub fn get(&self, token: &str) -> Option<&str> {
        self.entries.get(token).map(String::as_str)
    }

    /// Whether the map defines the given token.
    #[must_use]
    pub fn contains_token(&self, token: &str) -> bool {
        self.entries.contains_key(token)
    }

    /// Iterate entries in deterministic (sorted) order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Iterate tokens in deterministic (sorted) order.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
