//! Recipient records parsed from the roster.

/// One row of the roster after column mapping and cleaning.
///
/// All attribute fields are kept as display strings: birth years arrive
/// from spreadsheets as floats, strings, or blanks, and the template only
/// ever needs the rendered text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Recipient {
    /// Sequence number, either from the roster or the row position.
    pub seq: u32,
    /// Full name. Required; rows without it are dropped by the reader.
    pub full_name: String,
    /// Dharma name, may be empty (a configured fallback is displayed).
    pub dharma_name: String,
    /// Birth year as display text, may be empty.
    pub birth_year: String,
    /// Unit / group, may be empty.
    pub unit: String,
}

impl Recipient {
    /// Output file stem: zero-padded sequence number plus sanitized name,
    /// e.g. `003_Nguyen_Van_An`.
    #[must_use]
    pub fn file_stem(&self) -> String {
        format!("{:03}_{}", self.seq, sanitize_file_name(&self.full_name))
    }
}

/// Replace characters that do not survive in file names.
///
/// Spaces and both path separators become underscores; everything else is
/// kept, including non-ASCII letters.
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            ' ' | '/' | '\\' => '_',
            other => other,
        })
        .collect()
}
