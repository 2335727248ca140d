//! Placeholder substitution engine.
//!
//! For every region the engine reconstructs the logical text by
//! concatenating the region's runs in order, so a marker split across
//! adjacent runs by earlier formatting edits is seen whole. Regions whose
//! logical text contains no mapped marker are left untouched; touched
//! regions collapse to a single run carrying the formatting of the first
//! non-whitespace run.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use certmerge_core::{Journal, ReplacementMap, Result};
use regex::Regex;

use crate::model::{RegionRef, Run};
use crate::package::DocxPackage;

/// Result of one substitution pass over a template.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubstitutionOutcome {
    /// Number of regions that were rewritten (one event per region, not
    /// per marker occurrence). The document-level success signal.
    pub regions_replaced: usize,
}

/// Replace every mapped marker in every region of the package.
pub fn substitute(
    package: &mut DocxPackage,
    map: &ReplacementMap,
    journal: &Journal,
) -> Result<SubstitutionOutcome> {
    let mut regions = package.regions();
    // Text-box paragraphs nest inside their host paragraph's markup, so
    // rewrite deepest-first to keep child-index paths valid.
    regions.sort_by_key(|region| std::cmp::Reverse(region.path.len()));

    let mut outcome = SubstitutionOutcome::default();
    for region in &regions {
        if substitute_region(package, region, map, journal)? {
            outcome.regions_replaced += 1;
        }
    }
    Ok(outcome)
}

fn substitute_region(
    package: &mut DocxPackage,
    region: &RegionRef,
    map: &ReplacementMap,
    journal: &Journal,
) -> Result<bool> {
    let runs = package.runs(region);
    if runs.is_empty() {
        return Ok(false);
    }

    let logical: String = runs.iter().map(|run| run.text.as_str()).collect();
    if !map.iter().any(|(token, _)| logical.contains(token)) {
        return Ok(false);
    }

    let replaced = apply_replacements(&logical, map);
    let representative = representative_run(&runs);
    let merged = Run::with_format_of(representative, replaced);
    package.set_runs(region, &[merged])?;
    journal.debug(format!(
        "replaced markers in {:?} region ({} runs merged)",
        region.kind,
        runs.len()
    ));
    Ok(true)
}

/// Left-to-right single pass: at each position the earliest-starting token
/// wins, its value is emitted, and scanning resumes after the match.
/// Replacement values are never re-scanned, so a value that happens to
/// look like a marker stays verbatim.
fn apply_replacements(text: &str, map: &ReplacementMap) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while !rest.is_empty() {
        let mut earliest: Option<(usize, &str, &str)> = None;
        for (token, value) in map.iter() {
            if let Some(at) = rest.find(token) {
                let better = earliest.map_or(true, |(best_at, best_token, _)| {
                    at < best_at || (at == best_at && token.len() > best_token.len())
                });
                if better {
                    earliest = Some((at, token, value));
                }
            }
        }
        match earliest {
            Some((at, token, value)) => {
                out.push_str(&rest[..at]);
                out.push_str(value);
                rest = &rest[at + token.len()..];
            }
            None => {
                out.push_str(rest);
                break;
            }
        }
    }
    out
}

/// The run whose descriptor survives: the first with non-whitespace text,
/// or the first run when the whole region is whitespace.
fn representative_run(runs: &[Run]) -> &Run {
    runs.iter()
        .find(|run| !run.text.trim().is_empty())
        .unwrap_or(&runs[0])
}

fn marker_regex() -> &'static Regex {
    static MARKER_RE: OnceLock<Regex> = OnceLock::new();
    MARKER_RE.get_or_init(|| Regex::new("<<[^>]+>>").expect("static marker pattern"))
}

/// Pre-flight scan: every substring of the template matching the generic
/// marker syntax `<<...>>`, whether mapped or not. Logical text is
/// reconstructed exactly as the substitution pass does, so markers split
/// across run boundaries are detected too. Purely informational.
#[must_use]
pub fn check_template_placeholders(package: &DocxPackage) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    for region in package.regions() {
        let logical: String = package
            .runs(&region)
            .iter()
            .map(|run| run.text.as_str())
            .collect();
        for m in marker_regex().find_iter(&logical) {
            found.insert(m.as_str().to_string());
        }
    }
    found
}
