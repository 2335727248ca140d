//! Document model adapter: uniform traversal over every text-bearing
//! region of a template, independent of whether it lives in the main body,
//! a table cell (tables nest), a header or footer of any section variant,
//! or a floating text box.
//!
//! A region is a `w:p` element addressed by (part index, child-index
//! path). Its runs are the direct `w:r` children that carry text; runs
//! whose content is a drawing or other anchored object are not text runs
//! and survive any rewrite in place.

use std::collections::HashSet;

use certmerge_core::{CertMergeError, Result};

use crate::package::{DocxPackage, DOCUMENT_PART};
use crate::xml::{XmlElement, XmlNode};

/// Where a region lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionKind {
    /// Body paragraph of the main document.
    Body,
    /// Paragraph inside a table cell (any nesting depth).
    TableCell,
    /// Paragraph of a header part.
    Header,
    /// Paragraph of a footer part.
    Footer,
    /// Paragraph inside a floating text-box shape.
    TextBox,
}

/// Handle to one region of a loaded package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionRef {
    pub(crate) part: usize,
    pub(crate) path: Vec<usize>,
    /// Structural classification of the region.
    pub kind: RegionKind,
}

/// Formatting descriptor of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RunFormat {
    /// Font family (ASCII slot of `w:rFonts`).
    pub font: Option<String>,
    /// Size in half-points (`w:sz`).
    pub size: Option<u32>,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    /// Hex color from `w:color`, best-effort.
    pub color: Option<String>,
}

/// A contiguous span of uniformly formatted text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    /// Text content, with tabs and line breaks mapped to `\t` / `\n`.
    pub text: String,
    /// Parsed formatting descriptor.
    pub format: RunFormat,
    /// Verbatim `w:rPr` subtree for lossless write-back.
    pub(crate) rpr: Option<XmlElement>,
}

impl Run {
    /// New run carrying another run's formatting.
    #[must_use]
    pub fn with_format_of(source: &Run, text: String) -> Self {
        Self {
            text,
            format: source.format.clone(),
            rpr: source.rpr.clone(),
        }
    }
}

/// Per-part region buckets in discovery order.
#[derive(Debug, Default)]
struct PartRegions {
    plain: Vec<RegionRef>,
    cells: Vec<RegionRef>,
    boxes: Vec<RegionRef>,
}

impl DocxPackage {
    /// Every text-bearing region of the template, each exactly once.
    ///
    /// Order: body paragraphs in document order, then table-cell
    /// paragraphs row-major (nested tables in tree order), then each
    /// section's header parts followed by its footer parts, then floating
    /// text boxes.
    #[must_use]
    pub fn regions(&self) -> Vec<RegionRef> {
        let mut out = Vec::new();
        let mut boxes = Vec::new();

        let Some(document) = self.part_index(DOCUMENT_PART) else {
            return out;
        };
        let doc_regions = self.collect_part_regions(document, RegionKind::Body);
        out.extend(doc_regions.plain);
        out.extend(doc_regions.cells);
        boxes.extend(doc_regions.boxes);

        for part in self.section_part_order() {
            let kind = if self.entry_name(part).starts_with("word/header") {
                RegionKind::Header
            } else {
                RegionKind::Footer
            };
            let part_regions = self.collect_part_regions(part, kind);
            out.extend(part_regions.plain);
            out.extend(part_regions.cells);
            boxes.extend(part_regions.boxes);
        }

        out.extend(boxes);
        out
    }

    /// The region's ordered text runs.
    #[must_use]
    pub fn runs(&self, region: &RegionRef) -> Vec<Run> {
        let Some(paragraph) = self
            .part(region.part)
            .and_then(|part| part.node(&region.path))
            .and_then(XmlNode::as_element)
        else {
            return Vec::new();
        };

        paragraph
            .child_elements()
            .filter(|el| is_text_run(el))
            .map(|el| Run {
                text: run_text(el),
                format: parse_run_format(el.find_child("w:rPr")),
                rpr: el.find_child("w:rPr").cloned(),
            })
            .collect()
    }

    /// Replace the region's text runs atomically.
    ///
    /// Paragraph properties and non-text children (drawing anchors,
    /// bookmarks, field machinery) stay in place; the new runs are written
    /// at the first text run's position. Replacing with a single run is
    /// always valid.
    pub fn set_runs(&mut self, region: &RegionRef, runs: &[Run]) -> Result<()> {
        let paragraph = self
            .part_mut(region.part)
            .and_then(|part| part.element_mut(&region.path))
            .ok_or_else(|| CertMergeError::Package("stale region handle".to_string()))?;

        let old_children = std::mem::take(&mut paragraph.children);
        let mut new_children = Vec::with_capacity(old_children.len());
        let mut inserted = false;
        for child in old_children {
            let replaces = child
                .as_element()
                .is_some_and(|el| el.is("w:r") && is_text_run(el));
            if replaces {
                if !inserted {
                    new_children.extend(runs.iter().map(|run| XmlNode::Element(write_run(run))));
                    inserted = true;
                }
            } else {
                new_children.push(child);
            }
        }
        if !inserted {
            // No text run existed; append after any leading properties.
            let at = new_children
                .iter()
                .position(|node| !node.as_element().is_some_and(|el| el.is("w:pPr")))
                .unwrap_or(new_children.len());
            for (offset, run) in runs.iter().enumerate() {
                new_children.insert(at + offset, XmlNode::Element(write_run(run)));
            }
        }
        paragraph.children = new_children;
        Ok(())
    }

    fn collect_part_regions(&self, part: usize, base_kind: RegionKind) -> PartRegions {
        let mut regions = PartRegions::default();
        let Some(tree) = self.part(part) else {
            return regions;
        };
        let mut path = Vec::new();
        walk_nodes(
            &tree.nodes,
            &mut path,
            false,
            false,
            part,
            base_kind,
            &mut regions,
        );
        regions
    }

    /// Header and footer parts in section order: resolved through the
    /// document relationships and each `w:sectPr`'s references, headers
    /// before footers, default/first/even variants in that order. Parts
    /// that no section references are appended in entry-name order so
    /// every text-bearing part is still visited.
    fn section_part_order(&self) -> Vec<usize> {
        let relationships = self.document_relationships();
        let mut order = Vec::new();
        let mut seen = HashSet::new();

        if let Some(tree) = self.part_index(DOCUMENT_PART).and_then(|idx| self.part(idx)) {
            let mut section_refs = Vec::new();
            collect_section_references(&tree.nodes, &mut section_refs);
            for reference in section_refs {
                let Some(target) = relationships.get(&reference.rel_id) else {
                    continue;
                };
                let name = format!("word/{}", target.trim_start_matches('/'));
                if let Some(index) = self.part_index(&name) {
                    if seen.insert(index) {
                        order.push(index);
                    }
                }
            }
        }

        for index in self.header_footer_indexes() {
            if seen.insert(index) {
                order.push(index);
            }
        }
        order
    }
}

/// One `w:headerReference` / `w:footerReference` of a section.
#[derive(Debug)]
struct SectionReference {
    rel_id: String,
}

/// Gather header/footer references in section order. Within one
/// `w:sectPr`, headers come before footers and variants follow the
/// default/first/even order regardless of how Word interleaved them.
fn collect_section_references(nodes: &[XmlNode], out: &mut Vec<SectionReference>) {
    for node in nodes {
        let Some(el) = node.as_element() else { continue };
        if el.is("w:sectPr") {
            let mut refs: Vec<(u8, u8, String)> = el
                .child_elements()
                .filter_map(|child| {
                    let is_header = child.is("w:headerReference");
                    if !is_header && !child.is("w:footerReference") {
                        return None;
                    }
                    let rel_id = child.attr("r:id")?;
                    let variant = match child.attr("w:type").as_deref() {
                        Some("first") => 1,
                        Some("even") => 2,
                        _ => 0,
                    };
                    Some((u8::from(!is_header), variant, rel_id))
                })
                .collect();
            refs.sort();
            out.extend(refs.into_iter().map(|(_, _, rel_id)| SectionReference { rel_id }));
        } else {
            collect_section_references(&el.children, out);
        }
    }
}

fn walk_nodes(
    nodes: &[XmlNode],
    path: &mut Vec<usize>,
    in_cell: bool,
    in_box: bool,
    part: usize,
    base_kind: RegionKind,
    out: &mut PartRegions,
) {
    for (index, node) in nodes.iter().enumerate() {
        let Some(el) = node.as_element() else { continue };
        path.push(index);
        if el.is("w:p") {
            let region = RegionRef {
                part,
                path: path.clone(),
                kind: if in_box {
                    RegionKind::TextBox
                } else if in_cell {
                    RegionKind::TableCell
                } else {
                    base_kind
                },
            };
            match region.kind {
                RegionKind::TextBox => out.boxes.push(region),
                RegionKind::TableCell => out.cells.push(region),
                _ => out.plain.push(region),
            }
            // Text boxes anchor inside paragraph runs; keep descending.
            walk_nodes(&el.children, path, in_cell, in_box, part, base_kind, out);
        } else {
            let next_cell = in_cell || el.is("w:tc");
            let next_box = in_box || el.is("w:txbxContent");
            walk_nodes(&el.children, path, next_cell, next_box, part, base_kind, out);
        }
        path.pop();
    }
}

/// A text run carries `w:t` directly and anchors no object.
fn is_text_run(el: &XmlElement) -> bool {
    if !el.is("w:r") {
        return false;
    }
    let anchors_object = el.child_elements().any(|child| {
        matches!(
            child.name.as_str(),
            "w:drawing" | "w:pict" | "w:object" | "mc:AlternateContent"
        )
    });
    !anchors_object && el.child_elements().any(|child| child.is("w:t"))
}

fn run_text(el: &XmlElement) -> String {
    let mut text = String::new();
    for child in el.child_elements() {
        match child.name.as_str() {
            "w:t" => text.push_str(&child.text()),
            "w:tab" => text.push('\t'),
            "w:br" | "w:cr" => text.push('\n'),
            _ => {}
        }
    }
    text
}

/// `w:val` explicitly "0" or "false" means the toggle is off.
fn toggle_on(el: &XmlElement) -> bool {
    !matches!(el.attr("w:val").as_deref(), Some("0" | "false"))
}

fn parse_run_format(rpr: Option<&XmlElement>) -> RunFormat {
    let mut format = RunFormat::default();
    let Some(rpr) = rpr else { return format };
    for child in rpr.child_elements() {
        match child.name.as_str() {
            "w:rFonts" => {
                format.font = child
                    .attr("w:ascii")
                    .or_else(|| child.attr("w:hAnsi"))
                    .or_else(|| child.attr("w:eastAsia"));
            }
            "w:sz" => format.size = child.attr("w:val").and_then(|v| v.parse().ok()),
            "w:b" => format.bold = toggle_on(child),
            "w:i" => format.italic = toggle_on(child),
            "w:u" => format.underline = child.attr("w:val").as_deref() != Some("none"),
            "w:color" => format.color = child.attr("w:val"),
            _ => {}
        }
    }
    format
}

/// Build the `w:rPr` subtree for a run that has no verbatim one.
/// Children follow the schema order: rFonts, b, i, color, sz, szCs, u.
fn build_rpr(format: &RunFormat) -> Option<XmlElement> {
    if *format == RunFormat::default() {
        return None;
    }
    let mut rpr = XmlElement::new("w:rPr");
    if let Some(font) = &format.font {
        rpr.children.push(XmlNode::Element(
            XmlElement::new("w:rFonts")
                .with_attr("w:ascii", font)
                .with_attr("w:hAnsi", font),
        ));
    }
    if format.bold {
        rpr.children.push(XmlNode::Element(XmlElement::new("w:b")));
    }
    if format.italic {
        rpr.children.push(XmlNode::Element(XmlElement::new("w:i")));
    }
    if let Some(color) = &format.color {
        rpr.children.push(XmlNode::Element(
            XmlElement::new("w:color").with_attr("w:val", color),
        ));
    }
    if let Some(size) = format.size {
        let val = size.to_string();
        rpr.children.push(XmlNode::Element(
            XmlElement::new("w:sz").with_attr("w:val", &val),
        ));
        rpr.children.push(XmlNode::Element(
            XmlElement::new("w:szCs").with_attr("w:val", &val),
        ));
    }
    if format.underline {
        rpr.children.push(XmlNode::Element(
            XmlElement::new("w:u").with_attr("w:val", "single"),
        ));
    }
    Some(rpr)
}

/// Serialize a run back to `w:r` markup. Tabs and newlines in the text
/// become `w:tab` / `w:br` elements again.
fn write_run(run: &Run) -> XmlElement {
    let mut element = XmlElement::new("w:r");
    if let Some(rpr) = run.rpr.clone().or_else(|| build_rpr(&run.format)) {
        element.children.push(XmlNode::Element(rpr));
    }

    let mut piece = String::new();
    let mut flush = |element: &mut XmlElement, piece: &mut String| {
        if piece.is_empty() {
            return;
        }
        let mut t = XmlElement::new("w:t");
        if piece.starts_with(char::is_whitespace) || piece.ends_with(char::is_whitespace) {
            t.set_attr("xml:space", "preserve");
        }
        t.children.push(XmlNode::Text(std::mem::take(piece)));
        element.children.push(XmlNode::Element(t));
    };

    for c in run.text.chars() {
        match c {
            '\t' => {
                flush(&mut element, &mut piece);
                element
                    .children
                    .push(XmlNode::Element(XmlElement::new("w:tab")));
            }
            '\n' => {
                flush(&mut element, &mut piece);
                element
                    .children
                    .push(XmlNode::Element(XmlElement::new("w:br")));
            }
            other => piece.push(other),
        }
    }
    flush(&mut element, &mut piece);
    element
}
