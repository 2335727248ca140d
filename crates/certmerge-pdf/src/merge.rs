//! Combined-PDF concatenation.
//!
//! Loads every per-recipient PDF, renumbers object ids into one shared
//! space, rebuilds a single page tree in input order, and writes one
//! document. Callers pass inputs in filename-sorted order.

use std::collections::BTreeMap;
use std::path::Path;

use certmerge_core::{CertMergeError, Result};
use lopdf::{Document, Object, ObjectId};

/// Concatenate `inputs` into `output`. Returns the total page count.
pub fn merge_pdfs<P: AsRef<Path>>(inputs: &[P], output: &Path) -> Result<usize> {
    if inputs.is_empty() {
        return Err(CertMergeError::Merge("no documents to merge".to_string()));
    }

    let mut max_id = 1;
    let mut page_objects: BTreeMap<ObjectId, Object> = BTreeMap::new();
    let mut all_objects: BTreeMap<ObjectId, Object> = BTreeMap::new();

    for input in inputs {
        let input = input.as_ref();
        let mut doc = Document::load(input).map_err(|e| {
            CertMergeError::Merge(format!("failed to load {}: {e}", input.display()))
        })?;
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        for (_, object_id) in doc.get_pages() {
            if let Ok(object) = doc.get_object(object_id) {
                page_objects.insert(object_id, object.clone());
            }
        }
        all_objects.extend(doc.objects.clone());
    }

    if page_objects.is_empty() {
        return Err(CertMergeError::Merge("inputs contain no pages".to_string()));
    }

    // Rebuild one catalog and one page tree; everything else carries over.
    let mut merged = Document::with_version("1.5");
    let mut catalog = None;
    let mut pages_root = None;
    for (object_id, object) in &all_objects {
        match object.type_name().unwrap_or("") {
            "Catalog" => {
                if let Ok(dict) = object.as_dict() {
                    catalog = Some((*object_id, dict.clone()));
                }
            }
            "Pages" => {
                if let Ok(dict) = object.as_dict() {
                    if let Some((_, existing)) = &mut pages_root {
                        let mut combined = dict.clone();
                        combined.extend(existing);
                        *existing = combined;
                    } else {
                        pages_root = Some((*object_id, dict.clone()));
                    }
                }
            }
            // Pages are re-parented below; outlines are dropped.
            "Page" | "Outlines" | "Outline" => {}
            _ => {
                merged.objects.insert(*object_id, object.clone());
            }
        }
    }

    let (pages_id, mut pages_dict) = pages_root
        .ok_or_else(|| CertMergeError::Merge("no page tree root found".to_string()))?;
    let (catalog_id, mut catalog_dict) = catalog
        .ok_or_else(|| CertMergeError::Merge("no document catalog found".to_string()))?;

    for (object_id, object) in &page_objects {
        if let Ok(dict) = object.as_dict() {
            let mut page = dict.clone();
            page.set("Parent", pages_id);
            merged.objects.insert(*object_id, Object::Dictionary(page));
        }
    }

    pages_dict.set("Count", page_objects.len() as i64);
    pages_dict.set(
        "Kids",
        page_objects
            .keys()
            .map(|id| Object::Reference(*id))
            .collect::<Vec<_>>(),
    );
    merged
        .objects
        .insert(pages_id, Object::Dictionary(pages_dict));

    catalog_dict.set("Pages", pages_id);
    catalog_dict.remove(b"Outlines");
    merged
        .objects
        .insert(catalog_id, Object::Dictionary(catalog_dict));
    merged.trailer.set("Root", catalog_id);
    merged.max_id = max_id;
    merged.renumber_objects();
    merged.compress();

    merged
        .save(output)
        .map_err(|e| CertMergeError::Merge(format!("failed to save merged PDF: {e}")))?;
    log::info!(
        "merged {} documents ({} pages) into {}",
        inputs.len(),
        page_objects.len(),
        output.display()
    );
    Ok(page_objects.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Stream};

    /// Build a one-page PDF showing a single line of text.
    fn sample_pdf(path: &Path, text: &str) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![100.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("content"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).expect("save sample pdf");
    }

    #[test]
    fn test_merge_concatenates_pages_in_input_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let first = dir.path().join("001_An.pdf");
        let second = dir.path().join("002_Binh.pdf");
        sample_pdf(&first, "An");
        sample_pdf(&second, "Binh");

        let merged_path = dir.path().join("combined.pdf");
        let pages = merge_pdfs(&[first, second], &merged_path).expect("merge");
        assert_eq!(pages, 2);

        let merged = Document::load(&merged_path).expect("load merged");
        assert_eq!(merged.get_pages().len(), 2);
    }

    #[test]
    fn test_merge_single_input_copies_document() {
        let dir = tempfile::tempdir().expect("tempdir");
        let only = dir.path().join("only.pdf");
        sample_pdf(&only, "solo");

        let merged_path = dir.path().join("combined.pdf");
        let pages = merge_pdfs(&[only], &merged_path).expect("merge");
        assert_eq!(pages, 1);
        assert!(merged_path.is_file());
    }

    #[test]
    fn test_merge_rejects_empty_input() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = merge_pdfs::<&Path>(&[], &dir.path().join("combined.pdf"));
        assert!(matches!(result, Err(CertMergeError::Merge(_))));
    }
}
