//! Integration tests for the substitution engine against real (in-memory)
//! DOCX archives.

mod common;

use certmerge_core::{CertMergeError, Journal, ReplacementMap};
use certmerge_docx::{
    build_certificate, check_template_placeholders, default_builders, engine, DocxPackage,
    RegionKind,
};
use common::{build_docx, para, run, run_with_rpr, table, text_box};

fn map(entries: &[(&str, &str)]) -> ReplacementMap {
    let mut map = ReplacementMap::new();
    for (token, value) in entries {
        map.insert_if_absent(*token, *value);
    }
    map
}

/// Concatenated text of every region, in traversal order.
fn region_texts(package: &DocxPackage) -> Vec<(RegionKind, String)> {
    package
        .regions()
        .iter()
        .map(|region| {
            let text: String = package
                .runs(region)
                .iter()
                .map(|run| run.text.clone())
                .collect();
            (region.kind, text)
        })
        .collect()
}

#[test]
fn test_intact_marker_replaced_with_neighbors_unharmed() {
    let body = para(&run("<<Ho_va_ten>> - <<Don_vi>>"));
    let bytes = build_docx(&body, None, None);
    let mut package = DocxPackage::from_bytes(&bytes).expect("open");

    let outcome = engine::substitute(
        &mut package,
        &map(&[("<<Ho_va_ten>>", "An"), ("<<Don_vi>>", "B1")]),
        &Journal::disabled(),
    )
    .expect("substitute");

    assert_eq!(outcome.regions_replaced, 1);
    let reloaded = DocxPackage::from_bytes(&package.to_bytes().expect("bytes")).expect("reload");
    assert_eq!(region_texts(&reloaded)[0].1, "An - B1");
}

#[test]
fn test_marker_split_across_runs_matches_unsplit_case() {
    let split = para(&format!("{}{}", run("<<Ho"), run("_va_ten>>")));
    let unsplit = para(&run("<<Ho_va_ten>>"));
    let replacements = map(&[("<<Ho_va_ten>>", "Nguyễn Văn An")]);

    let mut results = Vec::new();
    for body in [split, unsplit] {
        let bytes = build_docx(&body, None, None);
        let mut package = DocxPackage::from_bytes(&bytes).expect("open");
        let outcome =
            engine::substitute(&mut package, &replacements, &Journal::disabled()).expect("run");
        assert_eq!(outcome.regions_replaced, 1);
        let reloaded =
            DocxPackage::from_bytes(&package.to_bytes().expect("bytes")).expect("reload");
        results.push(region_texts(&reloaded)[0].1.clone());
    }
    assert_eq!(results[0], "Nguyễn Văn An");
    assert_eq!(results[0], results[1]);
}

#[test]
fn test_untouched_region_keeps_its_runs() {
    let body = format!(
        "{}{}",
        para(&run("<<Ho_va_ten>>")),
        para(&format!(
            "{}{}",
            run_with_rpr("<w:b/>", "two "),
            run("runs stay")
        ))
    );
    let bytes = build_docx(&body, None, None);
    let mut package = DocxPackage::from_bytes(&bytes).expect("open");

    engine::substitute(
        &mut package,
        &map(&[("<<Ho_va_ten>>", "An")]),
        &Journal::disabled(),
    )
    .expect("substitute");

    let reloaded = DocxPackage::from_bytes(&package.to_bytes().expect("bytes")).expect("reload");
    let regions = reloaded.regions();
    let untouched = reloaded.runs(&regions[1]);
    assert_eq!(untouched.len(), 2);
    assert!(untouched[0].format.bold);
    assert_eq!(untouched[0].text, "two ");
}

#[test]
fn test_second_pass_is_a_no_op() {
    let body = para(&run("Chứng nhận <<Ho_va_ten>>"));
    let bytes = build_docx(&body, None, None);
    let replacements = map(&[("<<Ho_va_ten>>", "An")]);

    let mut package = DocxPackage::from_bytes(&bytes).expect("open");
    engine::substitute(&mut package, &replacements, &Journal::disabled()).expect("first pass");
    let after_first = package.to_bytes().expect("bytes");

    let mut again = DocxPackage::from_bytes(&after_first).expect("reload");
    let outcome =
        engine::substitute(&mut again, &replacements, &Journal::disabled()).expect("second pass");
    assert_eq!(outcome.regions_replaced, 0);
    assert_eq!(region_texts(&again)[0].1, "Chứng nhận An");
}

#[test]
fn test_unmapped_marker_survives_and_preflight_reports_it() {
    let body = format!(
        "{}{}",
        para(&run("<<Ho_va_ten>>")),
        para(&format!("{}{}", run("<<Kho"), run("ng_map>>")))
    );
    let bytes = build_docx(&body, None, None);
    let package = DocxPackage::from_bytes(&bytes).expect("open");

    // The pre-flight scan sees both, including the split one.
    let markers = check_template_placeholders(&package);
    assert!(markers.contains("<<Ho_va_ten>>"));
    assert!(markers.contains("<<Khong_map>>"));

    let mut package = package;
    engine::substitute(
        &mut package,
        &map(&[("<<Ho_va_ten>>", "An")]),
        &Journal::disabled(),
    )
    .expect("substitute");
    let reloaded = DocxPackage::from_bytes(&package.to_bytes().expect("bytes")).expect("reload");
    let texts = region_texts(&reloaded);
    assert_eq!(texts[1].1, "<<Khong_map>>");
}

#[test]
fn test_representative_formatting_survives_merge() {
    let body = para(&format!(
        "{}{}{}",
        run("  "),
        run_with_rpr("<w:b/><w:color w:val=\"C00000\"/>", "Tên: <<Ho_va_ten>>"),
        run_with_rpr("<w:i/>", " (trailing)")
    ));
    let bytes = build_docx(&body, None, None);
    let mut package = DocxPackage::from_bytes(&bytes).expect("open");

    engine::substitute(
        &mut package,
        &map(&[("<<Ho_va_ten>>", "An")]),
        &Journal::disabled(),
    )
    .expect("substitute");

    let reloaded = DocxPackage::from_bytes(&package.to_bytes().expect("bytes")).expect("reload");
    let regions = reloaded.regions();
    let runs = reloaded.runs(&regions[0]);
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].text, "  Tên: An (trailing)");
    assert!(runs[0].format.bold);
    assert_eq!(runs[0].format.color.as_deref(), Some("C00000"));
}

#[test]
fn test_regions_cover_all_kinds_in_order() {
    let body = format!(
        "{}{}{}",
        para(&run("body")),
        table(&[para(&run("cell")), table(&[para(&run("nested"))])]),
        text_box(&para(&run("boxed")))
    );
    let bytes = build_docx(&body, Some(&para(&run("head"))), Some(&para(&run("foot"))));
    let package = DocxPackage::from_bytes(&bytes).expect("open");

    let kinds: Vec<(RegionKind, String)> = region_texts(&package)
        .into_iter()
        .filter(|(_, text)| !text.is_empty())
        .collect();
    assert_eq!(
        kinds,
        vec![
            (RegionKind::Body, "body".to_string()),
            (RegionKind::TableCell, "cell".to_string()),
            (RegionKind::TableCell, "nested".to_string()),
            (RegionKind::Header, "head".to_string()),
            (RegionKind::Footer, "foot".to_string()),
            (RegionKind::TextBox, "boxed".to_string()),
        ]
    );
}

#[test]
fn test_substitution_reaches_every_region_kind() {
    let body = format!(
        "{}{}{}",
        para(&run("<<Ho_va_ten>>")),
        table(&[para(&run("đơn vị <<Don_vi>>"))]),
        text_box(&para(&run("<<Phap_danh>>")))
    );
    let bytes = build_docx(
        &body,
        Some(&para(&run("<<Do>>"))),
        Some(&para(&run("<<Tai>>"))),
    );
    let mut package = DocxPackage::from_bytes(&bytes).expect("open");

    let outcome = engine::substitute(
        &mut package,
        &map(&[
            ("<<Ho_va_ten>>", "An"),
            ("<<Don_vi>>", "B1"),
            ("<<Phap_danh>>", "Quảng Minh"),
            ("<<Do>>", "Ban Hướng Dẫn"),
            ("<<Tai>>", "Đà Nẵng"),
        ]),
        &Journal::disabled(),
    )
    .expect("substitute");
    assert_eq!(outcome.regions_replaced, 5);

    let reloaded = DocxPackage::from_bytes(&package.to_bytes().expect("bytes")).expect("reload");
    let all_text: String = region_texts(&reloaded)
        .into_iter()
        .map(|(_, text)| text)
        .collect();
    assert!(!all_text.contains("<<"));
    assert!(all_text.contains("Quảng Minh"));
    assert!(all_text.contains("đơn vị B1"));
}

#[test]
fn test_engine_builder_end_to_end() {
    let body = format!(
        "{}{}",
        para(&run("Chứng nhận: <<Ho_va_ten>>")),
        table(&[para(&run("Năm sinh: <<Nam_sinh>>"))])
    );
    let bytes = build_docx(&body, None, None);

    let dir = tempfile::tempdir().expect("tempdir");
    let template = dir.path().join("template.docx");
    std::fs::write(&template, &bytes).expect("write template");
    let output = dir.path().join("out/001_An.docx");

    let builders = default_builders(false);
    let journal = Journal::disabled();
    let outcome = build_certificate(
        &builders,
        &template,
        &map(&[("<<Ho_va_ten>>", "An"), ("<<Nam_sinh>>", "2001")]),
        &output,
        &journal,
    )
    .expect("build");
    assert_eq!(outcome.engine, "engine");
    assert_eq!(outcome.regions_replaced, 2);

    let produced = DocxPackage::open(&output).expect("reopen output");
    let all_text: String = region_texts(&produced)
        .into_iter()
        .map(|(_, text)| text)
        .collect();
    assert!(all_text.contains("Chứng nhận: An"));
    assert!(all_text.contains("Năm sinh: 2001"));
    assert!(!all_text.contains("<<"));
}

#[test]
fn test_zero_replacements_is_reported_as_such() {
    let body = para(&run("no markers here"));
    let bytes = build_docx(&body, None, None);

    let dir = tempfile::tempdir().expect("tempdir");
    let template = dir.path().join("template.docx");
    std::fs::write(&template, &bytes).expect("write template");

    // Only the engine strategy, so the zero-replacement error surfaces.
    let builders: Vec<Box<dyn certmerge_docx::CertificateBuilder>> =
        vec![Box::new(certmerge_docx::EngineBuilder)];
    let result = build_certificate(
        &builders,
        &template,
        &map(&[("<<Ho_va_ten>>", "An")]),
        &dir.path().join("out.docx"),
        &Journal::disabled(),
    );
    assert!(matches!(result, Err(CertMergeError::NoReplacements)));
}
