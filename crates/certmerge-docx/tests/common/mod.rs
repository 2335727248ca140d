//! In-memory DOCX fixtures for integration tests.
//!
//! Word documents are ZIP archives; these helpers assemble the minimal set
//! of parts (content types, package relationships, document, optional
//! header/footer) around caller-provided body XML.

use std::io::{Cursor, Write};

use zip::write::FileOptions;
use zip::ZipWriter;

/// Escape text for embedding inside a `w:t` element.
pub fn esc(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// A plain run.
pub fn run(text: &str) -> String {
    format!("<w:r><w:t>{}</w:t></w:r>", esc(text))
}

/// A run with explicit run properties XML.
pub fn run_with_rpr(rpr: &str, text: &str) -> String {
    format!("<w:r><w:rPr>{rpr}</w:rPr><w:t>{}</w:t></w:r>", esc(text))
}

/// A paragraph from raw run XML.
pub fn para(runs: &str) -> String {
    format!("<w:p>{runs}</w:p>")
}

/// A one-row table; each entry becomes one cell holding one paragraph.
pub fn table(cells: &[String]) -> String {
    let cells: String = cells
        .iter()
        .map(|content| format!("<w:tc><w:tcPr/>{content}</w:tc>"))
        .collect();
    format!("<w:tbl><w:tblPr/><w:tr>{cells}</w:tr></w:tbl>")
}

/// A body paragraph holding one floating text box with the given inner
/// paragraph XML.
pub fn text_box(inner: &str) -> String {
    format!(
        "<w:p><w:r><mc:AlternateContent><mc:Choice Requires=\"wps\"><w:drawing>\
         <wp:anchor><a:graphic><wps:wsp><wps:txbx><w:txbxContent>{inner}\
         </w:txbxContent></wps:txbx></wps:wsp></a:graphic></wp:anchor>\
         </w:drawing></mc:Choice></mc:AlternateContent></w:r></w:p>"
    )
}

const DOCUMENT_NAMESPACES: &str = "xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\" \
xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\" \
xmlns:mc=\"http://schemas.openxmlformats.org/markup-compatibility/2006\" \
xmlns:wp=\"http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing\" \
xmlns:wps=\"http://schemas.microsoft.com/office/word/2010/wordprocessingShape\" \
xmlns:a=\"http://schemas.openxmlformats.org/drawingml/2006/main\"";

/// Assemble a complete `.docx` archive.
///
/// `body` is the body XML without the closing `sectPr`; header and footer
/// parts are wired through the document relationships when present.
pub fn build_docx(body: &str, header: Option<&str>, footer: Option<&str>) -> Vec<u8> {
    let mut references = String::new();
    let mut relationships = String::new();
    let mut overrides = String::new();

    if header.is_some() {
        references.push_str("<w:headerReference w:type=\"default\" r:id=\"rId10\"/>");
        relationships.push_str(
            "<Relationship Id=\"rId10\" \
             Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/header\" \
             Target=\"header1.xml\"/>",
        );
        overrides.push_str(
            "<Override PartName=\"/word/header1.xml\" \
             ContentType=\"application/vnd.openxmlformats-officedocument.wordprocessingml.header+xml\"/>",
        );
    }
    if footer.is_some() {
        references.push_str("<w:footerReference w:type=\"default\" r:id=\"rId11\"/>");
        relationships.push_str(
            "<Relationship Id=\"rId11\" \
             Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/footer\" \
             Target=\"footer1.xml\"/>",
        );
        overrides.push_str(
            "<Override PartName=\"/word/footer1.xml\" \
             ContentType=\"application/vnd.openxmlformats-officedocument.wordprocessingml.footer+xml\"/>",
        );
    }

    let document = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
         <w:document {DOCUMENT_NAMESPACES}><w:body>{body}<w:sectPr>{references}</w:sectPr></w:body></w:document>"
    );
    let content_types = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
         <Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
         <Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
         <Default Extension=\"xml\" ContentType=\"application/xml\"/>\
         <Override PartName=\"/word/document.xml\" \
         ContentType=\"application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml\"/>\
         {overrides}</Types>"
    );
    let package_rels = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
         <Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
         <Relationship Id=\"rId1\" \
         Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument\" \
         Target=\"word/document.xml\"/></Relationships>";
    let document_rels = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
         <Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
         {relationships}</Relationships>"
    );

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options: FileOptions<()> = FileOptions::default();
    let mut add = |name: &str, data: &str| {
        writer.start_file(name, options).expect("zip entry");
        writer.write_all(data.as_bytes()).expect("zip write");
    };

    add("[Content_Types].xml", &content_types);
    add("_rels/.rels", package_rels);
    add("word/document.xml", &document);
    add("word/_rels/document.xml.rels", &document_rels);
    if let Some(header) = header {
        add(
            "word/header1.xml",
            &format!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
                 <w:hdr {DOCUMENT_NAMESPACES}>{header}</w:hdr>"
            ),
        );
    }
    if let Some(footer) = footer {
        add(
            "word/footer1.xml",
            &format!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
                 <w:ftr {DOCUMENT_NAMESPACES}>{footer}</w:ftr>"
            ),
        );
    }

    writer.finish().expect("zip finish").into_inner()
}
