// Copyright 2025 Wissen Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use quick_xml::escape::unescape;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::Read;
use tracing::debug;

/// Extensions the file-share collector picks up. Formats without a
/// converter are still listed with their metadata but contribute no
/// text and are never indexed.
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "txt", "md", "csv", "rtf", "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "odt", "ods",
    "odp",
];

pub fn is_allowed(extension: &str) -> bool {
    ALLOWED_EXTENSIONS.contains(&extension)
}

/// Extensions with a working converter; the rest of the allow-list is
/// listed with metadata only.
pub fn has_strategy(extension: &str) -> bool {
    matches!(
        extension,
        "txt" | "md" | "csv" | "rtf" | "pdf" | "docx" | "xlsx" | "pptx"
    )
}

/// Extract plain text from file bytes, dispatched on the lowercased
/// extension. `None` means no converter is available or extraction
/// failed; callers log and move on.
pub fn extract(extension: &str, bytes: &[u8]) -> Option<String> {
    let text = match extension {
        "txt" | "md" | "csv" | "rtf" => extract_plain(bytes),
        "pdf" => extract_pdf(bytes),
        "docx" => extract_ooxml(bytes, &["word/document.xml"], b"t", Some(b"p")),
        "xlsx" => extract_ooxml(bytes, &["xl/sharedStrings.xml"], b"t", None),
        "pptx" => extract_pptx(bytes),
        // Legacy binary formats have no converter here.
        _ => None,
    }?;

    let text = text.trim().to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// UTF-8 with a latin-1 fallback for legacy share content.
fn extract_plain(bytes: &[u8]) -> Option<String> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Some(text.to_string()),
        Err(_) => Some(bytes.iter().map(|&b| b as char).collect()),
    }
}

fn extract_pdf(bytes: &[u8]) -> Option<String> {
    match pdf_extract::extract_text_from_mem(bytes) {
        Ok(text) => Some(text),
        Err(e) => {
            debug!("pdf extraction failed: {}", e);
            None
        }
    }
}

/// Pull text runs out of OOXML archive entries. `text_tag` is the
/// local name of the text element (`w:t`, `a:t`, or plain `t`),
/// `para_tag` the element whose end marks a paragraph break.
fn extract_ooxml(
    bytes: &[u8],
    entries: &[&str],
    text_tag: &[u8],
    para_tag: Option<&[u8]>,
) -> Option<String> {
    let cursor = std::io::Cursor::new(bytes);
    let mut archive = match zip::ZipArchive::new(cursor) {
        Ok(archive) => archive,
        Err(e) => {
            debug!("not a readable OOXML archive: {}", e);
            return None;
        }
    };

    let mut out = String::new();
    for entry in entries {
        let mut xml = String::new();
        match archive.by_name(entry) {
            Ok(mut file) => {
                if file.read_to_string(&mut xml).is_err() {
                    continue;
                }
            }
            Err(_) => continue,
        }
        collect_text_runs(&xml, text_tag, para_tag, &mut out);
    }

    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

fn extract_pptx(bytes: &[u8]) -> Option<String> {
    let cursor = std::io::Cursor::new(bytes);
    let mut archive = match zip::ZipArchive::new(cursor) {
        Ok(archive) => archive,
        Err(e) => {
            debug!("not a readable OOXML archive: {}", e);
            return None;
        }
    };

    let mut slides: Vec<String> = archive
        .file_names()
        .filter(|name| name.starts_with("ppt/slides/slide") && name.ends_with(".xml"))
        .map(|name| name.to_string())
        .collect();
    slides.sort();

    let mut out = String::new();
    for slide in slides {
        let mut xml = String::new();
        match archive.by_name(&slide) {
            Ok(mut file) => {
                if file.read_to_string(&mut xml).is_err() {
                    continue;
                }
            }
            Err(_) => continue,
        }
        collect_text_runs(&xml, b"t", Some(b"p"), &mut out);
        out.push('\n');
    }

    if out.trim().is_empty() {
        None
    } else {
        Some(out)
    }
}

fn collect_text_runs(xml: &str, text_tag: &[u8], para_tag: Option<&[u8]>, out: &mut String) {
    let mut reader = Reader::from_str(xml);
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == text_tag => {
                in_text = true;
            }
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == text_tag {
                    in_text = false;
                    // Shared-strings cells carry no paragraph markers.
                    if para_tag.is_none() {
                        out.push('\n');
                    }
                } else if para_tag == Some(e.local_name().as_ref()) {
                    out.push('\n');
                }
            }
            Ok(Event::Text(t)) if in_text => {
                if let Ok(decoded) = t.xml_content() {
                    if let Ok(text) = unescape(&decoded) {
                        out.push_str(&text);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                debug!("xml parse stopped early: {}", e);
                break;
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn ooxml_fixture(entry: &str, xml: &str) -> Vec<u8> {
        let mut buffer = std::io::Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buffer);
            let options = zip::write::SimpleFileOptions::default();
            writer.start_file(entry, options).unwrap();
            writer.write_all(xml.as_bytes()).unwrap();
            writer.finish().unwrap();
        }
        buffer.into_inner()
    }

    #[test]
    fn test_plain_text_utf8() {
        let text = extract("txt", "Anleitung für Laborgeräte".as_bytes()).unwrap();
        assert_eq!(text, "Anleitung für Laborgeräte");
    }

    #[test]
    fn test_plain_text_latin1_fallback() {
        // "Gerät" in latin-1; invalid as UTF-8.
        let bytes = [0x47, 0x65, 0x72, 0xE4, 0x74];
        let text = extract("txt", &bytes).unwrap();
        assert_eq!(text, "Gerät");
    }

    #[test]
    fn test_docx_text_runs() {
        let xml = r#"<?xml version="1.0"?>
            <w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
              <w:body>
                <w:p><w:r><w:t>Forschungsprojekt 2024</w:t></w:r></w:p>
                <w:p><w:r><w:t>Automatisierung in der Produktion</w:t></w:r></w:p>
              </w:body>
            </w:document>"#;
        let bytes = ooxml_fixture("word/document.xml", xml);
        let text = extract("docx", &bytes).unwrap();
        assert!(text.contains("Forschungsprojekt 2024"));
        assert!(text.contains("Automatisierung in der Produktion"));
        // Paragraphs end up on separate lines.
        assert!(text.lines().count() >= 2);
    }

    #[test]
    fn test_xlsx_shared_strings() {
        let xml = r#"<?xml version="1.0"?>
            <sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
              <si><t>Messgerät</t></si>
              <si><t>Kalibrierung</t></si>
            </sst>"#;
        let bytes = ooxml_fixture("xl/sharedStrings.xml", xml);
        let text = extract("xlsx", &bytes).unwrap();
        assert!(text.contains("Messgerät"));
        assert!(text.contains("Kalibrierung"));
    }

    #[test]
    fn test_pptx_slides() {
        let xml = r#"<?xml version="1.0"?>
            <p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"
                   xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main">
              <a:p><a:r><a:t>Lehrstuhl Überblick</a:t></a:r></a:p>
            </p:sld>"#;
        let bytes = ooxml_fixture("ppt/slides/slide1.xml", xml);
        let text = extract("pptx", &bytes).unwrap();
        assert!(text.contains("Lehrstuhl Überblick"));
    }

    #[test]
    fn test_legacy_formats_yield_nothing() {
        assert!(extract("doc", b"binary blob").is_none());
        assert!(extract("xls", b"binary blob").is_none());
        assert!(extract("odt", b"binary blob").is_none());
    }

    #[test]
    fn test_corrupt_archive_yields_nothing() {
        assert!(extract("docx", b"not a zip archive").is_none());
    }

    #[test]
    fn test_whitespace_only_yields_nothing() {
        assert!(extract("txt", b"   \n\t  ").is_none());
    }

    #[test]
    fn test_allow_list() {
        assert!(is_allowed("pdf"));
        assert!(is_allowed("docx"));
        assert!(!is_allowed("exe"));
        assert!(!is_allowed("jpg"));
    }
}
