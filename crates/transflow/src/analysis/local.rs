//! In-process analyzer that extracts text from the upload itself.

use std::io::{Cursor, Read, Seek};

use async_trait::async_trait;
use lopdf::Object;
use quick_xml::events::Event;
use quick_xml::Reader;

use super::text::{count_chars, count_html_images, count_words, strip_html};
use super::{DocumentAnalysis, DocumentAnalyzer, FileFormat, UploadedFile};
use crate::error::AnalysisError;

/// Language tag reported when no detection is performed.
pub const UNDETERMINED_LANGUAGE: &str = "und";
const DEFAULT_SUBJECT: &str = "general";

struct Extracted {
    text: String,
    images: u64,
}

/// Counts words, characters and embedded images without leaving the process.
///
/// Language and subject detection are not attempted; the analyzer reports the
/// configured defaults for both.
#[derive(Debug, Clone)]
pub struct LocalAnalyzer {
    source_language: String,
    subject_matter: String,
}

impl LocalAnalyzer {
    pub fn new() -> Self {
        Self {
            source_language: UNDETERMINED_LANGUAGE.to_string(),
            subject_matter: DEFAULT_SUBJECT.to_string(),
        }
    }

    pub fn with_source_language(mut self, language: impl Into<String>) -> Self {
        self.source_language = language.into();
        self
    }

    pub fn with_subject_matter(mut self, subject: impl Into<String>) -> Self {
        self.subject_matter = subject.into();
        self
    }

    /// Synchronous analysis, used from the blocking pool.
    pub fn analyze_bytes(
        &self,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<DocumentAnalysis, AnalysisError> {
        if bytes.is_empty() {
            return Err(AnalysisError::EmptyFile(file_name.to_string()));
        }

        let format = FileFormat::from_file_name(file_name);
        let extracted = extract(format, bytes)?;

        Ok(DocumentAnalysis {
            file_name: file_name.to_string(),
            file_format: format,
            file_size_bytes: bytes.len() as u64,
            word_count: count_words(&extracted.text),
            char_count: count_chars(&extracted.text),
            images_with_text: extracted.images,
            source_language: self.source_language.clone(),
            subject_matter: self.subject_matter.clone(),
        })
    }
}

impl Default for LocalAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentAnalyzer for LocalAnalyzer {
    async fn analyze(&self, file: &UploadedFile) -> Result<DocumentAnalysis, AnalysisError> {
        let analyzer = self.clone();
        let file_name = file.file_name.clone();
        let bytes = file.bytes.clone();

        tokio::task::spawn_blocking(move || analyzer.analyze_bytes(&file_name, &bytes))
            .await
            .map_err(|e| AnalysisError::Unreachable(format!("analysis task failed: {}", e)))?
    }
}

fn extract(format: FileFormat, bytes: &[u8]) -> Result<Extracted, AnalysisError> {
    match format {
        FileFormat::Txt => Ok(Extracted {
            text: String::from_utf8_lossy(bytes).into_owned(),
            images: 0,
        }),
        FileFormat::Html => {
            let html = String::from_utf8_lossy(bytes);
            Ok(Extracted {
                text: strip_html(&html),
                images: count_html_images(&html),
            })
        }
        FileFormat::Docx => extract_ooxml(
            bytes,
            format,
            |name| name == "word/document.xml",
            "word/media/",
        ),
        FileFormat::Pptx => extract_ooxml(
            bytes,
            format,
            |name| name.starts_with("ppt/slides/slide") && name.ends_with(".xml"),
            "ppt/media/",
        ),
        FileFormat::Xlsx => extract_ooxml(
            bytes,
            format,
            |name| name == "xl/sharedStrings.xml",
            "xl/media/",
        ),
        FileFormat::Pdf => extract_pdf(bytes),
        FileFormat::Unknown => {
            // Plain text under an unfamiliar extension is still countable.
            let text = std::str::from_utf8(bytes).map(str::to_string).unwrap_or_default();
            Ok(Extracted { text, images: 0 })
        }
    }
}

fn extraction_error(format: FileFormat, reason: impl std::fmt::Display) -> AnalysisError {
    AnalysisError::Extraction {
        format: format.to_string(),
        reason: reason.to_string(),
    }
}

fn extract_ooxml(
    bytes: &[u8],
    format: FileFormat,
    is_text_part: impl Fn(&str) -> bool,
    media_prefix: &str,
) -> Result<Extracted, AnalysisError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| extraction_error(format, format!("failed to open package: {}", e)))?;

    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();

    let images = names
        .iter()
        .filter(|name| name.starts_with(media_prefix))
        .count() as u64;

    let mut text = String::new();
    for name in names.iter().filter(|name| is_text_part(name)) {
        let xml = read_part(&mut archive, name)
            .map_err(|e| extraction_error(format, format!("failed to read {}: {}", name, e)))?;
        text.push_str(&parse_text_runs(&xml).map_err(|e| extraction_error(format, e))?);
        text.push('\n');
    }

    Ok(Extracted { text, images })
}

fn read_part<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    name: &str,
) -> Result<String, String> {
    let mut part = archive.by_name(name).map_err(|e| e.to_string())?;
    let mut content = String::new();
    part.read_to_string(&mut content).map_err(|e| e.to_string())?;
    Ok(content)
}

/// Collects the content of `<t>` runs (any namespace), breaking lines at
/// paragraph, shared-string and row boundaries.
fn parse_text_runs(xml: &str) -> Result<String, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut text = String::new();
    let mut in_text_element = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text_element = true;
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text_element = false,
                b"p" | b"si" | b"row" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if in_text_element {
                    text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("XML parsing error: {}", e)),
            _ => {}
        }
    }

    Ok(text)
}

fn extract_pdf(bytes: &[u8]) -> Result<Extracted, AnalysisError> {
    let doc = lopdf::Document::load_mem(bytes)
        .map_err(|e| extraction_error(FileFormat::Pdf, format!("failed to load PDF: {}", e)))?;

    let mut text = String::new();
    for (page_num, _) in doc.get_pages() {
        match doc.extract_text(&[page_num]) {
            Ok(page_text) => {
                text.push_str(&page_text);
                text.push('\n');
            }
            Err(e) => log::debug!("No text on PDF page {}: {}", page_num, e),
        }
    }

    let images = doc
        .objects
        .values()
        .filter(|object| match object {
            Object::Stream(stream) => stream
                .dict
                .get(b"Subtype")
                .and_then(|subtype| subtype.as_name())
                .map(|name| name == b"Image")
                .unwrap_or(false),
            _ => false,
        })
        .count() as u64;

    Ok(Extracted { text, images })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn zip_package(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buffer);
            let options = zip::write::SimpleFileOptions::default();
            for (name, content) in entries {
                writer.start_file(*name, options).unwrap();
                writer.write_all(content.as_bytes()).unwrap();
            }
            writer.finish().unwrap();
        }
        buffer.into_inner()
    }

    #[test]
    fn test_plain_text_counts() {
        let analysis = LocalAnalyzer::new()
            .analyze_bytes("notes.txt", b"Hello world\nsecond line")
            .unwrap();
        assert_eq!(analysis.file_format, FileFormat::Txt);
        assert_eq!(analysis.word_count, 4);
        assert_eq!(analysis.char_count, 20);
        assert_eq!(analysis.file_size_bytes, 23);
        assert_eq!(analysis.source_language, UNDETERMINED_LANGUAGE);
    }

    #[test]
    fn test_html_counts_text_and_images() {
        let html = concat!(
            "<html><body><h1>Title</h1><p>Some body text</p>",
            "<img src=\"a.png\"></body></html>"
        );
        let analysis = LocalAnalyzer::new()
            .analyze_bytes("page.html", html.as_bytes())
            .unwrap();
        assert_eq!(analysis.file_format, FileFormat::Html);
        assert_eq!(analysis.word_count, 4);
        assert_eq!(analysis.images_with_text, 1);
    }

    #[test]
    fn test_docx_text_and_media() {
        let document = r#"<?xml version="1.0"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>Hello</w:t></w:r><w:r><w:t xml:space="preserve"> world</w:t></w:r></w:p>
    <w:p><w:r><w:t>Second paragraph</w:t></w:r></w:p>
  </w:body>
</w:document>"#;
        let bytes = zip_package(&[
            ("word/document.xml", document),
            ("word/media/image1.png", "png"),
            ("word/media/image2.png", "png"),
        ]);

        let analysis = LocalAnalyzer::new().analyze_bytes("letter.docx", &bytes).unwrap();
        assert_eq!(analysis.file_format, FileFormat::Docx);
        assert_eq!(analysis.word_count, 4);
        assert_eq!(analysis.char_count, "Helloworld".len() as u64 + "Secondparagraph".len() as u64);
        assert_eq!(analysis.images_with_text, 2);
    }

    #[test]
    fn test_pptx_reads_every_slide() {
        let slide = |text: &str| {
            format!(
                concat!(
                    r#"<p:sld xmlns:p="p" xmlns:a="a"><p:cSld>"#,
                    r#"<a:p><a:r><a:t>{}</a:t></a:r></a:p></p:cSld></p:sld>"#
                ),
                text
            )
        };
        let one = slide("First slide");
        let two = slide("Second slide here");
        let bytes = zip_package(&[
            ("ppt/slides/slide1.xml", &one),
            ("ppt/slides/slide2.xml", &two),
            ("ppt/slides/_rels/slide1.xml.rels", "<Relationships/>"),
        ]);

        let analysis = LocalAnalyzer::new().analyze_bytes("deck.pptx", &bytes).unwrap();
        assert_eq!(analysis.word_count, 5);
    }

    #[test]
    fn test_xlsx_reads_shared_strings() {
        let strings = concat!(
            r#"<sst xmlns="x"><si><t>Quarterly</t></si>"#,
            r#"<si><t>Revenue report</t></si></sst>"#
        );
        let bytes = zip_package(&[
            ("xl/sharedStrings.xml", strings),
            ("xl/media/chart.png", "png"),
        ]);

        let analysis = LocalAnalyzer::new().analyze_bytes("book.xlsx", &bytes).unwrap();
        assert_eq!(analysis.word_count, 3);
        assert_eq!(analysis.images_with_text, 1);
    }

    #[test]
    fn test_corrupt_package_is_extraction_error() {
        let result = LocalAnalyzer::new().analyze_bytes("broken.docx", b"not a zip");
        assert!(matches!(result, Err(AnalysisError::Extraction { .. })));
    }

    #[test]
    fn test_unknown_extension_still_analyzed() {
        let analysis = LocalAnalyzer::new()
            .analyze_bytes("notes.markdown", b"# Heading\nbody")
            .unwrap();
        assert_eq!(analysis.file_format, FileFormat::Unknown);
        assert_eq!(analysis.word_count, 3);
    }

    #[test]
    fn test_unknown_binary_counts_nothing() {
        let analysis = LocalAnalyzer::new()
            .analyze_bytes("blob.bin", &[0xff, 0xfe, 0x00, 0x81])
            .unwrap();
        assert_eq!(analysis.word_count, 0);
        assert_eq!(analysis.char_count, 0);
    }

    #[test]
    fn test_empty_bytes_rejected() {
        let result = LocalAnalyzer::new().analyze_bytes("empty.txt", b"");
        assert!(matches!(result, Err(AnalysisError::EmptyFile(_))));
    }

    #[tokio::test]
    async fn test_async_analyze_uses_blocking_pool() {
        let analyzer = LocalAnalyzer::new().with_source_language("en");
        let analysis = analyzer
            .analyze(&UploadedFile::new("a.txt", b"one two three".to_vec()))
            .await
            .unwrap();
        assert_eq!(analysis.word_count, 3);
        assert_eq!(analysis.source_language, "en");
    }
}
