use crate::error::DocumentLoadError;
use crate::models::{Document, PageText};
use lopdf::Document as PdfFile;
use std::path::Path;
use tracing::{debug, warn};

pub trait PdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, DocumentLoadError>;
}

#[derive(Default)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, DocumentLoadError> {
        if !path.exists() {
            return Err(DocumentLoadError::NotFound(path.to_path_buf()));
        }

        let bytes = std::fs::read(path)?;
        let document =
            PdfFile::load_mem(&bytes).map_err(|error| DocumentLoadError::PdfParse(error.to_string()))?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = match document.extract_text(&[page_no]) {
                Ok(text) => text,
                Err(error) => {
                    warn!(page = page_no, %error, "page text extraction failed, keeping empty page");
                    String::new()
                }
            };
            pages.push(PageText {
                number: page_no,
                text,
            });
        }

        if pages.iter().all(|page| page.text.trim().is_empty()) {
            return Err(DocumentLoadError::NoText(path.to_path_buf()));
        }

        debug!(path = %path.display(), pages = pages.len(), "pdf pages extracted");
        Ok(pages)
    }
}

pub fn load_document(path: &Path) -> Result<Document, DocumentLoadError> {
    load_document_with(&LopdfExtractor, path)
}

pub fn load_document_with<E: PdfExtractor>(
    extractor: &E,
    path: &Path,
) -> Result<Document, DocumentLoadError> {
    let pages = extractor.extract_pages(path)?;
    Ok(Document {
        source_path: path.to_path_buf(),
        pages,
    })
}
