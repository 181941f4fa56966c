use std::sync::Arc;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::services::RendererService;

/// Inbound file class, decided by the extension the chat platform reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Heic,
    Image,
}

/// One image handed to a vision provider.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub mime: String,
}

#[derive(Debug, Clone, Copy)]
pub struct PdfInfo {
    pub pages: usize,
    pub encrypted: bool,
}

/// A document normalized for extraction. The original bytes are always
/// what gets stored; `images` exists for the model only.
#[derive(Debug, Clone)]
pub struct NormalizedDocument {
    pub extension: String,
    pub content_type: String,
    pub original_bytes: Vec<u8>,
    pub images: Vec<ImagePayload>,
}

/// Policy verdict of the normalization step.
#[derive(Debug)]
pub enum Prepared {
    Ready(NormalizedDocument),
    /// Encrypted PDFs are refused outright.
    Encrypted,
    /// A PDF with no readable pages.
    NoPages,
    /// Page count over the processing limit.
    TooManyPages(usize),
}

pub fn classify_extension(file_path: &str) -> (FileKind, String) {
    let extension = file_path
        .rsplit('.')
        .next()
        .unwrap_or("")
        .to_lowercase();
    let kind = match extension.as_str() {
        "pdf" => FileKind::Pdf,
        "heic" | "heif" => FileKind::Heic,
        _ => FileKind::Image,
    };
    (kind, extension)
}

pub fn content_type_for(extension: &str) -> &'static str {
    match extension {
        "pdf" => "application/pdf",
        "heic" | "heif" => "image/heic",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "image/jpeg",
    }
}

/// PDF/HEIC normalizer. Page count and encryption are inspected locally
/// without decoding page contents; rasterization and HEIC conversion go
/// through the headless renderer.
pub struct MediaService {
    config: Arc<Config>,
    renderer: Arc<RendererService>,
}

impl MediaService {
    pub fn new(config: Arc<Config>, renderer: Arc<RendererService>) -> Self {
        Self { config, renderer }
    }

    pub fn inspect_pdf(&self, bytes: &[u8]) -> AppResult<PdfInfo> {
        let document = lopdf::Document::load_mem(bytes)
            .map_err(|e| AppError::ValidationError(format!("Unreadable PDF: {}", e)))?;
        Ok(PdfInfo {
            pages: document.get_pages().len(),
            encrypted: document.is_encrypted(),
        })
    }

    /// Normalize a downloaded original for extraction.
    pub async fn prepare(&self, file_path: &str, bytes: Vec<u8>) -> AppResult<Prepared> {
        let (kind, extension) = classify_extension(file_path);

        match kind {
            FileKind::Pdf => {
                let info = self.inspect_pdf(&bytes)?;
                if info.encrypted {
                    return Ok(Prepared::Encrypted);
                }
                if info.pages == 0 {
                    return Ok(Prepared::NoPages);
                }
                if info.pages > self.config.max_pdf_pages {
                    return Ok(Prepared::TooManyPages(info.pages));
                }
                let pages = self.renderer.rasterize_pdf(&bytes).await?;
                let images = pages
                    .into_iter()
                    .map(|page| ImagePayload {
                        bytes: page,
                        mime: "image/jpeg".to_string(),
                    })
                    .collect();
                Ok(Prepared::Ready(NormalizedDocument {
                    content_type: content_type_for(&extension).to_string(),
                    extension,
                    original_bytes: bytes,
                    images,
                }))
            }
            FileKind::Heic => {
                let jpeg = self.renderer.heic_to_jpeg(&bytes).await?;
                Ok(Prepared::Ready(NormalizedDocument {
                    content_type: content_type_for(&extension).to_string(),
                    extension,
                    original_bytes: bytes,
                    images: vec![ImagePayload {
                        bytes: jpeg,
                        mime: "image/jpeg".to_string(),
                    }],
                }))
            }
            FileKind::Image => {
                let mime = content_type_for(&extension).to_string();
                let image = ImagePayload {
                    bytes: bytes.clone(),
                    mime,
                };
                Ok(Prepared::Ready(NormalizedDocument {
                    content_type: content_type_for(&extension).to_string(),
                    extension,
                    original_bytes: bytes,
                    images: vec![image],
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Document, Object};

    #[test]
    fn extension_classification() {
        assert_eq!(classify_extension("documents/file_1.pdf").0, FileKind::Pdf);
        assert_eq!(classify_extension("photos/IMG_0001.HEIC").0, FileKind::Heic);
        assert_eq!(classify_extension("photos/pic.heif").0, FileKind::Heic);
        assert_eq!(classify_extension("photos/pic.jpg").0, FileKind::Image);
        assert_eq!(classify_extension("photos/pic.png").0, FileKind::Image);
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type_for("pdf"), "application/pdf");
        assert_eq!(content_type_for("heic"), "image/heic");
        assert_eq!(content_type_for("png"), "image/png");
        assert_eq!(content_type_for("jpg"), "image/jpeg");
        assert_eq!(content_type_for("bin"), "image/jpeg");
    }

    fn build_pdf(page_count: usize) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let kids: Vec<Object> = (0..page_count)
            .map(|_| {
                let page_id = doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                });
                page_id.into()
            })
            .collect();
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => page_count as i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    fn service() -> MediaService {
        let config = Arc::new(crate::services::tests::common::test_config());
        let renderer = Arc::new(RendererService::new(config.clone()));
        MediaService::new(config, renderer)
    }

    #[test]
    fn pdf_inspection_reports_page_count_and_no_encryption() {
        let service = service();
        let info = service.inspect_pdf(&build_pdf(3)).unwrap();
        assert_eq!(info.pages, 3);
        assert!(!info.encrypted);
    }

    #[test]
    fn garbage_bytes_are_not_a_pdf() {
        let service = service();
        assert!(service.inspect_pdf(b"not a pdf at all").is_err());
    }

    #[tokio::test]
    async fn oversized_pdf_is_a_policy_verdict_not_an_error() {
        let service = service();
        match service.prepare("doc/file.pdf", build_pdf(8)).await.unwrap() {
            Prepared::TooManyPages(pages) => assert_eq!(pages, 8),
            other => panic!("expected TooManyPages, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn plain_image_passes_through_untouched() {
        let service = service();
        let bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
        match service.prepare("photos/pic.jpg", bytes.clone()).await.unwrap() {
            Prepared::Ready(doc) => {
                assert_eq!(doc.original_bytes, bytes);
                assert_eq!(doc.images.len(), 1);
                assert_eq!(doc.images[0].mime, "image/jpeg");
                assert_eq!(doc.content_type, "image/jpeg");
            }
            other => panic!("expected Ready, got {:?}", other),
        }
    }
}
