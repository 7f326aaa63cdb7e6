use crate::core::story::{PageImage, Storybook};
use crate::services::backend::{image_url, BackendClient};
use log::warn;
use std::path::{Path, PathBuf};
use url::Url;

#[derive(Debug, Clone, PartialEq)]
pub enum PageArtifact {
    /// Downloaded into the output folder; `url` is the cache-busted source.
    Saved { path: PathBuf, url: String },
    /// Generation succeeded but the image could not be fetched. Rendered
    /// as a visible indicator, never a silent gap.
    LoadFailed { message: String },
    /// Generation failed for this page.
    Placeholder { message: String },
}

#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub number: u32,
    pub text: String,
    pub artifact: PageArtifact,
}

/// Download ready images into `out_dir`, turn failed pages into
/// placeholders. Fetch failures are per-page render problems, not session
/// failures, so this never errors as a whole.
pub async fn materialize(
    book: &Storybook,
    backend: &dyn BackendClient,
    base: &Url,
    out_dir: &Path,
) -> Vec<RenderedPage> {
    let mut rendered = Vec::with_capacity(book.pages.len());

    for page in &book.pages {
        let artifact = match &page.image {
            PageImage::Failed { message } => PageArtifact::Placeholder {
                message: message.clone(),
            },
            PageImage::Ready { filename } => {
                let url = match image_url(base, filename) {
                    Ok(url) => url.to_string(),
                    Err(e) => {
                        warn!("bad image URL for page {}: {e}", page.number);
                        String::new()
                    }
                };
                match backend.fetch_image(filename).await {
                    Ok(bytes) => {
                        let path = out_dir.join(filename);
                        match tokio::fs::write(&path, &bytes).await {
                            Ok(()) => PageArtifact::Saved { path, url },
                            Err(e) => {
                                warn!("could not save image for page {}: {e}", page.number);
                                PageArtifact::LoadFailed {
                                    message: format!("Failed to load image: {e}"),
                                }
                            }
                        }
                    }
                    Err(e) => {
                        warn!("could not fetch image for page {}: {e}", page.number);
                        PageArtifact::LoadFailed {
                            message: format!("Failed to load image: {e}"),
                        }
                    }
                }
            }
        };

        rendered.push(RenderedPage {
            number: page.number,
            text: page.text.clone(),
            artifact,
        });
    }

    rendered
}

pub fn render_page(page: &RenderedPage, total: usize) -> String {
    let mut out = format!("--- Page {} of {} ---\n{}\n", page.number, total, page.text);
    match &page.artifact {
        PageArtifact::Saved { path, url } => {
            out.push_str(&format!("  [illustration: {} ({url})]\n", path.display()));
        }
        PageArtifact::LoadFailed { message } => {
            out.push_str(&format!("  ❌ {message}\n"));
        }
        PageArtifact::Placeholder { message } => {
            out.push_str(&format!("  ❌ {message}\n"));
        }
    }
    out
}

pub fn render_book(title: &str, pages: &[RenderedPage]) -> String {
    let mut out = format!("📖 {title}\n\n");
    for page in pages {
        out.push_str(&render_page(page, pages.len()));
        out.push('\n');
    }
    out
}

// Current page bracketed, failed pages marked with `!`.
pub fn thumbnail_strip(viewer: &Viewer, pages: &[RenderedPage]) -> String {
    pages
        .iter()
        .enumerate()
        .map(|(i, page)| {
            let mark = match &page.artifact {
                PageArtifact::Saved { .. } => format!("{}", page.number),
                _ => format!("{}!", page.number),
            };
            if i == viewer.current() {
                format!("[{mark}]")
            } else {
                format!(" {mark} ")
            }
        })
        .collect::<Vec<_>>()
        .join("")
}

/// Movement clamps at both ends and never lands on an out-of-range index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewer {
    index: usize,
    len: usize,
}

impl Viewer {
    pub fn new(len: usize) -> Self {
        Self { index: 0, len }
    }

    /// 0-based.
    pub fn current(&self) -> usize {
        self.index
    }

    pub fn at_start(&self) -> bool {
        self.index == 0
    }

    pub fn at_end(&self) -> bool {
        self.len == 0 || self.index == self.len - 1
    }

    pub fn next(&mut self) {
        if self.index + 1 < self.len {
            self.index += 1;
        }
    }

    pub fn previous(&mut self) {
        if self.index > 0 {
            self.index -= 1;
        }
    }

    /// 1-based page number; out-of-range targets are rejected.
    pub fn jump(&mut self, page_number: u32) -> bool {
        let number = page_number as usize;
        if number >= 1 && number <= self.len {
            self.index = number - 1;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::GenerateError;
    use crate::core::story::{PageImage, PageResult};
    use crate::services::backend::{PageImageDto, StorybookResponse};
    use async_trait::async_trait;

    #[test]
    fn test_previous_at_first_page_is_noop() {
        let mut viewer = Viewer::new(3);
        assert!(viewer.at_start());
        viewer.previous();
        assert_eq!(viewer.current(), 0);
    }

    #[test]
    fn test_next_at_last_page_is_noop() {
        let mut viewer = Viewer::new(3);
        viewer.next();
        viewer.next();
        assert!(viewer.at_end());
        viewer.next();
        assert_eq!(viewer.current(), 2);
    }

    #[test]
    fn test_jump_rejects_out_of_range() {
        let mut viewer = Viewer::new(3);
        assert!(!viewer.jump(0));
        assert!(!viewer.jump(4));
        assert_eq!(viewer.current(), 0);

        assert!(viewer.jump(2));
        assert_eq!(viewer.current(), 1);
    }

    #[test]
    fn test_empty_viewer_never_moves() {
        let mut viewer = Viewer::new(0);
        viewer.next();
        viewer.previous();
        assert_eq!(viewer.current(), 0);
        assert!(!viewer.jump(1));
    }

    #[test]
    fn test_placeholder_page_renders_message_not_image() {
        let page = RenderedPage {
            number: 2,
            text: "B.".to_string(),
            artifact: PageArtifact::Placeholder {
                message: "Image generation failed".to_string(),
            },
        };
        let out = render_page(&page, 3);
        assert!(out.contains("Image generation failed"));
        assert!(!out.contains("illustration:"));
    }

    #[test]
    fn test_thumbnail_strip_highlights_current_and_marks_failures() {
        let pages = vec![
            RenderedPage {
                number: 1,
                text: "A.".to_string(),
                artifact: PageArtifact::Saved {
                    path: PathBuf::from("output/page_1.png"),
                    url: String::new(),
                },
            },
            RenderedPage {
                number: 2,
                text: "B.".to_string(),
                artifact: PageArtifact::Placeholder {
                    message: "boom".to_string(),
                },
            },
        ];
        let mut viewer = Viewer::new(2);
        assert_eq!(thumbnail_strip(&viewer, &pages), "[1] 2! ");
        viewer.next();
        assert_eq!(thumbnail_strip(&viewer, &pages), " 1 [2!]");
    }

    /// Backend stub for materialize tests: serves bytes for one filename,
    /// errors for anything else.
    struct FixtureBackend {
        available: String,
    }

    #[async_trait]
    impl BackendClient for FixtureBackend {
        async fn health(&self) -> Result<(), GenerateError> {
            Ok(())
        }
        async fn generate_storybook(
            &self,
            _title: &str,
            _story_text: &str,
        ) -> Result<StorybookResponse, GenerateError> {
            Err(GenerateError::Network("not used".to_string()))
        }
        async fn generate_page(
            &self,
            _page_text: &str,
            _page_number: u32,
            _total_pages: u32,
        ) -> Result<PageImageDto, GenerateError> {
            Err(GenerateError::Network("not used".to_string()))
        }
        async fn image_exists(&self, filename: &str) -> bool {
            filename == self.available
        }
        async fn fetch_image(&self, filename: &str) -> Result<Vec<u8>, GenerateError> {
            if filename == self.available {
                Ok(b"png".to_vec())
            } else {
                Err(GenerateError::Network("connection refused".to_string()))
            }
        }
    }

    #[tokio::test]
    async fn test_materialize_saves_downloads_and_flags_load_failures() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FixtureBackend {
            available: "page_1.png".to_string(),
        };
        let base = Url::parse("http://localhost:8000").unwrap();

        let book = Storybook {
            title: "T".to_string(),
            pages: vec![
                PageResult {
                    number: 1,
                    text: "A.".to_string(),
                    image: PageImage::Ready {
                        filename: "page_1.png".to_string(),
                    },
                },
                PageResult {
                    number: 2,
                    text: "B.".to_string(),
                    image: PageImage::Ready {
                        filename: "page_2.png".to_string(),
                    },
                },
                PageResult::failed(3, "C.".to_string(), "sentinel"),
            ],
            generation_time: None,
        };

        let rendered = materialize(&book, &backend, &base, dir.path()).await;
        assert_eq!(rendered.len(), 3);

        match &rendered[0].artifact {
            PageArtifact::Saved { path, url } => {
                assert!(path.exists());
                assert!(url.contains("page_1.png?t="));
            }
            other => panic!("expected saved artifact, got {other:?}"),
        }
        assert!(matches!(rendered[1].artifact, PageArtifact::LoadFailed { .. }));
        assert!(matches!(rendered[2].artifact, PageArtifact::Placeholder { .. }));
    }
}
