use crate::core::error::GenerateError;

/// Title used when the user leaves the title blank.
pub const DEFAULT_TITLE: &str = "My Storybook";

/// Wire sentinel the backend puts in `image_filename` when generation
/// failed for that page. Distinct from a transport-level load failure.
pub const ERROR_SENTINEL: &str = "error";

#[derive(Debug, Clone)]
pub struct StoryInput {
    pub title: Option<String>,
    pub text: String,
}

impl StoryInput {
    pub fn new(title: Option<String>, text: String) -> Self {
        Self { title, text }
    }

    pub fn title_or_default(&self) -> &str {
        match self.title.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() => t,
            _ => DEFAULT_TITLE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// 1-based position in the book.
    pub number: u32,
    pub text: String,
}

/// Split story text on blank-line boundaries into trimmed, non-empty
/// pages numbered 1..N. Leading/trailing blank lines do not change the count.
pub fn split_pages(text: &str, max_pages: usize) -> Result<Vec<Page>, GenerateError> {
    let normalized = text.replace("\r\n", "\n");

    let pages: Vec<Page> = normalized
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .enumerate()
        .map(|(i, p)| Page {
            number: (i + 1) as u32,
            text: p.to_string(),
        })
        .collect();

    if pages.is_empty() {
        return Err(GenerateError::Validation(
            "Please write a story first, separated into pages using blank lines.".to_string(),
        ));
    }

    if pages.len() > max_pages {
        return Err(GenerateError::Validation(format!(
            "Your story has {} pages. Maximum is {} pages. Try making your paragraphs longer!",
            pages.len(),
            max_pages
        )));
    }

    Ok(pages)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStatus {
    Waiting,
    Generating,
    Complete,
    Error,
}

impl PageStatus {
    /// Single-character badge used in the progress strip.
    pub fn marker(&self) -> char {
        match self {
            PageStatus::Waiting => '.',
            PageStatus::Generating => '~',
            PageStatus::Complete => '#',
            PageStatus::Error => '!',
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PageStatus::Waiting => "waiting",
            PageStatus::Generating => "generating",
            PageStatus::Complete => "complete",
            PageStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PageStatus::Complete | PageStatus::Error)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageImage {
    /// Filename on the backend's static `/images/` path.
    Ready { filename: String },
    Failed { message: String },
}

impl PageImage {
    pub fn is_failed(&self) -> bool {
        matches!(self, PageImage::Failed { .. })
    }
}

#[derive(Debug, Clone)]
pub struct PageResult {
    pub number: u32,
    pub text: String,
    pub image: PageImage,
}

impl PageResult {
    pub fn failed(number: u32, text: String, message: impl Into<String>) -> Self {
        Self {
            number,
            text,
            image: PageImage::Failed {
                message: message.into(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct Storybook {
    pub title: String,
    pub pages: Vec<PageResult>,
    /// Backend-reported, in seconds.
    pub generation_time: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_basic() {
        let pages = split_pages("A.\n\nB.\n\nC.", 15).unwrap();
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0], Page { number: 1, text: "A.".to_string() });
        assert_eq!(pages[1], Page { number: 2, text: "B.".to_string() });
        assert_eq!(pages[2], Page { number: 3, text: "C.".to_string() });
    }

    #[test]
    fn test_split_trims_surrounding_blank_lines() {
        let plain = split_pages("A.\n\nB.", 15).unwrap();
        let padded = split_pages("\n\n\n\nA.\n\nB.\n\n\n", 15).unwrap();
        assert_eq!(plain.len(), padded.len());
        assert_eq!(padded[0].text, "A.");
        assert_eq!(padded[1].text, "B.");
    }

    #[test]
    fn test_split_collapses_extra_blank_lines() {
        let pages = split_pages("A.\n\n\n\nB.", 15).unwrap();
        assert_eq!(pages.len(), 2);
    }

    #[test]
    fn test_split_handles_crlf() {
        let pages = split_pages("A.\r\n\r\nB.", 15).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].text, "B.");
    }

    #[test]
    fn test_split_empty_story_is_validation_error() {
        let err = split_pages("", 15).unwrap_err();
        assert!(err.is_validation());

        let err = split_pages("\n\n  \n\n", 15).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_split_too_many_pages_is_validation_error() {
        let text = (0..16).map(|i| format!("Page {i}.")).collect::<Vec<_>>().join("\n\n");
        let err = split_pages(&text, 15).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("Maximum is 15 pages"));
    }

    #[test]
    fn test_page_numbers_are_contiguous_from_one() {
        let pages = split_pages("a\n\nb\n\nc\n\nd", 15).unwrap();
        for (i, page) in pages.iter().enumerate() {
            assert_eq!(page.number, (i + 1) as u32);
        }
    }

    #[test]
    fn test_title_or_default() {
        let blank = StoryInput::new(Some("   ".to_string()), "x".to_string());
        assert_eq!(blank.title_or_default(), DEFAULT_TITLE);

        let missing = StoryInput::new(None, "x".to_string());
        assert_eq!(missing.title_or_default(), DEFAULT_TITLE);

        let titled = StoryInput::new(Some(" The Mouse ".to_string()), "x".to_string());
        assert_eq!(titled.title_or_default(), "The Mouse");
    }
}
