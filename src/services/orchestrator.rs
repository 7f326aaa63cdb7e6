use crate::core::config::{Config, Mode};
use crate::core::error::GenerateError;
use crate::core::session::Session;
use crate::core::story::{split_pages, Page, PageResult, PageStatus, StoryInput, Storybook};
use crate::services::backend::{BackendClient, PageImageDto};
use crate::services::progress::ProgressSink;
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug, Clone)]
pub enum Strategy {
    /// Single request for the whole story; any failure fails the session.
    Batch,
    /// One request per page, strictly in order, one in flight. A page
    /// failure is recorded on that page and the run continues.
    PerPage { delay: Duration },
    /// Batch request, then confirm each page's output on the static image
    /// path at a fixed interval, up to the attempt ceiling.
    Polling {
        interval: Duration,
        max_attempts: u32,
    },
}

impl Strategy {
    pub fn from_config(config: &Config) -> Self {
        match config.mode {
            Mode::Batch => Strategy::Batch,
            Mode::PerPage => Strategy::PerPage {
                delay: config.page_delay(),
            },
            Mode::Polling => Strategy::Polling {
                interval: config.poll_interval(),
                max_attempts: config.poll_max_attempts,
            },
        }
    }
}

pub struct Orchestrator {
    backend: Arc<dyn BackendClient>,
    strategy: Strategy,
    session_timeout: Duration,
}

impl Orchestrator {
    pub fn new(backend: Arc<dyn BackendClient>, strategy: Strategy, session_timeout: Duration) -> Self {
        Self {
            backend,
            strategy,
            session_timeout,
        }
    }

    pub fn from_config(config: &Config, backend: Arc<dyn BackendClient>) -> Self {
        Self::new(backend, Strategy::from_config(config), config.session_timeout())
    }

    /// Validation failures return before any request is made.
    pub async fn generate(
        &self,
        input: &StoryInput,
        max_pages: usize,
        sink: &dyn ProgressSink,
    ) -> Result<Storybook, GenerateError> {
        let pages = split_pages(&input.text, max_pages)?;
        self.run(input, pages, sink).await
    }

    /// The whole run is bounded by the session timeout; expiry cancels
    /// in-flight requests, inter-page delays and polling. Partial results
    /// die with the session.
    pub async fn run(
        &self,
        input: &StoryInput,
        pages: Vec<Page>,
        sink: &dyn ProgressSink,
    ) -> Result<Storybook, GenerateError> {
        match tokio::time::timeout(self.session_timeout, self.run_inner(input, &pages, sink)).await
        {
            Ok(result) => result,
            Err(_) => Err(GenerateError::Timeout(format!(
                "no storybook after {} seconds; the backend may be overloaded",
                self.session_timeout.as_secs()
            ))),
        }
    }

    async fn run_inner(
        &self,
        input: &StoryInput,
        pages: &[Page],
        sink: &dyn ProgressSink,
    ) -> Result<Storybook, GenerateError> {
        let mut session = Session::new(pages.len());
        session.start();
        sink.update(&session.snapshot(), "Starting generation...");

        let outcome = match &self.strategy {
            Strategy::Batch => self.run_batch(input, pages, &mut session, sink).await,
            Strategy::PerPage { delay } => {
                self.run_per_page(input, pages, *delay, &mut session, sink).await
            }
            Strategy::Polling {
                interval,
                max_attempts,
            } => {
                self.run_polling(input, pages, *interval, *max_attempts, &mut session, sink)
                    .await
            }
        };

        match outcome {
            Ok(book) => {
                session.complete();
                info!(
                    "session complete: {} pages in {:.1}s",
                    book.pages.len(),
                    session.elapsed().as_secs_f64()
                );
                sink.update(&session.snapshot(), "Storybook ready!");
                Ok(book)
            }
            Err(e) => {
                session.fail();
                warn!("session failed: {e}");
                Err(e)
            }
        }
    }

    async fn run_batch(
        &self,
        input: &StoryInput,
        pages: &[Page],
        session: &mut Session,
        sink: &dyn ProgressSink,
    ) -> Result<Storybook, GenerateError> {
        let resp = self
            .backend
            .generate_storybook(input.title_or_default(), &input.text)
            .await?;

        let results = collect_batch_results(pages, resp.images);
        for result in &results {
            session.mark_page(result.number, page_status(result));
        }
        sink.update(&session.snapshot(), "All pages generated");

        Ok(Storybook {
            title: resp.story_title,
            pages: results,
            generation_time: resp.generation_time,
        })
    }

    async fn run_per_page(
        &self,
        input: &StoryInput,
        pages: &[Page],
        delay: Duration,
        session: &mut Session,
        sink: &dyn ProgressSink,
    ) -> Result<Storybook, GenerateError> {
        let total = pages.len() as u32;
        let mut results = Vec::with_capacity(pages.len());

        for (i, page) in pages.iter().enumerate() {
            session.mark_page(page.number, PageStatus::Generating);
            sink.update(
                &session.snapshot(),
                &format!("Illustrating page {} of {}...", page.number, total),
            );

            let result = match self
                .backend
                .generate_page(&page.text, page.number, total)
                .await
            {
                Ok(dto) => dto.into_result(),
                // A page failure is a result, not a session failure; the
                // remaining pages still get their turn.
                Err(e) => {
                    warn!("page {} failed: {e}", page.number);
                    PageResult::failed(page.number, page.text.clone(), e.to_string())
                }
            };

            session.mark_page(result.number, page_status(&result));
            sink.update(
                &session.snapshot(),
                &format!("Page {} {}", page.number, page_status(&result).label()),
            );
            results.push(result);

            if i + 1 < pages.len() && !delay.is_zero() {
                sleep(delay).await;
            }
        }

        Ok(Storybook {
            title: input.title_or_default().to_string(),
            pages: results,
            generation_time: None,
        })
    }

    async fn run_polling(
        &self,
        input: &StoryInput,
        pages: &[Page],
        interval: Duration,
        max_attempts: u32,
        session: &mut Session,
        sink: &dyn ProgressSink,
    ) -> Result<Storybook, GenerateError> {
        let resp = self
            .backend
            .generate_storybook(input.title_or_default(), &input.text)
            .await?;
        let results = collect_batch_results(pages, resp.images);

        // Pages the backend already marked failed are terminal; only pages
        // with a reported image need their file confirmed.
        let mut pending: Vec<(u32, String)> = Vec::new();
        for result in &results {
            match &result.image {
                crate::core::story::PageImage::Ready { filename } => {
                    pending.push((result.number, filename.clone()));
                }
                crate::core::story::PageImage::Failed { .. } => {
                    session.mark_page(result.number, PageStatus::Error);
                }
            }
        }

        let mut attempts = 0u32;
        while !pending.is_empty() && attempts < max_attempts {
            attempts += 1;

            let mut still_pending = Vec::with_capacity(pending.len());
            for (number, filename) in pending {
                if self.backend.image_exists(&filename).await {
                    // Idempotent: a page confirmed on an earlier tick stays
                    // complete.
                    session.mark_page(number, PageStatus::Complete);
                } else {
                    still_pending.push((number, filename));
                }
            }
            pending = still_pending;

            sink.update(
                &session.snapshot(),
                &format!(
                    "Waiting for images ({} of {} ready)...",
                    session.done_count(),
                    session.total_pages()
                ),
            );

            if !pending.is_empty() && !interval.is_zero() {
                sleep(interval).await;
            }
        }

        if !pending.is_empty() {
            return Err(GenerateError::Timeout(format!(
                "{} page(s) still had no image after {} checks",
                pending.len(),
                max_attempts
            )));
        }

        Ok(Storybook {
            title: resp.story_title,
            pages: results,
            generation_time: resp.generation_time,
        })
    }
}

fn page_status(result: &PageResult) -> PageStatus {
    if result.image.is_failed() {
        PageStatus::Error
    } else {
        PageStatus::Complete
    }
}

// A page the backend skipped gets an error placeholder rather than a gap.
fn collect_batch_results(pages: &[Page], mut dtos: Vec<PageImageDto>) -> Vec<PageResult> {
    pages
        .iter()
        .map(|page| {
            match dtos.iter().position(|d| d.page_number == page.number) {
                Some(i) => dtos.swap_remove(i).into_result(),
                None => PageResult::failed(
                    page.number,
                    page.text.clone(),
                    "No result returned for this page",
                ),
            }
        })
        .collect()
}
