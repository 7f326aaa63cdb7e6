use crate::core::error::GenerateError;
use crate::core::story::{PageImage, PageResult, ERROR_SENTINEL};
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::{SystemTime, UNIX_EPOCH};
use url::Url;

/// Whole-story response from `POST /generate-storybook`.
#[derive(Debug, Clone, Deserialize)]
pub struct StorybookResponse {
    pub story_title: String,
    pub total_pages: u32,
    #[serde(default)]
    pub generation_time: Option<f64>,
    pub images: Vec<PageImageDto>,
}

/// One page result as the backend reports it. Variants of the backend
/// disagree on whether the reference arrives as `image_filename` or
/// `image_path`, so both are tolerated.
#[derive(Debug, Clone, Deserialize)]
pub struct PageImageDto {
    pub page_number: u32,
    pub page_text: String,
    #[serde(default)]
    pub image_filename: Option<String>,
    #[serde(default)]
    pub image_path: Option<String>,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub error: Option<String>,
}

impl PageImageDto {
    pub fn reference(&self) -> Option<&str> {
        if let Some(name) = self.image_filename.as_deref() {
            return Some(name);
        }
        self.image_path
            .as_deref()
            .map(|p| p.rsplit('/').next().unwrap_or(p))
    }

    /// The `"error"` sentinel in the filename field means generation failed
    /// for this page; the reason travels in `image_path` or `error`.
    pub fn into_result(self) -> PageResult {
        let failed = self.success == Some(false)
            || self.error.is_some()
            || self.image_filename.as_deref() == Some(ERROR_SENTINEL);

        if failed {
            let message = self
                .error
                .clone()
                .or_else(|| {
                    if self.image_filename.as_deref() == Some(ERROR_SENTINEL) {
                        self.image_path.clone()
                    } else {
                        None
                    }
                })
                .unwrap_or_else(|| "Image generation failed".to_string());
            return PageResult::failed(self.page_number, self.page_text, message);
        }

        match self.reference() {
            Some(name) => {
                let filename = name.to_string();
                PageResult {
                    number: self.page_number,
                    text: self.page_text,
                    image: PageImage::Ready { filename },
                }
            }
            None => PageResult::failed(
                self.page_number,
                self.page_text,
                "No image reference returned",
            ),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<String>,
}

#[async_trait]
pub trait BackendClient: Send + Sync {
    async fn health(&self) -> Result<(), GenerateError>;

    async fn generate_storybook(
        &self,
        title: &str,
        story_text: &str,
    ) -> Result<StorybookResponse, GenerateError>;

    async fn generate_page(
        &self,
        page_text: &str,
        page_number: u32,
        total_pages: u32,
    ) -> Result<PageImageDto, GenerateError>;

    /// Absence during a run means "not generated yet", so failures here
    /// answer `false`, never an error.
    async fn image_exists(&self, filename: &str) -> bool;

    async fn fetch_image(&self, filename: &str) -> Result<Vec<u8>, GenerateError>;
}

/// Timestamp query parameter keeps a reused filename from being served
/// from cache across runs.
pub fn image_url(base: &Url, filename: &str) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(&format!(
        "{}/images/{}",
        base.as_str().trim_end_matches('/'),
        filename
    ))?;
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    url.query_pairs_mut().append_pair("t", &ts.to_string());
    Ok(url)
}

pub struct HttpBackend {
    base: Url,
    client: Client,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Result<Self> {
        let base = Url::parse(base_url)
            .with_context(|| format!("Invalid backend URL: {base_url}"))?;
        Ok(Self {
            base,
            client: Client::new(),
        })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base.as_str().trim_end_matches('/'), path)
    }

    async fn server_error(resp: reqwest::Response) -> GenerateError {
        let status = resp.status().as_u16();
        let detail = match resp.json::<ErrorBody>().await {
            Ok(body) => body.detail,
            Err(_) => None,
        };
        GenerateError::server(status, detail)
    }
}

fn network_error(e: reqwest::Error) -> GenerateError {
    GenerateError::Network(e.to_string())
}

#[async_trait]
impl BackendClient for HttpBackend {
    async fn health(&self) -> Result<(), GenerateError> {
        let resp = self
            .client
            .get(self.endpoint("health"))
            .send()
            .await
            .map_err(network_error)?;
        if !resp.status().is_success() {
            return Err(HttpBackend::server_error(resp).await);
        }
        Ok(())
    }

    async fn generate_storybook(
        &self,
        title: &str,
        story_text: &str,
    ) -> Result<StorybookResponse, GenerateError> {
        debug!("POST /generate-storybook title={title:?}");
        let resp = self
            .client
            .post(self.endpoint("generate-storybook"))
            .query(&[("title", title)])
            .json(&json!({ "story_text": story_text }))
            .send()
            .await
            .map_err(network_error)?;

        if !resp.status().is_success() {
            return Err(HttpBackend::server_error(resp).await);
        }

        resp.json::<StorybookResponse>()
            .await
            .map_err(|e| GenerateError::Network(format!("Invalid backend response: {e}")))
    }

    async fn generate_page(
        &self,
        page_text: &str,
        page_number: u32,
        total_pages: u32,
    ) -> Result<PageImageDto, GenerateError> {
        debug!("POST /generate-page {page_number}/{total_pages}");
        let resp = self
            .client
            .post(self.endpoint("generate-page"))
            .query(&[
                ("page_text", page_text),
                ("page_number", &page_number.to_string()),
                ("total_pages", &total_pages.to_string()),
            ])
            .send()
            .await
            .map_err(network_error)?;

        if !resp.status().is_success() {
            return Err(HttpBackend::server_error(resp).await);
        }

        resp.json::<PageImageDto>()
            .await
            .map_err(|e| GenerateError::Network(format!("Invalid backend response: {e}")))
    }

    async fn image_exists(&self, filename: &str) -> bool {
        let url = match image_url(&self.base, filename) {
            Ok(url) => url,
            Err(_) => return false,
        };
        match self.client.get(url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    async fn fetch_image(&self, filename: &str) -> Result<Vec<u8>, GenerateError> {
        let url = image_url(&self.base, filename)
            .map_err(|e| GenerateError::Network(format!("Bad image URL: {e}")))?;
        let resp = self.client.get(url).send().await.map_err(network_error)?;
        if !resp.status().is_success() {
            return Err(HttpBackend::server_error(resp).await);
        }
        let bytes = resp.bytes().await.map_err(network_error)?;
        Ok(bytes.to_vec())
    }
}
