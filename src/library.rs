//! Client for the reporting backend's chart library, plus the in-memory
//! [`AssetStore`] the rasterizer reads image bytes from.
//!
//! Endpoints:
//!
//! - `GET {base}/jobs/job/{job}/charts` → `{"charts": [{"group", "filename"}, ..]}`
//! - `GET {base}/static/jobs/{job}/{group}/{filename}` → image bytes

use std::collections::HashMap;

use serde::Deserialize;

use crate::document::Document;
use crate::element::{ChartRef, ElementContent};
use crate::error::LibraryError;

const USER_AGENT: &str = concat!("report-canvas/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct ChartListing {
    #[serde(default)]
    charts: Vec<ChartRef>,
}

/// HTTP client bound to one backend base URL.
#[derive(Debug, Clone)]
pub struct LibraryClient {
    base_url: String,
    http: reqwest::Client,
}

impl LibraryClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, LibraryError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| LibraryError::Client(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `base_url` extended by `segments`, each percent-encoded as a single
    /// path segment. A base that does not parse as a URL is joined verbatim.
    fn endpoint(&self, segments: &[&str]) -> String {
        let Ok(mut url) = reqwest::Url::parse(&self.base_url) else {
            return format!("{}/{}", self.base_url, segments.join("/"));
        };
        match url.path_segments_mut() {
            Ok(mut path) => {
                path.pop_if_empty().extend(segments);
            }
            Err(()) => return format!("{}/{}", self.base_url, segments.join("/")),
        }
        url.to_string()
    }

    pub fn charts_url(&self, job_id: &str) -> String {
        self.endpoint(&["jobs", "job", job_id, "charts"])
    }

    pub fn asset_url(&self, job_id: &str, chart: &ChartRef) -> String {
        self.endpoint(&["static", "jobs", job_id, &chart.group, &chart.filename])
    }

    /// Saved charts of `job_id`. A response without a `charts` key is an
    /// empty library.
    pub async fn list_charts(&self, job_id: &str) -> Result<Vec<ChartRef>, LibraryError> {
        let url = self.charts_url(job_id);
        let body = self.fetch_url(&url).await?;
        let listing: ChartListing = serde_json::from_slice(&body).map_err(|e| LibraryError::Decode {
            url: url.clone(),
            reason: e.to_string(),
        })?;
        log::debug!("{} charts in library of job {}", listing.charts.len(), job_id);
        Ok(listing.charts)
    }

    /// Image bytes of a library chart.
    pub async fn fetch_asset(&self, job_id: &str, chart: &ChartRef) -> Result<Vec<u8>, LibraryError> {
        self.fetch_url(&self.asset_url(job_id, chart)).await
    }

    /// GET `url` and return the body; non-2xx is an error.
    pub async fn fetch_url(&self, url: &str) -> Result<Vec<u8>, LibraryError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|source| LibraryError::Request {
                url: url.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(LibraryError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(|source| LibraryError::Request {
            url: url.to_string(),
            source,
        })?;
        Ok(bytes.to_vec())
    }
}

/// Image bytes for elements that reference something outside the document:
/// library charts and remote URLs. Data URIs never go through the store.
#[derive(Debug, Clone, Default)]
pub struct AssetStore {
    charts: HashMap<ChartRef, Vec<u8>>,
    urls: HashMap<String, Vec<u8>>,
}

impl AssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_chart(&mut self, chart: ChartRef, bytes: Vec<u8>) {
        self.charts.insert(chart, bytes);
    }

    pub fn chart(&self, chart: &ChartRef) -> Option<&[u8]> {
        self.charts.get(chart).map(Vec::as_slice)
    }

    pub fn insert_url(&mut self, url: impl Into<String>, bytes: Vec<u8>) {
        self.urls.insert(url.into(), bytes);
    }

    pub fn url(&self, url: &str) -> Option<&[u8]> {
        self.urls.get(url).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.charts.len() + self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Download every library chart and remote image `document` references.
/// Charts need a `job_id`; without one they are skipped. Failures are
/// logged and skipped so the export falls back to placeholders.
pub async fn prefetch_assets(
    document: &Document,
    job_id: Option<&str>,
    client: &LibraryClient,
) -> AssetStore {
    let mut store = AssetStore::new();

    for page in document.pages() {
        for element in &page.elements {
            match &element.content {
                ElementContent::ChartImage { chart } => {
                    if store.chart(chart).is_some() {
                        continue;
                    }
                    let Some(job) = job_id else {
                        log::warn!("{}: no job id, cannot fetch chart {}", element.id, chart.filename);
                        continue;
                    };
                    match client.fetch_asset(job, chart).await {
                        Ok(bytes) => store.insert_chart(chart.clone(), bytes),
                        Err(e) => log::warn!("{}: {e}", element.id),
                    }
                }
                ElementContent::ExternalImage { src, .. } if src.starts_with("http") => {
                    if store.url(src).is_some() {
                        continue;
                    }
                    match client.fetch_url(src).await {
                        Ok(bytes) => store.insert_url(src.clone(), bytes),
                        Err(e) => log::warn!("{}: {e}", element.id),
                    }
                }
                _ => {}
            }
        }
    }

    log::info!("prefetched {} assets", store.len());
    store
}
