use std::thread;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::config::CatalogConfig;
use crate::error::PrepError;

/// One file record returned by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogHit {
    pub id: String,
    pub file_name: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: SearchData,
}

#[derive(Debug, Default, Deserialize)]
struct SearchData {
    #[serde(default)]
    hits: Vec<CatalogHit>,
}

pub trait CatalogClient: Send + Sync {
    /// Returns one page of slide image files belonging to the case
    /// `submitter_id`.
    fn search_slides(&self, submitter_id: &str) -> Result<Vec<CatalogHit>, PrepError>;
}

impl<T: CatalogClient + ?Sized> CatalogClient for &T {
    fn search_slides(&self, submitter_id: &str) -> Result<Vec<CatalogHit>, PrepError> {
        (**self).search_slides(submitter_id)
    }
}

#[derive(Clone)]
pub struct GdcHttpClient {
    client: Client,
    base_url: String,
    data_type: String,
    fields: String,
    page_size: usize,
    max_retries: usize,
}

impl GdcHttpClient {
    pub fn new(config: &CatalogConfig) -> Result<Self, PrepError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("slideprep/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| PrepError::CatalogHttp(err.to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|err| PrepError::CatalogHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            data_type: config.data_type.clone(),
            fields: config.fields.clone(),
            page_size: config.page_size,
            max_retries: config.max_retries,
        })
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, PrepError> {
        if response.status() == StatusCode::OK {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "catalog request failed".to_string());
        Err(PrepError::CatalogStatus { status, message })
    }

    fn send_with_retries<F>(
        &self,
        mut make_req: F,
    ) -> Result<reqwest::blocking::Response, PrepError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            let response = make_req().send();
            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < self.max_retries && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < self.max_retries && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(PrepError::CatalogHttp(err.to_string()));
                }
            }
        }
    }
}

impl CatalogClient for GdcHttpClient {
    fn search_slides(&self, submitter_id: &str) -> Result<Vec<CatalogHit>, PrepError> {
        let filters = slide_filter(submitter_id, &self.data_type).to_string();
        let size = self.page_size.to_string();
        debug!(submitter_id, url = %self.base_url, "catalog.request");
        let response = self.send_with_retries(|| {
            self.client.get(&self.base_url).query(&[
                ("filters", filters.as_str()),
                ("fields", self.fields.as_str()),
                ("format", "json"),
                ("size", size.as_str()),
            ])
        })?;
        let response = Self::handle_status(response)?;
        let body = response
            .text()
            .map_err(|err| PrepError::CatalogHttp(err.to_string()))?;
        parse_hits(&body)
    }
}

/// Filter selecting files of `data_type` that belong to case `submitter_id`.
pub fn slide_filter(submitter_id: &str, data_type: &str) -> Value {
    json!({
        "op": "and",
        "content": [
            {
                "op": "in",
                "content": {
                    "field": "cases.submitter_id",
                    "value": [submitter_id],
                },
            },
            {
                "op": "=",
                "content": {
                    "field": "files.data_type",
                    "value": data_type,
                },
            },
        ],
    })
}

/// Extracts `data.hits` from a search response body. A missing `data` or
/// `hits` is an empty result; a hit without `id` or `file_name` is malformed.
pub fn parse_hits(body: &str) -> Result<Vec<CatalogHit>, PrepError> {
    let response: SearchResponse =
        serde_json::from_str(body).map_err(|err| PrepError::CatalogResponse(err.to_string()))?;
    Ok(response.data.hits)
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
