//! Page-fetching HTTP client for the driver, with a cookie jar and safe logging.
//!
//! - Redirects are followed by hand so every hop's `Set-Cookie` lands in the jar
//! - Bodies are size-capped and decoded by BOM, header charset or `<meta>` tag
//! - Network send failures are retried with exponential backoff
//! - Optional *raw* request/response logging via `HTMLDRIVER_HTTP_RAW=1`
//!
//! Example (no_run):
//! ```no_run
//! # async fn demo() -> Result<(), htmldriver_http::HttpError> {
//! use htmldriver_common::DriverSettings;
//! use htmldriver_http::{HttpClient, PageRequest};
//!
//! let client = HttpClient::new(&DriverSettings::default())?;
//! let url = url::Url::parse("http://localhost:8080/").unwrap();
//! let page = client.fetch(&PageRequest::get(url)).await?;
//! println!("{} {}", page.status, page.body.len());
//! # Ok(()) }
//! ```
//!
//! Observability: `tracing` events `http.request.start`, `http.redirect`,
//! `http.response.headers`, `http.retrying.network_send` and `http.error`.
//! Query strings and form fields with secret-looking names are redacted, and
//! cookie headers never reach the logs.

use std::time::Duration;

use thiserror::Error;

pub mod charset;
mod client;
pub mod cookies;

pub use client::{FetchedPage, HttpClient, PageRequest};
pub use cookies::{Cookie, CookieError, CookieJar};
pub use reqwest::{Method, StatusCode};

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("request build failed: {0}")]
    Build(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("timed out after {timeout:?} fetching {url}")]
    Timeout { timeout: Duration, url: String },
    #[error("HTTP error fetching URL. Status={status}, URL=[{url}]")]
    Status { status: StatusCode, url: String },
    #[error("too many redirects (limit {limit}) fetching {url}")]
    TooManyRedirects { limit: usize, url: String },
    #[error("unhandled content type {content_type} at {url}")]
    UnsupportedContentType { content_type: String, url: String },
    #[error("response from {url} is larger than {limit} bytes")]
    BodyTooLarge { limit: usize, url: String },
}
