use std::env;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use encoding_rs::Encoding;
use htmldriver_common::DriverSettings;
use reqwest::header::{
    ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, COOKIE, HeaderMap, HeaderName, HeaderValue, LOCATION,
    SET_COOKIE,
};
use reqwest::{Client, Method, Response, StatusCode, redirect};
use tokio::time::sleep;
use url::{Url, form_urlencoded};
use uuid::Uuid;

use crate::HttpError;
use crate::charset::decode_body;
use crate::cookies::CookieJar;

// ==============================
// Raw logging toggles
// ==============================

const RAW_ENV: &str = "HTMLDRIVER_HTTP_RAW";
const RAW_MAX_BODY: usize = 64 * 1024;

const DEFAULT_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(200);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(5);

const SECRET_PARAMS: &[&str] = &[
    "access_token",
    "authorization",
    "auth",
    "key",
    "api_key",
    "token",
    "secret",
    "client_secret",
    "bearer",
    "password",
    "passwd",
];

fn raw_enabled() -> bool {
    matches!(
        env::var(RAW_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

// ==============================
// Requests & responses
// ==============================

/// A page load: what to fetch and how strictly to treat the answer.
///
/// ```
/// use htmldriver_http::{Method, PageRequest};
/// use url::Url;
///
/// let url = Url::parse("http://localhost/search").unwrap();
/// let req = PageRequest::submit(Method::GET, url, vec![("q".into(), "cheese".into())]);
/// assert!(!req.ignore_http_errors);
/// assert_eq!(req.form.as_ref().map(Vec::len), Some(1));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub method: Method,
    pub url: Url,
    /// Form fields. Sent as the query string for GET and as an urlencoded
    /// body otherwise.
    pub form: Option<Vec<(String, String)>>,
    /// Return 4xx/5xx responses as pages instead of [`HttpError::Status`].
    pub ignore_http_errors: bool,
    /// Overrides the client's page-load timeout for this request.
    pub timeout: Option<Duration>,
}

impl PageRequest {
    /// Plain navigation; error statuses still produce a page.
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            form: None,
            ignore_http_errors: true,
            timeout: None,
        }
    }

    /// Form submission; error statuses fail the request.
    pub fn submit(method: Method, url: Url, form: Vec<(String, String)>) -> Self {
        Self {
            method,
            url,
            form: Some(form),
            ignore_http_errors: false,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_ignore_http_errors(mut self, ignore: bool) -> Self {
        self.ignore_http_errors = ignore;
        self
    }
}

/// A fully read and decoded response.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL after redirects.
    pub url: Url,
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: String,
    pub encoding: &'static Encoding,
    /// Number of redirects followed to reach `url`.
    pub redirects: usize,
}

// ==============================
// Client
// ==============================

/// Page-fetching client. Clones share the connection pool and cookie jar.
#[derive(Clone)]
pub struct HttpClient {
    inner: Client,
    jar: Arc<Mutex<CookieJar>>,
    pub max_redirects: usize,
    pub max_body_bytes: usize,
    pub max_retries: usize,
    /// Delay before the first retry; doubled per attempt up to a fixed cap.
    pub retry_backoff: Duration,
    pub default_timeout: Duration,
}

impl HttpClient {
    /// Build a client from driver settings.
    ///
    /// ```
    /// use htmldriver_common::DriverSettings;
    /// use htmldriver_http::HttpClient;
    ///
    /// let client = HttpClient::new(&DriverSettings::default()).unwrap();
    /// assert_eq!(client.max_redirects, 20);
    /// assert_eq!(client.default_timeout.as_secs(), 30);
    /// ```
    pub fn new(settings: &DriverSettings) -> Result<Self, HttpError> {
        let inner = Client::builder()
            .redirect(redirect::Policy::none())
            .connect_timeout(settings.timeouts.connect())
            .user_agent(settings.user_agent.as_str())
            .default_headers(default_headers(settings)?)
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            inner,
            jar: Arc::new(Mutex::new(CookieJar::new())),
            max_redirects: settings.max_redirects,
            max_body_bytes: settings.max_body_bytes,
            max_retries: settings.http_retries,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            default_timeout: settings.timeouts.page_load(),
        })
    }

    /// Run `f` with exclusive access to the cookie jar.
    pub fn with_cookies<R>(&self, f: impl FnOnce(&mut CookieJar) -> R) -> R {
        f(&mut self.jar())
    }

    fn jar(&self) -> MutexGuard<'_, CookieJar> {
        self.jar.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fetch a page, following redirects and decoding the body.
    pub async fn fetch(&self, request: &PageRequest) -> Result<FetchedPage, HttpError> {
        let req_id = Uuid::new_v4().to_string();
        let timeout = request.timeout.unwrap_or(self.default_timeout);

        let mut method = request.method.clone();
        let mut url = request.url.clone();
        let mut form = request.form.clone();
        if method == Method::GET {
            if let Some(pairs) = form.take() {
                if !pairs.is_empty() {
                    url.query_pairs_mut().extend_pairs(&pairs);
                }
            }
        }

        let mut redirects = 0usize;
        let t0 = Instant::now();
        loop {
            let mut resp = self
                .send_with_retries(&req_id, &method, &url, form.as_deref(), timeout)
                .await?;
            let status = resp.status();
            self.store_cookies(&url, resp.headers());

            if let Some(next) = redirect_target(&url, status, resp.headers())? {
                if redirects >= self.max_redirects {
                    tracing::warn!(
                        target: "http",
                        req_id=%req_id,
                        limit=self.max_redirects,
                        url=%url,
                        "http.error"
                    );
                    return Err(HttpError::TooManyRedirects {
                        limit: self.max_redirects,
                        url: url.to_string(),
                    });
                }
                redirects += 1;
                let switch_to_get = status == StatusCode::SEE_OTHER
                    || (method == Method::POST
                        && matches!(status, StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND));
                if switch_to_get {
                    method = Method::GET;
                    form = None;
                }
                tracing::debug!(
                    target: "http",
                    req_id=%req_id,
                    %status,
                    hop=redirects,
                    method=%method,
                    location=%host_path(&next),
                    "http.redirect"
                );
                url = next;
                continue;
            }

            let headers = resp.headers().clone();
            let content_type = headers
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            tracing::debug!(
                target: "http",
                req_id=%req_id,
                %status,
                duration_ms=t0.elapsed().as_millis() as u64,
                content_type=?content_type,
                redirects,
                "http.response.headers"
            );

            if status.as_u16() >= 400 && !request.ignore_http_errors {
                tracing::warn!(target: "http", req_id=%req_id, %status, url=%host_path(&url), "http.error");
                return Err(HttpError::Status {
                    status,
                    url: url.to_string(),
                });
            }
            if let Some(ct) = content_type.as_deref() {
                if !is_supported_content_type(ct) {
                    tracing::warn!(target: "http", req_id=%req_id, content_type=%ct, "http.error");
                    return Err(HttpError::UnsupportedContentType {
                        content_type: ct.to_string(),
                        url: url.to_string(),
                    });
                }
            }

            let bytes = self.read_body(&req_id, &url, &mut resp).await?;
            if raw_enabled() {
                let mut snip = bytes.clone();
                let truncated = snip.len() > RAW_MAX_BODY;
                snip.truncate(RAW_MAX_BODY);
                tracing::info!(
                    target: "http.raw",
                    %req_id,
                    status=%status,
                    headers=?redact_headers(&headers),
                    body=%String::from_utf8_lossy(&snip),
                    truncated
                );
            }
            tracing::trace!(target: "http", req_id=%req_id, body_snippet=%snip_body(&bytes), "http.response.body_snippet");

            let (body, encoding) = decode_body(&bytes, content_type.as_deref());
            return Ok(FetchedPage {
                url,
                status,
                content_type,
                body,
                encoding,
                redirects,
            });
        }
    }

    async fn send_with_retries(
        &self,
        req_id: &str,
        method: &Method,
        url: &Url,
        form: Option<&[(String, String)]>,
        timeout: Duration,
    ) -> Result<Response, HttpError> {
        let body = form.map(|pairs| {
            form_urlencoded::Serializer::new(String::new())
                .extend_pairs(pairs)
                .finish()
        });
        let mut attempt = 0usize;
        loop {
            let mut headers = HeaderMap::new();
            if let Some(cookie) = self.jar().header_for(url) {
                let value =
                    HeaderValue::from_str(&cookie).map_err(|e| HttpError::Build(e.to_string()))?;
                headers.insert(COOKIE, value);
            }
            let mut rb = self
                .inner
                .request(method.clone(), url.clone())
                .timeout(timeout);
            if let Some(body) = &body {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));
                rb = rb.body(body.clone());
            }
            rb = rb.headers(headers.clone());

            tracing::debug!(
                target: "http",
                req_id=%req_id,
                attempt=attempt + 1,
                max_retries=self.max_retries,
                method=%method,
                host_path=%host_path(url),
                query=?redact_pairs(url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned()))),
                form=?form.map(|pairs| redact_pairs(pairs.iter().cloned())),
                timeout_ms=timeout.as_millis() as u64,
                "http.request.start"
            );
            if raw_enabled() {
                let curl = make_curl(method, url, &headers, body.as_deref());
                tracing::debug!(target: "http.raw", %req_id, %curl, "request");
            }

            match rb.send().await {
                Ok(resp) => return Ok(resp),
                Err(err) => {
                    let message = err.to_string();
                    if attempt < self.max_retries {
                        attempt += 1;
                        let delay = retry_delay(self.retry_backoff, attempt);
                        tracing::warn!(
                            target: "http",
                            req_id=%req_id,
                            attempt,
                            max_retries=self.max_retries,
                            backoff_ms=delay.as_millis() as u64,
                            message=%message,
                            "http.retrying.network_send"
                        );
                        sleep(delay).await;
                        continue;
                    }
                    tracing::warn!(target: "http", req_id=%req_id, attempt, message=%message, "http.error");
                    if err.is_timeout() {
                        return Err(HttpError::Timeout {
                            timeout,
                            url: url.to_string(),
                        });
                    }
                    return Err(HttpError::Network(message));
                }
            }
        }
    }

    async fn read_body(
        &self,
        req_id: &str,
        url: &Url,
        resp: &mut Response,
    ) -> Result<Vec<u8>, HttpError> {
        let mut body = Vec::new();
        loop {
            let chunk = match resp.chunk().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => return Ok(body),
                Err(err) => {
                    tracing::warn!(target: "http", req_id=%req_id, message=%err, "http.network_error.body");
                    if err.is_timeout() {
                        return Err(HttpError::Network(format!("timed out reading {url}: {err}")));
                    }
                    return Err(HttpError::Network(err.to_string()));
                }
            };
            if body.len() + chunk.len() > self.max_body_bytes {
                return Err(HttpError::BodyTooLarge {
                    limit: self.max_body_bytes,
                    url: url.to_string(),
                });
            }
            body.extend_from_slice(&chunk);
        }
    }

    fn store_cookies(&self, url: &Url, headers: &HeaderMap) {
        let mut jar = self.jar();
        for value in headers.get_all(SET_COOKIE) {
            if let Ok(raw) = value.to_str() {
                jar.store_response(url, raw);
            }
        }
    }
}

// ==============================
// Helpers
// ==============================

fn default_headers(settings: &DriverSettings) -> Result<HeaderMap, HttpError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(DEFAULT_ACCEPT));
    if let Some(lang) = settings.accept_language.as_deref() {
        let value = HeaderValue::from_str(lang)
            .map_err(|e| HttpError::Build(format!("invalid Accept-Language: {e}")))?;
        headers.insert(ACCEPT_LANGUAGE, value);
    }
    for (name, value) in &settings.default_headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| HttpError::Build(format!("invalid header name {name:?}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| HttpError::Build(format!("invalid value for {name}: {e}")))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

fn redirect_target(
    current: &Url,
    status: StatusCode,
    headers: &HeaderMap,
) -> Result<Option<Url>, HttpError> {
    let followed = matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    );
    if !followed {
        return Ok(None);
    }
    let Some(location) = headers.get(LOCATION).and_then(|v| v.to_str().ok()) else {
        return Ok(None);
    };
    current
        .join(location.trim())
        .map(Some)
        .map_err(|e| HttpError::Url(format!("bad redirect location {location:?}: {e}")))
}

fn is_supported_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime.is_empty()
        || mime.starts_with("text/")
        || mime == "application/xhtml+xml"
        || mime == "application/xml"
        || mime.ends_with("+xml")
}

fn is_secret(name: &str) -> bool {
    SECRET_PARAMS.contains(&name.to_ascii_lowercase().as_str())
}

fn redact_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Vec<(String, String)> {
    pairs
        .into_iter()
        .map(|(k, v)| {
            let v = if is_secret(&k) { "<redacted>".into() } else { v };
            (k, v)
        })
        .collect()
}

fn host_path(url: &Url) -> String {
    format!("{}{}", url.host_str().unwrap_or("-"), url.path())
}

/// Render a best-effort curl command for repro/debug, with secrets redacted.
fn make_curl(method: &Method, url: &Url, headers: &HeaderMap, body: Option<&str>) -> String {
    let mut parts = vec!["curl".to_string(), format!("-X{method}")];
    for (name, val) in redact_headers(headers) {
        parts.push(format!("-H '{}: {}'", name, val.replace('\'', r"'\''")));
    }
    if let Some(body) = body {
        let redacted = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(redact_pairs(
                form_urlencoded::parse(body.as_bytes()).into_owned(),
            ))
            .finish();
        let mut s = redacted;
        if s.len() > RAW_MAX_BODY {
            s.truncate(RAW_MAX_BODY);
            s.push_str("...");
        }
        parts.push(format!("-d '{}'", s.replace('\'', r"'\''")));
    }
    let mut shown = url.clone();
    if shown.query().is_some() {
        let pairs = redact_pairs(url.query_pairs().into_owned());
        shown.set_query(None);
        shown.query_pairs_mut().extend_pairs(pairs);
    }
    parts.push(format!("'{}'", shown.as_str()));
    parts.join(" ")
}

fn redact_headers(h: &HeaderMap) -> Vec<(String, String)> {
    h.iter()
        .map(|(k, v)| {
            let key = k.as_str().to_string();
            let sensitive = matches!(key.as_str(), "authorization" | "cookie" | "set-cookie");
            let val = if sensitive {
                "<redacted>".to_string()
            } else {
                v.to_str().unwrap_or("").to_string()
            };
            (key, val)
        })
        .collect()
}

fn snip_body(body: &[u8]) -> String {
    let mut snip = String::from_utf8_lossy(body).to_string();
    if snip.len() > 500 {
        let mut cut = 500;
        while !snip.is_char_boundary(cut) {
            cut -= 1;
        }
        snip.truncate(cut);
        snip.push_str("...");
    }
    snip
}

/// Backoff before retry number `attempt` (one-based).
fn retry_delay(base: Duration, attempt: usize) -> Duration {
    let factor = u32::try_from(attempt.saturating_sub(1))
        .ok()
        .and_then(|shift| 1u32.checked_shl(shift))
        .unwrap_or(u32::MAX);
    base.saturating_mul(factor).min(MAX_RETRY_DELAY)
}
