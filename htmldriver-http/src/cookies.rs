//! In-memory cookie jar following the storage and matching rules of RFC 6265.
//!
//! `Set-Cookie` headers are parsed with the `cookie` crate; storage, domain
//! and path matching, and expiry live here so the driver can list, add and
//! delete cookies the way WebDriver clients expect.

use std::net::IpAddr;

use cookie::Cookie as RawCookie;
use thiserror::Error;
use time::OffsetDateTime;
use url::Url;

/// A cookie as seen by driver users.
///
/// Cookies read back from the jar always carry a domain and a path; cookies
/// built for [`CookieJar::insert_for`] may leave them unset to inherit them
/// from the current page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: Option<String>,
    pub path: Option<String>,
    pub secure: bool,
    pub http_only: bool,
    pub expiry: Option<OffsetDateTime>,
    host_only: bool,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: None,
            path: None,
            secure: false,
            http_only: false,
            expiry: None,
            host_only: false,
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    pub fn with_expiry(mut self, expiry: OffsetDateTime) -> Self {
        self.expiry = Some(expiry);
        self
    }

    /// True when the cookie was stored without a `Domain` attribute and is
    /// only sent back to the exact host that set it.
    pub fn is_host_only(&self) -> bool {
        self.host_only
    }

    fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expiry.is_some_and(|at| at <= now)
    }

    fn same_key(&self, other: &Cookie) -> bool {
        self.name == other.name && self.domain == other.domain && self.path == other.path
    }

    fn matches(&self, url: &Url, host: &str, now: OffsetDateTime) -> bool {
        if self.is_expired(now) {
            return false;
        }
        if self.secure && url.scheme() != "https" {
            return false;
        }
        let Some(domain) = self.domain.as_deref() else {
            return false;
        };
        let domain_ok = if self.host_only {
            host == domain
        } else {
            domain_match(host, domain)
        };
        domain_ok && path_match(url.path(), self.path.as_deref().unwrap_or("/"))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CookieError {
    #[error("cookie name must not be empty")]
    EmptyName,
    #[error("invalid cookie name {0:?}")]
    InvalidName(String),
    #[error("invalid value for cookie {0:?}")]
    InvalidValue(String),
    #[error("cookie has no domain and {0} has no host")]
    NoHost(String),
    #[error("cookie domain {domain} does not match host {host}")]
    DomainMismatch { domain: String, host: String },
}

#[derive(Debug, Default)]
pub struct CookieJar {
    cookies: Vec<Cookie>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store one `Set-Cookie` header value received from `url`.
    ///
    /// Returns `false` when the header is malformed or the cookie was
    /// rejected (e.g. a `Domain` the host does not belong to). Cookies that
    /// arrive already expired delete any stored cookie with the same key.
    pub fn store_response(&mut self, url: &Url, set_cookie: &str) -> bool {
        let raw = match RawCookie::parse(set_cookie) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::debug!(target: "http.cookies", %err, "cookie.parse_failed");
                return false;
            }
        };
        if raw.name().is_empty() {
            return false;
        }
        let Some(host) = request_host(url) else {
            return false;
        };
        let now = OffsetDateTime::now_utc();

        let (domain, host_only) = match raw.domain().map(|d| d.trim_start_matches('.')) {
            Some(d) if !d.is_empty() => {
                let d = d.to_ascii_lowercase();
                if !domain_match(&host, &d) {
                    tracing::debug!(target: "http.cookies", domain = %d, %host, "cookie.domain_rejected");
                    return false;
                }
                (d, false)
            }
            _ => (host, true),
        };
        let path = match raw.path() {
            Some(p) if p.starts_with('/') => p.to_string(),
            _ => default_path(url),
        };
        let expiry = match raw.max_age() {
            Some(max_age) => now.checked_add(max_age),
            None => raw.expires_datetime(),
        };

        self.put(
            Cookie {
                name: raw.name().to_string(),
                value: raw.value().to_string(),
                domain: Some(domain),
                path: Some(path),
                secure: raw.secure().unwrap_or(false),
                http_only: raw.http_only().unwrap_or(false),
                expiry,
                host_only,
            },
            now,
        );
        true
    }

    /// Add a cookie on behalf of the page at `url`. A missing domain makes
    /// the cookie host-only for the page's host; a missing path defaults to `/`.
    pub fn insert_for(&mut self, mut cookie: Cookie, url: &Url) -> Result<(), CookieError> {
        if cookie.name.trim().is_empty() {
            return Err(CookieError::EmptyName);
        }
        if !cookie.name.chars().all(is_token_char) {
            return Err(CookieError::InvalidName(cookie.name));
        }
        if !cookie.value.chars().all(is_value_char) {
            return Err(CookieError::InvalidValue(cookie.name));
        }
        let host = request_host(url);
        match cookie.domain.take() {
            Some(domain) => {
                let domain = domain.trim_start_matches('.').to_ascii_lowercase();
                if let Some(host) = host.as_deref() {
                    if !domain_match(host, &domain) {
                        return Err(CookieError::DomainMismatch {
                            domain,
                            host: host.to_string(),
                        });
                    }
                }
                cookie.domain = Some(domain);
                cookie.host_only = false;
            }
            None => {
                let host = host.ok_or_else(|| CookieError::NoHost(url.to_string()))?;
                cookie.domain = Some(host);
                cookie.host_only = true;
            }
        }
        if cookie.path.as_deref().is_none_or(|p| !p.starts_with('/')) {
            cookie.path = Some("/".to_string());
        }
        self.put(cookie, OffsetDateTime::now_utc());
        Ok(())
    }

    /// `Cookie` request header value for `url`, if any cookie applies.
    pub fn header_for(&self, url: &Url) -> Option<String> {
        let cookies = self.matching(url);
        if cookies.is_empty() {
            return None;
        }
        Some(
            cookies
                .iter()
                .map(|c| format!("{}={}", c.name, c.value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Cookies that would be sent to `url`, longest path first.
    pub fn matching(&self, url: &Url) -> Vec<Cookie> {
        let Some(host) = request_host(url) else {
            return Vec::new();
        };
        let now = OffsetDateTime::now_utc();
        let mut found: Vec<Cookie> = self
            .cookies
            .iter()
            .filter(|c| c.matches(url, &host, now))
            .cloned()
            .collect();
        // Stable sort keeps creation order among equal path lengths.
        found.sort_by_key(|c| std::cmp::Reverse(c.path.as_deref().map_or(0, str::len)));
        found
    }

    /// Every unexpired cookie, regardless of the page.
    pub fn all(&self) -> Vec<Cookie> {
        let now = OffsetDateTime::now_utc();
        self.cookies
            .iter()
            .filter(|c| !c.is_expired(now))
            .cloned()
            .collect()
    }

    /// Remove the cookie stored under exactly this key.
    pub fn remove(&mut self, domain: &str, path: &str, name: &str) -> Option<Cookie> {
        let domain = domain.trim_start_matches('.').to_ascii_lowercase();
        let index = self.cookies.iter().position(|c| {
            c.name == name && c.domain.as_deref() == Some(&domain) && c.path.as_deref() == Some(path)
        })?;
        Some(self.cookies.remove(index))
    }

    /// Remove the first cookie named `name` that is visible to `url`.
    pub fn remove_matching(&mut self, url: &Url, name: &str) -> Option<Cookie> {
        let target = self.matching(url).into_iter().find(|c| c.name == name)?;
        let index = self.cookies.iter().position(|c| c.same_key(&target))?;
        Some(self.cookies.remove(index))
    }

    /// Remove every cookie visible to `url`; returns how many were dropped.
    pub fn clear_matching(&mut self, url: &Url) -> usize {
        let visible = self.matching(url);
        let before = self.cookies.len();
        self.cookies
            .retain(|c| !visible.iter().any(|v| v.same_key(c)));
        before - self.cookies.len()
    }

    pub fn clear(&mut self) {
        self.cookies.clear();
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    fn put(&mut self, cookie: Cookie, now: OffsetDateTime) {
        self.cookies.retain(|c| !c.same_key(&cookie) && !c.is_expired(now));
        if cookie.is_expired(now) {
            tracing::trace!(target: "http.cookies", name = %cookie.name, "cookie.expired_on_arrival");
            return;
        }
        self.cookies.push(cookie);
    }
}

/// RFC 6265 token: visible ASCII minus separators.
fn is_token_char(c: char) -> bool {
    c.is_ascii_graphic() && !"()<>@,;:\\\"/[]?={}".contains(c)
}

/// Anything that survives in a `Cookie` header without splitting the pair.
fn is_value_char(c: char) -> bool {
    (c == ' ' || c.is_ascii_graphic()) && c != ';'
}

fn request_host(url: &Url) -> Option<String> {
    url.host_str()
        .map(|h| h.trim_start_matches('[').trim_end_matches(']').to_ascii_lowercase())
}

fn domain_match(host: &str, domain: &str) -> bool {
    if host == domain {
        return true;
    }
    if host.parse::<IpAddr>().is_ok() {
        return false;
    }
    host.len() > domain.len()
        && host.ends_with(domain)
        && host[..host.len() - domain.len()].ends_with('.')
}

fn default_path(url: &Url) -> String {
    let path = url.path();
    if !path.starts_with('/') {
        return "/".to_string();
    }
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}

fn path_match(request_path: &str, cookie_path: &str) -> bool {
    if request_path == cookie_path {
        return true;
    }
    request_path.starts_with(cookie_path)
        && (cookie_path.ends_with('/') || request_path[cookie_path.len()..].starts_with('/'))
}
