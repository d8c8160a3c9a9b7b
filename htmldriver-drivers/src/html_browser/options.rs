use std::time::Duration;

use htmldriver_http::Cookie;
use tracing::debug;

use crate::html_browser::{
    driver::HtmlDriver,
    element::{Point, Size},
    error::WebDriverError,
};

/// Session management: cookies, timeouts, window and logs.
pub struct Options<'a> {
    driver: &'a HtmlDriver,
}

impl<'a> Options<'a> {
    pub(crate) fn new(driver: &'a HtmlDriver) -> Self {
        Self { driver }
    }

    /// Add a cookie for the current page. Without a domain the cookie is
    /// host-only for the current host; without a path it applies to `/`.
    pub fn add_cookie(&self, cookie: Cookie) -> Result<(), WebDriverError> {
        let page = self.driver.current_page();
        if page.is_blank() && cookie.domain.is_none() {
            return Err(WebDriverError::InvalidArgument(
                "a cookie added on about:blank needs a domain".into(),
            ));
        }
        debug!(target: "driver.cookies", name = %cookie.name, url = %page.url, "driver.cookie.add");
        self.driver
            .client()
            .with_cookies(|jar| jar.insert_for(cookie, &page.url))?;
        Ok(())
    }

    /// Delete the cookie named `name` visible to the current page.
    pub fn delete_cookie_named(&self, name: &str) -> Result<(), WebDriverError> {
        let name = non_blank(name)?;
        let url = self.driver.current_page().url.clone();
        self.driver
            .client()
            .with_cookies(|jar| jar.remove_matching(&url, name));
        Ok(())
    }

    /// Delete the stored cookie with the same name, domain and path.
    pub fn delete_cookie(&self, cookie: &Cookie) {
        let url = self.driver.current_page().url.clone();
        let Some(domain) = cookie
            .domain
            .clone()
            .or_else(|| url.host_str().map(str::to_string))
        else {
            return;
        };
        let path = cookie.path.as_deref().unwrap_or("/");
        self.driver
            .client()
            .with_cookies(|jar| jar.remove(&domain, path, &cookie.name));
    }

    /// Delete every cookie visible to the current page.
    pub fn delete_all_cookies(&self) {
        let url = self.driver.current_page().url.clone();
        let removed = self.driver.client().with_cookies(|jar| jar.clear_matching(&url));
        debug!(target: "driver.cookies", url = %url, removed, "driver.cookie.clear");
    }

    /// Every unexpired cookie in the session, whichever site set it.
    pub fn cookies(&self) -> Vec<Cookie> {
        self.driver.client().with_cookies(|jar| jar.all())
    }

    /// The cookie named `name` the current page would send, if any.
    pub fn cookie_named(&self, name: &str) -> Result<Option<Cookie>, WebDriverError> {
        let name = non_blank(name)?;
        let url = self.driver.current_page().url.clone();
        Ok(self
            .driver
            .client()
            .with_cookies(|jar| jar.matching(&url))
            .into_iter()
            .find(|c| c.name == name))
    }

    pub fn timeouts(&self) -> Timeouts<'a> {
        Timeouts {
            driver: self.driver,
        }
    }

    pub fn window(&self) -> Window {
        Window
    }

    pub fn logs(&self) -> Logs {
        Logs
    }
}

fn non_blank(name: &str) -> Result<&str, WebDriverError> {
    if name.trim().is_empty() {
        Err(WebDriverError::InvalidArgument("cookie name must not be blank".into()))
    } else {
        Ok(name)
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Session timeouts. The page-load timeout bounds every fetch; the others
/// are recorded for callers that poll.
pub struct Timeouts<'a> {
    driver: &'a HtmlDriver,
}

impl Timeouts<'_> {
    pub fn implicit_wait(&self) -> Duration {
        self.driver.timeouts().implicit_wait()
    }

    pub fn set_implicit_wait(&self, duration: Duration) -> &Self {
        self.driver
            .update_timeouts(|t| t.implicit_wait_ms = millis(duration));
        self
    }

    pub fn script(&self) -> Duration {
        self.driver.timeouts().script()
    }

    pub fn set_script(&self, duration: Duration) -> &Self {
        self.driver.update_timeouts(|t| t.script_ms = millis(duration));
        self
    }

    pub fn page_load(&self) -> Duration {
        self.driver.timeouts().page_load()
    }

    pub fn set_page_load(&self, duration: Duration) -> &Self {
        self.driver.update_timeouts(|t| t.page_load_ms = millis(duration));
        self
    }
}

/// The single, unbounded window. Resizing and moving are accepted and ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct Window;

impl Window {
    pub fn size(&self) -> Size {
        Size {
            width: i32::MAX,
            height: i32::MAX,
        }
    }

    pub fn position(&self) -> Point {
        Point::default()
    }

    pub fn set_size(&self, _size: Size) {}

    pub fn set_position(&self, _position: Point) {}

    pub fn maximize(&self) {}

    pub fn minimize(&self) {}

    pub fn fullscreen(&self) {}
}

/// Browser logs. There are none.
#[derive(Debug, Clone, Copy, Default)]
pub struct Logs;

impl Logs {
    pub fn available_log_types(&self) -> Vec<String> {
        Vec::new()
    }

    pub fn get(&self, _log_type: &str) -> Vec<String> {
        Vec::new()
    }
}
