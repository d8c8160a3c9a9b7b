use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use htmldriver_common::{DriverSettings, TimeoutSettings};
use htmldriver_config::DriverConfigLoader;
use htmldriver_dom::{By, locator};
use htmldriver_http::{HttpClient, PageRequest};
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::html_browser::{
    element::WebElement,
    error::WebDriverError,
    navigation::Navigation,
    options::Options,
    page::{ABOUT_BLANK, Page},
};

/// Anything elements can be looked up from: the driver (whole page) or an
/// element (its subtree).
pub trait SearchContext {
    fn find_elements(&self, by: &By) -> Result<Vec<WebElement>, WebDriverError>;

    /// First match in document order.
    fn find_element(&self, by: &By) -> Result<WebElement, WebDriverError> {
        self.find_elements(by)?
            .into_iter()
            .next()
            .ok_or_else(|| WebDriverError::NoSuchElement {
                selector: by.to_string(),
            })
    }
}

/// Browsing history of the single window. Never empty.
struct Session {
    history: Vec<Arc<Page>>,
    index: usize,
}

impl Session {
    fn current(&self) -> Arc<Page> {
        Arc::clone(&self.history[self.index])
    }
}

struct DriverInner {
    client: HttpClient,
    session: Mutex<Session>,
    timeouts: Mutex<TimeoutSettings>,
    window_handle: String,
    blank_url: Url,
    next_page_id: AtomicU64,
}

/// A WebDriver-style browser session over plain HTTP and a static DOM.
///
/// Clones share the session: history, cookies and timeouts.
///
/// ```no_run
/// # async fn demo() -> Result<(), htmldriver_drivers::WebDriverError> {
/// use htmldriver_drivers::{By, HtmlDriver, SearchContext};
///
/// let driver = HtmlDriver::new()?;
/// driver.get("http://localhost:8080/login").await?;
/// driver.find_element(&By::name("user"))?.send_keys("cheese").await?;
/// driver.find_element(&By::css("form"))?.submit().await?;
/// println!("{}", driver.title());
/// # Ok(()) }
/// ```
#[derive(Clone)]
pub struct HtmlDriver {
    inner: Arc<DriverInner>,
}

impl HtmlDriver {
    /// Driver with default settings.
    pub fn new() -> Result<Self, WebDriverError> {
        Self::with_settings(DriverSettings::default())
    }

    pub fn with_settings(settings: DriverSettings) -> Result<Self, WebDriverError> {
        let client = HttpClient::new(&settings)?;
        let blank_url = Url::parse(ABOUT_BLANK)
            .map_err(|e| WebDriverError::InvalidArgument(e.to_string()))?;
        let window_handle = Uuid::new_v4().to_string();
        info!(
            target: "driver",
            window = %window_handle,
            user_agent = %settings.user_agent,
            max_redirects = settings.max_redirects,
            "driver.session.start"
        );
        Ok(Self {
            inner: Arc::new(DriverInner {
                client,
                session: Mutex::new(Session {
                    history: vec![Arc::new(Page::blank(0, blank_url.clone()))],
                    index: 0,
                }),
                timeouts: Mutex::new(settings.timeouts),
                window_handle,
                blank_url,
                next_page_id: AtomicU64::new(1),
            }),
        })
    }

    /// Driver configured from the given loader (files plus `HTMLDRIVER__` env).
    pub fn from_loader(loader: DriverConfigLoader) -> Result<Self, WebDriverError> {
        let config = loader
            .load()
            .map_err(|e| WebDriverError::Config(e.to_string()))?;
        Self::with_settings(config.driver)
    }

    /// Load `url` in the window. HTTP error statuses still produce a page.
    pub async fn get(&self, url: &str) -> Result<(), WebDriverError> {
        let trimmed = url.trim();
        if trimmed.eq_ignore_ascii_case(ABOUT_BLANK) {
            self.push(self.blank_page());
            return Ok(());
        }
        let parsed = Url::parse(trimmed)
            .map_err(|e| WebDriverError::InvalidArgument(format!("invalid URL {url:?}: {e}")))?;
        self.load(PageRequest::get(parsed)).await
    }

    pub fn current_url(&self) -> String {
        self.current_page().url.to_string()
    }

    pub fn title(&self) -> String {
        self.current_page().read().title()
    }

    /// Serialized markup of the current document, reflecting edits made
    /// through element handles.
    pub fn page_source(&self) -> String {
        self.current_page().read().outer_html()
    }

    pub fn window_handle(&self) -> String {
        self.inner.window_handle.clone()
    }

    pub fn window_handles(&self) -> Vec<String> {
        vec![self.window_handle()]
    }

    /// Reset the window to `about:blank`, forgetting history.
    pub fn close(&self) {
        let blank = Arc::new(self.blank_page());
        let mut session = self.session();
        session.history = vec![blank];
        session.index = 0;
        info!(target: "driver", window = %self.inner.window_handle, "driver.window.closed");
    }

    /// End the session. Cookies are discarded.
    pub fn quit(self) {
        self.close();
        self.inner.client.with_cookies(|jar| jar.clear());
        info!(target: "driver", window = %self.inner.window_handle, "driver.session.quit");
    }

    pub fn navigate(&self) -> Navigation<'_> {
        Navigation::new(self)
    }

    pub fn manage(&self) -> Options<'_> {
        Options::new(self)
    }

    // ---------- crate internals ----------

    pub(crate) fn client(&self) -> &HttpClient {
        &self.inner.client
    }

    pub(crate) fn timeouts(&self) -> TimeoutSettings {
        *self
            .inner
            .timeouts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn update_timeouts(&self, f: impl FnOnce(&mut TimeoutSettings)) {
        let mut timeouts = self
            .inner
            .timeouts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut timeouts);
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.inner
            .session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn current_page(&self) -> Arc<Page> {
        self.session().current()
    }

    fn next_page_id(&self) -> u64 {
        self.inner.next_page_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn blank_page(&self) -> Page {
        Page::blank(self.next_page_id(), self.inner.blank_url.clone())
    }

    /// Fetch and parse a page without touching history.
    pub(crate) async fn fetch_page(&self, request: PageRequest) -> Result<Page, WebDriverError> {
        let request = request.with_timeout(self.timeouts().page_load());
        let fetched = match self.inner.client.fetch(&request).await {
            Ok(fetched) => fetched,
            Err(err) => {
                warn!(
                    target: "driver.navigation",
                    method = %request.method,
                    url = %request.url,
                    error = %err,
                    "driver.page.failed"
                );
                return Err(err.into());
            }
        };
        info!(
            target: "driver.navigation",
            method = %request.method,
            url = %fetched.url,
            status = fetched.status.as_u16(),
            redirects = fetched.redirects,
            encoding = fetched.encoding.name(),
            "driver.page.loaded"
        );
        Ok(Page::loaded(
            self.next_page_id(),
            fetched.url,
            fetched.status,
            request,
            &fetched.body,
        ))
    }

    /// Fetch `request` and make the result the current page.
    pub(crate) async fn load(&self, request: PageRequest) -> Result<(), WebDriverError> {
        let page = self.fetch_page(request).await?;
        self.push(page);
        Ok(())
    }

    /// New history entry; forward entries are dropped.
    pub(crate) fn push(&self, page: Page) {
        let mut session = self.session();
        let keep = session.index + 1;
        debug!(
            target: "driver.navigation",
            page = page.id,
            url = %page.url,
            status = page.status.map(|s| s.as_u16()),
            dropped = session.history.len().saturating_sub(keep),
            "driver.history.push"
        );
        session.history.truncate(keep);
        session.history.push(Arc::new(page));
        session.index = keep;
    }

    pub(crate) fn replace_current(&self, page: Page) {
        let mut session = self.session();
        let index = session.index;
        session.history[index] = Arc::new(page);
    }

    /// Move `delta` entries through history; false when out of range.
    pub(crate) fn step_history(&self, delta: isize) -> bool {
        let mut session = self.session();
        let Some(target) = session.index.checked_add_signed(delta) else {
            return false;
        };
        if target >= session.history.len() {
            return false;
        }
        session.index = target;
        debug!(
            target: "driver.navigation",
            index = target,
            url = %session.history[target].url,
            "driver.history.moved"
        );
        true
    }
}

impl SearchContext for HtmlDriver {
    fn find_elements(&self, by: &By) -> Result<Vec<WebElement>, WebDriverError> {
        let page = self.current_page();
        let nodes = {
            let doc = page.read();
            locator::find_all(&doc, doc.root(), by)?
        };
        debug!(target: "driver.element", locator = %by, found = nodes.len(), "driver.find");
        Ok(nodes
            .into_iter()
            .map(|node| WebElement::new(self.clone(), Arc::clone(&page), node))
            .collect())
    }
}
