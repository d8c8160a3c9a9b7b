use tracing::debug;

use crate::html_browser::{driver::HtmlDriver, error::WebDriverError};

/// History navigation for the driver's window.
pub struct Navigation<'a> {
    driver: &'a HtmlDriver,
}

impl<'a> Navigation<'a> {
    pub(crate) fn new(driver: &'a HtmlDriver) -> Self {
        Self { driver }
    }

    /// Same as [`HtmlDriver::get`].
    pub async fn to(&self, url: &str) -> Result<(), WebDriverError> {
        self.driver.get(url).await
    }

    /// Show the previous page as it was left. No-op on the first page.
    pub fn back(&self) {
        if !self.driver.step_history(-1) {
            debug!(target: "driver.navigation", "driver.history.back_ignored");
        }
    }

    /// Show the next page as it was left. No-op on the last page.
    pub fn forward(&self) {
        if !self.driver.step_history(1) {
            debug!(target: "driver.navigation", "driver.history.forward_ignored");
        }
    }

    /// Re-issue the request that produced the current page, form body
    /// included, replacing it in history.
    pub async fn refresh(&self) -> Result<(), WebDriverError> {
        let current = self.driver.current_page();
        let page = match &current.request {
            Some(request) => self.driver.fetch_page(request.clone()).await?,
            None => self.driver.blank_page(),
        };
        self.driver.replace_current(page);
        Ok(())
    }
}
