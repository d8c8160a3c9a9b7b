//! WebDriver-style browsing over HTTP and a static DOM.
//!
//! No JavaScript, no layout: pages are fetched, parsed and then driven the
//! way a script-less browser would, which makes functional tests of
//! server-rendered applications fast and deterministic.
//!
//! - [`html_browser::driver::HtmlDriver`]: the session (window, history, cookies)
//! - [`html_browser::element::WebElement`]: element handles with click, typing and form submission
//! - [`html_browser::navigation::Navigation`] and [`html_browser::options::Options`]:
//!   `navigate()` and `manage()` surfaces
pub mod html_browser;

pub use html_browser::{
    driver::{HtmlDriver, SearchContext},
    element::{Point, Rect, Size, WebElement},
    error::WebDriverError,
    keys::Keys,
    navigation::Navigation,
    options::{Logs, Options, Timeouts, Window},
};
pub use htmldriver_dom::By;
pub use htmldriver_http::Cookie;
