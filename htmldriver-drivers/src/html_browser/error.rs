use htmldriver_dom::LocatorError;
use htmldriver_http::{CookieError, HttpError};
use thiserror::Error;

/// Failures surfaced by the driver, named after the WebDriver exceptions
/// they correspond to.
#[derive(Debug, Error)]
pub enum WebDriverError {
    #[error("no such element: unable to locate {selector}")]
    NoSuchElement { selector: String },
    #[error("invalid selector {selector}")]
    InvalidSelector {
        selector: String,
        #[source]
        source: LocatorError,
    },
    #[error("invalid element state: {0}")]
    InvalidElementState(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("unsupported operation: {0}")]
    Unsupported(String),
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<LocatorError> for WebDriverError {
    fn from(source: LocatorError) -> Self {
        let selector = match &source {
            LocatorError::EmptyValue { by }
            | LocatorError::CompoundClassName { by }
            | LocatorError::Invalid { by, .. } => by.clone(),
        };
        WebDriverError::InvalidSelector { selector, source }
    }
}

impl From<CookieError> for WebDriverError {
    fn from(err: CookieError) -> Self {
        WebDriverError::InvalidArgument(err.to_string())
    }
}
