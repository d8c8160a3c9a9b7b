use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use htmldriver_dom::Document;
use htmldriver_http::{PageRequest, StatusCode};
use url::Url;

pub(crate) const ABOUT_BLANK: &str = "about:blank";

/// One page load: the parsed document plus what produced it.
#[derive(Debug)]
pub(crate) struct Page {
    /// Unique per load, so two loads of the same URL are distinct pages.
    pub(crate) id: u64,
    pub(crate) url: Url,
    pub(crate) status: Option<StatusCode>,
    /// `None` for `about:blank`.
    pub(crate) request: Option<PageRequest>,
    document: RwLock<Document>,
}

impl Page {
    pub(crate) fn loaded(id: u64, url: Url, status: StatusCode, request: PageRequest, html: &str) -> Self {
        let document = Document::parse(html, url.clone());
        Self {
            id,
            url,
            status: Some(status),
            request: Some(request),
            document: RwLock::new(document),
        }
    }

    pub(crate) fn blank(id: u64, url: Url) -> Self {
        Self {
            id,
            document: RwLock::new(Document::blank(url.clone())),
            url,
            status: None,
            request: None,
        }
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, Document> {
        self.document.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Document> {
        self.document.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn is_blank(&self) -> bool {
        self.request.is_none()
    }
}
