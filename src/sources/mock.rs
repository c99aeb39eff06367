//! Mock page fetcher for testing purposes.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use url::Url;

use crate::sources::{FetchedPage, PageFetcher, SourceError};

/// A page fetcher that serves predefined pages keyed by URL.
///
/// Unknown URLs fail with HTTP 404, like a real server would.
#[derive(Debug, Default)]
pub struct MockPageFetcher {
    pages: Mutex<HashMap<String, (String, Option<Url>)>>,
    requests: Mutex<Vec<Url>>,
    closed: AtomicBool,
    close_error: Mutex<Option<String>>,
}

impl MockPageFetcher {
    /// Create a new mock fetcher with no pages.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` at `url`, advertising `next` as its next page.
    pub fn add_page(&self, url: &Url, body: impl Into<String>, next: Option<Url>) {
        let mut guard = self.pages.lock().unwrap();
        guard.insert(url.to_string(), (body.into(), next));
    }

    /// URLs requested so far, in order.
    pub fn requests(&self) -> Vec<Url> {
        self.requests.lock().unwrap().clone()
    }

    /// Make `close` fail with a render error after marking the fetcher closed.
    pub fn fail_close(&self, message: impl Into<String>) {
        *self.close_error.lock().unwrap() = Some(message.into());
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for MockPageFetcher {
    async fn fetch_page(&self, url: &Url) -> Result<FetchedPage, SourceError> {
        self.requests.lock().unwrap().push(url.clone());

        let guard = self.pages.lock().unwrap();
        match guard.get(url.as_str()) {
            Some((body, next)) => Ok(FetchedPage {
                url: url.clone(),
                body: body.clone(),
                next: next.clone(),
            }),
            None => Err(SourceError::Http {
                status: 404,
                url: url.to_string(),
            }),
        }
    }

    async fn close(&self) -> Result<(), SourceError> {
        self.closed.store(true, Ordering::SeqCst);
        match self.close_error.lock().unwrap().clone() {
            Some(message) => Err(SourceError::Render(message)),
            None => Ok(()),
        }
    }
}

/// Helper to build a results page linking to the given arXiv identifiers.
pub fn results_page(ids: &[&str]) -> String {
    let links: String = ids
        .iter()
        .map(|id| format!("<li><a href=\"https://arxiv.org/abs/{}\">{}</a></li>", id, id))
        .collect();
    format!("<html><body><ul>{}</ul></body></html>", links)
}
