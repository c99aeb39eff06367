//! Headless Chromium page fetcher.
//!
//! Some search front ends only produce their result list after running
//! JavaScript. This fetcher loads each page in a headless browser, waits until
//! the network goes idle and hands back the serialized DOM.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::{
    EventLifecycleEvent, NavigateParams, SetLifecycleEventsEnabledParams,
};
use chromiumoxide::Page;
use futures_util::StreamExt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use url::Url;

use crate::sources::arxiv_search::find_next_link;
use crate::sources::{FetchedPage, PageFetcher, SourceError};

/// Environment variable naming an explicit browser binary
pub const CHROMIUM_PATH_ENV: &str = "BIBHARVEST_CHROMIUM_PATH";

const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(60);

fn render_error(e: impl std::fmt::Display) -> SourceError {
    SourceError::Render(e.to_string())
}

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    if let Ok(p) = std::env::var(CHROMIUM_PATH_ENV) {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"]
        .iter()
        .find_map(|name| which::which(name).ok())
}

/// Page fetcher backed by one headless Chromium session
pub struct ChromiumPageFetcher {
    browser: Mutex<Option<Browser>>,
    handler: Mutex<Option<JoinHandle<()>>>,
    root: Url,
}

impl ChromiumPageFetcher {
    /// Launch a headless browser identifying itself with `user_agent`
    pub async fn launch(root: Url, user_agent: &str) -> Result<Self, SourceError> {
        let chrome_path = find_chromium().ok_or_else(|| {
            SourceError::Render(format!(
                "no Chromium binary found on PATH; set {} to point at one",
                CHROMIUM_PATH_ENV
            ))
        })?;
        tracing::debug!(path = %chrome_path.display(), "Launching headless Chromium");

        let config = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg(format!("--user-agent={}", user_agent))
            .build()
            .map_err(|e| SourceError::Render(format!("failed to build browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(render_error)?;

        let handle = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            browser: Mutex::new(Some(browser)),
            handler: Mutex::new(Some(handle)),
            root,
        })
    }
}

/// Document a navigation is expected to produce.
///
/// Lifecycle events are replayed for the blank tab when they are enabled, so
/// only `networkIdle` for the navigated frame and loader counts.
#[derive(Debug, Clone, PartialEq)]
struct NavigationTarget {
    frame_id: String,
    /// `None` for same-document navigations
    loader_id: Option<String>,
}

impl NavigationTarget {
    fn is_idle(&self, name: &str, frame_id: &str, loader_id: &str) -> bool {
        name == "networkIdle"
            && frame_id == self.frame_id
            && self.loader_id.as_deref().map_or(true, |id| id == loader_id)
    }
}

/// Navigate `page` to `url` and wait for its network to go idle
async fn load_until_idle(page: &Page, url: &Url) -> Result<(), SourceError> {
    page.execute(SetLifecycleEventsEnabledParams::new(true))
        .await
        .map_err(render_error)?;
    let mut lifecycle = page
        .event_listener::<EventLifecycleEvent>()
        .await
        .map_err(render_error)?;

    let navigation = page
        .execute(NavigateParams::new(url.as_str()))
        .await
        .map_err(render_error)?
        .result;
    if let Some(error) = navigation.error_text {
        return Err(SourceError::Render(format!("navigation to {} failed: {}", url, error)));
    }

    let target = NavigationTarget {
        frame_id: navigation.frame_id.inner().clone(),
        loader_id: navigation.loader_id.map(|id| id.inner().clone()),
    };
    while let Some(event) = lifecycle.next().await {
        if target.is_idle(&event.name, event.frame_id.inner(), event.loader_id.inner()) {
            return Ok(());
        }
    }

    Err(SourceError::Render(format!("tab closed while loading {}", url)))
}

#[async_trait]
impl PageFetcher for ChromiumPageFetcher {
    async fn fetch_page(&self, url: &Url) -> Result<FetchedPage, SourceError> {
        let guard = self.browser.lock().await;
        let browser = guard
            .as_ref()
            .ok_or_else(|| SourceError::Render("browser session already closed".to_string()))?;

        tracing::debug!(%url, "Rendering page");
        let page = browser.new_page("about:blank").await.map_err(render_error)?;

        let body = match tokio::time::timeout(NAVIGATION_TIMEOUT, load_until_idle(&page, url)).await {
            Ok(Ok(())) => page.content().await.map_err(render_error),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(SourceError::Timeout(format!(
                "{} did not go idle within {:?}",
                url, NAVIGATION_TIMEOUT
            ))),
        };
        if let Err(e) = page.close().await {
            tracing::debug!("Failed to close tab for {}: {}", url, e);
        }
        let body = body?;

        let next = find_next_link(&body, &self.root);
        Ok(FetchedPage {
            url: url.clone(),
            body,
            next,
        })
    }

    async fn close(&self) -> Result<(), SourceError> {
        let mut result = Ok(());
        if let Some(mut browser) = self.browser.lock().await.take() {
            tracing::debug!("Closing headless Chromium");
            match browser.close().await {
                Ok(_) => {
                    if let Err(e) = browser.wait().await {
                        tracing::debug!("Chromium did not exit cleanly: {}", e);
                    }
                }
                Err(e) => result = Err(render_error(e)),
            }
        }

        // The handler task only lives as long as the session.
        if let Some(handle) = self.handler.lock().await.take() {
            handle.abort();
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(loader_id: Option<&str>) -> NavigationTarget {
        NavigationTarget {
            frame_id: "main".to_string(),
            loader_id: loader_id.map(str::to_string),
        }
    }

    #[test]
    fn test_only_network_idle_of_navigated_document_counts() {
        let target = target(Some("results"));

        assert!(target.is_idle("networkIdle", "main", "results"));
        assert!(!target.is_idle("load", "main", "results"));
        assert!(!target.is_idle("networkAlmostIdle", "main", "results"));
        // Replayed for the blank tab before navigation
        assert!(!target.is_idle("networkIdle", "main", "blank"));
        assert!(!target.is_idle("networkIdle", "ad-frame", "results"));
    }

    #[test]
    fn test_same_document_navigation_accepts_any_loader() {
        assert!(target(None).is_idle("networkIdle", "main", "anything"));
    }

    #[tokio::test]
    async fn test_close_stops_handler_task() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let _tx = tx;
            std::future::pending::<()>().await
        });
        let fetcher = ChromiumPageFetcher {
            browser: Mutex::new(None),
            handler: Mutex::new(Some(handle)),
            root: Url::parse("https://search.arxiv.org/").unwrap(),
        };

        fetcher.close().await.unwrap();

        assert!(rx.await.is_err());
        assert!(fetcher.handler.lock().await.is_none());
        assert!(fetcher.fetch_page(&fetcher.root).await.is_err());
    }
}
