//! arXiv full-text search crawling.
//!
//! The search site paginates with ordinary links, so the crawl follows the
//! "next" link of each page until it runs out, stops finding new identifiers,
//! or reaches the page cap.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeSet;
use std::time::Duration;
use url::Url;

use crate::models::ArxivId;
use crate::sources::{FetchedPage, PageFetcher, SourceError};
use crate::utils::HttpClient;

/// Anchor texts that mark a link to the following results page
const NEXT_LABELS: &[&str] = &["next", "next >", ">", "next page"];

/// Build the first results page URL for `query`
pub fn search_url(root: &Url, query: &str) -> Url {
    let mut url = root.clone();
    url.query_pairs_mut().clear().append_pair("query", query);
    url
}

/// Collect every arXiv identifier linked from `html`.
///
/// Links are resolved against `page_url` before matching.
pub fn extract_identifiers(html: &str, page_url: &Url) -> BTreeSet<ArxivId> {
    let document = Html::parse_document(html);
    let Ok(anchors) = Selector::parse("a[href]") else {
        return BTreeSet::new();
    };

    document
        .select(&anchors)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| {
            let resolved = page_url
                .join(href.trim())
                .map(String::from)
                .unwrap_or_else(|_| href.to_string());
            ArxivId::find_in(&resolved)
        })
        .collect()
}

fn normalized_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn has_next_rel(element: &ElementRef<'_>) -> bool {
    element
        .value()
        .attr("rel")
        .is_some_and(|rel| rel.split_whitespace().any(|r| r.eq_ignore_ascii_case("next")))
}

/// Find the link to the next results page, resolved against `root`.
///
/// An `<a>` qualifies when its text is one of the usual "next" labels or when
/// its `rel` contains `next`; a `<link rel="next">` qualifies too.
pub fn find_next_link(html: &str, root: &Url) -> Option<Url> {
    let document = Html::parse_document(html);
    let anchors = Selector::parse("a[href]").ok()?;
    let links = Selector::parse("link[href]").ok()?;

    let anchor = document.select(&anchors).find(|a| {
        let text = normalized_text(a);
        NEXT_LABELS.contains(&text.as_str()) || has_next_rel(a)
    });
    let candidate = anchor.or_else(|| document.select(&links).find(has_next_rel))?;

    let href = candidate.value().attr("href")?.trim();
    root.join(href).ok()
}

/// Search page fetcher over plain HTTP
#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    client: HttpClient,
    root: Url,
}

impl HttpPageFetcher {
    pub fn new(client: HttpClient, root: Url) -> Self {
        Self { client, root }
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_page(&self, url: &Url) -> Result<FetchedPage, SourceError> {
        let body = self.client.get_text(url, &[]).await?;
        let next = find_next_link(&body, &self.root);

        Ok(FetchedPage {
            url: url.clone(),
            body,
            next,
        })
    }
}

/// Crawl result pages starting at `start` and return the sorted identifiers.
///
/// Stops when a page has no next link, when a page adds no identifiers not
/// already seen, when the next link points at a page already visited, or
/// after `max_pages` pages. `delay` is slept between page requests.
pub async fn collect_identifiers(
    fetcher: &dyn PageFetcher,
    start: Url,
    max_pages: usize,
    delay: Duration,
) -> Result<Vec<ArxivId>, SourceError> {
    let mut seen: BTreeSet<ArxivId> = BTreeSet::new();
    let mut visited: BTreeSet<String> = BTreeSet::new();
    let mut url = start;

    for page in 1..=max_pages {
        if page > 1 {
            tokio::time::sleep(delay).await;
        }

        visited.insert(url.to_string());
        let fetched = fetcher.fetch_page(&url).await?;
        let found = extract_identifiers(&fetched.body, &fetched.url);

        let before = seen.len();
        seen.extend(found);
        let added = seen.len() - before;

        tracing::info!(page, added, total = seen.len(), "Scanned results page");

        if added == 0 {
            tracing::info!("No new identifiers on page {}, stopping", page);
            break;
        }

        match fetched.next {
            Some(next) if !visited.contains(next.as_str()) => url = next,
            Some(next) => {
                tracing::debug!(%next, "Next link points at a visited page, stopping");
                break;
            }
            None => {
                tracing::debug!("No next link on page {}", page);
                break;
            }
        }

        if page == max_pages {
            tracing::info!("Reached page cap of {}", max_pages);
        }
    }

    Ok(seen.into_iter().collect())
}
