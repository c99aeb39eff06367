//! Integration tests for bibharvest
//!
//! These tests drive both pipelines end to end against local mock servers.

use bibharvest::config::{Config, TagSection};
use bibharvest::models::{ArxivId, DiagnosticKind, Diagnostics};
use bibharvest::pipeline::{run_arxiv, run_zotero};
use bibharvest::sources::ArxivSource;
use bibharvest::utils::HttpClient;
use mockito::{Matcher, Server};
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use url::Url;

/// Configuration pointing every endpoint at `server`, with no waiting
fn test_config(server: &Server, dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.http.retry_base_delay_ms = 1;

    config.arxiv.search_url = format!("{}/", server.url());
    config.arxiv.api_url = format!("{}/api/query", server.url());
    config.arxiv.page_delay_ms = 0;
    config.arxiv.batch_delay_ms = 0;
    config.arxiv.output = dir.path().join("results.csv");

    config.zotero.api_url = server.url();
    config.zotero.page_delay_ms = 0;
    config.zotero.output = dir.path().join("bibliography.html");
    config
}

fn results_page(ids: &[&str], next: Option<&str>) -> String {
    let links: String = ids
        .iter()
        .map(|id| format!("<li><a href=\"https://arxiv.org/abs/{id}\">arXiv:{id}</a></li>"))
        .collect();
    let next = next
        .map(|href| format!("<a href=\"{href}\">Next</a>"))
        .unwrap_or_default();
    format!("<html><body><ol>{links}</ol>{next}</body></html>")
}

fn feed(ids: &[&str]) -> String {
    let entries: String = ids
        .iter()
        .map(|id| {
            format!(
                "<entry><id>http://arxiv.org/abs/{id}v1</id>\
                 <published>2021-01-01T00:00:00Z</published>\
                 <updated>2021-01-02T00:00:00Z</updated>\
                 <title>Paper {id}</title><summary>About {id}.</summary>\
                 <author><name>Author {id}</name></author>\
                 <link href=\"http://arxiv.org/abs/{id}v1\" rel=\"alternate\" type=\"text/html\"/>\
                 <link title=\"pdf\" href=\"http://arxiv.org/pdf/{id}v1\" rel=\"related\" type=\"application/pdf\"/>\
                 </entry>"
            )
        })
        .collect();
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <feed xmlns=\"http://www.w3.org/2005/Atom\" xmlns:arxiv=\"http://arxiv.org/schemas/atom\">{entries}</feed>"
    )
}

fn csv_identifiers(path: &Path) -> Vec<String> {
    let mut reader = csv::Reader::from_path(path).unwrap();
    reader
        .records()
        .map(|r| r.unwrap()[0].to_string())
        .collect()
}

fn zotero_item(key: &str, item_type: &str, data: Value) -> Value {
    let mut data = data;
    data["key"] = json!(key);
    data["itemType"] = json!(item_type);
    json!({ "key": key, "version": 1, "data": data })
}

/// The `<li>` lines of the first list in the document
fn all_items_section(document: &str) -> Vec<&str> {
    let start = document.find("<ul>").unwrap();
    let end = document.find("</ul>").unwrap();
    document[start..end]
        .lines()
        .filter(|l| l.starts_with("<li>"))
        .collect()
}

/// The `<li>` lines listed under `heading`
fn section<'a>(document: &'a str, heading: &str) -> Vec<&'a str> {
    let marker = format!("<h2>{}</h2>", heading);
    let rest = &document[document.find(&marker).unwrap()..];
    all_items_section(rest)
}

async fn mock_library(server: &mut Server, items: Value) -> (mockito::Mock, mockito::Mock) {
    let first = server
        .mock("GET", "/groups/5693788/items")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("start".into(), "0".into()),
            Matcher::UrlEncoded("limit".into(), "100".into()),
            Matcher::UrlEncoded("format".into(), "json".into()),
        ]))
        .match_header("zotero-api-version", "3")
        .with_header("content-type", "application/json")
        .with_body(items.to_string())
        .create_async()
        .await;
    let last = server
        .mock("GET", "/groups/5693788/items")
        .match_query(Matcher::UrlEncoded("start".into(), "100".into()))
        .with_body("[]")
        .create_async()
        .await;
    (first, last)
}

// ========== arXiv pipeline ==========

#[tokio::test]
async fn test_arxiv_harvest_follows_next_links() {
    let mut server = Server::new_async().await;
    let dir = TempDir::new().unwrap();

    let page1 = server
        .mock("GET", "/")
        .match_query(Matcher::Exact("query=spin".into()))
        .with_body(results_page(
            &["2101.00002", "hep-th/9901001", "2101.00002"],
            Some("/?query=spin&page=2"),
        ))
        .create_async()
        .await;
    let page2 = server
        .mock("GET", "/")
        .match_query(Matcher::Exact("query=spin&page=2".into()))
        .with_body(results_page(&["2101.00001"], None))
        .create_async()
        .await;
    let api = server
        .mock("GET", "/api/query")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded(
                "id_list".into(),
                "2101.00001,2101.00002,hep-th/9901001".into(),
            ),
            Matcher::UrlEncoded("max_results".into(), "3".into()),
        ]))
        .with_body(feed(&["2101.00001", "2101.00002", "hep-th/9901001"]))
        .expect(1)
        .create_async()
        .await;

    let mut config = test_config(&server, &dir);
    config.arxiv.query = Some("spin".to_string());

    let report = run_arxiv(&config).await.unwrap();

    page1.assert_async().await;
    page2.assert_async().await;
    api.assert_async().await;

    assert_eq!(report.records, 3);
    assert!(report.diagnostics.is_empty());
    assert_eq!(
        csv_identifiers(&config.arxiv.output),
        vec!["2101.00001", "2101.00002", "hep-th/9901001"]
    );
}

#[tokio::test]
async fn test_arxiv_harvest_respects_page_cap() {
    let mut server = Server::new_async().await;
    let dir = TempDir::new().unwrap();

    let page1 = server
        .mock("GET", "/")
        .match_query(Matcher::Exact("query=spin".into()))
        .with_body(results_page(&["2101.00001"], Some("/?query=spin&page=2")))
        .create_async()
        .await;
    let page2 = server
        .mock("GET", "/")
        .match_query(Matcher::Exact("query=spin&page=2".into()))
        .with_body(results_page(&["2101.00002"], Some("/?query=spin&page=3")))
        .create_async()
        .await;
    let page3 = server
        .mock("GET", "/")
        .match_query(Matcher::Exact("query=spin&page=3".into()))
        .with_body(results_page(&["2101.00003"], None))
        .expect(0)
        .create_async()
        .await;
    let _api = server
        .mock("GET", "/api/query")
        .match_query(Matcher::UrlEncoded(
            "id_list".into(),
            "2101.00001,2101.00002".into(),
        ))
        .with_body(feed(&["2101.00001", "2101.00002"]))
        .create_async()
        .await;

    let mut config = test_config(&server, &dir);
    config.arxiv.query = Some("spin".to_string());
    config.arxiv.max_pages = 2;

    let report = run_arxiv(&config).await.unwrap();

    page1.assert_async().await;
    page2.assert_async().await;
    page3.assert_async().await;
    assert_eq!(report.records, 2);
}

#[tokio::test]
async fn test_arxiv_harvest_fails_without_partial_output() {
    let mut server = Server::new_async().await;
    let dir = TempDir::new().unwrap();

    let _page = server
        .mock("GET", "/")
        .match_query(Matcher::Any)
        .with_body(results_page(&["2101.00001"], None))
        .create_async()
        .await;
    let api = server
        .mock("GET", "/api/query")
        .match_query(Matcher::Any)
        .with_status(503)
        .expect(3)
        .create_async()
        .await;

    let mut config = test_config(&server, &dir);
    config.arxiv.query = Some("spin".to_string());

    let result = run_arxiv(&config).await;

    assert!(result.is_err());
    api.assert_async().await;
    assert!(!config.arxiv.output.exists());
}

#[tokio::test]
async fn test_enrichment_batches_preserve_order() {
    let mut server = Server::new_async().await;
    let ids: Vec<ArxivId> = ["2101.00001", "2101.00002", "2101.00003", "2101.00004", "2101.00005"]
        .iter()
        .map(|id| ArxivId::parse(id).unwrap())
        .collect();

    let mut mocks = Vec::new();
    for batch in [
        vec!["2101.00001", "2101.00002"],
        vec!["2101.00003", "2101.00004"],
        vec!["2101.00005"],
    ] {
        let mock = server
            .mock("GET", "/api/query")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("id_list".into(), batch.join(",")),
                Matcher::UrlEncoded("max_results".into(), batch.len().to_string()),
            ]))
            .with_body(feed(&batch))
            .expect(1)
            .create_async()
            .await;
        mocks.push(mock);
    }

    let source = ArxivSource::new(
        HttpClient::new().unwrap(),
        Url::parse(&format!("{}/api/query", server.url())).unwrap(),
    )
    .batch_size(2)
    .batch_delay(Duration::ZERO);

    let mut diagnostics = Diagnostics::new();
    let records = source.fetch_metadata(&ids, &mut diagnostics).await.unwrap();

    for mock in &mocks {
        mock.assert_async().await;
    }
    let received: Vec<&ArxivId> = records
        .iter()
        .map(|r| r.identifier.as_ref().unwrap())
        .collect();
    assert_eq!(received, ids.iter().collect::<Vec<_>>());
    assert_eq!(records[4].title.as_deref(), Some("Paper 2101.00005"));
}

// ========== Zotero pipeline ==========

#[tokio::test]
async fn test_zotero_round_trip() {
    let mut server = Server::new_async().await;
    let dir = TempDir::new().unwrap();

    let items = json!([
        zotero_item("P1", "preprint", json!({
            "title": "Title",
            "creators": [{"creatorType": "author", "firstName": "Jane", "lastName": "Doe"}],
            "date": "2023-04-01",
            "DOI": "10.1/x",
            "repository": "Repo",
            "archiveID": "1234",
            "tags": []
        })),
        zotero_item("J1", "journalArticle", json!({
            "title": "Article",
            "creators": [
                {"creatorType": "author", "firstName": "Alan", "lastName": "Smith"},
                {"creatorType": "author", "firstName": "Beth", "lastName": "Jones"}
            ],
            "date": "2022",
            "DOI": "10.2/y",
            "journalAbbreviation": "Phys. Rev. A",
            "volume": "5",
            "pages": "10-20",
            "tags": []
        })),
        zotero_item("A1", "attachment", json!({
            "title": "Full Text PDF",
            "contentType": "application/pdf",
            "tags": []
        })),
    ]);
    let (first, last) = mock_library(&mut server, items).await;

    let mut config = test_config(&server, &dir);
    config.zotero.exclude_item_types = vec!["attachment".to_string()];

    let report = run_zotero(&config).await.unwrap();

    first.assert_async().await;
    last.assert_async().await;

    let document = std::fs::read_to_string(&config.zotero.output).unwrap();
    assert_eq!(
        all_items_section(&document),
        vec![
            "<li>J. Doe<br><strong>Title.<br><a href=\"https://doi.org/10.1/x\" target=\"_blank\" rel=\"noreferrer\">Repo1234 (2023)</a></strong></li>",
            "<li>A. Smith, B. Jones<br><strong>Article.<br><a href=\"https://doi.org/10.2/y\" target=\"_blank\" rel=\"noreferrer\">Phys. Rev. A Vol. 5, 10-20 (2022)</a></strong></li>",
        ]
    );

    assert_eq!(report.records, 2);
    assert_eq!(report.diagnostics.len(), 1);
    let filtered: Vec<_> = report
        .diagnostics
        .of_kind(DiagnosticKind::FilteredItem)
        .collect();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].position, Some(2));
    assert!(filtered[0].message.contains("Full Text PDF"));
}

#[tokio::test]
async fn test_zotero_tag_sections() {
    let mut server = Server::new_async().await;
    let dir = TempDir::new().unwrap();

    let item = |key: &str, title: &str, tags: &[&str]| {
        zotero_item(key, "preprint", json!({
            "title": title,
            "creators": [{"creatorType": "author", "name": "Collaboration"}],
            "date": "2020-01-01",
            "repository": "arXiv",
            "archiveID": format!(":{}", key),
            "tags": tags.iter().map(|t| json!({"tag": t})).collect::<Vec<_>>()
        }))
    };
    let items = json!([
        item("K1", "First", &["X", "other"]),
        item("K2", "Second", &["x"]),
        item("K3", "Third", &["X"]),
        item("K4", "Fourth", &[]),
    ]);
    let _mocks = mock_library(&mut server, items).await;

    let mut config = test_config(&server, &dir);
    config.zotero.sections = vec![
        TagSection::new("X-only", "X"),
        TagSection::new("Y-only", "Y"),
    ];

    let report = run_zotero(&config).await.unwrap();
    assert!(report.diagnostics.is_empty());

    let document = std::fs::read_to_string(&config.zotero.output).unwrap();
    assert_eq!(all_items_section(&document).len(), 4);

    let x_only = section(&document, "X-only");
    assert_eq!(x_only.len(), 2);
    assert!(x_only[0].contains("First."));
    assert!(x_only[1].contains("Third."));

    assert!(section(&document, "Y-only").is_empty());
}

#[tokio::test]
async fn test_zotero_article_without_pages() {
    let mut server = Server::new_async().await;
    let dir = TempDir::new().unwrap();

    let items = json!([zotero_item("J1", "journalArticle", json!({
        "title": "Pageless",
        "creators": [{"creatorType": "author", "firstName": "Jane", "lastName": "Doe"}],
        "date": "2024-02-02",
        "journalAbbreviation": "Nat. Phys.",
        "volume": "20",
        "pages": "",
        "tags": [{"tag": "X"}]
    }))]);
    let _mocks = mock_library(&mut server, items).await;

    let mut config = test_config(&server, &dir);
    config.zotero.sections = vec![TagSection::new("X-only", "X")];

    let report = run_zotero(&config).await.unwrap();

    let document = std::fs::read_to_string(&config.zotero.output).unwrap();
    assert_eq!(
        all_items_section(&document),
        vec!["<li>J. Doe<br><strong>Pageless.<br>Nat. Phys. Vol. 20, (2024)</strong></li>"]
    );
    assert_eq!(section(&document, "X-only").len(), 1);

    // Listed twice, reported once
    assert_eq!(report.diagnostics.len(), 1);
    let diagnostic = report.diagnostics.iter().next().unwrap();
    assert_eq!(diagnostic.kind, DiagnosticKind::MissingTrailer);
    assert!(diagnostic.message.contains("Pageless"));
}

#[tokio::test]
async fn test_zotero_reports_quality_problems() {
    let mut server = Server::new_async().await;
    let dir = TempDir::new().unwrap();

    let items = json!([
        zotero_item("N1", "note", json!({"note": "<p>hi</p>", "tags": []})),
        zotero_item("B1", "book", json!({
            "title": "Hidden\u{200B}space",
            "creators": [],
            "tags": []
        })),
    ]);
    let _mocks = mock_library(&mut server, items).await;

    let config = test_config(&server, &dir);
    let report = run_zotero(&config).await.unwrap();

    assert_eq!(report.records, 1);
    assert_eq!(report.diagnostics.count(DiagnosticKind::FilteredItem), 1);
    assert_eq!(report.diagnostics.count(DiagnosticKind::MissingField), 1);
    assert_eq!(report.diagnostics.count(DiagnosticKind::InvisibleCharacter), 1);

    let missing = report
        .diagnostics
        .of_kind(DiagnosticKind::MissingField)
        .next()
        .unwrap();
    assert!(missing.message.ends_with("creators, date"));

    // Advisory only: the title is rendered untouched
    let document = std::fs::read_to_string(&config.zotero.output).unwrap();
    assert!(document.contains("Hidden\u{200B}space."));
}

#[tokio::test]
async fn test_zotero_http_failure_is_fatal() {
    let mut server = Server::new_async().await;
    let dir = TempDir::new().unwrap();

    let _mock = server
        .mock("GET", "/groups/5693788/items")
        .match_query(Matcher::Any)
        .with_status(403)
        .create_async()
        .await;

    let config = test_config(&server, &dir);
    let result = run_zotero(&config).await;

    assert!(result.is_err());
    assert!(!config.zotero.output.exists());
}
