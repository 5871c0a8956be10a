use harvest::crawler::{CrawlerConfig, Storage, StorageConfig};
use harvest::harvest::{HarvestRequest, Harvester};
use harvest::Error;
use mockito::{Matcher, Server, ServerGuard};
use tempfile::TempDir;

const HOME: &str = r#"<html><head><title>Energy</title></head><body>
<nav><a href="/menu">Menu</a></nav>
<main>
  <h1>Renewable energy policy explained</h1>
  <p>Governments use carbon pricing and subsidies to speed up the shift to renewable energy.</p>
  <a href="/a">Carbon markets</a>
  <a href="/b">Broken page</a>
  <a href="https://elsewhere.example/">Elsewhere</a>
</main>
<footer>Copyright notice for the whole site</footer>
</body></html>"#;

const ARTICLE: &str = r#"<html><body><article>
  <p>Carbon markets let companies trade permits for a fixed total amount of emissions.</p>
  <a href="/">Back home</a>
</article></body></html>"#;

async fn site() -> ServerGuard {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(HOME)
        .create_async()
        .await;
    server
        .mock("GET", "/a")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(ARTICLE)
        .create_async()
        .await;
    server
        .mock("GET", "/b")
        .with_status(500)
        .create_async()
        .await;
    server
}

fn storage(dir: &TempDir) -> Storage {
    Storage::with_config(StorageConfig {
        base_path: dir.path().join("corpus"),
    })
}

fn request() -> HarvestRequest {
    HarvestRequest::new(
        "climate policy",
        vec!["renewable".to_string(), "carbon".to_string()],
    )
}

#[tokio::test]
async fn test_harvest_over_http() {
    let server = site().await;
    let dir = TempDir::new().unwrap();
    let config = CrawlerConfig::builder()
        .use_browser(false)
        .rate_limit_ms(0)
        .build();
    let harvester = Harvester::new(config, storage(&dir)).unwrap();

    let response = harvester
        .harvest_seeds(&request(), vec![server.url()])
        .await
        .unwrap();

    let root = format!("{}/", server.url());
    assert_eq!(response.pages_scraped, 2);
    assert_eq!(response.urls, vec![root.clone(), format!("{root}a")]);

    let records = harvester
        .storage()
        .load(&response.corpus_file_path)
        .await
        .unwrap();
    assert_eq!(records.len(), 2);
    assert!(records[0].content.contains("Renewable energy policy explained"));
    assert!(records[0].content.contains("carbon pricing"));
    assert!(!records[0].content.contains("Copyright"));
    assert!(records[1].content.contains("Carbon markets let companies"));

    let total: usize = records.iter().map(|r| r.content.chars().count()).sum();
    assert_eq!(response.total_content_length, total);

    let text = std::fs::read_to_string(&response.corpus_file_path).unwrap();
    assert!(text.starts_with(&format!("URL: {root}\n{}\n", "=".repeat(50))));
}

#[tokio::test]
async fn test_missing_browser_falls_back_to_http() {
    let server = site().await;
    let dir = TempDir::new().unwrap();
    let config = CrawlerConfig::builder()
        .chrome_executable("/nonexistent/harvest/chrome")
        .rate_limit_ms(0)
        .build();
    let harvester = Harvester::new(config, storage(&dir)).unwrap();

    let response = harvester
        .harvest_seeds(&request(), vec![server.url()])
        .await
        .unwrap();
    assert_eq!(response.pages_scraped, 2);
    harvester.shutdown().await;
}

#[tokio::test]
async fn test_server_errors_yield_no_relevant_content() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", Matcher::Any)
        .with_status(500)
        .create_async()
        .await;
    let dir = TempDir::new().unwrap();
    let config = CrawlerConfig::builder()
        .use_browser(false)
        .rate_limit_ms(0)
        .build();
    let harvester = Harvester::new(config, storage(&dir)).unwrap();

    let result = harvester
        .harvest_seeds(
            &request(),
            vec![server.url(), format!("{}/other", server.url())],
        )
        .await;

    match result {
        Err(Error::NoRelevantContent {
            visited,
            last_error,
        }) => {
            assert_eq!(visited, 2);
            assert!(last_error.unwrap().contains("500"));
        }
        other => panic!("Expected NoRelevantContent, got {:?}", other),
    }
    assert!(!dir.path().join("corpus").exists());
}
