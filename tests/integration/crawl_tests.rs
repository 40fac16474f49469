//! Integration tests for the crawler
//!
//! Most tests drive the crawl loop with an in-process page source so page
//! contents and failures can be scripted exactly. The session tests at the
//! bottom use wiremock to exercise the real fetcher end-to-end.

use async_trait::async_trait;
use otomoto_scraper::config::Config;
use otomoto_scraper::crawler::{run_session, CrawlOptions, Crawler, PageSource};
use otomoto_scraper::listing::{Extractor, ListingRecord};
use otomoto_scraper::storage::{JsonlStorage, RecordSink, StorageError, StorageResult};
use otomoto_scraper::trigger::{handle_scheduled, InvocationContext, TriggerStatus};
use otomoto_scraper::ScraperError;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const START_URL: &str = "https://www.otomoto.pl/osobowe/bmw/seria-5";

const EMPTY_PAGE: &str = r#"<!DOCTYPE html>
<html><body>
    <div class="ooa-1hab6wx er8sc6m0">
        <!-- no listings -->
    </div>
</body></html>"#;

fn sample_page() -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/sample_page.html");
    std::fs::read_to_string(&path).expect("Failed to read sample page fixture")
}

type Responder = Box<dyn Fn(u32) -> Result<String, ScraperError> + Send + Sync>;

/// Page source answering by page number and remembering requested URLs
struct ScriptedSource {
    responder: Responder,
    requested: Arc<Mutex<Vec<String>>>,
}

impl ScriptedSource {
    fn new(
        responder: impl Fn(u32) -> Result<String, ScraperError> + Send + Sync + 'static,
    ) -> (Self, Arc<Mutex<Vec<String>>>) {
        let requested = Arc::new(Mutex::new(Vec::new()));
        let source = Self {
            responder: Box::new(responder),
            requested: Arc::clone(&requested),
        };
        (source, requested)
    }

    fn always(markup: String) -> (Self, Arc<Mutex<Vec<String>>>) {
        Self::new(move |_| Ok(markup.clone()))
    }
}

#[async_trait]
impl PageSource for ScriptedSource {
    async fn fetch_page(&self, url: &str) -> Result<String, ScraperError> {
        let mut requested = self.requested.lock().unwrap();
        requested.push(url.to_string());
        let page = requested.len() as u32;
        drop(requested);
        (self.responder)(page)
    }
}

/// Sink keeping every saved batch in memory
#[derive(Default)]
struct MemorySink {
    batches: Vec<Vec<ListingRecord>>,
}

impl MemorySink {
    fn saved(&self) -> Vec<&ListingRecord> {
        self.batches.iter().flatten().collect()
    }
}

impl RecordSink for MemorySink {
    fn save(&mut self, records: &[ListingRecord]) -> StorageResult<PathBuf> {
        self.batches.push(records.to_vec());
        Ok(PathBuf::from("memory"))
    }
}

/// Sink that refuses every write
struct BrokenSink;

impl RecordSink for BrokenSink {
    fn save(&mut self, _records: &[ListingRecord]) -> StorageResult<PathBuf> {
        Err(StorageError::Write {
            path: PathBuf::from("/dev/full"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        })
    }
}

fn options(max_pages: u32, stop_on_empty: bool) -> CrawlOptions {
    CrawlOptions {
        max_pages,
        delay: Duration::ZERO,
        stop_on_empty,
    }
}

fn exhausted(page: u32) -> ScraperError {
    ScraperError::FetchExhausted {
        url: format!("{}?page={}", START_URL, page),
        attempts: 3,
        reason: "HTTP 503".to_string(),
    }
}

fn assert_first_listing(record: &ListingRecord) {
    assert_eq!(record.id, "6FRsVn");
    assert_eq!(record.brand, "BMW");
    assert_eq!(record.model, "Seria 5 530i xDrive");
    assert_eq!(record.year, 2021);
    assert_eq!(record.price, 239900.0);
    assert_eq!(record.currency.as_deref(), Some("PLN"));
    assert_eq!(record.engine_capacity_cc, Some(1998.0));
    assert_eq!(record.engine_power, Some(252));
    assert_eq!(record.mileage_km, Some(45275));
    assert_eq!(record.location.as_deref(), Some("Warszawa, Mokotów"));
    assert_eq!(record.fuel_type.as_deref(), Some("Benzyna"));
}

#[test]
fn test_extract_sample_page() {
    let records = Extractor::new().unwrap().extract(&sample_page(), START_URL);
    assert_eq!(records.len(), 2);

    assert_first_listing(&records[0]);
    assert_eq!(
        records[0].url,
        "https://www.otomoto.pl/osobowe/oferta/bmw-seria-5-530i-xdrive-ID6FRsVn.html"
    );

    let second = &records[1];
    assert_eq!(second.id, "6FRt2m");
    assert_eq!(
        second.url,
        "https://www.otomoto.pl/osobowe/oferta/bmw-seria-5-520d-comfort-ID6FRt2m.html"
    );
    assert_eq!(second.model, "Seria 5 520d Comfort");
    assert_eq!(second.year, 2020);
    assert_eq!(second.price, 159900.0);
    assert_eq!(second.engine_capacity_cc, Some(1995.0));
    assert_eq!(second.engine_power, Some(190));
    assert_eq!(second.mileage_km, Some(120000));
    assert_eq!(second.location.as_deref(), Some("Kraków, Krowodrza"));
    assert_eq!(second.fuel_type.as_deref(), Some("Diesel"));
}

#[tokio::test]
async fn test_single_page_run_persists_jsonl() {
    let dir = tempfile::tempdir().unwrap();
    let storage = JsonlStorage::new(dir.path(), "all_offers.jsonl").unwrap();
    let (source, _) = ScriptedSource::always(sample_page());

    let mut crawler = Crawler::new(source, Extractor::new().unwrap(), storage);
    let records = crawler.run(START_URL, &options(1, true)).await.unwrap();

    assert_eq!(records.len(), 2);
    assert_first_listing(&records[0]);

    let content = std::fs::read_to_string(dir.path().join("all_offers.jsonl")).unwrap();
    let saved: Vec<ListingRecord> = content
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    assert_eq!(saved.len(), 2);
    assert_eq!(saved, records);
}

#[tokio::test]
async fn test_repeated_pages_are_deduplicated() {
    let (one_page_source, _) = ScriptedSource::always(sample_page());
    let mut one_page = Crawler::new(
        one_page_source,
        Extractor::new().unwrap(),
        MemorySink::default(),
    );
    let single = one_page.run(START_URL, &options(1, false)).await.unwrap();

    let (source, requested) = ScriptedSource::always(sample_page());
    let mut crawler = Crawler::new(source, Extractor::new().unwrap(), MemorySink::default());
    let records = crawler.run(START_URL, &options(3, false)).await.unwrap();

    assert_eq!(records.len(), single.len());
    assert_eq!(requested.lock().unwrap().len(), 3);

    let saved = crawler.sink().saved();
    assert_eq!(saved.len(), 2);
    assert_eq!(crawler.sink().batches.len(), 1);

    let ids: Vec<&str> = saved.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["6FRsVn", "6FRt2m"]);
}

#[tokio::test]
async fn test_page_urls_follow_query_string() {
    let (source, requested) = ScriptedSource::always(sample_page());
    let mut crawler = Crawler::new(source, Extractor::new().unwrap(), MemorySink::default());
    crawler.run(START_URL, &options(3, false)).await.unwrap();

    assert_eq!(
        *requested.lock().unwrap(),
        vec![
            START_URL.to_string(),
            format!("{}?page=2", START_URL),
            format!("{}?page=3", START_URL),
        ]
    );

    let (source, requested) = ScriptedSource::always(sample_page());
    let mut crawler = Crawler::new(source, Extractor::new().unwrap(), MemorySink::default());
    let filtered = format!("{}?search[order]=created_at", START_URL);
    crawler.run(&filtered, &options(2, false)).await.unwrap();

    assert_eq!(
        requested.lock().unwrap()[1],
        format!("{}&page=2", filtered)
    );
}

#[tokio::test]
async fn test_empty_page_stops_run() {
    let (source, requested) = ScriptedSource::always(EMPTY_PAGE.to_string());
    let mut crawler = Crawler::new(source, Extractor::new().unwrap(), MemorySink::default());

    let records = crawler.run(START_URL, &options(5, true)).await.unwrap();

    assert!(records.is_empty());
    assert_eq!(requested.lock().unwrap().len(), 1);
    assert!(crawler.sink().batches.is_empty());
}

#[tokio::test]
async fn test_empty_page_without_stop_flag_continues() {
    let (source, requested) = ScriptedSource::always(EMPTY_PAGE.to_string());
    let mut crawler = Crawler::new(source, Extractor::new().unwrap(), MemorySink::default());

    let records = crawler.run(START_URL, &options(4, false)).await.unwrap();

    assert!(records.is_empty());
    assert_eq!(requested.lock().unwrap().len(), 4);
}

#[tokio::test]
async fn test_page_of_seen_listings_does_not_stop_run() {
    let sample = sample_page();
    let (source, requested) = ScriptedSource::new(move |page| match page {
        1 | 2 => Ok(sample.clone()),
        _ => Ok(EMPTY_PAGE.to_string()),
    });
    let mut crawler = Crawler::new(source, Extractor::new().unwrap(), MemorySink::default());

    let records = crawler.run(START_URL, &options(5, true)).await.unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(requested.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_fetch_failure_ends_run_with_collected_records() {
    let sample = sample_page();
    let (source, requested) = ScriptedSource::new(move |page| match page {
        1 => Ok(sample.clone()),
        n => Err(exhausted(n)),
    });
    let mut crawler = Crawler::new(source, Extractor::new().unwrap(), MemorySink::default());

    let records = crawler.run(START_URL, &options(5, true)).await.unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(requested.lock().unwrap().len(), 2);
    assert_eq!(crawler.sink().saved().len(), 2);
}

#[tokio::test]
async fn test_fetch_failure_on_first_page_returns_empty() {
    let (source, _) = ScriptedSource::new(|page| Err(exhausted(page)));
    let mut crawler = Crawler::new(source, Extractor::new().unwrap(), MemorySink::default());

    let records = crawler.run(START_URL, &options(5, true)).await.unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn test_invalid_markup_yields_no_records() {
    let (source, _) = ScriptedSource::always("<not-valid></html>".to_string());
    let mut crawler = Crawler::new(source, Extractor::new().unwrap(), MemorySink::default());

    let records = crawler.run(START_URL, &options(1, false)).await.unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn test_storage_failure_is_reported() {
    let (source, _) = ScriptedSource::always(sample_page());
    let mut crawler = Crawler::new(source, Extractor::new().unwrap(), BrokenSink);

    let result = crawler.run(START_URL, &options(2, true)).await;
    assert!(matches!(result, Err(ScraperError::Storage(_))));
}

/// Config pointing at a mock server, writing into `output_dir`
fn session_config(server: &MockServer, output_dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.crawler.start_url = format!("{}/osobowe/bmw/seria-5", server.uri());
    config.crawler.max_pages = 5;
    config.crawler.delay_ms = 0;
    config.fetcher.max_attempts = 1;
    config.fetcher.retry_backoff_ms = 0;
    config.fetcher.blocked_backoff_ms = 0;
    config.output.directory = Some(output_dir.display().to_string());
    config
}

async fn mount_listing_pages(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/osobowe/bmw/seria-5"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(EMPTY_PAGE))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/osobowe/bmw/seria-5"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(sample_page())
                .insert_header("content-type", "text/html; charset=utf-8"),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_session_over_http() {
    let server = MockServer::start().await;
    mount_listing_pages(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let config = session_config(&server, dir.path());

    let summary = run_session(&config).await.expect("Session failed");

    assert_eq!(summary.records.len(), 2);
    assert_eq!(summary.output_path, dir.path().join("all_offers.jsonl"));

    let content = std::fs::read_to_string(&summary.output_path).unwrap();
    assert_eq!(content.lines().count(), 2);

    // Relative links resolve against the mock server
    assert!(summary.records[1].url.starts_with(&server.uri()));

    // Page 2 was empty, so page 3 was never requested
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
}

#[tokio::test]
async fn test_session_appends_across_runs() {
    let server = MockServer::start().await;
    mount_listing_pages(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let config = session_config(&server, dir.path());

    run_session(&config).await.unwrap();
    let second = run_session(&config).await.unwrap();

    // Dedup is per run only; the file keeps growing
    assert_eq!(second.records.len(), 2);
    let content = std::fs::read_to_string(&second.output_path).unwrap();
    assert_eq!(content.lines().count(), 4);
}

#[tokio::test]
async fn test_session_survives_unreachable_site() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = session_config(&server, dir.path());

    let summary = run_session(&config).await.unwrap();
    assert!(summary.records.is_empty());
    assert!(!summary.output_path.exists());
}

fn test_context() -> InvocationContext {
    InvocationContext {
        request_id: "test-request".to_string(),
        function_name: "otomoto-scraper".to_string(),
        memory_limit_mb: Some(256),
        invoked_at: chrono::Utc::now(),
    }
}

#[tokio::test]
async fn test_scheduled_trigger_success() {
    let server = MockServer::start().await;
    mount_listing_pages(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let config = session_config(&server, dir.path());
    let event = serde_json::json!({"detail-type": "Scheduled Event"});

    let response = handle_scheduled(&event, &test_context(), &config).await;
    assert_eq!(response.status(), TriggerStatus::Success);

    let body: serde_json::Value = serde_json::from_str(&response.body).unwrap();
    assert_eq!(body["message"], "Scraper completed successfully");
    assert_eq!(body["request_id"], "test-request");

    let size = std::fs::metadata(dir.path().join("all_offers.jsonl"))
        .unwrap()
        .len();
    assert_eq!(body["file_size"], size);
}

#[tokio::test]
async fn test_scheduled_trigger_reports_error() {
    let server = MockServer::start().await;
    mount_listing_pages(&server).await;

    // A regular file where the output directory should be
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, "").unwrap();
    let config = session_config(&server, &blocker.join("data"));

    let response = handle_scheduled(&serde_json::json!({}), &test_context(), &config).await;
    assert_eq!(response.status(), TriggerStatus::Error);
    assert_eq!(response.status_code, 500);

    let body: serde_json::Value = serde_json::from_str(&response.body).unwrap();
    assert_eq!(body["message"], "Error running scraper");
    assert!(body["error"].as_str().unwrap().contains("output directory"));
}
