use async_trait::async_trait;
use http::{HeaderMap, StatusCode};
use parking_lot::Mutex;
use serde_json::json;
use spider_engine::middleware::{
    HttpErrorMiddleware, ProxyMiddleware, RequestDeduplicationMiddleware, RetryMiddleware,
    UserAgentMiddleware,
};
use spider_engine::{
    CrawlerBuilder, FakeClock, FetchError, FetchFailure, Fetcher, ParseOutput, Pipeline,
    PipelineError, Request, Response, Spider, SpiderError,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct Page {
    status: u16,
    links: Vec<&'static str>,
}

/// In-memory site. The body of each page lists its links, one per line.
/// Paths listed in `flaky` fail once before answering.
#[derive(Default)]
struct FakeSite {
    pages: HashMap<&'static str, Page>,
    flaky: Mutex<Vec<&'static str>>,
    fetched: Mutex<Vec<Request>>,
}

impl FakeSite {
    fn page(mut self, path: &'static str, status: u16, links: &[&'static str]) -> Self {
        self.pages.insert(
            path,
            Page {
                status,
                links: links.to_vec(),
            },
        );
        self
    }

    fn fails_once(self, path: &'static str) -> Self {
        self.flaky.lock().push(path);
        self
    }

    fn fetched_paths(&self) -> Vec<String> {
        self.fetched
            .lock()
            .iter()
            .map(|r| r.url.path().to_string())
            .collect()
    }
}

#[async_trait]
impl Fetcher for FakeSite {
    async fn fetch(&self, request: Request) -> Result<Response, FetchFailure> {
        self.fetched.lock().push(request.clone());

        let path = request.url.path().to_string();
        {
            let mut flaky = self.flaky.lock();
            if let Some(pos) = flaky.iter().position(|p| *p == path) {
                flaky.remove(pos);
                return Err(FetchFailure::new(
                    request,
                    FetchError::Connect("connection reset".to_string()),
                ));
            }
        }

        match self.pages.get(path.as_str()) {
            Some(page) => Ok(Response::new(
                request,
                StatusCode::from_u16(page.status).unwrap(),
                HeaderMap::new(),
                page.links.join("\n"),
            )),
            None => Err(FetchFailure::new(
                request,
                FetchError::Connect("no route to host".to_string()),
            )),
        }
    }
}

/// Follows every listed link and emits each visited path as an item.
struct LinkSpider {
    start: Vec<&'static str>,
}

#[async_trait]
impl Spider for LinkSpider {
    type Item = String;

    fn start_urls(&self) -> Vec<&'static str> {
        self.start.clone()
    }

    async fn parse(&mut self, response: Response) -> Result<ParseOutput<String>, SpiderError> {
        let mut output = ParseOutput::new();
        output.add_item(response.url().path().to_string());
        for line in response.text().lines().filter(|l| !l.is_empty()) {
            output.add_request(Request::new(response.url().join(line)?));
        }
        Ok(output)
    }
}

#[derive(Clone, Default)]
struct CollectPipeline {
    items: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl Pipeline<String> for CollectPipeline {
    fn name(&self) -> &str {
        "collect"
    }

    async fn process_item(&self, item: String) -> Result<Option<String>, PipelineError> {
        self.items.lock().push(item.clone());
        Ok(Some(item))
    }

    async fn close(&self) -> Result<(), PipelineError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn test_crawl_follows_links_in_paced_batches() {
    init_tracing();

    let site = Arc::new(
        FakeSite::default()
            .page("/", 200, &["/a", "/b", "/a#top", "/missing", "/flaky"])
            .page("/a", 200, &["/c", "/"])
            .page("/b", 200, &[])
            .page("/c", 200, &[])
            .page("/missing", 404, &[])
            .page("/flaky", 200, &[])
            .fails_once("/flaky"),
    );
    let clock = Arc::new(FakeClock::new());
    let pipeline = CollectPipeline::default();

    let crawler = CrawlerBuilder::new(LinkSpider {
        start: vec!["https://example.com/"],
    })
    .concurrency(2)
    .request_delay(Duration::from_secs(2))
    .fetcher(site.clone())
    .clock(clock.clone())
    .add_middleware(RequestDeduplicationMiddleware::new())
    .add_middleware(RetryMiddleware::new(2))
    .add_middleware(HttpErrorMiddleware::new())
    .add_pipeline(pipeline.clone())
    .build()
    .unwrap();
    let stats = crawler.get_stats();

    crawler.start_crawl().await.unwrap();

    // Three batches: the seed, its links, then /c plus the retried /flaky.
    assert_eq!(clock.time_waited(), Duration::from_secs(4));

    let mut fetched = site.fetched_paths();
    fetched.sort();
    assert_eq!(
        fetched,
        vec!["/", "/a", "/b", "/c", "/flaky", "/flaky", "/missing"]
    );

    let mut items = pipeline.items.lock().clone();
    items.sort();
    assert_eq!(items, vec!["/", "/a", "/b", "/c", "/flaky"]);
    assert!(pipeline.closed.load(Ordering::SeqCst));

    assert_eq!(stats.batches_flushed.load(Ordering::SeqCst), 3);
    // The seed, seven discovered links and the re-enqueued /flaky.
    assert_eq!(stats.requests_enqueued.load(Ordering::SeqCst), 9);
    assert_eq!(stats.requests_sent.load(Ordering::SeqCst), 7);
    assert_eq!(stats.requests_retried.load(Ordering::SeqCst), 1);
    // The repeated /a link and the link back to the start page.
    assert_eq!(stats.requests_dropped.load(Ordering::SeqCst), 2);
    assert_eq!(stats.responses_dropped.load(Ordering::SeqCst), 1);
    assert_eq!(stats.status_count(404), 1);
    assert_eq!(stats.items_processed.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_crawl_survives_unhandled_failures_and_parse_errors() {
    init_tracing();

    struct BrokenLinkSpider;

    #[async_trait]
    impl Spider for BrokenLinkSpider {
        type Item = String;

        fn start_urls(&self) -> Vec<&'static str> {
            vec!["https://example.com/", "https://example.com/gone"]
        }

        async fn parse(&mut self, response: Response) -> Result<ParseOutput<String>, SpiderError> {
            Err(SpiderError::GeneralError(format!(
                "cannot parse {}",
                response.url()
            )))
        }
    }

    let site = Arc::new(FakeSite::default().page("/", 200, &[]));
    let clock = Arc::new(FakeClock::new());
    let crawler = CrawlerBuilder::new(BrokenLinkSpider)
        .fetcher(site.clone())
        .clock(clock.clone())
        .build()
        .unwrap();
    let stats = crawler.get_stats();

    crawler.start_crawl().await.unwrap();

    assert_eq!(stats.requests_succeeded.load(Ordering::SeqCst), 1);
    assert_eq!(stats.requests_failed.load(Ordering::SeqCst), 1);
    assert_eq!(stats.items_scraped.load(Ordering::SeqCst), 0);
    assert_eq!(clock.time_waited(), Duration::ZERO);
}

#[tokio::test]
async fn test_request_leg_sets_proxy_and_user_agent_before_fetch() {
    init_tracing();

    let site = Arc::new(
        FakeSite::default()
            .page("/", 200, &[])
            .page("/internal", 200, &[]),
    );
    let proxy = ProxyMiddleware::from_value(json!({
        "*": { "https": "http://proxy.local:3128", "no": ["internal.example.com"] }
    }))
    .unwrap();

    let crawler = CrawlerBuilder::new(LinkSpider {
        start: vec![
            "https://example.com/",
            "https://internal.example.com/internal",
        ],
    })
    .fetcher(site.clone())
    .clock(Arc::new(FakeClock::new()))
    .add_middleware(UserAgentMiddleware::new("test-agent/1.0").unwrap())
    .add_middleware(proxy)
    .build()
    .unwrap();

    crawler.start_crawl().await.unwrap();

    let fetched = site.fetched.lock();
    assert_eq!(fetched.len(), 2);
    for request in fetched.iter() {
        assert_eq!(
            request.headers.get(http::header::USER_AGENT).unwrap(),
            "test-agent/1.0"
        );
        match request.host() {
            Some("example.com") => assert_eq!(
                request.proxy().and_then(|p| p.https()),
                Some("http://proxy.local:3128")
            ),
            Some("internal.example.com") => assert!(request.proxy().is_none()),
            other => panic!("unexpected host {:?}", other),
        }
    }
}

/// Panics on every fetch.
struct PanickingFetcher {
    calls: AtomicUsize,
}

#[async_trait]
impl Fetcher for PanickingFetcher {
    async fn fetch(&self, request: Request) -> Result<Response, FetchFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        panic!("fetcher blew up on {}", request.url);
    }
}

#[tokio::test]
async fn test_crawl_finishes_when_a_fetch_panics() {
    init_tracing();

    let fetcher = Arc::new(PanickingFetcher {
        calls: AtomicUsize::new(0),
    });
    let crawler = CrawlerBuilder::new(LinkSpider {
        start: vec!["https://example.com/"],
    })
    .fetcher(fetcher.clone())
    .clock(Arc::new(FakeClock::new()))
    .add_middleware(RetryMiddleware::new(1))
    .build()
    .unwrap();
    let stats = crawler.get_stats();

    tokio::time::timeout(Duration::from_secs(5), crawler.start_crawl())
        .await
        .expect("crawl hung after a fetch panicked")
        .unwrap();

    // The first panic is retried once, the second gives up.
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    assert_eq!(stats.requests_sent.load(Ordering::SeqCst), 2);
    assert_eq!(stats.requests_retried.load(Ordering::SeqCst), 1);
    assert_eq!(stats.requests_failed.load(Ordering::SeqCst), 1);
    assert_eq!(stats.requests_succeeded.load(Ordering::SeqCst), 0);
}
