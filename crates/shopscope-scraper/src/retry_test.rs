use super::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use shopscope_core::ConfigError;

use crate::proxy::ProxyEntry;

/// Strategy stub whose outcome is decided by a script over the 0-based call
/// index. Records the proxy host used on each call.
struct ScriptedFetch {
    calls: Arc<AtomicU32>,
    proxies: Mutex<Vec<Option<String>>>,
    script: fn(u32) -> Result<FetchResult, ScraperError>,
}

impl ScriptedFetch {
    fn new(script: fn(u32) -> Result<FetchResult, ScraperError>) -> Self {
        Self {
            calls: Arc::new(AtomicU32::new(0)),
            proxies: Mutex::new(Vec::new()),
            script,
        }
    }

    fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FetchStrategy for ScriptedFetch {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn fetch(
        &self,
        _target_url: &str,
        proxy: Option<&ProxyEntry>,
    ) -> Result<FetchResult, ScraperError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.proxies
            .lock()
            .unwrap()
            .push(proxy.map(|p| p.host.clone()));
        (self.script)(n)
    }
}

const URL: &str = "https://www.etsy.com/listing/42/mug";

fn page(body: &str) -> FetchResult {
    FetchResult::inspect(body.to_owned(), URL.to_owned())
}

fn blocked_page() -> FetchResult {
    page("<html><head><title>Just a moment...</title></head><body></body></html>")
}

fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        backoff_base_ms: 0,
        max_delay_ms: 0,
    }
}

#[tokio::test]
async fn succeeds_on_first_attempt() {
    let stub = ScriptedFetch::new(|_| Ok(page("<h1>Mug</h1>")));
    let result = fetch_with_retry(
        &stub,
        &ProxyPool::empty(),
        URL,
        &fast_policy(3),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(result.attempt, 1);
    assert_eq!(stub.call_count(), 1);
}

#[tokio::test]
async fn blocked_twice_then_success_makes_exactly_three_attempts() {
    let stub = ScriptedFetch::new(|n| {
        if n < 2 {
            Ok(blocked_page())
        } else {
            Ok(page("<h1>Ceramic Mug</h1>"))
        }
    });
    let result = fetch_with_retry(
        &stub,
        &ProxyPool::empty(),
        URL,
        &fast_policy(3),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert!(!result.blocked);
    assert!(result.raw_content.contains("Ceramic Mug"));
    assert_eq!(result.attempt, 3);
    assert_eq!(stub.call_count(), 3);
}

#[tokio::test]
async fn always_blocked_yields_bot_blocked_after_max_attempts() {
    let stub = ScriptedFetch::new(|_| Ok(blocked_page()));
    let result = fetch_with_retry(
        &stub,
        &ProxyPool::empty(),
        URL,
        &fast_policy(3),
        &CancellationToken::new(),
    )
    .await;

    assert!(
        matches!(result, Err(ScraperError::BotBlocked { .. })),
        "expected BotBlocked, got: {result:?}"
    );
    assert_eq!(stub.call_count(), 3);
}

#[tokio::test]
async fn propagates_last_error_after_exhausting_attempts() {
    let stub = ScriptedFetch::new(|n| {
        if n == 0 {
            Ok(blocked_page())
        } else {
            Err(ScraperError::UnexpectedStatus {
                status: 503,
                url: URL.to_owned(),
            })
        }
    });
    let result = fetch_with_retry(
        &stub,
        &ProxyPool::empty(),
        URL,
        &fast_policy(2),
        &CancellationToken::new(),
    )
    .await;

    assert!(matches!(
        result,
        Err(ScraperError::UnexpectedStatus { status: 503, .. })
    ));
    assert_eq!(stub.call_count(), 2);
}

#[tokio::test]
async fn does_not_retry_config_error() {
    let stub = ScriptedFetch::new(|_| {
        Err(ScraperError::Config(ConfigError::MissingCredential(
            "SCRAPER_API_KEY".to_owned(),
        )))
    });
    let result = fetch_with_retry(
        &stub,
        &ProxyPool::empty(),
        URL,
        &fast_policy(5),
        &CancellationToken::new(),
    )
    .await;

    assert!(matches!(result, Err(ScraperError::Config(_))));
    assert_eq!(stub.call_count(), 1);
}

#[tokio::test]
async fn does_not_retry_plain_not_found() {
    let stub = ScriptedFetch::new(|_| {
        Err(ScraperError::UnexpectedStatus {
            status: 404,
            url: URL.to_owned(),
        })
    });
    let result = fetch_with_retry(
        &stub,
        &ProxyPool::empty(),
        URL,
        &fast_policy(3),
        &CancellationToken::new(),
    )
    .await;

    assert!(matches!(
        result,
        Err(ScraperError::UnexpectedStatus { status: 404, .. })
    ));
    assert_eq!(stub.call_count(), 1);
}

#[tokio::test]
async fn zero_max_attempts_still_tries_once() {
    let stub = ScriptedFetch::new(|_| Ok(blocked_page()));
    let _ = fetch_with_retry(
        &stub,
        &ProxyPool::empty(),
        URL,
        &fast_policy(0),
        &CancellationToken::new(),
    )
    .await;
    assert_eq!(stub.call_count(), 1);
}

#[tokio::test]
async fn draws_a_proxy_on_every_attempt() {
    let pool = ProxyPool::parse("10.0.0.1:8080\n10.0.0.2:8080:user:pass\n");
    let stub = ScriptedFetch::new(|_| Ok(blocked_page()));
    let _ = fetch_with_retry(
        &stub,
        &pool,
        URL,
        &fast_policy(4),
        &CancellationToken::new(),
    )
    .await;

    let seen = stub.proxies.lock().unwrap().clone();
    assert_eq!(seen.len(), 4);
    for host in seen {
        let host = host.expect("pool is non-empty, a proxy must be used");
        assert!(host == "10.0.0.1" || host == "10.0.0.2", "unexpected host {host}");
    }
}

#[tokio::test]
async fn empty_pool_fetches_directly() {
    let stub = ScriptedFetch::new(|_| Ok(page("<h1>ok</h1>")));
    fetch_with_retry(
        &stub,
        &ProxyPool::empty(),
        URL,
        &fast_policy(1),
        &CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(*stub.proxies.lock().unwrap(), vec![None]);
}

#[tokio::test]
async fn already_cancelled_token_skips_fetch() {
    let stub = ScriptedFetch::new(|_| Ok(page("<h1>ok</h1>")));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = fetch_with_retry(&stub, &ProxyPool::empty(), URL, &fast_policy(3), &cancel).await;

    assert!(matches!(result, Err(ScraperError::Cancelled { .. })));
    assert_eq!(stub.call_count(), 0);
}

#[tokio::test]
async fn cancellation_interrupts_backoff_delay() {
    let stub = ScriptedFetch::new(|_| Ok(blocked_page()));
    let policy = RetryPolicy {
        max_attempts: 3,
        backoff_base_ms: 60_000,
        max_delay_ms: 60_000,
    };
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let result = fetch_with_retry(&stub, &ProxyPool::empty(), URL, &policy, &cancel).await;

    assert!(matches!(result, Err(ScraperError::Cancelled { .. })));
    assert_eq!(stub.call_count(), 1);
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[test]
fn delays_double_and_never_decrease() {
    let policy = RetryPolicy {
        max_attempts: 10,
        backoff_base_ms: 1_000,
        max_delay_ms: 30_000,
    };
    assert_eq!(policy.delay_for(1), Duration::from_millis(1_000));
    assert_eq!(policy.delay_for(2), Duration::from_millis(2_000));
    assert_eq!(policy.delay_for(3), Duration::from_millis(4_000));

    let delays: Vec<Duration> = (1..=40).map(|n| policy.delay_for(n)).collect();
    assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(*delays.last().unwrap(), Duration::from_millis(30_000));
}
