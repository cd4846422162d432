//! Fetch with a local headless Chrome session.
//!
//! Each fetch launches an isolated browser (own profile directory, optional
//! upstream proxy), hides the usual automation markers, navigates, and waits
//! for a content marker or the render deadline before capturing the DOM. The
//! session is released on every exit path: [`BrowserSession::close`] runs
//! after the page work regardless of its outcome, and `Drop` covers panics
//! and cancelled futures.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chromiumoxide::auth::Credentials;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;

use super::{FetchResult, FetchStrategy};
use crate::error::ScraperError;
use crate::proxy::ProxyEntry;

const MARKER_POLL_INTERVAL: Duration = Duration::from_millis(250);
const PROCESS_REAP_TIMEOUT: Duration = Duration::from_secs(5);

const STEALTH_LAUNCH_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-features=IsolateOrigins,site-per-process",
    "--disable-infobars",
    "--lang=en-US,en",
    "--window-size=1366,768",
];

const STEALTH_INIT_SCRIPT: &str = r"
    Object.defineProperty(navigator, 'webdriver', { get: () => undefined, configurable: true });
    if (!window.chrome) { window.chrome = { runtime: {} }; }
    Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'], configurable: true });
    Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5], configurable: true });
    delete window.__playwright;
    delete window.callPhantom;
    delete window._phantom;
    delete window.domAutomation;
    delete window.domAutomationController;
";

#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub user_agent: String,
    /// Upper bound on navigation plus marker wait.
    pub render_wait_secs: u64,
    /// CSS selector whose presence means the listing has rendered.
    pub content_marker: String,
    pub chrome_path: Option<PathBuf>,
    pub headless: bool,
}

pub struct BrowserFetch {
    options: BrowserOptions,
}

impl BrowserFetch {
    #[must_use]
    pub fn new(options: BrowserOptions) -> Self {
        Self { options }
    }

    fn config(
        &self,
        proxy: Option<&ProxyEntry>,
        profile_dir: &Path,
    ) -> Result<BrowserConfig, String> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .user_data_dir(profile_dir)
            .request_timeout(Duration::from_secs(self.options.render_wait_secs))
            .arg(format!("--user-agent={}", self.options.user_agent));

        if !self.options.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.options.chrome_path {
            builder = builder.chrome_executable(path);
        }
        for arg in STEALTH_LAUNCH_ARGS {
            builder = builder.arg(*arg);
        }
        if let Some(entry) = proxy {
            builder = builder.arg(format!("--proxy-server={}", entry.url()));
        }
        builder.build()
    }

    /// Page work inside an open session. Never closes the session itself.
    async fn render(
        &self,
        session: &BrowserSession,
        target_url: &str,
        proxy: Option<&ProxyEntry>,
    ) -> Result<FetchResult, ScraperError> {
        let browser_err = |e: chromiumoxide::error::CdpError| ScraperError::Browser {
            url: target_url.to_owned(),
            reason: e.to_string(),
        };

        let page = session
            .browser()
            .new_page("about:blank")
            .await
            .map_err(browser_err)?;
        page.evaluate_on_new_document(STEALTH_INIT_SCRIPT)
            .await
            .map_err(browser_err)?;

        if let Some((username, password)) = proxy.and_then(ProxyEntry::credentials) {
            page.authenticate(Credentials {
                username: username.to_owned(),
                password: password.to_owned(),
            })
            .await
            .map_err(browser_err)?;
        }

        let wait = Duration::from_secs(self.options.render_wait_secs);
        let navigation = async {
            page.goto(target_url).await?;
            wait_for_marker(&page, &self.options.content_marker).await;
            Ok::<(), chromiumoxide::error::CdpError>(())
        };
        match tokio::time::timeout(wait, navigation).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(browser_err(e)),
            Err(_) => tracing::debug!(
                target_url,
                wait_secs = self.options.render_wait_secs,
                marker = %self.options.content_marker,
                "render wait elapsed before content marker appeared; capturing anyway"
            ),
        }

        let content = page.content().await.map_err(browser_err)?;
        let final_url = page
            .url()
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| target_url.to_owned());

        Ok(FetchResult::inspect(content, final_url))
    }
}

async fn wait_for_marker(page: &Page, marker: &str) {
    loop {
        if page.find_element(marker).await.is_ok() {
            return;
        }
        tokio::time::sleep(MARKER_POLL_INTERVAL).await;
    }
}

impl FetchStrategy for BrowserFetch {
    fn name(&self) -> &'static str {
        "browser"
    }

    async fn fetch(
        &self,
        target_url: &str,
        proxy: Option<&ProxyEntry>,
    ) -> Result<FetchResult, ScraperError> {
        let profile_dir =
            std::env::temp_dir().join(format!("shopscope-chrome-{:016x}", rand::random::<u64>()));
        let config = self
            .config(proxy, &profile_dir)
            .map_err(|reason| ScraperError::Browser {
                url: target_url.to_owned(),
                reason,
            })?;

        let session = BrowserSession::launch(config, profile_dir)
            .await
            .map_err(|e| ScraperError::Browser {
                url: target_url.to_owned(),
                reason: format!("launch failed: {e}"),
            })?;

        let outcome = self.render(&session, target_url, proxy).await;
        session.close().await;
        outcome
    }
}

/// A launched browser plus its CDP event pump.
struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    profile_dir: PathBuf,
    closed: bool,
}

impl BrowserSession {
    async fn launch(
        config: BrowserConfig,
        profile_dir: PathBuf,
    ) -> Result<Self, chromiumoxide::error::CdpError> {
        let (browser, mut handler) = Browser::launch(config).await?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::trace!(error = %e, "browser handler event error");
                }
            }
        });
        Ok(Self {
            browser,
            handler,
            profile_dir,
            closed: false,
        })
    }

    fn browser(&self) -> &Browser {
        &self.browser
    }

    /// Graceful shutdown: close the browser, reap the process, stop the
    /// event pump, and remove the profile directory.
    async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            tracing::debug!(error = %e, "browser close command failed");
        }
        match tokio::time::timeout(PROCESS_REAP_TIMEOUT, self.browser.wait()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => tracing::debug!(error = %e, "failed to reap browser process"),
            Err(_) => tracing::warn!("browser process did not exit in time; killing on drop"),
        }
        self.handler.abort();
        if let Err(e) = tokio::fs::remove_dir_all(&self.profile_dir).await {
            tracing::trace!(error = %e, "profile dir cleanup skipped");
        }
        self.closed = true;
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        // Without close() this is a panic or a cancelled fetch. The `Browser`
        // field kills its child process when dropped; the pump task has to be
        // stopped here.
        if !self.closed {
            tracing::debug!("browser session dropped without close; forcing shutdown");
        }
        self.handler.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(chrome_path: &str) -> BrowserOptions {
        BrowserOptions {
            user_agent: "Mozilla/5.0 (test)".to_owned(),
            render_wait_secs: 15,
            content_marker: "h1".to_owned(),
            chrome_path: Some(PathBuf::from(chrome_path)),
            headless: true,
        }
    }

    #[tokio::test]
    async fn launch_failure_is_a_browser_error() {
        let fetcher = BrowserFetch::new(options("/nonexistent/shopscope/chrome"));
        let result = fetcher
            .fetch("https://www.etsy.com/listing/1/mug", None)
            .await;

        match result {
            Err(e @ ScraperError::Browser { .. }) => assert!(e.is_retriable()),
            other => panic!("expected Browser error, got {other:?}"),
        }
    }

    #[test]
    fn stealth_args_hide_automation() {
        assert!(STEALTH_LAUNCH_ARGS.contains(&"--disable-blink-features=AutomationControlled"));
        assert!(STEALTH_INIT_SCRIPT.contains("webdriver"));
    }
}
