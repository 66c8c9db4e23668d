use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions};
use tracing::{debug, info, warn};

use super::traits::PageFetcher;

const ACCEPT_COOKIES_JS: &str = r#"
    const button = document.querySelector('button[id*="accept"], button[id*="godkann"]');
    if (button) button.click();
"#;

/// Renders JS-heavy pages in headless Chrome and returns the final DOM
pub struct BrowserFetcher {
    browser: Browser,
    settle: Duration,
}

impl BrowserFetcher {
    /// Launch a headless browser
    pub fn new() -> Result<Self> {
        info!("Launching headless Chrome...");

        let options = LaunchOptions::default_builder()
            .headless(true)
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;

        Ok(Self {
            browser,
            settle: Duration::from_secs(8),
        })
    }

    /// Time to let client-side rendering finish after navigation
    pub fn with_settle_time(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    fn render(browser: &Browser, url: &str, settle: Duration) -> Result<String> {
        let tab = browser.new_tab()?;

        tab.navigate_to(url)?;
        tab.wait_until_navigated()?;
        thread::sleep(settle);

        if tab.evaluate(ACCEPT_COOKIES_JS, false).is_err() {
            debug!("No cookie banner to dismiss");
        }
        thread::sleep(Duration::from_secs(2));

        let html_result = tab.evaluate("document.documentElement.outerHTML", false)?;
        let html = html_result
            .value
            .as_ref()
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Could not get HTML from {url}"))?;

        if let Err(e) = tab.close(true) {
            warn!(error = %e, "failed to close browser tab");
        }

        Ok(html)
    }
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        // Browser handles are reference counted; the blocking task gets its own.
        let browser = self.browser.clone();
        let settle = self.settle;
        let target = url.to_string();

        let html = tokio::task::spawn_blocking(move || Self::render(&browser, &target, settle))
            .await
            .context("Browser task panicked")??;

        debug!("Rendered {} bytes of HTML from {}", html.len(), url);
        Ok(html)
    }

    fn name(&self) -> &'static str {
        "browser"
    }
}
