// Headless-Chrome wrapper for the course-content crawl. The course site is
// a JavaScript-rendered single-page app, so every page goes through a real
// browser tab that waits for the article element before capture.

use anyhow::{Context, Result, anyhow};
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Configuration for browser operations
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Timeout for page navigation in seconds
    pub navigation_timeout_seconds: u64,
    /// Settle time after navigation for client-side rendering
    pub render_wait_ms: u64,
    /// Whether to run the browser in headless mode
    pub headless: bool,
    /// Browser window width
    pub window_width: u32,
    /// Browser window height
    pub window_height: u32,
    /// Additional Chrome arguments
    pub chrome_args: Vec<String>,
}

impl Default for BrowserConfig {
    #[inline]
    fn default() -> Self {
        Self {
            navigation_timeout_seconds: 30,
            render_wait_ms: 1000,
            headless: true,
            window_width: 1280,
            window_height: 720,
            chrome_args: vec![
                "--no-sandbox".to_string(),
                "--disable-dev-shm-usage".to_string(),
                "--disable-gpu".to_string(),
                "--disable-extensions".to_string(),
                "--disable-plugins".to_string(),
                "--disable-background-timer-throttling".to_string(),
                "--disable-renderer-backgrounding".to_string(),
                "--disable-backgrounding-occluded-windows".to_string(),
            ],
        }
    }
}

/// Everything captured from one rendered page.
#[derive(Debug, Clone)]
pub struct PageCapture {
    pub title: String,
    pub article_html: String,
    pub links: Vec<String>,
}

/// A single managed browser with one reusable tab.
pub struct CourseBrowser {
    tab: Arc<Tab>,
    config: BrowserConfig,
    // Tabs are closed when the browser instance drops
    _browser: Browser,
}

impl CourseBrowser {
    /// Launch a headless browser instance.
    #[inline]
    pub fn launch(config: BrowserConfig) -> Result<Self> {
        let args: Vec<&OsStr> = config.chrome_args.iter().map(OsStr::new).collect();
        let launch_options = LaunchOptions {
            headless: config.headless,
            window_size: Some((config.window_width, config.window_height)),
            args,
            idle_browser_timeout: Duration::from_secs(config.navigation_timeout_seconds * 10),
            ..Default::default()
        };

        let browser =
            Browser::new(launch_options).with_context(|| "Failed to launch browser instance")?;
        let tab = browser
            .new_tab()
            .with_context(|| "Failed to create browser tab")?;
        tab.set_default_timeout(Duration::from_secs(config.navigation_timeout_seconds));

        Ok(Self {
            tab,
            config,
            _browser: browser,
        })
    }

    /// Navigate to a URL, wait for the article element to render, and
    /// capture its inner HTML plus the page title and all hyperlinks.
    #[inline]
    pub fn open_page(&self, url: &str, article_selector: &str) -> Result<PageCapture> {
        debug!("Navigating to URL: {}", url);

        self.tab
            .navigate_to(url)
            .with_context(|| format!("Failed to navigate to {}", url))?;
        self.tab
            .wait_until_navigated()
            .with_context(|| format!("Navigation to {} did not complete", url))?;

        // Let the SPA route and render before querying the article
        std::thread::sleep(Duration::from_millis(self.config.render_wait_ms));

        self.tab
            .wait_for_element(article_selector)
            .with_context(|| format!("Article element never appeared on {}", url))?;

        let article_html = self
            .eval_string(&format!(
                "document.querySelector('{}').innerHTML",
                article_selector
            ))
            .with_context(|| format!("Failed to read article HTML from {}", url))?;

        let title = self.eval_string("document.title").unwrap_or_default();

        let links: Vec<String> = self
            .eval_string(
                "Array.from(document.querySelectorAll('a[href]')).map(el => el.href).join('\\n')",
            )
            .map(|joined| {
                joined
                    .lines()
                    .filter(|link| !link.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        debug!(
            "Captured {} bytes of article HTML and {} links from {}",
            article_html.len(),
            links.len(),
            url
        );

        Ok(PageCapture {
            title,
            article_html,
            links,
        })
    }

    /// Evaluate a JavaScript expression that yields a string.
    fn eval_string(&self, script: &str) -> Result<String> {
        let result = self
            .tab
            .evaluate(script, false)
            .with_context(|| format!("Failed to execute JavaScript: {}", script))?;

        match result.value {
            Some(serde_json::Value::String(value)) => Ok(value),
            Some(other) => Ok(other.to_string().trim_matches('"').to_string()),
            None => Err(anyhow!("JavaScript returned no value: {}", script)),
        }
    }
}
