use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use pricewatch_core::error::AppError;
use pricewatch_core::models::CrawlResult;
use pricewatch_core::traits::{PageHost, TabId};
use tokio::sync::Mutex;

use crate::parser::ProductPageParser;

/// Page host backed by a real Chromium instance over the DevTools Protocol.
///
/// Product pages are rendered with JavaScript enabled, which the marketplace
/// needs for its price widgets. One Chromium process is shared across clones;
/// each [`TabId`] maps to one browser page that is reused between items.
///
/// ```rust,no_run
/// use pricewatch_client::BrowserPageHost;
/// use pricewatch_core::traits::PageHost;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let host = BrowserPageHost::launch(true).await?;
/// let tab = host.open_blank_tab().await?;
/// host.navigate(tab, "https://www.coupang.com/vp/products/1?vendorItemId=2").await?;
/// let result = host.extract(tab, "sku-1").await?;
/// println!("{:?}", result.price);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct BrowserPageHost {
    browser: Arc<Browser>,
    pages: Arc<Mutex<HashMap<TabId, Page>>>,
    next_tab: Arc<AtomicU64>,
    parser: ProductPageParser,
}

impl BrowserPageHost {
    /// Launch Chromium. `headless = false` opens a visible window, which is
    /// less likely to be served an error page by the marketplace.
    pub async fn launch(headless: bool) -> Result<Self, AppError> {
        let mut builder = BrowserConfig::builder().no_sandbox().disable_default_args();
        if !headless {
            builder = builder.with_head();
        }
        if let Some(bin) = find_chrome_binary() {
            tracing::info!("Using Chrome binary: {}", bin.display());
            builder = builder.chrome_executable(bin);
        }
        if headless {
            builder = builder.arg("--headless=new");
        }

        let config = builder
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-popup-blocking")
            .arg("--no-first-run")
            .build()
            .map_err(|e| AppError::Generic(format!("Browser config error: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AppError::Generic(format!("Failed to launch browser: {e}")))?;

        // The CDP handler must be polled for the connection to work.
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    tracing::warn!("Browser CDP handler error: {event:?}");
                    break;
                }
            }
        });

        Ok(Self {
            browser: Arc::new(browser),
            pages: Arc::new(Mutex::new(HashMap::new())),
            next_tab: Arc::new(AtomicU64::new(1)),
            parser: ProductPageParser::new()?,
        })
    }

    async fn page(&self, tab: TabId) -> Result<Page, AppError> {
        self.pages
            .lock()
            .await
            .get(&tab)
            .cloned()
            .ok_or_else(|| AppError::ExtractionFailed(format!("No tab with id {tab}")))
    }
}

/// Locate a Chrome/Chromium binary, honouring `CHROME_BIN`.
///
/// Returns `None` to let `chromiumoxide` do its own lookup.
fn find_chrome_binary() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("CHROME_BIN") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    [
        "/snap/chromium/current/usr/lib/chromium-browser/chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/google-chrome",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
    ]
    .iter()
    .map(PathBuf::from)
    .find(|p| p.exists())
}

impl PageHost for BrowserPageHost {
    async fn is_tab_alive(&self, tab: TabId) -> bool {
        let Ok(page) = self.page(tab).await else {
            return false;
        };
        if page.url().await.is_ok() {
            return true;
        }
        self.pages.lock().await.remove(&tab);
        false
    }

    async fn open_blank_tab(&self) -> Result<TabId, AppError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| AppError::Generic(format!("Failed to open tab: {e}")))?;
        let tab = TabId(self.next_tab.fetch_add(1, Ordering::Relaxed));
        self.pages.lock().await.insert(tab, page);
        tracing::debug!(%tab, "Opened browser tab");
        Ok(tab)
    }

    async fn navigate(&self, tab: TabId, url: &str) -> Result<(), AppError> {
        let page = self.page(tab).await?;
        // `goto` resolves once the load event fired.
        page.goto(url)
            .await
            .map_err(|e| AppError::ExtractionFailed(format!("Failed to navigate to {url}: {e}")))?;
        Ok(())
    }

    async fn extract(&self, tab: TabId, sku_id: &str) -> Result<CrawlResult, AppError> {
        let page = self.page(tab).await?;
        let html = page
            .content()
            .await
            .map_err(|e| AppError::ExtractionFailed(format!("Failed to read page content: {e}")))?;
        self.parser.parse(&html, sku_id)
    }
}
