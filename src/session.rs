use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions, Tab};
use tracing::{debug, info};

use crate::config::BrowserConfig;
use crate::utils::error::{AutomationError, Result};

/// One live browser and the tab every component works against. The session is
/// passed explicitly wherever element work happens; nothing holds it as a
/// global. Cart state lives in the storefront session and accumulates across
/// terms for as long as this handle is alive.
pub struct BrowserSession {
    // Keeps the Chrome process alive for the lifetime of the session.
    browser: Browser,
    tab: Arc<Tab>,
}

impl BrowserSession {
    pub fn launch(config: &BrowserConfig) -> Result<Self> {
        let mut launch_options = LaunchOptions::default_builder()
            .headless(config.headless)
            .sandbox(false) // Often needed in containerized environments
            .window_size(Some((config.window_width, config.window_height)))
            .args(vec![
                OsStr::new("--no-sandbox"),
                OsStr::new("--disable-dev-shm-usage"),
                OsStr::new("--disable-gpu"),
                OsStr::new("--disable-extensions"),
            ])
            .build()
            .map_err(|e| {
                AutomationError::Browser(format!("Failed to create launch options: {e}"))
            })?;

        // Set Chrome path if provided
        if let Some(chrome_path) = &config.chrome_path {
            launch_options.path = Some(PathBuf::from(chrome_path));
        }

        let browser = Browser::new(launch_options)
            .map_err(|e| AutomationError::Browser(format!("Failed to launch browser: {e}")))?;
        let tab = browser
            .new_tab()
            .map_err(|e| AutomationError::Browser(format!("Failed to create tab: {e}")))?;

        if let Some(user_agent) = &config.user_agent {
            tab.set_user_agent(user_agent, None, None)
                .map_err(|e| AutomationError::Browser(format!("Failed to set user agent: {e}")))?;
        }

        info!(headless = config.headless, "browser session started");
        Ok(Self { browser, tab })
    }

    pub fn tab(&self) -> &Tab {
        &self.tab
    }

    pub fn navigate(&self, url: &str) -> Result<()> {
        self.tab
            .navigate_to(url)
            .map_err(|e| AutomationError::Browser(format!("Navigation failed: {e}")))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| AutomationError::Browser(format!("Page load failed: {e}")))?;
        debug!(url, "navigated");
        Ok(())
    }

    /// Capture the current viewport as PNG, creating parent directories as
    /// needed.
    pub fn screenshot_to(&self, path: &Path) -> Result<()> {
        let screenshot_data = self
            .tab
            .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
            .map_err(|e| AutomationError::Browser(format!("Screenshot capture failed: {e}")))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, screenshot_data)?;
        debug!(path = %path.display(), "screenshot written");
        Ok(())
    }

    pub fn close(self) -> Result<()> {
        // Chrome cleans up when the Browser handle drops.
        drop(self.tab);
        drop(self.browser);
        Ok(())
    }
}
