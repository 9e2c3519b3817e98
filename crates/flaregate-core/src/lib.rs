//! # flaregate-core
//!
//! Low-level CDP browser driver used by the rest of the gateway: launching
//! browser processes, connecting over the DevTools protocol, and exposing
//! `Browser` / `BrowserContext` / `Page` handles.
//!
//! ## Example
//!
//! ```ignore
//! use flaregate_core::{Driver, BrowserType};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let driver = Driver::new().await?;
//!     let browser_type = driver.browser_type("chromium").unwrap();
//!     let browser = browser_type.launch().await?;
//!     let context = browser.new_context().await?;
//!     let page = context.new_page().await?;
//!     page.goto("https://example.com").await?;
//!     browser.close().await?;
//!     Ok(())
//! }
//! ```

mod browser;
mod context;
mod element;
mod errors;
mod options;
mod page;
mod protocol;

pub use browser::{Browser, BrowserType};
pub use context::BrowserContext;
pub use element::ElementHandle;
pub use errors::Error;
pub use options::{BrowserOptions, ContextOptions, Cookie, PageOptions, ProxySettings, SameSite, Viewport};
pub use page::Page;

use tracing::{debug, info};

/// Entry point for the driver: enumerates available browser types and
/// hands out launch handles.
pub struct Driver {
    browser_types: Vec<BrowserType>,
}

impl Driver {
    /// Creates a new driver instance with the supported browser types.
    pub async fn new() -> Result<Self, Error> {
        info!("initializing driver");

        let browser_types = vec![
            BrowserType::new("chromium"),
            BrowserType::new("firefox"),
            BrowserType::new("webkit"),
        ];

        debug!(count = browser_types.len(), "registered browser types");

        Ok(Self { browser_types })
    }

    /// Returns a browser type by name.
    pub fn browser_type(&self, name: &str) -> Option<&BrowserType> {
        self.browser_types.iter().find(|bt| bt.name() == name)
    }

    /// Returns all available browser types.
    pub fn browser_types(&self) -> &[BrowserType] {
        &self.browser_types
    }

    /// Launches a browser of the given type with stealth initialization
    /// applied. The stealth script contents themselves are opaque to this
    /// crate; only the toggle is exposed here.
    pub async fn stealth_browser(&self, name: &str) -> Result<Browser, Error> {
        let browser_type = self
            .browser_type(name)
            .ok_or_else(|| Error::BrowserTypeNotFound(name.to_string()))?;

        let mut options = options::BrowserOptions::default();
        options.stealth = Some(true);

        browser_type.launch_with_options(options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn driver_new_registers_three_browser_types() {
        let driver = Driver::new().await.unwrap();
        assert_eq!(driver.browser_types().len(), 3);
    }

    #[tokio::test]
    async fn driver_browser_type_lookup() {
        let driver = Driver::new().await.unwrap();
        let browser_type = driver.browser_type("chromium");
        assert!(browser_type.is_some());
        assert_eq!(browser_type.unwrap().name(), "chromium");

        assert!(driver.browser_type("nonexistent").is_none());
    }
}
