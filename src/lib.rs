//! # Harvest - Bounded-Depth Web Content Harvester
//!
//! This crate turns a topic query and a set of keywords into a plain-text
//! corpus. It discovers candidate pages through live search engines (with a
//! static topic-classified fallback), crawls outward from them breadth-first
//! within depth and page limits, extracts readable English text from noisy
//! HTML and writes the accepted pages to a single delimited corpus file.
//!
//! ## Features
//!
//! - Search-engine seeding through a headless Chrome session
//! - Direct HTTP fetching when no browser is available
//! - Same-origin, breadth-first link expansion with politeness delays
//! - Main-content detection and boilerplate removal
//! - Corpus files that can be loaded back into records
//! - Async API with Tokio
//! - Structured logging with `tracing`
//!
//! ## Example
//!
//! ```rust,no_run
//! use harvest::crawler::{CrawlerConfig, Storage};
//! use harvest::harvest::{HarvestRequest, Harvester};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let harvester = Harvester::new(CrawlerConfig::default(), Storage::new())?;
//!
//!     let request = HarvestRequest::new(
//!         "climate policy",
//!         vec!["renewable".to_string(), "carbon".to_string()],
//!     );
//!     let response = harvester.harvest(&request).await?;
//!
//!     println!(
//!         "Scraped {} pages into {}",
//!         response.pages_scraped, response.corpus_file_path
//!     );
//!     harvester.shutdown().await;
//!     Ok(())
//! }
//! ```

mod error;

pub mod crawler;
pub mod harvest;

pub use error::Error;

/// Re-export of types module for public use
pub mod prelude {
    pub use crate::error::Error;
    pub use crate::error::Result;
    pub use crate::harvest::{HarvestRequest, HarvestResponse, Harvester};
}
