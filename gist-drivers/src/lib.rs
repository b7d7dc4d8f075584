//! Driver layer for headless browser automation.
//!
//! This crate wraps a WebDriver session (Chromedriver by default) and exposes
//! the small surface the scrape pipeline needs.
//!
//! - [`browser::driver::GistDriver`]: one WebDriver session, opened once per run
//! - [`browser::page::GistPage`]: a browser tab with navigation status,
//!   script evaluation and page source helpers
//! - [`browser::stealth`]: stealth profiles, Chrome arguments and JS evasions
pub mod browser;

pub use browser::driver::{DriverOptions, GistDriver};
pub use browser::page::{GistPage, NavigationError, NavigationStatus};
pub use browser::stealth::StealthProfile;
