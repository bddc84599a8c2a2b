//! Driver layer for browser automation.
//!
//! This crate exposes the WebDriver-backed browser session used by the
//! rendered fetcher to read post-render page markup.
//!
//! - [`browser::driver::BrowserDriver`]: call-scoped WebDriver session
//! - [`browser::page::RenderedPage`]: DOM helpers on a navigated page
//! - [`browser::args`]: Chrome launch arguments
pub mod browser;
