pub mod args;
pub mod driver;
pub mod page;

pub use driver::{
    BrowserDriver, BrowserOptions, NavigationError, DEFAULT_NAVIGATION_TIMEOUT,
    DEFAULT_SETTLE_TIMEOUT,
};
pub use page::RenderedPage;
