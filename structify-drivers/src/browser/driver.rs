use crate::browser::{args::build_browser_arguments, page::RenderedPage};
use anyhow::Result;
use fantoccini::error::{CmdError, ErrorStatus};
use fantoccini::wd::TimeoutConfiguration;
use fantoccini::{Client, ClientBuilder};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use structify_common::DEFAULT_USER_AGENT;
use thiserror::Error;
use webdriver::capabilities::Capabilities;

/// Navigation timeout applied to every session.
pub const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_millis(60_000);

// Extra wall-clock allowance on top of the WebDriver page-load timeout, in
// case the driver itself stops responding.
const NAVIGATION_GRACE: Duration = Duration::from_secs(5);

/// Budget for `document.readyState` to reach `complete` after navigation.
pub const DEFAULT_SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

// Upper bound on ending a session, whichever route is taken.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Launch options for a [`BrowserDriver`].
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// WebDriver endpoint (Chromedriver by default).
    pub webdriver_url: String,
    pub headless: bool,
    pub user_agent: String,
    pub navigation_timeout: Duration,
    pub settle_timeout: Duration,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            headless: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            navigation_timeout: DEFAULT_NAVIGATION_TIMEOUT,
            settle_timeout: DEFAULT_SETTLE_TIMEOUT,
        }
    }
}

/// Failure while loading a page.
#[derive(Debug, Error)]
pub enum NavigationError {
    #[error("navigation timed out after {}ms: {message}", timeout.as_millis())]
    Timeout { timeout: Duration, message: String },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Thin wrapper around a `fantoccini` WebDriver session scoped to one fetch.
///
/// Call [`BrowserDriver::close`] on every path. If the driver is dropped
/// without being closed the session is shut down on a background task
/// instead.
///
/// fantoccini runs one command at a time per session, so a request the driver
/// never answers blocks every later command. Once navigation overruns its
/// wall-clock budget the session is marked stuck and released with a direct
/// `DELETE /session/{id}` instead of going through the client.
pub struct BrowserDriver {
    client: Client,
    options: BrowserOptions,
    session_id: Option<String>,
    stuck: AtomicBool,
    closed: bool,
}

impl BrowserDriver {
    /// Open a new browser session on a running WebDriver service.
    pub async fn launch(options: &BrowserOptions) -> Result<Self> {
        let mut caps = Capabilities::new();
        let mut chrome_opts = HashMap::new();
        let args = build_browser_arguments(options.headless, &options.user_agent);
        chrome_opts.insert("args".to_string(), json!(args));
        caps.insert("goog:chromeOptions".to_string(), json!(chrome_opts));
        caps.insert("pageLoadStrategy".to_string(), json!("normal"));

        tracing::debug!(
            webdriver_url = %options.webdriver_url,
            headless = options.headless,
            "browser.launch"
        );
        let client = ClientBuilder::native()
            .capabilities(caps)
            .connect(&options.webdriver_url)
            .await?;

        let session_id = client.session_id().await?;
        let driver = Self {
            client,
            options: options.clone(),
            session_id,
            stuck: AtomicBool::new(false),
            closed: false,
        };
        driver
            .client
            .update_timeouts(TimeoutConfiguration::new(
                None,
                Some(options.navigation_timeout),
                None,
            ))
            .await?;
        Ok(driver)
    }

    /// Navigate to `url` and return the loaded page.
    pub async fn goto(&self, url: &str) -> std::result::Result<RenderedPage, NavigationError> {
        let timeout = self.options.navigation_timeout;
        match tokio::time::timeout(timeout + NAVIGATION_GRACE, self.client.goto(url)).await {
            Ok(Ok(())) => Ok(RenderedPage::new(
                self.client.clone(),
                self.options.settle_timeout,
            )),
            Ok(Err(err)) if is_timeout(&err) => Err(NavigationError::Timeout {
                timeout,
                message: err.to_string(),
            }),
            Ok(Err(err)) => Err(NavigationError::Other(err.into())),
            Err(_) => {
                self.stuck.store(true, Ordering::Release);
                tracing::warn!(url, timeout_ms = timeout.as_millis() as u64, "browser.goto_stuck");
                Err(NavigationError::Timeout {
                    timeout,
                    message: "webdriver did not answer".to_string(),
                })
            }
        }
    }

    /// Close the underlying browser session. Never waits longer than a few
    /// seconds, even when the driver has stopped answering.
    pub async fn close(mut self) -> Result<()> {
        self.closed = true;
        let session = self.session_ref();
        if self.stuck.load(Ordering::Acquire) {
            return session.release_directly().await;
        }
        match tokio::time::timeout(CLOSE_TIMEOUT, self.client.clone().close()).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!("browser.close_stuck");
                return session.release_directly().await;
            }
        }
        tracing::debug!("browser.closed");
        Ok(())
    }

    fn session_ref(&self) -> SessionRef {
        SessionRef {
            webdriver_url: self.options.webdriver_url.clone(),
            session_id: self.session_id.clone(),
        }
    }
}

/// Enough to end a session without the fantoccini client.
struct SessionRef {
    webdriver_url: String,
    session_id: Option<String>,
}

impl SessionRef {
    async fn release_directly(&self) -> Result<()> {
        let Some(id) = &self.session_id else {
            return Err(anyhow::anyhow!("no session id to release"));
        };
        let url = format!(
            "{}/session/{id}",
            self.webdriver_url.trim_end_matches('/')
        );
        let response = reqwest::Client::builder()
            .timeout(CLOSE_TIMEOUT)
            .build()?
            .delete(&url)
            .send()
            .await?;
        tracing::debug!(status = %response.status(), session_id = %id, "browser.released");
        response.error_for_status()?;
        Ok(())
    }
}

impl Drop for BrowserDriver {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let client = self.client.clone();
                let session = self.session_ref();
                let stuck = self.stuck.load(Ordering::Acquire);
                handle.spawn(async move {
                    let result = if stuck {
                        session.release_directly().await
                    } else {
                        match tokio::time::timeout(CLOSE_TIMEOUT, client.close()).await {
                            Ok(result) => result.map_err(anyhow::Error::from),
                            Err(_) => session.release_directly().await,
                        }
                    };
                    if let Err(e) = result {
                        tracing::warn!(error = %e, "browser.close_on_drop_failed");
                    }
                });
            }
            Err(_) => tracing::warn!("browser.leaked_session: no runtime to close it on"),
        }
    }
}

fn is_timeout(err: &CmdError) -> bool {
    match err {
        CmdError::Standard(wd) => wd.error == ErrorStatus::Timeout,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_navigation_timeout_is_sixty_seconds() {
        let opts = BrowserOptions::default();
        assert_eq!(opts.navigation_timeout.as_millis(), 60_000);
        assert!(opts.settle_timeout < opts.navigation_timeout);
        assert_eq!(opts.user_agent, DEFAULT_USER_AGENT);
        assert!(opts.headless);
    }

    #[test]
    fn timeout_error_message_mentions_budget() {
        let err = NavigationError::Timeout {
            timeout: DEFAULT_NAVIGATION_TIMEOUT,
            message: "page load".into(),
        };
        assert_eq!(err.to_string(), "navigation timed out after 60000ms: page load");
    }
}
