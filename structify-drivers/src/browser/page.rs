use anyhow::{anyhow, Result};
use fantoccini::Client;
use std::time::Duration;
use tokio::time::{sleep, Instant};

const READY_STATE_POLL: Duration = Duration::from_millis(100);

/// A page that finished navigating inside a [`super::BrowserDriver`] session.
pub struct RenderedPage {
    client: Client,
    settle_timeout: Duration,
}

impl RenderedPage {
    pub(crate) fn new(client: Client, settle_timeout: Duration) -> Self {
        Self {
            client,
            settle_timeout,
        }
    }

    /// Poll `document.readyState` until the DOM reports `complete`.
    pub async fn wait_for_dom_settled(&self) -> Result<()> {
        let deadline = Instant::now() + self.settle_timeout;
        loop {
            let state = self
                .client
                .execute("return document.readyState;", vec![])
                .await?;
            if state.as_str() == Some("complete") {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(anyhow!(
                    "DOM did not settle within {}ms (readyState={state})",
                    self.settle_timeout.as_millis()
                ));
            }
            sleep(READY_STATE_POLL).await;
        }
    }

    /// Return the full post-render page HTML.
    pub async fn content(&self) -> Result<String> {
        self.client.source().await.map_err(anyhow::Error::from)
    }
}
