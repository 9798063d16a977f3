use crate::acquire::AcquiredEndpoint;
use crate::{Error, Result};
use chromiumoxide::Page;
use chromiumoxide::browser::Browser;
use futures::StreamExt;
use tokio::task::JoinHandle;

/// Something holding a control channel that must be released.
pub trait ControlChannel {
    /// Release the channel. Must be safe to call more than once.
    fn close(&mut self);
}

/// The control channel for one invocation.
///
/// Closing (or dropping) the session stops the protocol handler and drops the
/// connection. `Browser.close` is never sent, so the Chrome process keeps
/// running for the next invocation.
pub struct CdpSession {
    browser: Option<Browser>,
    handler_task: Option<JoinHandle<()>>,
    pub endpoint: AcquiredEndpoint,
}

impl CdpSession {
    pub async fn connect(endpoint: AcquiredEndpoint) -> Result<Self> {
        tracing::debug!("Connecting to {}", endpoint.control_channel);

        let (browser, mut handler) = Browser::connect(endpoint.control_channel.clone())
            .await
            .map_err(|e| {
                Error::Connection(format!(
                    "Failed to connect to {}: {}",
                    endpoint.control_channel, e
                ))
            })?;

        // The handler must be polled for any command to complete.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("CDP handler event error (continuing): {}", e);
                }
            }
        });

        tracing::info!("Connected to Chrome at {}", endpoint.endpoint);
        Ok(Self {
            browser: Some(browser),
            handler_task: Some(handler_task),
            endpoint,
        })
    }

    fn browser(&self) -> Result<&Browser> {
        self.browser
            .as_ref()
            .ok_or_else(|| Error::Browser("CDP session already closed".to_string()))
    }

    pub async fn pages(&self) -> Result<Vec<Page>> {
        Ok(self.browser()?.pages().await?)
    }

    pub async fn new_page(&self, url: &str) -> Result<Page> {
        Ok(self.browser()?.new_page(url).await?)
    }

    /// Release the control channel. Idempotent.
    pub fn close(&mut self) {
        if let Some(task) = self.handler_task.take() {
            task.abort();
        }
        if self.browser.take().is_some() {
            tracing::debug!("Released CDP session for {}", self.endpoint.endpoint);
        }
    }
}

impl Drop for CdpSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl ControlChannel for CdpSession {
    fn close(&mut self) {
        CdpSession::close(self);
    }
}
