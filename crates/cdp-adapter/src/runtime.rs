//! A single Chromium tab driven over CDP.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page;
use futures::StreamExt;
use page_port::{PageError, ScriptRuntime};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::CdpConfig;
use crate::error::{AdapterError, AdapterErrorKind};

pub struct ChromiumRuntime {
    browser: Mutex<Browser>,
    page: Page,
    handler: JoinHandle<()>,
    deadline: Duration,
}

impl ChromiumRuntime {
    /// Launch the browser and open one blank tab.
    pub async fn launch(cfg: &CdpConfig) -> Result<Self, AdapterError> {
        let config = cfg.browser_config()?;
        let (browser, mut handler) = Browser::launch(config).await.map_err(|err| {
            AdapterError::new(AdapterErrorKind::LaunchFailed)
                .with_hint(format!("failed to launch chromium: {err}"))
        })?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(target: "cdp-runtime", error = %err, "cdp handler error");
                }
            }
            debug!(target: "cdp-runtime", "cdp handler finished");
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(err) => {
                handler.abort();
                return Err(AdapterError::from(err).with_hint("failed to open a tab"));
            }
        };
        info!(
            target: "cdp-runtime",
            executable = %cfg.executable.display(),
            headless = cfg.headless,
            "chromium tab ready"
        );

        Ok(Self {
            browser: Mutex::new(browser),
            page,
            handler,
            deadline: cfg.deadline(),
        })
    }

    /// Load `url` in the tab and wait for the navigation to finish.
    pub async fn navigate(&self, url: &str) -> Result<(), AdapterError> {
        let parsed = Url::parse(url).map_err(|err| {
            AdapterError::new(AdapterErrorKind::Internal)
                .with_hint(format!("invalid url '{url}': {err}"))
        })?;
        info!(target: "cdp-runtime", url = %parsed, "navigating");
        timeout(self.deadline, self.page.goto(parsed.as_str()))
            .await
            .map_err(|_| {
                AdapterError::new(AdapterErrorKind::NavTimeout)
                    .with_hint(format!("{} did not load within {:?}", parsed, self.deadline))
                    .retriable(true)
            })??;
        Ok(())
    }

    /// Close the browser process.
    pub async fn close(&self) {
        let mut browser = self.browser.lock().await;
        if let Err(err) = browser.close().await {
            warn!(target: "cdp-runtime", error = %err, "failed to close browser");
        }
        if let Err(err) = browser.wait().await {
            warn!(target: "cdp-runtime", error = %err, "failed to reap browser process");
        }
        self.handler.abort();
    }

    async fn evaluate_value(&self, expression: &str) -> Result<Value, AdapterError> {
        let params = EvaluateParams::builder()
            .expression(expression)
            .return_by_value(true)
            .await_promise(true)
            .build()
            .map_err(|err| {
                AdapterError::new(AdapterErrorKind::Internal)
                    .with_hint(format!("evaluate params: {err}"))
            })?;

        let result = timeout(self.deadline, self.page.evaluate_expression(params))
            .await
            .map_err(|_| {
                AdapterError::new(AdapterErrorKind::CdpIo)
                    .with_hint(format!("evaluation exceeded {:?}", self.deadline))
                    .retriable(true)
            })?
            .map_err(|err| match err {
                CdpError::JavascriptException(_) => {
                    AdapterError::new(AdapterErrorKind::ScriptFailed).with_hint(err.to_string())
                }
                other => AdapterError::from(other),
            })?;

        Ok(result.value().cloned().unwrap_or(Value::Null))
    }
}

impl Drop for ChromiumRuntime {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

#[async_trait]
impl ScriptRuntime for ChromiumRuntime {
    async fn evaluate(&self, expression: &str) -> Result<Value, PageError> {
        self.evaluate_value(expression).await.map_err(PageError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn launch_fails_cleanly_without_executable() {
        let cfg = CdpConfig {
            executable: PathBuf::from("/definitely/not/chrome"),
            ..CdpConfig::default()
        };
        let err = match ChromiumRuntime::launch(&cfg).await {
            Ok(_) => panic!("launch should fail"),
            Err(err) => err,
        };
        assert_eq!(err.kind, AdapterErrorKind::LaunchFailed);
    }
}
