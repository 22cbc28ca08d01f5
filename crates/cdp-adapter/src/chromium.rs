use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use futures::StreamExt;
use optout_core_types::SessionId;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::config::CdpConfig;
use crate::driver::{parse_url, BrowserDriver, BrowserSession, SelectTarget};
use crate::error::{AdapterError, AdapterErrorKind};
use crate::metrics;

const FILL_FN: &str = r#"
(function(selector, value) {
    const el = document.querySelector(selector);
    if (!el) { return 'not-found'; }
    el.focus();
    el.value = value;
    el.dispatchEvent(new Event('input', { bubbles: true }));
    el.dispatchEvent(new Event('change', { bubbles: true }));
    return 'filled';
})
"#;

const SELECT_FN: &str = r#"
(function(selector, mode, target) {
    const el = document.querySelector(selector);
    if (!el) { return 'not-found'; }
    const options = Array.from(el.options || []);
    let option;
    if (mode === 'index') {
        option = options[Number(target)];
    } else if (mode === 'label') {
        option = options.find(opt => opt.text.trim() === target);
    } else {
        option = options.find(opt => opt.value === target)
            || options.find(opt => opt.text.trim() === target);
    }
    if (!option) { return 'option-missing'; }
    el.value = option.value;
    el.dispatchEvent(new Event('input', { bubbles: true }));
    el.dispatchEvent(new Event('change', { bubbles: true }));
    return 'selected';
})
"#;

/// Chrome/Chromium driven over CDP. Every session is a fresh page in one
/// shared browser process.
pub struct ChromiumDriver {
    browser: Mutex<Option<Browser>>,
    handler: JoinHandle<()>,
    config: CdpConfig,
}

impl ChromiumDriver {
    pub async fn launch(config: CdpConfig) -> Result<Self, AdapterError> {
        let executable = config.resolve_executable().ok_or_else(|| {
            AdapterError::new(AdapterErrorKind::Launch)
                .with_hint("no Chrome/Chromium executable found; set OPTOUT_CHROME")
        })?;

        let mut builder = BrowserConfig::builder().chrome_executable(&executable);
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(dir) = &config.user_data_dir {
            builder = builder.user_data_dir(dir);
        }
        let browser_config = builder
            .build()
            .map_err(|err| AdapterError::new(AdapterErrorKind::Launch).with_hint(err))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|err| AdapterError::new(AdapterErrorKind::Launch).with_hint(err.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(?err, "chromium handler reported an error");
                }
            }
        });

        info!(
            executable = %executable.display(),
            headless = config.headless,
            "Chromium launched"
        );

        Ok(Self {
            browser: Mutex::new(Some(browser)),
            handler,
            config,
        })
    }
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    async fn new_session(&self) -> Result<Box<dyn BrowserSession>, AdapterError> {
        let guard = self.browser.lock().await;
        let browser = guard
            .as_ref()
            .ok_or_else(|| AdapterError::new(AdapterErrorKind::SessionClosed))?;
        let page = browser.new_page("about:blank").await.map_err(cdp_error)?;
        drop(guard);

        metrics::record_session_opened();
        let session = ChromiumSession {
            id: SessionId::new(),
            page: Some(page),
            action_timeout: self.config.action_timeout(),
            poll_interval: self.config.poll_interval(),
        };
        debug!(session = %session.id, "opened chromium page");
        Ok(Box::new(session))
    }

    async fn shutdown(&self) -> Result<(), AdapterError> {
        let Some(mut browser) = self.browser.lock().await.take() else {
            return Ok(());
        };
        let closed = browser.close().await.map(|_| ()).map_err(cdp_error);
        if let Err(err) = browser.wait().await {
            warn!(?err, "chromium process did not exit cleanly");
        }
        self.handler.abort();
        closed
    }
}

struct ChromiumSession {
    id: SessionId,
    page: Option<Page>,
    action_timeout: Duration,
    poll_interval: Duration,
}

impl ChromiumSession {
    fn page(&self) -> Result<&Page, AdapterError> {
        self.page
            .as_ref()
            .ok_or_else(|| AdapterError::new(AdapterErrorKind::SessionClosed))
    }

    async fn evaluate_status(&self, expression: &str) -> Result<String, AdapterError> {
        let mut params = EvaluateParams::new(expression);
        params.return_by_value = Some(true);
        params.await_promise = Some(true);
        let result = self
            .page()?
            .evaluate_expression(params)
            .await
            .map_err(cdp_error)?;
        result.into_value::<String>().map_err(|err| {
            AdapterError::new(AdapterErrorKind::Internal)
                .with_hint(format!("unexpected script result: {err}"))
        })
    }

    /// Re-runs `expression` until the element it targets exists or the
    /// action timeout elapses.
    async fn poll_status(&self, expression: &str, selector: &str) -> Result<String, AdapterError> {
        let deadline = Instant::now() + self.action_timeout;
        loop {
            let status = self.evaluate_status(expression).await?;
            if status != "not-found" {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                return Err(AdapterError::new(AdapterErrorKind::TargetNotFound)
                    .with_hint(format!("no element matches `{selector}`")));
            }
            sleep(self.poll_interval).await;
        }
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    fn id(&self) -> &SessionId {
        &self.id
    }

    async fn navigate(&mut self, url: &str) -> Result<(), AdapterError> {
        let url = parse_url(url)?;
        let page = self.page()?;
        let result = match timeout(self.action_timeout, page.goto(url.as_str())).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(err)) => Err(AdapterError::new(AdapterErrorKind::Navigation)
                .with_hint(format!("{url}: {err}"))),
            Err(_) => Err(AdapterError::new(AdapterErrorKind::Timeout)
                .with_hint(format!("navigation to {url}"))),
        };
        metrics::record_command(&result);
        result
    }

    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), AdapterError> {
        let expression = format!(
            "{}({}, {})",
            FILL_FN.trim(),
            js_literal(selector)?,
            js_literal(value)?
        );
        let result = self.poll_status(&expression, selector).await.and_then(|status| {
            match status.as_str() {
                "filled" => Ok(()),
                other => Err(AdapterError::new(AdapterErrorKind::Internal)
                    .with_hint(format!("fill failed: {other}"))),
            }
        });
        metrics::record_command(&result);
        result
    }

    async fn click(&mut self, selector: &str) -> Result<(), AdapterError> {
        let deadline = Instant::now() + self.action_timeout;
        let result = loop {
            match self.page()?.find_element(selector).await {
                Ok(element) => {
                    break element.click().await.map(|_| ()).map_err(cdp_error);
                }
                Err(err) if Instant::now() >= deadline => {
                    break Err(AdapterError::new(AdapterErrorKind::TargetNotFound)
                        .with_hint(format!("no element matches `{selector}`: {err}")));
                }
                Err(_) => sleep(self.poll_interval).await,
            }
        };
        metrics::record_command(&result);
        result
    }

    async fn select_option(
        &mut self,
        selector: &str,
        target: &SelectTarget,
    ) -> Result<(), AdapterError> {
        let target_literal = match target {
            SelectTarget::Value(value) | SelectTarget::Label(value) => js_literal(value)?,
            SelectTarget::Index(index) => index.to_string(),
        };
        let expression = format!(
            "{}({}, {}, {})",
            SELECT_FN.trim(),
            js_literal(selector)?,
            js_literal(target.kind())?,
            target_literal
        );
        let result = self.poll_status(&expression, selector).await.and_then(|status| {
            match status.as_str() {
                "selected" => Ok(()),
                "option-missing" => Err(AdapterError::new(AdapterErrorKind::OptionNotFound)
                    .with_hint(format!("`{selector}` has no option with {target}"))),
                other => Err(AdapterError::new(AdapterErrorKind::Internal)
                    .with_hint(format!("select failed: {other}"))),
            }
        });
        metrics::record_command(&result);
        result
    }

    async fn close(&mut self) -> Result<(), AdapterError> {
        let Some(page) = self.page.take() else {
            return Ok(());
        };
        metrics::record_session_closed();
        page.close().await.map_err(cdp_error)
    }
}

fn js_literal(raw: &str) -> Result<String, AdapterError> {
    serde_json::to_string(raw)
        .map_err(|err| AdapterError::new(AdapterErrorKind::Internal).with_hint(err.to_string()))
}

fn cdp_error(err: CdpError) -> AdapterError {
    AdapterError::new(AdapterErrorKind::CdpIo).with_hint(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn js_literal_escapes_quotes() {
        assert_eq!(js_literal(r#"a"b"#).unwrap(), r#""a\"b""#);
    }

    #[test]
    fn scripts_are_callable_expressions() {
        assert!(FILL_FN.trim().starts_with("(function"));
        assert!(SELECT_FN.trim().ends_with(')'));
    }
}
