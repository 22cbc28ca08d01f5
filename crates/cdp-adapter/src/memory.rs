use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use optout_core_types::SessionId;
use parking_lot::Mutex;
use tokio::time::sleep;
use tracing::info;

use crate::driver::{parse_url, BrowserDriver, BrowserSession, SelectTarget};
use crate::error::{AdapterError, AdapterErrorKind};
use crate::metrics;

/// A driver call as seen by [`MemoryDriver`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DriverCommand {
    Open,
    Navigate { url: String },
    Fill { selector: String, value: String },
    Click { selector: String },
    Select { selector: String, target: SelectTarget },
    Close,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RecordedCommand {
    pub session: SessionId,
    pub command: DriverCommand,
}

#[derive(Default)]
struct MemoryState {
    log: Mutex<Vec<RecordedCommand>>,
    failing_selectors: Mutex<Vec<String>>,
    failing_urls: Mutex<Vec<String>>,
    fail_sessions: Mutex<bool>,
    latency: Mutex<Duration>,
    open: AtomicUsize,
    peak_open: AtomicUsize,
}

/// Browserless driver that records every call. Used for `--dry-run` and as
/// the scripted driver in tests.
#[derive(Clone, Default)]
pub struct MemoryDriver {
    state: Arc<MemoryState>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every driver call sleeps this long before answering.
    pub fn with_latency(self, latency: Duration) -> Self {
        *self.state.latency.lock() = latency;
        self
    }

    /// Calls addressing `selector` fail with `TargetNotFound`.
    pub fn fail_selector(self, selector: impl Into<String>) -> Self {
        self.state.failing_selectors.lock().push(selector.into());
        self
    }

    /// Navigation to URLs containing `fragment` fails.
    pub fn fail_navigation(self, fragment: impl Into<String>) -> Self {
        self.state.failing_urls.lock().push(fragment.into());
        self
    }

    /// `new_session` fails for every caller.
    pub fn fail_sessions(self) -> Self {
        *self.state.fail_sessions.lock() = true;
        self
    }

    pub fn commands(&self) -> Vec<RecordedCommand> {
        self.state.log.lock().clone()
    }

    pub fn commands_for(&self, session: &SessionId) -> Vec<DriverCommand> {
        self.state
            .log
            .lock()
            .iter()
            .filter(|entry| &entry.session == session)
            .map(|entry| entry.command.clone())
            .collect()
    }

    /// Sessions opened but not yet closed.
    pub fn open_sessions(&self) -> usize {
        self.state.open.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously open sessions observed.
    pub fn peak_open_sessions(&self) -> usize {
        self.state.peak_open.load(Ordering::SeqCst)
    }

    pub fn sessions_opened(&self) -> usize {
        self.state
            .log
            .lock()
            .iter()
            .filter(|entry| entry.command == DriverCommand::Open)
            .count()
    }
}

#[async_trait]
impl BrowserDriver for MemoryDriver {
    async fn new_session(&self) -> Result<Box<dyn BrowserSession>, AdapterError> {
        if *self.state.fail_sessions.lock() {
            return Err(AdapterError::new(AdapterErrorKind::Launch).with_hint("sessions disabled"));
        }
        let session = MemorySession {
            id: SessionId::new(),
            state: Arc::clone(&self.state),
            closed: false,
        };
        let open = self.state.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.peak_open.fetch_max(open, Ordering::SeqCst);
        session.record(DriverCommand::Open);
        metrics::record_session_opened();
        Ok(Box::new(session))
    }
}

struct MemorySession {
    id: SessionId,
    state: Arc<MemoryState>,
    closed: bool,
}

impl MemorySession {
    fn record(&self, command: DriverCommand) {
        self.state.log.lock().push(RecordedCommand {
            session: self.id.clone(),
            command,
        });
    }

    async fn settle(&self) -> Result<(), AdapterError> {
        if self.closed {
            return Err(AdapterError::new(AdapterErrorKind::SessionClosed));
        }
        let latency = *self.state.latency.lock();
        if !latency.is_zero() {
            sleep(latency).await;
        }
        Ok(())
    }

    fn check_selector(&self, selector: &str) -> Result<(), AdapterError> {
        if self
            .state
            .failing_selectors
            .lock()
            .iter()
            .any(|failing| failing == selector)
        {
            return Err(AdapterError::new(AdapterErrorKind::TargetNotFound)
                .with_hint(format!("no element matches `{selector}`")));
        }
        Ok(())
    }
}

#[async_trait]
impl BrowserSession for MemorySession {
    fn id(&self) -> &SessionId {
        &self.id
    }

    async fn navigate(&mut self, url: &str) -> Result<(), AdapterError> {
        self.settle().await?;
        parse_url(url)?;
        self.record(DriverCommand::Navigate {
            url: url.to_string(),
        });
        let result = if self
            .state
            .failing_urls
            .lock()
            .iter()
            .any(|fragment| url.contains(fragment.as_str()))
        {
            Err(AdapterError::new(AdapterErrorKind::Navigation).with_hint(url.to_string()))
        } else {
            info!(session = %self.id, url, "navigate (dry run)");
            Ok(())
        };
        metrics::record_command(&result);
        result
    }

    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), AdapterError> {
        self.settle().await?;
        self.record(DriverCommand::Fill {
            selector: selector.to_string(),
            value: value.to_string(),
        });
        let result = self.check_selector(selector);
        metrics::record_command(&result);
        result
    }

    async fn click(&mut self, selector: &str) -> Result<(), AdapterError> {
        self.settle().await?;
        self.record(DriverCommand::Click {
            selector: selector.to_string(),
        });
        let result = self.check_selector(selector);
        metrics::record_command(&result);
        result
    }

    async fn select_option(
        &mut self,
        selector: &str,
        target: &SelectTarget,
    ) -> Result<(), AdapterError> {
        self.settle().await?;
        self.record(DriverCommand::Select {
            selector: selector.to_string(),
            target: target.clone(),
        });
        let result = self.check_selector(selector);
        metrics::record_command(&result);
        result
    }

    async fn close(&mut self) -> Result<(), AdapterError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.record(DriverCommand::Close);
        self.state.open.fetch_sub(1, Ordering::SeqCst);
        metrics::record_session_closed();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_commands_per_session() {
        let driver = MemoryDriver::new();
        let mut session = driver.new_session().await.unwrap();
        session.navigate("https://acme.example").await.unwrap();
        session.fill("#email", "j@x.com").await.unwrap();
        session.close().await.unwrap();

        let commands = driver.commands_for(session.id());
        assert_eq!(
            commands,
            vec![
                DriverCommand::Open,
                DriverCommand::Navigate {
                    url: "https://acme.example".into()
                },
                DriverCommand::Fill {
                    selector: "#email".into(),
                    value: "j@x.com".into()
                },
                DriverCommand::Close,
            ]
        );
        assert_eq!(driver.open_sessions(), 0);
    }

    #[tokio::test]
    async fn sessions_and_commands_are_counted() {
        let before = metrics::snapshot();
        let driver = MemoryDriver::new().fail_selector("#gone");
        let mut session = driver.new_session().await.unwrap();
        session.navigate("https://acme.example").await.unwrap();
        session.click("#gone").await.unwrap_err();
        session.close().await.unwrap();

        let after = metrics::snapshot();
        assert!(after.sessions_opened > before.sessions_opened);
        assert!(after.sessions_closed > before.sessions_closed);
        assert!(after.commands >= before.commands + 2);
        assert!(after.command_failures > before.command_failures);
    }

    #[tokio::test]
    async fn failing_selector_surfaces_target_not_found() {
        let driver = MemoryDriver::new().fail_selector("#gone");
        let mut session = driver.new_session().await.unwrap();
        let err = session.click("#gone").await.unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::TargetNotFound);
    }

    #[tokio::test]
    async fn commands_after_close_are_rejected() {
        let driver = MemoryDriver::new();
        let mut session = driver.new_session().await.unwrap();
        session.close().await.unwrap();
        session.close().await.unwrap();
        let err = session.click("#x").await.unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::SessionClosed);
        assert_eq!(driver.open_sessions(), 0);
    }

    #[tokio::test]
    async fn peak_tracks_concurrent_sessions() {
        let driver = MemoryDriver::new();
        let mut a = driver.new_session().await.unwrap();
        let mut b = driver.new_session().await.unwrap();
        a.close().await.unwrap();
        let mut c = driver.new_session().await.unwrap();
        b.close().await.unwrap();
        c.close().await.unwrap();
        assert_eq!(driver.peak_open_sessions(), 2);
        assert_eq!(driver.sessions_opened(), 3);
    }
}
