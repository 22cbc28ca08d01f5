//! Human-in-the-loop record selection
//!
//! `prompt_user_to_select_record` suspends only the workflow that hit it.
//! Where the confirmation comes from is decided by the [`RecordPrompter`]
//! handed to the interpreter.

use std::io::{self, BufRead, Write};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info};

use crate::errors::StepError;

pub const SELECT_INSTRUCTIONS: &str =
    ">> Please select the correct record manually in the browser.";
pub const CONTINUE_PROMPT: &str = "Press Enter once done...";

/// Source of the "record selected" signal.
#[async_trait]
pub trait RecordPrompter: Send + Sync {
    /// Resolves once a human has confirmed the selection described by
    /// `description`.
    async fn confirm_record(&self, description: &str) -> Result<(), StepError>;
}

/// Prints the description on stdout and waits for Enter on stdin.
///
/// The blocking read runs on the blocking pool so other workflows keep
/// going; the prompt lock keeps two prompts from interleaving on the terminal.
#[derive(Default)]
pub struct TerminalPrompter {
    lock: Mutex<()>,
}

impl TerminalPrompter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordPrompter for TerminalPrompter {
    async fn confirm_record(&self, description: &str) -> Result<(), StepError> {
        let _guard = self.lock.lock().await;
        let description = description.to_string();
        let answered = tokio::task::spawn_blocking(move || -> io::Result<()> {
            let mut out = io::stdout().lock();
            writeln!(out)?;
            if !description.is_empty() {
                writeln!(out, "{description}")?;
            }
            writeln!(out, "{SELECT_INSTRUCTIONS}")?;
            write!(out, "{CONTINUE_PROMPT}")?;
            out.flush()?;
            drop(out);

            let mut line = String::new();
            if io::stdin().lock().read_line(&mut line)? == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "stdin closed before confirmation",
                ));
            }
            Ok(())
        })
        .await
        .map_err(|err| StepError::Prompt(err.to_string()))?;
        answered.map_err(|err| StepError::Prompt(err.to_string()))
    }
}

/// Confirms immediately. Used for dry runs where nobody watches a browser.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoConfirmPrompter;

#[async_trait]
impl RecordPrompter for AutoConfirmPrompter {
    async fn confirm_record(&self, description: &str) -> Result<(), StepError> {
        info!(description, "record selection auto-confirmed");
        Ok(())
    }
}

/// A pending confirmation delivered through [`ChannelPrompter`].
#[derive(Debug)]
pub struct PromptRequest {
    pub description: String,
    reply: oneshot::Sender<()>,
}

impl PromptRequest {
    pub fn confirm(self) {
        let _ = self.reply.send(());
    }
}

/// Forwards every prompt to a receiver owned by some other component, such
/// as a UI or a test.
#[derive(Clone)]
pub struct ChannelPrompter {
    tx: mpsc::UnboundedSender<PromptRequest>,
}

impl ChannelPrompter {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PromptRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl RecordPrompter for ChannelPrompter {
    async fn confirm_record(&self, description: &str) -> Result<(), StepError> {
        let (reply, answer) = oneshot::channel();
        self.tx
            .send(PromptRequest {
                description: description.to_string(),
                reply,
            })
            .map_err(|_| StepError::Prompt("prompt receiver dropped".into()))?;
        debug!(description, "waiting for record confirmation");
        answer
            .await
            .map_err(|_| StepError::Prompt("prompt dismissed without confirmation".into()))
    }
}
