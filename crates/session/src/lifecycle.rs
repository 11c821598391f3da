//! Per-command lifecycle state machine.
//!
//! A [`CommandRecord`] moves through `Running → Streaming → Complete`, with
//! a password side-branch (`Running ⇄ AwaitingPassword`) and a forwarded
//! variant for commands multiplexed into an already-active remote session.
//! The record itself owns all per-command flags; session-level bookkeeping
//! lives in `registry`.

use std::time::SystemTime;

use crate::protocol::SUCCESS_END_MESSAGE;

/// Placeholder line shown while a password-resumed command is running.
pub const PROCESSING_PLACEHOLDER: &str = "Processing...";

/// Placeholder prompt line recorded when a privileged command awaits its
/// password.
pub const PASSWORD_PLACEHOLDER: &str = "Password required";

/// Commands with this prefix are privileged: the engine prompts for a
/// password before issuing any backend call.
pub const PRIVILEGED_PREFIX: &str = "sudo ";

/// Which password the record is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordKind {
    /// Local privileged execution (`sudo`).
    Privileged,
    /// Remote login password.
    Remote,
}

/// One executed command and its reconciled output.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRecord {
    /// The command text as submitted.
    pub command: String,
    /// Reconciled output lines, in arrival order.
    pub output: Vec<String>,
    /// Creation timestamp (used by history search dedup).
    pub created_at: SystemTime,
    /// True once the record reached a terminal state.
    pub complete: bool,
    /// True once at least one real output line has been matched to the
    /// record (or immediately, for forwarded records).
    pub streaming: bool,
    /// Success tri-state: unknown until completion resolves it.
    pub success: Option<bool>,
    /// Remote sessions echo the submitted command back; while this is set
    /// the reconciler is looking for (and suppressing) that echo.
    pub expecting_echo: bool,
    /// Password sub-state; at most one per session at a time.
    pub awaiting_password: Option<PasswordKind>,
    /// True for commands multiplexed into an active remote session. These
    /// only complete when the session's own terminating signal arrives.
    pub forwarded: bool,
}

impl CommandRecord {
    /// Create a record in the `Running` state.
    pub fn running(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            output: Vec::new(),
            created_at: SystemTime::now(),
            complete: false,
            streaming: false,
            success: None,
            expecting_echo: false,
            awaiting_password: None,
            forwarded: false,
        }
    }

    /// Create a forwarded record: streaming from the start, expecting the
    /// remote shell to echo the command back.
    pub fn forwarded(command: impl Into<String>) -> Self {
        Self {
            streaming: true,
            expecting_echo: true,
            forwarded: true,
            ..Self::running(command)
        }
    }

    /// Create an already-complete local record (directive replies, usage
    /// messages). Never touches the backend.
    pub fn local(command: impl Into<String>, lines: Vec<String>, success: bool) -> Self {
        Self {
            output: lines,
            complete: true,
            success: Some(success),
            ..Self::running(command)
        }
    }

    /// True while the command occupies the session: incomplete and not
    /// parked on a password prompt.
    pub fn is_processing(&self) -> bool {
        !self.complete && self.awaiting_password.is_none()
    }

    /// Whether the command text matches the privileged-execution prefix.
    pub fn is_privileged(command: &str) -> bool {
        command.trim_start().starts_with(PRIVILEGED_PREFIX)
    }

    /// `Running → AwaitingPassword(kind)`.
    ///
    /// For privileged commands a placeholder prompt line is recorded; the
    /// remote variant records nothing (the backend's own prompt text will
    /// stream in once the password is supplied).
    pub fn await_password(&mut self, kind: PasswordKind) {
        debug_assert!(!self.complete, "password wait on a completed record");
        self.awaiting_password = Some(kind);
        if kind == PasswordKind::Privileged {
            self.output.push(PASSWORD_PLACEHOLDER.to_string());
        }
        tracing::debug!(command = %self.command, ?kind, "awaiting password");
    }

    /// `AwaitingPassword(kind) → Running`: the user supplied a password.
    ///
    /// Output is reset to a single processing placeholder; the returned
    /// kind tells the engine which backend re-invocation call to issue.
    pub fn password_submitted(&mut self) -> Option<PasswordKind> {
        let kind = self.awaiting_password.take()?;
        self.output.clear();
        self.output.push(PROCESSING_PLACEHOLDER.to_string());
        self.streaming = false;
        Some(kind)
    }

    /// Append one reconciled output line, entering `Streaming` on the first.
    ///
    /// If the output currently holds only a recognized placeholder, the
    /// placeholder is discarded before the first real line is appended.
    pub fn push_line(&mut self, line: impl Into<String>) {
        if !self.streaming {
            self.streaming = true;
            if self.output.len() == 1 && is_placeholder(&self.output[0]) {
                self.output.clear();
            }
        }
        self.output.push(line.into());
    }

    /// Terminal transition driven by the end-of-command signal. Success is
    /// true iff the payload is exactly the known success string.
    pub fn complete_with_message(&mut self, message: &str) {
        self.complete_with(Some(message == SUCCESS_END_MESSAGE));
    }

    /// Terminal transition with an explicit (possibly still unknown)
    /// success value. Idempotent: a completed record keeps its verdict.
    pub fn complete_with(&mut self, success: Option<bool>) {
        if self.complete {
            tracing::debug!(command = %self.command, "completion signal for a completed record");
            return;
        }
        self.complete = true;
        self.streaming = false;
        self.awaiting_password = None;
        self.success = success;
    }

    /// Immediate, optimistic cancellation: the record is flipped to failed
    /// before any backend acknowledgement.
    pub fn cancel(&mut self) {
        self.complete_with(Some(false));
    }
}

/// Recognized placeholder messages that are discarded when real output
/// starts streaming.
fn is_placeholder(line: &str) -> bool {
    line == PROCESSING_PLACEHOLDER || line == PASSWORD_PLACEHOLDER
}
