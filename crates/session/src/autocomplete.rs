//! Debounced, token-guarded autocomplete coordination.
//!
//! Each qualifying keystroke cancels the pending debounce timer and arms a
//! new one; only when the timer fires untouched is a suggestion request
//! dispatched, carrying a freshly incremented monotonic token. Responses
//! whose token is not the latest issued one are discarded, so results are
//! never shown out of order relative to the newest keystroke, and an error
//! from a superseded request can never clear suggestions produced by a
//! later one.

use std::time::{Duration, Instant};

use anyhow::Result;

/// Monotonic identity of one dispatched suggestion request.
pub type RequestToken = u64;

/// What the debounce timer decided when it fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebounceOutcome {
    /// Issue a backend suggestion request for `input`, tagged with `token`.
    Dispatch { token: RequestToken, input: String },
    /// Input too short to query; the suggestion list was cleared. Later
    /// keystrokes may still qualify.
    TooShort,
}

/// Per-window autocomplete state.
#[derive(Debug)]
pub struct AutocompleteCoordinator {
    debounce_delay: Duration,
    min_query_len: usize,
    latest_token: RequestToken,
    pending: Option<PendingKeystroke>,
    suggestions: Vec<String>,
}

#[derive(Debug)]
struct PendingKeystroke {
    input: String,
    deadline: Instant,
}

impl AutocompleteCoordinator {
    pub fn new(debounce_delay: Duration, min_query_len: usize) -> Self {
        Self {
            debounce_delay,
            min_query_len,
            latest_token: 0,
            pending: None,
            suggestions: Vec::new(),
        }
    }

    /// Record a keystroke: drop any pending timer and arm a fresh one.
    pub fn on_keystroke(&mut self, input: &str, now: Instant) {
        self.pending = Some(PendingKeystroke {
            input: input.to_owned(),
            deadline: now + self.debounce_delay,
        });
    }

    /// Drop the pending timer without dispatching (submit, cancel, focus
    /// loss). Already-dispatched requests are unaffected; their responses
    /// die against the token guard instead.
    pub fn cancel_pending(&mut self) {
        self.pending = None;
    }

    /// When the pending debounce timer should fire, if one is armed.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|pending| pending.deadline)
    }

    /// Timer callback. Re-validates staleness: a callback that fires before
    /// the current deadline belongs to a superseded keystroke.
    pub fn on_timer(&mut self, now: Instant) -> Option<DebounceOutcome> {
        let deadline = self.deadline()?;
        if now < deadline {
            return None;
        }
        let pending = self.pending.take()?;

        if !query_qualifies(&pending.input, self.min_query_len) {
            self.suggestions.clear();
            return Some(DebounceOutcome::TooShort);
        }

        self.latest_token += 1;
        tracing::debug!(token = self.latest_token, input = %pending.input, "dispatching suggestions request");
        Some(DebounceOutcome::Dispatch {
            token: self.latest_token,
            input: pending.input,
        })
    }

    /// Deliver a backend response. Stale tokens never mutate the list.
    pub fn on_response(&mut self, token: RequestToken, result: Result<Vec<String>>) {
        if token != self.latest_token {
            tracing::debug!(
                token,
                latest = self.latest_token,
                "discarding stale suggestions response"
            );
            return;
        }
        match result {
            Ok(suggestions) => self.suggestions = suggestions,
            Err(error) => {
                tracing::warn!(%error, "suggestions request failed");
                self.suggestions.clear();
            }
        }
    }

    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }

    pub fn clear_suggestions(&mut self) {
        self.suggestions.clear();
    }
}

/// Inputs shorter than the minimum length are not worth a backend round
/// trip, except a bare directory change, which completes against directory
/// entries and is useful immediately.
fn query_qualifies(input: &str, min_query_len: usize) -> bool {
    input.trim().len() >= min_query_len || input.trim() == "cd"
}
