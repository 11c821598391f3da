//! Output reconciliation: raw line in, displayable line (maybe) out.
//!
//! Pure per-line transform with no session state: the caller threads the
//! echo-suppression flag through. Strips display-breaking escape
//! sequences, suppresses remote shell echoes and bare prompts, and drops
//! lines that stripping reduced to nothing.
//!
//! The echo and bare-prompt checks are heuristics: output that happens to
//! contain the command text verbatim, or that coincidentally looks like a
//! prompt (`user@host $`), will be suppressed. This is a known limitation
//! of reconciling a multiplexed byte stream and is deliberately not
//! "corrected" with stricter detection.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::protocol::{INITIAL_REMOTE_PWD_MARKER_PREFIX, REMOTE_CD_MARKER_PREFIX};

/// ECMA-48 CSI sequences: `ESC [`, parameter bytes, intermediate bytes,
/// one final byte.
static CSI_SEQUENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1b\[[0-9:;<=>?]*[ -/]*[@-~]").unwrap());

/// OSC sequences terminated by BEL (terminal-title updates and friends).
static OSC_SEQUENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\x1b\][^\x07]*\x07").unwrap());

/// A line that consists only of a shell prompt: an optional
/// `user@host[:path]` segment followed by a `$`, `#`, or `%` terminator
/// and nothing else.
static BARE_PROMPT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[A-Za-z0-9._-]+@[A-Za-z0-9._-]+(?::[^\s$#%]*)?\s*)?[$#%]$").unwrap()
});

/// Result of reconciling one raw line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    /// The line to display, or `None` when it was suppressed.
    pub display: Option<String>,
    /// Updated echo-suppression flag for the record.
    pub expecting_echo: bool,
}

impl Reconciled {
    fn suppressed(expecting_echo: bool) -> Self {
        Self {
            display: None,
            expecting_echo,
        }
    }
}

/// Reconcile one raw output line against the current command.
///
/// Steps, in order: strip CSI escapes, strip OSC title sequences, handle
/// remote echo suppression (directory-marker lines, command echoes, missed
/// echoes), suppress remote bare-prompt lines, and suppress lines that
/// stripping emptied out.
pub fn reconcile_line(
    raw_line: &str,
    command_text: &str,
    remote_session: bool,
    expecting_echo: bool,
) -> Reconciled {
    let cleaned = strip_control_sequences(raw_line);
    let trimmed = cleaned.trim();
    let mut expecting_echo = expecting_echo;

    if remote_session && expecting_echo {
        let command = command_text.trim();
        if is_directory_change(command) && contains_remote_cd_marker(trimmed) {
            return Reconciled::suppressed(false);
        }
        if !command.is_empty() && trimmed.contains(command) {
            // Shell echo of the command we just sent.
            return Reconciled::suppressed(false);
        }
        if !trimmed.is_empty() {
            // Echo assumed missed; don't wait forever.
            expecting_echo = false;
        }
    }

    if remote_session && BARE_PROMPT.is_match(trimmed) {
        return Reconciled::suppressed(expecting_echo);
    }

    if trimmed.is_empty() && !raw_line.trim().is_empty() {
        // Stripping artifact, not an intentional blank line.
        return Reconciled::suppressed(expecting_echo);
    }

    Reconciled {
        display: Some(cleaned),
        expecting_echo,
    }
}

/// Strip CSI and OSC escape sequences, leaving the printable text.
///
/// Runs to a fixpoint: removing one sequence can expose another (split or
/// nested escapes), and a single pass would leave it behind.
pub fn strip_control_sequences(line: &str) -> String {
    let mut current = line.to_owned();
    loop {
        let without_csi = CSI_SEQUENCE.replace_all(&current, "");
        let next = OSC_SEQUENCE.replace_all(&without_csi, "").into_owned();
        if next == current {
            return next;
        }
        current = next;
    }
}

/// Whether the command is a directory change (`cd` with or without args).
fn is_directory_change(command: &str) -> bool {
    command == "cd" || command.starts_with("cd ")
}

/// Whether a cleaned line carries one of the remote cd wrapper's marker
/// tokens.
fn contains_remote_cd_marker(line: &str) -> bool {
    line.contains(REMOTE_CD_MARKER_PREFIX) || line.contains(INITIAL_REMOTE_PWD_MARKER_PREFIX)
}
