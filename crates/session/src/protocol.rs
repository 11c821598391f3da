//! Wire contract with the pseudo-terminal backend.
//!
//! Event names and sentinel strings here must match the backend
//! byte-for-byte. Incoming events are decoded exactly once, at this
//! boundary, into the closed [`BackendEvent`] enum — nothing downstream
//! ever dispatches on event-name strings.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;

/// Payload of a `command_end` event that signals success. Any other payload
/// (e.g. `"Command failed."`) means failure.
pub const SUCCESS_END_MESSAGE: &str = "Command completed successfully.";

/// Immediate `execute` reply meaning a password prompt is required before
/// the remote command can run.
pub const SSH_NEEDS_PASSWORD_MARKER: &str = "SSH_INTERACTIVE_PASSWORD_PROMPT_REQUESTED";

/// Immediate `execute` reply meaning the command was written into an
/// already-active remote session instead of spawning a new process.
pub const COMMAND_FORWARDED_MARKER: &str = "COMMAND_FORWARDED_TO_ACTIVE_SSH";

/// Immediate `execute` reply for a command whose output will stream in via
/// `command_output` events. Not displayed.
pub const COMMAND_STARTED_MESSAGE: &str = "Command started. Output will stream in real-time.";

/// Privileged variant of [`COMMAND_STARTED_MESSAGE`] (the backend spells
/// this one without the hyphen). Not displayed either.
pub const PRIVILEGED_STARTED_MESSAGE: &str = "Command started. Output will stream in realtime.";

/// Prefix of the marker token the remote `cd` wrapper prints around `pwd`
/// output. Lines echoing it must never reach the display.
pub const REMOTE_CD_MARKER_PREFIX: &str = "__REMOTE_CD_PWD_MARKER_";

/// Prefix of the marker token printed when a remote session first reports
/// its working directory.
pub const INITIAL_REMOTE_PWD_MARKER_PREFIX: &str = "__INITIAL_REMOTE_PWD_MARKER_";

/// Working-directory label shown for a remote session before the first
/// `remote_directory_updated` event arrives.
pub const REMOTE_HOME_PLACEHOLDER: &str = "remote:~";

/// Decoded result of a backend `execute` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecReply {
    /// The command was started (or handled inline); the payload is the
    /// backend's immediate text.
    Started(String),
    /// The command needs a password before it can run remotely.
    PasswordRequired,
    /// The command was forwarded into the already-active remote session.
    ForwardedToRemote,
}

impl ExecReply {
    /// Decode the raw reply string, separating the reserved sentinels from
    /// ordinary immediate text.
    pub fn from_raw(raw: String) -> Self {
        match raw.as_str() {
            SSH_NEEDS_PASSWORD_MARKER => Self::PasswordRequired,
            COMMAND_FORWARDED_MARKER => Self::ForwardedToRemote,
            _ => Self::Started(raw),
        }
    }

    /// True when the immediate text is one of the "output will stream"
    /// acknowledgements, which are never displayed.
    pub fn is_stream_ack(&self) -> bool {
        matches!(
            self,
            Self::Started(text)
                if text == COMMAND_STARTED_MESSAGE || text == PRIVILEGED_STARTED_MESSAGE
        )
    }
}

/// One backend push event, already decoded from its named wire form.
///
/// The `pty_*` events carry their session id in the payload; the command
/// pipeline events are delivered on a per-session channel and carry only
/// their payload.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    /// One line (or partial chunk ending in a newline) of command stdout.
    CommandOutput { line: String },
    /// One chunk of command stderr. Does not complete the record.
    CommandError { line: String },
    /// End-of-command signal; the message determines success or failure.
    CommandEnd { message: String },
    /// The submitted command was written into the active remote session.
    CommandForwardedToSsh { command: String },
    /// A remote command needs a password; carries the original command text.
    SshPreExecPasswordRequest { command: String },
    /// The remote working directory changed (parsed from the cd wrapper).
    RemoteDirectoryUpdated { path: String },
    RemoteSessionStarted { pid: u32 },
    RemoteSessionEnded { pid: u32, reason: String },
    /// Raw PTY bytes for the embedded terminal pane.
    PtyOutput { session_id: String, data: String },
    /// The PTY-backed shell process exited.
    PtyExit { session_id: String, success: bool },
}

#[derive(Deserialize)]
struct SshStartedPayload {
    pid: u32,
}

#[derive(Deserialize)]
struct SshEndedPayload {
    pid: u32,
    reason: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PtyOutputPayload {
    session_id: String,
    data: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PtyExitPayload {
    session_id: String,
    success: bool,
}

impl BackendEvent {
    /// Decode a named event and its JSON payload.
    ///
    /// Unknown event names are an error: the event set is a closed contract,
    /// and silently dropping an unrecognized name would hide a backend skew.
    pub fn decode(name: &str, payload: Value) -> Result<Self> {
        fn text(payload: Value, name: &str) -> Result<String> {
            match payload {
                Value::String(text) => Ok(text),
                other => bail!("event '{name}' expected a string payload, got {other}"),
            }
        }

        let event = match name {
            "command_output" => Self::CommandOutput {
                line: text(payload, name)?,
            },
            "command_error" => Self::CommandError {
                line: text(payload, name)?,
            },
            "command_end" => Self::CommandEnd {
                message: text(payload, name)?,
            },
            "command_forwarded_to_ssh" => Self::CommandForwardedToSsh {
                command: text(payload, name)?,
            },
            "ssh_pre_exec_password_request" => Self::SshPreExecPasswordRequest {
                command: text(payload, name)?,
            },
            "remote_directory_updated" => Self::RemoteDirectoryUpdated {
                path: text(payload, name)?,
            },
            "ssh_session_started" => {
                let payload: SshStartedPayload = serde_json::from_value(payload)
                    .context("malformed ssh_session_started payload")?;
                Self::RemoteSessionStarted { pid: payload.pid }
            }
            "ssh_session_ended" => {
                let payload: SshEndedPayload = serde_json::from_value(payload)
                    .context("malformed ssh_session_ended payload")?;
                Self::RemoteSessionEnded {
                    pid: payload.pid,
                    reason: payload.reason,
                }
            }
            "pty_output" => {
                let payload: PtyOutputPayload =
                    serde_json::from_value(payload).context("malformed pty_output payload")?;
                Self::PtyOutput {
                    session_id: payload.session_id,
                    data: payload.data,
                }
            }
            "pty_exit" => {
                let payload: PtyExitPayload =
                    serde_json::from_value(payload).context("malformed pty_exit payload")?;
                Self::PtyExit {
                    session_id: payload.session_id,
                    success: payload.success,
                }
            }
            other => bail!("unknown backend event '{other}'"),
        };
        Ok(event)
    }
}
