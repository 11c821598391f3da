//! Boundary traits between the engine and its host.
//!
//! The engine is the logic layer: it never spawns processes, touches the
//! DOM-equivalent, or blocks. All backend I/O goes through [`ControlPort`]
//! and all presentation side effects through [`HostPort`], so the engine
//! can be driven entirely by a fake in tests.

use anyhow::Result;

use crate::protocol::ExecReply;
use crate::registry::SessionId;

/// Request/response control calls into the pseudo-terminal backend.
///
/// Methods returning `Result` surface call rejection to the engine, which
/// renders it as a synthetic error line in the current record. The two
/// fire-and-forget methods return nothing: implementations detach the call
/// and log its outcome, because UI responsiveness after a cancellation or
/// redraw request takes priority over confirmed acknowledgement.
pub trait ControlPort {
    fn create_pty(&self, session: SessionId, cols: u16, rows: u16) -> Result<()>;
    fn resize_pty(&self, session: SessionId, cols: u16, rows: u16) -> Result<()>;
    fn write_pty(&self, session: SessionId, data: &str) -> Result<()>;
    fn close_pty(&self, session: SessionId) -> Result<()>;

    /// Execute a command. The reply is either immediate text or one of the
    /// reserved sentinels (password required / forwarded to remote).
    fn execute(
        &self,
        session: SessionId,
        command: &str,
        ssh_password: Option<&str>,
    ) -> Result<ExecReply>;

    /// Re-invoke a privileged command with the supplied password.
    fn execute_privileged(
        &self,
        session: SessionId,
        command: &str,
        password: &str,
    ) -> Result<ExecReply>;

    /// Request cancellation of the running command. Fire-and-forget.
    fn cancel_command(&self, session: SessionId);

    /// Ask the backend to clear-and-redraw the PTY so the shell repaints a
    /// clean prompt. Fire-and-forget.
    fn request_redraw(&self, session: SessionId);

    fn working_directory(&self, session: SessionId) -> Result<String>;
    fn branch_label(&self, session: SessionId) -> Result<Option<String>>;

    /// Query suggestions for a partial input.
    fn autocomplete(&self, session: SessionId, input: &str) -> Result<Vec<String>>;
}

/// Presentation side effects the engine may request but never performs.
pub trait HostPort {
    /// Show a transient, non-modal message to the user.
    fn notify(&self, message: &str);

    /// Move keyboard focus back to the command input.
    fn request_input_focus(&self);
}
