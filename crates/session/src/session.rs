//! Session-multiplexed terminal I/O reconciliation.
//!
//! Owns N concurrent PTY-backed sessions and turns their raw, interleaved
//! streams into clean per-session command records: lifecycle tracking
//! (plain / privileged / remote-forwarded commands with password
//! sub-states), output reconciliation, startup settling, debounced
//! autocomplete, and fuzzy history search. The host UI drives everything
//! through [`SessionEngine`] and implements the [`ControlPort`] /
//! [`HostPort`] boundary traits.

pub mod autocomplete;
pub mod directives;
pub mod engine;
pub mod history;
pub mod lifecycle;
pub mod ports;
pub mod protocol;
pub mod reconciler;
pub mod registry;
pub mod settle;

pub use engine::SessionEngine;
pub use lifecycle::{CommandRecord, PasswordKind};
pub use ports::{ControlPort, HostPort};
pub use protocol::{BackendEvent, ExecReply};
pub use registry::{Session, SessionId, SessionRegistry};
