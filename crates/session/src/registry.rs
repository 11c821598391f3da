//! Session arena: all per-session state, addressed by opaque id.
//!
//! Every mutable per-session map the engine needs (records, buffers,
//! settlers) lives inside one [`Session`] value in an insertion-ordered
//! arena. Exactly one session is active at a time; the registry never
//! becomes empty.

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use collections::IndexMap;
use uuid::Uuid;

use crate::history::HistoryEntry;
use crate::lifecycle::CommandRecord;
use crate::settle::StartupSettler;

/// Opaque session identity, stable across the wire (the backend echoes it
/// back in `pty_output`/`pty_exit` payloads).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an id echoed back by the backend.
    pub fn parse(raw: &str) -> Result<Self> {
        let uuid = Uuid::parse_str(raw).with_context(|| format!("invalid session id '{raw}'"))?;
        Ok(Self(uuid))
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One terminal session and everything it owns.
#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    pub name: String,
    /// Executed commands and their reconciled output, submission order.
    pub records: Vec<CommandRecord>,
    /// Command history for fuzzy search. Survives a display clear.
    pub history: Vec<HistoryEntry>,
    /// Working-directory label shown in the UI.
    pub working_directory: String,
    /// Version-control branch label, when the cwd is inside a repository.
    pub branch: Option<String>,
    /// True while an interactive remote session is attached.
    pub remote_active: bool,
    /// `user@host` label of the attached remote session.
    pub remote_target: Option<String>,
    /// Bytes already displayed, replayed to repaint on session switch.
    pub replay_buffer: String,
    pub settler: StartupSettler,
}

impl Session {
    fn new(name: String, settle_quiet_period: Duration) -> Self {
        Self {
            id: SessionId::new(),
            name,
            records: Vec::new(),
            history: Vec::new(),
            working_directory: String::new(),
            branch: None,
            remote_active: false,
            remote_target: None,
            replay_buffer: String::new(),
            settler: StartupSettler::new(settle_quiet_period),
        }
    }

    /// The record that incoming output events target: the last one, while
    /// it is incomplete. Events with no current record are dropped.
    pub fn current_record(&self) -> Option<&CommandRecord> {
        self.records.last().filter(|record| !record.complete)
    }

    pub fn current_record_mut(&mut self) -> Option<&mut CommandRecord> {
        self.records.last_mut().filter(|record| !record.complete)
    }

    /// Append a new record, first closing any record still open so that at
    /// most one record per session is ever incomplete.
    pub fn push_record(&mut self, record: CommandRecord) {
        if let Some(open) = self.current_record_mut() {
            tracing::debug!(command = %open.command, "closing open record before a new submission");
            open.complete_with(None);
        }
        self.records.push(record);
    }

    pub fn record_history(&mut self, command: &str) {
        self.history.push(HistoryEntry::new(command));
    }

    /// Display clear: drops records but keeps searchable history.
    pub fn clear_records(&mut self) {
        self.records.clear();
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }
}

/// Insertion-ordered session arena with exactly one active session.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: IndexMap<SessionId, Session>,
    active: SessionId,
    settle_quiet_period: Duration,
    created_count: usize,
}

impl SessionRegistry {
    /// A registry is born with its first session already present and
    /// active; it can never be emptied afterwards.
    pub fn new(settle_quiet_period: Duration) -> Self {
        let mut registry = Self {
            sessions: IndexMap::default(),
            active: SessionId::new(),
            settle_quiet_period,
            created_count: 0,
        };
        registry.create(None, true);
        registry
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn active_id(&self) -> SessionId {
        self.active
    }

    pub fn active(&self) -> &Session {
        &self.sessions[&self.active]
    }

    pub fn active_mut(&mut self) -> &mut Session {
        self.sessions
            .get_mut(&self.active)
            .unwrap_or_else(|| unreachable!("active session missing from arena"))
    }

    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn get_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    /// Create a session. The first session, or one created with
    /// `activate`, becomes active.
    pub fn create(&mut self, name: Option<String>, activate: bool) -> SessionId {
        self.created_count += 1;
        let name = name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| format!("Session {}", self.created_count));
        let session = Session::new(name, self.settle_quiet_period);
        let id = session.id;
        let first = self.sessions.is_empty();
        self.sessions.insert(id, session);
        if first || activate {
            self.active = id;
        }
        tracing::debug!(session = %id, active = first || activate, "session created");
        id
    }

    /// Activate `id` and return the session for state restoration. Unknown
    /// ids are a no-op. Live state needs no explicit save step: the arena
    /// owns it at all times.
    pub fn switch(&mut self, id: SessionId) -> Option<&Session> {
        if !self.sessions.contains_key(&id) {
            tracing::warn!(session = %id, "switch to unknown session ignored");
            return None;
        }
        self.active = id;
        self.sessions.get(&id)
    }

    /// Close a session. Refused when it is the last one. When the active
    /// session closes, activation moves to the preceding index (or 0).
    pub fn close(&mut self, id: SessionId) -> Result<Session> {
        if self.sessions.len() == 1 {
            anyhow::bail!("cannot close the last session");
        }
        let (index, _, mut session) = self
            .sessions
            .shift_remove_full(&id)
            .with_context(|| format!("unknown session '{id}'"))?;
        session.settler.on_process_exit();

        if self.active == id {
            let successor_index = index.saturating_sub(1);
            let (&successor, _) = self
                .sessions
                .get_index(successor_index)
                .unwrap_or_else(|| unreachable!("non-empty arena has index 0"));
            self.active = successor;
            tracing::debug!(closed = %id, activated = %successor, "active session closed");
        }
        Ok(session)
    }

    /// Rename a session. Blank names (after trimming) are ignored.
    pub fn rename(&mut self, id: SessionId, new_name: &str) {
        let trimmed = new_name.trim();
        if trimmed.is_empty() {
            return;
        }
        if let Some(session) = self.sessions.get_mut(&id) {
            session.name = trimmed.to_owned();
        }
    }
}
