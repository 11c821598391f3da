//! The engine: owns the session arena, consumes backend events, issues
//! control calls, and drives every timer.
//!
//! Driven entirely from the host's cooperative loop. The host feeds it
//! decoded [`BackendEvent`]s in per-session arrival order, polls
//! [`SessionEngine::next_deadline`] and calls
//! [`SessionEngine::on_timer`] when a deadline passes. No method blocks;
//! no state is shared across threads.
//!
//! Backend call rejections never escape as errors from submission paths:
//! they are rendered as a synthetic error line in the current record and
//! the record completes as failed, so a session can never be left
//! permanently processing.

use std::time::Instant;

use anyhow::Result;
use settings::EngineTuning;

use crate::autocomplete::{AutocompleteCoordinator, DebounceOutcome};
use crate::directives::{self, Directive, DIRECTIVE_USAGE};
use crate::history;
use crate::lifecycle::{CommandRecord, PasswordKind};
use crate::ports::{ControlPort, HostPort};
use crate::protocol::{BackendEvent, ExecReply, REMOTE_HOME_PLACEHOLDER};
use crate::reconciler::reconcile_line;
use crate::registry::{Session, SessionId, SessionRegistry};
use crate::settle::ChunkDisposition;

pub struct SessionEngine<C: ControlPort, H: HostPort> {
    control: C,
    host: H,
    tuning: EngineTuning,
    registry: SessionRegistry,
    autocomplete: AutocompleteCoordinator,
}

impl<C: ControlPort, H: HostPort> SessionEngine<C, H> {
    /// The engine starts with one session already present and active. The
    /// host attaches its PTY with [`SessionEngine::attach`] once it knows
    /// the pane dimensions.
    pub fn new(control: C, host: H, tuning: EngineTuning) -> Self {
        Self {
            control,
            host,
            registry: SessionRegistry::new(tuning.settle_quiet),
            autocomplete: AutocompleteCoordinator::new(
                tuning.autocomplete_debounce,
                tuning.autocomplete_min_query_len,
            ),
            tuning,
        }
    }

    pub fn active_id(&self) -> SessionId {
        self.registry.active_id()
    }

    pub fn active_session(&self) -> &Session {
        self.registry.active()
    }

    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.registry.iter()
    }

    pub fn suggestions(&self) -> &[String] {
        self.autocomplete.suggestions()
    }

    /// Fuzzy-search the active session's command history.
    pub fn history_search(&self, query: &str) -> Vec<String> {
        history::search(
            &self.registry.active().history,
            query,
            self.tuning.history_max_results,
        )
    }

    // Session management

    pub fn attach(&self, id: SessionId, cols: u16, rows: u16) -> Result<()> {
        self.control.create_pty(id, cols, rows)
    }

    pub fn create_session(
        &mut self,
        name: Option<String>,
        activate: bool,
        cols: u16,
        rows: u16,
    ) -> Result<SessionId> {
        let id = self.registry.create(name, activate);
        if let Err(error) = self.control.create_pty(id, cols, rows) {
            let _ = self.registry.close(id);
            return Err(error);
        }
        Ok(id)
    }

    /// Activate a session. The returned session carries the replay buffer
    /// the host repaints from. Unknown ids are a no-op.
    pub fn switch_session(&mut self, id: SessionId) -> Option<&Session> {
        self.autocomplete.cancel_pending();
        self.autocomplete.clear_suggestions();
        self.registry.switch(id)
    }

    /// Close a session. Refused for the last remaining one.
    pub fn close_session(&mut self, id: SessionId) -> Result<()> {
        self.registry.close(id)?;
        if let Err(error) = self.control.close_pty(id) {
            tracing::warn!(session = %id, %error, "pty close failed");
        }
        Ok(())
    }

    pub fn rename_session(&mut self, id: SessionId, new_name: &str) {
        self.registry.rename(id, new_name);
    }

    pub fn resize(&self, id: SessionId, cols: u16, rows: u16) -> Result<()> {
        self.control.resize_pty(id, cols, rows)
    }

    /// Write raw input (keystrokes) into the active session's PTY.
    pub fn write_input(&self, data: &str) -> Result<()> {
        self.control.write_pty(self.registry.active_id(), data)
    }

    // Command submission

    /// Submit user input on the active session. Empty input is ignored;
    /// directives are answered locally; everything else reaches the
    /// backend. Call rejections are rendered into the record, not raised.
    pub fn submit(&mut self, input: &str) {
        let input = input.trim();
        if input.is_empty() {
            return;
        }
        self.autocomplete.cancel_pending();
        self.autocomplete.clear_suggestions();

        if let Some(directive) = directives::parse(input) {
            self.apply_directive(input, directive);
            return;
        }

        let session_id = self.registry.active_id();
        let session = self.registry.active_mut();
        session.record_history(input);
        session.push_record(CommandRecord::running(input));

        if CommandRecord::is_privileged(input) {
            if let Some(record) = session.current_record_mut() {
                record.await_password(PasswordKind::Privileged);
            }
            self.host.request_input_focus();
            return;
        }

        let result = self.control.execute(session_id, input, None);
        self.finish_exec(result);
    }

    /// Supply the password a record is waiting on. The kind recorded at
    /// prompt time picks the re-invocation call.
    pub fn submit_password(&mut self, password: &str) {
        let session_id = self.registry.active_id();
        let waiting = self
            .registry
            .active_mut()
            .current_record_mut()
            .and_then(|record| {
                let kind = record.password_submitted()?;
                Some((kind, record.command.clone()))
            });
        let Some((kind, command)) = waiting else {
            tracing::debug!("password submitted with nothing awaiting one");
            return;
        };

        let result = match kind {
            PasswordKind::Privileged => {
                self.control.execute_privileged(session_id, &command, password)
            }
            PasswordKind::Remote => self.control.execute(session_id, &command, Some(password)),
        };
        self.finish_exec(result);
    }

    /// Cancel the current command: optimistic and immediate. The record
    /// flips to failed before the backend hears anything; the backend call
    /// is fire-and-forget.
    pub fn cancel_current(&mut self) {
        self.autocomplete.cancel_pending();
        let session_id = self.registry.active_id();
        let Some(record) = self.registry.active_mut().current_record_mut() else {
            return;
        };
        record.cancel();
        self.control.cancel_command(session_id);
        self.host.request_input_focus();
    }

    fn apply_directive(&mut self, input: &str, directive: Directive) {
        let session = self.registry.active_mut();
        match directive {
            Directive::Clear => session.clear_records(),
            Directive::ClearHistory => session.clear_history(),
            Directive::Usage => session.push_record(CommandRecord::local(
                input,
                vec![DIRECTIVE_USAGE.to_string()],
                false,
            )),
        }
    }

    fn finish_exec(&mut self, result: Result<ExecReply>) {
        match result {
            Ok(reply) => self.apply_exec_reply(reply),
            Err(error) => self.fail_current(&error),
        }
    }

    fn apply_exec_reply(&mut self, reply: ExecReply) {
        if reply.is_stream_ack() {
            // Output arrives via command_output events; the ack itself is
            // never displayed.
            return;
        }
        let session = self.registry.active_mut();
        match reply {
            ExecReply::Started(text) => {
                let Some(record) = session.current_record_mut() else {
                    util::debug_panic!("exec reply arrived with no open record");
                    return;
                };
                for line in text.lines() {
                    record.push_line(line);
                }
                record.complete_with(Some(true));
            }
            ExecReply::PasswordRequired => {
                if let Some(record) = session.current_record_mut() {
                    record.await_password(PasswordKind::Remote);
                }
                self.host.request_input_focus();
            }
            ExecReply::ForwardedToRemote => {
                if let Some(record) = session.current_record_mut() {
                    mark_forwarded(record);
                }
            }
        }
    }

    fn fail_current(&mut self, error: &anyhow::Error) {
        tracing::warn!(%error, "backend call rejected");
        if let Some(record) = self.registry.active_mut().current_record_mut() {
            record.push_line(format!("Error: {error:#}"));
            record.complete_with(Some(false));
        }
    }

    // Autocomplete

    /// Feed one input-field keystroke. Suggestions are only gathered while
    /// the session is idle (no running command, no password prompt).
    pub fn on_keystroke(&mut self, input: &str, now: Instant) {
        if self.registry.active().current_record().is_some() {
            self.autocomplete.cancel_pending();
            return;
        }
        self.autocomplete.on_keystroke(input, now);
    }

    // Timers

    /// The earliest pending deadline across settle timers and the
    /// autocomplete debounce, for the host to schedule a wakeup.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.registry
            .iter()
            .filter_map(|session| session.settler.deadline())
            .chain(self.autocomplete.deadline())
            .min()
    }

    /// Fire every timer whose deadline has passed. Stale timers (re-armed
    /// since scheduling) are ignored by their owners.
    pub fn on_timer(&mut self, now: Instant) {
        let ids: Vec<SessionId> = self.registry.iter().map(|session| session.id).collect();
        for id in ids {
            let Some(session) = self.registry.get_mut(id) else {
                continue;
            };
            if session.settler.on_timer(now) {
                // A settled session starts from a clean frame: nothing of
                // the startup noise is replayed on switch, and the shell
                // repaints a fresh prompt.
                session.replay_buffer.clear();
                self.control.request_redraw(id);
            }
        }

        if let Some(DebounceOutcome::Dispatch { token, input }) = self.autocomplete.on_timer(now) {
            let active = self.registry.active_id();
            let result = self.control.autocomplete(active, &input);
            self.autocomplete.on_response(token, result);
        }
    }

    // Backend events

    /// Apply one decoded backend event.
    ///
    /// `origin` is the session whose channel delivered the event; the
    /// `pty_*` events carry their own session id and ignore it. The return
    /// value is PTY data the host should paint, present only for settled
    /// `pty_output`.
    pub fn apply_event(
        &mut self,
        origin: SessionId,
        event: BackendEvent,
        now: Instant,
    ) -> Option<String> {
        match event {
            BackendEvent::CommandOutput { line } => self.append_output(origin, &line),
            BackendEvent::CommandError { line } => self.append_error(origin, &line),
            BackendEvent::CommandEnd { message } => self.complete_current(origin, &message),
            BackendEvent::CommandForwardedToSsh { command } => {
                self.on_forwarded(origin, command);
            }
            BackendEvent::SshPreExecPasswordRequest { command } => {
                self.on_remote_password_request(origin, command);
            }
            BackendEvent::RemoteDirectoryUpdated { path } => {
                if let Some(session) = self.registry.get_mut(origin) {
                    session.working_directory = path;
                }
            }
            BackendEvent::RemoteSessionStarted { pid } => self.on_remote_started(origin, pid),
            BackendEvent::RemoteSessionEnded { pid, reason } => {
                self.on_remote_ended(origin, pid, &reason);
            }
            BackendEvent::PtyOutput { session_id, data } => {
                return self.on_pty_output(&session_id, data, now);
            }
            BackendEvent::PtyExit { session_id, success } => self.on_pty_exit(&session_id, success),
        }
        None
    }

    fn append_output(&mut self, session_id: SessionId, raw_line: &str) {
        let Some(session) = self.registry.get_mut(session_id) else {
            tracing::debug!(session = %session_id, "output for unknown session dropped");
            return;
        };
        let remote = session.remote_active;
        let Some(record) = session.current_record_mut() else {
            tracing::debug!(session = %session_id, "output with no open record dropped");
            return;
        };

        let line = raw_line.trim_end_matches(['\r', '\n']);
        let reconciled = reconcile_line(line, &record.command, remote, record.expecting_echo);
        record.expecting_echo = reconciled.expecting_echo;
        if let Some(display) = reconciled.display {
            record.push_line(display);
        }
    }

    /// Mid-stream error lines append without completing: the record may
    /// still receive further output.
    fn append_error(&mut self, session_id: SessionId, raw_line: &str) {
        let Some(record) = self
            .registry
            .get_mut(session_id)
            .and_then(Session::current_record_mut)
        else {
            tracing::debug!(session = %session_id, "error line with no open record dropped");
            return;
        };
        record.push_line(raw_line.trim_end_matches(['\r', '\n']));
    }

    fn complete_current(&mut self, session_id: SessionId, message: &str) {
        let Some(session) = self.registry.get_mut(session_id) else {
            return;
        };
        let Some(record) = session.current_record_mut() else {
            tracing::debug!(session = %session_id, "command_end with no open record");
            return;
        };
        record.complete_with_message(message);

        if !session.remote_active {
            self.refresh_labels(session_id);
        }
        self.host.request_input_focus();
    }

    fn on_forwarded(&mut self, session_id: SessionId, command: String) {
        let Some(session) = self.registry.get_mut(session_id) else {
            return;
        };
        match session.current_record_mut() {
            Some(record) if record.command == command => mark_forwarded(record),
            _ => session.push_record(CommandRecord::forwarded(command)),
        }
    }

    fn on_remote_password_request(&mut self, session_id: SessionId, command: String) {
        let Some(session) = self.registry.get_mut(session_id) else {
            return;
        };
        match session.current_record_mut() {
            Some(record) if record.command == command => {
                record.await_password(PasswordKind::Remote);
            }
            _ => {
                let mut record = CommandRecord::running(command);
                record.await_password(PasswordKind::Remote);
                session.push_record(record);
            }
        }
        self.host.request_input_focus();
    }

    fn on_remote_started(&mut self, session_id: SessionId, pid: u32) {
        let Some(session) = self.registry.get_mut(session_id) else {
            return;
        };
        session.remote_active = true;
        session.working_directory = REMOTE_HOME_PLACEHOLDER.to_string();
        if session.remote_target.is_none() {
            let target = session
                .current_record()
                .and_then(|record| remote_target_from_command(&record.command));
            session.remote_target = target;
        }
        tracing::debug!(session = %session_id, pid, "remote session started");
    }

    fn on_remote_ended(&mut self, session_id: SessionId, pid: u32, reason: &str) {
        {
            let Some(session) = self.registry.get_mut(session_id) else {
                return;
            };
            if let Some(record) = session.current_record_mut() {
                if record.forwarded {
                    // Forwarded records have no per-command end signal;
                    // the session's own end is theirs. Success stays
                    // unknown.
                    record.complete_with(None);
                }
            }
            session.remote_active = false;
            session.remote_target = None;
            tracing::debug!(session = %session_id, pid, reason, "remote session ended");
        }
        self.refresh_labels(session_id);
        self.host.notify(reason);
    }

    fn on_pty_output(&mut self, raw_id: &str, data: String, now: Instant) -> Option<String> {
        let session_id = match SessionId::parse(raw_id) {
            Ok(id) => id,
            Err(error) => {
                tracing::warn!(%error, "pty output dropped");
                return None;
            }
        };
        let Some(session) = self.registry.get_mut(session_id) else {
            tracing::debug!(session = %session_id, "pty output for unknown session dropped");
            return None;
        };
        match session.settler.on_chunk(&data, now) {
            ChunkDisposition::Buffered => None,
            ChunkDisposition::Forward => {
                session.replay_buffer.push_str(&data);
                Some(data)
            }
        }
    }

    fn on_pty_exit(&mut self, raw_id: &str, success: bool) {
        let Ok(session_id) = SessionId::parse(raw_id) else {
            tracing::warn!(raw_id, "pty exit with bad session id");
            return;
        };
        let Some(session) = self.registry.get_mut(session_id) else {
            return;
        };
        session.settler.on_process_exit();
        if let Some(record) = session.current_record_mut() {
            record.complete_with(Some(success));
        }
        if !success {
            tracing::warn!(session = %session_id, "shell process exited abnormally");
        }
    }

    fn refresh_labels(&mut self, session_id: SessionId) {
        let working_directory = self.control.working_directory(session_id);
        let branch = self.control.branch_label(session_id);
        let Some(session) = self.registry.get_mut(session_id) else {
            return;
        };
        match working_directory {
            Ok(path) => session.working_directory = path,
            Err(error) => tracing::warn!(%error, "working directory query failed"),
        }
        match branch {
            Ok(label) => session.branch = label,
            Err(error) => tracing::warn!(%error, "branch label query failed"),
        }
    }
}

fn mark_forwarded(record: &mut CommandRecord) {
    record.streaming = true;
    record.expecting_echo = true;
    record.forwarded = true;
}

/// Pull a `user@host` label out of a command line (`ssh -p 2222 me@box`).
fn remote_target_from_command(command: &str) -> Option<String> {
    command
        .split_whitespace()
        .skip(1)
        .find(|token| !token.starts_with('-') && token.contains('@'))
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::time::Duration;
    use tracing_test::traced_test;

    use crate::lifecycle::{PASSWORD_PLACEHOLDER, PROCESSING_PLACEHOLDER};
    use crate::protocol::{COMMAND_STARTED_MESSAGE, SUCCESS_END_MESSAGE};

    struct FakeControl {
        calls: RefCell<Vec<String>>,
        exec_replies: RefCell<VecDeque<Result<ExecReply>>>,
        suggestions: RefCell<Result<Vec<String>>>,
    }

    impl FakeControl {
        fn new() -> Self {
            Self {
                calls: RefCell::default(),
                exec_replies: RefCell::default(),
                suggestions: RefCell::new(Ok(Vec::new())),
            }
        }

        fn reply_with(&self, reply: ExecReply) {
            self.exec_replies.borrow_mut().push_back(Ok(reply));
        }

        fn fail_with(&self, message: &str) {
            self.exec_replies.borrow_mut().push_back(Err(anyhow!("{message}")));
        }

        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }

        fn next_reply(&self) -> Result<ExecReply> {
            self.exec_replies
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Ok(ExecReply::Started(COMMAND_STARTED_MESSAGE.into())))
        }
    }

    impl ControlPort for &FakeControl {
        fn create_pty(&self, _session: SessionId, _cols: u16, _rows: u16) -> Result<()> {
            self.calls.borrow_mut().push("create_pty".into());
            Ok(())
        }

        fn resize_pty(&self, _session: SessionId, _cols: u16, _rows: u16) -> Result<()> {
            self.calls.borrow_mut().push("resize_pty".into());
            Ok(())
        }

        fn write_pty(&self, _session: SessionId, data: &str) -> Result<()> {
            self.calls.borrow_mut().push(format!("write_pty {data}"));
            Ok(())
        }

        fn close_pty(&self, _session: SessionId) -> Result<()> {
            self.calls.borrow_mut().push("close_pty".into());
            Ok(())
        }

        fn execute(
            &self,
            _session: SessionId,
            command: &str,
            ssh_password: Option<&str>,
        ) -> Result<ExecReply> {
            let call = match ssh_password {
                Some(_) => format!("execute+password {command}"),
                None => format!("execute {command}"),
            };
            self.calls.borrow_mut().push(call);
            self.next_reply()
        }

        fn execute_privileged(
            &self,
            _session: SessionId,
            command: &str,
            _password: &str,
        ) -> Result<ExecReply> {
            self.calls
                .borrow_mut()
                .push(format!("execute_privileged {command}"));
            self.next_reply()
        }

        fn cancel_command(&self, _session: SessionId) {
            self.calls.borrow_mut().push("cancel_command".into());
        }

        fn request_redraw(&self, _session: SessionId) {
            self.calls.borrow_mut().push("request_redraw".into());
        }

        fn working_directory(&self, _session: SessionId) -> Result<String> {
            Ok("/home/user".into())
        }

        fn branch_label(&self, _session: SessionId) -> Result<Option<String>> {
            Ok(Some("main".into()))
        }

        fn autocomplete(&self, _session: SessionId, input: &str) -> Result<Vec<String>> {
            self.calls.borrow_mut().push(format!("autocomplete {input}"));
            match &*self.suggestions.borrow() {
                Ok(suggestions) => Ok(suggestions.clone()),
                Err(error) => Err(anyhow!("{error}")),
            }
        }
    }

    #[derive(Default)]
    struct FakeHost {
        notifications: RefCell<Vec<String>>,
        focus_requests: RefCell<usize>,
    }

    impl HostPort for &FakeHost {
        fn notify(&self, message: &str) {
            self.notifications.borrow_mut().push(message.to_owned());
        }

        fn request_input_focus(&self) {
            *self.focus_requests.borrow_mut() += 1;
        }
    }

    fn engine<'a>(
        control: &'a FakeControl,
        host: &'a FakeHost,
    ) -> SessionEngine<&'a FakeControl, &'a FakeHost> {
        SessionEngine::new(control, host, EngineTuning::default())
    }

    fn last_record<'a>(
        engine: &'a SessionEngine<&FakeControl, &FakeHost>,
    ) -> &'a CommandRecord {
        engine.active_session().records.last().unwrap()
    }

    #[test]
    fn immediate_reply_text_completes_the_record() {
        let (control, host) = (FakeControl::new(), FakeHost::default());
        control.reply_with(ExecReply::Started("Changed directory to /tmp".into()));
        let mut engine = engine(&control, &host);

        engine.submit("cd /tmp");

        let record = last_record(&engine);
        assert_eq!(record.output, vec!["Changed directory to /tmp".to_string()]);
        assert_eq!(record.success, Some(true));
        assert!(record.complete);
    }

    #[test]
    fn stream_ack_is_not_displayed_and_output_streams_in() {
        let (control, host) = (FakeControl::new(), FakeHost::default());
        let mut engine = engine(&control, &host);
        let id = engine.active_id();
        let now = Instant::now();

        engine.submit("ls -la");
        assert!(last_record(&engine).output.is_empty());
        assert!(!last_record(&engine).complete);

        engine.apply_event(id, BackendEvent::CommandOutput { line: "total 42\n".into() }, now);
        engine.apply_event(
            id,
            BackendEvent::CommandEnd { message: SUCCESS_END_MESSAGE.into() },
            now,
        );

        let record = last_record(&engine);
        assert_eq!(record.output, vec!["total 42".to_string()]);
        assert_eq!(record.success, Some(true));
        // Labels refreshed after a local command completes.
        assert_eq!(engine.active_session().working_directory, "/home/user");
        assert_eq!(engine.active_session().branch.as_deref(), Some("main"));
    }

    #[test]
    fn privileged_submission_waits_for_password_without_backend_calls() {
        let (control, host) = (FakeControl::new(), FakeHost::default());
        let mut engine = engine(&control, &host);

        engine.submit("sudo rm -rf /tmp/x");

        assert!(control.calls().is_empty());
        let record = last_record(&engine);
        assert_eq!(record.awaiting_password, Some(PasswordKind::Privileged));
        assert_eq!(record.output, vec![PASSWORD_PLACEHOLDER.to_string()]);
        assert_eq!(*host.focus_requests.borrow(), 1);
    }

    #[test]
    fn password_submission_reinvokes_privileged_call() {
        let (control, host) = (FakeControl::new(), FakeHost::default());
        let mut engine = engine(&control, &host);

        engine.submit("sudo apt update");
        engine.submit_password("hunter2");

        assert_eq!(control.calls(), vec!["execute_privileged sudo apt update"]);
        assert_eq!(
            last_record(&engine).output,
            vec![PROCESSING_PLACEHOLDER.to_string()]
        );
    }

    #[test]
    fn remote_password_sentinel_reinvokes_with_password() {
        let (control, host) = (FakeControl::new(), FakeHost::default());
        control.reply_with(ExecReply::PasswordRequired);
        let mut engine = engine(&control, &host);

        engine.submit("ssh me@box");
        assert_eq!(
            last_record(&engine).awaiting_password,
            Some(PasswordKind::Remote)
        );
        // No placeholder for the remote kind.
        assert!(last_record(&engine).output.is_empty());

        engine.submit_password("s3cret");
        assert_eq!(
            control.calls(),
            vec!["execute ssh me@box", "execute+password ssh me@box"]
        );
    }

    #[test]
    fn rejected_call_renders_synthetic_error_and_fails() {
        let (control, host) = (FakeControl::new(), FakeHost::default());
        control.fail_with("backend unavailable");
        let mut engine = engine(&control, &host);

        engine.submit("ls");

        let record = last_record(&engine);
        assert!(record.complete);
        assert_eq!(record.success, Some(false));
        assert_eq!(record.output, vec!["Error: backend unavailable".to_string()]);
        assert!(!record.is_processing());
    }

    #[test]
    fn clear_directive_resets_records_but_not_history() {
        let (control, host) = (FakeControl::new(), FakeHost::default());
        control.reply_with(ExecReply::Started("ok".into()));
        let mut engine = engine(&control, &host);

        engine.submit("echo hi");
        engine.submit("clear");

        assert!(engine.active_session().records.is_empty());
        assert_eq!(engine.history_search("echo"), vec!["echo hi".to_string()]);

        engine.submit("clear-history");
        assert!(engine.history_search("echo").is_empty());
    }

    #[test]
    fn unknown_clear_variant_gets_usage_reply() {
        let (control, host) = (FakeControl::new(), FakeHost::default());
        let mut engine = engine(&control, &host);

        engine.submit("clear-buffers");

        let record = last_record(&engine);
        assert!(record.complete);
        assert_eq!(record.success, Some(false));
        assert_eq!(record.output, vec![DIRECTIVE_USAGE.to_string()]);
        assert!(control.calls().is_empty());
    }

    #[test]
    fn forwarded_sentinel_marks_the_record() {
        let (control, host) = (FakeControl::new(), FakeHost::default());
        control.reply_with(ExecReply::ForwardedToRemote);
        let mut engine = engine(&control, &host);

        engine.submit("ls");
        let record = last_record(&engine);
        assert!(record.forwarded);
        assert!(record.streaming);
        assert!(record.expecting_echo);
        assert!(!record.complete);
    }

    #[test]
    fn cancellation_is_optimistic_and_fire_and_forget() {
        let (control, host) = (FakeControl::new(), FakeHost::default());
        let mut engine = engine(&control, &host);

        engine.submit("sleep 1000");
        engine.cancel_current();

        let record = last_record(&engine);
        assert!(record.complete);
        assert_eq!(record.success, Some(false));
        assert_eq!(
            control.calls(),
            vec!["execute sleep 1000".to_string(), "cancel_command".to_string()]
        );
    }

    #[test]
    fn keystrokes_are_ignored_while_a_command_runs() {
        let (control, host) = (FakeControl::new(), FakeHost::default());
        let mut engine = engine(&control, &host);
        let now = Instant::now();

        engine.submit("sleep 10");
        engine.on_keystroke("git", now);
        assert_eq!(engine.next_deadline(), None);
    }

    #[test]
    fn debounce_dispatches_through_the_port() {
        let (control, host) = (FakeControl::new(), FakeHost::default());
        *control.suggestions.borrow_mut() = Ok(vec!["git status".into()]);
        let mut engine = engine(&control, &host);
        let now = Instant::now();

        engine.on_keystroke("git", now);
        let deadline = engine.next_deadline().unwrap();
        engine.on_timer(deadline);

        assert_eq!(engine.suggestions(), ["git status"]);
        assert_eq!(control.calls(), vec!["autocomplete git"]);
    }

    #[test]
    fn settling_clears_replay_and_requests_redraw() {
        let (control, host) = (FakeControl::new(), FakeHost::default());
        let mut engine = engine(&control, &host);
        let id = engine.active_id();
        let now = Instant::now();

        let painted = engine.apply_event(
            id,
            BackendEvent::PtyOutput {
                session_id: id.to_string(),
                data: "Welcome\n".into(),
            },
            now,
        );
        assert_eq!(painted, None);

        let deadline = engine.next_deadline().unwrap();
        engine.on_timer(deadline);
        assert_eq!(control.calls(), vec!["request_redraw"]);
        assert!(engine.active_session().replay_buffer.is_empty());

        // Post-settle output is painted and replayable.
        let painted = engine.apply_event(
            id,
            BackendEvent::PtyOutput {
                session_id: id.to_string(),
                data: "$ ".into(),
            },
            now + Duration::from_secs(1),
        );
        assert_eq!(painted.as_deref(), Some("$ "));
        assert_eq!(engine.active_session().replay_buffer, "$ ");
    }

    #[test]
    fn remote_session_lifecycle_updates_labels() {
        let (control, host) = (FakeControl::new(), FakeHost::default());
        control.reply_with(ExecReply::Started(COMMAND_STARTED_MESSAGE.into()));
        let mut engine = engine(&control, &host);
        let id = engine.active_id();
        let now = Instant::now();

        engine.submit("ssh -p 2222 me@box");
        engine.apply_event(id, BackendEvent::RemoteSessionStarted { pid: 7 }, now);

        let session = engine.active_session();
        assert!(session.remote_active);
        assert_eq!(session.working_directory, REMOTE_HOME_PLACEHOLDER);
        assert_eq!(session.remote_target.as_deref(), Some("me@box"));

        engine.apply_event(
            id,
            BackendEvent::RemoteDirectoryUpdated { path: "remote:/srv/app".into() },
            now,
        );
        assert_eq!(engine.active_session().working_directory, "remote:/srv/app");

        engine.apply_event(
            id,
            BackendEvent::RemoteSessionEnded { pid: 7, reason: "SSH session ended.".into() },
            now,
        );
        let session = engine.active_session();
        assert!(!session.remote_active);
        assert_eq!(session.remote_target, None);
        assert_eq!(session.working_directory, "/home/user");
        assert_eq!(host.notifications.borrow().as_slice(), ["SSH session ended."]);
    }

    #[traced_test]
    #[test]
    fn events_with_no_open_record_are_dropped() {
        let (control, host) = (FakeControl::new(), FakeHost::default());
        let mut engine = engine(&control, &host);
        let id = engine.active_id();
        let now = Instant::now();

        engine.apply_event(id, BackendEvent::CommandOutput { line: "orphan".into() }, now);
        engine.apply_event(id, BackendEvent::CommandEnd { message: "done".into() }, now);
        assert!(engine.active_session().records.is_empty());
        assert!(logs_contain("no open record"));
    }

    #[test]
    fn pty_exit_completes_open_record_and_discards_settle_state() {
        let (control, host) = (FakeControl::new(), FakeHost::default());
        let mut engine = engine(&control, &host);
        let id = engine.active_id();
        let now = Instant::now();

        engine.submit("make");
        engine.apply_event(
            id,
            BackendEvent::PtyExit { session_id: id.to_string(), success: false },
            now,
        );

        let record = last_record(&engine);
        assert!(record.complete);
        assert_eq!(record.success, Some(false));
        assert_eq!(engine.next_deadline(), None);
    }

    #[test]
    fn switching_sessions_drops_pending_suggestions() {
        let (control, host) = (FakeControl::new(), FakeHost::default());
        let mut engine = engine(&control, &host);
        let now = Instant::now();

        let second = engine.create_session(None, false, 80, 24).unwrap();
        engine.on_keystroke("git", now);
        assert!(engine.next_deadline().is_some());

        engine.switch_session(second);
        assert_eq!(engine.next_deadline(), None);
        assert!(engine.suggestions().is_empty());
    }
}
