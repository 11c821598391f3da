//! Startup settling: swallow shell spawn noise until the stream goes quiet.
//!
//! A freshly attached PTY emits unpredictable banner/MOTD/prompt-theme
//! bytes. Every chunk received while unsettled is buffered (never shown)
//! and restarts a quiet-period timer; only when the timer fires with no
//! intervening chunk does the session settle and start displaying output.
//!
//! Timer callbacks and event delivery are not atomic, so `on_timer`
//! re-validates that the quiet period really elapsed before settling —
//! a stale callback scheduled before a late chunk must not fire.

use std::time::{Duration, Instant};

/// What the caller should do with a PTY chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkDisposition {
    /// Still unsettled: the chunk was buffered and must not be displayed.
    Buffered,
    /// Settled: append to the replay buffer and forward for display.
    Forward,
}

/// Per-session startup settling state.
#[derive(Debug, Clone)]
pub struct StartupSettler {
    quiet_period: Duration,
    settled: bool,
    startup_buffer: String,
    deadline: Option<Instant>,
}

impl StartupSettler {
    /// A new settler starts unsettled; it settles once after the first
    /// quiet period and stays settled for the session's lifetime.
    pub fn new(quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            settled: false,
            startup_buffer: String::new(),
            deadline: None,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.settled
    }

    /// When the pending quiet-period timer should fire, if one is armed.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Feed one raw PTY chunk. Unsettled chunks are buffered and restart
    /// the quiet-period timer.
    pub fn on_chunk(&mut self, data: &str, now: Instant) -> ChunkDisposition {
        if self.settled {
            return ChunkDisposition::Forward;
        }
        self.startup_buffer.push_str(data);
        self.deadline = Some(now + self.quiet_period);
        ChunkDisposition::Buffered
    }

    /// Timer callback. Returns true when the session settled on this call.
    ///
    /// Re-validates the deadline: a callback that raced with a late chunk
    /// (which pushed the deadline forward) is stale and ignored.
    pub fn on_timer(&mut self, now: Instant) -> bool {
        if self.settled {
            return false;
        }
        let Some(deadline) = self.deadline else {
            return false;
        };
        if now < deadline {
            // Stale callback; a newer chunk re-armed the timer.
            return false;
        }

        self.settled = true;
        self.deadline = None;
        let discarded = self.startup_buffer.len();
        self.startup_buffer = String::new();
        tracing::debug!(discarded_bytes = discarded, "startup output settled");
        true
    }

    /// Process exit: drop the buffer and any pending timer.
    pub fn on_process_exit(&mut self) {
        self.startup_buffer = String::new();
        self.deadline = None;
    }

    #[cfg(test)]
    fn buffered_bytes(&self) -> usize {
        self.startup_buffer.len()
    }
}
