//! Centralized configuration constants for the session engine.
//!
//! These are the defaults; `Config` values loaded from the TOML file
//! override them at startup via `EngineTuning`.

/// Startup settling configuration.
pub mod settle {
    use std::time::Duration;

    /// Quiet period with no PTY output before a session counts as settled.
    ///
    /// Shell startup emits unpredictable banner/MOTD content; everything
    /// received before this much silence is buffered and discarded.
    pub const QUIET_PERIOD: Duration = Duration::from_millis(300);
}

/// Autocomplete configuration.
pub mod autocomplete {
    use std::time::Duration;

    /// Debounce delay between the last keystroke and the suggestion request.
    pub const DEBOUNCE_DELAY: Duration = Duration::from_millis(200);

    /// Minimum input length before a suggestion request is dispatched.
    ///
    /// Directory-navigation input (`cd` with no argument) is exempt so the
    /// user still gets a directory listing from two characters.
    pub const MIN_QUERY_LEN: usize = 3;
}

/// History search configuration.
pub mod history {
    /// Maximum number of fuzzy-search results returned.
    pub const MAX_RESULTS: usize = 10;
}
