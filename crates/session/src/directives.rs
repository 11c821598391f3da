//! Local-only directives, handled without touching the backend.

/// Usage reply for inputs that look like a directive but match none.
pub const DIRECTIVE_USAGE: &str = "usage: clear | clear-history";

/// A submitted input that the engine answers locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Reset the visible records of the active session.
    Clear,
    /// Wipe the session's recorded command history.
    ClearHistory,
    /// A `clear-` prefixed input that matches no directive; answered with
    /// [`DIRECTIVE_USAGE`], never an error.
    Usage,
}

/// Classify an input. `None` means it goes to the backend.
pub fn parse(input: &str) -> Option<Directive> {
    match input.trim() {
        "clear" => Some(Directive::Clear),
        "clear-history" => Some(Directive::ClearHistory),
        other if other.starts_with("clear-") => Some(Directive::Usage),
        _ => None,
    }
}
