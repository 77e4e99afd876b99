//! Interactive commands and shutdown requests

/// Command typed by the user while a session is running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Show session statistics
    Statistics,
    /// Show the most recent change log lines
    RecentLog,
    /// Show the command list
    Help,
    /// End the session
    Quit,
}

impl Command {
    /// One line per command, for display
    pub const HELP: &'static [(&'static str, &'static str)] = &[
        ("s", "show session statistics"),
        ("l", "show recent identity changes"),
        ("h", "show this help"),
        ("q", "stop rotating and exit"),
    ];

    /// Parse a line of user input
    ///
    /// Only the first non-blank character counts and case is ignored.
    /// Blank or unknown input yields `None`.
    pub fn parse(input: &str) -> Option<Self> {
        let first = input.trim().chars().next()?;
        match first.to_ascii_lowercase() {
            's' => Some(Command::Statistics),
            'l' => Some(Command::RecentLog),
            'h' | '?' => Some(Command::Help),
            'q' => Some(Command::Quit),
            _ => None,
        }
    }
}

/// Request to end the session from outside the command stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownRequest {
    /// What asked for the shutdown (e.g. "SIGINT")
    pub source: String,
}

impl ShutdownRequest {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }
}
