//! Slash commands recognized in trigger comments.

use std::fmt;

/// A command a human can issue on a tracked trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Approve the plan under review and start execution.
    Approve,
    /// Send the plan back for another planning pass.
    Revise,
    /// Request an agent review of the open change request.
    Review,
    /// Request agent fixes on the open change request.
    Fix,
    /// Stop the task and archive it.
    Stop,
}

impl CommandKind {
    /// Scans a comment body for the first slash token and maps it to a
    /// command.
    ///
    /// Matching is case-insensitive. Returns `None` when no token starts
    /// with a slash or the name is not a recognized command.
    #[must_use]
    pub fn parse(body: &str) -> Option<Self> {
        let token = body
            .split_whitespace()
            .find(|word| word.starts_with('/'))?;
        let name = token.strip_prefix('/')?.to_ascii_lowercase();
        match name.as_str() {
            "approve" => Some(Self::Approve),
            "revise" => Some(Self::Revise),
            "review" => Some(Self::Review),
            "fix" => Some(Self::Fix),
            "stop" => Some(Self::Stop),
            _ => None,
        }
    }

    /// Returns the command name without the leading slash.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Revise => "revise",
            Self::Review => "review",
            Self::Fix => "fix",
            Self::Stop => "stop",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
