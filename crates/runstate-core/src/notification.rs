//! Notifications - classified store changes delivered to a coordinator

use std::fmt;

/// One classified change, in feed order
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification {
    /// The global state variable was assigned
    GlobalStateChange { state: String },
    /// A program's `State` variable was assigned
    ProgramStateChange { program: String, state: String },
    /// A program directory appeared under the program-parent directory
    ProgramJoins { program: String },
    /// A program directory was removed from the program-parent directory
    ProgramLeaves { program: String },
    /// Any other assignment that made it through the feed filters
    VarChanged { path: String, value: String },
}

impl Notification {
    /// Short kind label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::GlobalStateChange { .. } => "global-state",
            Notification::ProgramStateChange { .. } => "program-state",
            Notification::ProgramJoins { .. } => "program-joins",
            Notification::ProgramLeaves { .. } => "program-leaves",
            Notification::VarChanged { .. } => "var-changed",
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::GlobalStateChange { state } => write!(f, "global -> {}", state),
            Notification::ProgramStateChange { program, state } => {
                write!(f, "{} -> {}", program, state)
            }
            Notification::ProgramJoins { program } => write!(f, "{} joined", program),
            Notification::ProgramLeaves { program } => write!(f, "{} left", program),
            Notification::VarChanged { path, value } => write!(f, "{} = {}", path, value),
        }
    }
}
