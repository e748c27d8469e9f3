//! Program definitions

use serde::{Deserialize, Serialize};

/// Everything a coordinator records about a program, except its state
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgramDefinition {
    /// Disabled programs take no part in transitions
    pub enabled: bool,
    /// Standalone programs run on their own and are not waited for
    pub standalone: bool,
    /// Executable path
    pub path: String,
    /// Host the program runs on
    pub host: String,
    /// Ring buffer the program writes to
    pub outring: String,
    /// Ring buffer the program reads from
    pub inring: String,
}

impl Default for ProgramDefinition {
    fn default() -> Self {
        Self {
            enabled: true,
            standalone: false,
            path: String::new(),
            host: String::new(),
            outring: String::new(),
            inring: String::new(),
        }
    }
}

impl ProgramDefinition {
    /// Enabled, coordinated program at `path` on `host`
    pub fn new(path: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            host: host.into(),
            ..Self::default()
        }
    }

    pub fn with_rings(mut self, outring: impl Into<String>, inring: impl Into<String>) -> Self {
        self.outring = outring.into();
        self.inring = inring.into();
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn standalone(mut self, standalone: bool) -> Self {
        self.standalone = standalone;
        self
    }

    /// Takes part in global transitions
    pub fn is_active(&self) -> bool {
        self.enabled && !self.standalone
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let def = ProgramDefinition::new("/usr/opt/daq/bin/Readout", "spdaq08")
            .with_rings("fox", "")
            .standalone(true);
        assert!(def.enabled);
        assert!(def.standalone);
        assert!(!def.is_active());
        assert_eq!(def.outring, "fox");
    }

    #[test]
    fn test_json_defaults() {
        let def: ProgramDefinition =
            serde_json::from_str(r#"{"path": "/bin/evb", "host": "localhost"}"#).unwrap();
        assert!(def.is_active());
        assert_eq!(def.inring, "");

        let text = serde_json::to_string(&def).unwrap();
        let back: ProgramDefinition = serde_json::from_str(&text).unwrap();
        assert_eq!(back, def);
    }
}
