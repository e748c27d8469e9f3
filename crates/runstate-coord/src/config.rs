//! Coordinator configuration

use std::time::Duration;

use runstate_core::{Endpoint, RunStateError, RunStateResult};
use runstate_monitor::MonitorConfig;
use serde::{Deserialize, Serialize};

use crate::LogFormat;

/// Coordinator configuration
///
/// Deserializes from JSON; every field is optional. Durations are written in
/// humantime form (`"50ms"`, `"2s"`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Request/command connection URI
    pub request_endpoint: String,
    /// Subscription connection URI
    pub subscription_endpoint: String,
    /// Transition budget when `/RunState/Timeout` is absent
    pub default_timeout_secs: u64,
    /// Monitor thread poll interval
    #[serde(with = "duration_text")]
    pub poll_interval: Duration,
    pub log_format: LogFormat,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            request_endpoint: "tcp://localhost:27000".into(),
            subscription_endpoint: "tcp://localhost:27001".into(),
            default_timeout_secs: 60,
            poll_interval: MonitorConfig::default().poll_interval,
            log_format: LogFormat::Text,
        }
    }
}

impl CoordinatorConfig {
    /// Both connections to an in-process store named `name`
    pub fn inproc(name: &str) -> Self {
        let uri = format!("inproc://{}", name);
        Self {
            request_endpoint: uri.clone(),
            subscription_endpoint: uri,
            ..Self::default()
        }
    }

    /// In-process store, fast polling and a short fallback budget
    pub fn testing(name: &str) -> Self {
        Self {
            default_timeout_secs: 5,
            poll_interval: MonitorConfig::responsive().poll_interval,
            ..Self::inproc(name)
        }
    }

    pub fn from_json(text: &str) -> RunStateResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| RunStateError::InvalidArgument(format!("coordinator config: {}", e)))
    }

    pub fn to_json(&self) -> RunStateResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| RunStateError::Internal(format!("coordinator config: {}", e)))
    }

    pub fn request_endpoint(&self) -> RunStateResult<Endpoint> {
        Endpoint::parse(&self.request_endpoint)
    }

    pub fn subscription_endpoint(&self) -> RunStateResult<Endpoint> {
        Endpoint::parse(&self.subscription_endpoint)
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }

    pub fn monitor(&self) -> MonitorConfig {
        MonitorConfig {
            poll_interval: self.poll_interval,
        }
    }
}

mod duration_text {
    use std::time::Duration;

    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&humantime::format_duration(*d).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(d)?;
        humantime::parse_duration(&text).map_err(D::Error::custom)
    }
}
