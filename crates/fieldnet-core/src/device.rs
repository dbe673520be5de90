//! Device records produced by subnet discovery

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A host that answered a discovery probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// IPv4 address in dotted form, unique per record
    pub ip: String,
    /// When the host last answered a probe
    pub last_seen: DateTime<Utc>,
    /// Whether the host was absent from the known allowlist
    pub rogue: bool,
}

impl Device {
    /// Record a host that answered just now
    pub fn seen(ip: impl Into<String>, rogue: bool) -> Self {
        Self {
            ip: ip.into(),
            last_seen: Utc::now(),
            rogue,
        }
    }

    /// Check if the host has not answered within `max_age`
    pub fn is_stale(&self, max_age: Duration) -> bool {
        Utc::now() - self.last_seen > max_age
    }
}
