//! Configuration loading and validation

use anyhow::Result;
use fieldnet_switch::{SwitchConfig, Vendor, TELNET_PORT};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    /// Managed switch (optional - provisioning is unavailable without it)
    #[serde(default)]
    pub switch: Option<SwitchConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// How often `run` logs the device table summary
    #[serde(default = "default_summary_interval")]
    pub summary_interval_secs: u64,
    /// Devices not seen for this long are reported as stale
    #[serde(default = "default_stale_after")]
    pub stale_after_secs: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            summary_interval_secs: default_summary_interval(),
            stale_after_secs: default_stale_after(),
        }
    }
}

fn default_summary_interval() -> u64 {
    60
}

fn default_stale_after() -> u64 {
    300
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Start sweeping when the daemon starts
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Subnet to sweep; a bare address is taken as a /24
    #[serde(default = "default_subnet")]
    pub subnet: String,
    /// Pause between sweeps in seconds
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    /// Addresses to treat as known on top of the field infrastructure
    #[serde(default)]
    pub known_devices: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            subnet: default_subnet(),
            interval_secs: default_interval(),
            known_devices: Vec::new(),
        }
    }
}

impl DiscoveryConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

fn default_true() -> bool {
    true
}

fn default_subnet() -> String {
    "10.0.100.0/24".to_string()
}

fn default_interval() -> u64 {
    30
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config {
            daemon: DaemonConfig::default(),
            discovery: DiscoveryConfig::default(),
            switch: None,
        })
    }
}

/// Save default configuration to file
pub fn save_default_config(path: &Path) -> Result<()> {
    let config = Config {
        daemon: DaemonConfig::default(),
        discovery: DiscoveryConfig::default(),
        switch: Some(SwitchConfig {
            vendor: Vendor::Cisco3000,
            address: "10.0.100.2".to_string(),
            port: TELNET_PORT,
            password: "changeme".to_string(),
            pause_secs: 2,
            backoff_secs: 5,
            session_timeout_secs: 30,
        }),
    };

    let content = toml::to_string_pretty(&config)?;
    std::fs::write(path, content)?;
    Ok(())
}
