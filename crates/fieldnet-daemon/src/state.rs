//! Application state management

use anyhow::{Context, Result};
use fieldnet_core::{Device, Roster};
use fieldnet_discovery::DiscoveryManager;
use fieldnet_switch::{Switch, SwitchStatus};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;

/// Shared application state
pub struct AppState {
    /// Discovery manager (owns the scanner once enabled)
    pub discovery: Arc<DiscoveryManager>,
    /// Managed switch, if one is configured
    pub switch: Option<Arc<Switch>>,
    /// Configuration
    pub config: Config,
}

impl AppState {
    /// Create new application state with the ICMP prober
    pub fn new(config: Config) -> Arc<Self> {
        let discovery = DiscoveryManager::default()
            .with_known_devices(config.discovery.known_devices.iter().cloned());
        Self::with_discovery(config, discovery)
    }

    pub fn with_discovery(config: Config, discovery: DiscoveryManager) -> Arc<Self> {
        let switch = config.switch.as_ref().map(|sw| {
            info!(vendor = %sw.vendor, address = %sw.address, port = sw.port, "Managing switch");
            Arc::new(Switch::from_config(sw))
        });

        Arc::new(Self {
            discovery: Arc::new(discovery),
            switch,
            config,
        })
    }

    /// Start sweeping if the configuration asks for it.
    ///
    /// A bad subnet is logged and leaves discovery off; it does not stop the
    /// daemon.
    pub async fn start_discovery(&self) {
        let discovery = &self.config.discovery;
        if !discovery.enabled {
            info!("Network discovery disabled in configuration");
            return;
        }
        if let Err(e) = self
            .discovery
            .set_enabled(true, &discovery.subnet, discovery.interval())
            .await
        {
            warn!(error = %e, "Network discovery unavailable");
        }
    }

    pub async fn stop_discovery(&self) {
        if let Err(e) = self
            .discovery
            .set_enabled(false, "", self.config.discovery.interval())
            .await
        {
            warn!(error = %e, "Failed to stop network discovery");
        }
    }

    /// Push a roster to the managed switch and report where it ended up
    pub async fn configure_switch(&self, roster: &Roster) -> Result<SwitchStatus> {
        let switch = self
            .switch
            .as_ref()
            .context("No switch configured; add a [switch] section to the configuration")?;
        switch.configure_teams(roster).await?;
        Ok(switch.status().await)
    }

    pub async fn switch_status(&self) -> Option<SwitchStatus> {
        match &self.switch {
            Some(switch) => Some(switch.status().await),
            None => None,
        }
    }

    /// Log device counts and every rogue or stale host
    pub async fn log_summary(&self) {
        let mut devices = self.discovery.devices().await;
        sort_by_address(&mut devices);

        let stale_after = stale_after(self.config.daemon.stale_after_secs);
        let rogue = devices.iter().filter(|d| d.rogue).count();
        let stale = devices.iter().filter(|d| d.is_stale(stale_after)).count();

        info!(
            enabled = self.discovery.is_enabled().await,
            devices = devices.len(),
            rogue = rogue,
            stale = stale,
            switch = %self
                .switch_status()
                .await
                .map_or_else(|| "none".to_string(), |s| s.to_string()),
            "Field network summary"
        );

        for device in devices.iter().filter(|d| d.rogue) {
            warn!(
                ip = %device.ip,
                last_seen = %device.last_seen.to_rfc3339(),
                stale = device.is_stale(stale_after),
                "Rogue device on field network"
            );
        }
    }
}

/// Device table sorted by address, as printed by `scan-once`
pub(crate) fn devices_json(mut devices: Vec<Device>) -> Result<String> {
    sort_by_address(&mut devices);
    Ok(serde_json::to_string_pretty(&devices)?)
}

/// Staleness window; values past what chrono can hold mean "never stale"
fn stale_after(secs: u64) -> chrono::Duration {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(chrono::Duration::MAX)
}

/// Numeric address order; anything unparsable sorts last
fn sort_by_address(devices: &mut [Device]) {
    devices.sort_by_key(|d| {
        d.ip
            .parse::<std::net::Ipv4Addr>()
            .map(u32::from)
            .unwrap_or(u32::MAX)
    });
}
