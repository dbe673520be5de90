//! Switch handle: serialized teardown/apply cycles against one device
//!
//! A configuration attempt always removes every team VLAN first, waits for
//! the device to settle, installs the occupied stations, then backs off so
//! the device can converge before another attempt is allowed in. Failures are
//! not rolled back: a failed apply can leave part of the roster installed.

use fieldnet_core::Roster;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::dialect::{apply_commands, teardown_commands, Vendor};
use crate::session::{session_script, validate_output, Session, SessionError};

/// Default telnet port
pub const TELNET_PORT: u16 = 23;

/// Default pause between teardown and apply
pub const DEFAULT_PAUSE: Duration = Duration::from_secs(2);

/// Default backoff after a successful apply
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(5);

/// Default upper bound on a single session round trip
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum SwitchError {
    #[error("Failed to remove team VLANs from {vendor} device at {target}: {source}")]
    Teardown {
        vendor: Vendor,
        target: String,
        source: SessionError,
    },
    #[error("Failed to apply team VLANs to {vendor} device at {target}: {source}")]
    Apply {
        vendor: Vendor,
        target: String,
        source: SessionError,
    },
}

/// Last known configuration state of a switch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SwitchStatus {
    #[default]
    Unknown,
    Configuring,
    Active,
    Error,
}

impl fmt::Display for SwitchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SwitchStatus::Unknown => "UNKNOWN",
            SwitchStatus::Configuring => "CONFIGURING",
            SwitchStatus::Active => "ACTIVE",
            SwitchStatus::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// Switch settings as they appear in the daemon configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchConfig {
    /// Command dialect
    pub vendor: Vendor,
    /// Management address
    pub address: String,
    /// Telnet port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Login and enable password
    #[serde(default)]
    pub password: String,
    /// Seconds to wait between teardown and apply
    #[serde(default = "default_pause_secs")]
    pub pause_secs: u64,
    /// Seconds to wait after apply before the next attempt may start
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: u64,
    /// Upper bound in seconds for one session round trip
    #[serde(default = "default_session_timeout_secs")]
    pub session_timeout_secs: u64,
}

fn default_port() -> u16 {
    TELNET_PORT
}

fn default_pause_secs() -> u64 {
    DEFAULT_PAUSE.as_secs()
}

fn default_backoff_secs() -> u64 {
    DEFAULT_BACKOFF.as_secs()
}

fn default_session_timeout_secs() -> u64 {
    DEFAULT_SESSION_TIMEOUT.as_secs()
}

/// One managed switch or router
pub struct Switch {
    vendor: Vendor,
    address: String,
    port: u16,
    password: String,
    pause: Duration,
    backoff: Duration,
    session_timeout: Duration,
    /// Held for the whole of a configuration attempt
    config_lock: Mutex<()>,
    status: RwLock<SwitchStatus>,
}

impl Switch {
    pub fn new(vendor: Vendor, address: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            vendor,
            address: address.into(),
            port: TELNET_PORT,
            password: password.into(),
            pause: DEFAULT_PAUSE,
            backoff: DEFAULT_BACKOFF,
            session_timeout: DEFAULT_SESSION_TIMEOUT,
            config_lock: Mutex::new(()),
            status: RwLock::new(SwitchStatus::Unknown),
        }
    }

    pub fn cisco3000(address: impl Into<String>, password: impl Into<String>) -> Self {
        Self::new(Vendor::Cisco3000, address, password)
    }

    pub fn aruba(address: impl Into<String>, password: impl Into<String>) -> Self {
        Self::new(Vendor::Aruba, address, password)
    }

    pub fn cisco_isr(address: impl Into<String>, password: impl Into<String>) -> Self {
        Self::new(Vendor::CiscoIsr, address, password)
    }

    pub fn from_config(config: &SwitchConfig) -> Self {
        Self::new(config.vendor, config.address.clone(), config.password.clone())
            .with_port(config.port)
            .with_timing(
                Duration::from_secs(config.pause_secs),
                Duration::from_secs(config.backoff_secs),
            )
            .with_session_timeout(Duration::from_secs(config.session_timeout_secs))
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_timing(mut self, pause: Duration, backoff: Duration) -> Self {
        self.pause = pause;
        self.backoff = backoff;
        self
    }

    pub fn with_session_timeout(mut self, session_timeout: Duration) -> Self {
        self.session_timeout = session_timeout;
        self
    }

    pub fn vendor(&self) -> Vendor {
        self.vendor
    }

    pub fn target(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    /// Current status; readable while a configuration is in flight
    pub async fn status(&self) -> SwitchStatus {
        *self.status.read().await
    }

    async fn set_status(&self, status: SwitchStatus) {
        *self.status.write().await = status;
    }

    /// Reset the device and install the given roster.
    ///
    /// Concurrent callers queue on the switch lock and run one at a time.
    pub async fn configure_teams(&self, roster: &Roster) -> Result<(), SwitchError> {
        let _guard = self.config_lock.lock().await;
        self.set_status(SwitchStatus::Configuring).await;

        let teams: Vec<String> = roster.occupied().map(|(_, team)| team.to_string()).collect();
        info!(
            vendor = %self.vendor,
            target = %self.target(),
            teams = ?teams,
            "Configuring team networks"
        );

        if let Err(source) = self.run_config_commands(&teardown_commands(self.vendor)).await {
            return Err(self
                .fail(SwitchError::Teardown {
                    vendor: self.vendor,
                    target: self.target(),
                    source,
                })
                .await);
        }
        debug!(target = %self.target(), "Team VLANs removed");

        // Devices drop commands issued too soon after a bulk unconfigure.
        sleep(self.pause).await;

        if let Some(commands) = apply_commands(self.vendor, roster) {
            if let Err(source) = self.run_config_commands(&commands).await {
                return Err(self
                    .fail(SwitchError::Apply {
                        vendor: self.vendor,
                        target: self.target(),
                        source,
                    })
                    .await);
            }
            debug!(target = %self.target(), "Team VLANs applied");
        }

        // Let the device converge before another attempt can start.
        sleep(self.backoff).await;

        self.set_status(SwitchStatus::Active).await;
        info!(target = %self.target(), "Team networks active");
        Ok(())
    }

    async fn fail(&self, err: SwitchError) -> SwitchError {
        error!(error = %err, "Switch configuration failed");
        self.set_status(SwitchStatus::Error).await;
        err
    }

    async fn run_config_commands(&self, commands: &str) -> Result<String, SessionError> {
        let session = Session::new(self.address.clone(), self.port, self.session_timeout);
        let script = session_script(self.vendor, &self.password, commands);
        let output = session.run(&script).await?;
        validate_output(self.vendor, &output)?;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MockDevice;
    use fieldnet_core::{Station, TeamId};
    use std::sync::Arc;

    const LOGIN: &str = "password\nenable\npassword\nterminal length 0\nconfig terminal\n";
    const SAVE: &str = "end\ncopy running-config startup-config\n\nexit\n";

    fn test_switch(vendor: Vendor, port: u16) -> Switch {
        Switch::new(vendor, "127.0.0.1", "password")
            .with_port(port)
            .with_timing(Duration::from_millis(1), Duration::from_millis(1))
            .with_session_timeout(Duration::from_secs(5))
    }

    fn expected_reset() -> String {
        let mut expected = LOGIN.to_string();
        for vlan in [10, 20, 30, 40, 50, 60] {
            expected.push_str(&format!(
                "interface Vlan{vlan}\nno ip address\nno ip dhcp pool dhcp{vlan}\n"
            ));
        }
        expected.push_str(SAVE);
        expected
    }

    fn expected_team(vlan: u16, p: &str) -> String {
        format!(
            "ip dhcp excluded-address 10.{p}.1 10.{p}.19\n\
             ip dhcp excluded-address 10.{p}.200 10.{p}.254\n\
             ip dhcp pool dhcp{vlan}\n\
             network 10.{p}.0 255.255.255.0\n\
             default-router 10.{p}.4\n\
             lease 1\n\
             interface Vlan{vlan}\n\
             ip address 10.{p}.4 255.255.255.0\n"
        )
    }

    fn one_team() -> Roster {
        let mut roster = Roster::empty();
        roster.set(Station::Blue2, Some(TeamId(254)));
        roster
    }

    #[tokio::test]
    async fn test_empty_roster_only_resets() {
        let device = MockDevice::spawn("").await;
        let sw = test_switch(Vendor::Cisco3000, device.port);
        assert_eq!(sw.status().await, SwitchStatus::Unknown);

        sw.configure_teams(&Roster::empty()).await.unwrap();

        assert_eq!(device.sessions().await, vec![expected_reset()]);
        assert_eq!(sw.status().await, SwitchStatus::Active);
        assert_eq!(sw.status().await.to_string(), "ACTIVE");
    }

    #[tokio::test]
    async fn test_single_team() {
        let device = MockDevice::spawn("").await;
        let sw = test_switch(Vendor::Cisco3000, device.port);

        sw.configure_teams(&one_team()).await.unwrap();

        let sessions = device.sessions().await;
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0], expected_reset());
        assert_eq!(sessions[1], format!("{LOGIN}{}{SAVE}", expected_team(50, "2.54")));
        assert!(sessions[1].contains("default-router 10.2.54.4\n"));
        assert!(sessions[1].contains("ip dhcp pool dhcp50\n"));
    }

    #[tokio::test]
    async fn test_all_teams() {
        let device = MockDevice::spawn("").await;
        let sw = test_switch(Vendor::Cisco3000, device.port);
        let roster = Roster::from_slots([
            Some(TeamId(1114)),
            Some(TeamId(254)),
            Some(TeamId(296)),
            Some(TeamId(1503)),
            Some(TeamId(1678)),
            Some(TeamId(1538)),
        ]);

        sw.configure_teams(&roster).await.unwrap();

        let apply: String = [
            (10, "11.14"),
            (20, "2.54"),
            (30, "2.96"),
            (40, "15.3"),
            (50, "16.78"),
            (60, "15.38"),
        ]
        .iter()
        .map(|(vlan, p)| expected_team(*vlan, p))
        .collect();

        let sessions = device.sessions().await;
        assert_eq!(sessions, vec![expected_reset(), format!("{LOGIN}{apply}{SAVE}")]);
    }

    #[tokio::test]
    async fn test_rejected_teardown_skips_apply() {
        let device =
            MockDevice::spawn("Router(config)#\n% Invalid input detected at '^' marker.\n").await;
        let sw = test_switch(Vendor::CiscoIsr, device.port);

        let err = sw.configure_teams(&one_team()).await.unwrap_err();

        assert!(matches!(
            err,
            SwitchError::Teardown {
                source: SessionError::Rejected { .. },
                ..
            }
        ));
        assert_eq!(device.sessions().await.len(), 1);
        assert_eq!(sw.status().await, SwitchStatus::Error);
    }

    #[tokio::test]
    async fn test_rejected_apply_sets_error() {
        let device = MockDevice::spawn_with_replies(vec!["Router#\n", "% Incomplete command.\n"]).await;
        let sw = test_switch(Vendor::CiscoIsr, device.port);

        let err = sw.configure_teams(&one_team()).await.unwrap_err();

        assert!(matches!(err, SwitchError::Apply { .. }));
        assert_eq!(device.sessions().await.len(), 2);
        assert_eq!(sw.status().await, SwitchStatus::Error);
    }

    #[tokio::test]
    async fn test_unreachable_switch() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let sw = test_switch(Vendor::Aruba, port);
        let err = sw.configure_teams(&one_team()).await.unwrap_err();

        assert!(matches!(
            err,
            SwitchError::Teardown {
                source: SessionError::Connect { .. },
                ..
            }
        ));
        assert_eq!(sw.status().await, SwitchStatus::Error);
    }

    #[tokio::test]
    async fn test_concurrent_configurations_do_not_interleave() {
        let device = MockDevice::spawn("").await;
        let sw = Arc::new(test_switch(Vendor::Cisco3000, device.port));

        let first = tokio::spawn({
            let sw = sw.clone();
            async move { sw.configure_teams(&one_team()).await }
        });
        let second = tokio::spawn({
            let sw = sw.clone();
            async move { sw.configure_teams(&one_team()).await }
        });
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        let apply = format!("{LOGIN}{}{SAVE}", expected_team(50, "2.54"));
        assert_eq!(
            device.sessions().await,
            vec![expected_reset(), apply.clone(), expected_reset(), apply]
        );
        assert_eq!(sw.status().await, SwitchStatus::Active);
    }

    #[tokio::test]
    async fn test_status_visible_while_configuring() {
        let device = MockDevice::spawn("").await;
        let sw = Arc::new(
            test_switch(Vendor::Cisco3000, device.port)
                .with_timing(Duration::from_millis(1), Duration::from_millis(800)),
        );

        let task = tokio::spawn({
            let sw = sw.clone();
            async move { sw.configure_teams(&Roster::empty()).await }
        });

        // The reset session completes, then the backoff keeps the lock held.
        while device.sessions().await.is_empty() {
            sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(sw.status().await, SwitchStatus::Configuring);

        task.await.unwrap().unwrap();
        assert_eq!(sw.status().await, SwitchStatus::Active);
    }

    #[tokio::test]
    async fn test_pause_separates_teardown_and_apply() {
        const PAUSE: Duration = Duration::from_millis(300);
        let device = MockDevice::spawn("").await;
        let sw = test_switch(Vendor::Cisco3000, device.port)
            .with_timing(PAUSE, Duration::from_millis(1));

        sw.configure_teams(&one_team()).await.unwrap();

        let timings = device.timings().await;
        assert_eq!(timings.len(), 2);
        let gap = timings[1].opened.duration_since(timings[0].closed);
        assert!(gap >= PAUSE, "apply started {gap:?} after teardown");
    }

    #[tokio::test]
    async fn test_backoff_holds_before_active() {
        const BACKOFF: Duration = Duration::from_millis(400);
        let device = MockDevice::spawn("").await;
        let sw = test_switch(Vendor::Cisco3000, device.port)
            .with_timing(Duration::from_millis(1), BACKOFF);

        sw.configure_teams(&one_team()).await.unwrap();
        let finished = tokio::time::Instant::now();

        let timings = device.timings().await;
        assert_eq!(timings.len(), 2);
        let held = finished.duration_since(timings[1].closed);
        assert!(held >= BACKOFF, "returned {held:?} after the apply session");
    }

    #[test]
    fn test_switch_config_defaults() {
        let config: SwitchConfig =
            serde_json::from_str(r#"{"vendor": "cisco_isr", "address": "10.0.100.2"}"#).unwrap();
        let sw = Switch::from_config(&config);
        assert_eq!(sw.vendor(), Vendor::CiscoIsr);
        assert_eq!(sw.target(), "10.0.100.2:23");
        assert_eq!(config.pause_secs, 2);
        assert_eq!(config.backoff_secs, 5);
    }
}
