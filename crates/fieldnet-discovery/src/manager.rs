//! Discovery manager: owns the scanner and its background task
//!
//! The manager is created once by the application and shared by handle.
//! The first successful enable creates the scanner; it is never replaced
//! afterwards. Disabling stops the sweep loop and waits for it to exit but
//! keeps the scanner and everything it has recorded.

use fieldnet_core::{Device, INFRASTRUCTURE_ADDRESSES};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::DiscoveryError;
use crate::icmp::{IcmpProber, Prober};
use crate::scanner::Scanner;
use crate::subnet::Subnet;

/// Pause between sweeps when none is configured
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(30);

struct ScanTask {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct ManagerState {
    enabled: bool,
    scanner: Option<Arc<Scanner>>,
    task: Option<ScanTask>,
}

pub struct DiscoveryManager {
    prober: Arc<dyn Prober>,
    known_devices: Vec<String>,
    state: Mutex<ManagerState>,
}

impl Default for DiscoveryManager {
    fn default() -> Self {
        Self::new(Arc::new(IcmpProber::default()))
    }
}

impl DiscoveryManager {
    /// Create a manager whose scanner will treat field infrastructure as known
    pub fn new(prober: Arc<dyn Prober>) -> Self {
        Self {
            prober,
            known_devices: INFRASTRUCTURE_ADDRESSES.iter().map(|s| s.to_string()).collect(),
            state: Mutex::new(ManagerState::default()),
        }
    }

    /// Extra addresses to seed the allowlist with when the scanner is created
    pub fn with_known_devices<I, S>(mut self, known: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for ip in known {
            let ip = ip.into();
            if !self.known_devices.contains(&ip) {
                self.known_devices.push(ip);
            }
        }
        self
    }

    /// Turn discovery on or off.
    ///
    /// Enabling with no scanner parses `subnet` (a bare address means /24),
    /// creates the scanner and starts sweeping. Enabling again restarts a
    /// stopped loop; asking for a different subnet or interval than the
    /// existing scanner's is refused. An empty `subnet` reuses whatever the
    /// scanner already has. Disabling stops the loop and waits for it.
    pub async fn set_enabled(
        &self,
        enabled: bool,
        subnet: &str,
        interval: Duration,
    ) -> Result<(), DiscoveryError> {
        let mut state = self.state.lock().await;

        if !enabled {
            state.enabled = false;
            if let Some(task) = state.task.take() {
                let _ = task.stop.send(true);
                if let Err(e) = task.handle.await {
                    warn!(error = %e, "Network scanner task ended abnormally");
                }
            }
            info!("Network discovery disabled");
            return Ok(());
        }

        let scanner = match state.scanner.clone() {
            Some(existing) => {
                if !subnet.trim().is_empty() {
                    let requested: Subnet = subnet.parse()?;
                    if requested != existing.subnet() || interval != existing.interval() {
                        let err = DiscoveryError::AlreadyConfigured {
                            subnet: existing.subnet(),
                            interval: existing.interval(),
                        };
                        warn!(requested = %requested, error = %err, "Refusing to reconfigure network scanner");
                        return Err(err);
                    }
                }
                existing
            }
            None => {
                let parsed: Subnet = match subnet.parse() {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        warn!(subnet = %subnet, error = %e, "Network scanner not started");
                        return Err(e);
                    }
                };
                let scanner = Arc::new(Scanner::new(
                    parsed,
                    interval,
                    self.prober.clone(),
                    self.known_devices.iter().cloned(),
                ));
                state.scanner = Some(scanner.clone());
                scanner
            }
        };

        state.enabled = true;
        let running = state
            .task
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished());
        if !running {
            state.task = Some(spawn_scan(scanner));
        }
        Ok(())
    }

    pub async fn is_enabled(&self) -> bool {
        self.state.lock().await.enabled
    }

    pub async fn scanner(&self) -> Option<Arc<Scanner>> {
        self.state.lock().await.scanner.clone()
    }

    /// Last-seen devices; empty if discovery was never started
    pub async fn devices(&self) -> Vec<Device> {
        match self.scanner().await {
            Some(scanner) => scanner.devices().await,
            None => Vec::new(),
        }
    }

    /// Allowlist `ip`; does nothing if discovery was never started
    pub async fn mark_as_known(&self, ip: &str) {
        if let Some(scanner) = self.scanner().await {
            scanner.mark_as_known(ip).await;
        }
    }
}

fn spawn_scan(scanner: Arc<Scanner>) -> ScanTask {
    let (stop, cancel) = watch::channel(false);
    let handle = tokio::spawn(async move { scanner.run(cancel).await });
    ScanTask { stop, handle }
}
