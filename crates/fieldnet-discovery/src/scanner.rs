//! Periodic ICMP sweep of the field subnet
//!
//! The scanner owns the device table and the known-device allowlist behind a
//! single lock. The sweep loop is the only writer of device records besides
//! `mark_as_known`; readers always get a copy.

use fieldnet_core::Device;
use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::icmp::Prober;
use crate::subnet::Subnet;

#[derive(Debug, Default)]
struct Registry {
    devices: HashMap<String, Device>,
    known: HashSet<String>,
}

/// Discovery scanner for one subnet
pub struct Scanner {
    subnet: Subnet,
    interval: Duration,
    prober: Arc<dyn Prober>,
    registry: RwLock<Registry>,
}

impl Scanner {
    /// Create a scanner whose allowlist starts with `known`
    pub fn new<I, S>(subnet: Subnet, interval: Duration, prober: Arc<dyn Prober>, known: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let registry = Registry {
            devices: HashMap::new(),
            known: known.into_iter().map(Into::into).collect(),
        };
        Self {
            subnet,
            interval,
            prober,
            registry: RwLock::new(registry),
        }
    }

    pub fn subnet(&self) -> Subnet {
        self.subnet
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Snapshot of every host that has answered so far, in no particular order
    pub async fn devices(&self) -> Vec<Device> {
        self.registry.read().await.devices.values().cloned().collect()
    }

    pub async fn get_device(&self, ip: &str) -> Option<Device> {
        self.registry.read().await.devices.get(ip).cloned()
    }

    pub async fn is_known(&self, ip: &str) -> bool {
        self.registry.read().await.known.contains(ip)
    }

    /// Add `ip` to the allowlist and clear the rogue flag on its record
    pub async fn mark_as_known(&self, ip: &str) {
        let mut registry = self.registry.write().await;
        registry.known.insert(ip.to_string());
        if let Some(device) = registry.devices.get_mut(ip) {
            device.rogue = false;
        }
        info!(ip = %ip, "Device marked as known");
    }

    /// Run one full sweep and return how many hosts answered
    pub async fn sweep(&self) -> usize {
        let (_keep_alive, mut cancel) = watch::channel(false);
        self.sweep_until(&mut cancel).await.unwrap_or(0)
    }

    /// Sweep every address in order; `None` if cancelled part way through
    async fn sweep_until(&self, cancel: &mut watch::Receiver<bool>) -> Option<usize> {
        debug!(subnet = %self.subnet, "Starting sweep");
        let mut found = 0;

        for ip in self.subnet.hosts() {
            tokio::select! {
                biased;
                _ = cancelled(cancel) => return None,
                reachable = self.prober.probe(ip) => {
                    if reachable {
                        self.record(ip).await;
                        found += 1;
                    }
                }
            }
        }

        debug!(subnet = %self.subnet, found = found, "Sweep complete");
        Some(found)
    }

    // Hosts that did not answer keep whatever record they had.
    async fn record(&self, ip: Ipv4Addr) {
        let addr = ip.to_string();
        let mut registry = self.registry.write().await;
        let rogue = !registry.known.contains(&addr);

        let newly_rogue = rogue
            && registry
                .devices
                .get(&addr)
                .map_or(true, |previous| !previous.rogue);
        if newly_rogue {
            warn!(ip = %addr, "Rogue device detected");
        }

        registry.devices.insert(addr.clone(), Device::seen(addr, rogue));
    }

    /// Sweep, sleep for the interval, repeat until `cancel` fires
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) {
        info!(
            subnet = %self.subnet,
            interval_secs = self.interval.as_secs(),
            "Network scanner started"
        );

        loop {
            let Some(found) = self.sweep_until(&mut cancel).await else {
                break;
            };
            let total = self.registry.read().await.devices.len();
            info!(found = found, total = total, "Sweep finished");

            tokio::select! {
                _ = cancelled(&mut cancel) => break,
                _ = sleep(self.interval) => {}
            }
        }

        info!(subnet = %self.subnet, "Network scanner stopped");
    }
}

/// Resolves once a stop is requested or the sender is gone
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    let _ = cancel.wait_for(|stop| *stop).await;
}
