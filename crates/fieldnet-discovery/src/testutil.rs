//! In-memory prober for scanner and manager tests

use async_trait::async_trait;
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::icmp::Prober;

/// Answers for a configurable set of addresses and counts every probe
#[derive(Default)]
pub(crate) struct FakeProber {
    reachable: Mutex<HashSet<Ipv4Addr>>,
    probes: AtomicUsize,
}

impl FakeProber {
    pub fn new(reachable: &[Ipv4Addr]) -> Self {
        Self {
            reachable: Mutex::new(reachable.iter().copied().collect()),
            probes: AtomicUsize::new(0),
        }
    }

    pub fn set_reachable(&self, reachable: &[Ipv4Addr]) {
        *self.reachable.lock().unwrap() = reachable.iter().copied().collect();
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Prober for FakeProber {
    async fn probe(&self, ip: Ipv4Addr) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.reachable.lock().unwrap().contains(&ip)
    }
}
