//! Fieldnet Discovery - Live host discovery on the field subnet
//!
//! This crate provides:
//! - CIDR parsing and in-order address iteration
//! - ICMP echo probing through a raw socket
//! - A background scanner that keeps a table of answering hosts and flags
//!   the ones missing from the known-device allowlist
//! - The manager that owns the scanner and its enable/disable lifecycle

pub mod error;
pub mod icmp;
pub mod manager;
pub mod scanner;
pub mod subnet;

#[cfg(test)]
mod testutil;

pub use error::DiscoveryError;
pub use icmp::{IcmpProber, Prober};
pub use manager::{DiscoveryManager, DEFAULT_SCAN_INTERVAL};
pub use scanner::Scanner;
pub use subnet::{increment_ip, Subnet};
