use std::time::Duration;
use thiserror::Error;

use crate::subnet::Subnet;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error("No subnet configured")]
    NoSubnet,
    #[error("Invalid CIDR {cidr:?}: {reason}")]
    InvalidCidr { cidr: String, reason: String },
    #[error("Scanner already running on {subnet} every {interval:?}")]
    AlreadyConfigured { subnet: Subnet, interval: Duration },
}
