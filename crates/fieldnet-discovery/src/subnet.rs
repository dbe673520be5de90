//! IPv4 subnet parsing and address iteration

use pnet::ipnetwork::{IpNetworkError, Ipv4Network};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::DiscoveryError;

/// Prefix length assumed when a bare network address is given
pub const DEFAULT_PREFIX_LEN: u8 = 24;

/// An IPv4 network, stored with host bits cleared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subnet {
    network: Ipv4Network,
}

impl Subnet {
    pub fn new(addr: Ipv4Addr, prefix_len: u8) -> Result<Self, DiscoveryError> {
        let invalid = |e: IpNetworkError| DiscoveryError::InvalidCidr {
            cidr: format!("{addr}/{prefix_len}"),
            reason: e.to_string(),
        };
        let given = Ipv4Network::new(addr, prefix_len).map_err(invalid)?;
        let network = Ipv4Network::new(given.network(), prefix_len).map_err(invalid)?;
        Ok(Self { network })
    }

    pub fn network(&self) -> Ipv4Addr {
        self.network.network()
    }

    pub fn prefix_len(&self) -> u8 {
        self.network.prefix()
    }

    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        self.network.contains(ip)
    }

    /// Every address in the subnet, network and broadcast included, in order
    pub fn hosts(&self) -> Hosts {
        Hosts {
            subnet: *self,
            next: Some(self.network().octets()),
        }
    }
}

impl fmt::Display for Subnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network(), self.prefix_len())
    }
}

impl FromStr for Subnet {
    type Err = DiscoveryError;

    /// Parse `"10.0.100.0/24"`; a bare `"10.0.100.0"` is taken as a /24.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cidr = s.trim();
        if cidr.is_empty() {
            return Err(DiscoveryError::NoSubnet);
        }

        let invalid = |reason: String| DiscoveryError::InvalidCidr {
            cidr: cidr.to_string(),
            reason,
        };

        let (addr, prefix) = match cidr.split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (cidr, None),
        };
        // Full dotted quads only; shorthand like "10.0.100" is rejected.
        let addr: Ipv4Addr = addr
            .parse()
            .map_err(|_| invalid("not an IPv4 address".to_string()))?;
        let prefix_len = match prefix {
            None => DEFAULT_PREFIX_LEN,
            Some(prefix) => prefix
                .parse::<u8>()
                .map_err(|_| invalid("prefix length is not a number".to_string()))?,
        };

        Subnet::new(addr, prefix_len).map_err(|e| match e {
            DiscoveryError::InvalidCidr { reason, .. } => invalid(reason),
            other => other,
        })
    }
}

/// Add one to an address treated as a big-endian byte string.
///
/// Returns `false` when the carry runs off the top, i.e. the address wrapped
/// around to 0.0.0.0.
pub fn increment_ip(ip: &mut [u8; 4]) -> bool {
    for byte in ip.iter_mut().rev() {
        *byte = byte.wrapping_add(1);
        if *byte != 0 {
            return true;
        }
    }
    false
}

/// Iterator over the addresses of a subnet
#[derive(Debug, Clone)]
pub struct Hosts {
    subnet: Subnet,
    next: Option<[u8; 4]>,
}

impl Iterator for Hosts {
    type Item = Ipv4Addr;

    fn next(&mut self) -> Option<Self::Item> {
        let mut octets = self.next?;
        let current = Ipv4Addr::from(octets);
        if !self.subnet.contains(current) {
            self.next = None;
            return None;
        }

        self.next = if increment_ip(&mut octets) {
            Some(octets)
        } else {
            None
        };
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains() {
        let subnet: Subnet = "192.168.186.0/24".parse().unwrap();
        assert!(subnet.contains(Ipv4Addr::new(192, 168, 186, 1)));
        assert!(subnet.contains(Ipv4Addr::new(192, 168, 186, 255)));
        assert!(!subnet.contains(Ipv4Addr::new(192, 168, 187, 1)));
        assert!(!subnet.contains(Ipv4Addr::new(10, 0, 0, 1)));
    }

    #[test]
    fn test_parse_defaults_to_slash_24() {
        let subnet: Subnet = "10.0.100.0".parse().unwrap();
        assert_eq!(subnet.network(), Ipv4Addr::new(10, 0, 100, 0));
        assert_eq!(subnet.prefix_len(), 24);
        assert_eq!(subnet.to_string(), "10.0.100.0/24");
    }

    #[test]
    fn test_parse_masks_host_bits() {
        let subnet: Subnet = " 10.0.100.77/28 ".parse().unwrap();
        assert_eq!(subnet.to_string(), "10.0.100.64/28");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!("".parse::<Subnet>(), Err(DiscoveryError::NoSubnet));
        assert!(matches!(
            "10.0.100/24".parse::<Subnet>(),
            Err(DiscoveryError::InvalidCidr { .. })
        ));
        assert!(matches!(
            "10.0.100.0/33".parse::<Subnet>(),
            Err(DiscoveryError::InvalidCidr { .. })
        ));
        assert!(matches!(
            "10.0.100.0/".parse::<Subnet>(),
            Err(DiscoveryError::InvalidCidr { .. })
        ));
    }

    #[test]
    fn test_new_rejects_long_prefix() {
        let err = Subnet::new(Ipv4Addr::new(10, 0, 100, 0), 40).unwrap_err();
        let DiscoveryError::InvalidCidr { cidr, .. } = err else {
            panic!("expected an invalid CIDR error");
        };
        assert_eq!(cidr, "10.0.100.0/40");
    }

    #[test]
    fn test_equal_after_masking() {
        let a = Subnet::new(Ipv4Addr::new(10, 0, 100, 77), 24).unwrap();
        let b: Subnet = "10.0.100.0".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.network(), Ipv4Addr::new(10, 0, 100, 0));

        let whole: Subnet = "0.0.0.0/0".parse().unwrap();
        assert!(whole.contains(Ipv4Addr::new(203, 0, 113, 9)));
    }

    #[test]
    fn test_increment_ip_carries() {
        let mut ip = [10, 0, 0, 255];
        assert!(increment_ip(&mut ip));
        assert_eq!(ip, [10, 0, 1, 0]);

        let mut ip = [10, 255, 255, 255];
        assert!(increment_ip(&mut ip));
        assert_eq!(ip, [11, 0, 0, 0]);

        let mut ip = [255, 255, 255, 255];
        assert!(!increment_ip(&mut ip));
        assert_eq!(ip, [0, 0, 0, 0]);
    }

    #[test]
    fn test_slash_24_visits_256_addresses() {
        let subnet: Subnet = "10.0.100.0/24".parse().unwrap();
        let hosts: Vec<Ipv4Addr> = subnet.hosts().collect();
        assert_eq!(hosts.len(), 256);
        assert_eq!(hosts[0], Ipv4Addr::new(10, 0, 100, 0));
        assert_eq!(hosts[255], Ipv4Addr::new(10, 0, 100, 255));
        assert!(hosts.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_iteration_stops_at_top_of_address_space() {
        let subnet: Subnet = "255.255.255.0/24".parse().unwrap();
        assert_eq!(subnet.hosts().count(), 256);

        let single: Subnet = "255.255.255.255/32".parse().unwrap();
        assert_eq!(single.hosts().collect::<Vec<_>>(), vec![Ipv4Addr::BROADCAST]);
    }
}
