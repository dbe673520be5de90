//! Vendor command builders for team VLAN provisioning
//!
//! Every dialect produces two blocks: a teardown block that removes all six
//! team VLANs (safe to run against an unconfigured device) and an apply block
//! with one stanza per occupied station, in slot order.

use fieldnet_core::{Roster, TeamId, SERVER_IP_ADDRESS, TEAM_GATEWAY_HOST, TEAM_VLANS};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported configuration dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vendor {
    /// Cisco Catalyst 3000-series switch (single-block enable ceremony)
    Cisco3000,
    /// Aruba switch (menu-driven login, `write memory` to save)
    Aruba,
    /// Cisco ISR router (interactive prompt, subinterfaces and ACLs)
    CiscoIsr,
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Vendor::Cisco3000 => write!(f, "Cisco"),
            Vendor::Aruba => write!(f, "Aruba"),
            Vendor::CiscoIsr => write!(f, "Cisco ISR"),
        }
    }
}

/// Commands that remove every team VLAN, DHCP pool and ACL
pub fn teardown_commands(vendor: Vendor) -> String {
    let mut commands = String::new();
    if vendor == Vendor::Aruba {
        commands.push_str("configure terminal\n");
    }

    for vlan in TEAM_VLANS {
        let stanza = match vendor {
            Vendor::Cisco3000 => format!(
                "interface Vlan{vlan}\nno ip address\nno ip dhcp pool dhcp{vlan}\n"
            ),
            Vendor::Aruba => format!("no vlan {vlan}\nno dhcp-server pool dhcp{vlan}\n"),
            Vendor::CiscoIsr => format!(
                "interface GigabitEthernet 0/0.{vlan}\nno ip address\nno access-list 1{vlan}\nno ip dhcp pool dhcp{vlan}\n"
            ),
        };
        commands.push_str(&stanza);
    }
    commands
}

/// Commands that install the roster, or `None` when every station is empty
pub fn apply_commands(vendor: Vendor, roster: &Roster) -> Option<String> {
    if roster.is_empty() {
        return None;
    }

    let mut commands = String::new();
    if vendor == Vendor::Aruba {
        commands.push_str("configure terminal\n");
    }

    for (vlan, team) in roster.occupied() {
        let stanza = match vendor {
            Vendor::Cisco3000 => cisco_switch_stanza(vlan, team),
            Vendor::Aruba => aruba_stanza(vlan, team),
            Vendor::CiscoIsr => cisco_isr_stanza(vlan, team),
        };
        commands.push_str(&stanza);
    }
    Some(commands)
}

fn dhcp_exclusions(prefix: &str, p: &str) -> String {
    format!("{prefix}excluded-address 10.{p}.1 10.{p}.19\n{prefix}excluded-address 10.{p}.200 10.{p}.254\n")
}

fn cisco_switch_stanza(vlan: u16, team: TeamId) -> String {
    let p = team.partial_ip();
    let gw = TEAM_GATEWAY_HOST;
    format!(
        "{exclusions}\
         ip dhcp pool dhcp{vlan}\n\
         network 10.{p}.0 255.255.255.0\n\
         default-router 10.{p}.{gw}\n\
         lease 1\n\
         interface Vlan{vlan}\n\
         ip address 10.{p}.{gw} 255.255.255.0\n",
        exclusions = dhcp_exclusions("ip dhcp ", &p),
    )
}

fn aruba_stanza(vlan: u16, team: TeamId) -> String {
    let p = team.partial_ip();
    let gw = TEAM_GATEWAY_HOST;
    format!(
        "vlan {vlan}\n\
         name TEAM_{team}\n\
         interface vlan {vlan}\n\
         ip address 10.{p}.{gw} 255.255.255.0\n\
         dhcp-server\n\
         exit\n\
         dhcp-server pool dhcp{vlan}\n\
         network 10.{p}.0 255.255.255.0\n\
         gateway 10.{p}.{gw}\n\
         lease-time 86400\n\
         {exclusions}",
        exclusions = dhcp_exclusions("", &p),
    )
}

// Team traffic may only reach the field server, plus DHCP and ICMP.
fn cisco_isr_stanza(vlan: u16, team: TeamId) -> String {
    let p = team.partial_ip();
    let gw = TEAM_GATEWAY_HOST;
    format!(
        "{exclusions}\
         ip dhcp pool dhcp{vlan}\n\
         network 10.{p}.0 255.255.255.0\n\
         default-router 10.{p}.{gw}\n\
         lease 7\n\
         access-list 1{vlan} permit ip 10.{p}.0 0.0.0.255 host {server}\n\
         access-list 1{vlan} permit udp any eq bootpc any eq bootps\n\
         access-list 1{vlan} permit icmp any any\n\
         interface GigabitEthernet 0/0.{vlan}\n\
         ip address 10.{p}.{gw} 255.255.255.0\n",
        exclusions = dhcp_exclusions("ip dhcp ", &p),
        server = SERVER_IP_ADDRESS,
    )
}
