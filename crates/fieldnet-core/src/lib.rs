//! Fieldnet Core - Shared types for field network provisioning and discovery
//!
//! This crate provides the foundational types for the fieldnet system:
//! - Team rosters and the fixed station-to-VLAN table
//! - Team subnet encoding used by every switch dialect
//! - Discovered device records produced by the ICMP scanner

pub mod device;
pub mod team;

pub use device::Device;
pub use team::{
    Roster, RosterError, Station, TeamId, INFRASTRUCTURE_ADDRESSES, SERVER_IP_ADDRESS,
    TEAM_GATEWAY_HOST, TEAM_VLANS,
};
