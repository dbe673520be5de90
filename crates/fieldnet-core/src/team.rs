//! Team rosters and the per-station VLAN table

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// VLAN id for each station slot, in slot order (red1..red3, blue1..blue3)
pub const TEAM_VLANS: [u16; 6] = [10, 20, 30, 40, 50, 60];

/// Host part of the team gateway address on its /24
pub const TEAM_GATEWAY_HOST: u8 = 4;

/// Address of the field management server
pub const SERVER_IP_ADDRESS: &str = "10.0.100.5";

/// Field infrastructure that is always considered known by the scanner
pub const INFRASTRUCTURE_ADDRESSES: [&str; 3] = ["10.0.100.5", "10.0.100.3", "10.0.100.2"];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RosterError {
    #[error("Invalid team number {0:?}")]
    InvalidTeam(String),
    #[error("Roster has {0} entries, at most 6 are allowed")]
    TooManyTeams(usize),
}

/// A team number (positive, conventionally at most 9999)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TeamId(pub u32);

impl TeamId {
    /// Middle two octets of the team subnet: `T / 100` and `T % 100`.
    ///
    /// Team 1678 lives on 10.16.78.0/24, team 254 on 10.2.54.0/24.
    pub fn partial_ip(&self) -> String {
        format!("{}.{}", self.0 / 100, self.0 % 100)
    }

    /// Gateway address the switch takes on the team subnet
    pub fn gateway(&self) -> String {
        format!("10.{}.{}", self.partial_ip(), TEAM_GATEWAY_HOST)
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Driver station slots, in VLAN order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Station {
    Red1,
    Red2,
    Red3,
    Blue1,
    Blue2,
    Blue3,
}

impl Station {
    pub const ALL: [Station; 6] = [
        Station::Red1,
        Station::Red2,
        Station::Red3,
        Station::Blue1,
        Station::Blue2,
        Station::Blue3,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn vlan(self) -> u16 {
        TEAM_VLANS[self.index()]
    }
}

/// The six-slot team assignment pushed to the field switch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    slots: [Option<TeamId>; 6],
}

impl Roster {
    /// A roster with every station empty (full reset, no apply step)
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_slots(slots: [Option<TeamId>; 6]) -> Self {
        Self { slots }
    }

    pub fn set(&mut self, station: Station, team: Option<TeamId>) {
        self.slots[station.index()] = team;
    }

    pub fn get(&self, station: Station) -> Option<TeamId> {
        self.slots[station.index()]
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Occupied slots as `(vlan, team)`, in ascending slot order
    pub fn occupied(&self) -> impl Iterator<Item = (u16, TeamId)> + '_ {
        self.slots
            .iter()
            .zip(TEAM_VLANS)
            .filter_map(|(slot, vlan)| slot.map(|team| (vlan, team)))
    }
}

impl FromStr for Roster {
    type Err = RosterError;

    /// Parse `"1114,254,0,1503,1678,1538"`; `0`, `-` or an empty entry leaves
    /// the slot empty and missing trailing entries are empty.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let entries: Vec<&str> = s.split(',').map(str::trim).collect();
        if entries.len() > 6 {
            return Err(RosterError::TooManyTeams(entries.len()));
        }

        let mut roster = Roster::empty();
        for (station, entry) in Station::ALL.into_iter().zip(entries) {
            if entry.is_empty() || entry == "-" {
                continue;
            }
            let team: u32 = entry
                .parse()
                .map_err(|_| RosterError::InvalidTeam(entry.to_string()))?;
            if team != 0 {
                roster.set(station, Some(TeamId(team)));
            }
        }
        Ok(roster)
    }
}
