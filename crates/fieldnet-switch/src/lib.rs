//! Fieldnet Switch - Team network provisioning over telnet
//!
//! This crate drives the field switch (or router) that hosts the per-team
//! VLANs and DHCP pools:
//! - Command builders for each supported vendor dialect
//! - A session driver for the line-oriented administration protocol
//! - The `Switch` handle that serializes teardown/apply cycles

pub mod dialect;
pub mod session;
pub mod switch;

#[cfg(test)]
mod testutil;

pub use dialect::{apply_commands, teardown_commands, Vendor};
pub use session::{session_script, validate_output, Session, SessionError, SessionScript};
pub use switch::{Switch, SwitchConfig, SwitchError, SwitchStatus, TELNET_PORT};
