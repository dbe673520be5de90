//! ICMP echo probing
//!
//! A probe answers one question: did the host send back a matching echo
//! reply in time? Every failure along the way (no raw socket privileges,
//! send errors, read errors, timeouts) counts as "unreachable".

use anyhow::Context;
use async_trait::async_trait;
use pnet::packet::icmp::echo_reply::EchoReplyPacket;
use pnet::packet::icmp::echo_request::{IcmpCodes, MutableEchoRequestPacket};
use pnet::packet::icmp::{checksum, IcmpPacket, IcmpTypes};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::Packet;
use pnet::transport::{
    icmp_packet_iter, transport_channel, TransportChannelType, TransportProtocol,
};
use std::net::{IpAddr, Ipv4Addr};
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, trace};

const TRANSPORT_BUFFER_SIZE: usize = 4096;
const CHANNEL_TYPE_ICMP: TransportChannelType =
    TransportChannelType::Layer4(TransportProtocol::Ipv4(IpNextHeaderProtocols::Icmp));

/// ICMP echo header: type, code, checksum, identifier, sequence
const ECHO_HEADER_LEN: usize = 8;
const ECHO_SEQUENCE: u16 = 1;
const ECHO_PAYLOAD: &[u8] = b"fieldnet-scan";

/// How long to wait for the echo reply once the request is sent
pub const REPLY_TIMEOUT: Duration = Duration::from_millis(500);

/// Upper bound on a whole probe, socket setup included
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Reachability check for a single address
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, ip: Ipv4Addr) -> bool;
}

/// Raw-socket ICMP echo prober (needs CAP_NET_RAW or root)
#[derive(Debug, Clone)]
pub struct IcmpProber {
    identifier: u16,
    reply_timeout: Duration,
    probe_timeout: Duration,
}

impl Default for IcmpProber {
    fn default() -> Self {
        Self {
            identifier: (std::process::id() & 0xffff) as u16,
            reply_timeout: REPLY_TIMEOUT,
            probe_timeout: PROBE_TIMEOUT,
        }
    }
}

#[async_trait]
impl Prober for IcmpProber {
    async fn probe(&self, ip: Ipv4Addr) -> bool {
        let identifier = self.identifier;
        let reply_timeout = self.reply_timeout;
        let task = tokio::task::spawn_blocking(move || ping(ip, identifier, reply_timeout));

        match timeout(self.probe_timeout, task).await {
            Ok(Ok(Ok(reachable))) => reachable,
            Ok(Ok(Err(e))) => {
                trace!(ip = %ip, error = %e, "Probe failed");
                false
            }
            Ok(Err(e)) => {
                trace!(ip = %ip, error = %e, "Probe task failed");
                false
            }
            Err(_) => {
                trace!(ip = %ip, "Probe timed out");
                false
            }
        }
    }
}

/// Build an ICMP echo request with a valid checksum
pub fn build_echo_request(identifier: u16, sequence: u16) -> anyhow::Result<Vec<u8>> {
    let mut buf = vec![0u8; ECHO_HEADER_LEN + ECHO_PAYLOAD.len()];
    let mut echo =
        MutableEchoRequestPacket::new(&mut buf).context("failed to create echo request packet")?;
    echo.set_icmp_type(IcmpTypes::EchoRequest);
    echo.set_icmp_code(IcmpCodes::NoCode);
    echo.set_identifier(identifier);
    echo.set_sequence_number(sequence);
    echo.set_payload(ECHO_PAYLOAD);

    let csum = checksum(&IcmpPacket::new(echo.packet()).context("failed to create ICMP packet")?);
    echo.set_checksum(csum);
    Ok(buf)
}

/// Whether `reply` is the echo reply to our request
fn is_matching_reply(reply: &IcmpPacket, identifier: u16) -> bool {
    if reply.get_icmp_type() != IcmpTypes::EchoReply {
        return false;
    }
    EchoReplyPacket::new(reply.packet())
        .map(|echo| echo.get_identifier() == identifier)
        .unwrap_or(false)
}

/// Blocking single echo round trip
fn ping(ip: Ipv4Addr, identifier: u16, reply_timeout: Duration) -> anyhow::Result<bool> {
    let (mut tx, mut rx) = transport_channel(TRANSPORT_BUFFER_SIZE, CHANNEL_TYPE_ICMP)
        .context("failed to open ICMP channel")?;

    let request = build_echo_request(identifier, ECHO_SEQUENCE)?;
    let packet = IcmpPacket::new(&request).context("failed to create ICMP packet")?;

    let start = Instant::now();
    tx.send_to(packet, IpAddr::V4(ip))
        .context("failed to send echo request")?;

    let deadline = start + reply_timeout;
    let mut replies = icmp_packet_iter(&mut rx);
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(false);
        }

        match replies.next_with_timeout(remaining) {
            Ok(Some((reply, source))) => {
                if source == IpAddr::V4(ip) && is_matching_reply(&reply, identifier) {
                    debug!(ip = %ip, elapsed = ?start.elapsed(), "Echo reply");
                    return Ok(true);
                }
            }
            // Timed out or the read failed; either way the host is unreachable.
            Ok(None) | Err(_) => return Ok(false),
        }
    }
}
