//! Session driver for the telnet-style administration protocol
//!
//! One session is one TCP connection: log in, send the command payload wrapped
//! in the vendor's enable/save ceremony, collect whatever the device prints
//! until it hangs up, and close. Nothing here retries.

use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout_at, Instant};
use tracing::{debug, trace};

use crate::dialect::Vendor;

/// Pause between lines for devices with an interactive prompt
pub const LINE_PAUSE: Duration = Duration::from_millis(100);

/// Ceiling applied when the configured deadline is past what the clock can represent
const MAX_SESSION_DEADLINE: Duration = Duration::from_secs(24 * 60 * 60);

/// Output fragments the router prints when it rejects a command
const REJECTION_MARKERS: [&str; 2] = ["invalid input", "incomplete command"];

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Failed to connect to {target}: {source}")]
    Connect {
        target: String,
        source: std::io::Error,
    },
    #[error("Failed to send line {line} to {target}: {source}")]
    Send {
        target: String,
        line: usize,
        source: std::io::Error,
    },
    #[error("Failed to read response from {target}: {source}")]
    Read {
        target: String,
        source: std::io::Error,
    },
    #[error("Timed out during {step} with {target}")]
    Timeout { target: String, step: &'static str },
    #[error("{vendor} rejected the configuration: {output}")]
    Rejected { vendor: Vendor, output: String },
}

/// Bytes to put on the wire for one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionScript {
    /// Written in a single burst
    Block(String),
    /// Written one line at a time with `LINE_PAUSE` after each
    Lines(Vec<String>),
}

impl SessionScript {
    /// Everything the device receives, concatenated
    pub fn wire_text(&self) -> String {
        match self {
            SessionScript::Block(block) => block.clone(),
            SessionScript::Lines(lines) => lines.iter().map(|l| format!("{l}\n")).collect(),
        }
    }
}

/// Wrap a command block in the vendor's login, enable and save ceremony
pub fn session_script(vendor: Vendor, password: &str, commands: &str) -> SessionScript {
    match vendor {
        Vendor::Cisco3000 => SessionScript::Block(format!(
            "{password}\nenable\n{password}\nterminal length 0\n{}exit\n",
            cisco_config_payload(commands)
        )),
        Vendor::Aruba => {
            let payload = format!("configure terminal\n{commands}\nwrite memory\n");
            SessionScript::Block(format!(
                "{password}\n{password}\nconfigure terminal\n{payload}\nterminal length 0\n{password}\n"
            ))
        }
        Vendor::CiscoIsr => SessionScript::Lines(vec![
            password.to_string(),
            "enable".to_string(),
            password.to_string(),
            "terminal length 0".to_string(),
            cisco_config_payload(commands),
            "exit".to_string(),
        ]),
    }
}

fn cisco_config_payload(commands: &str) -> String {
    format!("config terminal\n{commands}end\ncopy running-config startup-config\n\n")
}

/// Check device output for command rejections.
///
/// Only the router dialect prints structured error markers; the switch
/// dialects are trusted on transport success alone.
pub fn validate_output(vendor: Vendor, output: &str) -> Result<(), SessionError> {
    if vendor != Vendor::CiscoIsr {
        return Ok(());
    }

    let lowered = output.to_lowercase();
    if REJECTION_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        return Err(SessionError::Rejected {
            vendor,
            output: output.to_string(),
        });
    }
    Ok(())
}

/// Connection parameters for one managed device
#[derive(Debug, Clone)]
pub struct Session {
    address: String,
    port: u16,
    deadline: Duration,
}

impl Session {
    pub fn new(address: impl Into<String>, port: u16, deadline: Duration) -> Self {
        Self {
            address: address.into(),
            port,
            deadline,
        }
    }

    pub fn target(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    /// Run one login/command/exit round trip and return the raw response.
    ///
    /// Connecting and sending must finish before the deadline. Reading stops
    /// when the device closes the connection or the deadline passes, and in
    /// the latter case the partial response is returned.
    pub async fn run(&self, script: &SessionScript) -> Result<String, SessionError> {
        let target = self.target();
        let now = Instant::now();
        let deadline = now
            .checked_add(self.deadline)
            .unwrap_or_else(|| now + MAX_SESSION_DEADLINE);

        debug!(target = %target, "Opening configuration session");
        let mut stream = timeout_at(deadline, TcpStream::connect(&target))
            .await
            .map_err(|_| SessionError::Timeout {
                target: target.clone(),
                step: "connect",
            })?
            .map_err(|source| SessionError::Connect {
                target: target.clone(),
                source,
            })?;

        match script {
            SessionScript::Block(block) => {
                write_line(&mut stream, block.as_bytes(), &target, 0, deadline).await?;
            }
            SessionScript::Lines(lines) => {
                for (index, line) in lines.iter().enumerate() {
                    let framed = format!("{line}\n");
                    write_line(&mut stream, framed.as_bytes(), &target, index, deadline).await?;
                    sleep(LINE_PAUSE).await;
                }
            }
        }

        let mut response = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            match timeout_at(deadline, stream.read(&mut buf)).await {
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => response.extend_from_slice(&buf[..n]),
                Ok(Err(source)) => return Err(SessionError::Read { target, source }),
                Err(_) => {
                    debug!(target = %target, bytes = response.len(), "Session deadline reached while reading");
                    break;
                }
            }
        }

        let output = String::from_utf8_lossy(&response).into_owned();
        trace!(target = %target, output = %output, "Session response");
        Ok(output)
    }
}

async fn write_line(
    stream: &mut TcpStream,
    bytes: &[u8],
    target: &str,
    line: usize,
    deadline: Instant,
) -> Result<(), SessionError> {
    let send = async {
        stream.write_all(bytes).await?;
        stream.flush().await
    };
    timeout_at(deadline, send)
        .await
        .map_err(|_| SessionError::Timeout {
            target: target.to_string(),
            step: "send",
        })?
        .map_err(|source| SessionError::Send {
            target: target.to_string(),
            line,
            source,
        })
}
