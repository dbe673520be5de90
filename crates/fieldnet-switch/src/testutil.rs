//! Fake telnet device for session and switch tests

use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::time::{timeout, Instant};

/// Silence after which the fake device considers a session finished
const IDLE_TIMEOUT: Duration = Duration::from_millis(300);

/// When a session was accepted and when the device hung up on it
#[derive(Debug, Clone, Copy)]
pub(crate) struct SessionTiming {
    pub opened: Instant,
    pub closed: Instant,
}

/// Accepts sessions on a loopback port, records what each one sent, answers
/// with a canned reply and hangs up.
pub(crate) struct MockDevice {
    pub port: u16,
    sessions: Arc<Mutex<Vec<String>>>,
    timings: Arc<Mutex<Vec<SessionTiming>>>,
}

impl MockDevice {
    pub async fn spawn(reply: &'static str) -> Self {
        Self::spawn_with_replies(vec![reply]).await
    }

    /// Session `n` is answered with `replies[n]`, or the last reply once they run out.
    pub async fn spawn_with_replies(replies: Vec<&'static str>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let sessions = Arc::new(Mutex::new(Vec::new()));
        let timings = Arc::new(Mutex::new(Vec::new()));

        let recorded = sessions.clone();
        let timed = timings.clone();
        tokio::spawn(async move {
            let mut count = 0usize;
            while let Ok((mut conn, _)) = listener.accept().await {
                let opened = Instant::now();
                let mut received = Vec::new();
                let mut buf = [0u8; 1024];
                loop {
                    match timeout(IDLE_TIMEOUT, conn.read(&mut buf)).await {
                        Ok(Ok(0)) | Ok(Err(_)) | Err(_) => break,
                        Ok(Ok(n)) => received.extend_from_slice(&buf[..n]),
                    }
                }
                recorded
                    .lock()
                    .await
                    .push(String::from_utf8_lossy(&received).into_owned());

                // Stamped before hanging up so the peer can only see EOF later.
                timed.lock().await.push(SessionTiming {
                    opened,
                    closed: Instant::now(),
                });

                let reply = replies[count.min(replies.len() - 1)];
                count += 1;
                let _ = conn.write_all(reply.as_bytes()).await;
                let _ = conn.shutdown().await;
            }
        });

        Self {
            port,
            sessions,
            timings,
        }
    }

    pub async fn sessions(&self) -> Vec<String> {
        self.sessions.lock().await.clone()
    }

    pub async fn timings(&self) -> Vec<SessionTiming> {
        self.timings.lock().await.clone()
    }
}
