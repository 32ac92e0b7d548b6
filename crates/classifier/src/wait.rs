//! Liveness wait for services that are still starting.

use crate::error::{Error, Result};
use std::net::TcpStream;
use std::thread;
use std::time::{Duration, Instant};

/// How long to wait for the classifier by default.
pub const DEFAULT_WAIT: Duration = Duration::from_secs(300);

/// Delay between connection attempts.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Block until `host:port` accepts a TCP connection.
///
/// Any connection error counts as "not up yet". `on_retry` is called after
/// each failed attempt with the time spent so far. Returns the total wait.
pub fn wait_for_port(
    host: &str,
    port: u16,
    timeout: Duration,
    poll: Duration,
    mut on_retry: impl FnMut(Duration),
) -> Result<Duration> {
    let start = Instant::now();
    loop {
        match TcpStream::connect((host, port)) {
            Ok(stream) => {
                drop(stream);
                log::info!("{host}:{port} signs of life detected");
                return Ok(start.elapsed());
            }
            Err(e) => log::debug!("{host}:{port} not ready: {e}"),
        }

        let elapsed = start.elapsed();
        if elapsed + poll > timeout {
            return Err(Error::Timeout {
                host: host.to_string(),
                port,
                seconds: timeout.as_secs(),
            });
        }
        on_retry(elapsed);
        thread::sleep(poll);
    }
}
