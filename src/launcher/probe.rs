use crate::utils::error::{IngestError, Result};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;

const RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Polls `addr` until it accepts a TCP connection. Returns how long that took.
pub async fn wait_until_accepting(addr: SocketAddr, timeout: Duration) -> Result<Duration> {
    let started = Instant::now();

    loop {
        let remaining = timeout.saturating_sub(started.elapsed());
        match tokio::time::timeout(remaining.max(RETRY_INTERVAL), TcpStream::connect(addr)).await {
            Ok(Ok(_)) => return Ok(started.elapsed()),
            Ok(Err(e)) if started.elapsed() >= timeout => {
                return Err(IngestError::ServerError {
                    message: format!("{} not accepting connections after {:?}: {}", addr, timeout, e),
                })
            }
            Err(_) => {
                return Err(IngestError::ServerError {
                    message: format!("{} not accepting connections after {:?}", addr, timeout),
                })
            }
            Ok(Err(_)) => tokio::time::sleep(RETRY_INTERVAL).await,
        }
    }
}
