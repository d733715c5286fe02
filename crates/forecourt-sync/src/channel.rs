//! # Device Channel
//!
//! The raw byte channel to the station controller.
//!
//! The physical link is strictly request/response with one exchange per
//! connection: connect, write the command, read the fixed-size reply, drop
//! the socket. The controller never pushes; everything is polled.
//!
//! [`DeviceChannel`] is the seam that lets tests drive the client with
//! scripted replies instead of a live socket.

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace};

use crate::error::DeviceError;

/// One request/response exchange with the controller.
#[async_trait]
pub trait DeviceChannel: Send + Sync {
    /// Sends `command` and reads exactly `response_len` reply bytes.
    async fn transact(&self, command: &[u8], response_len: usize)
        -> Result<Vec<u8>, DeviceError>;
}

/// TCP implementation: a fresh connection per exchange, the whole exchange
/// under one deadline.
#[derive(Debug, Clone)]
pub struct TcpChannel {
    address: String,
    timeout: Duration,
}

impl TcpChannel {
    /// Creates a channel for the given endpoint and per-exchange deadline.
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        TcpChannel { address: address.into(), timeout }
    }

    async fn exchange(&self, command: &[u8], response_len: usize) -> Result<Vec<u8>, DeviceError> {
        let mut stream = TcpStream::connect(&self.address)
            .await
            .map_err(|e| DeviceError::ConnectionFailed(format!("{}: {e}", self.address)))?;

        trace!(command = ?command, "Sending command");
        stream.write_all(command).await?;
        stream.flush().await?;

        let mut response = vec![0u8; response_len];
        let mut filled = 0;
        while filled < response_len {
            let n = stream.read(&mut response[filled..]).await?;
            if n == 0 {
                return Err(DeviceError::ShortRead { expected: response_len, actual: filled });
            }
            filled += n;
        }

        trace!(len = response.len(), "Received response");
        Ok(response)
    }
}

#[async_trait]
impl DeviceChannel for TcpChannel {
    async fn transact(
        &self,
        command: &[u8],
        response_len: usize,
    ) -> Result<Vec<u8>, DeviceError> {
        debug!(address = %self.address, opcode = command.first(), "Device exchange");

        tokio::time::timeout(self.timeout, self.exchange(command, response_len))
            .await
            .map_err(|_| DeviceError::Timeout(self.timeout))?
    }
}

// =============================================================================
// Test Support
// =============================================================================

/// Scripted channel for tests: replies are served in push order, sent
/// commands are recorded for assertions.
#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct MockChannel {
        replies: Mutex<VecDeque<Result<Vec<u8>, DeviceError>>>,
        pub sent: Mutex<Vec<Vec<u8>>>,
    }

    impl MockChannel {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_reply(&self, reply: Vec<u8>) {
            self.replies.lock().unwrap().push_back(Ok(reply));
        }

        pub fn push_error(&self, err: DeviceError) {
            self.replies.lock().unwrap().push_back(Err(err));
        }

        pub fn sent_commands(&self) -> Vec<Vec<u8>> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DeviceChannel for MockChannel {
        async fn transact(
            &self,
            command: &[u8],
            _response_len: usize,
        ) -> Result<Vec<u8>, DeviceError> {
            self.sent.lock().unwrap().push(command.to_vec());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| panic!("mock channel exhausted, command {command:?}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_failure_is_connection_failed() {
        // Port 9 on localhost is expected to refuse.
        let channel = TcpChannel::new("127.0.0.1:9", Duration::from_millis(200));
        let err = channel.transact(&[0x00, 0x7E], 2).await.unwrap_err();
        match err {
            DeviceError::ConnectionFailed(_) | DeviceError::Timeout(_) => {}
            other => panic!("unexpected error: {other}"),
        }
    }
}
