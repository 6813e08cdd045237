//! HTTP and TCP liveness probes.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::net::TcpStream;

use crate::port::outbound::{HttpProbe, PortProbe};

/// One-shot HTTP GET; any success status counts as live.
#[derive(Debug, Clone)]
pub struct ReqwestProbe {
    client: Client,
    timeout: Duration,
}

impl ReqwestProbe {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            timeout,
        }
    }
}

#[async_trait]
impl HttpProbe for ReqwestProbe {
    async fn is_live(&self, url: &str) -> bool {
        match self.client.get(url).timeout(self.timeout).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

/// Loopback connect check.
#[derive(Debug, Clone)]
pub struct TcpPortProbe {
    timeout: Duration,
}

impl TcpPortProbe {
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl PortProbe for TcpPortProbe {
    async fn is_occupied(&self, port: u16) -> bool {
        matches!(
            tokio::time::timeout(self.timeout, TcpStream::connect(("127.0.0.1", port))).await,
            Ok(Ok(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn port_probe_sees_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let probe = TcpPortProbe::new(Duration::from_secs(1));

        assert!(probe.is_occupied(port).await);
        drop(listener);
        assert!(!probe.is_occupied(port).await);
    }

    #[tokio::test]
    async fn http_probe_requires_success_status() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            for status in ["200 OK", "503 Service Unavailable"] {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = [0u8; 1024];
                let _ = tokio::io::AsyncReadExt::read(&mut socket, &mut buf).await;
                let response =
                    format!("HTTP/1.1 {status}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
                socket.write_all(response.as_bytes()).await.unwrap();
            }
        });

        let probe = ReqwestProbe::new(Duration::from_secs(2));
        let url = format!("http://127.0.0.1:{port}/");
        assert!(probe.is_live(&url).await);
        assert!(!probe.is_live(&url).await);
    }
}
