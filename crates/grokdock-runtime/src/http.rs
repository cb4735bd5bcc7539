//! HTTP probes against the container's published ports.

use std::net::SocketAddr;
use std::time::Duration;

use grokdock_common::error::{CiError, Result};

/// Status and body of an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body as text.
    pub body: String,
}

impl HttpResponse {
    /// Creates a response value.
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Issues bounded-timeout GET requests.
pub trait HttpProbe: Send + Sync {
    /// Fetches `url`. `None` means no response arrived at all (refused
    /// connection, timeout, reset) as opposed to an error status.
    fn get(&self, url: &str) -> Option<HttpResponse>;
}

/// Builds the root URL of a published port.
#[must_use]
pub fn root_url(addr: SocketAddr) -> String {
    format!("http://{addr}/")
}

/// Probe backed by a blocking `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestProbe {
    client: reqwest::blocking::Client,
}

impl ReqwestProbe {
    /// Creates a probe whose connect and total timeouts are both `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `CiError::Http` if the client cannot be constructed.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| CiError::Http {
                message: e.to_string(),
            })?;
        Ok(Self { client })
    }
}

impl HttpProbe for ReqwestProbe {
    fn get(&self, url: &str) -> Option<HttpResponse> {
        let response = match self.client.get(url).send() {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(url, error = %e, "no HTTP response");
                return None;
            }
        };
        let status = response.status().as_u16();
        let body = response.text().unwrap_or_default();
        tracing::debug!(url, status, "HTTP response");
        Some(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_url_formats_socket_address() {
        let addr: SocketAddr = "127.0.0.1:49153".parse().unwrap();
        assert_eq!(root_url(addr), "http://127.0.0.1:49153/");
    }

    #[test]
    fn refused_connection_is_no_response() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        let probe = ReqwestProbe::new(Duration::from_secs(2)).expect("client");
        assert!(probe.get(&root_url(addr)).is_none());
    }

    #[test]
    fn status_and_body_are_captured() {
        use std::io::{Read, Write};

        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            let mut buf = [0_u8; 1024];
            let _ = stream.read(&mut buf).expect("read");
            let body = "<title>OpenGrok</title>";
            let reply = format!(
                "HTTP/1.1 404 Not Found\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(reply.as_bytes()).expect("write");
        });

        let probe = ReqwestProbe::new(Duration::from_secs(5)).expect("client");
        let response = probe.get(&root_url(addr)).expect("response");
        server.join().expect("server thread");
        assert_eq!(response.status, 404);
        assert!(response.body.contains("OpenGrok"));
    }
}
