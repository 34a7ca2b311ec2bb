//! Plain TCP syslog writer.

use super::format::SyslogLine;
use super::DrainWriter;
use crate::config::{IpRange, SinkConfig};
use crate::error::DrainError;
use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, trace};
use url::{Host, Url};

const SCHEMES: &[&str] = &["syslog", "tcp"];

/// Host and port of a drain URL such as `syslog://logs.example.com:514`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainAddress {
    pub host: String,
    pub port: u16,
}

impl DrainAddress {
    pub fn parse(url: &str) -> Result<Self, DrainError> {
        let invalid =
            |reason: &str| DrainError::InvalidUrl { url: url.to_string(), reason: reason.into() };

        let parsed = Url::parse(url).map_err(|err| invalid(&err.to_string()))?;
        if !SCHEMES.contains(&parsed.scheme()) {
            return Err(invalid("unsupported scheme"));
        }
        if !parsed.username().is_empty() || parsed.password().is_some() {
            return Err(invalid("credentials are not allowed"));
        }
        let host = match parsed.host() {
            Some(Host::Ipv6(addr)) => addr.to_string(),
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Domain(domain)) if domain.contains('%') => {
                return Err(invalid("percent-encoded host"));
            }
            Some(Host::Domain(domain)) if !domain.is_empty() => domain.to_string(),
            _ => return Err(invalid("missing host")),
        };
        let port = parsed.port().ok_or_else(|| invalid("missing port"))?;
        Ok(Self { host, port })
    }
}

/// Writes octet-counted RFC 5424 lines to a drain over TCP.
#[derive(Debug)]
pub struct TcpSyslogWriter {
    url: String,
    address: DrainAddress,
    app_id: String,
    hostname: String,
    connect_timeout: Duration,
    write_timeout: Duration,
    blacklist: Vec<IpRange>,
    stream: Option<TcpStream>,
}

impl TcpSyslogWriter {
    /// Writer for `drain_url` on behalf of `app_id`. Fails only if the URL cannot be parsed.
    pub fn new(drain_url: &str, app_id: &str, config: &SinkConfig) -> Result<Self, DrainError> {
        Ok(Self {
            url: drain_url.to_string(),
            address: DrainAddress::parse(drain_url)?,
            app_id: app_id.to_string(),
            hostname: config.hostname.clone(),
            connect_timeout: config.connect_timeout(),
            write_timeout: config.write_timeout(),
            blacklist: config.blacklist_ips.clone(),
            stream: None,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn target(&self) -> String {
        format!("{}:{}", self.address.host, self.address.port)
    }

    async fn resolve(&self) -> Result<SocketAddr, DrainError> {
        let target = self.target();
        let lookup = tokio::net::lookup_host((self.address.host.as_str(), self.address.port));
        let addrs: Vec<SocketAddr> = timeout(self.connect_timeout, lookup)
            .await
            .map_err(|_| DrainError::ConnectTimeout {
                target: target.clone(),
                timeout: self.connect_timeout,
            })?
            .map_err(|source| DrainError::Connect { target: target.clone(), source })?
            .collect();

        let mut first_blocked = None;
        for addr in addrs {
            if self.blacklist.iter().any(|range| range.contains(addr.ip())) {
                first_blocked.get_or_insert(addr.ip());
                continue;
            }
            return Ok(addr);
        }
        match first_blocked {
            Some(addr) => Err(DrainError::Blacklisted { addr }),
            None => Err(DrainError::Connect {
                target,
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses resolved"),
            }),
        }
    }
}

#[async_trait]
impl DrainWriter for TcpSyslogWriter {
    async fn connect(&mut self) -> Result<(), DrainError> {
        self.close().await;
        let addr = self.resolve().await?;
        trace!(drain_url = %self.url, %addr, "dialing drain");
        let target = addr.to_string();
        let stream = timeout(self.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| DrainError::ConnectTimeout {
                target: target.clone(),
                timeout: self.connect_timeout,
            })?
            .map_err(|source| DrainError::Connect { target: target.clone(), source })?;
        stream.set_nodelay(true).map_err(|source| DrainError::Connect { target, source })?;
        self.stream = Some(stream);
        Ok(())
    }

    async fn write(
        &mut self,
        priority: i32,
        message: &[u8],
        source_type: &str,
        source_instance: &str,
        timestamp: i64,
    ) -> Result<usize, DrainError> {
        let frame = SyslogLine {
            priority,
            timestamp,
            hostname: &self.hostname,
            app_name: &self.app_id,
            source_type,
            source_instance,
            message,
        }
        .frame();

        let stream = self.stream.as_mut().ok_or(DrainError::NotConnected)?;
        let result = match timeout(self.write_timeout, stream.write_all(&frame)).await {
            Ok(Ok(())) => Ok(frame.len()),
            Ok(Err(source)) => Err(DrainError::Write { source }),
            Err(_) => Err(DrainError::WriteTimeout { timeout: self.write_timeout }),
        };
        if result.is_err() {
            // The session is dead either way; drop it so the next connect starts clean.
            self.stream = None;
        }
        result
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                debug!(drain_url = %self.url, error = %e, "error shutting down drain connection");
            }
        }
    }
}
