//! Network endpoints of skeletons.

use std::fmt;
use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::net::Ipv6Addr;
use std::net::SocketAddr;
use std::str::FromStr;

use tokio::net::UdpSocket;

use crate::error::Error;
use crate::error::Result;

/// A (host, port) pair identifying a skeleton's listening endpoint.
///
/// The host is kept as written, so a stub can carry a DNS name across to
/// another process and resolve it there.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteAddress {
    host: String,
    port: u16,
}

impl RemoteAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port }
    }

    /// Loopback with port 0, for skeletons that take an ephemeral port.
    pub fn localhost() -> Self {
        Self::new("127.0.0.1", 0)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn with_host(&self, host: impl Into<String>) -> Self {
        Self::new(host, self.port)
    }

    pub fn with_port(&self, port: u16) -> Self {
        Self::new(self.host.clone(), port)
    }

    /// True for hosts that mean "every interface" and cannot be dialled.
    pub fn is_wildcard(&self) -> bool {
        match self.host.as_str() {
            "" | "*" => true,
            host => host.parse::<IpAddr>().is_ok_and(|ip| ip.is_unspecified()),
        }
    }

    /// Replaces a wildcard host with a concrete address peers can dial.
    ///
    /// Tries the address of the interface that routes outward first, then
    /// whatever `localhost` resolves to.
    pub async fn advertisable(&self) -> Result<Self> {
        if !self.is_wildcard() {
            return Ok(self.clone());
        }

        let v6 = self.host.parse::<IpAddr>().is_ok_and(|ip| ip.is_ipv6());
        if let Some(ip) = route_probe(v6).await {
            return Ok(self.with_host(ip.to_string()));
        }

        let resolved = tokio::net::lookup_host(("localhost", self.port))
            .await
            .map_err(|e| Error::AddressResolution(format!("{}: {}", self, e)))?
            .next();

        match resolved {
            Some(addr) => Ok(self.with_host(addr.ip().to_string())),
            None => Err(Error::AddressResolution(format!("no advertisable address for {}", self))),
        }
    }
}

/// Local address chosen by the routing table for an outbound datagram.
/// Connecting a UDP socket sends nothing.
async fn route_probe(v6: bool) -> Option<IpAddr> {
    let (bind, target): (SocketAddr, SocketAddr) = if v6 {
        (
            (Ipv6Addr::UNSPECIFIED, 0).into(),
            (Ipv6Addr::new(0x2001, 0x4860, 0x4860, 0, 0, 0, 0, 0x8888), 53).into(),
        )
    } else {
        ((Ipv4Addr::UNSPECIFIED, 0).into(), (Ipv4Addr::new(8, 8, 8, 8), 53).into())
    };

    let socket = UdpSocket::bind(bind).await.ok()?;
    socket.connect(target).await.ok()?;
    let ip = socket.local_addr().ok()?.ip();
    (!ip.is_unspecified()).then_some(ip)
}

impl fmt::Display for RemoteAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl From<SocketAddr> for RemoteAddress {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

impl FromStr for RemoteAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if let Ok(addr) = s.parse::<SocketAddr>() {
            return Ok(addr.into());
        }

        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| Error::AddressResolution(format!("expected host:port, got {:?}", s)))?;
        let port = port
            .parse::<u16>()
            .map_err(|_| Error::AddressResolution(format!("bad port in {:?}", s)))?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(Error::AddressResolution(format!("missing host in {:?}", s)));
        }
        Ok(Self::new(host, port))
    }
}
