use std::fmt::{Display, Formatter};
use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;

use crate::error::{Error, Result};

/// Transport endpoint configuration.
///
/// Endpoints can be built with the typed constructors or parsed from the
/// conventional MAVLink connection strings:
///
/// * `udpin:<local_ip>:<local_port>` for a UDP server,
/// * `udpout:<remote_ip>:<remote_port>` for a UDP client,
/// * `tcpout:<remote_ip>:<remote_port>` for a TCP client,
/// * `serial:<device>:<baud>` for a serial device.
///
/// ```rust
/// use mavroute::io::Endpoint;
///
/// let endpoint: Endpoint = "udpin:127.0.0.1:14550".parse().unwrap();
/// assert_eq!(endpoint, Endpoint::udp_in("127.0.0.1:14550").unwrap());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Endpoint {
    /// UDP server bound to a local address.
    UdpIn {
        /// Local address to bind to.
        bind_addr: SocketAddr,
    },
    /// UDP client with a fixed remote.
    UdpOut {
        /// Address of the remote.
        remote_addr: SocketAddr,
    },
    /// TCP client.
    TcpOut {
        /// Address of the remote.
        remote_addr: SocketAddr,
    },
    /// Serial device.
    Serial {
        /// Device path.
        path: String,
        /// Baud rate.
        baud_rate: u32,
    },
}

impl Endpoint {
    /// Instantiates a UDP server endpoint.
    ///
    /// Accepts anything that implements [`ToSocketAddrs`], prefers IPv4
    /// addresses if available.
    pub fn udp_in(addr: impl ToSocketAddrs) -> Result<Self> {
        Ok(Self::UdpIn {
            bind_addr: resolve_socket_addr(addr)?,
        })
    }

    /// Instantiates a UDP client endpoint.
    pub fn udp_out(addr: impl ToSocketAddrs) -> Result<Self> {
        Ok(Self::UdpOut {
            remote_addr: resolve_socket_addr(addr)?,
        })
    }

    /// Instantiates a TCP client endpoint.
    pub fn tcp_out(addr: impl ToSocketAddrs) -> Result<Self> {
        Ok(Self::TcpOut {
            remote_addr: resolve_socket_addr(addr)?,
        })
    }

    /// Instantiates a serial device endpoint.
    pub fn serial(path: impl Into<String>, baud_rate: u32) -> Self {
        Self::Serial {
            path: path.into(),
            baud_rate,
        }
    }
}

impl FromStr for Endpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (scheme, rest) = s
            .split_once(':')
            .ok_or_else(|| Error::InvalidTransportSpec(s.to_string()))?;

        match scheme {
            "udpin" => Self::udp_in(rest),
            "udpout" => Self::udp_out(rest),
            "tcpout" => Self::tcp_out(rest),
            "serial" => {
                let (path, baud) = rest
                    .rsplit_once(':')
                    .ok_or_else(|| Error::InvalidTransportSpec(s.to_string()))?;
                if path.is_empty() {
                    return Err(Error::InvalidTransportSpec(s.to_string()));
                }
                let baud_rate = baud
                    .parse::<u32>()
                    .map_err(|_| Error::InvalidTransportSpec(s.to_string()))?;
                Ok(Self::serial(path, baud_rate))
            }
            _ => Err(Error::InvalidTransportSpec(s.to_string())),
        }
        .map_err(|_| Error::InvalidTransportSpec(s.to_string()))
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::UdpIn { bind_addr } => write!(f, "udpin:{bind_addr}"),
            Endpoint::UdpOut { remote_addr } => write!(f, "udpout:{remote_addr}"),
            Endpoint::TcpOut { remote_addr } => write!(f, "tcpout:{remote_addr}"),
            Endpoint::Serial { path, baud_rate } => write!(f, "serial:{path}:{baud_rate}"),
        }
    }
}

/// Resolves a socket address, preferring IPv4 addresses if available.
fn resolve_socket_addr(addr: impl ToSocketAddrs) -> Result<SocketAddr> {
    let addrs: Vec<SocketAddr> = addr
        .to_socket_addrs()
        .map_err(|err| Error::InvalidTransportSpec(err.to_string()))?
        .collect();
    addrs
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| Error::InvalidTransportSpec("unresolvable address".to_string()))
}

#[cfg(test)]
mod endpoint_tests {
    use super::*;

    #[test]
    fn connection_strings_parse() {
        assert_eq!(
            "udpin:127.0.0.1:14550".parse::<Endpoint>().unwrap(),
            Endpoint::udp_in("127.0.0.1:14550").unwrap()
        );
        assert_eq!(
            "udpout:127.0.0.1:14560".parse::<Endpoint>().unwrap(),
            Endpoint::udp_out("127.0.0.1:14560").unwrap()
        );
        assert_eq!(
            "tcpout:127.0.0.1:5760".parse::<Endpoint>().unwrap(),
            Endpoint::tcp_out("127.0.0.1:5760").unwrap()
        );
        assert_eq!(
            "serial:/dev/ttyUSB0:57600".parse::<Endpoint>().unwrap(),
            Endpoint::serial("/dev/ttyUSB0", 57600)
        );
    }

    #[test]
    fn invalid_connection_strings_are_rejected() {
        for spec in [
            "",
            "udpin",
            "udpin:not-a-port",
            "udpin:127.0.0.1:70000",
            "tcpin:127.0.0.1:5760",
            "serial:/dev/ttyUSB0",
            "serial:/dev/ttyUSB0:fast",
            "serial::57600",
        ] {
            assert!(
                matches!(
                    spec.parse::<Endpoint>(),
                    Err(Error::InvalidTransportSpec(_))
                ),
                "`{spec}` should not parse"
            );
        }
    }

    #[test]
    fn display_round_trips() {
        for spec in [
            "udpin:127.0.0.1:14550",
            "udpout:127.0.0.1:14560",
            "tcpout:127.0.0.1:5760",
            "serial:/dev/ttyUSB0:57600",
        ] {
            let endpoint: Endpoint = spec.parse().unwrap();
            assert_eq!(endpoint.to_string(), spec);
        }
    }
}
