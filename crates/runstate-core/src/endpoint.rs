//! Connection endpoint descriptors
//!
//! Stores are reached through descriptors of the form `scheme://authority`:
//! - `tcp://host:port` for a networked store
//! - `inproc://name` for a store living in the same process

use std::fmt;
use std::str::FromStr;

use crate::{RunStateError, RunStateResult};

/// Transport scheme of an endpoint
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scheme {
    Tcp,
    Inproc,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Tcp => "tcp",
            Scheme::Inproc => "inproc",
        }
    }
}

/// A parsed connection descriptor
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Tcp { host: String, port: u16 },
    Inproc { name: String },
}

impl Endpoint {
    /// Parse a descriptor, rejecting anything malformed with `InvalidEndpoint`
    pub fn parse(uri: &str) -> RunStateResult<Self> {
        let invalid = |why: &str| RunStateError::InvalidEndpoint(format!("{}: {}", uri, why));

        let (scheme, authority) = uri.split_once("://").ok_or_else(|| invalid("missing scheme"))?;
        if authority.is_empty() {
            return Err(invalid("empty authority"));
        }

        match scheme {
            "tcp" => {
                let (host, port) = authority
                    .rsplit_once(':')
                    .ok_or_else(|| invalid("missing port"))?;
                if host.is_empty() || host.contains('/') {
                    return Err(invalid("bad host"));
                }
                let port: u16 = port.parse().map_err(|_| invalid("bad port"))?;
                if port == 0 {
                    return Err(invalid("port must be non-zero"));
                }
                Ok(Endpoint::Tcp {
                    host: host.to_string(),
                    port,
                })
            }
            "inproc" => {
                if authority.contains('/') || authority.contains(':') {
                    return Err(invalid("bad inproc name"));
                }
                Ok(Endpoint::Inproc {
                    name: authority.to_string(),
                })
            }
            _ => Err(invalid("unsupported scheme")),
        }
    }

    pub fn scheme(&self) -> Scheme {
        match self {
            Endpoint::Tcp { .. } => Scheme::Tcp,
            Endpoint::Inproc { .. } => Scheme::Inproc,
        }
    }
}

impl FromStr for Endpoint {
    type Err = RunStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Endpoint::parse(s)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp { host, port } => write!(f, "tcp://{}:{}", host, port),
            Endpoint::Inproc { name } => write!(f, "inproc://{}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tcp() {
        let ep = Endpoint::parse("tcp://daqhost:49000").unwrap();
        assert_eq!(
            ep,
            Endpoint::Tcp {
                host: "daqhost".into(),
                port: 49000
            }
        );
        assert_eq!(ep.scheme(), Scheme::Tcp);
        assert_eq!(ep.to_string(), "tcp://daqhost:49000");
    }

    #[test]
    fn test_parse_inproc() {
        let ep: Endpoint = "inproc://vardb".parse().unwrap();
        assert_eq!(ep, Endpoint::Inproc { name: "vardb".into() });
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for uri in [
            "daqhost:49000",
            "tcp://",
            "tcp://daqhost",
            "tcp://daqhost:notaport",
            "tcp://daqhost:0",
            "tcp://:49000",
            "udp://daqhost:49000",
            "inproc://a/b",
        ] {
            assert!(
                matches!(Endpoint::parse(uri), Err(RunStateError::InvalidEndpoint(_))),
                "{} should be rejected",
                uri
            );
        }
    }
}
