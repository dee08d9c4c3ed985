//! Receiver addressing (`raop://host:port`, `raopt://host:port`).

use crate::error::{Error, Result};
use crate::stream::ProtocolVersion;
use std::fmt;

const MODERN_SCHEME: &str = "raop://";
const LEGACY_SCHEME: &str = "raopt://";

/// A receiver named by URL: the only identifier that selects this engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaopTarget {
    pub version: ProtocolVersion,
    pub host: String,
    pub port: u16,
}

impl RaopTarget {
    pub fn new(version: ProtocolVersion, host: impl Into<String>, port: u16) -> Self {
        Self {
            version,
            host: host.into(),
            port,
        }
    }

    /// Whether `name` uses one of the RAOP schemes.
    pub fn probe(name: &str) -> bool {
        name.starts_with(MODERN_SCHEME) || name.starts_with(LEGACY_SCHEME)
    }

    /// Parse a target URL.
    ///
    /// An unknown scheme is an internal error (the name was routed here by
    /// mistake); a malformed `host:port` is a parameter error.
    pub fn parse(name: &str) -> Result<Self> {
        let (version, rest) = if let Some(rest) = name.strip_prefix(MODERN_SCHEME) {
            (ProtocolVersion::Modern, rest)
        } else if let Some(rest) = name.strip_prefix(LEGACY_SCHEME) {
            (ProtocolVersion::Legacy, rest)
        } else {
            return Err(Error::Internal(format!("not a RAOP target: {}", name)));
        };

        let parts: Vec<&str> = rest.split(':').collect();
        if parts.len() != 2 {
            return Err(Error::InvalidParameters(format!(
                "expected host:port, got {:?}",
                rest
            )));
        }
        let host = parts[0];
        if host.is_empty() {
            return Err(Error::InvalidParameters("empty host".to_string()));
        }
        let port = parts[1]
            .parse::<u16>()
            .map_err(|_| Error::InvalidParameters(format!("invalid port {:?}", parts[1])))?;

        Ok(Self::new(version, host, port))
    }
}

impl fmt::Display for RaopTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = match self.version {
            ProtocolVersion::Modern => MODERN_SCHEME,
            ProtocolVersion::Legacy => LEGACY_SCHEME,
        };
        write!(f, "{}{}:{}", scheme, self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod parse {
        use super::*;

        #[test]
        fn modern_scheme() {
            let target = RaopTarget::parse("raop://192.168.1.20:5000").unwrap();
            assert_eq!(target.version, ProtocolVersion::Modern);
            assert_eq!(target.host, "192.168.1.20");
            assert_eq!(target.port, 5000);
        }

        #[test]
        fn legacy_scheme() {
            let target = RaopTarget::parse("raopt://speaker.local:49152").unwrap();
            assert_eq!(target.version, ProtocolVersion::Legacy);
            assert_eq!(target.host, "speaker.local");
            assert_eq!(target.port, 49152);
        }

        #[test]
        fn unknown_scheme_is_internal_error() {
            assert!(matches!(
                RaopTarget::parse("http://speaker.local:80"),
                Err(Error::Internal(_))
            ));
        }

        #[test]
        fn missing_port() {
            assert!(matches!(
                RaopTarget::parse("raop://speaker.local"),
                Err(Error::InvalidParameters(_))
            ));
        }

        #[test]
        fn too_many_colons() {
            assert!(matches!(
                RaopTarget::parse("raop://a:b:5000"),
                Err(Error::InvalidParameters(_))
            ));
        }

        #[test]
        fn non_numeric_port() {
            assert!(matches!(
                RaopTarget::parse("raop://speaker.local:airplay"),
                Err(Error::InvalidParameters(_))
            ));
        }

        #[test]
        fn empty_host() {
            assert!(RaopTarget::parse("raop://:5000").is_err());
        }
    }

    #[test]
    fn probe_matches_both_schemes() {
        assert!(RaopTarget::probe("raop://x:1"));
        assert!(RaopTarget::probe("raopt://x:1"));
        assert!(!RaopTarget::probe("file:///tmp/out.pcm"));
    }

    #[test]
    fn display_round_trips() {
        let target = RaopTarget::new(ProtocolVersion::Legacy, "10.0.0.5", 5000);
        assert_eq!(target.to_string(), "raopt://10.0.0.5:5000");
        assert_eq!(RaopTarget::parse(&target.to_string()).unwrap(), target);
    }
}
