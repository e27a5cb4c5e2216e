//! Identifiers used throughout the cluster supervisor.

// Layer 1: Standard library imports
use std::fmt::{self, Display};
use std::net::SocketAddr;

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

/// Opaque identifier for a worker slot, stable across restarts of that slot.
///
/// A slot is either a small integer (the common case: `workerCount` slots
/// numbered `0..workerCount`) or a short string (the `logicalIds` case).
///
/// # Examples
///
/// ```rust
/// use nanny_core::ids::LogicalId;
///
/// let a = LogicalId::from_index(0);
/// let b = LogicalId::from_name("primary");
/// assert_ne!(a, b);
/// assert_eq!(a.to_string(), "0");
/// assert_eq!(b.to_string(), "primary");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LogicalId {
    /// Slot addressed by its ordinal position.
    Index(u32),
    /// Slot addressed by an explicit, caller-assigned name.
    Name(String),
}

impl LogicalId {
    /// Create a `LogicalId` from an ordinal slot index.
    pub fn from_index(index: u32) -> Self {
        Self::Index(index)
    }

    /// Create a `LogicalId` from an explicit name.
    pub fn from_name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }
}

impl Display for LogicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalId::Index(i) => write!(f, "{i}"),
            LogicalId::Name(n) => write!(f, "{n}"),
        }
    }
}

/// A listening address: the OS-granted (or explicitly configured) socket
/// address a [`crate::balancer::LoadBalancer`] is bound to.
///
/// Wraps [`SocketAddr`] so call sites read as domain vocabulary
/// (`ListenAddress`) rather than a bare standard-library type, and so the
/// representation can be serialized in the inspection snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListenAddress(SocketAddr);

impl ListenAddress {
    /// Wrap a concrete socket address.
    pub fn new(addr: SocketAddr) -> Self {
        Self(addr)
    }

    /// Return the underlying [`SocketAddr`].
    pub fn as_socket_addr(&self) -> SocketAddr {
        self.0
    }
}

impl From<SocketAddr> for ListenAddress {
    fn from(addr: SocketAddr) -> Self {
        Self(addr)
    }
}

impl Display for ListenAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_and_name_are_distinct() {
        assert_ne!(LogicalId::from_index(0), LogicalId::from_name("0"));
    }

    #[test]
    fn display_matches_value() {
        assert_eq!(LogicalId::from_index(3).to_string(), "3");
        assert_eq!(LogicalId::from_name("edge-1").to_string(), "edge-1");
    }

    #[test]
    fn listen_address_roundtrips() {
        let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let listen = ListenAddress::from(addr);
        assert_eq!(listen.as_socket_addr(), addr);
        assert_eq!(listen.to_string(), "127.0.0.1:8080");
    }

    #[test]
    fn logical_id_serializes_untagged() {
        let idx = serde_json::to_string(&LogicalId::from_index(7)).unwrap();
        assert_eq!(idx, "7");
        let name = serde_json::to_string(&LogicalId::from_name("w")).unwrap();
        assert_eq!(name, "\"w\"");
    }
}
