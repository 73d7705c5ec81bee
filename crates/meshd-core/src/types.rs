use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Number of BLAKE3 output bytes kept in a key fingerprint.
const FINGERPRINT_LEN: usize = 16;

/// Stable identifier of a mesh participant.
///
/// Usually a hex fingerprint of the node's public key, but any non-empty
/// token without whitespace is accepted so that operators can use names.
/// Ordering is byte-wise on the underlying string and is what the graph
/// engine uses to break ties deterministically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId(String);

impl NodeId {
    /// Create a node id, rejecting empty strings and embedded whitespace.
    pub fn new(id: impl Into<String>) -> Result<Self, CoreError> {
        let id = id.into();
        if id.is_empty() {
            return Err(CoreError::InvalidNodeId("node id must not be empty".into()));
        }
        if id.chars().any(char::is_whitespace) {
            return Err(CoreError::InvalidNodeId(format!(
                "node id must not contain whitespace, got: {:?}",
                id
            )));
        }
        Ok(Self(id))
    }

    /// Derive a node id from raw public key bytes.
    pub fn from_public_key(key: &[u8]) -> Self {
        let digest = blake3::hash(key);
        Self(hex::encode(&digest.as_bytes()[..FINGERPRINT_LEN]))
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NodeId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for NodeId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

/// Opaque subnet-ownership key advertised by a node.
///
/// The core never interprets the contents; switch mode uses MAC addresses
/// formatted as `aa:bb:cc:dd:ee:ff`, but any non-empty token is valid.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Subnet(String);

impl Subnet {
    /// Create a subnet key.
    pub fn new(key: impl Into<String>) -> Result<Self, CoreError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(CoreError::InvalidSubnet("subnet key must not be empty".into()));
        }
        Ok(Self(key))
    }

    /// Build the subnet key for a layer-2 address.
    pub fn from_mac(mac: &[u8; 6]) -> Self {
        Self(
            mac.iter()
                .map(|b| format!("{:02x}", b))
                .collect::<Vec<_>>()
                .join(":"),
        )
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Subnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Subnet {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Subnet {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Subnet> for String {
    fn from(subnet: Subnet) -> Self {
        subnet.0
    }
}
