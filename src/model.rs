//! Output records consumed by the dataplane agent.
//!
//! Each record is a key, an optional value and the revision of the event it
//! was derived from.  A `None` value is an explicit delete of the key.

use std::fmt;
use std::net::IpAddr;

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

use crate::types::{Resource, ResourceKey};

/// Host config name of the IPIP tunnel address.
pub const IPIP_TUNNEL_ADDR: &str = "IpInIpTunnelAddr";
pub const IPV4_VXLAN_TUNNEL_ADDR: &str = "IPv4VXLANTunnelAddr";
pub const IPV6_VXLAN_TUNNEL_ADDR: &str = "IPv6VXLANTunnelAddr";
pub const VXLAN_TUNNEL_MAC_V4_ADDR: &str = "VXLANTunnelMACV4Addr";
pub const VXLAN_TUNNEL_MAC_V6_ADDR: &str = "VXLANTunnelMACV6Addr";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecordKey {
    /// The primary address of a host.
    HostIp { hostname: String },
    /// A named per-host configuration value.
    HostConfig { hostname: String, name: String },
    /// The original high level resource.
    Resource(ResourceKey),
    /// Wireguard configuration of a node.
    Wireguard { node_name: String },
    /// An address block and its affinity.
    Block { cidr: IpNetwork },
}

impl RecordKey {
    pub fn host_ip(hostname: impl Into<String>) -> Self {
        RecordKey::HostIp {
            hostname: hostname.into(),
        }
    }

    pub fn host_config(hostname: impl Into<String>, name: impl Into<String>) -> Self {
        RecordKey::HostConfig {
            hostname: hostname.into(),
            name: name.into(),
        }
    }

    pub fn wireguard(node_name: impl Into<String>) -> Self {
        RecordKey::Wireguard {
            node_name: node_name.into(),
        }
    }

    pub fn block(cidr: IpNetwork) -> Self {
        RecordKey::Block { cidr }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKey::HostIp { hostname } => write!(f, "/calico/v1/host/{}/bird_ip", hostname),
            RecordKey::HostConfig { hostname, name } => {
                write!(f, "/calico/v1/host/{}/config/{}", hostname, name)
            }
            RecordKey::Resource(key) => write!(
                f,
                "/calico/resources/v3/projectcalico.org/{}s/{}",
                key.kind.to_lowercase(),
                key.name
            ),
            RecordKey::Wireguard { node_name } => {
                write!(f, "/calico/v1/host/{}/wireguard", node_name)
            }
            RecordKey::Block { cidr } => {
                let family = if cidr.is_ipv4() { "ipv4" } else { "ipv6" };
                write!(
                    f,
                    "/calico/ipam/v2/assignment/{}/block/{}-{}",
                    family,
                    cidr.network(),
                    cidr.prefix()
                )
            }
        }
    }
}

/// Wireguard settings of a node; either part may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireguardConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface_ipv4_addr: Option<IpAddr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

/// An address block with the host it is affine to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationBlock {
    pub cidr: IpNetwork,
    pub affinity: Option<String>,
}

impl AllocationBlock {
    /// A block affine to `hostname`.
    pub fn for_host(cidr: IpNetwork, hostname: &str) -> Self {
        Self {
            cidr,
            affinity: Some(format!("host:{}", hostname)),
        }
    }
}

/// The value half of an [`OutputRecord`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RecordValue {
    Ip(IpAddr),
    Text(String),
    Wireguard(WireguardConfig),
    Block(AllocationBlock),
    Resource(Resource),
}

impl RecordValue {
    pub fn as_ip(&self) -> Option<IpAddr> {
        match self {
            RecordValue::Ip(ip) => Some(*ip),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            RecordValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// A single key/value update for the dataplane agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputRecord {
    pub key: RecordKey,
    /// `None` deletes the key.
    pub value: Option<RecordValue>,
    pub revision: String,
}

impl OutputRecord {
    pub fn new(key: RecordKey, value: Option<RecordValue>, revision: impl Into<String>) -> Self {
        Self {
            key,
            value,
            revision: revision.into(),
        }
    }

    pub fn is_delete(&self) -> bool {
        self.value.is_none()
    }
}
