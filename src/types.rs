//! Input data structures delivered to the node update processor.
//!
//! A [`ChangeEvent`] is what the watcher pipeline hands us for every change
//! to a node resource.  The node fields are kept as raw strings: parsing
//! happens per field in [`crate::extract`] so that one malformed value never
//! rejects the rest of the object.  The types are serialised with
//! [`serde`](https://serde.rs/) using the same camelCase field names as the
//! resource definition.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::extract::{self, IpFamily};

/// Resource kind of node objects.
pub const KIND_NODE: &str = "Node";

/// Identifies a high level resource by kind and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
    pub kind: String,
    pub name: String,
}

impl ResourceKey {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Key for the node resource called `name`.
    pub fn node(name: impl Into<String>) -> Self {
        Self::new(KIND_NODE, name)
    }

    pub fn is_node(&self) -> bool {
        self.kind == KIND_NODE
    }
}

/// A resource value carried by a change event.
///
/// Only nodes are understood here; anything else deserialises into
/// [`Resource::Other`] so the processor can reject it explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Resource {
    Node(NodeDescriptor),
    #[serde(other)]
    Other,
}

impl Resource {
    pub fn as_node(&self) -> Option<&NodeDescriptor> {
        match self {
            Resource::Node(node) => Some(node),
            Resource::Other => None,
        }
    }
}

/// A single change notification for a resource.
///
/// An absent `value` means the resource was deleted.  The `revision` is an
/// opaque token from the datastore and is copied onto every derived record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub key: ResourceKey,
    #[serde(default)]
    pub value: Option<Resource>,
    #[serde(default)]
    pub revision: String,
}

impl ChangeEvent {
    /// An update carrying the full current state of `node`.
    pub fn node_update(node: NodeDescriptor, revision: impl Into<String>) -> Self {
        Self {
            key: ResourceKey::node(node.name.clone()),
            value: Some(Resource::Node(node)),
            revision: revision.into(),
        }
    }

    /// A deletion of the node called `name`.
    pub fn node_delete(name: impl Into<String>, revision: impl Into<String>) -> Self {
        Self {
            key: ResourceKey::node(name),
            value: None,
            revision: revision.into(),
        }
    }
}

/// The high level network node description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeDescriptor {
    pub name: String,
    pub spec: NodeSpec,
    pub status: NodeStatus,
}

impl NodeDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NodeSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bgp: Option<BgpSpec>,
    pub addresses: Vec<NodeAddress>,
    #[serde(rename = "ipv4VXLANTunnelAddr")]
    pub ipv4_vxlan_tunnel_addr: String,
    #[serde(rename = "ipv6VXLANTunnelAddr")]
    pub ipv6_vxlan_tunnel_addr: String,
    #[serde(rename = "vxlanTunnelMACAddr")]
    pub vxlan_tunnel_mac_v4_addr: String,
    #[serde(rename = "vxlanTunnelMACAddrV6")]
    pub vxlan_tunnel_mac_v6_addr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wireguard: Option<WireguardSpec>,
}

impl NodeSpec {
    /// First address of the given type and family that parses.
    ///
    /// Entries that fail to parse are skipped; they are not node fields in
    /// their own right, only fallback candidates.
    pub fn find_address(&self, kind: AddressType, family: IpFamily) -> Option<IpAddr> {
        self.addresses
            .iter()
            .filter(|a| a.kind == kind)
            .filter_map(|a| extract::parse_ip_or_cidr(&a.address).ok())
            .map(|(ip, _)| ip)
            .find(|ip| family.matches(ip))
    }
}

/// BGP configuration of a node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BgpSpec {
    #[serde(rename = "ipv4Address")]
    pub ipv4_address: String,
    #[serde(rename = "ipv6Address")]
    pub ipv6_address: String,
    #[serde(rename = "ipv4IPIPTunnelAddr")]
    pub ipv4_ipip_tunnel_addr: String,
}

/// Wireguard (encrypted mesh) configuration of a node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WireguardSpec {
    #[serde(rename = "interfaceIPv4Address")]
    pub interface_ipv4_address: String,
}

/// An address reported for the node by its orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAddress {
    pub address: String,
    #[serde(rename = "type")]
    pub kind: AddressType,
}

impl NodeAddress {
    pub fn new(address: impl Into<String>, kind: AddressType) -> Self {
        Self {
            address: address.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressType {
    #[serde(rename = "InternalIP")]
    InternalIp,
    #[serde(rename = "ExternalIP")]
    ExternalIp,
    #[serde(rename = "CalicoNodeIP")]
    CalicoNodeIp,
}

/// Status reported back by the node agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NodeStatus {
    pub wireguard_public_key: String,
    #[serde(rename = "podCIDRs")]
    pub pod_cidrs: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_node_event() {
        let raw = r#"{
            "key": {"kind": "Node", "name": "node1"},
            "value": {
                "kind": "Node",
                "name": "node1",
                "spec": {
                    "bgp": {"ipv4Address": "10.0.0.1/24"},
                    "addresses": [{"address": "192.168.0.5", "type": "InternalIP"}],
                    "vxlanTunnelMACAddr": "66:cf:23:df:22:07"
                },
                "status": {"podCIDRs": ["10.244.1.0/24"]}
            },
            "revision": "42"
        }"#;
        let event: ChangeEvent = serde_json::from_str(raw).unwrap();
        assert!(event.key.is_node());
        assert_eq!(event.revision, "42");

        let node = event.value.as_ref().and_then(Resource::as_node).unwrap();
        assert_eq!(node.spec.bgp.as_ref().unwrap().ipv4_address, "10.0.0.1/24");
        assert_eq!(node.spec.vxlan_tunnel_mac_v4_addr, "66:cf:23:df:22:07");
        assert_eq!(node.spec.addresses[0].kind, AddressType::InternalIp);
        assert_eq!(node.status.pod_cidrs, vec!["10.244.1.0/24".to_string()]);
    }

    #[test]
    fn test_deserialize_delete_and_foreign_kind() {
        let delete: ChangeEvent =
            serde_json::from_str(r#"{"key": {"kind": "Node", "name": "n"}, "revision": "7"}"#)
                .unwrap();
        assert!(delete.value.is_none());

        let other: ChangeEvent = serde_json::from_str(
            r#"{"key": {"kind": "Node", "name": "n"}, "value": {"kind": "Profile"}}"#,
        )
        .unwrap();
        assert_eq!(other.value, Some(Resource::Other));
    }

    #[test]
    fn test_find_address_by_type_and_family() {
        let mut spec = NodeSpec::default();
        spec.addresses = vec![
            NodeAddress::new("not-an-ip", AddressType::InternalIp),
            NodeAddress::new("fd00::5", AddressType::InternalIp),
            NodeAddress::new("192.168.0.5/16", AddressType::InternalIp),
            NodeAddress::new("203.0.113.9", AddressType::ExternalIp),
        ];

        assert_eq!(
            spec.find_address(AddressType::InternalIp, IpFamily::V4),
            Some("192.168.0.5".parse().unwrap())
        );
        assert_eq!(
            spec.find_address(AddressType::InternalIp, IpFamily::V6),
            Some("fd00::5".parse().unwrap())
        );
        assert_eq!(spec.find_address(AddressType::ExternalIp, IpFamily::V6), None);
    }
}
