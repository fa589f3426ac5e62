//! Translation of node change events into dataplane records.
//!
//! A node resource bundles several independent pieces of configuration.  The
//! dataplane agent consumes each of them under its own key, so one event fans
//! out into a fixed list of records, followed by the address block updates
//! for the node's pod CIDRs:
//!
//! 1. host IP
//! 2. IPIP tunnel address
//! 3. VXLAN IPv4 tunnel address
//! 4. VXLAN IPv6 tunnel address
//! 5. VXLAN IPv6 tunnel MAC
//! 6. VXLAN IPv4 tunnel MAC
//! 7. the original node resource
//! 8. wireguard configuration
//! 9. block deletes, then block assignments
//!
//! A field that fails to parse is sent as a delete and reported in the
//! returned [`Translation`]; it never holds back the other records.

use std::net::IpAddr;

use log::{debug, warn};

use crate::error::{Error, FieldFailure, Result};
use crate::extract::{self, Field, FieldResult, IpFamily};
use crate::model::{
    AllocationBlock, OutputRecord, RecordKey, RecordValue, WireguardConfig, IPIP_TUNNEL_ADDR,
    IPV4_VXLAN_TUNNEL_ADDR, IPV6_VXLAN_TUNNEL_ADDR, VXLAN_TUNNEL_MAC_V4_ADDR,
    VXLAN_TUNNEL_MAC_V6_ADDR,
};
use crate::tracker::CidrTracker;
use crate::types::{AddressType, ChangeEvent, NodeDescriptor, Resource, ResourceKey};

/// Converts change events for one resource kind into dataplane records.
pub trait UpdateProcessor: Send + Sync {
    /// Translate a single change event.
    ///
    /// Structural problems with the event are returned as `Err` and produce
    /// no records.  Field level problems are carried in the [`Translation`].
    fn process(&self, event: &ChangeEvent) -> Result<Translation>;

    /// Called when the upstream syncer (re)starts its initial sync.
    fn on_syncer_starting(&self);
}

/// Records produced for one event, plus the fields that failed to parse.
#[derive(Debug, Clone, PartialEq)]
pub struct Translation {
    pub records: Vec<OutputRecord>,
    pub failures: Vec<FieldFailure>,
}

impl Translation {
    /// Aggregate error for the failed fields, if any.
    pub fn error(&self) -> Option<Error> {
        if self.failures.is_empty() {
            None
        } else {
            Some(Error::FieldParse(self.failures.clone()))
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Find the record with the given key.
    pub fn record(&self, key: &RecordKey) -> Option<&OutputRecord> {
        self.records.iter().find(|r| &r.key == key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorOptions {
    /// Send address block records derived from the node's pod CIDRs.
    pub use_pod_cidr: bool,
    /// Drop the CIDR tracking entry of a node once it has been deleted.
    pub prune_on_delete: bool,
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self {
            use_pod_cidr: true,
            prune_on_delete: true,
        }
    }
}

/// Where the host IP may come from, in order of preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AddressSource {
    Bgp,
    Internal,
    External,
}

const NO_CIDRS: &[String] = &[];

const ADDRESS_PRIORITY: [AddressSource; 3] = [
    AddressSource::Bgp,
    AddressSource::Internal,
    AddressSource::External,
];

/// The per-field values derived from a node. `None` means delete.
#[derive(Debug, Default)]
struct NodeFields {
    host_ip: Option<IpAddr>,
    ipip_tunnel_addr: Option<IpAddr>,
    vxlan_tunnel_ipv4_addr: Option<IpAddr>,
    vxlan_tunnel_ipv6_addr: Option<IpAddr>,
    vxlan_tunnel_mac_v4_addr: Option<String>,
    vxlan_tunnel_mac_v6_addr: Option<String>,
    wireguard: Option<WireguardConfig>,
}

impl NodeFields {
    fn extract(node: &NodeDescriptor, failures: &mut Vec<FieldFailure>) -> Self {
        let spec = &node.spec;

        let ipv4 = resolve_address(node, IpFamily::V4, failures);
        let ipv6 = resolve_address(node, IpFamily::V6, failures);

        let ipip_tunnel_addr = match &spec.bgp {
            Some(bgp) => extract::extract_ip(Field::IpIpTunnelAddr, &bgp.ipv4_ipip_tunnel_addr),
            None => FieldResult::Absent,
        }
        .collect(failures);

        let vxlan_tunnel_ipv4_addr =
            extract::extract_ip(Field::VxlanTunnelIpv4Addr, &spec.ipv4_vxlan_tunnel_addr)
                .collect(failures);
        let vxlan_tunnel_ipv6_addr =
            extract::extract_ip(Field::VxlanTunnelIpv6Addr, &spec.ipv6_vxlan_tunnel_addr)
                .collect(failures);
        let vxlan_tunnel_mac_v4_addr =
            extract::extract_identifier(Field::VxlanTunnelMacV4Addr, &spec.vxlan_tunnel_mac_v4_addr)
                .collect(failures);
        let vxlan_tunnel_mac_v6_addr =
            extract::extract_identifier(Field::VxlanTunnelMacV6Addr, &spec.vxlan_tunnel_mac_v6_addr)
                .collect(failures);

        let interface_ipv4_addr = match &spec.wireguard {
            Some(wg) => extract::extract_ip(Field::WireguardInterfaceAddr, &wg.interface_ipv4_address),
            None => FieldResult::Absent,
        }
        .collect(failures);
        let public_key =
            extract::extract_public_key(Field::WireguardPublicKey, &node.status.wireguard_public_key)
                .collect(failures);

        // Only send wireguard config if at least one part of it is usable.
        let wireguard = (interface_ipv4_addr.is_some() || public_key.is_some()).then(|| {
            WireguardConfig {
                interface_ipv4_addr,
                public_key,
            }
        });

        Self {
            host_ip: ipv4.or(ipv6),
            ipip_tunnel_addr,
            vxlan_tunnel_ipv4_addr,
            vxlan_tunnel_ipv6_addr,
            vxlan_tunnel_mac_v4_addr,
            vxlan_tunnel_mac_v6_addr,
            wireguard,
        }
    }
}

/// Pick the node address of `family` from the first source that yields one.
fn resolve_address(
    node: &NodeDescriptor,
    family: IpFamily,
    failures: &mut Vec<FieldFailure>,
) -> Option<IpAddr> {
    ADDRESS_PRIORITY.iter().find_map(|source| match source {
        AddressSource::Bgp => bgp_address(node, family, failures),
        AddressSource::Internal => node.spec.find_address(AddressType::InternalIp, family),
        AddressSource::External => node.spec.find_address(AddressType::ExternalIp, family),
    })
}

fn bgp_address(
    node: &NodeDescriptor,
    family: IpFamily,
    failures: &mut Vec<FieldFailure>,
) -> Option<IpAddr> {
    let bgp = node.spec.bgp.as_ref()?;
    let (field, raw) = match family {
        IpFamily::V4 => (Field::BgpIpv4Address, &bgp.ipv4_address),
        IpFamily::V6 => (Field::BgpIpv6Address, &bgp.ipv6_address),
    };
    let ip = extract::extract_ip(field, raw).collect(failures)?;
    if !family.matches(&ip) {
        debug!("Ignoring {} {}: wrong address family", field, ip);
        return None;
    }
    Some(ip)
}

/// Translates node resources into the per-host records the dataplane uses.
#[derive(Debug, Default)]
pub struct NodeUpdateProcessor {
    options: ProcessorOptions,
    tracker: CidrTracker,
}

impl NodeUpdateProcessor {
    pub fn new(options: ProcessorOptions) -> Self {
        Self {
            options,
            tracker: CidrTracker::new(),
        }
    }

    /// The CIDR tracking state owned by this processor.
    pub fn tracker(&self) -> &CidrTracker {
        &self.tracker
    }

    fn extract_name<'a>(&self, key: &'a ResourceKey) -> Result<&'a str> {
        if !key.is_node() {
            return Err(Error::KeyMismatch {
                kind: key.kind.clone(),
            });
        }
        Ok(&key.name)
    }

    /// Block deletes for CIDRs the node no longer has, then assignments for
    /// the ones it has now.  `current` is `None` for a deleted node.
    fn block_records(
        &self,
        name: &str,
        current: Option<&[String]>,
        revision: &str,
        failures: &mut Vec<FieldFailure>,
    ) -> Vec<OutputRecord> {
        let (removed, current) = match current {
            Some(cidrs) => (self.tracker.reconcile(name, cidrs), cidrs),
            None if self.options.prune_on_delete => {
                debug!("Stopped tracking CIDRs for deleted node {}", name);
                (self.tracker.take(name), NO_CIDRS)
            }
            None => (self.tracker.reconcile(name, NO_CIDRS), NO_CIDRS),
        };
        debug!("Current CIDRs for {}: {:?}", name, current);
        debug!("Old CIDRs for {}: {:?}", name, removed);

        let mut records = Vec::with_capacity(removed.len() + current.len());
        for cidr in &removed {
            match extract::parse_cidr(cidr) {
                Ok(net) => records.push(OutputRecord::new(RecordKey::block(net), None, revision)),
                Err(reason) => warn!("Failed to parse old pod CIDR {:?}: {}", cidr, reason),
            }
        }

        for cidr in current {
            match extract::extract_cidr(Field::PodCidr, cidr) {
                FieldResult::Parsed(net) => {
                    let block = AllocationBlock::for_host(net, name);
                    records.push(OutputRecord::new(
                        RecordKey::block(net),
                        Some(RecordValue::Block(block)),
                        revision,
                    ));
                }
                FieldResult::Absent => warn!("Skipping empty pod CIDR on node {}", name),
                FieldResult::Invalid(failure) => failures.push(failure),
            }
        }
        records
    }
}

impl UpdateProcessor for NodeUpdateProcessor {
    fn process(&self, event: &ChangeEvent) -> Result<Translation> {
        let name = self.extract_name(&event.key)?;
        let revision = event.revision.as_str();

        // For a delete every field stays None, which is sent as a delete of
        // the underlying key.
        let mut failures = Vec::new();
        let (fields, pod_cidrs) = match &event.value {
            Some(Resource::Node(node)) => {
                debug!("Processing update for node {} at revision {}", name, revision);
                (
                    NodeFields::extract(node, &mut failures),
                    Some(node.status.pod_cidrs.as_slice()),
                )
            }
            Some(Resource::Other) => return Err(Error::ValueMismatch),
            None => {
                debug!("Processing delete for node {} at revision {}", name, revision);
                (NodeFields::default(), None)
            }
        };

        let host_config = |config: &str, value: Option<String>| {
            OutputRecord::new(
                RecordKey::host_config(name, config),
                value.map(RecordValue::Text),
                revision,
            )
        };

        let mut records = vec![
            OutputRecord::new(
                RecordKey::host_ip(name),
                fields.host_ip.map(RecordValue::Ip),
                revision,
            ),
            host_config(
                IPIP_TUNNEL_ADDR,
                fields.ipip_tunnel_addr.map(|ip| ip.to_string()),
            ),
            host_config(
                IPV4_VXLAN_TUNNEL_ADDR,
                fields.vxlan_tunnel_ipv4_addr.map(|ip| ip.to_string()),
            ),
            host_config(
                IPV6_VXLAN_TUNNEL_ADDR,
                fields.vxlan_tunnel_ipv6_addr.map(|ip| ip.to_string()),
            ),
            host_config(VXLAN_TUNNEL_MAC_V6_ADDR, fields.vxlan_tunnel_mac_v6_addr),
            host_config(VXLAN_TUNNEL_MAC_V4_ADDR, fields.vxlan_tunnel_mac_v4_addr),
            // Pass the original resource through as-is; an absent value stays
            // absent so consumers still see the delete.
            OutputRecord::new(
                RecordKey::Resource(event.key.clone()),
                event.value.clone().map(RecordValue::Resource),
                revision,
            ),
            OutputRecord::new(
                RecordKey::wireguard(name),
                fields.wireguard.map(RecordValue::Wireguard),
                revision,
            ),
        ];

        if self.options.use_pod_cidr {
            records.extend(self.block_records(name, pod_cidrs, revision, &mut failures));
        } else if pod_cidrs.is_none() && self.options.prune_on_delete && self.tracker.forget(name) {
            debug!("Stopped tracking CIDRs for deleted node {}", name);
        }

        for failure in &failures {
            debug!("Node {}: {}", name, failure);
        }

        Ok(Translation { records, failures })
    }

    fn on_syncer_starting(&self) {
        debug!("Sync starting called on node update processor");
    }
}
