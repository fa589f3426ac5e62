//! Per-field extraction of node values.
//!
//! Every node field is parsed on its own and the outcome is reported as a
//! [`FieldResult`]: a parsed value, an unset field, or an invalid one.  Both
//! of the latter end up as deletes downstream; only invalid fields are
//! reported as errors.  Nothing in here touches shared state.

use std::fmt;
use std::net::IpAddr;

use base64::alphabet;
use base64::engine::{GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use ipnetwork::IpNetwork;
use log::{debug, warn};

use crate::error::FieldFailure;

/// Length in bytes of a decoded wireguard public key.
pub const WIREGUARD_KEY_LEN: usize = 32;

/// Standard alphabet with padding; non-zero trailing bits in the last symbol
/// are accepted.
const KEY_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

/// The node fields the processor extracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    BgpIpv4Address,
    BgpIpv6Address,
    IpIpTunnelAddr,
    VxlanTunnelIpv4Addr,
    VxlanTunnelIpv6Addr,
    VxlanTunnelMacV4Addr,
    VxlanTunnelMacV6Addr,
    WireguardInterfaceAddr,
    WireguardPublicKey,
    PodCidr,
}

impl Field {
    /// Name of the field as it appears on the node resource.
    pub fn name(self) -> &'static str {
        match self {
            Field::BgpIpv4Address => "IPv4Address",
            Field::BgpIpv6Address => "IPv6Address",
            Field::IpIpTunnelAddr => "IPv4IPIPTunnelAddr",
            Field::VxlanTunnelIpv4Addr => "IPv4VXLANTunnelAddr",
            Field::VxlanTunnelIpv6Addr => "IPv6VXLANTunnelAddr",
            Field::VxlanTunnelMacV4Addr => "VXLANTunnelMACV4Addr",
            Field::VxlanTunnelMacV6Addr => "VXLANTunnelMACV6Addr",
            Field::WireguardInterfaceAddr => "InterfaceIPv4Address",
            Field::WireguardPublicKey => "WireguardPublicKey",
            Field::PodCidr => "PodCIDR",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpFamily {
    V4,
    V6,
}

impl IpFamily {
    pub fn matches(self, ip: &IpAddr) -> bool {
        matches!(
            (self, ip),
            (IpFamily::V4, IpAddr::V4(_)) | (IpFamily::V6, IpAddr::V6(_))
        )
    }
}

/// Outcome of extracting a single field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldResult<T> {
    Parsed(T),
    /// The field is not set.
    Absent,
    /// The field is set but could not be parsed.
    Invalid(FieldFailure),
}

impl<T> FieldResult<T> {
    pub fn is_parsed(&self) -> bool {
        matches!(self, FieldResult::Parsed(_))
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, FieldResult::Absent)
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, FieldResult::Invalid(_))
    }

    /// The parsed value, treating absent and invalid alike.
    pub fn ok(self) -> Option<T> {
        match self {
            FieldResult::Parsed(v) => Some(v),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&FieldFailure> {
        match self {
            FieldResult::Invalid(f) => Some(f),
            _ => None,
        }
    }

    /// Like [`FieldResult::ok`], but moves any failure into `failures`.
    pub fn collect(self, failures: &mut Vec<FieldFailure>) -> Option<T> {
        match self {
            FieldResult::Parsed(v) => Some(v),
            FieldResult::Absent => None,
            FieldResult::Invalid(f) => {
                failures.push(f);
                None
            }
        }
    }
}

/// Parse an IP literal, or a CIDR reduced to its host address.
///
/// The network is returned alongside when the input was in CIDR notation.
pub fn parse_ip_or_cidr(raw: &str) -> Result<(IpAddr, Option<IpNetwork>), String> {
    if let Ok(ip) = raw.parse::<IpAddr>() {
        return Ok((ip, None));
    }
    if !raw.contains('/') {
        return Err("invalid IP address syntax".to_string());
    }
    raw.parse::<IpNetwork>()
        .map(|net| (net.ip(), Some(net)))
        .map_err(|e| e.to_string())
}

/// Parse a block CIDR, normalised to its network address.
pub fn parse_cidr(raw: &str) -> Result<IpNetwork, String> {
    if !raw.contains('/') {
        return Err("missing prefix length".to_string());
    }
    let net = raw.parse::<IpNetwork>().map_err(|e| e.to_string())?;
    IpNetwork::new(net.network(), net.prefix()).map_err(|e| e.to_string())
}

fn invalid<T>(field: Field, raw: &str, reason: impl Into<String>) -> FieldResult<T> {
    let failure = FieldFailure::new(field, raw, reason);
    warn!("Failed to parse {} {:?}: {}", field, raw, failure.reason);
    FieldResult::Invalid(failure)
}

/// Extract an address field: an IP literal or a CIDR reduced to its host.
pub fn extract_ip(field: Field, raw: &str) -> FieldResult<IpAddr> {
    if raw.is_empty() {
        return FieldResult::Absent;
    }
    match parse_ip_or_cidr(raw) {
        Ok((ip, Some(net))) => {
            debug!("Parsed {} {} (cidr {})", field, ip, net);
            FieldResult::Parsed(ip)
        }
        Ok((ip, None)) => {
            debug!("Parsed {} {}", field, ip);
            FieldResult::Parsed(ip)
        }
        Err(reason) => invalid(field, raw, reason),
    }
}

/// Extract an opaque identifier such as a VXLAN MAC.
///
/// The value is passed through untouched; only a blank value is rejected.
pub fn extract_identifier(field: Field, raw: &str) -> FieldResult<String> {
    if raw.is_empty() {
        return FieldResult::Absent;
    }
    if raw.trim().is_empty() {
        return invalid(field, raw, "value is blank");
    }
    debug!("Parsed {} {}", field, raw);
    FieldResult::Parsed(raw.to_string())
}

/// Extract a wireguard public key: standard base64 of exactly 32 bytes.
/// Trailing bits in the final symbol are ignored.
pub fn extract_public_key(field: Field, raw: &str) -> FieldResult<String> {
    if raw.is_empty() {
        return FieldResult::Absent;
    }
    match KEY_ENGINE.decode(raw) {
        Ok(key) if key.len() == WIREGUARD_KEY_LEN => {
            debug!("Parsed {} {}", field, raw);
            FieldResult::Parsed(raw.to_string())
        }
        Ok(key) => invalid(
            field,
            raw,
            format!(
                "key is {} bytes, expected {}",
                key.len(),
                WIREGUARD_KEY_LEN
            ),
        ),
        Err(e) => invalid(field, raw, e.to_string()),
    }
}

/// Extract an address block CIDR.
pub fn extract_cidr(field: Field, raw: &str) -> FieldResult<IpNetwork> {
    if raw.is_empty() {
        return FieldResult::Absent;
    }
    match parse_cidr(raw) {
        Ok(net) => FieldResult::Parsed(net),
        Err(reason) => invalid(field, raw, reason),
    }
}
