//! Network-spec normalization and IP membership testing.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::SpfError;

/// A network specification: a bare IP address or a CIDR block, as
/// collected from `ip4:`/`ip6:` values and address expansion.
pub type NetworkSpec = String;

/// Test whether `candidate_ip` falls inside any of `specs`; the first
/// match wins, in spec order.
///
/// Specs without an explicit prefix length are normalized to host
/// networks: /32 for dotted-quad specs, /128 for colon-separated ones.
/// A spec that does not parse aborts the whole check with
/// [`SpfError::MalformedNetworkSpec`].
pub fn contains(candidate_ip: &str, specs: &[NetworkSpec]) -> Result<bool, SpfError> {
    let candidate: IpAddr = candidate_ip
        .parse()
        .map_err(|_| SpfError::InvalidIp(candidate_ip.to_string()))?;

    for spec in specs {
        let (network, prefix) = parse_spec(spec)?;
        if in_network(candidate, network, prefix) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Parse a network spec into (network address, prefix length), applying
/// the host-network defaults for bare addresses.
fn parse_spec(spec: &str) -> Result<(IpAddr, u8), SpfError> {
    let malformed = || SpfError::MalformedNetworkSpec(spec.to_string());

    let (addr_part, prefix_part) = match spec.split_once('/') {
        Some((addr, prefix)) => (addr, Some(prefix)),
        None => (spec, None),
    };

    let addr: IpAddr = addr_part.parse().map_err(|_| malformed())?;
    let max = if addr.is_ipv4() { 32 } else { 128 };
    let prefix = match prefix_part {
        Some(p) => p.parse::<u8>().map_err(|_| malformed())?,
        None => max,
    };
    if prefix > max {
        return Err(malformed());
    }
    Ok((addr, prefix))
}

/// Address-family dispatch. A family mismatch between candidate and
/// network is a non-match, not an error.
fn in_network(ip: IpAddr, network: IpAddr, prefix: u8) -> bool {
    match (ip, network) {
        (IpAddr::V4(ip), IpAddr::V4(net)) => ip4_in_network(ip, net, prefix),
        (IpAddr::V6(ip), IpAddr::V6(net)) => ip6_in_network(ip, net, prefix),
        _ => false,
    }
}

/// Check if an IPv4 address falls within a network/prefix.
/// prefix=0 matches all. prefix>32 matches none.
fn ip4_in_network(ip: Ipv4Addr, network: Ipv4Addr, prefix: u8) -> bool {
    if prefix == 0 {
        return true;
    }
    if prefix > 32 {
        return false;
    }
    let mask = !0u32 << (32 - prefix);
    (u32::from(ip) & mask) == (u32::from(network) & mask)
}

/// Check if an IPv6 address falls within a network/prefix.
/// prefix=0 matches all. prefix>128 matches none.
fn ip6_in_network(ip: Ipv6Addr, network: Ipv6Addr, prefix: u8) -> bool {
    if prefix == 0 {
        return true;
    }
    if prefix > 128 {
        return false;
    }
    let mask = !0u128 << (128 - prefix);
    (u128::from(ip) & mask) == (u128::from(network) & mask)
}
