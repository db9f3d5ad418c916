use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Whether an address is globally routable and unicast, i.e. safe for the
/// server to fetch from on a user's behalf.
pub fn is_public_address(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => is_public_v4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_public_v4(v4),
            None => is_public_v6(v6),
        },
    }
}

fn is_public_v4(addr: Ipv4Addr) -> bool {
    let [a, b, c, _] = addr.octets();

    // Shared address space (RFC 6598).
    let shared = a == 100 && (b & 0b1100_0000) == 64;
    // IETF protocol assignments (RFC 6890).
    let protocol_assignment = a == 192 && b == 0 && c == 0;
    // Benchmarking (RFC 2544).
    let benchmarking = a == 198 && (b & 0xfe) == 18;
    let reserved = a >= 240;

    !(addr.is_unspecified()
        || addr.is_loopback()
        || addr.is_private()
        || addr.is_link_local()
        || addr.is_multicast()
        || addr.is_broadcast()
        || addr.is_documentation()
        || a == 0
        || shared
        || protocol_assignment
        || benchmarking
        || reserved)
}

fn is_public_v6(addr: Ipv6Addr) -> bool {
    let first = addr.segments()[0];

    let unique_local = (first & 0xfe00) == 0xfc00;
    let link_local = (first & 0xffc0) == 0xfe80;
    let documentation = first == 0x2001 && addr.segments()[1] == 0x0db8;

    !(addr.is_unspecified()
        || addr.is_loopback()
        || addr.is_multicast()
        || unique_local
        || link_local
        || documentation)
}
