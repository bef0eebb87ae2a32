//! Subnet arithmetic

use crate::error::DhcpConfigError;
use ipnet::Ipv4Net;
use std::net::Ipv4Addr;

/// First and last address of the `/prefix_len` network containing `ip`.
///
/// The first address is the network base (`192.168.1.50/24` gives
/// `192.168.1.0`), the last is the broadcast address.
pub fn subnet_range(ip: Ipv4Addr, prefix_len: u8) -> Result<(Ipv4Addr, Ipv4Addr), DhcpConfigError> {
    let net = Ipv4Net::new(ip, prefix_len).map_err(|_| DhcpConfigError::InvalidPrefix(prefix_len))?;
    Ok((net.network(), net.broadcast()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subnet_range_slash_24() {
        let (start, end) = subnet_range(Ipv4Addr::new(192, 168, 1, 50), 24).unwrap();
        assert_eq!(start, Ipv4Addr::new(192, 168, 1, 0));
        assert_eq!(end, Ipv4Addr::new(192, 168, 1, 255));
    }

    #[test]
    fn test_subnet_range_high_octet() {
        let (start, _) = subnet_range(Ipv4Addr::new(10, 0, 0, 200), 24).unwrap();
        assert_eq!(start, Ipv4Addr::new(10, 0, 0, 0));
    }

    #[test]
    fn test_subnet_range_rejects_bad_prefix() {
        assert!(matches!(
            subnet_range(Ipv4Addr::new(10, 0, 0, 1), 33),
            Err(DhcpConfigError::InvalidPrefix(33))
        ));
    }
}
