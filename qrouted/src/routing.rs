use std::fmt::{Display, Formatter};
use std::net::Ipv4Addr;
use std::str::FromStr;

use anyhow::{anyhow, Context};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use qroute::framework::RoutingSystem;

pub struct IPV4System {}
impl RoutingSystem for IPV4System {
    type NodeAddress = String;
    type PhysicalAddress = Ipv4Addr;
    type Prefix = Ipv4Prefix;
    type InterfaceId = String;
}

/// An IPv4 network in CIDR notation. Host bits are cleared on parse, so `10.0.1.7/24` is `10.0.1.0/24`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, SerializeDisplay, DeserializeFromStr)]
pub struct Ipv4Prefix {
    addr: Ipv4Addr,
    len: u8,
}

impl Ipv4Prefix {
    pub fn new(addr: Ipv4Addr, len: u8) -> anyhow::Result<Self> {
        if len > 32 {
            return Err(anyhow!("Prefix length {len} is longer than 32"));
        }
        let mask = u32::MAX.checked_shl(32 - len as u32).unwrap_or(0);
        Ok(Self {
            addr: Ipv4Addr::from(u32::from(addr) & mask),
            len,
        })
    }

    pub fn addr(&self) -> Ipv4Addr {
        self.addr
    }

    pub fn prefix_len(&self) -> u8 {
        self.len
    }
}

impl FromStr for Ipv4Prefix {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, len) = match s.split_once('/') {
            Some((addr, len)) => (
                addr,
                len.parse::<u8>()
                    .with_context(|| format!("Invalid prefix length in {s}"))?,
            ),
            None => (s, 32),
        };
        let addr = Ipv4Addr::from_str(addr).with_context(|| format!("Invalid address in {s}"))?;
        Self::new(addr, len)
    }
}

impl Display for Ipv4Prefix {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.addr, self.len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cidr_and_clears_host_bits() {
        let prefix: Ipv4Prefix = "10.0.1.7/24".parse().unwrap();
        assert_eq!(prefix.addr(), Ipv4Addr::new(10, 0, 1, 0));
        assert_eq!(prefix.prefix_len(), 24);
        assert_eq!(prefix.to_string(), "10.0.1.0/24");
    }

    #[test]
    fn bare_address_is_a_host_route() {
        let prefix: Ipv4Prefix = "192.168.5.9".parse().unwrap();
        assert_eq!(prefix.to_string(), "192.168.5.9/32");
    }

    #[test]
    fn default_route() {
        let prefix: Ipv4Prefix = "0.0.0.0/0".parse().unwrap();
        assert_eq!(prefix.prefix_len(), 0);
        assert_eq!(prefix.addr(), Ipv4Addr::UNSPECIFIED);
    }

    #[test]
    fn rejects_garbage() {
        assert!("10.0.0.0/33".parse::<Ipv4Prefix>().is_err());
        assert!("10.0.0/24".parse::<Ipv4Prefix>().is_err());
        assert!("10.0.0.0/abc".parse::<Ipv4Prefix>().is_err());
    }

    #[test]
    fn serialises_as_string() {
        let prefix: Ipv4Prefix = "10.1.0.0/16".parse().unwrap();
        assert_eq!(serde_json::to_string(&prefix).unwrap(), "\"10.1.0.0/16\"");
        let back: Ipv4Prefix = serde_json::from_str("\"10.1.0.0/16\"").unwrap();
        assert_eq!(back, prefix);
    }
}
