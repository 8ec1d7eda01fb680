// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Ethernet type related fields and parsing

use etherparse::EtherType;

#[cfg(any(test, feature = "bolero"))]
#[allow(unused_imports)] // conditional re-export
pub use contract::*;

/// The ethernet header's ethertype field.
///
/// This is a transparent wrapper around the type provided by etherparse.
/// Wrapping lets us add the constants the dataplane dispatches on (etherparse
/// has no MPLS ethertype) and implement test generators for the type.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EthType(pub(crate) EtherType);

impl EthType {
    /// Ethernet type for [address resolution protocol](https://en.wikipedia.org/wiki/Address_Resolution_Protocol)
    pub const ARP: EthType = EthType(EtherType::ARP);
    /// Ethernet type for [IPv4](https://en.wikipedia.org/wiki/IPv4)
    pub const IPV4: EthType = EthType(EtherType::IPV4);
    /// Ethernet type for [IPv6](https://en.wikipedia.org/wiki/IPv6)
    pub const IPV6: EthType = EthType(EtherType::IPV6);
    /// Ethernet type for a unicast [MPLS](https://en.wikipedia.org/wiki/Multiprotocol_Label_Switching) label stack
    pub const MPLS: EthType = EthType(EtherType(0x8847));
    /// Ethernet type for a multicast MPLS label stack (parsed, never emitted here)
    pub const MPLS_MULTICAST: EthType = EthType(EtherType(0x8848));

    /// Map a raw (native-endian) u16 into an [`EthType`]
    #[must_use]
    pub const fn new(raw: u16) -> EthType {
        EthType(EtherType(raw))
    }

    /// Map a raw (big-endian) u16 into an [`EthType`]
    #[must_use]
    pub const fn new_from_be_bytes(raw: [u8; 2]) -> EthType {
        EthType(EtherType(u16::from_be_bytes(raw)))
    }

    /// get the raw `u16` value (native-endian)
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0.0
    }
}

#[cfg(any(test, feature = "bolero"))]
mod contract {
    use super::EthType;
    use bolero::{Driver, TypeGenerator};

    impl TypeGenerator for EthType {
        fn generate<D: Driver>(u: &mut D) -> Option<Self> {
            Some(EthType::new(u.produce()?))
        }
    }

    /// A [`TypeGenerator`] restricted to the ethertypes this dataplane acts on.
    #[derive(Copy, Clone, Debug, bolero::TypeGenerator)]
    pub enum CommonEthType {
        /// see [`EthType::IPV4`]
        Ipv4,
        /// see [`EthType::MPLS`]
        Mpls,
    }

    impl From<CommonEthType> for EthType {
        fn from(value: CommonEthType) -> Self {
            match value {
                CommonEthType::Ipv4 => EthType::IPV4,
                CommonEthType::Mpls => EthType::MPLS,
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::EthType;

    #[test]
    fn mpls_ethertype_value() {
        assert_eq!(EthType::MPLS.raw(), 0x8847);
        assert_eq!(EthType::MPLS, EthType::new_from_be_bytes([0x88, 0x47]));
    }
}
