// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Ethernet types

pub mod ethertype;
pub mod mac;

use crate::eth::ethertype::EthType;
use crate::eth::mac::{
    DestinationMac, DestinationMacAddressError, Mac, SourceMac, SourceMacAddressError,
};
use crate::headers::Header;
use crate::ipv4::Ipv4;
use crate::mpls::Mpls;
use crate::parse::{DeParse, DeParseError, LengthError, Parse, ParseError, ParsePayload, Reader};
use etherparse::{EtherType, Ethernet2Header};
use std::num::NonZero;
use tracing::{debug, trace};

#[allow(unused_imports)] // conditional re-export
#[cfg(any(test, feature = "bolero"))]
pub use contract::*;

/// An ethernet header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eth(Ethernet2Header);

/// An error which may occur in the event of an invalid ethernet header.
#[derive(Debug, thiserror::Error)]
pub enum EthError {
    /// Source [`Mac`] is invalid.
    #[error(transparent)]
    InvalidSource(SourceMacAddressError),
    /// Dest [`Mac`] is invalid.
    #[error(transparent)]
    InvalidDestination(DestinationMacAddressError),
}

impl Eth {
    /// The length (in bytes) of an [`Eth`] header
    #[allow(clippy::unwrap_used)] // trivially safe const eval
    pub const HEADER_LEN: NonZero<u16> = NonZero::new(14).unwrap();

    /// Create a new [`Eth`] header.
    #[must_use]
    pub fn new(source: SourceMac, destination: DestinationMac, ether_type: EthType) -> Eth {
        Eth(Ethernet2Header {
            source: source.inner().0,
            destination: destination.inner().0,
            ether_type: ether_type.0,
        })
    }

    /// Get the source [`Mac`] of the header.
    ///
    /// Parsing and construction both validate the source, so the refinement
    /// always holds.
    #[must_use]
    pub fn source(&self) -> SourceMac {
        SourceMac::new(Mac(self.0.source)).unwrap_or_else(|_| unreachable!())
    }

    /// Get the destination [`Mac`] of the header.
    #[must_use]
    pub fn destination(&self) -> DestinationMac {
        DestinationMac::new(Mac(self.0.destination)).unwrap_or_else(|_| unreachable!())
    }

    /// Get the ethertype of the header.
    #[must_use]
    pub fn ether_type(&self) -> EthType {
        EthType(self.0.ether_type)
    }

    /// Set the source [`Mac`] of the ethernet header.
    pub fn set_source(&mut self, source: SourceMac) -> &mut Eth {
        self.0.source = source.inner().0;
        self
    }

    /// Set the destination [`Mac`] of the ethernet header.
    pub fn set_destination(&mut self, destination: DestinationMac) -> &mut Eth {
        self.0.destination = destination.inner().0;
        self
    }

    /// Set the ethertype of the header.
    pub fn set_ether_type(&mut self, ether_type: EthType) -> &mut Eth {
        self.0.ether_type = ether_type.0;
        self
    }
}

impl Parse for Eth {
    type Error = EthError;

    fn parse(buf: &[u8]) -> Result<(Self, NonZero<u16>), ParseError<Self::Error>> {
        if buf.len() > u16::MAX as usize {
            return Err(ParseError::BufferTooLong(buf.len()));
        }
        let (inner, rest) = Ethernet2Header::from_slice(buf).map_err(|e| {
            let expected = NonZero::new(e.required_len).unwrap_or_else(|| unreachable!());
            ParseError::Length(LengthError {
                expected,
                actual: buf.len(),
            })
        })?;
        #[allow(clippy::cast_possible_truncation)] // buffer length bounded above
        let consumed =
            NonZero::new((buf.len() - rest.len()) as u16).ok_or_else(|| unreachable!())?;
        let new = Self(inner);
        // integrity check for the ethernet header
        Mac(new.0.source)
            .valid_src()
            .map_err(|e| ParseError::Invalid(EthError::InvalidSource(e)))?;
        Mac(new.0.destination)
            .valid_dst()
            .map_err(|e| ParseError::Invalid(EthError::InvalidDestination(e)))?;
        Ok((new, consumed))
    }
}

impl DeParse for Eth {
    type Error = ();

    fn size(&self) -> NonZero<u16> {
        #[allow(clippy::cast_possible_truncation)] // bounded header length
        NonZero::new(self.0.header_len() as u16).unwrap_or_else(|| unreachable!())
    }

    fn deparse(&self, buf: &mut [u8]) -> Result<NonZero<u16>, DeParseError<Self::Error>> {
        let len = buf.len();
        let unused = self.0.write_to_slice(buf).map_err(|e| {
            let expected = NonZero::new(e.required_len).unwrap_or_else(|| unreachable!());
            DeParseError::Length(LengthError {
                expected,
                actual: len,
            })
        })?;
        let consumed = NonZero::new((len - unused.len()) as u16).ok_or_else(|| unreachable!())?;
        Ok(consumed)
    }
}

pub(crate) fn parse_from_ethertype(ether_type: EtherType, cursor: &mut Reader) -> Option<EthNext> {
    match EthType(ether_type) {
        EthType::IPV4 => cursor
            .parse::<Ipv4>()
            .map_err(|e| {
                debug!("failed to parse ipv4: {e:?}");
            })
            .map(|(ipv4, _)| EthNext::Ipv4(ipv4))
            .ok(),
        EthType::MPLS | EthType::MPLS_MULTICAST => cursor
            .parse::<Mpls>()
            .map_err(|e| {
                debug!("failed to parse mpls label entry: {e:?}");
            })
            .map(|(mpls, _)| EthNext::Mpls(mpls))
            .ok(),
        other => {
            trace!("unsupported ether type: {:#06x}", other.raw());
            None
        }
    }
}

pub(crate) enum EthNext {
    Mpls(Mpls),
    Ipv4(Ipv4),
}

impl ParsePayload for Eth {
    type Next = EthNext;
    fn parse_payload(&self, cursor: &mut Reader) -> Option<EthNext> {
        parse_from_ethertype(self.0.ether_type, cursor)
    }
}

impl From<EthNext> for Header {
    fn from(value: EthNext) -> Self {
        match value {
            EthNext::Mpls(x) => Header::Mpls(x),
            EthNext::Ipv4(x) => Header::Ipv4(x),
        }
    }
}

#[cfg(any(test, feature = "bolero"))]
mod contract {
    use crate::eth::Eth;
    use crate::eth::ethertype::EthType;
    use crate::eth::mac::{DestinationMac, SourceMac};
    use bolero::{Driver, TypeGenerator, ValueGenerator};

    impl TypeGenerator for Eth {
        fn generate<D: Driver>(u: &mut D) -> Option<Self> {
            let source: SourceMac = u.produce()?;
            let destination: DestinationMac = u.produce()?;
            let ether_type: EthType = u.produce()?;
            Some(Eth::new(source, destination, ether_type))
        }
    }

    /// Generate an arbitrary [`Eth`] header with the specified [`EthType`]
    pub struct GenWithEthType(pub EthType);

    impl ValueGenerator for GenWithEthType {
        type Output = Eth;

        fn generate<D: Driver>(&self, u: &mut D) -> Option<Self::Output> {
            let source: SourceMac = u.produce()?;
            let destination: DestinationMac = u.produce()?;
            Some(Eth::new(source, destination, self.0))
        }
    }
}
