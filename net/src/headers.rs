// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Definition of [`Headers`] and related methods and types.
//!
//! The header stack this dataplane understands is strictly ordered: an
//! Ethernet header, at most one MPLS label-stack entry, and an optional IPv4
//! header. The IPv4 header, when present, immediately follows either the
//! bottom-of-stack label entry or the Ethernet header.

use crate::eth::ethertype::EthType;
use crate::eth::{Eth, EthError};
use crate::ipv4::Ipv4;
use crate::mpls::{Exp, Label, Mpls};
use crate::parse::{
    DeParse, DeParseError, IllegalBufferLength, IntoNonZeroUSize, LengthError, Parse, ParseError,
    ParsePayload, Reader, Writer,
};
use std::num::NonZero;

#[cfg(any(test, feature = "bolero"))]
pub use contract::*;

/// The parsed headers of a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Headers {
    /// The (mandatory) ethernet header.
    pub eth: Eth,
    /// The label-stack entry, if the frame carries one.
    pub mpls: Option<Mpls>,
    /// The IPv4 header, if the frame carries one.
    pub net: Option<Ipv4>,
}

/// A single parsed header, used to drive the parse loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Header {
    /// An ethernet header
    Eth(Eth),
    /// A label-stack entry
    Mpls(Mpls),
    /// An IPv4 header
    Ipv4(Ipv4),
}

impl ParsePayload for Header {
    type Next = Header;

    fn parse_payload(&self, cursor: &mut Reader) -> Option<Header> {
        match self {
            Header::Eth(eth) => eth.parse_payload(cursor).map(Header::from),
            Header::Mpls(mpls) => mpls.parse_payload(cursor).map(Header::Ipv4),
            Header::Ipv4(_) => None,
        }
    }
}

impl Parse for Headers {
    type Error = EthError;

    fn parse(buf: &[u8]) -> Result<(Self, NonZero<u16>), ParseError<Self::Error>> {
        let mut cursor =
            Reader::new(buf).map_err(|IllegalBufferLength(len)| ParseError::BufferTooLong(len))?;
        let (eth, _) = cursor.parse::<Eth>()?;
        let mut this = Headers {
            eth: eth.clone(),
            mpls: None,
            net: None,
        };
        let mut prior = Header::Eth(eth);
        loop {
            let header = prior.parse_payload(&mut cursor);
            match prior {
                Header::Eth(eth) => this.eth = eth,
                Header::Mpls(mpls) => this.mpls = Some(mpls),
                Header::Ipv4(ip) => this.net = Some(ip),
            }
            match header {
                None => {
                    break;
                }
                Some(next) => {
                    prior = next;
                }
            }
        }
        #[allow(clippy::cast_possible_truncation)] // bounded on cursor creation
        let consumed = NonZero::new(cursor.inner.len() as u16 - cursor.remaining)
            .ok_or_else(|| unreachable!())?;
        Ok((this, consumed))
    }
}

impl DeParse for Headers {
    type Error = ();

    fn size(&self) -> NonZero<u16> {
        let eth = self.eth.size().get();
        let mpls = self.mpls.as_ref().map_or(0, |m| m.size().get());
        let net = self.net.as_ref().map_or(0, |n| n.size().get());
        NonZero::new(eth + mpls + net).unwrap_or_else(|| unreachable!())
    }

    fn deparse(&self, buf: &mut [u8]) -> Result<NonZero<u16>, DeParseError<Self::Error>> {
        let len = buf.len();
        if len < self.size().into_non_zero_usize().get() {
            return Err(DeParseError::Length(LengthError {
                expected: self.size().into_non_zero_usize(),
                actual: len,
            }));
        }
        let mut cursor = Writer::new(buf)
            .map_err(|IllegalBufferLength(len)| DeParseError::BufferTooLong(len))?;
        cursor.write(&self.eth)?;
        if let Some(ref mpls) = self.mpls {
            cursor.write(mpls)?;
        }
        if let Some(ref net) = self.net {
            cursor.write(net)?;
        }
        #[allow(clippy::cast_possible_truncation)] // bounded on cursor creation
        Ok(
            NonZero::new(cursor.inner.len() as u16 - cursor.remaining)
                .unwrap_or_else(|| unreachable!()),
        )
    }
}

impl Headers {
    /// Create a new [`Headers`] with the supplied [`Eth`] header.
    #[must_use]
    pub fn new(eth: Eth) -> Headers {
        Headers {
            eth,
            mpls: None,
            net: None,
        }
    }

    /// Impose a label-stack entry on this header stack.
    ///
    /// The entry is created bottom-of-stack with `exp = 0` and the supplied
    /// TTL, and the ethernet header's ethertype is switched to
    /// [`EthType::MPLS`]. Returns the previous entry, if any (the
    /// single-level invariant means callers normally check for `None`
    /// before pushing).
    pub fn push_label(&mut self, label: Label, ttl: u8) -> Option<Mpls> {
        self.eth.set_ether_type(EthType::MPLS);
        self.mpls.replace(Mpls::new(label, Exp::default(), true, ttl))
    }

    /// Remove the label-stack entry from this header stack.
    ///
    /// Returns [`None`] (and leaves the stack unmodified) if no entry is
    /// present. Otherwise the popped entry is returned and the ethernet
    /// header's ethertype is restored to [`EthType::IPV4`]: in this
    /// single-level design the payload under a bottom-of-stack entry is
    /// always IPv4.
    pub fn pop_label(&mut self) -> Option<Mpls> {
        match self.mpls.take() {
            None => None,
            Some(mpls) => {
                self.eth.set_ether_type(EthType::IPV4);
                Some(mpls)
            }
        }
    }
}

// Eth traits

/// Access the [`Eth`] header of a frame, if any.
pub trait TryEth {
    /// Get the ethernet header, if present.
    fn try_eth(&self) -> Option<&Eth>;
}

/// Mutably access the [`Eth`] header of a frame, if any.
pub trait TryEthMut {
    /// Get the ethernet header mutably, if present.
    fn try_eth_mut(&mut self) -> Option<&mut Eth>;
}

impl TryEth for Headers {
    fn try_eth(&self) -> Option<&Eth> {
        Some(&self.eth)
    }
}

impl TryEthMut for Headers {
    fn try_eth_mut(&mut self) -> Option<&mut Eth> {
        Some(&mut self.eth)
    }
}

// Mpls traits

/// Access the label-stack entry of a frame, if any.
pub trait TryMpls {
    /// Get the label-stack entry, if present.
    fn try_mpls(&self) -> Option<&Mpls>;
}

/// Mutably access the label-stack entry of a frame, if any.
pub trait TryMplsMut {
    /// Get the label-stack entry mutably, if present.
    fn try_mpls_mut(&mut self) -> Option<&mut Mpls>;
}

impl TryMpls for Headers {
    fn try_mpls(&self) -> Option<&Mpls> {
        self.mpls.as_ref()
    }
}

impl TryMplsMut for Headers {
    fn try_mpls_mut(&mut self) -> Option<&mut Mpls> {
        self.mpls.as_mut()
    }
}

// Ipv4 traits

/// Access the [`Ipv4`] header of a frame, if any.
pub trait TryIpv4 {
    /// Get the IPv4 header, if present.
    fn try_ipv4(&self) -> Option<&Ipv4>;
}

/// Mutably access the [`Ipv4`] header of a frame, if any.
pub trait TryIpv4Mut {
    /// Get the IPv4 header mutably, if present.
    fn try_ipv4_mut(&mut self) -> Option<&mut Ipv4>;
}

impl TryIpv4 for Headers {
    fn try_ipv4(&self) -> Option<&Ipv4> {
        self.net.as_ref()
    }
}

impl TryIpv4Mut for Headers {
    fn try_ipv4_mut(&mut self) -> Option<&mut Ipv4> {
        self.net.as_mut()
    }
}

impl Headers {
    /// Refresh the checksums of any headers which carry one.
    pub(crate) fn update_checksums(&mut self) {
        use crate::checksum::Checksum;
        if let Some(ref mut ipv4) = self.net {
            ipv4.update_checksum(&());
        }
    }
}

#[cfg(any(test, feature = "bolero"))]
mod contract {
    use crate::eth::ethertype::EthType;
    use crate::eth::GenWithEthType;
    use crate::headers::Headers;
    use crate::mpls::GenWithBottomOfStack;
    use bolero::{Driver, TypeGenerator, ValueGenerator};

    /// Generate [`Headers`] with consistent ordering and ethertypes: either a
    /// plain IPv4 frame or a labeled (bottom-of-stack) IPv4 frame.
    pub struct CommonHeaders;

    impl ValueGenerator for CommonHeaders {
        type Output = Headers;

        fn generate<D: Driver>(&self, driver: &mut D) -> Option<Self::Output> {
            let labeled: bool = driver.produce()?;
            let ether_type = if labeled { EthType::MPLS } else { EthType::IPV4 };
            let mut headers = Headers::new(GenWithEthType(ether_type).generate(driver)?);
            if labeled {
                headers.mpls = Some(GenWithBottomOfStack(true).generate(driver)?);
            }
            headers.net = Some(driver.produce()?);
            Some(headers)
        }
    }

    impl TypeGenerator for Headers {
        fn generate<D: Driver>(driver: &mut D) -> Option<Self> {
            CommonHeaders.generate(driver)
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)] // valid in test code
#[cfg(test)]
mod test {
    use crate::eth::ethertype::EthType;
    use crate::headers::Headers;
    use crate::mpls::Label;
    use crate::parse::{DeParse, IntoNonZeroUSize, Parse};

    #[test]
    fn parse_back() {
        bolero::check!().with_type().for_each(|headers: &Headers| {
            let mut buf = vec![0u8; headers.size().into_non_zero_usize().get()];
            let written = headers.deparse(buf.as_mut_slice()).unwrap();
            assert_eq!(written, headers.size());
            let (parsed, consumed) = Headers::parse(buf.as_slice()).unwrap();
            assert_eq!(&parsed, headers);
            assert_eq!(consumed, written);
        });
    }

    #[test]
    fn push_then_pop_label_is_identity() {
        bolero::check!()
            .with_type()
            .for_each(|(headers, label, ttl): &(Headers, Label, u8)| {
                let mut headers = headers.clone();
                if headers.mpls.is_some() {
                    return; // single-level stack: never push over an entry
                }
                let before = headers.clone();
                headers.push_label(*label, *ttl);
                assert_eq!(headers.eth.ether_type(), EthType::MPLS);
                let popped = headers.pop_label().unwrap();
                assert_eq!(popped.label(), *label);
                assert_eq!(popped.ttl(), *ttl);
                assert!(popped.bottom_of_stack());
                assert_eq!(headers.eth.ether_type(), EthType::IPV4);
                assert_eq!(headers.mpls, before.mpls);
                assert_eq!(headers.net, before.net);
            });
    }

    #[test]
    fn pop_label_on_unlabeled_is_noop() {
        bolero::check!().with_type().for_each(|headers: &Headers| {
            let mut headers = headers.clone();
            headers.mpls = None;
            headers.eth.set_ether_type(EthType::IPV4);
            let before = headers.clone();
            assert!(headers.pop_label().is_none());
            assert_eq!(headers, before);
        });
    }
}
