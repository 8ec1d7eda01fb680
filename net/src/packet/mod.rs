// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Packet struct and methods

mod display;
mod meta;

#[cfg(any(test, feature = "bolero"))]
pub use contract::*;

#[cfg(any(doc, test, feature = "test_buffer"))]
pub mod test_utils;

use crate::buffer::{Headroom, PacketBufferMut, Prepend, TrimFromStart};
use crate::eth::mac::{DestinationMac, SourceMac};
use crate::eth::{Eth, EthError};
use crate::headers::{Headers, TryEth, TryEthMut, TryIpv4, TryIpv4Mut, TryMpls, TryMplsMut};
use crate::ipv4::Ipv4;
use crate::mpls::Mpls;
use crate::parse::{DeParse, Parse, ParseError};

#[allow(unused_imports)] // re-export
pub use meta::*;
use std::net::Ipv4Addr;
use std::num::NonZero;

/// A parsed (see [`Parse`]) ethernet packet.
#[derive(Debug)]
pub struct Packet<Buf: PacketBufferMut> {
    headers: Headers,
    payload: Buf,
    /// packet metadata added by stages to drive other stages down the pipeline
    pub meta: PacketMeta,
}

/// Errors which may occur when failing to produce a [`Packet`]
#[derive(Debug, thiserror::Error)]
#[error("invalid packet: {error}")]
pub struct InvalidPacket<Buf: PacketBufferMut> {
    #[allow(unused)]
    mbuf: Buf,
    #[source]
    error: ParseError<EthError>,
}

impl<Buf: PacketBufferMut> Packet<Buf> {
    /// Map a buffer to a `Packet` if the buffer contains a valid ethernet frame.
    ///
    /// On success the buffer is trimmed to the start of the payload; the
    /// parsed headers live in the `Packet` until [`Packet::serialize`] writes
    /// them back.
    ///
    /// # Errors
    ///
    /// Returns an [`InvalidPacket`] error if the buffer does not parse as an
    /// ethernet frame.
    pub fn new(mut mbuf: Buf) -> Result<Packet<Buf>, InvalidPacket<Buf>> {
        let (headers, consumed) = match Headers::parse(mbuf.as_ref()) {
            Ok((headers, consumed)) => (headers, consumed),
            Err(error) => {
                return Err(InvalidPacket { mbuf, error });
            }
        };
        mbuf.trim_from_start(consumed.get())
            .unwrap_or_else(|e| unreachable!("{e:?}"));

        Ok(Packet {
            headers,
            payload: mbuf,
            meta: PacketMeta::default(),
        })
    }

    /// Get a reference to the payload of this packet
    pub fn payload(&self) -> &Buf {
        &self.payload
    }

    /// Get the length of the packet's payload
    ///
    /// # Note
    ///
    /// Manipulating the parsed headers _does not_ change the length returned
    /// by this method.
    #[allow(clippy::cast_possible_truncation)] // buffer length bounded by parse
    #[must_use]
    pub fn payload_len(&self) -> u16 {
        self.payload.as_ref().len() as u16
    }

    /// Get the length of the packet's current headers.
    ///
    /// # Note
    ///
    /// Manipulating the parsed headers _does_ change the length returned by
    /// this method.
    pub fn header_len(&self) -> NonZero<u16> {
        self.headers.size()
    }

    /// Get total packet length.
    #[must_use]
    pub fn total_len(&self) -> u16 {
        self.payload_len() + self.header_len().get()
    }

    /// Get a reference to the headers of this `Packet`
    pub fn get_headers(&self) -> &Headers {
        &self.headers
    }

    /// Get a mutable reference to the headers of this `Packet`
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Replace the Ethernet header.
    pub fn set_eth(&mut self, eth: Eth) {
        self.headers.eth = eth;
    }

    /// Set the source MAC of the frame.
    pub fn set_eth_source(&mut self, mac: SourceMac) {
        self.headers.eth.set_source(mac);
    }

    /// Set the destination MAC of the frame.
    pub fn set_eth_destination(&mut self, mac: DestinationMac) {
        self.headers.eth.set_destination(mac);
    }

    /// Get the IPv4 destination of the packet, if it has an IPv4 header.
    #[must_use]
    pub fn ip_destination(&self) -> Option<Ipv4Addr> {
        self.headers.net.as_ref().map(Ipv4::destination)
    }

    /// Update the network checksums based on the current headers.
    pub fn update_checksums(&mut self) -> &mut Self {
        self.headers.update_checksums();
        self
    }

    /// Update the packet's buffer based on any changes to the packet's
    /// [`Headers`], refreshing checksums first.
    ///
    /// # Errors
    ///
    /// Returns a [`Prepend::Error`] error if the packet does not have enough
    /// headroom to serialize.
    pub fn serialize(mut self) -> Result<Buf, <Buf as Prepend>::Error> {
        self.update_checksums();
        let needed = self.headers.size().get();
        let buf = self.payload.prepend(needed)?;
        self.headers
            .deparse(buf)
            .unwrap_or_else(|e| unreachable!("{e:?}"));
        Ok(self.payload)
    }
}

impl<Buf: PacketBufferMut> Packet<Buf> {
    /// Explicitly mark a packet as done, indicating the reason. Broadly, there are two kinds:
    ///  - the packet is to be dropped due to the indicated reason;
    ///  - the packet has been fully processed (`Delivered`), which prevents
    ///    later stages from processing it again.
    pub fn done(&mut self, reason: DoneReason) {
        if self.meta.done.is_none() {
            self.meta.done = Some(reason);
        }
    }

    /// Like [`Packet::done`] but overwrites any prior reason. Useful for a
    /// stage that is allowed, by design, to override the verdict of earlier
    /// stages.
    pub fn done_force(&mut self, reason: DoneReason) {
        self.meta.done = Some(reason);
    }

    /// Tell if a packet has been marked as done.
    pub fn is_done(&self) -> bool {
        self.meta.done.is_some()
    }

    /// Get the reason why a packet has been marked as done.
    pub fn get_done(&self) -> Option<DoneReason> {
        self.meta.done
    }

    /// Get an immutable reference to the metadata of this `Packet`
    pub fn get_meta(&self) -> &PacketMeta {
        &self.meta
    }

    /// Get a mutable reference to the metadata of this `Packet`
    pub fn get_meta_mut(&mut self) -> &mut PacketMeta {
        &mut self.meta
    }

    /// Wrap a packet in an `Option` depending on the metadata:
    /// if the [`Packet`] is to be dropped, returns `None`; else `Some`.
    pub fn enforce(self) -> Option<Self> {
        if self.meta.keep() {
            // keep packets even if they should be dropped; testing aid
            return Some(self);
        }
        match self.get_done() {
            Some(DoneReason::Delivered) | None => Some(self),
            Some(_) => None,
        }
    }
}

impl<Buf: PacketBufferMut> TryEth for Packet<Buf> {
    fn try_eth(&self) -> Option<&Eth> {
        self.headers.try_eth()
    }
}

impl<Buf: PacketBufferMut> TryEthMut for Packet<Buf> {
    fn try_eth_mut(&mut self) -> Option<&mut Eth> {
        self.headers.try_eth_mut()
    }
}

impl<Buf: PacketBufferMut> TryMpls for Packet<Buf> {
    fn try_mpls(&self) -> Option<&Mpls> {
        self.headers.try_mpls()
    }
}

impl<Buf: PacketBufferMut> TryMplsMut for Packet<Buf> {
    fn try_mpls_mut(&mut self) -> Option<&mut Mpls> {
        self.headers.try_mpls_mut()
    }
}

impl<Buf: PacketBufferMut> TryIpv4 for Packet<Buf> {
    fn try_ipv4(&self) -> Option<&Ipv4> {
        self.headers.try_ipv4()
    }
}

impl<Buf: PacketBufferMut> TryIpv4Mut for Packet<Buf> {
    fn try_ipv4_mut(&mut self) -> Option<&mut Ipv4> {
        self.headers.try_ipv4_mut()
    }
}

impl<Buf: PacketBufferMut> Headroom for Packet<Buf> {
    fn headroom(&self) -> u16 {
        self.payload.headroom()
    }
}

#[cfg(any(test, feature = "bolero"))]
/// The fuzz testing contract for the `Packet` type
pub mod contract {
    use crate::buffer::{GenerateTestBufferForHeaders, TestBuffer};
    use crate::headers::Headers;
    use crate::packet::Packet;
    use bolero::{Driver, TypeGenerator, ValueGenerator};

    impl TypeGenerator for Packet<TestBuffer> {
        fn generate<D: Driver>(driver: &mut D) -> Option<Self> {
            let headers: Headers = driver.produce()?;
            let test_buffer = GenerateTestBufferForHeaders::new(headers).generate(driver)?;
            Packet::new(test_buffer).ok()
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)] // valid in test code
#[cfg(test)]
mod test {
    use crate::buffer::TestBuffer;
    use crate::headers::TryIpv4;
    use crate::packet::{DoneReason, Packet};

    #[test]
    fn parse_then_serialize_is_identity() {
        bolero::check!()
            .with_type()
            .for_each(|packet: &Packet<TestBuffer>| {
                let original: Vec<u8> = {
                    let mut bytes = Vec::new();
                    let mut buf = vec![0u8; packet.header_len().get() as usize];
                    use crate::parse::DeParse;
                    packet.get_headers().deparse(&mut buf).unwrap();
                    bytes.extend_from_slice(&buf);
                    bytes.extend_from_slice(packet.payload().as_ref());
                    bytes
                };
                // checksum refresh on serialize may legitimately rewrite the
                // ipv4 checksum field; compare against a refreshed copy
                let mut packet = Packet::new(TestBuffer::from_raw_data(&original)).unwrap();
                packet.update_checksums();
                let refreshed: Vec<u8> = {
                    let mut bytes = vec![0u8; packet.header_len().get() as usize];
                    use crate::parse::DeParse;
                    packet.get_headers().deparse(&mut bytes).unwrap();
                    bytes.extend_from_slice(packet.payload().as_ref());
                    bytes
                };
                let serialized = packet.serialize().unwrap();
                assert_eq!(serialized.as_ref(), refreshed.as_slice());
            });
    }

    #[test]
    fn done_sticks_to_first_reason() {
        bolero::check!()
            .with_type()
            .for_each(|packet: &Packet<TestBuffer>| {
                if packet.try_ipv4().is_none() {
                    return;
                }
                let mut packet = Packet::new(TestBuffer::from_raw_data(&{
                    let mut bytes = vec![0u8; packet.header_len().get() as usize];
                    use crate::parse::DeParse;
                    packet.get_headers().deparse(&mut bytes).unwrap();
                    bytes
                }))
                .unwrap();
                packet.done(DoneReason::LabelMiss);
                packet.done(DoneReason::RouteFailure);
                assert_eq!(packet.get_done(), Some(DoneReason::LabelMiss));
                packet.done_force(DoneReason::RouteFailure);
                assert_eq!(packet.get_done(), Some(DoneReason::RouteFailure));
                assert!(packet.enforce().is_none());
            });
    }
}
