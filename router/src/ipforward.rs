// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors
//
//! Implements the IPv4 fallback forwarding stage

use tracing::{debug, error, trace, warn};

use net::buffer::PacketBufferMut;
use net::eth::mac::DestinationMac;
use net::headers::{TryIpv4Mut, TryMpls};
use net::packet::{DoneReason, Packet};
use pipeline::NetworkFunction;

use tables::fib::FibReader;
use tables::portmap::PortMapReader;

/// The stage that forwards plain IPv4 traffic: longest-prefix match in the
/// FIB, MAC swap, TTL decrement.
///
/// Applies to frames that carry an IPv4 header and no label entry, and for
/// which no earlier stage selected an egress port. This serves traffic that
/// never crosses the MPLS domain, including traffic whose destination
/// matched no FEC at the ingress border.
pub struct IpForwarder {
    name: String,
    fib: FibReader,
    ports: PortMapReader,
}

impl IpForwarder {
    /// Build a new IP forwarding stage using the indicated [`FibReader`].
    ///
    /// The port map supplies the MAC the outgoing frame is sourced from.
    #[must_use]
    pub fn new(name: &str, fib: FibReader, ports: PortMapReader) -> Self {
        Self {
            name: name.to_owned(),
            fib,
            ports,
        }
    }

    fn forward<Buf: PacketBufferMut>(&self, packet: &mut Packet<Buf>) {
        let nfi = &self.name;

        /* labeled frames belong to the switch stage; frames with an egress
        port already selected are past routing */
        if packet.try_mpls().is_some() || packet.get_meta().oif.is_some() {
            return;
        }
        let Some(dst) = packet.ip_destination() else {
            return;
        };

        let route = {
            let Some(fib) = self.fib.enter() else {
                error!("{nfi}: FIB is not readable!");
                packet.done(DoneReason::InternalFailure);
                return;
            };
            let Some((prefix, route)) = fib.lookup(dst) else {
                debug!("{nfi}: no route for {dst}, dropping");
                packet.done(DoneReason::RouteFailure);
                return;
            };
            debug!("{nfi}: packet to {dst} hit prefix {prefix}");
            route
        };

        /* decrement TTL before rewriting anything */
        let expired = match packet.try_ipv4_mut() {
            Some(ipv4) => ipv4.decrement_ttl().is_err() || ipv4.ttl() == 0,
            None => false,
        };
        if expired {
            warn!("{nfi}: TTL limit exceeded for packet to {dst}");
            packet.done(DoneReason::HopLimitExceeded);
            return;
        }

        /* MAC swap: the outgoing source is this router, not the original
        sender */
        let src_mac = {
            let Some(portmap) = self.ports.enter() else {
                error!("{nfi}: port map is not readable!");
                packet.done(DoneReason::InternalFailure);
                return;
            };
            let Some(attrs) = portmap.get_port(route.out_port) else {
                warn!("{nfi}: egress port {port} is not configured", port = route.out_port);
                packet.done(DoneReason::PortUnknown);
                return;
            };
            attrs.mac
        };
        let Ok(dst_mac) = DestinationMac::new(route.next_hop_mac) else {
            warn!(
                "{nfi}: can't use mac {mac} as destination!",
                mac = route.next_hop_mac
            );
            packet.done(DoneReason::InvalidDstMac);
            return;
        };
        packet.set_eth_source(src_mac);
        packet.set_eth_destination(dst_mac);
        packet.get_meta_mut().oif = Some(route.out_port);
    }
}

impl<Buf: PacketBufferMut> NetworkFunction<Buf> for IpForwarder {
    fn process<'a, Input: Iterator<Item = Packet<Buf>> + 'a>(
        &'a mut self,
        input: Input,
    ) -> impl Iterator<Item = Packet<Buf>> + 'a {
        trace!("{}", self.name);
        input.map(move |mut packet| {
            if !packet.is_done() {
                self.forward(&mut packet);
            }
            packet
        })
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)] // valid in test code
#[cfg(test)]
mod tests {
    use super::*;
    use net::eth::mac::{Mac, SourceMac};
    use net::headers::{TryEth, TryIpv4};
    use net::packet::PortId;
    use net::packet::test_utils::{build_test_ipv4_frame, build_test_labeled_frame};
    use std::str::FromStr;
    use tables::fib::{FibWriter, RouteEntry};
    use tables::portmap::{PortAttrs, PortMapWriter};

    const PORT_MAC: Mac = Mac([0x2, 0, 0, 0, 0x01, 0x05]);
    const NEXT_HOP: Mac = Mac([0x2, 0, 0, 0, 0xbb, 0x1]);

    fn stage() -> (FibWriter, PortMapWriter, IpForwarder) {
        let (mut fib_w, fib_r) = FibWriter::new();
        fib_w.add_route(
            lpm::Ipv4Prefix::from_str("10.0.0.0/8").unwrap(),
            RouteEntry::new(NEXT_HOP, PortId::new(5)),
            true,
        );
        let (mut ports_w, ports_r) = PortMapWriter::new();
        ports_w.set_port(
            PortId::new(5),
            PortAttrs::new(SourceMac::new(PORT_MAC).unwrap(), false, false),
            true,
        );
        (
            fib_w,
            ports_w,
            IpForwarder::new("test-ipforward", fib_r, ports_r),
        )
    }

    fn ipv4(dst: &str, ttl: u8) -> net::packet::Packet<net::buffer::TestBuffer> {
        build_test_ipv4_frame(
            Mac([0x2, 0, 0, 0, 0, 1]),
            Mac([0x2, 0, 0, 0, 0, 2]),
            "192.0.2.1",
            dst,
            ttl,
        )
    }

    #[test]
    fn hit_swaps_macs_and_decrements_ttl() {
        let (_fib, _ports, mut stage) = stage();
        let out: Vec<_> = stage.process(std::iter::once(ipv4("10.1.2.3", 64))).collect();
        let packet = &out[0];

        assert_eq!(packet.try_ipv4().unwrap().ttl(), 63);
        assert_eq!(packet.try_eth().unwrap().source().inner(), PORT_MAC);
        assert_eq!(packet.try_eth().unwrap().destination().inner(), NEXT_HOP);
        assert_eq!(packet.get_meta().oif, Some(PortId::new(5)));
        assert!(!packet.is_done());
    }

    #[test]
    fn miss_is_a_drop() {
        let (_fib, _ports, mut stage) = stage();
        let out: Vec<_> = stage.process(std::iter::once(ipv4("172.16.0.1", 64))).collect();
        assert_eq!(out[0].get_done(), Some(DoneReason::RouteFailure));
    }

    #[test]
    fn ttl_expiry_is_a_drop() {
        let (_fib, _ports, mut stage) = stage();
        for ttl in [0u8, 1] {
            let out: Vec<_> = stage.process(std::iter::once(ipv4("10.1.2.3", ttl))).collect();
            assert_eq!(out[0].get_done(), Some(DoneReason::HopLimitExceeded));
        }
    }

    #[test]
    fn labeled_traffic_is_ignored() {
        let (_fib, _ports, mut stage) = stage();
        let packet = build_test_labeled_frame(
            Mac([0x2, 0, 0, 0, 0, 1]),
            Mac([0x2, 0, 0, 0, 0, 2]),
            2,
            64,
            "10.1.2.3",
            64,
        );
        let out: Vec<_> = stage.process(std::iter::once(packet)).collect();
        assert!(!out[0].is_done());
        assert_eq!(out[0].get_meta().oif, None);
        assert_eq!(out[0].try_ipv4().unwrap().ttl(), 64);
    }

    #[test]
    fn unconfigured_egress_port_is_a_drop() {
        let (mut fib_w, fib_r) = FibWriter::new();
        fib_w.add_route(
            lpm::Ipv4Prefix::from_str("10.0.0.0/8").unwrap(),
            RouteEntry::new(NEXT_HOP, PortId::new(9)),
            true,
        );
        let (_ports_w, ports_r) = PortMapWriter::new();
        let mut stage = IpForwarder::new("test-ipforward", fib_r, ports_r);
        let out: Vec<_> = stage.process(std::iter::once(ipv4("10.1.2.3", 64))).collect();
        assert_eq!(out[0].get_done(), Some(DoneReason::PortUnknown));
        drop(fib_w);
    }
}
