// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors
//
//! Implements the egress stage

use tracing::{debug, error, trace, warn};

use net::buffer::PacketBufferMut;
use net::headers::{TryIpv4, TryIpv4Mut, TryMpls};
use net::packet::{DoneReason, Packet};
use pipeline::NetworkFunction;

use tables::portmap::PortMapReader;

/// The last stage of the pipeline: egress-border classification and label
/// disposition.
///
/// Egress-border classification necessarily happens here, late: the real
/// egress port is only known once a forwarding stage has chosen it. When the
/// chosen port is egress-border and the frame still carries a label entry,
/// the entry is removed, the ethertype restored to IPv4 and the IPv4 TTL
/// decremented, so the frame leaves the domain exactly as an unlabeled
/// router chain would have emitted it (modulo the TTL spent inside).
pub struct Egress {
    name: String,
    ports: PortMapReader,
}

impl Egress {
    /// Creates a new [`Egress`] stage reading the given port map.
    #[must_use]
    pub fn new(name: &str, ports: PortMapReader) -> Self {
        Self {
            name: name.to_owned(),
            ports,
        }
    }

    fn emit<Buf: PacketBufferMut>(&self, packet: &mut Packet<Buf>) {
        let nfi = &self.name;

        let Some(oif) = packet.get_meta().oif else {
            warn!("{nfi}: missing oif metadata!");
            packet.done(DoneReason::RouteFailure);
            return;
        };

        let egress_border = {
            let Some(portmap) = self.ports.enter() else {
                error!("{nfi}: port map is not readable!");
                packet.done(DoneReason::InternalFailure);
                return;
            };
            let Some(attrs) = portmap.get_port(oif) else {
                warn!("{nfi}: unknown egress port {oif}");
                packet.done(DoneReason::PortUnknown);
                return;
            };
            attrs.egress_border
        };
        packet.get_meta_mut().is_egress_border = egress_border;

        if egress_border && packet.try_mpls().is_some() {
            /* the frame leaves the MPLS domain here: strip the label entry
            and spend one hop of IPv4 TTL */
            if packet.try_ipv4().is_none() {
                warn!("{nfi}: labeled frame without IPv4 payload cannot leave the domain");
                packet.done(DoneReason::Malformed);
                return;
            }
            let popped = packet.headers_mut().pop_label();
            debug!(
                "{nfi}: stripped label {label} at egress border port {oif}",
                label = popped.map_or(0, |m| m.label().as_u32())
            );
            let expired = match packet.try_ipv4_mut() {
                Some(ipv4) => ipv4.decrement_ttl().is_err() || ipv4.ttl() == 0,
                None => false,
            };
            if expired {
                warn!("{nfi}: TTL limit exceeded while leaving the domain");
                packet.done(DoneReason::HopLimitExceeded);
                return;
            }
        }

        trace!("{nfi}: frame ready for port {oif}");
        packet.done(DoneReason::Delivered);
    }
}

impl<Buf: PacketBufferMut> NetworkFunction<Buf> for Egress {
    fn process<'a, Input: Iterator<Item = Packet<Buf>> + 'a>(
        &'a mut self,
        input: Input,
    ) -> impl Iterator<Item = Packet<Buf>> + 'a {
        trace!("{}", self.name);
        input.map(move |mut packet| {
            if !packet.is_done() {
                self.emit(&mut packet);
            }
            packet
        })
    }
}
