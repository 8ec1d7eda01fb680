// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors
//
//! Implements the label switching stage

use tracing::{debug, error, trace, warn};

use net::buffer::PacketBufferMut;
use net::eth::mac::DestinationMac;
use net::headers::{TryMpls, TryMplsMut};
use net::packet::{DoneReason, Packet};
use pipeline::NetworkFunction;

use tables::nhlfe::NhlfeReader;

/// The stage that forwards labeled frames: exact NHLFE lookup on the top
/// (only) label, destination-MAC rewrite, egress-port selection.
///
/// There is no default route for labels: a lookup miss drops the frame.
/// The label value is passed through unchanged; whether the label TTL is
/// decremented at switching hops is a policy choice
/// (`decrement_label_ttl`), not a fixed contract.
pub struct LabelSwitch {
    name: String,
    nhlfe: NhlfeReader,
    decrement_label_ttl: bool,
}

impl LabelSwitch {
    /// Creates a new [`LabelSwitch`] stage reading the given NHLFE table.
    #[must_use]
    pub fn new(name: &str, nhlfe: NhlfeReader, decrement_label_ttl: bool) -> Self {
        Self {
            name: name.to_owned(),
            nhlfe,
            decrement_label_ttl,
        }
    }

    fn switch<Buf: PacketBufferMut>(&self, packet: &mut Packet<Buf>) {
        let nfi = &self.name;

        let Some(mpls) = packet.try_mpls() else {
            return;
        };
        let label = mpls.label();

        let entry = {
            let Some(nhlfe) = self.nhlfe.enter() else {
                error!("{nfi}: NHLFE table is not readable!");
                packet.done(DoneReason::InternalFailure);
                return;
            };
            let Some(entry) = nhlfe.get_entry(label) else {
                debug!("{nfi}: no NHLFE entry for label {label}, dropping");
                packet.done(DoneReason::LabelMiss);
                return;
            };
            *entry
        };
        debug!(
            "{nfi}: label {label} switches to {mac} via port {port}",
            mac = entry.next_hop_mac,
            port = entry.out_port
        );

        let Ok(dst_mac) = DestinationMac::new(entry.next_hop_mac) else {
            warn!(
                "{nfi}: can't use mac {mac} as destination!",
                mac = entry.next_hop_mac
            );
            packet.done(DoneReason::InvalidDstMac);
            return;
        };
        packet.set_eth_destination(dst_mac);
        packet.get_meta_mut().oif = Some(entry.out_port);

        if self.decrement_label_ttl {
            let expired = match packet.try_mpls_mut() {
                Some(mpls) => mpls.decrement_ttl().is_err() || mpls.ttl() == 0,
                None => false,
            };
            if expired {
                warn!("{nfi}: label TTL exceeded for label {label}");
                packet.done(DoneReason::HopLimitExceeded);
            }
        }
    }
}

impl<Buf: PacketBufferMut> NetworkFunction<Buf> for LabelSwitch {
    fn process<'a, Input: Iterator<Item = Packet<Buf>> + 'a>(
        &'a mut self,
        input: Input,
    ) -> impl Iterator<Item = Packet<Buf>> + 'a {
        trace!("{}", self.name);
        input.map(move |mut packet| {
            if !packet.is_done() {
                self.switch(&mut packet);
            }
            packet
        })
    }
}
