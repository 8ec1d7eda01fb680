// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors
//
//! Implements the label imposition stage (FEC classification)

use tracing::{debug, error, trace};

use net::buffer::PacketBufferMut;
use net::headers::TryMpls;
use net::packet::{DoneReason, Packet};
use pipeline::NetworkFunction;

use tables::ftn::FtnReader;

/// The default TTL written into freshly imposed label entries.
///
/// A policy value, deliberately not copied from the IPv4 TTL.
pub const DEFAULT_LABEL_TTL: u8 = 64;

/// The stage that classifies unlabeled IPv4 traffic entering the MPLS domain
/// into a FEC and imposes the bound label.
///
/// This is the only place a label is ever created. A FEC miss is a no-op:
/// the frame falls through to ordinary IPv4 forwarding, it never gets an
/// invented label.
pub struct LabelImpose {
    name: String,
    ftn: FtnReader,
    label_ttl: u8,
}

impl LabelImpose {
    /// Creates a new [`LabelImpose`] stage reading the given FTN.
    ///
    /// `label_ttl` is the initial TTL of imposed label entries.
    #[must_use]
    pub fn new(name: &str, ftn: FtnReader, label_ttl: u8) -> Self {
        Self {
            name: name.to_owned(),
            ftn,
            label_ttl,
        }
    }

    fn impose<Buf: PacketBufferMut>(&self, packet: &mut Packet<Buf>) {
        let nfi = &self.name;

        /* only unlabeled IPv4 traffic entering at an ingress-border port is
        classified; everything else passes through untouched */
        if !packet.get_meta().is_ingress_border || packet.try_mpls().is_some() {
            return;
        }
        let Some(dst) = packet.ip_destination() else {
            return;
        };

        let Some(ftn) = self.ftn.enter() else {
            error!("{nfi}: FTN is not readable!");
            packet.done(DoneReason::InternalFailure);
            return;
        };
        match ftn.lookup(dst) {
            Some((prefix, label)) => {
                debug!("{nfi}: {dst} classified into FEC {prefix}, imposing label {label}");
                packet.headers_mut().push_label(label, self.label_ttl);
            }
            None => {
                trace!("{nfi}: no FEC for {dst}; leaving frame to IPv4 forwarding");
            }
        }
    }
}

impl<Buf: PacketBufferMut> NetworkFunction<Buf> for LabelImpose {
    fn process<'a, Input: Iterator<Item = Packet<Buf>> + 'a>(
        &'a mut self,
        input: Input,
    ) -> impl Iterator<Item = Packet<Buf>> + 'a {
        trace!("{}", self.name);
        input.map(move |mut packet| {
            if !packet.is_done() {
                self.impose(&mut packet);
            }
            packet
        })
    }
}
