// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors
//
//! Implements the ingress stage

use tracing::{error, trace, warn};

use net::buffer::PacketBufferMut;
use net::headers::{TryIpv4, TryMpls};
use net::packet::{DoneReason, Packet};
use pipeline::NetworkFunction;

use tables::portmap::PortMapReader;

/// The first stage of the pipeline: ingress-border classification plus the
/// defensive drops that keep later stages simple.
pub struct Ingress {
    name: String,
    ports: PortMapReader,
}

impl Ingress {
    /// Creates a new [`Ingress`] stage reading the given port map.
    #[must_use]
    pub fn new(name: &str, ports: PortMapReader) -> Self {
        Self {
            name: name.to_owned(),
            ports,
        }
    }

    /// Get the name of this stage.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn admit<Buf: PacketBufferMut>(&self, packet: &mut Packet<Buf>) {
        let nfi = &self.name;

        /* classify the arrival port: a port-map miss means "not a border
        port", never an error */
        if let Some(portmap) = self.ports.enter() {
            let iif = packet.get_meta().iif;
            let is_ingress_border = portmap.is_ingress_border(iif);
            trace!("{nfi}: frame from port {iif} (ingress-border: {is_ingress_border})");
            packet.get_meta_mut().is_ingress_border = is_ingress_border;
        } else {
            error!("{nfi}: port map is not readable!");
            packet.done(DoneReason::InternalFailure);
            return;
        }

        /* a label entry that is not bottom-of-stack means a deeper stack
        than this dataplane models: defensively drop */
        if let Some(mpls) = packet.try_mpls() {
            if !mpls.bottom_of_stack() {
                warn!("{nfi}: label entry with s=0 (stack too deep)");
                packet.done(DoneReason::LabelNotBottomOfStack);
            }
            return;
        }

        /* neither labeled nor IPv4: no stage has an action for this frame */
        if packet.try_ipv4().is_none() {
            trace!("{nfi}: frame is neither labeled nor IPv4");
            packet.done(DoneReason::Unhandled);
        }
    }
}

impl<Buf: PacketBufferMut> NetworkFunction<Buf> for Ingress {
    fn process<'a, Input: Iterator<Item = Packet<Buf>> + 'a>(
        &'a mut self,
        input: Input,
    ) -> impl Iterator<Item = Packet<Buf>> + 'a {
        trace!("{}", self.name);
        input.map(move |mut packet| {
            if !packet.is_done() {
                self.admit(&mut packet);
            }
            packet
        })
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)] // valid in test code
#[cfg(test)]
mod tests {
    use super::*;
    use net::eth::Eth;
    use net::eth::ethertype::EthType;
    use net::eth::mac::{DestinationMac, Mac, SourceMac};
    use net::headers::Headers;
    use net::mpls::{Exp, Label, Mpls};
    use net::packet::test_utils::{build_test_ipv4_packet, build_test_labeled_frame};
    use net::packet::PortId;
    use net::parse::{DeParse, IntoNonZeroUSize};
    use net::buffer::TestBuffer;
    use tables::portmap::{PortAttrs, PortMapWriter};

    // the writer must outlive the stage: readers see nothing once the
    // write handle is dropped
    fn stage_with_border_port(port: u32) -> (PortMapWriter, Ingress) {
        let (mut writer, reader) = PortMapWriter::new();
        writer.set_port(
            PortId::new(port),
            PortAttrs::new(
                SourceMac::new(Mac([0x2, 0, 0, 0, 0, 0x10])).unwrap(),
                true,
                false,
            ),
            true,
        );
        (writer, Ingress::new("test-ingress", reader))
    }

    #[test]
    fn border_flag_is_set_from_port_map() {
        let (_writer, mut stage) = stage_with_border_port(1);

        let mut packet = build_test_ipv4_packet(64);
        packet.get_meta_mut().iif = PortId::new(1);
        let out: Vec<_> = stage.process(std::iter::once(packet)).collect();
        assert!(out[0].get_meta().is_ingress_border);
        assert!(!out[0].is_done());

        let mut packet = build_test_ipv4_packet(64);
        packet.get_meta_mut().iif = PortId::new(7); // unconfigured: not border
        let out: Vec<_> = stage.process(std::iter::once(packet)).collect();
        assert!(!out[0].get_meta().is_ingress_border);
        assert!(!out[0].is_done());
    }

    #[test]
    fn labeled_frames_are_admitted() {
        let (_writer, mut stage) = stage_with_border_port(1);
        let packet = build_test_labeled_frame(
            Mac([0x2, 0, 0, 0, 0, 1]),
            Mac([0x2, 0, 0, 0, 0, 2]),
            2,
            64,
            "10.7.2.2",
            64,
        );
        let out: Vec<_> = stage.process(std::iter::once(packet)).collect();
        assert!(!out[0].is_done());
    }

    #[test]
    fn non_bottom_of_stack_is_dropped() {
        let mut headers = Headers::new(Eth::new(
            SourceMac::new(Mac([0x2, 0, 0, 0, 0, 1])).unwrap(),
            DestinationMac::new(Mac([0x2, 0, 0, 0, 0, 2])).unwrap(),
            EthType::MPLS,
        ));
        headers.mpls = Some(Mpls::new(Label::new(2).unwrap(), Exp::default(), false, 64));
        let mut data = vec![0u8; headers.size().into_non_zero_usize().get()];
        headers.deparse(data.as_mut()).unwrap();
        let packet = net::packet::Packet::new(TestBuffer::from_raw_data(&data)).unwrap();

        let (_writer, mut stage) = stage_with_border_port(1);
        let out: Vec<_> = stage.process(std::iter::once(packet)).collect();
        assert_eq!(
            out[0].get_done(),
            Some(DoneReason::LabelNotBottomOfStack)
        );
    }

    #[test]
    fn non_ip_non_mpls_is_dropped() {
        let headers = Headers::new(Eth::new(
            SourceMac::new(Mac([0x2, 0, 0, 0, 0, 1])).unwrap(),
            DestinationMac::new(Mac([0x2, 0, 0, 0, 0, 2])).unwrap(),
            EthType::ARP,
        ));
        let mut data = vec![0u8; headers.size().into_non_zero_usize().get()];
        headers.deparse(data.as_mut()).unwrap();
        let packet = net::packet::Packet::new(TestBuffer::from_raw_data(&data)).unwrap();

        let (_writer, mut stage) = stage_with_border_port(1);
        let out: Vec<_> = stage.process(std::iter::once(packet)).collect();
        assert_eq!(out[0].get_done(), Some(DoneReason::Unhandled));
    }
}
