// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors
//
//! Assembles the stages into a router and exposes the frame surface

use tracing::{debug, error, trace};

use net::buffer::PacketBufferMut;
use net::packet::{DoneReason, Packet, PacketDropStats, PortId};
use pipeline::{DynPipeline, NetworkFunction};
use tables::TableReaders;

use crate::egress::Egress;
use crate::impose::{DEFAULT_LABEL_TTL, LabelImpose};
use crate::ingress::Ingress;
use crate::ipforward::IpForwarder;
use crate::switch::LabelSwitch;

/// Per-router forwarding policy knobs.
#[derive(Debug, Clone, Copy)]
pub struct RouterSettings {
    /// Initial TTL written into imposed label entries.
    pub label_ttl: u8,
    /// Whether switching hops decrement the label TTL.
    pub decrement_label_ttl: bool,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            label_ttl: DEFAULT_LABEL_TTL,
            decrement_label_ttl: false,
        }
    }
}

/// The terminal state of one frame: forwarded out of a port, or dropped.
///
/// There are no retries; a table miss anywhere is final for that frame.
#[derive(Debug)]
pub enum Verdict<Buf: PacketBufferMut> {
    /// The frame leaves the router on the given port.
    Forwarded(PortId, Buf),
    /// The frame was dropped; the reason is tallied in the router's
    /// [`PacketDropStats`].
    Dropped,
}

/// One label-switching router: the five-stage pipeline plus the raw-frame
/// surface the surrounding transport talks to.
pub struct Router<Buf: PacketBufferMut> {
    name: String,
    pipeline: DynPipeline<Buf>,
    drop_stats: PacketDropStats,
}

impl<Buf: PacketBufferMut + 'static> Router<Buf> {
    /// Build a router over the given table readers.
    #[must_use]
    pub fn new(name: &str, readers: &TableReaders, settings: RouterSettings) -> Self {
        let pipeline = DynPipeline::new()
            .add_stage(Ingress::new(
                &format!("{name}-ingress"),
                readers.ports.clone(),
            ))
            .add_stage(LabelImpose::new(
                &format!("{name}-impose"),
                readers.ftn.clone(),
                settings.label_ttl,
            ))
            .add_stage(LabelSwitch::new(
                &format!("{name}-switch"),
                readers.nhlfe.clone(),
                settings.decrement_label_ttl,
            ))
            .add_stage(IpForwarder::new(
                &format!("{name}-ipforward"),
                readers.fib.clone(),
                readers.ports.clone(),
            ))
            .add_stage(Egress::new(
                &format!("{name}-egress"),
                readers.ports.clone(),
            ));
        Router {
            name: name.to_owned(),
            pipeline,
            drop_stats: PacketDropStats::new(&format!("Stats:router-{name}")),
        }
    }

    /// Get the name of this router.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The drop counters of this router.
    #[must_use]
    pub fn drop_stats(&self) -> &PacketDropStats {
        &self.drop_stats
    }

    /// Process one raw frame received on `iif`.
    ///
    /// The frame is parsed, pushed through the pipeline, and either
    /// serialized for the selected egress port or dropped. Processing is
    /// synchronous and independent of any other frame.
    pub fn process_frame(&mut self, iif: PortId, buf: Buf) -> Verdict<Buf> {
        let mut packet = match Packet::new(buf) {
            Ok(packet) => packet,
            Err(e) => {
                debug!("{}: unparsable frame: {e}", self.name);
                self.drop_stats.incr(DoneReason::Malformed, 1);
                return Verdict::Dropped;
            }
        };
        packet.get_meta_mut().iif = iif;

        let packet = {
            let mut output = self.pipeline.process(core::iter::once(packet));
            output.next()
        };
        let Some(packet) = packet else {
            // stages mark packets done rather than consuming them
            error!("{}: pipeline swallowed a frame", self.name);
            self.drop_stats.incr(DoneReason::InternalFailure, 1);
            return Verdict::Dropped;
        };

        match packet.get_done() {
            Some(DoneReason::Delivered) => {
                let Some(oif) = packet.get_meta().oif else {
                    error!("{}: delivered frame without egress port", self.name);
                    self.drop_stats.incr(DoneReason::InternalFailure, 1);
                    return Verdict::Dropped;
                };
                match packet.serialize() {
                    Ok(buf) => {
                        trace!("{}: frame forwarded on port {oif}", self.name);
                        Verdict::Forwarded(oif, buf)
                    }
                    Err(e) => {
                        error!("{}: failed to serialize frame: {e}", self.name);
                        self.drop_stats.incr(DoneReason::InternalFailure, 1);
                        Verdict::Dropped
                    }
                }
            }
            reason => {
                let reason = reason.unwrap_or(DoneReason::Unhandled);
                debug!("{}: frame dropped: {reason:?}", self.name);
                self.drop_stats.incr(reason, 1);
                Verdict::Dropped
            }
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // valid in test code
#[cfg(test)]
mod tests {
    use super::*;
    use net::buffer::TestBuffer;
    use net::checksum::Checksum;
    use net::eth::ethertype::EthType;
    use net::eth::mac::Mac;
    use net::headers::{TryEth, TryIpv4, TryMpls};
    use net::mpls::Label;
    use net::packet::test_utils::{addr_v4, build_test_ipv4_frame, build_test_labeled_frame};
    use tables::config::TablesConfig;
    use tables::{TableReaders, TableSet};
    use tracing_test::traced_test;

    const H1_MAC: Mac = Mac([0x2, 0, 0, 0, 0x00, 0x01]);
    const H2_MAC: Mac = Mac([0x2, 0, 0, 0, 0x44, 0x01]);
    const S1_P1: &str = "02:00:00:00:11:01";
    const S2_P1: &str = "02:00:00:00:22:01";
    const S3_P1: &str = "02:00:00:00:33:01";

    fn tables_from_yaml(yaml: &str) -> (TableSet, TableReaders) {
        let (mut tables, readers) = TableSet::new();
        TablesConfig::from_yaml(yaml)
            .unwrap()
            .apply(&mut tables)
            .unwrap();
        (tables, readers)
    }

    /// Ingress LER: port 1 is ingress-border, FTN binds 10.7.2.2/32 to
    /// label 2, NHLFE sends label 2 towards S2 on port 2.
    fn s1() -> (TableSet, Router<TestBuffer>) {
        let (tables, readers) = tables_from_yaml(&format!(
            r#"
ports:
  - {{ port: 1, mac: "{S1_P1}", ingress_border: true }}
  - {{ port: 2, mac: "02:00:00:00:11:02" }}
ftn:
  - {{ prefix: "10.7.2.2/32", label: 2 }}
nhlfe:
  - {{ label: 2, next_hop_mac: "{S2_P1}", port: 2 }}
routes:
  - {{ prefix: "0.0.0.0/0", next_hop_mac: "02:00:00:00:99:01", port: 2 }}
"#
        ));
        (tables, Router::new("S1", &readers, RouterSettings::default()))
    }

    /// Transit LSR: not border on either side.
    fn s2() -> (TableSet, Router<TestBuffer>) {
        let (tables, readers) = tables_from_yaml(&format!(
            r#"
ports:
  - {{ port: 1, mac: "{S2_P1}" }}
  - {{ port: 3, mac: "02:00:00:00:22:03" }}
nhlfe:
  - {{ label: 2, next_hop_mac: "{S3_P1}", port: 3 }}
"#
        ));
        (tables, Router::new("S2", &readers, RouterSettings::default()))
    }

    /// Egress LER: port 4 is egress-border, NHLFE hands label 2 to H2.
    fn s3() -> (TableSet, Router<TestBuffer>) {
        let (tables, readers) = tables_from_yaml(&format!(
            r#"
ports:
  - {{ port: 1, mac: "{S3_P1}" }}
  - {{ port: 4, mac: "02:00:00:00:33:04", egress_border: true }}
nhlfe:
  - {{ label: 2, next_hop_mac: "02:00:00:00:44:01", port: 4 }}
"#
        ));
        (tables, Router::new("S3", &readers, RouterSettings::default()))
    }

    fn frame_to(dst_ip: &str, ttl: u8) -> TestBuffer {
        let packet = build_test_ipv4_frame(
            H1_MAC,
            Mac::try_from(S1_P1).unwrap(),
            "10.1.1.1",
            dst_ip,
            ttl,
        );
        packet.serialize().unwrap()
    }

    fn reparse(buf: &TestBuffer) -> Packet<TestBuffer> {
        Packet::new(TestBuffer::from_raw_data(buf.as_ref())).unwrap()
    }

    #[test]
    fn scenario_ingress_ler_imposes_and_switches() {
        let (_tables, mut s1) = s1();
        let Verdict::Forwarded(port, out) = s1.process_frame(PortId::new(1), frame_to("10.7.2.2", 64))
        else {
            panic!("frame should have been forwarded")
        };
        assert_eq!(port, PortId::new(2));

        let packet = reparse(&out);
        assert_eq!(packet.try_eth().unwrap().ether_type(), EthType::MPLS);
        let mpls = packet.try_mpls().unwrap();
        assert_eq!(mpls.label(), Label::new(2).unwrap());
        assert!(mpls.bottom_of_stack());
        assert_eq!(
            packet.try_eth().unwrap().destination().inner(),
            Mac::try_from(S2_P1).unwrap()
        );
        // the IPv4 packet rides along untouched
        let ipv4 = packet.try_ipv4().unwrap();
        assert_eq!(ipv4.ttl(), 64);
        assert_eq!(ipv4.destination(), addr_v4("10.7.2.2"));
        assert_eq!(ipv4.source().inner(), addr_v4("10.1.1.1"));
    }

    #[test]
    fn scenario_transit_lsr_switches_unchanged() {
        let (_tables, mut s2) = s2();
        let input = build_test_labeled_frame(
            Mac::try_from("02:00:00:00:11:02").unwrap(),
            Mac::try_from(S2_P1).unwrap(),
            2,
            64,
            "10.7.2.2",
            64,
        )
        .serialize()
        .unwrap();

        let Verdict::Forwarded(port, out) = s2.process_frame(PortId::new(1), input) else {
            panic!("frame should have been forwarded")
        };
        assert_eq!(port, PortId::new(3));

        let packet = reparse(&out);
        let mpls = packet.try_mpls().unwrap();
        assert_eq!(mpls.label(), Label::new(2).unwrap());
        assert_eq!(mpls.ttl(), 64);
        assert_eq!(
            packet.try_eth().unwrap().destination().inner(),
            Mac::try_from(S3_P1).unwrap()
        );
        assert_eq!(packet.try_ipv4().unwrap().ttl(), 64);
    }

    #[test]
    fn scenario_egress_ler_strips() {
        let (_tables, mut s3) = s3();
        let input = build_test_labeled_frame(
            Mac::try_from("02:00:00:00:22:03").unwrap(),
            Mac::try_from(S3_P1).unwrap(),
            2,
            64,
            "10.7.2.2",
            64,
        )
        .serialize()
        .unwrap();

        let Verdict::Forwarded(port, out) = s3.process_frame(PortId::new(1), input) else {
            panic!("frame should have been forwarded")
        };
        assert_eq!(port, PortId::new(4));

        let packet = reparse(&out);
        assert!(packet.try_mpls().is_none());
        assert_eq!(packet.try_eth().unwrap().ether_type(), EthType::IPV4);
        let ipv4 = packet.try_ipv4().unwrap();
        assert_eq!(ipv4.ttl(), 63);
        assert!(ipv4.validate_checksum(&()).is_ok());
        assert_eq!(packet.try_eth().unwrap().destination().inner(), H2_MAC);
    }

    #[traced_test]
    #[test]
    fn scenario_unknown_label_is_dropped() {
        let (_tables, mut s2) = s2();
        let input = build_test_labeled_frame(
            Mac::try_from("02:00:00:00:11:02").unwrap(),
            Mac::try_from(S2_P1).unwrap(),
            99,
            64,
            "10.7.2.2",
            64,
        )
        .serialize()
        .unwrap();

        match s2.process_frame(PortId::new(1), input) {
            Verdict::Dropped => {}
            Verdict::Forwarded(port, _) => panic!("unexpected forward on port {port}"),
        }
        assert_eq!(s2.drop_stats().get_stat(DoneReason::LabelMiss), Some(1));
        assert!(logs_contain("no NHLFE entry"));
    }

    #[test]
    fn domain_transit_is_transparent_modulo_ttl_and_macs() {
        let (_t1, mut s1) = s1();
        let (_t2, mut s2) = s2();
        let (_t3, mut s3) = s3();

        let Verdict::Forwarded(p1, f1) = s1.process_frame(PortId::new(1), frame_to("10.7.2.2", 64))
        else {
            panic!("S1 should forward")
        };
        assert_eq!(p1, PortId::new(2));
        assert!(reparse(&f1).try_mpls().is_some());

        let Verdict::Forwarded(p2, f2) =
            s2.process_frame(PortId::new(1), TestBuffer::from_raw_data(f1.as_ref()))
        else {
            panic!("S2 should forward")
        };
        assert_eq!(p2, PortId::new(3));
        assert!(reparse(&f2).try_mpls().is_some());

        let Verdict::Forwarded(p3, f3) =
            s3.process_frame(PortId::new(1), TestBuffer::from_raw_data(f2.as_ref()))
        else {
            panic!("S3 should forward")
        };
        assert_eq!(p3, PortId::new(4));

        let packet = reparse(&f3);
        assert!(packet.try_mpls().is_none());
        let ipv4 = packet.try_ipv4().unwrap();
        // one TTL-decrementing hop (the strip); addresses untouched
        assert_eq!(ipv4.ttl(), 63);
        assert_eq!(ipv4.source().inner(), addr_v4("10.1.1.1"));
        assert_eq!(ipv4.destination(), addr_v4("10.7.2.2"));
        assert!(ipv4.validate_checksum(&()).is_ok());
        assert_eq!(packet.try_eth().unwrap().destination().inner(), H2_MAC);
    }

    #[test]
    fn fec_miss_falls_back_to_ipv4_forwarding() {
        let (_tables, mut s1) = s1();
        let Verdict::Forwarded(port, out) =
            s1.process_frame(PortId::new(1), frame_to("192.0.2.1", 64))
        else {
            panic!("frame should have been routed")
        };
        assert_eq!(port, PortId::new(2));

        let packet = reparse(&out);
        assert!(packet.try_mpls().is_none());
        assert_eq!(packet.try_eth().unwrap().ether_type(), EthType::IPV4);
        // MAC swap: sourced from the egress port, sent to the route next hop
        assert_eq!(
            packet.try_eth().unwrap().source().inner(),
            Mac::try_from("02:00:00:00:11:02").unwrap()
        );
        assert_eq!(
            packet.try_eth().unwrap().destination().inner(),
            Mac::try_from("02:00:00:00:99:01").unwrap()
        );
        assert_eq!(packet.try_ipv4().unwrap().ttl(), 63);
    }

    #[test]
    fn non_ip_non_mpls_frames_are_dropped() {
        use net::eth::Eth;
        use net::eth::mac::{DestinationMac, SourceMac};
        use net::headers::Headers;
        use net::parse::{DeParse, IntoNonZeroUSize};

        let (_tables, mut s1) = s1();
        let headers = Headers::new(Eth::new(
            SourceMac::new(H1_MAC).unwrap(),
            DestinationMac::new(Mac::try_from(S1_P1).unwrap()).unwrap(),
            EthType::ARP,
        ));
        let mut data = vec![0u8; headers.size().into_non_zero_usize().get()];
        headers.deparse(data.as_mut()).unwrap();

        match s1.process_frame(PortId::new(1), TestBuffer::from_raw_data(&data)) {
            Verdict::Dropped => {}
            Verdict::Forwarded(port, _) => panic!("unexpected forward on port {port}"),
        }
        assert_eq!(s1.drop_stats().get_stat(DoneReason::Unhandled), Some(1));
    }

    #[test]
    fn truncated_frames_are_dropped_as_malformed() {
        let (_tables, mut s1) = s1();
        match s1.process_frame(PortId::new(1), TestBuffer::from_raw_data(&[0xab; 7])) {
            Verdict::Dropped => {}
            Verdict::Forwarded(port, _) => panic!("unexpected forward on port {port}"),
        }
        assert_eq!(s1.drop_stats().get_stat(DoneReason::Malformed), Some(1));
    }

    #[test]
    fn table_updates_between_frames_take_effect() {
        let (mut tables, readers) = TableSet::new();
        TablesConfig::from_yaml(&format!(
            r#"
ports:
  - {{ port: 1, mac: "{S2_P1}" }}
  - {{ port: 3, mac: "02:00:00:00:22:03" }}
"#
        ))
        .unwrap()
        .apply(&mut tables)
        .unwrap();
        let mut router: Router<TestBuffer> =
            Router::new("S2", &readers, RouterSettings::default());

        let input = || {
            build_test_labeled_frame(
                Mac::try_from("02:00:00:00:11:02").unwrap(),
                Mac::try_from(S2_P1).unwrap(),
                2,
                64,
                "10.7.2.2",
                64,
            )
            .serialize()
            .unwrap()
        };

        // no NHLFE binding yet: strict drop
        match router.process_frame(PortId::new(1), input()) {
            Verdict::Dropped => {}
            Verdict::Forwarded(port, _) => panic!("unexpected forward on port {port}"),
        }

        // the control plane binds the label between processing instants
        tables.nhlfe.add_entry(
            Label::new(2).unwrap(),
            tables::nhlfe::NhlfeEntry::new(Mac::try_from(S3_P1).unwrap(), PortId::new(3)),
            true,
        );

        match router.process_frame(PortId::new(1), input()) {
            Verdict::Forwarded(port, _) => assert_eq!(port, PortId::new(3)),
            Verdict::Dropped => panic!("frame should have been forwarded"),
        }
        assert_eq!(router.drop_stats().get_stat(DoneReason::LabelMiss), Some(1));
    }
}
