// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Builders for the frames used across this workspace's tests.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

pub use crate::buffer::TestBuffer;
use crate::eth::Eth;
use crate::eth::ethertype::EthType;
use crate::eth::mac::{DestinationMac, Mac, SourceMac};
use crate::headers::Headers;
use crate::ipv4::Ipv4;
use crate::ipv4::addr::UnicastIpv4Addr;
use crate::mpls::{Exp, Label, Mpls};
use crate::packet::Packet;
use crate::parse::{DeParse, IntoNonZeroUSize};
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Build an Ipv4 address from a `&str`.
#[must_use]
pub fn addr_v4(a: &str) -> Ipv4Addr {
    Ipv4Addr::from_str(a).expect("Bad IPv4 address")
}

fn buffer_for(headers: &Headers) -> TestBuffer {
    let mut data = vec![0u8; headers.size().into_non_zero_usize().get()];
    headers.deparse(data.as_mut()).unwrap();
    TestBuffer::from_raw_data(&data)
}

/// Builds an IPv4/Eth test frame with the given addressing and TTL.
#[must_use]
pub fn build_test_ipv4_frame(
    src_mac: Mac,
    dst_mac: Mac,
    src_ip: &str,
    dst_ip: &str,
    ttl: u8,
) -> Packet<TestBuffer> {
    let mut ipv4 = Ipv4::default();
    ipv4.set_source(UnicastIpv4Addr::new(addr_v4(src_ip)).expect("Bad unicast IPv4"));
    ipv4.set_destination(addr_v4(dst_ip));
    ipv4.set_ttl(ttl);

    let mut headers = Headers::new(Eth::new(
        SourceMac::new(src_mac).unwrap(),
        DestinationMac::new(dst_mac).unwrap(),
        EthType::IPV4,
    ));
    headers.net = Some(ipv4);

    Packet::new(buffer_for(&headers)).unwrap()
}

/// Builds a test packet with the given TTL value.
///
/// The packet is an IPv4 packet with source and destination IP address
/// 1.2.3.4. The Ethernet source and destination MAC addresses are
/// 02:00:00:00:00:01 and 02:00:00:00:00:02 respectively.
#[must_use]
pub fn build_test_ipv4_packet(ttl: u8) -> Packet<TestBuffer> {
    build_test_ipv4_frame(
        Mac([0x2, 0, 0, 0, 0, 1]),
        Mac([0x2, 0, 0, 0, 0, 2]),
        "1.2.3.4",
        "1.2.3.4",
        ttl,
    )
}

/// Builds a labeled (MPLS/Eth) test frame carrying an IPv4 packet.
///
/// The label entry is bottom-of-stack with `exp = 0`.
#[must_use]
pub fn build_test_labeled_frame(
    src_mac: Mac,
    dst_mac: Mac,
    label: u32,
    label_ttl: u8,
    dst_ip: &str,
    ip_ttl: u8,
) -> Packet<TestBuffer> {
    let mut ipv4 = Ipv4::default();
    ipv4.set_source(UnicastIpv4Addr::new(addr_v4("10.0.0.1")).unwrap());
    ipv4.set_destination(addr_v4(dst_ip));
    ipv4.set_ttl(ip_ttl);

    let mut headers = Headers::new(Eth::new(
        SourceMac::new(src_mac).unwrap(),
        DestinationMac::new(dst_mac).unwrap(),
        EthType::MPLS,
    ));
    headers.mpls = Some(Mpls::new(
        Label::new(label).expect("Bad label"),
        Exp::default(),
        true,
        label_ttl,
    ));
    headers.net = Some(ipv4);

    Packet::new(buffer_for(&headers)).unwrap()
}
