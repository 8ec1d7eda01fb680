// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Display of packets

use crate::buffer::PacketBufferMut;
use crate::eth::Eth;
use crate::headers::Headers;
use crate::ipv4::Ipv4;
use crate::mpls::Mpls;
use crate::packet::{Packet, PacketMeta};
use std::fmt::{Display, Formatter};

impl Display for Eth {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "  Eth : {} -> {} (0x{:04x})",
            self.source(),
            self.destination(),
            self.ether_type().raw(),
        )
    }
}

impl Display for Mpls {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "  MPLS: label: {} exp: {} s: {} ttl: {}",
            self.label(),
            self.exp().as_u8(),
            u8::from(self.bottom_of_stack()),
            self.ttl()
        )
    }
}

impl Display for Ipv4 {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "  IPv4: {} -> {} proto: {:?}",
            self.source(),
            self.destination(),
            self.protocol()
        )?;
        writeln!(
            f,
            "        header-length: {} total-length: {} identification: {} TTL: {}",
            self.header_len(),
            self.total_len(),
            self.identification(),
            self.ttl()
        )
    }
}

impl Display for Headers {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f)?;
        write!(f, "{}", self.eth)?;
        if let Some(mpls) = &self.mpls {
            write!(f, "{mpls}")?;
        }
        if let Some(net) = &self.net {
            write!(f, "{net}")?;
        }
        Ok(())
    }
}

impl Display for PacketMeta {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "  metadata:")?;
        writeln!(f, "    iif: {:?} oif: {:?}", self.iif, self.oif)?;
        writeln!(
            f,
            "    ingress-border: {} egress-border: {}",
            self.is_ingress_border, self.is_egress_border
        )?;
        writeln!(f, "    done: {:?}", self.done)
    }
}

impl<Buf: PacketBufferMut> Display for Packet<Buf> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "payload: {} octets (headers: {} octets)",
            self.payload_len(),
            self.header_len()
        )?;
        write!(f, "headers: {}", self.get_headers())?;
        write!(f, "{}", self.get_meta())?;
        Ok(())
    }
}
