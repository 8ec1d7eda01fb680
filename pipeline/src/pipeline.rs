// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use crate::{DynNetworkFunction, NetworkFunction, nf_dyn};
use dyn_iter::{DynIter, IntoDynIterator};
use net::buffer::PacketBufferMut;
use net::packet::Packet;

/// A pipeline assembled at runtime from boxed network functions.
///
/// Stages run in insertion order. The pipeline itself implements both
/// [`NetworkFunction`] and [`DynNetworkFunction`], so pipelines nest.
#[derive(Default)]
pub struct DynPipeline<Buf: PacketBufferMut> {
    nfs: Vec<Box<dyn DynNetworkFunction<Buf>>>,
}

impl<Buf: PacketBufferMut> DynPipeline<Buf> {
    /// Create an empty [`DynPipeline`].
    #[must_use]
    pub fn new() -> Self {
        Self { nfs: Vec::new() }
    }

    /// Add a network function to the end of the pipeline.
    #[must_use]
    pub fn add_stage<NF: NetworkFunction<Buf> + 'static>(self, nf: NF) -> Self {
        self.add_stage_dyn(nf_dyn(nf))
    }

    /// Add a boxed, dynamic network function to the end of the pipeline.
    ///
    /// # See Also
    ///
    /// [`DynNetworkFunction`]
    /// [`nf_dyn`]
    #[must_use]
    pub fn add_stage_dyn(mut self, nf: Box<dyn DynNetworkFunction<Buf>>) -> Self {
        self.nfs.push(nf);
        self
    }

    /// The number of stages in the pipeline.
    #[must_use]
    pub fn num_stages(&self) -> usize {
        self.nfs.len()
    }
}

impl<Buf: PacketBufferMut> DynNetworkFunction<Buf> for DynPipeline<Buf> {
    fn process_dyn<'a>(&'a mut self, input: DynIter<'a, Packet<Buf>>) -> DynIter<'a, Packet<Buf>> {
        self.nfs
            .iter_mut()
            .fold(input, move |input, nf| nf.process_dyn(input))
            .into_dyn_iter()
    }
}

impl<Buf: PacketBufferMut> NetworkFunction<Buf> for DynPipeline<Buf> {
    fn process<'a, Input: Iterator<Item = Packet<Buf>> + 'a>(
        &'a mut self,
        input: Input,
    ) -> impl Iterator<Item = Packet<Buf>> {
        self.process_dyn(input.into_dyn_iter())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#[cfg(test)]
mod test {
    use dyn_iter::IntoDynIterator;
    use net::eth::mac::{DestinationMac, Mac};
    use net::headers::{TryEth, TryIpv4};

    use crate::sample_nfs::{BroadcastMacs, DecrementTtl};
    use crate::{DynNetworkFunction, DynPipeline, NetworkFunction, nf_dyn};
    use net::packet::test_utils::build_test_ipv4_packet;

    #[test]
    fn long_dyn_pipeline() {
        const MAX_TTL: u8 = u8::MAX;

        let mut pipeline = DynPipeline::new();
        let num_stages = 200;

        for _ in 0..num_stages {
            pipeline = pipeline.add_stage_dyn(nf_dyn(DecrementTtl));
        }
        pipeline = pipeline.add_stage(BroadcastMacs);
        assert_eq!(pipeline.num_stages(), num_stages + 1);

        let packets = vec![build_test_ipv4_packet(u8::MAX)].into_iter();
        let packets_out: Vec<_> = pipeline.process(packets).collect();

        assert_eq!(packets_out.len(), 1);

        let p0_out = &packets_out[0];
        assert_eq!(
            DestinationMac::new(Mac::BROADCAST).unwrap(),
            p0_out.try_eth().unwrap().destination()
        );
        assert_eq!(
            (MAX_TTL as usize) - num_stages,
            p0_out.try_ipv4().unwrap().ttl() as usize
        );
    }

    // Allow clippy::similar_names for packet[12] and packets, cannot allow per line
    #[allow(clippy::similar_names)]
    #[test]
    fn process_dyn() {
        let mut pipeline = DynPipeline::new();
        let num_stages = 10;
        let p1_ttl = 20;
        let p2_ttl = 30;

        for _ in 0..num_stages {
            pipeline = pipeline.add_stage(DecrementTtl);
        }

        let packet1 = build_test_ipv4_packet(p1_ttl);
        let packet2 = build_test_ipv4_packet(p2_ttl);
        let packet_vec = vec![packet1, packet2];
        let num_packets = packet_vec.len();

        let packets = packet_vec.into_iter().into_dyn_iter();
        let packets_out: Vec<_> = pipeline.process_dyn(packets).collect();

        assert_eq!(num_packets, packets_out.len());

        let p1_out = &packets_out[0];
        let p2_out = &packets_out[1];
        assert_eq!(
            (p1_ttl as usize) - num_stages,
            p1_out.try_ipv4().unwrap().ttl() as usize
        );
        assert_eq!(
            (p2_ttl as usize) - num_stages,
            p2_out.try_ipv4().unwrap().ttl() as usize
        );
    }
}
