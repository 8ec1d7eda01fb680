// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Per-packet transient metadata.
#![allow(missing_docs)] // done reasons are annotated inline

use std::collections::HashMap;

/// A router port identifier.
///
/// Ports are opaque numbers assigned by whatever wires the router to its
/// links; the dataplane only ever uses them as table keys.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct PortId(u32);

impl PortId {
    /// Create a [`PortId`] from a raw number.
    #[must_use]
    pub fn new(val: u32) -> Self {
        Self(val)
    }
    /// Get the raw port number.
    #[must_use]
    pub fn get_id(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for PortId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The reason a packet's processing finished, for better or worse.
#[allow(unused)]
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum DoneReason {
    InternalFailure,        /* catch-all for internal issues */
    NotEthernet,            /* could not get eth header */
    Malformed,              /* the frame does not conform / is malformed */
    Unhandled,              /* neither labeled nor ip: no action applies */
    LabelNotBottomOfStack,  /* label entry with s=0: deeper stacks are not modeled */
    LabelMiss,              /* no NHLFE entry for the label: labels have no default route */
    RouteFailure,           /* no LPM route for the destination */
    HopLimitExceeded,       /* IPv4 or label TTL was exceeded */
    PortUnknown,            /* the egress port is not configured */
    InvalidDstMac,          /* the configured next-hop mac is not usable as destination */
    Delivered,              /* the frame is ready for transmission on its egress port */
}

/// Transient metadata carried by a packet through one pipeline pass.
///
/// Created at pipeline entry, discarded at exit; never shared across packets.
#[derive(Debug, Default)]
pub struct PacketMeta {
    /// incoming port - set before the pipeline runs
    pub iif: PortId,
    /// outgoing port - set by a forwarding stage
    pub oif: Option<PortId>,
    /// true iff the frame entered the MPLS domain through this router
    pub is_ingress_border: bool,
    /// true iff the frame leaves the MPLS domain through the selected port;
    /// known only once the egress port is (late in the pipeline)
    pub is_egress_border: bool,
    /// if `Some`, the reason why the packet was marked as done, including
    /// delivery
    pub done: Option<DoneReason>,

    #[cfg(test)]
    /// Keep the packet in spite of calling `packet.enforce()`. This is for testing.
    pub keep: bool,
}

impl PacketMeta {
    pub(crate) fn keep(&self) -> bool {
        #[cfg(test)]
        {
            self.keep
        }
        #[cfg(not(test))]
        {
            false
        }
    }
}

/// Counters of packets dropped, keyed by [`DoneReason`].
#[derive(Default, Debug)]
pub struct PacketDropStats {
    /// A display name for the owner of these counters.
    pub name: String,
    reasons: HashMap<DoneReason, u64>,
}

impl PacketDropStats {
    /// Create a stats object named `name`.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            reasons: HashMap::default(),
        }
    }

    /// Add `value` drops for `reason`.
    pub fn incr(&mut self, reason: DoneReason, value: u64) {
        self.reasons
            .entry(reason)
            .and_modify(|counter| *counter += value)
            .or_insert(value);
    }

    /// Get the drop count for a particular reason, if any drops were recorded.
    #[must_use]
    pub fn get_stat(&self, reason: DoneReason) -> Option<u64> {
        self.reasons.get(&reason).copied()
    }

    /// Access the whole map of recorded drops.
    #[must_use]
    pub fn get_stats(&self) -> &HashMap<DoneReason, u64> {
        &self.reasons
    }
}
