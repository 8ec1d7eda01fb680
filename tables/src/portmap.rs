// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The port map: per-port attributes (own MAC, border roles).

use ahash::RandomState;
use left_right::{Absorb, ReadGuard, ReadHandle, WriteHandle};
use net::eth::mac::SourceMac;
use net::packet::PortId;
use std::collections::HashMap;

/// The configured attributes of one router port.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PortAttrs {
    /// The MAC address frames leaving this port are sourced from.
    pub mac: SourceMac,
    /// True iff unlabeled traffic entering here enters the MPLS domain.
    pub ingress_border: bool,
    /// True iff labeled traffic leaving here leaves the MPLS domain.
    pub egress_border: bool,
}

impl PortAttrs {
    /// Create a [`PortAttrs`].
    #[must_use]
    pub fn new(mac: SourceMac, ingress_border: bool, egress_border: bool) -> Self {
        Self {
            mac,
            ingress_border,
            egress_border,
        }
    }
}

/// A table of [`PortAttrs`] keyed by [`PortId`].
///
/// A lookup miss means "not a border port", never an error; forwarding
/// stages that need the port's MAC handle the miss themselves.
#[derive(Default, Clone)]
pub struct PortMap(HashMap<PortId, PortAttrs, RandomState>);

impl PortMap {
    /// Create an empty port map.
    #[must_use]
    pub fn new() -> Self {
        Self(HashMap::with_hasher(RandomState::with_seed(0)))
    }
    /// The number of configured ports.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }
    /// True iff no ports are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    /// Iterate over all configured ports.
    pub fn iter(&self) -> impl Iterator<Item = (&PortId, &PortAttrs)> {
        self.0.iter()
    }
    /// Set the attributes of `port`.
    pub fn set_port(&mut self, port: PortId, attrs: PortAttrs) {
        self.0.insert(port, attrs);
    }
    /// Remove the attributes of `port`.
    pub fn del_port(&mut self, port: PortId) {
        self.0.remove(&port);
    }
    /// Get the attributes of `port`, if configured.
    #[must_use]
    pub fn get_port(&self, port: PortId) -> Option<&PortAttrs> {
        self.0.get(&port)
    }
    /// Tell whether `port` is an ingress-border port. Misses are `false`.
    #[must_use]
    pub fn is_ingress_border(&self, port: PortId) -> bool {
        self.get_port(port).is_some_and(|p| p.ingress_border)
    }
    /// Tell whether `port` is an egress-border port. Misses are `false`.
    #[must_use]
    pub fn is_egress_border(&self, port: PortId) -> bool {
        self.get_port(port).is_some_and(|p| p.egress_border)
    }
    /// Remove all ports.
    pub fn clear(&mut self) {
        self.0.clear();
    }
}

enum PortMapChange {
    Set(PortId, PortAttrs),
    Del(PortId),
    Clear,
}

impl Absorb<PortMapChange> for PortMap {
    fn absorb_first(&mut self, change: &mut PortMapChange, _: &Self) {
        match change {
            PortMapChange::Set(port, attrs) => self.set_port(*port, *attrs),
            PortMapChange::Del(port) => self.del_port(*port),
            PortMapChange::Clear => self.clear(),
        }
    }
    fn drop_first(self: Box<Self>) {}
    fn sync_with(&mut self, first: &Self) {
        *self = first.clone();
    }
}

/// The writing half of a [`PortMap`].
pub struct PortMapWriter(WriteHandle<PortMap, PortMapChange>);
impl PortMapWriter {
    /// Create a port map, returning the writer and a reader.
    #[must_use]
    pub fn new() -> (PortMapWriter, PortMapReader) {
        let (w, r) = left_right::new_from_empty::<PortMap, PortMapChange>(PortMap::new());
        (PortMapWriter(w), PortMapReader(r))
    }
    /// Derive another reader from this writer.
    #[must_use]
    pub fn as_portmap_reader(&self) -> PortMapReader {
        PortMapReader::new(self.0.clone())
    }
    /// Read the table through the writer.
    pub fn enter(&self) -> Option<ReadGuard<'_, PortMap>> {
        self.0.enter()
    }
    /// Set the attributes of a port.
    pub fn set_port(&mut self, port: PortId, attrs: PortAttrs, publish: bool) {
        self.0.append(PortMapChange::Set(port, attrs));
        if publish {
            self.0.publish();
        }
    }
    /// Remove a port.
    pub fn del_port(&mut self, port: PortId, publish: bool) {
        self.0.append(PortMapChange::Del(port));
        if publish {
            self.0.publish();
        }
    }
    /// Remove all ports.
    pub fn clear(&mut self, publish: bool) {
        self.0.append(PortMapChange::Clear);
        if publish {
            self.0.publish();
        }
    }
    /// Publish all pending changes to readers.
    pub fn publish(&mut self) {
        self.0.publish();
    }
}

/// The reading half of a [`PortMap`].
#[derive(Clone, Debug)]
pub struct PortMapReader(ReadHandle<PortMap>);
impl PortMapReader {
    /// Wrap a raw read handle.
    #[must_use]
    pub fn new(rhandle: ReadHandle<PortMap>) -> Self {
        PortMapReader(rhandle)
    }
    /// Get an atomic snapshot of the table.
    pub fn enter(&self) -> Option<ReadGuard<'_, PortMap>> {
        self.0.enter()
    }
}
