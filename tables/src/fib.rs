// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The IPv4 FIB: longest-prefix-match routes used for plain IPv4 forwarding.
//!
//! Independent from the FTN: this table serves traffic that never enters the
//! MPLS domain (and domain-external hops), with the same matching discipline.

use left_right::{Absorb, ReadGuard, ReadHandle, WriteHandle};
use lpm::{Ipv4Prefix, Ipv4TrieMap};
use net::eth::mac::Mac;
use net::packet::PortId;
use std::net::Ipv4Addr;

/// One IPv4 route: where plain IPv4 traffic to a prefix goes next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RouteEntry {
    /// The MAC address of the next hop.
    pub next_hop_mac: Mac,
    /// The port frames are forwarded out of.
    pub out_port: PortId,
}

impl RouteEntry {
    /// Create a [`RouteEntry`].
    #[must_use]
    pub fn new(next_hop_mac: Mac, out_port: PortId) -> Self {
        Self {
            next_hop_mac,
            out_port,
        }
    }
}

/// The IPv4 routes of one router.
#[derive(Default, Clone, Debug)]
pub struct FibTable(Ipv4TrieMap<RouteEntry>);

impl FibTable {
    /// Create an empty FIB.
    #[must_use]
    pub fn new() -> Self {
        Self(Ipv4TrieMap::new())
    }
    /// The number of routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }
    /// True iff the FIB holds no routes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    /// Iterate over all routes.
    pub fn iter(&self) -> impl Iterator<Item = (Ipv4Prefix, &RouteEntry)> {
        self.0.iter()
    }
    /// Add a route for `prefix`, replacing any prior route for the exact prefix.
    pub fn add_route(&mut self, prefix: Ipv4Prefix, entry: RouteEntry) {
        self.0.insert(prefix, entry);
    }
    /// Remove the route for exactly `prefix`.
    pub fn del_route(&mut self, prefix: &Ipv4Prefix) {
        self.0.remove(prefix);
    }
    /// Route `addr`: longest-prefix-match over the configured routes.
    #[must_use]
    pub fn lookup(&self, addr: Ipv4Addr) -> Option<(Ipv4Prefix, RouteEntry)> {
        self.0.lookup(addr).map(|(prefix, entry)| (prefix, *entry))
    }
    /// Remove all routes.
    pub fn clear(&mut self) {
        self.0 = Ipv4TrieMap::new();
    }
}

enum FibChange {
    Add(Ipv4Prefix, RouteEntry),
    Del(Ipv4Prefix),
    Clear,
}

impl Absorb<FibChange> for FibTable {
    fn absorb_first(&mut self, change: &mut FibChange, _: &Self) {
        match change {
            FibChange::Add(prefix, entry) => self.add_route(*prefix, *entry),
            FibChange::Del(prefix) => self.del_route(prefix),
            FibChange::Clear => self.clear(),
        }
    }
    fn drop_first(self: Box<Self>) {}
    fn sync_with(&mut self, first: &Self) {
        *self = first.clone();
    }
}

/// The writing half of a [`FibTable`].
pub struct FibWriter(WriteHandle<FibTable, FibChange>);
impl FibWriter {
    /// Create a FIB, returning the writer and a reader.
    #[must_use]
    pub fn new() -> (FibWriter, FibReader) {
        let (w, r) = left_right::new_from_empty::<FibTable, FibChange>(FibTable::new());
        (FibWriter(w), FibReader(r))
    }
    /// Derive another reader from this writer.
    #[must_use]
    pub fn as_fib_reader(&self) -> FibReader {
        FibReader::new(self.0.clone())
    }
    /// Read the table through the writer.
    pub fn enter(&self) -> Option<ReadGuard<'_, FibTable>> {
        self.0.enter()
    }
    /// Add a route.
    pub fn add_route(&mut self, prefix: Ipv4Prefix, entry: RouteEntry, publish: bool) {
        self.0.append(FibChange::Add(prefix, entry));
        if publish {
            self.0.publish();
        }
    }
    /// Remove a route.
    pub fn del_route(&mut self, prefix: Ipv4Prefix, publish: bool) {
        self.0.append(FibChange::Del(prefix));
        if publish {
            self.0.publish();
        }
    }
    /// Remove all routes.
    pub fn clear(&mut self, publish: bool) {
        self.0.append(FibChange::Clear);
        if publish {
            self.0.publish();
        }
    }
    /// Publish all pending changes to readers.
    pub fn publish(&mut self) {
        self.0.publish();
    }
}

/// The reading half of a [`FibTable`].
#[derive(Clone, Debug)]
pub struct FibReader(ReadHandle<FibTable>);
impl FibReader {
    /// Wrap a raw read handle.
    #[must_use]
    pub fn new(rhandle: ReadHandle<FibTable>) -> Self {
        FibReader(rhandle)
    }
    /// Get an atomic snapshot of the table.
    pub fn enter(&self) -> Option<ReadGuard<'_, FibTable>> {
        self.0.enter()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)] // valid in test code
#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn prefix(s: &str) -> Ipv4Prefix {
        Ipv4Prefix::from_str(s).unwrap()
    }

    #[test]
    fn lpm_routing() {
        let (mut writer, reader) = FibWriter::new();
        let coarse = RouteEntry::new(Mac([0, 0, 0, 0, 0xbb, 0x1]), PortId::new(1));
        let fine = RouteEntry::new(Mac([0, 0, 0, 0, 0xbb, 0x2]), PortId::new(2));
        writer.add_route(prefix("10.0.0.0/8"), coarse, false);
        writer.add_route(prefix("10.7.0.0/16"), fine, true);

        let guard = reader.enter().unwrap();
        let (hit, entry) = guard.lookup(Ipv4Addr::new(10, 7, 2, 2)).unwrap();
        assert_eq!(hit, prefix("10.7.0.0/16"));
        assert_eq!(entry, fine);

        let (hit, entry) = guard.lookup(Ipv4Addr::new(10, 200, 1, 1)).unwrap();
        assert_eq!(hit, prefix("10.0.0.0/8"));
        assert_eq!(entry, coarse);

        assert_eq!(guard.lookup(Ipv4Addr::new(172, 16, 0, 1)), None);
    }
}
