// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The FTN (FEC-to-NHLFE) table: longest-prefix-match bindings from IPv4
//! destination prefixes to labels, consulted at the ingress border.

use left_right::{Absorb, ReadGuard, ReadHandle, WriteHandle};
use lpm::{Ipv4Prefix, Ipv4TrieMap};
use net::mpls::Label;
use std::net::Ipv4Addr;

/// The FEC-to-label bindings of one router.
///
/// This is the only place labels come from: a destination that matches no
/// prefix here never gets one.
#[derive(Default, Clone, Debug)]
pub struct FtnTable(Ipv4TrieMap<Label>);

impl FtnTable {
    /// Create an empty FTN table.
    #[must_use]
    pub fn new() -> Self {
        Self(Ipv4TrieMap::new())
    }
    /// The number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }
    /// True iff the table holds no bindings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    /// Iterate over all bindings.
    pub fn iter(&self) -> impl Iterator<Item = (Ipv4Prefix, &Label)> {
        self.0.iter()
    }
    /// Bind `prefix` to `label`, replacing any prior binding for the exact prefix.
    pub fn add_binding(&mut self, prefix: Ipv4Prefix, label: Label) {
        self.0.insert(prefix, label);
    }
    /// Remove the binding for exactly `prefix`.
    pub fn del_binding(&mut self, prefix: &Ipv4Prefix) {
        self.0.remove(prefix);
    }
    /// Classify `addr` into a FEC: longest-prefix-match over the bindings.
    #[must_use]
    pub fn lookup(&self, addr: Ipv4Addr) -> Option<(Ipv4Prefix, Label)> {
        self.0.lookup(addr).map(|(prefix, label)| (prefix, *label))
    }
    /// Remove all bindings.
    pub fn clear(&mut self) {
        self.0 = Ipv4TrieMap::new();
    }
}

enum FtnChange {
    Add(Ipv4Prefix, Label),
    Del(Ipv4Prefix),
    Clear,
}

impl Absorb<FtnChange> for FtnTable {
    fn absorb_first(&mut self, change: &mut FtnChange, _: &Self) {
        match change {
            FtnChange::Add(prefix, label) => self.add_binding(*prefix, *label),
            FtnChange::Del(prefix) => self.del_binding(prefix),
            FtnChange::Clear => self.clear(),
        }
    }
    fn drop_first(self: Box<Self>) {}
    fn sync_with(&mut self, first: &Self) {
        *self = first.clone();
    }
}

/// The writing half of an [`FtnTable`].
pub struct FtnWriter(WriteHandle<FtnTable, FtnChange>);
impl FtnWriter {
    /// Create an FTN table, returning the writer and a reader.
    #[must_use]
    pub fn new() -> (FtnWriter, FtnReader) {
        let (w, r) = left_right::new_from_empty::<FtnTable, FtnChange>(FtnTable::new());
        (FtnWriter(w), FtnReader(r))
    }
    /// Derive another reader from this writer.
    #[must_use]
    pub fn as_ftn_reader(&self) -> FtnReader {
        FtnReader::new(self.0.clone())
    }
    /// Read the table through the writer.
    pub fn enter(&self) -> Option<ReadGuard<'_, FtnTable>> {
        self.0.enter()
    }
    /// Bind a prefix to a label.
    pub fn add_binding(&mut self, prefix: Ipv4Prefix, label: Label, publish: bool) {
        self.0.append(FtnChange::Add(prefix, label));
        if publish {
            self.0.publish();
        }
    }
    /// Remove the binding of a prefix.
    pub fn del_binding(&mut self, prefix: Ipv4Prefix, publish: bool) {
        self.0.append(FtnChange::Del(prefix));
        if publish {
            self.0.publish();
        }
    }
    /// Remove all bindings.
    pub fn clear(&mut self, publish: bool) {
        self.0.append(FtnChange::Clear);
        if publish {
            self.0.publish();
        }
    }
    /// Publish all pending changes to readers.
    pub fn publish(&mut self) {
        self.0.publish();
    }
}

/// The reading half of an [`FtnTable`].
#[derive(Clone, Debug)]
pub struct FtnReader(ReadHandle<FtnTable>);
impl FtnReader {
    /// Wrap a raw read handle.
    #[must_use]
    pub fn new(rhandle: ReadHandle<FtnTable>) -> Self {
        FtnReader(rhandle)
    }
    /// Get an atomic snapshot of the table.
    pub fn enter(&self) -> Option<ReadGuard<'_, FtnTable>> {
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

    fn label(v: u32) -> Label {
        Label::new(v).unwrap()
    }

    #[test]
    fn longest_prefix_binding_wins() {
        let (mut writer, reader) = FtnWriter::new();
        writer.add_binding(prefix("10.0.0.0/8"), label(100), false);
        writer.add_binding(prefix("10.7.2.0/24"), label(200), false);
        writer.add_binding(prefix("10.7.2.2/32"), label(2), true);

        let guard = reader.enter().unwrap();
        let (hit, l) = guard.lookup(Ipv4Addr::new(10, 7, 2, 2)).unwrap();
        assert_eq!(hit, prefix("10.7.2.2/32"));
        assert_eq!(l, label(2));

        let (hit, l) = guard.lookup(Ipv4Addr::new(10, 7, 2, 3)).unwrap();
        assert_eq!(hit, prefix("10.7.2.0/24"));
        assert_eq!(l, label(200));

        assert_eq!(guard.lookup(Ipv4Addr::new(192, 0, 2, 1)), None);
    }

    #[test]
    fn unbinding_falls_back_to_shorter_prefix() {
        let (mut writer, reader) = FtnWriter::new();
        writer.add_binding(prefix("10.0.0.0/8"), label(100), false);
        writer.add_binding(prefix("10.7.2.2/32"), label(2), true);
        writer.del_binding(prefix("10.7.2.2/32"), true);

        let guard = reader.enter().unwrap();
        let (hit, l) = guard.lookup(Ipv4Addr::new(10, 7, 2, 2)).unwrap();
        assert_eq!(hit, prefix("10.0.0.0/8"));
        assert_eq!(l, label(100));
    }
}
