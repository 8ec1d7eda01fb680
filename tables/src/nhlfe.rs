// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The NHLFE table: exact-match bindings from label values to next hops.

use ahash::RandomState;
use left_right::{Absorb, ReadGuard, ReadHandle, WriteHandle};
use net::eth::mac::Mac;
use net::mpls::Label;
use net::packet::PortId;
use std::collections::HashMap;

/// A next-hop label forwarding entry: where frames carrying a label go next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NhlfeEntry {
    /// The MAC address of the next hop.
    pub next_hop_mac: Mac,
    /// The port frames are switched out of.
    pub out_port: PortId,
}

impl NhlfeEntry {
    /// Create an [`NhlfeEntry`].
    #[must_use]
    pub fn new(next_hop_mac: Mac, out_port: PortId) -> Self {
        Self {
            next_hop_mac,
            out_port,
        }
    }
}

/// A table of [`NhlfeEntry`]s keyed exactly by [`Label`].
///
/// Exactly one binding per label; a lookup miss means drop, never fallback.
#[derive(Default, Clone)]
pub struct NhlfeTable(HashMap<Label, NhlfeEntry, RandomState>);

impl NhlfeTable {
    /// Create an empty NHLFE table.
    #[must_use]
    pub fn new() -> Self {
        Self(HashMap::with_hasher(RandomState::with_seed(0)))
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
    pub fn iter(&self) -> impl Iterator<Item = (&Label, &NhlfeEntry)> {
        self.0.iter()
    }
    /// Bind `label` to `entry`, replacing any prior binding.
    pub fn add_entry(&mut self, label: Label, entry: NhlfeEntry) {
        self.0.insert(label, entry);
    }
    /// Remove the binding of `label`.
    pub fn del_entry(&mut self, label: Label) {
        self.0.remove(&label);
    }
    /// Get the binding of `label`, if any. Exact match only.
    #[must_use]
    pub fn get_entry(&self, label: Label) -> Option<&NhlfeEntry> {
        self.0.get(&label)
    }
    /// Remove all bindings.
    pub fn clear(&mut self) {
        self.0.clear();
    }
}

enum NhlfeChange {
    Add(Label, NhlfeEntry),
    Del(Label),
    Clear,
}

impl Absorb<NhlfeChange> for NhlfeTable {
    fn absorb_first(&mut self, change: &mut NhlfeChange, _: &Self) {
        match change {
            NhlfeChange::Add(label, entry) => self.add_entry(*label, *entry),
            NhlfeChange::Del(label) => self.del_entry(*label),
            NhlfeChange::Clear => self.clear(),
        }
    }
    fn drop_first(self: Box<Self>) {}
    fn sync_with(&mut self, first: &Self) {
        *self = first.clone();
    }
}

/// The writing half of an [`NhlfeTable`].
pub struct NhlfeWriter(WriteHandle<NhlfeTable, NhlfeChange>);
impl NhlfeWriter {
    /// Create an NHLFE table, returning the writer and a reader.
    #[must_use]
    pub fn new() -> (NhlfeWriter, NhlfeReader) {
        let (w, r) = left_right::new_from_empty::<NhlfeTable, NhlfeChange>(NhlfeTable::new());
        (NhlfeWriter(w), NhlfeReader(r))
    }
    /// Derive another reader from this writer.
    #[must_use]
    pub fn as_nhlfe_reader(&self) -> NhlfeReader {
        NhlfeReader::new(self.0.clone())
    }
    /// Read the table through the writer.
    pub fn enter(&self) -> Option<ReadGuard<'_, NhlfeTable>> {
        self.0.enter()
    }
    /// Bind a label to an entry.
    pub fn add_entry(&mut self, label: Label, entry: NhlfeEntry, publish: bool) {
        self.0.append(NhlfeChange::Add(label, entry));
        if publish {
            self.0.publish();
        }
    }
    /// Remove the binding of a label.
    pub fn del_entry(&mut self, label: Label, publish: bool) {
        self.0.append(NhlfeChange::Del(label));
        if publish {
            self.0.publish();
        }
    }
    /// Remove all bindings.
    pub fn clear(&mut self, publish: bool) {
        self.0.append(NhlfeChange::Clear);
        if publish {
            self.0.publish();
        }
    }
    /// Publish all pending changes to readers.
    pub fn publish(&mut self) {
        self.0.publish();
    }
}

/// The reading half of an [`NhlfeTable`].
#[derive(Clone, Debug)]
pub struct NhlfeReader(ReadHandle<NhlfeTable>);
impl NhlfeReader {
    /// Wrap a raw read handle.
    #[must_use]
    pub fn new(rhandle: ReadHandle<NhlfeTable>) -> Self {
        NhlfeReader(rhandle)
    }
    /// Get an atomic snapshot of the table.
    pub fn enter(&self) -> Option<ReadGuard<'_, NhlfeTable>> {
        self.0.enter()
    }
}
