// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! A trie map over [`Ipv4Prefix`] with exact-match and longest-prefix-match
//! lookups.

use crate::prefix::Ipv4Prefix;
use prefix_trie::PrefixMap;
use std::net::Ipv4Addr;

/// A map from [`Ipv4Prefix`] to `V` supporting longest-prefix-match lookup.
///
/// `get` is an exact lookup on the prefix itself; [`Ipv4TrieMap::lookup`]
/// performs LPM on an address. Ties between overlapping prefixes are won by
/// the longest one; equal-length overlapping prefixes cannot exist (the map
/// holds at most one value per exact prefix).
#[derive(Clone)]
pub struct Ipv4TrieMap<V> {
    trie: PrefixMap<ipnet::Ipv4Net, V>,
    len: usize,
}

impl<V> std::fmt::Debug for Ipv4TrieMap<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ipv4TrieMap").field("len", &self.len).finish()
    }
}

impl<V> Default for Ipv4TrieMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Ipv4TrieMap<V> {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self {
            trie: PrefixMap::new(),
            len: 0,
        }
    }

    /// Get the value stored for exactly `prefix`, if any. This does not do LPM.
    #[must_use]
    pub fn get(&self, prefix: &Ipv4Prefix) -> Option<&V> {
        self.trie.get(&prefix.inner())
    }

    /// Get the value stored for exactly `prefix` mutably, if any. This does not do LPM.
    pub fn get_mut(&mut self, prefix: &Ipv4Prefix) -> Option<&mut V> {
        self.trie.get_mut(&prefix.inner())
    }

    /// Insert a value for `prefix`, returning the previous value if the
    /// prefix was already present.
    pub fn insert(&mut self, prefix: Ipv4Prefix, value: V) -> Option<V> {
        let prior = self.trie.insert(prefix.inner(), value);
        if prior.is_none() {
            self.len += 1;
        }
        prior
    }

    /// Remove the value stored for exactly `prefix`, if any.
    pub fn remove(&mut self, prefix: &Ipv4Prefix) -> Option<V> {
        let removed = self.trie.remove(&prefix.inner());
        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }

    /// The number of prefixes in the map.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True iff the map holds no prefixes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate over all (prefix, value) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (Ipv4Prefix, &V)> {
        self.trie.iter().map(|(net, value)| ((*net).into(), value))
    }

    /// Look up `addr` with longest-prefix-match semantics.
    ///
    /// Returns the longest configured prefix covering `addr` together with
    /// its value, or `None` if no prefix covers it.
    #[must_use]
    pub fn lookup(&self, addr: Ipv4Addr) -> Option<(Ipv4Prefix, &V)> {
        self.trie
            .get_lpm(&Ipv4Prefix::host(addr).inner())
            .map(|(net, value)| ((*net).into(), value))
    }
}
