// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(unsafe_code, clippy::all, clippy::pedantic)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

//! The match-action tables of a label-switching router.
//!
//! Four tables drive forwarding: the port map (border roles and port MACs),
//! the FTN (prefix to label bindings used at the ingress border), the NHLFE
//! table (label to next-hop bindings), and the IPv4 FIB (ordinary routes).
//!
//! All four are populated by an external control plane and read by the
//! packet pipeline. Every table sits behind a [`left_right`] write/read
//! handle pair: writers `append` changes and `publish` them between
//! packet-processing instants, and every reader `enter()` yields an atomic
//! snapshot, so a lookup sees either the old table or the new table, never
//! a mix.

pub mod config;
pub mod fib;
pub mod ftn;
pub mod nhlfe;
pub mod portmap;

use fib::{FibReader, FibWriter};
use ftn::{FtnReader, FtnWriter};
use nhlfe::{NhlfeReader, NhlfeWriter};
use portmap::{PortMapReader, PortMapWriter};

/// The writing half of one router's tables. Held by the control plane.
pub struct TableSet {
    /// Port map writer.
    pub ports: PortMapWriter,
    /// FTN writer.
    pub ftn: FtnWriter,
    /// NHLFE writer.
    pub nhlfe: NhlfeWriter,
    /// IPv4 FIB writer.
    pub fib: FibWriter,
}

/// The reading half of one router's tables. Cloned into pipeline stages.
#[derive(Clone, Debug)]
pub struct TableReaders {
    /// Port map reader.
    pub ports: PortMapReader,
    /// FTN reader.
    pub ftn: FtnReader,
    /// NHLFE reader.
    pub nhlfe: NhlfeReader,
    /// IPv4 FIB reader.
    pub fib: FibReader,
}

impl TableSet {
    /// Create the tables of a router, empty, returning the writing half and
    /// the reading half.
    #[must_use]
    pub fn new() -> (TableSet, TableReaders) {
        let (ports_w, ports_r) = PortMapWriter::new();
        let (ftn_w, ftn_r) = FtnWriter::new();
        let (nhlfe_w, nhlfe_r) = NhlfeWriter::new();
        let (fib_w, fib_r) = FibWriter::new();
        (
            TableSet {
                ports: ports_w,
                ftn: ftn_w,
                nhlfe: nhlfe_w,
                fib: fib_w,
            },
            TableReaders {
                ports: ports_r,
                ftn: ftn_r,
                nhlfe: nhlfe_r,
                fib: fib_r,
            },
        )
    }
}
