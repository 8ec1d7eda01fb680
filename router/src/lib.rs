// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(unsafe_code, clippy::all, clippy::pedantic)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

//! The per-router forwarding pipeline of a label-switching dataplane.
//!
//! A frame enters on a port, is parsed, and traverses five stages:
//!
//! 1. [`Ingress`] classifies the ingress-border role of the arrival port and
//!    defensively drops traffic no stage can act on.
//! 2. [`LabelImpose`] binds unlabeled IPv4 traffic entering the domain to a
//!    FEC (longest-prefix match in the FTN) and pushes a label entry.
//! 3. [`LabelSwitch`] forwards labeled traffic by exact NHLFE lookup.
//! 4. [`IpForwarder`] forwards whatever remains unlabeled by ordinary
//!    longest-prefix IPv4 routing.
//! 5. [`Egress`] classifies the egress-border role of the selected port,
//!    strips the label entry when the frame leaves the domain, and marks
//!    the frame delivered.
//!
//! Every router runs this pipeline independently; no router has global
//! knowledge of the path. The [`Router`] type wraps the pipeline in a
//! frame-in/frame-out surface with drop accounting.

mod egress;
mod impose;
mod ingress;
mod ipforward;
mod router;
mod switch;

pub use egress::Egress;
pub use impose::LabelImpose;
pub use ingress::Ingress;
pub use ipforward::IpForwarder;
pub use router::{Router, RouterSettings, Verdict};
pub use switch::LabelSwitch;
