// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Type to represent IPv4 network prefixes.

use ipnet::Ipv4Net;
use std::fmt::{Debug, Display};
use std::net::Ipv4Addr;
use std::str::FromStr;
use thiserror::Error;

/// Errors which can occur when building a prefix.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PrefixError {
    /// The textual form of the prefix could not be parsed.
    #[error("Invalid Prefix: {0}")]
    Invalid(String),
    /// The mask length is out of range for IPv4.
    #[error("Mask length {0} is invalid")]
    InvalidLength(u8),
}

/// An IPv4 prefix: a network address plus a mask length.
///
/// The address is always stored in canonical (truncated) form, so two
/// prefixes that describe the same network compare equal.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Ord, PartialOrd, Hash)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ipv4Prefix(Ipv4Net);

impl Ipv4Prefix {
    /// The maximum mask length of an IPv4 prefix.
    pub const MAX_LEN: u8 = 32;

    /// Build a prefix from an address and a mask length.
    ///
    /// # Errors
    ///
    /// Returns [`PrefixError::InvalidLength`] if `length` exceeds
    /// [`Ipv4Prefix::MAX_LEN`].
    pub fn new(address: Ipv4Addr, length: u8) -> Result<Self, PrefixError> {
        let net =
            Ipv4Net::new(address, length).map_err(|_| PrefixError::InvalidLength(length))?;
        Ok(Self(net.trunc()))
    }

    /// Build the host prefix (/32) covering exactly `address`.
    #[must_use]
    pub fn host(address: Ipv4Addr) -> Self {
        Ipv4Net::new(address, Self::MAX_LEN)
            .map(Self)
            .unwrap_or_else(|_| unreachable!())
    }

    /// Build 0.0.0.0/0. "Default" is a very overloaded term, so: the root.
    #[must_use]
    pub fn root() -> Self {
        Self(Ipv4Net::default())
    }

    /// Tell if this prefix is the root prefix.
    #[must_use]
    pub fn is_root(&self) -> bool {
        *self == Self::root()
    }

    /// Get the network address of the prefix.
    #[must_use]
    pub fn network(&self) -> Ipv4Addr {
        self.0.network()
    }

    /// Get the mask length of the prefix.
    #[must_use]
    pub fn length(&self) -> u8 {
        self.0.prefix_len()
    }

    /// Tell whether `address` is covered by this prefix.
    #[must_use]
    pub fn covers(&self, address: Ipv4Addr) -> bool {
        self.0.contains(&address)
    }

    /// Get the inner [`Ipv4Net`].
    #[must_use]
    pub(crate) fn inner(&self) -> Ipv4Net {
        self.0
    }
}

impl From<Ipv4Net> for Ipv4Prefix {
    fn from(net: Ipv4Net) -> Self {
        Self(net.trunc())
    }
}

impl FromStr for Ipv4Prefix {
    type Err = PrefixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let net = Ipv4Net::from_str(s).map_err(|_| PrefixError::Invalid(s.to_string()))?;
        Ok(Self(net.trunc()))
    }
}

impl TryFrom<String> for Ipv4Prefix {
    type Error = PrefixError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_str(&s)
    }
}

impl From<Ipv4Prefix> for String {
    fn from(prefix: Ipv4Prefix) -> String {
        prefix.to_string()
    }
}

impl Display for Ipv4Prefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
