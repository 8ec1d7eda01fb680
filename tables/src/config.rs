// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The table configuration surface.
//!
//! One YAML document describes the four tables of a router. This is the only
//! way port roles, label bindings and routes are established; the dataplane
//! never infers them. Applying a config appends every entry through the
//! table writers and publishes once at the end, so a router flips from its
//! old tables to the new ones atomically with respect to any single lookup.

use crate::TableSet;
use crate::fib::RouteEntry;
use crate::nhlfe::NhlfeEntry;
use crate::portmap::PortAttrs;
use lpm::Ipv4Prefix;
use net::eth::mac::{Mac, SourceMac};
use net::mpls::{InvalidLabel, Label};
use net::packet::PortId;
use tracing::debug;

/// Attributes of one port, as configured.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PortConfig {
    /// The port number.
    pub port: PortId,
    /// The MAC address of the port, in `aa:bb:cc:dd:ee:ff` form.
    pub mac: String,
    /// Whether unlabeled traffic entering here enters the MPLS domain.
    #[serde(default)]
    pub ingress_border: bool,
    /// Whether labeled traffic leaving here leaves the MPLS domain.
    #[serde(default)]
    pub egress_border: bool,
}

/// One FTN binding, as configured.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FtnConfig {
    /// The destination prefix of the FEC.
    pub prefix: Ipv4Prefix,
    /// The label to impose.
    pub label: u32,
}

/// One NHLFE binding, as configured.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NhlfeConfig {
    /// The label to match (exactly).
    pub label: u32,
    /// The MAC of the next hop, in `aa:bb:cc:dd:ee:ff` form.
    pub next_hop_mac: String,
    /// The port to switch matching frames out of.
    pub port: PortId,
}

/// One IPv4 route, as configured.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RouteConfig {
    /// The destination prefix.
    pub prefix: Ipv4Prefix,
    /// The MAC of the next hop, in `aa:bb:cc:dd:ee:ff` form.
    pub next_hop_mac: String,
    /// The port to forward matching packets out of.
    pub port: PortId,
}

/// The whole table set of one router, as configured.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TablesConfig {
    /// Port attributes.
    #[serde(default)]
    pub ports: Vec<PortConfig>,
    /// FTN bindings.
    #[serde(default)]
    pub ftn: Vec<FtnConfig>,
    /// NHLFE bindings.
    #[serde(default)]
    pub nhlfe: Vec<NhlfeConfig>,
    /// IPv4 routes.
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

/// Errors raised when parsing or applying a [`TablesConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The document is not valid YAML for this schema.
    #[error(transparent)]
    Yaml(#[from] serde_yaml_ng::Error),
    /// A MAC address string could not be parsed.
    #[error("invalid MAC address '{0}'")]
    InvalidMac(String),
    /// A port MAC is not usable as a source MAC (zero or multicast).
    #[error("MAC '{0}' of port {1} cannot be used as a source MAC")]
    InvalidPortMac(String, PortId),
    /// A label value does not fit in 20 bits.
    #[error(transparent)]
    InvalidLabel(#[from] InvalidLabel),
}

impl TablesConfig {
    /// Parse a [`TablesConfig`] from a YAML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the document does not match the schema.
    pub fn from_yaml(yaml: &str) -> Result<TablesConfig, ConfigError> {
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    /// Apply this configuration to a [`TableSet`], replacing its contents.
    ///
    /// Entries are validated first; nothing is written unless the whole
    /// config is valid. All changes are published together at the end.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the offending entry.
    pub fn apply(&self, tables: &mut TableSet) -> Result<(), ConfigError> {
        let parsed = ParsedConfig::try_from(self)?;

        tables.ports.clear(false);
        for (port, attrs) in parsed.ports {
            tables.ports.set_port(port, attrs, false);
        }
        tables.ports.publish();

        tables.ftn.clear(false);
        for (prefix, label) in parsed.ftn {
            tables.ftn.add_binding(prefix, label, false);
        }
        tables.ftn.publish();

        tables.nhlfe.clear(false);
        for (label, entry) in parsed.nhlfe {
            tables.nhlfe.add_entry(label, entry, false);
        }
        tables.nhlfe.publish();

        tables.fib.clear(false);
        for (prefix, entry) in parsed.routes {
            tables.fib.add_route(prefix, entry, false);
        }
        tables.fib.publish();

        debug!(
            "applied table config: {} ports, {} ftn, {} nhlfe, {} routes",
            self.ports.len(),
            self.ftn.len(),
            self.nhlfe.len(),
            self.routes.len()
        );
        Ok(())
    }
}

struct ParsedConfig {
    ports: Vec<(PortId, PortAttrs)>,
    ftn: Vec<(Ipv4Prefix, Label)>,
    nhlfe: Vec<(Label, NhlfeEntry)>,
    routes: Vec<(Ipv4Prefix, RouteEntry)>,
}

fn parse_mac(s: &str) -> Result<Mac, ConfigError> {
    Mac::try_from(s).map_err(|_| ConfigError::InvalidMac(s.to_string()))
}

impl TryFrom<&TablesConfig> for ParsedConfig {
    type Error = ConfigError;

    fn try_from(config: &TablesConfig) -> Result<ParsedConfig, ConfigError> {
        let ports = config
            .ports
            .iter()
            .map(|p| {
                let mac = parse_mac(&p.mac)?;
                let mac = SourceMac::new(mac)
                    .map_err(|_| ConfigError::InvalidPortMac(p.mac.clone(), p.port))?;
                Ok((p.port, PortAttrs::new(mac, p.ingress_border, p.egress_border)))
            })
            .collect::<Result<_, ConfigError>>()?;
        let ftn = config
            .ftn
            .iter()
            .map(|f| Ok((f.prefix, Label::new(f.label)?)))
            .collect::<Result<_, ConfigError>>()?;
        let nhlfe = config
            .nhlfe
            .iter()
            .map(|n| {
                Ok((
                    Label::new(n.label)?,
                    NhlfeEntry::new(parse_mac(&n.next_hop_mac)?, n.port),
                ))
            })
            .collect::<Result<_, ConfigError>>()?;
        let routes = config
            .routes
            .iter()
            .map(|r| {
                Ok((
                    r.prefix,
                    RouteEntry::new(parse_mac(&r.next_hop_mac)?, r.port),
                ))
            })
            .collect::<Result<_, ConfigError>>()?;
        Ok(ParsedConfig {
            ports,
            ftn,
            nhlfe,
            routes,
        })
    }
}
