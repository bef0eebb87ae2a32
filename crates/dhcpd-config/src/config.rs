//! Parsed dhcpd configuration

use crate::error::DhcpConfigError;
use crate::parser::{self, Node};
use crate::subnet::subnet_range;
use ipnet::Ipv4Net;
use mac_address::MacAddress;
use std::fmt;
use std::net::Ipv4Addr;
use tracing::debug;

/// Sentinel identifying files written by this tool; always the first line.
pub const OWNERSHIP_MARKER: &str = "# Managed by acc-provisioner, do not edit by hand";

/// Substring matched when checking for the marker, so a reworded marker
/// from an older release is still recognised.
pub(crate) const OWNERSHIP_TAG: &str = "Managed by acc-provisioner";

/// Prefix length of the subnet declared around each reservation
pub const HOST_SUBNET_PREFIX: u8 = 24;

/// A `host NAME { hardware ethernet ...; fixed-address ...; }` block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostReservation {
    pub name: String,
    pub mac: MacAddress,
    pub fixed_address: Ipv4Addr,
    /// Other statements inside the block, kept verbatim (without `;`)
    pub extra: Vec<String>,
}

impl HostReservation {
    pub fn new(name: impl Into<String>, mac: MacAddress, fixed_address: Ipv4Addr) -> Self {
        Self {
            name: name.into(),
            mac,
            fixed_address,
            extra: Vec::new(),
        }
    }

    fn from_block(header: &str, children: &[Node]) -> Option<Self> {
        let name = header.strip_prefix("host ")?.trim().to_string();
        let mut mac = None;
        let mut fixed_address = None;
        let mut extra = Vec::new();

        for child in children {
            match child {
                Node::Statement(text) => {
                    let words: Vec<&str> = text.split_whitespace().collect();
                    match words.as_slice() {
                        ["hardware", "ethernet", addr] => mac = Some(addr.parse().ok()?),
                        ["fixed-address", addr] => fixed_address = Some(addr.parse().ok()?),
                        _ => extra.push(text.clone()),
                    }
                }
                // Comments and nested blocks inside a host are unusual enough
                // that the whole block is kept verbatim instead.
                _ => return None,
            }
        }

        Some(Self {
            name,
            mac: mac?,
            fixed_address: fixed_address?,
            extra,
        })
    }

    fn render(&self) -> Vec<String> {
        let mut lines = vec![
            format!("host {} {{", self.name),
            format!("  hardware ethernet {};", self.mac.to_string().to_lowercase()),
            format!("  fixed-address {};", self.fixed_address),
        ];
        lines.extend(self.extra.iter().map(|s| format!("  {};", s)));
        lines.push("}".to_string());
        lines
    }
}

/// A `subnet NETWORK netmask MASK { ... }` block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetDeclaration {
    pub network: Ipv4Addr,
    pub netmask: Ipv4Addr,
    /// Body lines, already rendered relative to the block
    pub body: Vec<String>,
}

impl SubnetDeclaration {
    fn from_block(header: &str, children: &[Node]) -> Option<Self> {
        let words: Vec<&str> = header.split_whitespace().collect();
        let ["subnet", network, "netmask", netmask] = words.as_slice() else {
            return None;
        };
        Some(Self {
            network: network.parse().ok()?,
            netmask: netmask.parse().ok()?,
            body: parser::render_nodes(children),
        })
    }

    /// Whether `ip` falls inside this subnet
    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        u32::from(ip) & u32::from(self.netmask) == u32::from(self.network) & u32::from(self.netmask)
    }

    fn render(&self) -> Vec<String> {
        let mut lines = vec![format!("subnet {} netmask {} {{", self.network, self.netmask)];
        lines.extend(self.body.iter().map(|s| format!("  {}", s)));
        lines.push("}".to_string());
        lines
    }
}

/// One top-level item of the configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// `# text`
    Comment(String),
    /// A top-level `key value;` statement (stored without `;`)
    Directive(String),
    Subnet(SubnetDeclaration),
    Host(HostReservation),
    /// Any other block, kept verbatim
    Block { header: String, body: Vec<String> },
}

/// A parsed dhcpd.conf
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DhcpdConfig {
    pub statements: Vec<Statement>,
}

impl DhcpdConfig {
    /// Parse configuration text. The ownership marker, if present, is dropped;
    /// it is written back by `render_managed`.
    pub fn parse(input: &str) -> Result<Self, DhcpConfigError> {
        let statements = parser::parse(input)?
            .into_iter()
            .filter_map(|node| match node {
                Node::Comment(text) if text.contains(OWNERSHIP_TAG) => None,
                Node::Comment(text) => Some(Statement::Comment(text)),
                Node::Statement(text) => Some(Statement::Directive(text)),
                Node::Block { header, children } => Some(
                    SubnetDeclaration::from_block(&header, &children)
                        .map(Statement::Subnet)
                        .or_else(|| HostReservation::from_block(&header, &children).map(Statement::Host))
                        .unwrap_or_else(|| Statement::Block {
                            body: parser::render_nodes(&children),
                            header,
                        }),
                ),
            })
            .collect();
        Ok(Self { statements })
    }

    /// All host reservations, in file order
    pub fn hosts(&self) -> impl Iterator<Item = &HostReservation> {
        self.statements.iter().filter_map(|s| match s {
            Statement::Host(h) => Some(h),
            _ => None,
        })
    }

    /// Reservation for `mac`, if any
    pub fn host_by_mac(&self, mac: MacAddress) -> Option<&HostReservation> {
        self.hosts().find(|h| h.mac == mac)
    }

    pub fn subnets(&self) -> impl Iterator<Item = &SubnetDeclaration> {
        self.statements.iter().filter_map(|s| match s {
            Statement::Subnet(s) => Some(s),
            _ => None,
        })
    }

    /// Add or replace the reservation for `host.mac`.
    ///
    /// Any reservation with the same MAC or the same host name is replaced in
    /// place (dhcpd rejects duplicate host names), so repeated calls for a
    /// node never produce duplicate entries. A `/24` subnet declaration for
    /// the fixed address is added if none covers it. Returns `true` when an
    /// existing reservation was replaced.
    pub fn add_host(&mut self, host: HostReservation) -> bool {
        self.ensure_subnet_for(host.fixed_address);

        let conflicts = |s: &Statement| {
            matches!(s, Statement::Host(h) if h.mac == host.mac || h.name == host.name)
        };
        let first = self.statements.iter().position(conflicts);
        self.statements.retain(|s| !conflicts(s));

        match first {
            Some(index) => {
                debug!("Replacing reservation for {} ({})", host.name, host.mac);
                self.statements.insert(index, Statement::Host(host));
                true
            }
            None => {
                debug!("Adding reservation for {} ({})", host.name, host.mac);
                self.statements.push(Statement::Host(host));
                false
            }
        }
    }

    fn ensure_subnet_for(&mut self, ip: Ipv4Addr) {
        if self.subnets().any(|s| s.contains(ip)) {
            return;
        }
        let Ok((network, _)) = subnet_range(ip, HOST_SUBNET_PREFIX) else {
            return;
        };
        let netmask = Ipv4Net::new(network, HOST_SUBNET_PREFIX)
            .map(|n| n.netmask())
            .unwrap_or(Ipv4Addr::new(255, 255, 255, 0));
        let subnet = Statement::Subnet(SubnetDeclaration {
            network,
            netmask,
            body: Vec::new(),
        });

        // Declarations read better ahead of the host entries.
        match self
            .statements
            .iter()
            .position(|s| matches!(s, Statement::Host(_)))
        {
            Some(index) => self.statements.insert(index, subnet),
            None => self.statements.push(subnet),
        }
    }

    /// Render with the ownership marker as the first line.
    pub fn render_managed(&self) -> String {
        format!("{}\n{}", OWNERSHIP_MARKER, self)
    }
}

impl fmt::Display for DhcpdConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for statement in &self.statements {
            let lines = match statement {
                Statement::Comment(text) => vec![format!("# {}", text)],
                Statement::Directive(text) => vec![format!("{};", text)],
                Statement::Subnet(subnet) => subnet.render(),
                Statement::Host(host) => host.render(),
                Statement::Block { header, body } => {
                    let mut lines = vec![format!("{} {{", header)];
                    lines.extend(body.iter().map(|s| format!("  {}", s)));
                    lines.push("}".to_string());
                    lines
                }
            };
            for line in lines {
                writeln!(f, "{}", line)?;
            }
        }
        Ok(())
    }
}
