//! Network identity of the local node
//!
//! Interface discovery parses `ip -j -4 addr show`. The address-to-interface
//! lookup is delegated to an operator-supplied executable which prints the
//! interface name owning the address given as its only argument.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};
use regex::Regex;
use serde::Deserialize;
use tokio::fs;

use hapair_config::{HaConfig, SelfAddress};
use hapair_core::error::{ConfigError, IdentityError};
use hapair_core::{NetworkInterface, NodeRole, Result};

use crate::command::CommandRunner;

const KERNEL_HOSTNAME: &str = "/proc/sys/kernel/hostname";

/// One entry of `ip -j addr show`
#[derive(Debug, Deserialize)]
struct IpLinkEntry {
    #[serde(default)]
    ifname: Option<String>,
    #[serde(default)]
    addr_info: Vec<IpAddrInfo>,
}

#[derive(Debug, Deserialize)]
struct IpAddrInfo {
    #[serde(default)]
    family: Option<String>,
    #[serde(default)]
    local: Option<String>,
}

/// Parse `ip -j -4 addr show` output into interfaces with an IPv4 address
///
/// Entries without a name or without an IPv4 address are dropped. The
/// first IPv4 address of each interface is used.
pub fn parse_ip_addr_json(json: &str) -> Result<Vec<NetworkInterface>> {
    let entries: Vec<IpLinkEntry> =
        serde_json::from_str(json).map_err(|e| IdentityError::Parse {
            message: e.to_string(),
        })?;

    let mut interfaces = Vec::new();
    for entry in entries {
        let Some(name) = entry.ifname else {
            continue;
        };

        let address = entry
            .addr_info
            .iter()
            .filter(|info| info.family.as_deref().map_or(true, |f| f == "inet"))
            .find_map(|info| info.local.as_deref()?.parse::<Ipv4Addr>().ok());

        match address {
            Some(address) => interfaces.push(NetworkInterface::new(name, address)),
            None => debug!("Interface {} has no IPv4 address", name),
        }
    }

    Ok(interfaces)
}

/// Classifies hostnames by role suffix
pub struct RoleMatcher {
    pattern: Regex,
}

impl RoleMatcher {
    /// Match hostnames ending in `suffix` with at least one character before it
    pub fn new(suffix: &str) -> std::result::Result<Self, ConfigError> {
        let pattern = Regex::new(&format!(r"^\S+{}$", regex::escape(suffix))).map_err(|_| {
            ConfigError::InvalidValue {
                field: "role_suffix".to_string(),
                value: suffix.to_string(),
            }
        })?;
        Ok(Self { pattern })
    }

    pub fn classify(&self, hostname: &str) -> NodeRole {
        if self.pattern.is_match(hostname.trim()) {
            NodeRole::AppServer
        } else {
            NodeRole::LoadBalancerOnly
        }
    }
}

/// Resolves interfaces and addresses of the local node
pub struct NetworkIdentityResolver {
    runner: Arc<dyn CommandRunner>,
    self_address: SelfAddress,
    floating_ip: Ipv4Addr,
    address_lookup: Option<PathBuf>,
    hostname: Option<String>,
}

impl NetworkIdentityResolver {
    /// Create new resolver
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        self_address: SelfAddress,
        floating_ip: Ipv4Addr,
    ) -> Self {
        Self {
            runner,
            self_address,
            floating_ip,
            address_lookup: None,
            hostname: None,
        }
    }

    /// Create resolver from provisioning configuration
    pub fn from_config(runner: Arc<dyn CommandRunner>, config: &HaConfig) -> Self {
        let mut resolver = Self::new(runner, config.self_address, config.floating_ip);
        resolver.address_lookup = config.address_lookup.clone();
        resolver.hostname = config.hostname.clone();
        resolver
    }

    /// Use `program` for address-to-interface lookups
    pub fn with_address_lookup(mut self, program: impl Into<PathBuf>) -> Self {
        self.address_lookup = Some(program.into());
        self
    }

    /// Fix the hostname instead of asking the kernel
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// All interfaces carrying an IPv4 address
    pub async fn list_interfaces(&self) -> Result<Vec<NetworkInterface>> {
        let command = ["ip", "-j", "-4", "addr", "show"].map(String::from);
        let output = self.runner.run_checked(&command).await?;
        parse_ip_addr_json(&output.stdout)
    }

    /// First interface not bound to a loopback address
    pub async fn resolve_interface(&self) -> Result<NetworkInterface> {
        let interfaces = self.list_interfaces().await?;
        debug!("Interfaces: {:?}", interfaces);

        interfaces
            .into_iter()
            .find(|iface| !iface.address.is_loopback())
            .ok_or_else(|| IdentityError::NotFound.into())
    }

    /// This node's own address
    pub async fn resolve_self_address(&self) -> Result<Ipv4Addr> {
        match self.self_address {
            SelfAddress::Static(address) => Ok(address),
            SelfAddress::Discover => Ok(self.resolve_interface().await?.address),
        }
    }

    /// The shared virtual address
    pub fn resolve_floating_address(&self) -> Ipv4Addr {
        self.floating_ip
    }

    /// Name of the interface owning `address`
    pub async fn interface_for_address(&self, address: Ipv4Addr) -> Result<String> {
        let lookup_error = |reason: String| IdentityError::Lookup {
            address: address.to_string(),
            reason,
        };

        let program = self
            .address_lookup
            .as_deref()
            .ok_or_else(|| lookup_error("no address lookup program configured".to_string()))?;

        let command = vec![program.to_string_lossy().into_owned(), address.to_string()];
        let output = self
            .runner
            .run_checked(&command)
            .await
            .map_err(|e| lookup_error(e.to_string()))?;

        let name = output.stdout.lines().next().unwrap_or_default().trim();
        if name.is_empty() {
            return Err(lookup_error("lookup produced no output".to_string()).into());
        }

        debug!("Address {} belongs to {}", address, name);
        Ok(name.to_string())
    }

    /// Interface the provisioners configure
    ///
    /// With a lookup program configured this is the interface owning the
    /// node's own address; otherwise the first non-loopback interface.
    pub async fn node_interface(&self) -> Result<NetworkInterface> {
        if self.address_lookup.is_some() {
            let address = self.resolve_self_address().await?;
            let name = self.interface_for_address(address).await?;
            return Ok(NetworkInterface::new(name, address));
        }

        self.resolve_interface().await
    }

    /// Hostname of this node
    pub async fn hostname(&self) -> Result<String> {
        if let Some(hostname) = &self.hostname {
            return Ok(hostname.clone());
        }

        match read_kernel_hostname(Path::new(KERNEL_HOSTNAME)).await {
            Some(hostname) => return Ok(hostname),
            None => debug!("Kernel hostname unavailable, asking hostname(1)"),
        }

        let output = self
            .runner
            .run_checked(&["hostname".to_string()])
            .await
            .map_err(|e| IdentityError::Hostname {
                reason: e.to_string(),
            })?;

        let hostname = output.stdout.trim();
        if hostname.is_empty() {
            return Err(IdentityError::Hostname {
                reason: "empty hostname".to_string(),
            }
            .into());
        }
        Ok(hostname.to_string())
    }

    /// Assign `address/prefix_len` to `interface` and bring it up
    pub async fn configure_interface_address(
        &self,
        interface: &str,
        address: Ipv4Addr,
        prefix_len: u8,
    ) -> Result<()> {
        info!(
            "Configuring {}/{} on interface {}",
            address, prefix_len, interface
        );

        let assign = vec![
            "ip".to_string(),
            "addr".to_string(),
            "replace".to_string(),
            format!("{}/{}", address, prefix_len),
            "dev".to_string(),
            interface.to_string(),
        ];
        self.runner.run_checked(&assign).await?;

        let up = ["ip", "link", "set", interface, "up"].map(String::from);
        self.runner.run_checked(&up).await?;

        Ok(())
    }
}

async fn read_kernel_hostname(path: &Path) -> Option<String> {
    match fs::read_to_string(path).await {
        Ok(content) if !content.trim().is_empty() => Some(content.trim().to_string()),
        Ok(_) => None,
        Err(e) => {
            warn!("Failed to read {:?}: {}", path, e);
            None
        }
    }
}
