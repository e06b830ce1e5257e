//! Core provisioning types and data structures

use std::fmt;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Named values substituted into a template, in insertion order
pub type TemplateVariables = IndexMap<String, String>;

/// A non-loopback interface and the IPv4 address bound to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub name: String,
    pub address: Ipv4Addr,
}

impl NetworkInterface {
    pub fn new(name: impl Into<String>, address: Ipv4Addr) -> Self {
        Self {
            name: name.into(),
            address,
        }
    }
}

/// One member of the load balancer's backend pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BackendTarget {
    pub host: Ipv4Addr,
    pub port: u16,
}

impl BackendTarget {
    pub fn new(host: Ipv4Addr, port: u16) -> Self {
        Self { host, port }
    }

    /// Variables for the backend-server template
    pub fn variables(&self) -> TemplateVariables {
        let mut vars = TemplateVariables::new();
        vars.insert("host".to_string(), self.host.to_string());
        vars.insert("port".to_string(), self.port.to_string());
        vars
    }
}

impl fmt::Display for BackendTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for BackendTarget {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidValue {
            field: "backend".to_string(),
            value: s.to_string(),
        };

        let (host, port) = s.trim().rsplit_once(':').ok_or_else(invalid)?;
        let host = host.trim().parse::<Ipv4Addr>().map_err(|_| invalid())?;
        let port = port.trim().parse::<u16>().map_err(|_| invalid())?;

        Ok(Self { host, port })
    }
}

impl TryFrom<String> for BackendTarget {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BackendTarget> for String {
    fn from(target: BackendTarget) -> Self {
        target.to_string()
    }
}

/// Role a node plays in the pair, derived from its hostname
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeRole {
    /// Hosts backend processes and needs the VRRP firewall rules
    AppServer,
    /// Only runs the load balancer
    LoadBalancerOnly,
}

impl NodeRole {
    pub fn is_app_server(self) -> bool {
        matches!(self, NodeRole::AppServer)
    }
}

/// Locations of one managed configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Path the daemon reads
    pub live: PathBuf,
    /// Copy of the previous live content
    pub backup: PathBuf,
    /// Working copy assembled before commit, if the file is staged
    #[serde(default)]
    pub staging: Option<PathBuf>,
}

impl ConfigFile {
    /// Live path with a sibling `.bk` backup
    pub fn with_sibling_backup(live: impl Into<PathBuf>) -> Self {
        let live = live.into();
        let mut backup = live.clone().into_os_string();
        backup.push(".bk");

        Self {
            live,
            backup: PathBuf::from(backup),
            staging: None,
        }
    }

    pub fn with_staging(mut self, staging: impl Into<PathBuf>) -> Self {
        self.staging = Some(staging.into());
        self
    }
}

/// Outcome of one executed command line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    /// Command tokens, program first
    pub command: Vec<String>,
    pub succeeded: bool,
    pub exit_code: Option<i32>,
    pub error: Option<String>,
}

impl CommandResult {
    pub fn success(command: Vec<String>, exit_code: Option<i32>) -> Self {
        Self {
            command,
            succeeded: true,
            exit_code,
            error: None,
        }
    }

    pub fn failure(command: Vec<String>, exit_code: Option<i32>, error: String) -> Self {
        Self {
            command,
            succeeded: false,
            exit_code,
            error: Some(error),
        }
    }

    /// Command tokens joined for display
    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }
}

/// Number of failed results in a best-effort run
pub fn failure_count(results: &[CommandResult]) -> usize {
    results.iter().filter(|r| !r.succeeded).count()
}
