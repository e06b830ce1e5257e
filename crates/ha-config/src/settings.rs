//! Provisioning settings
//!
//! Every path, address and pattern the provisioners use is carried by
//! [`HaConfig`]. Defaults only apply here, at the outermost layer; the
//! provisioners never reach for globals.

use std::fmt;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use hapair_core::error::ConfigError;
use hapair_core::{BackendTarget, ConfigFile};

/// Default location of the settings file
pub const DEFAULT_CONFIG_PATH: &str = "/etc/hapair/hapair.toml";

/// Prefix for environment overrides, e.g. `HAPAIR_FLOATING_IP`
pub const ENV_PREFIX: &str = "HAPAIR";

/// How the node learns its own address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SelfAddress {
    /// Operator-supplied address
    Static(Ipv4Addr),
    /// Address of the first non-loopback interface
    Discover,
}

impl Default for SelfAddress {
    fn default() -> Self {
        SelfAddress::Static(Ipv4Addr::new(192, 168, 122, 221))
    }
}

impl fmt::Display for SelfAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelfAddress::Static(addr) => write!(f, "{}", addr),
            SelfAddress::Discover => write!(f, "discover"),
        }
    }
}

impl FromStr for SelfAddress {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("discover") {
            return Ok(SelfAddress::Discover);
        }

        s.parse()
            .map(SelfAddress::Static)
            .map_err(|_| ConfigError::InvalidValue {
                field: "self_address".to_string(),
                value: s.to_string(),
            })
    }
}

impl TryFrom<String> for SelfAddress {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SelfAddress> for String {
    fn from(value: SelfAddress) -> Self {
        value.to_string()
    }
}

/// Facility used to restart daemons
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ServiceManagerKind {
    /// SysV scripts invoked as `<dir>/<service> restart`
    InitScript { dir: PathBuf },
    /// `systemctl restart <service>`
    Systemd,
}

impl Default for ServiceManagerKind {
    fn default() -> Self {
        ServiceManagerKind::InitScript {
            dir: PathBuf::from("/etc/init.d"),
        }
    }
}

/// Template locations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplatePaths {
    /// Base directory for relative template paths
    pub dir: PathBuf,
    /// One backend server line, variables `host` and `port`
    pub backend_server: PathBuf,
    /// Static load-balancer configuration the backend lines are appended to
    pub load_balancer: PathBuf,
    /// Working copy of `load_balancer` assembled before commit
    pub load_balancer_staging: PathBuf,
    /// Firewall commands run on app servers, variable `interface`
    pub load_balancer_commands: PathBuf,
    /// Failover daemon configuration, variables `interface` and `floating_ip`
    pub failover: PathBuf,
    /// Firewall commands run before configuring the failover daemon
    pub failover_commands: PathBuf,
}

impl Default for TemplatePaths {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("/usr/share/hapair/templates"),
            backend_server: PathBuf::from("backend_server"),
            load_balancer: PathBuf::from("haproxy.cfg"),
            load_balancer_staging: PathBuf::from("haproxy.cfg.u"),
            load_balancer_commands: PathBuf::from("haproxy_commands"),
            failover: PathBuf::from("keepalived.conf"),
            failover_commands: PathBuf::from("keepalived_commands"),
        }
    }
}

impl TemplatePaths {
    /// Resolve a template path against `dir`
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.dir.join(path)
        }
    }
}

/// A daemon and the configuration file it reads
///
/// A `[load_balancer]` or `[failover]` table replaces the built-in default
/// as a whole, so `service` and `config` must both be given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonSettings {
    /// Service name passed to the service manager
    pub service: String,
    /// Live configuration file
    pub config: PathBuf,
    /// Backup of the live file; defaults to `<config>.bk`
    #[serde(default)]
    pub backup: Option<PathBuf>,
}

impl DaemonSettings {
    pub fn new(service: &str, config: &str) -> Self {
        Self {
            service: service.to_string(),
            config: PathBuf::from(config),
            backup: None,
        }
    }

    /// Live and backup paths of the managed file
    pub fn config_file(&self) -> ConfigFile {
        let mut file = ConfigFile::with_sibling_backup(&self.config);
        if let Some(backup) = &self.backup {
            file.backup = backup.clone();
        }
        file
    }
}

/// Complete provisioning configuration for one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HaConfig {
    /// Hostnames ending in this suffix are app servers
    pub role_suffix: String,
    /// Hostname override; the kernel hostname is used when unset
    pub hostname: Option<String>,
    /// This node's address
    pub self_address: SelfAddress,
    /// Prefix length used when assigning `self_address` to the interface
    pub prefix_len: u8,
    /// Shared virtual address
    pub floating_ip: Ipv4Addr,
    /// Executable mapping an IPv4 address to its interface name
    pub address_lookup: Option<PathBuf>,
    /// Load-balancer pool, rendered in this order
    pub backends: Vec<BackendTarget>,
    /// Backend processes launched in the background on app servers
    pub backend_commands: Vec<String>,
    pub templates: TemplatePaths,
    pub load_balancer: DaemonSettings,
    pub failover: DaemonSettings,
    pub service_manager: ServiceManagerKind,
}

impl Default for HaConfig {
    fn default() -> Self {
        Self {
            role_suffix: "-lb1".to_string(),
            hostname: None,
            self_address: SelfAddress::default(),
            prefix_len: 24,
            floating_ip: Ipv4Addr::new(192, 168, 122, 220),
            address_lookup: None,
            backends: vec![
                BackendTarget::new(Ipv4Addr::new(192, 168, 122, 221), 8000),
                BackendTarget::new(Ipv4Addr::new(192, 168, 122, 221), 8001),
            ],
            backend_commands: Vec::new(),
            templates: TemplatePaths::default(),
            load_balancer: DaemonSettings::new("haproxy", "/etc/haproxy/haproxy.cfg"),
            failover: DaemonSettings::new("keepalived", "/etc/keepalived/keepalived.conf"),
            service_manager: ServiceManagerKind::default(),
        }
    }
}

impl HaConfig {
    /// Load configuration from a TOML file layered under `HAPAIR_*`
    /// environment variables
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!("Loading configuration from {:?}", path);

        let settings = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Toml))
            .add_source(Self::environment())
            .build()
            .map_err(load_error)?;

        let config: HaConfig = settings.try_deserialize().map_err(load_error)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if given, else from the default location when it
    /// exists, else from defaults; environment overrides always apply
    pub fn load_with_defaults(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load_from_file(path);
        }

        let default_path = Path::new(DEFAULT_CONFIG_PATH);
        if default_path.exists() {
            return Self::load_from_file(default_path);
        }

        let settings = config::Config::builder()
            .add_source(Self::environment())
            .build()
            .map_err(load_error)?;

        let config: HaConfig = settings.try_deserialize().map_err(load_error)?;
        config.validate()?;
        Ok(config)
    }

    fn environment() -> config::Environment {
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("backends")
            .with_list_parse_key("backend_commands")
            .try_parsing(true)
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.role_suffix.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "role_suffix".to_string(),
            });
        }

        if self.prefix_len > 32 {
            return Err(ConfigError::InvalidValue {
                field: "prefix_len".to_string(),
                value: self.prefix_len.to_string(),
            });
        }

        if self.load_balancer.service.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "load_balancer.service".to_string(),
            });
        }

        if self.failover.service.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "failover.service".to_string(),
            });
        }

        if self.backends.is_empty() {
            warn!("No backends configured; load-balancer provisioning will refuse to run");
        }

        Ok(())
    }

    /// Resolved path of a template
    pub fn template(&self, path: &Path) -> PathBuf {
        self.templates.resolve(path)
    }

    /// Live, backup and staging paths of the load-balancer configuration
    pub fn load_balancer_file(&self) -> ConfigFile {
        self.load_balancer
            .config_file()
            .with_staging(self.template(&self.templates.load_balancer_staging))
    }
}

fn load_error(err: config::ConfigError) -> ConfigError {
    ConfigError::Load {
        message: err.to_string(),
    }
}
