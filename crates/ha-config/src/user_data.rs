//! Heat user-data property files
//!
//! The orchestration template hands each node a single-line property file
//! of the form `key=value;key=value`. Mounting the config drive is left to
//! the caller; this module only parses the file and folds recognised keys
//! into an [`HaConfig`].

use std::path::Path;

use indexmap::IndexMap;
use log::{debug, info};
use tokio::fs;

use hapair_core::error::ConfigError;
use hapair_core::{BackendTarget, Result};

use crate::settings::{HaConfig, SelfAddress};

/// Properties in file order
pub type UserProperties = IndexMap<String, String>;

/// Parse `key=value;key=value` content
///
/// Empty entries (a trailing `;` or newline) are skipped. Values may
/// contain `=`; only the first one separates key from value.
pub fn parse_properties(content: &str) -> std::result::Result<UserProperties, ConfigError> {
    let mut properties = UserProperties::new();

    for (index, entry) in content.split(';').enumerate() {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }

        let (key, value) = entry.split_once('=').ok_or_else(|| ConfigError::Parse {
            entry: index + 1,
            message: format!("expected key=value, got '{}'", entry),
        })?;

        let key = key.trim();
        if key.is_empty() {
            return Err(ConfigError::Parse {
                entry: index + 1,
                message: "empty key".to_string(),
            });
        }

        properties.insert(key.to_string(), value.trim().to_string());
    }

    Ok(properties)
}

/// Read and parse a property file
pub async fn load_properties(path: &Path) -> Result<UserProperties> {
    let content = fs::read_to_string(path).await?;
    let properties = parse_properties(&content)?;
    info!("Loaded {} user-data properties from {:?}", properties.len(), path);
    Ok(properties)
}

/// Override configuration values with recognised properties
///
/// The result is validated again, so user data cannot produce a
/// configuration the settings file would have been rejected for.
///
/// Recognised keys: `floating_ip`, `self_ip`, `role_suffix`, `hostname`
/// and `backends` (comma-separated `host:port`).
pub fn apply_properties(
    config: &mut HaConfig,
    properties: &UserProperties,
) -> std::result::Result<(), ConfigError> {
    for (key, value) in properties {
        match key.as_str() {
            "floating_ip" => {
                config.floating_ip = value.parse().map_err(|_| ConfigError::InvalidValue {
                    field: key.clone(),
                    value: value.clone(),
                })?;
            }
            "self_ip" => {
                config.self_address = value.parse::<SelfAddress>()?;
            }
            "role_suffix" => {
                config.role_suffix = value.clone();
            }
            "hostname" => {
                config.hostname = Some(value.clone());
            }
            "backends" => {
                config.backends = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::parse::<BackendTarget>)
                    .collect::<std::result::Result<Vec<_>, _>>()?;
            }
            other => debug!("Ignoring unrecognised user-data property '{}'", other),
        }
    }

    config.validate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_parse_properties() {
        let props =
            parse_properties("floating_ip=10.0.0.100;role_suffix=-lb1;extra=a=b;\n").unwrap();
        assert_eq!(props.len(), 3);
        assert_eq!(props["floating_ip"], "10.0.0.100");
        assert_eq!(props["extra"], "a=b");
        assert_eq!(props.get_index(1).map(|(k, _)| k.as_str()), Some("role_suffix"));
    }

    #[test]
    fn test_parse_rejects_entry_without_separator() {
        match parse_properties("floating_ip=10.0.0.100;garbage") {
            Err(ConfigError::Parse { entry, .. }) => assert_eq!(entry, 2),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_apply_properties() {
        let mut config = HaConfig::default();
        let props = parse_properties(
            "floating_ip=10.0.0.100;self_ip=10.0.0.2;backends=10.0.0.5:8000, 10.0.0.6:9000;color=blue",
        )
        .unwrap();

        apply_properties(&mut config, &props).unwrap();

        assert_eq!(config.floating_ip, Ipv4Addr::new(10, 0, 0, 100));
        assert_eq!(
            config.self_address,
            SelfAddress::Static(Ipv4Addr::new(10, 0, 0, 2))
        );
        assert_eq!(config.backends.len(), 2);
        assert_eq!(config.backends[1].port, 9000);
    }

    #[test]
    fn test_apply_rejects_bad_address() {
        let mut config = HaConfig::default();
        let props = parse_properties("floating_ip=not-an-ip").unwrap();
        assert!(apply_properties(&mut config, &props).is_err());
        assert_eq!(config.floating_ip, Ipv4Addr::new(192, 168, 122, 220));
    }

    #[test]
    fn test_apply_rejects_empty_role_suffix() {
        let mut config = HaConfig::default();
        let props = parse_properties("role_suffix=;floating_ip=10.0.0.1").unwrap();

        match apply_properties(&mut config, &props) {
            Err(ConfigError::MissingField { field }) => assert_eq!(field, "role_suffix"),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
