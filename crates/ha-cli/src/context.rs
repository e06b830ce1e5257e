//! Shared state for CLI commands

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, info};

use hapair_apply::{CommandRunner, ServiceControl, ServiceController, SystemCommandRunner};
use hapair_config::{apply_properties, load_properties, HaConfig};

/// Effective configuration plus the system seams the provisioners use
#[derive(Clone)]
pub struct AppContext {
    pub config: HaConfig,
    pub runner: Arc<dyn CommandRunner>,
    pub services: Arc<dyn ServiceControl>,
}

impl AppContext {
    /// Load configuration and wire the system command runner
    ///
    /// The settings file (or defaults) is read first, then the user-data
    /// property file is folded in, then `hostname` overrides both.
    pub async fn bootstrap(
        config_path: Option<&Path>,
        user_data: Option<&Path>,
        hostname: Option<String>,
    ) -> Result<Arc<Self>> {
        let config = load_config(config_path, user_data, hostname).await?;

        let runner: Arc<dyn CommandRunner> = Arc::new(SystemCommandRunner::new());
        let services: Arc<dyn ServiceControl> = Arc::new(ServiceController::new(
            runner.clone(),
            config.service_manager.clone(),
        ));

        Ok(Self::with_parts(config, runner, services))
    }

    /// Build a context from explicit parts
    pub fn with_parts(
        config: HaConfig,
        runner: Arc<dyn CommandRunner>,
        services: Arc<dyn ServiceControl>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            runner,
            services,
        })
    }
}

/// Resolve the effective configuration from every source
pub async fn load_config(
    config_path: Option<&Path>,
    user_data: Option<&Path>,
    hostname: Option<String>,
) -> Result<HaConfig> {
    let mut config = HaConfig::load_with_defaults(config_path).with_context(|| match config_path {
        Some(path) => format!("Failed to load configuration from {}", path.display()),
        None => "Failed to load configuration".to_string(),
    })?;

    if let Some(path) = user_data {
        let properties = load_properties(path)
            .await
            .with_context(|| format!("Failed to read user data {}", path.display()))?;
        apply_properties(&mut config, &properties)
            .with_context(|| format!("Invalid user data in {}", path.display()))?;
        info!("Applied user data from {}", path.display());
    }

    if let Some(hostname) = hostname {
        debug!("Hostname overridden to {}", hostname);
        config.hostname = Some(hostname);
    }

    config
        .validate()
        .context("Effective configuration is invalid")?;
    Ok(config)
}
