//! Failover daemon provisioning
//!
//! Renders the failover daemon configuration for the node interface and
//! floating address and writes it straight to the live path. Unlike the
//! load-balancer path, a failed backup does not stop the write: the node
//! may never have had a configuration.

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;

use log::{error, info, warn};
use serde::Serialize;

use hapair_config::{variables, HaConfig, TemplateRenderer};
use hapair_core::{CommandResult, NetworkInterface, Result};

use crate::command::CommandRunner;
use crate::files::{BackupFile, ConfigFileManager, ConfigStore};
use crate::firewall::FirewallRules;
use crate::identity::NetworkIdentityResolver;
use crate::service::ServiceControl;

/// Outcome of a failover provisioning run
#[derive(Debug, Clone, Serialize)]
pub struct FailoverReport {
    pub interface: NetworkInterface,
    pub self_address: Ipv4Addr,
    pub floating_ip: Ipv4Addr,
    pub firewall: Vec<CommandResult>,
    /// Backup of the previous configuration, if one existed and was copied
    pub backup: Option<BackupFile>,
    /// Live path the configuration was written to
    pub written: PathBuf,
    /// Whether the daemon restart succeeded
    pub reloaded: bool,
}

/// Configures and reloads the failover daemon
pub struct FailoverProvisioner {
    config: HaConfig,
    services: Arc<dyn ServiceControl>,
    identity: NetworkIdentityResolver,
    firewall: FirewallRules,
    files: ConfigFileManager,
    renderer: TemplateRenderer,
}

impl FailoverProvisioner {
    /// Create new failover provisioner
    pub fn new(
        config: HaConfig,
        runner: Arc<dyn CommandRunner>,
        services: Arc<dyn ServiceControl>,
    ) -> Self {
        let identity = NetworkIdentityResolver::from_config(runner.clone(), &config);
        Self::with_identity(config, runner, services, identity)
    }

    /// Create with a custom identity resolver
    pub fn with_identity(
        config: HaConfig,
        runner: Arc<dyn CommandRunner>,
        services: Arc<dyn ServiceControl>,
        identity: NetworkIdentityResolver,
    ) -> Self {
        Self {
            config,
            services,
            identity,
            firewall: FirewallRules::new(runner),
            files: ConfigFileManager::new(),
            renderer: TemplateRenderer::new(),
        }
    }

    /// Run the full provisioning sequence
    pub async fn provision(&self) -> Result<FailoverReport> {
        let service = &self.config.failover.service;
        self.services.ensure_installed(service).await?;

        let self_address = self.identity.resolve_self_address().await?;
        let interface = self.identity.node_interface().await?;
        info!(
            "Configuring {} on {} ({})",
            service, interface.name, self_address
        );

        let commands = self.config.template(&self.config.templates.failover_commands);
        let firewall = self.firewall.apply(&commands, &interface.name).await?;

        let floating_ip = self.identity.resolve_floating_address();
        let template = self.config.template(&self.config.templates.failover);
        let floating = floating_ip.to_string();
        let rendered = self
            .renderer
            .render(
                &template,
                &variables([
                    ("interface", interface.name.as_str()),
                    ("floating_ip", floating.as_str()),
                ]),
            )
            .await?;

        let file = self.config.failover.config_file();
        let backup = if self.files.exists(&file.live) {
            match self.files.backup(&file.live, &file.backup).await {
                Ok(backup) => Some(backup),
                Err(e) => {
                    warn!("Continuing without backup of {:?}: {}", file.live, e);
                    None
                }
            }
        } else {
            info!("No existing {:?}; writing a fresh configuration", file.live);
            None
        };

        self.files.write(&file.live, &rendered).await?;

        let reloaded = match self.services.restart(service).await {
            Ok(()) => true,
            Err(e) => {
                error!(
                    "{} restart failed; the floating address may not be served: {}",
                    service, e
                );
                false
            }
        };

        Ok(FailoverReport {
            interface,
            self_address,
            floating_ip,
            firewall,
            backup,
            written: file.live,
            reloaded,
        })
    }
}
