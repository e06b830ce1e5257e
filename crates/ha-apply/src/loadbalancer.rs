//! Load-balancer provisioning
//!
//! Regenerates the load balancer's backend pool from templates and reloads
//! the daemon. The live configuration is always backed up first; a failed
//! backup, stage, render or commit aborts the run before the daemon is
//! touched. Backend launches, firewall rules and the reload itself are
//! best-effort.

use std::sync::Arc;

use log::{error, info, warn};
use serde::Serialize;

use hapair_config::{HaConfig, TemplateRenderer};
use hapair_core::error::ConfigError;
use hapair_core::{CommandResult, NetworkInterface, NodeRole, Result};

use crate::command::{tokenize, CommandRunner};
use crate::files::{BackupFile, ConfigFileManager, ConfigStore};
use crate::firewall::FirewallRules;
use crate::identity::{NetworkIdentityResolver, RoleMatcher};
use crate::service::ServiceControl;

/// Indentation of server lines inside the backend section
const SERVER_INDENT: &str = "    ";

/// Outcome of a load-balancer provisioning run
#[derive(Debug, Clone, Serialize)]
pub struct LoadBalancerReport {
    pub hostname: String,
    pub role: NodeRole,
    /// Interface the firewall rules were applied to, app servers only
    pub interface: Option<NetworkInterface>,
    /// Background backend launches
    pub launched: Vec<CommandResult>,
    pub firewall: Vec<CommandResult>,
    pub backup: Option<BackupFile>,
    /// Server blocks appended to the staged configuration
    pub blocks_appended: usize,
    /// Whether the daemon restart succeeded
    pub reloaded: bool,
}

impl LoadBalancerReport {
    fn new(hostname: String, role: NodeRole) -> Self {
        Self {
            hostname,
            role,
            interface: None,
            launched: Vec::new(),
            firewall: Vec::new(),
            backup: None,
            blocks_appended: 0,
            reloaded: false,
        }
    }
}

/// Regenerates and reloads the load-balancer configuration
pub struct LoadBalancerProvisioner {
    config: HaConfig,
    runner: Arc<dyn CommandRunner>,
    services: Arc<dyn ServiceControl>,
    identity: NetworkIdentityResolver,
    roles: RoleMatcher,
    firewall: FirewallRules,
    files: Arc<dyn ConfigStore>,
    renderer: TemplateRenderer,
}

impl LoadBalancerProvisioner {
    /// Create new load-balancer provisioner
    pub fn new(
        config: HaConfig,
        runner: Arc<dyn CommandRunner>,
        services: Arc<dyn ServiceControl>,
    ) -> Result<Self> {
        let identity = NetworkIdentityResolver::from_config(runner.clone(), &config);
        Self::with_identity(config, runner, services, identity)
    }

    /// Create with a custom identity resolver
    pub fn with_identity(
        config: HaConfig,
        runner: Arc<dyn CommandRunner>,
        services: Arc<dyn ServiceControl>,
        identity: NetworkIdentityResolver,
    ) -> Result<Self> {
        let roles = RoleMatcher::new(&config.role_suffix)?;

        Ok(Self {
            firewall: FirewallRules::new(runner.clone()),
            config,
            runner,
            services,
            identity,
            roles,
            files: Arc::new(ConfigFileManager::new()),
            renderer: TemplateRenderer::new(),
        })
    }

    /// Use `files` for backup, staging and commit
    pub fn with_files(mut self, files: Arc<dyn ConfigStore>) -> Self {
        self.files = files;
        self
    }

    /// Run the full provisioning sequence
    pub async fn provision(&self) -> Result<LoadBalancerReport> {
        if self.config.backends.is_empty() {
            return Err(ConfigError::MissingField {
                field: "backends".to_string(),
            }
            .into());
        }

        let hostname = self.identity.hostname().await?;
        let role = self.roles.classify(&hostname);
        let mut report = LoadBalancerReport::new(hostname, role);

        if role.is_app_server() {
            info!("{} is an app server", report.hostname);
            report.launched = self.launch_backends().await;

            let interface = self.identity.node_interface().await?;
            let commands = self
                .config
                .template(&self.config.templates.load_balancer_commands);
            report.firewall = self.firewall.apply(&commands, &interface.name).await?;
            report.interface = Some(interface);
        } else {
            info!(
                "{} is not an app server; skipping backends and firewall rules",
                report.hostname
            );
        }

        let file = self.config.load_balancer_file();
        let staging = file
            .staging
            .as_deref()
            .ok_or_else(|| ConfigError::MissingField {
                field: "templates.load_balancer_staging".to_string(),
            })?;
        let template = self.config.template(&self.config.templates.load_balancer);
        let server_template = self.config.template(&self.config.templates.backend_server);

        let backup = self
            .files
            .backup(&file.live, &file.backup)
            .await
            .map_err(|e| {
                error!("Not touching {:?}: {}", file.live, e);
                e
            })?;
        report.backup = Some(backup.clone());

        self.files.stage(&template, staging).await?;

        for target in &self.config.backends {
            info!("Adding backend {}", target);
            let block = self
                .renderer
                .render(&server_template, &target.variables())
                .await?;
            self.files.append(staging, &server_block(&block)).await?;
            report.blocks_appended += 1;
        }

        if let Err(e) = self.files.commit(staging, &file.live).await {
            error!("Commit failed, restoring {:?}: {}", file.live, e);
            if let Err(restore_err) = self.files.restore(&backup).await {
                error!("Restore of {:?} failed: {}", file.live, restore_err);
            }
            return Err(e);
        }
        self.files.discard(staging).await;

        report.reloaded = self.reload().await;
        Ok(report)
    }

    /// Start every configured backend process without waiting for it
    async fn launch_backends(&self) -> Vec<CommandResult> {
        let mut launched = Vec::new();

        for line in &self.config.backend_commands {
            let command = tokenize(line);
            if command.is_empty() {
                continue;
            }

            let outcome = self.runner.spawn_background(&command).await;
            let result = match outcome {
                Ok(()) => CommandResult::success(command, None),
                Err(e) => {
                    warn!("Failed to start backend `{}`: {}", line, e);
                    CommandResult::failure(command, None, e.to_string())
                }
            };
            launched.push(result);
        }

        launched
    }

    async fn reload(&self) -> bool {
        let service = &self.config.load_balancer.service;
        match self.services.restart(service).await {
            Ok(()) => true,
            Err(e) => {
                error!(
                    "{} restart failed; it may be serving a stale configuration: {}",
                    service, e
                );
                false
            }
        }
    }
}

/// Indent a rendered server block and terminate it with a newline
///
/// Blank input stays empty so the append rejects it.
fn server_block(rendered: &str) -> String {
    if rendered.trim().is_empty() {
        return String::new();
    }

    let mut block = format!("{}{}", SERVER_INDENT, rendered);
    if !block.ends_with('\n') {
        block.push('\n');
    }
    block
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_block() {
        assert_eq!(
            server_block("server a 10.0.0.5:8000"),
            "    server a 10.0.0.5:8000\n"
        );
        assert_eq!(
            server_block("server a 10.0.0.5:8000\n"),
            "    server a 10.0.0.5:8000\n"
        );
        assert_eq!(server_block(" \n"), "");
    }
}
