//! Load-balancer command

use std::sync::Arc;

use anyhow::{Context, Result};
use hapair_apply::{LoadBalancerProvisioner, LoadBalancerReport};
use hapair_core::NodeRole;

use super::{print_json, print_results};
use crate::context::AppContext;

/// Load-balancer command implementation
pub struct LoadBalancerCommand {
    context: Arc<AppContext>,
}

impl LoadBalancerCommand {
    /// Create new load-balancer command
    pub fn new(context: Arc<AppContext>) -> Self {
        Self { context }
    }

    /// Regenerate the load-balancer configuration and reload it
    pub async fn execute(&self, json: bool) -> Result<LoadBalancerReport> {
        let provisioner = LoadBalancerProvisioner::new(
            self.context.config.clone(),
            self.context.runner.clone(),
            self.context.services.clone(),
        )
        .context("Invalid load-balancer settings")?;

        let report = provisioner
            .provision()
            .await
            .context("Load-balancer provisioning failed")?;

        if json {
            print_json(&report)?;
        } else {
            self.print_report(&report);
        }

        Ok(report)
    }

    fn print_report(&self, report: &LoadBalancerReport) {
        let role = match report.role {
            NodeRole::AppServer => "app server",
            NodeRole::LoadBalancerOnly => "load balancer only",
        };
        println!("Host {} ({})", report.hostname, role);

        if let Some(interface) = &report.interface {
            println!("Interface: {} ({})", interface.name, interface.address);
        }
        print_results("Backends launched", &report.launched);
        print_results("Firewall rules", &report.firewall);

        if let Some(backup) = &report.backup {
            println!(
                "Backup: {} ({} bytes)",
                backup.backup_path.display(),
                backup.size
            );
        }
        println!(
            "✓ {} backend servers written to {}",
            report.blocks_appended,
            self.context.config.load_balancer.config.display()
        );

        if report.reloaded {
            println!("✓ {} restarted", self.context.config.load_balancer.service);
        } else {
            println!(
                "✗ {} restart failed, check the logs",
                self.context.config.load_balancer.service
            );
        }
    }
}
