//! Failover command

use std::sync::Arc;

use anyhow::{Context, Result};
use hapair_apply::{FailoverProvisioner, FailoverReport};

use super::{print_json, print_results};
use crate::context::AppContext;

/// Failover command implementation
pub struct FailoverCommand {
    context: Arc<AppContext>,
}

impl FailoverCommand {
    /// Create new failover command
    pub fn new(context: Arc<AppContext>) -> Self {
        Self { context }
    }

    /// Configure the failover daemon for the floating address and restart it
    pub async fn execute(&self, json: bool) -> Result<FailoverReport> {
        let provisioner = FailoverProvisioner::new(
            self.context.config.clone(),
            self.context.runner.clone(),
            self.context.services.clone(),
        );

        let report = provisioner
            .provision()
            .await
            .context("Failover provisioning failed")?;

        if json {
            print_json(&report)?;
        } else {
            self.print_report(&report);
        }

        Ok(report)
    }

    fn print_report(&self, report: &FailoverReport) {
        let service = &self.context.config.failover.service;

        println!(
            "Interface: {} (self {}, floating {})",
            report.interface.name, report.self_address, report.floating_ip
        );
        print_results("Firewall rules", &report.firewall);

        match &report.backup {
            Some(backup) => println!("Backup: {}", backup.backup_path.display()),
            None => println!("Backup: none"),
        }
        println!("✓ {} configuration written to {}", service, report.written.display());

        if report.reloaded {
            println!("✓ {} restarted", service);
        } else {
            println!("✗ {} restart failed, check the logs", service);
        }
    }
}
