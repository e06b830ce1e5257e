//! Interface command

use std::net::Ipv4Addr;
use std::sync::Arc;

use anyhow::{Context, Result};
use hapair_apply::NetworkIdentityResolver;
use serde::Serialize;

use super::print_json;
use crate::context::AppContext;

/// Address assignment performed by the interface command
#[derive(Debug, Clone, Serialize)]
pub struct InterfaceAssignment {
    pub interface: String,
    pub address: Ipv4Addr,
    pub prefix_len: u8,
}

/// Interface command implementation
pub struct InterfaceCommand {
    context: Arc<AppContext>,
    identity: NetworkIdentityResolver,
}

impl InterfaceCommand {
    /// Create new interface command
    pub fn new(context: Arc<AppContext>) -> Self {
        let identity = NetworkIdentityResolver::from_config(context.runner.clone(), &context.config);
        Self { context, identity }
    }

    /// Assign the node address to its interface and bring the link up
    ///
    /// `interface` skips discovery.
    pub async fn execute(&self, interface: Option<&str>, json: bool) -> Result<InterfaceAssignment> {
        let address = self
            .identity
            .resolve_self_address()
            .await
            .context("Failed to resolve the node address")?;

        let interface = match interface {
            Some(name) => name.to_string(),
            None => {
                self.identity
                    .node_interface()
                    .await
                    .context("No usable network interface")?
                    .name
            }
        };

        let prefix_len = self.context.config.prefix_len;
        self.identity
            .configure_interface_address(&interface, address, prefix_len)
            .await
            .with_context(|| format!("Failed to configure interface {}", interface))?;

        let assignment = InterfaceAssignment {
            interface,
            address,
            prefix_len,
        };

        if json {
            print_json(&assignment)?;
        } else {
            println!(
                "✓ {}/{} configured on {}",
                assignment.address, assignment.prefix_len, assignment.interface
            );
        }

        Ok(assignment)
    }
}
