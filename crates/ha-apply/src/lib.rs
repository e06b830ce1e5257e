//! hapair apply
//!
//! Provisioning of a two-node load-balancer/failover pair: interface
//! discovery, firewall rules, configuration file handling and daemon
//! reloads.

pub mod command;
pub mod failover;
pub mod files;
pub mod firewall;
pub mod identity;
pub mod loadbalancer;
pub mod service;

#[cfg(test)]
mod testing;

pub use command::{CommandOutput, CommandRunner, SystemCommandRunner};
pub use failover::{FailoverProvisioner, FailoverReport};
pub use files::{BackupFile, ConfigFileManager, ConfigStore};
pub use firewall::FirewallRules;
pub use identity::{NetworkIdentityResolver, RoleMatcher};
pub use loadbalancer::{LoadBalancerProvisioner, LoadBalancerReport};
pub use service::{ServiceControl, ServiceController};
