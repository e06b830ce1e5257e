//! hapair CLI
//!
//! Provisions one node of an active/passive load-balancer pair: the
//! load-balancer backend pool, the VRRP failover daemon and the node's
//! interface address.

pub mod commands;
pub mod context;

#[cfg(test)]
mod tests;
