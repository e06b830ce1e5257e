//! Show-config command

use std::sync::Arc;

use anyhow::Result;

use super::print_json;
use crate::context::AppContext;

/// Prints the effective configuration
pub struct ShowConfigCommand {
    context: Arc<AppContext>,
}

impl ShowConfigCommand {
    pub fn new(context: Arc<AppContext>) -> Self {
        Self { context }
    }

    pub fn execute(&self) -> Result<()> {
        print_json(&self.context.config)
    }
}
