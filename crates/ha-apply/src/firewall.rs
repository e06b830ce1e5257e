//! Firewall rule sets enabling VRRP between the pair

use std::path::Path;
use std::sync::Arc;

use log::{info, warn};

use hapair_config::{variables, TemplateRenderer};
use hapair_core::{failure_count, CommandResult, Result};

use crate::command::{tokenize, CommandRunner};

/// Split rendered command text into token lists
///
/// Blank lines and lines starting with `#` are dropped.
pub fn parse_command_lines(text: &str) -> Vec<Vec<String>> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(tokenize)
        .collect()
}

/// Renders a command template for an interface and runs it best-effort
pub struct FirewallRules {
    runner: Arc<dyn CommandRunner>,
    renderer: TemplateRenderer,
}

impl FirewallRules {
    /// Create new firewall rule applier
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            renderer: TemplateRenderer::new(),
        }
    }

    /// Render the command template at `path` for `interface`
    ///
    /// A missing template or an unknown placeholder is an error; the rule
    /// set is never partially applied from a broken template.
    pub async fn load(&self, path: &Path, interface: &str) -> Result<Vec<Vec<String>>> {
        let text = self
            .renderer
            .render(path, &variables([("interface", interface)]))
            .await?;
        Ok(parse_command_lines(&text))
    }

    /// Render and run every rule, continuing past individual failures
    pub async fn apply(&self, path: &Path, interface: &str) -> Result<Vec<CommandResult>> {
        let commands = self.load(path, interface).await?;
        info!(
            "Applying {} firewall rules from {:?} on {}",
            commands.len(),
            path,
            interface
        );

        let results = self.runner.run_lines(&commands).await;

        let failed = failure_count(&results);
        if failed > 0 {
            warn!(
                "{} of {} firewall rules failed on {}",
                failed,
                results.len(),
                interface
            );
        } else {
            info!("Applied {} firewall rules on {}", results.len(), interface);
        }

        Ok(results)
    }
}
