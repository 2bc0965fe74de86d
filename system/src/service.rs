use std::sync::Arc;

use crate::{CommandOutput, CommandRunner, CommandSpec, Result};

/// Talks to the host's service manager.
#[derive(Clone)]
pub struct ServiceManager {
    runner: Arc<dyn CommandRunner>,
    systemctl: String,
}

impl ServiceManager {
    pub fn new(runner: Arc<dyn CommandRunner>, systemctl: impl Into<String>) -> Self {
        Self {
            runner,
            systemctl: systemctl.into(),
        }
    }

    pub fn restart_command(&self, unit: &str) -> CommandSpec {
        CommandSpec::new(&self.systemctl).args(["restart", unit])
    }

    pub async fn restart(&self, unit: &str) -> Result<CommandOutput> {
        tracing::info!("Restarting service {}", unit);
        self.runner.run_checked(&self.restart_command(unit)).await
    }
}
