use api::{Activate, ActivationOutcome, ActivationReport};
use async_trait::async_trait;
use std::path::PathBuf;
use system::ServiceManager;
use tokio::fs;

/// Copies the rendered config over the live one and restarts the load
/// balancer. Each call is a full overwrite and restart; nothing is retried.
pub struct ConfigActivator {
    rendered_config: PathBuf,
    install_config: PathBuf,
    unit: String,
    service: ServiceManager,
}

impl ConfigActivator {
    pub fn new(
        rendered_config: impl Into<PathBuf>,
        install_config: impl Into<PathBuf>,
        unit: impl Into<String>,
        service: ServiceManager,
    ) -> Self {
        Self {
            rendered_config: rendered_config.into(),
            install_config: install_config.into(),
            unit: unit.into(),
            service,
        }
    }
}

#[async_trait]
impl Activate for ConfigActivator {
    async fn activate(&self) -> ActivationReport {
        if let Err(e) = fs::copy(&self.rendered_config, &self.install_config).await {
            tracing::error!(
                "Failed to import config file {:?} to {:?}: {}",
                self.rendered_config,
                self.install_config,
                e
            );
            return ActivationReport::now(ActivationOutcome::CopyFailed(e.to_string()));
        }

        match self.service.restart(&self.unit).await {
            Ok(output) => {
                tracing::info!("Restarted {}: {}", self.unit, output.combined());
                ActivationReport::now(ActivationOutcome::Activated)
            }
            Err(e) => {
                tracing::error!("Failed to restart {}: {}", self.unit, e);
                ActivationReport::now(ActivationOutcome::RestartFailed(e.to_string()))
            }
        }
    }
}
