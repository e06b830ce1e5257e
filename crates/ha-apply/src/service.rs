//! Daemon control

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};

use hapair_config::ServiceManagerKind;
use hapair_core::error::ServiceError;

use crate::command::CommandRunner;

/// Restart and presence checks for system daemons
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ServiceControl: Send + Sync {
    /// Fail with [`ServiceError::NotInstalled`] unless `service` can be controlled
    async fn ensure_installed(&self, service: &str) -> Result<(), ServiceError>;

    /// Restart `service`
    async fn restart(&self, service: &str) -> Result<(), ServiceError>;
}

/// Controls daemons through init scripts or systemd
pub struct ServiceController {
    runner: Arc<dyn CommandRunner>,
    manager: ServiceManagerKind,
}

impl ServiceController {
    /// Create new service controller
    pub fn new(runner: Arc<dyn CommandRunner>, manager: ServiceManagerKind) -> Self {
        Self { runner, manager }
    }

    /// Control script or unit name for `service`
    pub fn control_path(&self, service: &str) -> PathBuf {
        match &self.manager {
            ServiceManagerKind::InitScript { dir } => dir.join(service),
            ServiceManagerKind::Systemd => PathBuf::from(format!("{}.service", service)),
        }
    }

    /// Command line performing `action` on `service`
    pub fn control_command(&self, service: &str, action: &str) -> Vec<String> {
        match &self.manager {
            ServiceManagerKind::InitScript { .. } => vec![
                self.control_path(service).to_string_lossy().into_owned(),
                action.to_string(),
            ],
            ServiceManagerKind::Systemd => vec![
                "systemctl".to_string(),
                action.to_string(),
                service.to_string(),
            ],
        }
    }
}

#[async_trait]
impl ServiceControl for ServiceController {
    async fn ensure_installed(&self, service: &str) -> Result<(), ServiceError> {
        let path = self.control_path(service);

        let installed = match &self.manager {
            ServiceManagerKind::InitScript { .. } => path.exists(),
            ServiceManagerKind::Systemd => {
                let command = vec![
                    "systemctl".to_string(),
                    "cat".to_string(),
                    path.to_string_lossy().into_owned(),
                ];
                self.runner.run_checked(&command).await.is_ok()
            }
        };

        debug!("Service {} installed: {}", service, installed);

        if installed {
            Ok(())
        } else {
            Err(ServiceError::NotInstalled {
                service: service.to_string(),
                path,
            })
        }
    }

    async fn restart(&self, service: &str) -> Result<(), ServiceError> {
        info!("Restarting {}", service);

        let command = self.control_command(service, "restart");
        self.runner
            .run_checked(&command)
            .await
            .map_err(|source| ServiceError::Restart {
                service: service.to_string(),
                source,
            })?;

        info!("Restarted {}", service);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingRunner;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_script_restart() {
        let runner = Arc::new(RecordingRunner::new());
        let controller = ServiceController::new(
            runner.clone(),
            ServiceManagerKind::InitScript {
                dir: PathBuf::from("/etc/init.d"),
            },
        );

        controller.restart("haproxy").await.unwrap();
        assert_eq!(runner.executed(), vec!["/etc/init.d/haproxy restart"]);
    }

    #[tokio::test]
    async fn test_systemd_restart_failure() {
        let runner = Arc::new(RecordingRunner::new().fail_on("systemctl restart keepalived"));
        let controller = ServiceController::new(runner.clone(), ServiceManagerKind::Systemd);

        let err = controller.restart("keepalived").await.unwrap_err();
        assert!(matches!(err, ServiceError::Restart { ref service, .. } if service == "keepalived"));
        assert_eq!(runner.executed(), vec!["systemctl restart keepalived"]);
    }

    #[tokio::test]
    async fn test_init_script_presence() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("keepalived"), "#!/bin/sh\n").unwrap();

        let controller = ServiceController::new(
            Arc::new(RecordingRunner::new()),
            ServiceManagerKind::InitScript {
                dir: temp_dir.path().to_path_buf(),
            },
        );

        assert!(controller.ensure_installed("keepalived").await.is_ok());
        match controller.ensure_installed("haproxy").await {
            Err(ServiceError::NotInstalled { path, .. }) => {
                assert_eq!(path, temp_dir.path().join("haproxy"))
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_systemd_presence_uses_unit_lookup() {
        let runner = Arc::new(RecordingRunner::new().fail_on("systemctl cat haproxy.service"));
        let controller = ServiceController::new(runner.clone(), ServiceManagerKind::Systemd);

        assert!(controller.ensure_installed("keepalived").await.is_ok());
        assert!(controller.ensure_installed("haproxy").await.is_err());
        assert_eq!(
            runner.executed(),
            vec![
                "systemctl cat keepalived.service",
                "systemctl cat haproxy.service"
            ]
        );
    }
}
