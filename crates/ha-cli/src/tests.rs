//! CLI command tests

#[cfg(test)]
mod tests {
    use crate::commands::{FailoverCommand, LoadBalancerCommand, ShowConfigCommand};
    use crate::context::{load_config, AppContext};
    use hapair_config::SelfAddress;
    use hapair_core::NodeRole;
    use std::fs;
    use std::net::Ipv4Addr;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    const HEADER: &str = "listen app 0.0.0.0:80\n    balance roundrobin\n";

    /// Settings file pointing every path into `dir`
    fn write_settings(dir: &Path) -> PathBuf {
        let templates = dir.join("templates");
        fs::create_dir_all(&templates).expect("Failed to create template directory");
        fs::write(templates.join("backend_server"), "server s$port $host:$port\n").unwrap();
        fs::write(templates.join("haproxy.cfg"), HEADER).unwrap();
        fs::write(templates.join("keepalived.conf"), "interface $interface\n$floating_ip\n")
            .unwrap();

        let live = dir.join("haproxy.cfg");
        fs::write(&live, HEADER).unwrap();

        let settings = dir.join("hapair.toml");
        fs::write(
            &settings,
            format!(
                r#"
floating_ip = "10.0.0.100"
backends = ["10.0.0.5:8000"]

[templates]
dir = "{templates}"

[load_balancer]
service = "haproxy"
config = "{live}"

[failover]
service = "keepalived"
config = "{failover}"

[service_manager]
kind = "init-script"
dir = "{init}"
"#,
                templates = templates.display(),
                live = live.display(),
                failover = dir.join("keepalived.conf").display(),
                init = dir.join("init.d").display(),
            ),
        )
        .unwrap();
        settings
    }

    #[tokio::test]
    async fn test_load_config_layers_user_data_and_hostname() {
        let temp_dir = TempDir::new().unwrap();
        let settings = write_settings(temp_dir.path());
        let user_data = temp_dir.path().join("user_data");
        fs::write(
            &user_data,
            "floating_ip=10.0.0.200;self_ip=10.0.0.7;backends=10.0.0.7:9000,10.0.0.8:9000;",
        )
        .unwrap();

        let config = load_config(Some(&settings), Some(&user_data), Some("web-lb1".to_string()))
            .await
            .unwrap();

        assert_eq!(config.floating_ip, Ipv4Addr::new(10, 0, 0, 200));
        assert_eq!(
            config.self_address,
            SelfAddress::Static(Ipv4Addr::new(10, 0, 0, 7))
        );
        assert_eq!(config.backends.len(), 2);
        assert_eq!(config.backends[1].to_string(), "10.0.0.8:9000");
        assert_eq!(config.hostname.as_deref(), Some("web-lb1"));
    }

    #[tokio::test]
    async fn test_load_config_rejects_bad_user_data() {
        let temp_dir = TempDir::new().unwrap();
        let settings = write_settings(temp_dir.path());
        let user_data = temp_dir.path().join("user_data");
        fs::write(&user_data, "floating_ip=not-an-address").unwrap();

        let result = load_config(Some(&settings), Some(&user_data), None).await;
        assert!(result.is_err());

        let missing = temp_dir.path().join("absent");
        assert!(load_config(Some(&settings), Some(&missing), None).await.is_err());
    }

    #[tokio::test]
    async fn test_load_config_rejects_empty_role_suffix() {
        let temp_dir = TempDir::new().unwrap();
        let settings = write_settings(temp_dir.path());
        let user_data = temp_dir.path().join("user_data");
        fs::write(&user_data, "role_suffix=;floating_ip=10.0.0.1").unwrap();

        let err = load_config(Some(&settings), Some(&user_data), None)
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("role_suffix"));
    }

    #[tokio::test]
    async fn test_load_balancer_command() {
        let temp_dir = TempDir::new().unwrap();
        let settings = write_settings(temp_dir.path());

        let context = AppContext::bootstrap(Some(&settings), None, Some("node-db2".to_string()))
            .await
            .unwrap();
        let report = LoadBalancerCommand::new(context).execute(false).await.unwrap();

        assert_eq!(report.role, NodeRole::LoadBalancerOnly);
        assert_eq!(report.blocks_appended, 1);
        // No init script in the fixture: the reload fails but the run succeeds
        assert!(!report.reloaded);
        assert_eq!(
            fs::read_to_string(temp_dir.path().join("haproxy.cfg")).unwrap(),
            format!("{}    server s8000 10.0.0.5:8000\n", HEADER)
        );
        assert_eq!(
            fs::read_to_string(temp_dir.path().join("haproxy.cfg.bk")).unwrap(),
            HEADER
        );
    }

    #[tokio::test]
    async fn test_failover_command_requires_daemon() {
        let temp_dir = TempDir::new().unwrap();
        let settings = write_settings(temp_dir.path());

        let context = AppContext::bootstrap(Some(&settings), None, None)
            .await
            .unwrap();
        let err = FailoverCommand::new(context).execute(false).await.unwrap_err();

        assert!(err.to_string().contains("Failover provisioning failed"));
        assert!(!temp_dir.path().join("keepalived.conf").exists());
    }

    #[tokio::test]
    async fn test_show_config_command() {
        let temp_dir = TempDir::new().unwrap();
        let settings = write_settings(temp_dir.path());

        let context = AppContext::bootstrap(Some(&settings), None, None)
            .await
            .unwrap();
        assert!(ShowConfigCommand::new(context).execute().is_ok());
    }
}
