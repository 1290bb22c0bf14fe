#[cfg(test)]
mod tests {
    use crate::config::*;
    use crate::error::ConfigError;
    use crate::engine::StopSignal;
    use crate::mining::{MinerConnectionConfig, TrimmingMode};
    use clap::Parser;
    use uuid::Uuid;

    #[test]
    fn test_config_default() {
        let config = Config::default();

        assert_eq!(config.general.log_level, "info");
        assert!(config.general.log_file.is_none());

        assert_eq!(config.session.max_lines, 200);
        assert_eq!(config.session.process_name, "cuckatoo-panel");
        assert_eq!(config.session.event_capacity, 256);

        assert_eq!(config.settings.path, std::path::PathBuf::from("settings"));
        assert_eq!(config.engine.stop_signal, StopSignal::Sigint);

        assert!(config.is_valid());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        // 最大行数必须大于 0
        config.session.max_lines = 0;
        assert!(!config.is_valid());
        config.session.max_lines = 50;
        assert!(config.is_valid());

        config.session.process_name = "  ".to_string();
        assert!(!config.is_valid());
        config.session.process_name = "miner".to_string();

        config.general.log_level = "verbose".to_string();
        assert!(!config.is_valid());
        config.general.log_level = "DEBUG".to_string();
        assert!(config.is_valid());

        config.session.event_capacity = 0;
        assert!(!config.is_valid());
    }

    #[test]
    fn test_config_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
[session]
max_lines = 500

[engine]
program = "/opt/cuckatoo/cuckatoo_reference_miner"
stop_signal = "SIGTERM"
"#,
        )
        .unwrap();

        assert_eq!(config.session.max_lines, 500);
        assert_eq!(config.session.process_name, "cuckatoo-panel");
        assert_eq!(config.engine.stop_signal, StopSignal::Sigterm);
        assert_eq!(config.general.log_level, "info");
    }

    #[test]
    fn test_config_save_and_load() {
        let path = std::env::temp_dir().join(format!("cuckatoo-panel-{}.toml", Uuid::new_v4()));
        let path = path.to_str().unwrap();

        let mut config = Config::default();
        config.session.max_lines = 64;
        config.general.log_file = Some("/tmp/cuckatoo-panel.log".into());
        config.save(path).unwrap();

        let loaded = Config::load(path).unwrap();
        assert_eq!(loaded, config);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_config_load_rejects_invalid() {
        let path = std::env::temp_dir().join(format!("cuckatoo-panel-{}.toml", Uuid::new_v4()));
        std::fs::write(&path, "[session]\nmax_lines = 0\n").unwrap();

        assert!(Config::load(path.to_str().unwrap()).is_err());

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_missing_file() {
        let path = std::env::temp_dir().join(format!("missing-{}.toml", Uuid::new_v4()));
        let error = Config::load(path.to_str().unwrap()).unwrap_err();

        assert!(matches!(
            error.downcast_ref::<ConfigError>(),
            Some(ConfigError::FileNotFound { .. })
        ));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let path = std::env::temp_dir().join(format!("missing-{}.toml", Uuid::new_v4()));
        let config = Config::load_or_default(path.to_str().unwrap()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_args_override_restored_settings() {
        let args = Args::parse_from([
            "cuckatoo-panel",
            "--username",
            "bob",
            "--trimming-type",
            "slean_trimming",
            "--password",
            "",
        ]);

        let restored = MinerConnectionConfig::new(TrimmingMode::LeanTrimming)
            .with_stratum_server_address("pool.example.com:3416")
            .with_username("alice")
            .with_password("secret");

        let config = args.apply(restored);
        assert_eq!(config.stratum_server_address.as_deref(), Some("pool.example.com:3416"));
        assert_eq!(config.username.as_deref(), Some("bob"));
        assert_eq!(config.password, None);
        assert_eq!(config.trimming_mode, TrimmingMode::SleanTrimming);
        assert!(!args.no_save);
    }

    #[test]
    fn test_args_reject_unknown_trimming_type() {
        assert!(Args::try_parse_from(["cuckatoo-panel", "--trimming-type", "turbo"]).is_err());
    }
}
