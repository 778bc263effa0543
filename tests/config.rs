#[cfg(test)]
mod tests {
    use pomogroup::libs::config::{Config, EngineConfig, CONFIG_FILE_NAME};
    use pomogroup::libs::data_storage::DataStorage;
    use std::fs;
    use tempfile::TempDir;
    use test_context::{test_context, TestContext};

    /// Points the data directory at a temporary home.
    struct ConfigTestContext {
        _temp_dir: TempDir,
        max_warnings: u32,
        default_pattern: String,
        save_interval: u64,
    }

    impl TestContext for ConfigTestContext {
        fn setup() -> Self {
            let temp_dir = tempfile::tempdir().unwrap();
            std::env::set_var("HOME", temp_dir.path());
            std::env::set_var("LOCALAPPDATA", temp_dir.path());
            ConfigTestContext {
                _temp_dir: temp_dir,
                max_warnings: 3,
                default_pattern: "25/5/25/15".to_string(),
                save_interval: 120,
            }
        }
    }

    #[test_context(ConfigTestContext)]
    #[test]
    fn test_read_nonexistent_config(_ctx: &mut ConfigTestContext) {
        let config = Config::read().unwrap();
        assert!(config.engine.is_none());
        assert_eq!(config.engine(), EngineConfig::default());
    }

    #[test_context(ConfigTestContext)]
    #[test]
    fn test_save_and_read_config(ctx: &mut ConfigTestContext) {
        let config = Config {
            engine: Some(EngineConfig {
                max_warnings: ctx.max_warnings,
                default_pattern: ctx.default_pattern.clone(),
                save_interval: ctx.save_interval,
                ..EngineConfig::default()
            }),
        };
        config.save().unwrap();

        let engine = Config::read().unwrap().engine();
        assert_eq!(engine.max_warnings, ctx.max_warnings);
        assert_eq!(engine.default_pattern, ctx.default_pattern);
        assert_eq!(engine.save_interval, ctx.save_interval);
        assert_eq!(engine.loop_wait_cap, 600);
    }

    #[test_context(ConfigTestContext)]
    #[test]
    fn test_partial_engine_section(_ctx: &mut ConfigTestContext) {
        let path = DataStorage::new().get_path(CONFIG_FILE_NAME).unwrap();
        fs::write(&path, r#"{ "engine": { "max_warnings": 2 } }"#).unwrap();

        let engine = Config::read().unwrap().engine();
        assert_eq!(engine.max_warnings, 2);
        assert_eq!(engine.min_session_duration, 60);
        assert_eq!(engine.default_pattern, "50/10");
    }

    #[test]
    fn test_default_engine_config() {
        let engine = EngineConfig::default();
        assert_eq!(engine.max_warnings, 1);
        assert_eq!(engine.loop_wait_cap, 600);
        assert_eq!(engine.label_update_interval, 600);
        assert_eq!(engine.stale_transition_window, 3600);
        assert_eq!(engine.min_session_duration, 60);
        assert_eq!(engine.message_history, 5);
        assert_eq!(engine.pin_failure_threshold, 5);
        assert_eq!(engine.status_budget, 30);
        assert_eq!(engine.save_interval, 60);
        assert_eq!(engine.pattern_cache_size, 1000);
    }
}
