#[cfg(test)]
mod tests {
    use quest_config::ConfigLoader;
    use quest_config::schema::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    // ── Default tests ──────────────────────────────────────────

    #[test]
    fn test_session_config_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.deadline_secs, 180);
        assert_eq!(config.step_limit, 200);
        assert_eq!(config.malformed_retries, 2);
    }

    #[test]
    fn test_llm_config_defaults() {
        let config = LlmConfig::default();
        assert_eq!(config.provider, "gemini");
        assert_eq!(config.model, "gemini-2.0-flash");
        assert_eq!(config.temperature, 0.1);
        assert_eq!(config.max_tokens, 8192);
        assert_eq!(config.requests_per_window, 9);
        assert_eq!(config.window_secs, 60);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_tools_and_server_defaults() {
        let tools = ToolsConfig::default();
        assert_eq!(tools.work_dir.to_str(), Some("LLMFiles"));
        assert_eq!(tools.run_code_timeout_secs, 60);
        assert_eq!(tools.install_timeout_secs, 120);
        let server = ServerConfig::default();
        assert_eq!(server.listen, "0.0.0.0:7860");
        assert!(!server.cors);
        assert_eq!(server.max_retained_sessions, 100);
    }

    #[test]
    fn test_server_retention_from_toml() {
        let config: QuestConfig = toml::from_str("[server]\nmax_retained_sessions = 5\n").unwrap();
        assert_eq!(config.server.max_retained_sessions, 5);
        assert_eq!(config.server.listen, "0.0.0.0:7860");
    }

    #[test]
    fn test_base_url_resolution() {
        let mut llm = LlmConfig::default();
        assert!(llm.resolved_base_url().contains("generativelanguage.googleapis.com"));
        llm.provider = "openai".into();
        assert_eq!(llm.resolved_base_url(), "https://api.openai.com/v1");
        llm.base_url = Some("http://localhost:8080/v1/".into());
        assert_eq!(llm.resolved_base_url(), "http://localhost:8080/v1");
    }

    // ── TOML tests ─────────────────────────────────────────────

    #[test]
    fn test_config_toml_roundtrip() {
        let config = QuestConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let restored: QuestConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(restored.llm.model, config.llm.model);
        assert_eq!(restored.session.step_limit, config.session.step_limit);
        assert_eq!(restored.server.listen, config.server.listen);
    }

    #[test]
    fn test_partial_toml_applies_defaults() {
        let toml_str = r#"
[session]
step_limit = 12

[llm]
requests_per_window = 2
"#;
        let config: QuestConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.session.step_limit, 12);
        assert_eq!(config.llm.requests_per_window, 2);
        // Defaults should fill in
        assert_eq!(config.session.deadline_secs, 180);
        assert_eq!(config.llm.window_secs, 60);
        assert_eq!(config.tools.python, "python3");
    }

    // ── Validation tests ───────────────────────────────────────

    #[test]
    fn test_validate_rejects_zero_budgets() {
        let mut config = QuestConfig::default();
        config.session.step_limit = 0;
        config.llm.window_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.contains("session.step_limit"));
        assert!(err.contains("llm.window_secs"));
    }

    #[test]
    fn test_validate_rejects_temperature_out_of_range() {
        let mut config = QuestConfig::default();
        config.llm.temperature = 3.5;
        assert!(config.validate().unwrap_err().contains("llm.temperature"));
    }

    #[test]
    fn test_validate_warns_on_missing_secret_and_key() {
        let config = QuestConfig::default();
        let warnings = config.validate().unwrap();
        let fields: Vec<&str> = warnings.iter().map(|w| w.field.as_str()).collect();
        assert!(fields.contains(&"task.secret"));
        assert!(fields.contains(&"llm.api_key"));
        assert!(warnings.iter().all(|w| w.severity == WarningSeverity::Warning));
    }

    #[test]
    fn test_warning_display_includes_hint() {
        let w = ConfigWarning {
            field: "logging.format".into(),
            message: "unknown log format 'xml'".into(),
            severity: WarningSeverity::Warning,
            hint: Some("Valid values: pretty, json, compact".into()),
        };
        let rendered = w.to_string();
        assert!(rendered.starts_with("warning logging.format"));
        assert!(rendered.contains("Valid values"));
    }

    // ── Env override tests ─────────────────────────────────────

    #[test]
    fn test_env_fills_missing_secrets() {
        let config = ConfigLoader::apply_env_overrides(
            QuestConfig::default(),
            env_from(&[
                ("SECRET", "s3cret"),
                ("EMAIL", "me@example.com"),
                ("GOOGLE_API_KEY", "g-key"),
            ]),
        );
        assert_eq!(config.task.secret.as_deref(), Some("s3cret"));
        assert_eq!(config.task.email.as_deref(), Some("me@example.com"));
        assert_eq!(config.llm.api_key.as_deref(), Some("g-key"));
    }

    #[test]
    fn test_file_secret_takes_priority_over_env() {
        let mut base = QuestConfig::default();
        base.task.secret = Some("from-file".into());
        let config = ConfigLoader::apply_env_overrides(base, env_from(&[("SECRET", "from-env")]));
        assert_eq!(config.task.secret.as_deref(), Some("from-file"));
    }

    #[test]
    fn test_port_and_listen_overrides() {
        let config =
            ConfigLoader::apply_env_overrides(QuestConfig::default(), env_from(&[("PORT", "9000")]));
        assert_eq!(config.server.listen, "0.0.0.0:9000");

        let config = ConfigLoader::apply_env_overrides(
            QuestConfig::default(),
            env_from(&[("PORT", "9000"), ("QUEST_LISTEN", "127.0.0.1:1234")]),
        );
        assert_eq!(config.server.listen, "127.0.0.1:1234");

        let config =
            ConfigLoader::apply_env_overrides(QuestConfig::default(), env_from(&[("PORT", "abc")]));
        assert_eq!(config.server.listen, "0.0.0.0:7860");
    }

    #[test]
    fn test_openai_provider_reads_openai_key() {
        let mut base = QuestConfig::default();
        base.llm.provider = "openai".into();
        let config = ConfigLoader::apply_env_overrides(
            base,
            env_from(&[("GOOGLE_API_KEY", "g"), ("OPENAI_API_KEY", "o")]),
        );
        assert_eq!(config.llm.api_key.as_deref(), Some("o"));
    }

    // ── Loader tests ───────────────────────────────────────────

    #[test]
    fn test_config_loader_with_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quest.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(
            f,
            r#"
[session]
deadline_secs = 30

[task]
secret = "abc"
"#
        )
        .unwrap();

        let loader =
            ConfigLoader::load_with_env(Some(&path), env_from(&[("QUEST_MODEL", "gemini-pro")]))
                .unwrap();
        let config = loader.get();
        assert_eq!(config.session.deadline_secs, 30);
        assert_eq!(config.task.secret.as_deref(), Some("abc"));
        assert_eq!(config.llm.model, "gemini-pro");
        assert_eq!(loader.path(), path.as_path());
    }

    #[test]
    fn test_config_loader_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let loader = ConfigLoader::load_with_env(Some(&path), no_env).unwrap();
        assert_eq!(loader.config().session.step_limit, 200);
    }

    #[test]
    fn test_config_loader_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quest.toml");
        std::fs::write(&path, "[session]\nstep_limit = 0\n").unwrap();
        assert!(matches!(
            ConfigLoader::load_with_env(Some(&path), no_env),
            Err(quest_core::QuestError::ConfigValidation { .. })
        ));

        std::fs::write(&path, "[session\n").unwrap();
        let err = ConfigLoader::load_with_env(Some(&path), no_env).unwrap_err();
        assert!(err.to_string().contains("failed to parse"));
    }
}
