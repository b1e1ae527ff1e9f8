use crate::config::{
    AppConfig, DEFAULT_BASE_URL, FileConfig, LlmConfig, TOOLING_GUIDANCE, load_project_config,
    read_config_file,
};
use std::collections::HashMap;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_load_project_config() {
    let temp_dir = TempDir::new().unwrap();
    let project_root = temp_dir.path();

    let susi_dir = project_root.join(".susi");
    fs::create_dir_all(&susi_dir).unwrap();

    let config_content = r#"
model = "qwen2.5"
temperature = 0.2
stop_tokens = ["</s>"]
stream = true

[llm]
request_timeout_ms = 30000
"#;

    fs::write(susi_dir.join("config.toml"), config_content).unwrap();

    let project_cfg = load_project_config(project_root).unwrap();

    assert_eq!(project_cfg.model, Some("qwen2.5".to_string()));
    assert_eq!(project_cfg.temperature, Some(0.2));
    assert_eq!(project_cfg.stop_tokens, Some(vec!["</s>".to_string()]));
    assert_eq!(project_cfg.stream, Some(true));

    let llm_cfg = project_cfg.llm.unwrap();
    assert_eq!(llm_cfg.request_timeout_ms, Some(30_000));
    assert_eq!(llm_cfg.connect_timeout_ms, None);
}

#[test]
fn test_load_project_config_not_exists() {
    let temp_dir = TempDir::new().unwrap();
    let project_cfg = load_project_config(temp_dir.path()).unwrap();
    assert_eq!(project_cfg, FileConfig::default());
}

#[test]
fn test_unparsable_file_is_skipped() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    fs::write(&path, "model = [unclosed").unwrap();
    assert_eq!(read_config_file(&path).unwrap(), None);
}

#[test]
fn test_defaults() {
    let cfg = AppConfig::default();
    assert_eq!(cfg.base_url, DEFAULT_BASE_URL);
    assert_eq!(cfg.model, "");
    assert_eq!(cfg.max_rounds, 6);
    assert!(!cfg.stream);
    assert_eq!(cfg.store_root, None);
    assert_eq!(cfg.llm, LlmConfig::default());
}

#[test]
fn test_layer_precedence() {
    let cli = FileConfig {
        model: Some("from-cli".into()),
        ..Default::default()
    };
    let vars: HashMap<&str, &str> = [
        ("SUSI_MODEL", "from-env"),
        ("SUSI_BASE_URL", "http://env:1234"),
    ]
    .into_iter()
    .collect();
    let env = FileConfig::from_env_with(|k| vars.get(k).map(|v| v.to_string()));
    let project = FileConfig {
        base_url: Some("http://project".into()),
        api_key: Some("project-key".into()),
        llm: Some(LlmConfig {
            connect_timeout_ms: Some(100),
            request_timeout_ms: None,
        }),
        ..Default::default()
    };
    let global = FileConfig {
        api_key: Some("global-key".into()),
        max_rounds: Some(3),
        llm: Some(LlmConfig {
            connect_timeout_ms: Some(999),
            request_timeout_ms: Some(2000),
        }),
        ..Default::default()
    };

    let cfg = AppConfig::from_layer(cli.or(env).or(project).or(global));
    assert_eq!(cfg.model, "from-cli");
    assert_eq!(cfg.base_url, "http://env:1234");
    assert_eq!(cfg.api_key.as_deref(), Some("project-key"));
    assert_eq!(cfg.max_rounds, 3);
    assert_eq!(cfg.llm.connect_timeout_ms, Some(100));
    assert_eq!(cfg.llm.request_timeout_ms, Some(2000));
}

#[test]
fn test_blank_values_fall_through() {
    let upper = FileConfig {
        base_url: Some("   ".into()),
        model: Some(String::new()),
        ..Default::default()
    };
    let lower = FileConfig {
        model: Some("llama3".into()),
        ..Default::default()
    };
    let cfg = AppConfig::from_layer(upper.or(lower));
    assert_eq!(cfg.base_url, DEFAULT_BASE_URL);
    assert_eq!(cfg.model, "llama3");
}

#[test]
fn test_effective_system_prompt() {
    let mut cfg = AppConfig::default();
    assert_eq!(cfg.effective_system_prompt(), TOOLING_GUIDANCE);

    cfg.system_prompt = "You are terse.".into();
    let prompt = cfg.effective_system_prompt();
    assert!(prompt.starts_with("You are terse."));
    assert!(prompt.ends_with(TOOLING_GUIDANCE));
}

#[test]
fn test_chat_options_follow_config() {
    let cfg = AppConfig::from_layer(FileConfig {
        max_tokens: Some(128),
        stop_tokens: Some(vec!["\n".into()]),
        ..Default::default()
    });
    let opts = cfg.chat_options();
    assert_eq!(opts.max_tokens, Some(128));
    assert_eq!(opts.stop_tokens, vec!["\n".to_string()]);
    assert_eq!(opts.stream, Some(false));
    assert!(opts.tools.is_empty());
}
