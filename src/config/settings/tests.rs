use super::*;
use serial_test::serial;
use tempfile::TempDir;

#[test]
fn default_config_is_valid() {
    let config = Config::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.api.embedding_model, "text-embedding-3-small");
    assert_eq!(config.api.chat_model, "gpt-4o-mini");
    assert_eq!(config.api.embedding_dimension, 1536);
    assert_eq!(config.server.bind, "0.0.0.0:8000");
}

#[test]
#[serial]
fn load_missing_file_yields_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = Config::load(temp_dir.path()).expect("should load defaults");

    assert_eq!(config.base_dir, temp_dir.path());
    assert_eq!(config.paths, PathsConfig::default());
}

#[test]
#[serial]
fn config_roundtrips_through_toml() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let mut config = Config::load(temp_dir.path()).expect("should load defaults");
    config.debug = true;
    config.forum.auth_token = "cookie-value".to_string();
    config.paths.embeddings_file = PathBuf::from("elsewhere/embeds.json");
    config.save().expect("should save config");

    let reloaded = Config::load(temp_dir.path()).expect("should reload config");
    assert!(reloaded.debug);
    assert_eq!(reloaded.forum.auth_token, "cookie-value");
    assert_eq!(
        reloaded.paths.embeddings_file,
        PathBuf::from("elsewhere/embeds.json")
    );
}

#[test]
#[serial]
fn env_var_overrides_api_key() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let mut config = Config::load(temp_dir.path()).expect("should load defaults");
    config.api.api_key = "from-file".to_string();
    config.save().expect("should save config");

    // SAFETY: serialized tests; no other thread reads the environment here
    unsafe { std::env::set_var(API_KEY_ENV, "from-env") };
    let reloaded = Config::load(temp_dir.path()).expect("should reload config");
    unsafe { std::env::remove_var(API_KEY_ENV) };

    assert_eq!(reloaded.api.api_key, "from-env");
}

#[test]
fn rejects_empty_model_name() {
    let mut config = Config::default();
    config.api.embedding_model = "  ".to_string();

    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidModel(_))
    ));
}

#[test]
fn rejects_out_of_range_embedding_dimension() {
    let mut config = Config::default();
    config.api.embedding_dimension = 10_000;

    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidEmbeddingDimension(10_000))
    ));
}

#[test]
fn rejects_unparseable_bind_address() {
    let mut config = Config::default();
    config.server.bind = "not-an-address".to_string();

    assert!(matches!(config.validate(), Err(ConfigError::InvalidBind(_))));
}

#[test]
fn scratch_path_sits_beside_embeddings_file() {
    let config = Config::default();
    assert_eq!(
        config.embeddings_scratch_path(),
        PathBuf::from("scraping-output/kb_with_embeddings.partial.jsonl")
    );
}
