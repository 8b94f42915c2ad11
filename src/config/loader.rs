//! Layered configuration loading.
//!
//! Sources, lowest priority first:
//! 1. `default.toml` (required)
//! 2. `{environment}.toml`
//! 3. `local.toml`
//! 4. `AUDITOR_*` environment variables, `__` separating nested keys
//!    (`AUDITOR_AUDIT__MAX_CONCURRENCY` -> `audit.max_concurrency`)
//!
//! A single file given through `AUDITOR_CONFIG_FILE` or `--config` replaces
//! steps 1 to 3.

use std::path::{Path, PathBuf};

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, File, FileFormat};

use crate::config::environment::Environment;
use crate::config::error::ConfigError;
use crate::config::settings::Settings;

const CONFIG_DIR_ENV: &str = "AUDITOR_CONFIG_DIR";
const CONFIG_FILE_ENV: &str = "AUDITOR_CONFIG_FILE";
const DEFAULT_CONFIG_DIR: &str = "config";
const ENV_PREFIX: &str = "AUDITOR";
const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Clone)]
enum Source {
    Layered(PathBuf),
    SingleFile(PathBuf),
}

#[derive(Debug, Clone)]
pub struct ConfigLoader {
    source: Source,
    environment: Environment,
}

impl ConfigLoader {
    /// Loader driven by `AUDITOR_CONFIG_DIR`, `AUDITOR_CONFIG_FILE` and
    /// `AUDITOR_APP_ENV`. Setting both of the first two is an error.
    pub fn new() -> Result<Self, ConfigError> {
        let config_dir = std::env::var(CONFIG_DIR_ENV).ok();
        let config_file = std::env::var(CONFIG_FILE_ENV).ok();

        let source = match (config_dir, config_file) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::mutual_exclusivity(format!(
                    "{} and {} cannot both be set. Use {} for layered configuration or {} for a single file.",
                    CONFIG_DIR_ENV, CONFIG_FILE_ENV, CONFIG_DIR_ENV, CONFIG_FILE_ENV
                )));
            }
            (_, Some(file)) => Source::SingleFile(PathBuf::from(file)),
            (Some(dir), None) => Source::Layered(PathBuf::from(dir)),
            (None, None) => Source::Layered(PathBuf::from(DEFAULT_CONFIG_DIR)),
        };

        Ok(Self {
            source,
            environment: Environment::from_env(),
        })
    }

    /// Replaces the configured source with one file (the CLI `--config` flag)
    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Source::SingleFile(path.into());
        self
    }

    /// Overrides `AUDITOR_APP_ENV` (the CLI `--env` flag)
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn config_dir(&self) -> Option<&Path> {
        match &self.source {
            Source::Layered(dir) => Some(dir),
            Source::SingleFile(_) => None,
        }
    }

    /// Loads, deserializes and validates the settings.
    pub fn load(&self) -> Result<Settings, ConfigError> {
        let settings: Settings = self
            .build_config()?
            .try_deserialize()
            .map_err(|e| ConfigError::ParseError(format!("Failed to deserialize configuration: {}", e)))?;

        settings.validate()?;
        Ok(settings)
    }

    fn build_config(&self) -> Result<Config, ConfigError> {
        let builder = match &self.source {
            Source::SingleFile(path) => add_file(Config::builder(), path, true)?,
            Source::Layered(dir) => {
                let builder = add_file(Config::builder(), &dir.join("default.toml"), true)?;
                let builder = add_file(
                    builder,
                    &dir.join(format!("{}.toml", self.environment.as_str())),
                    false,
                )?;
                add_file(builder, &dir.join("local.toml"), false)?
            }
        };

        builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator(ENV_SEPARATOR)
                    .ignore_empty(true)
                    .try_parsing(true),
            )
            .build()
            .map_err(ConfigError::from)
    }
}

fn add_file(
    builder: ConfigBuilder<DefaultState>,
    path: &Path,
    required: bool,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    if required && !path.exists() {
        return Err(ConfigError::file_not_found(format!(
            "Required configuration file not found: {}",
            path.display()
        )));
    }

    let name = path
        .to_str()
        .ok_or_else(|| ConfigError::ParseError(format!("Non UTF-8 path: {}", path.display())))?;
    Ok(builder.add_source(File::new(name, FileFormat::Toml).required(required)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    // Tests touch process-wide environment variables
    static TEST_MUTEX: Mutex<()> = Mutex::new(());

    const ENV_VARS: &[&str] = &[
        "AUDITOR_CONFIG_DIR",
        "AUDITOR_CONFIG_FILE",
        "AUDITOR_APP_ENV",
        "AUDITOR_SERVER__PORT",
        "AUDITOR_AUDIT__MAX_CONCURRENCY",
        "AUDITOR_CATALOG__PATH",
    ];

    const BASE_CONFIG: &str = r#"
[application]
name = "auditor-test"

[server]
host = "127.0.0.1"
port = 3000

[logger]
level = "info"

[audit]
default_concurrency = 4
max_concurrency = 16

[audit.callback]
max_retries = 2
"#;

    fn setup_config_dir(files: &[(&str, &str)]) -> TempDir {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        for (name, content) in files {
            fs::write(temp_dir.path().join(name), content).expect("Failed to write config file");
        }
        temp_dir
    }

    /// Clears the loader's variables and restores them on drop
    struct EnvGuard {
        saved: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn clean() -> Self {
            let mut guard = Self { saved: Vec::new() };
            for key in ENV_VARS {
                guard.remove(key);
            }
            guard
        }

        fn set(&mut self, key: &str, value: &str) {
            self.saved.push((key.to_string(), std::env::var(key).ok()));
            unsafe {
                std::env::set_var(key, value);
            }
        }

        fn remove(&mut self, key: &str) {
            self.saved.push((key.to_string(), std::env::var(key).ok()));
            unsafe {
                std::env::remove_var(key);
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, original) in self.saved.iter().rev() {
                unsafe {
                    match original {
                        Some(value) => std::env::set_var(key, value),
                        None => std::env::remove_var(key),
                    }
                }
            }
        }
    }

    #[test]
    fn test_defaults_to_config_directory() {
        let _lock = TEST_MUTEX.lock().unwrap();
        let _env = EnvGuard::clean();

        let loader = ConfigLoader::new().unwrap();
        assert_eq!(loader.config_dir(), Some(Path::new("config")));
        assert_eq!(loader.environment(), Environment::Development);
    }

    #[test]
    fn test_mutual_exclusivity_error() {
        let _lock = TEST_MUTEX.lock().unwrap();
        let mut env = EnvGuard::clean();
        env.set("AUDITOR_CONFIG_DIR", "/custom/config");
        env.set("AUDITOR_CONFIG_FILE", "/path/to/config.toml");

        match ConfigLoader::new() {
            Err(ConfigError::MutualExclusivityError(msg)) => {
                assert!(msg.contains("AUDITOR_CONFIG_DIR"));
                assert!(msg.contains("AUDITOR_CONFIG_FILE"));
            }
            other => panic!("Expected MutualExclusivityError, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_default_toml() {
        let _lock = TEST_MUTEX.lock().unwrap();
        let mut env = EnvGuard::clean();
        let temp_dir = setup_config_dir(&[]);
        env.set("AUDITOR_CONFIG_DIR", temp_dir.path().to_str().unwrap());

        match ConfigLoader::new().unwrap().load() {
            Err(ConfigError::FileNotFound(msg)) => assert!(msg.contains("default.toml")),
            other => panic!("Expected FileNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_layered_precedence() {
        let _lock = TEST_MUTEX.lock().unwrap();
        let mut env = EnvGuard::clean();
        let temp_dir = setup_config_dir(&[
            ("default.toml", BASE_CONFIG),
            ("staging.toml", "[server]\nport = 3001\n\n[audit]\nmax_concurrency = 24\n"),
            ("local.toml", "[server]\nport = 3002\n"),
        ]);
        env.set("AUDITOR_CONFIG_DIR", temp_dir.path().to_str().unwrap());
        env.set("AUDITOR_APP_ENV", "staging");
        env.set("AUDITOR_AUDIT__MAX_CONCURRENCY", "20");

        let settings = ConfigLoader::new().unwrap().load().unwrap();

        // local.toml beats staging.toml
        assert_eq!(settings.server.port, 3002);
        // environment variable beats every file
        assert_eq!(settings.audit.max_concurrency, 20);
        // untouched values come from default.toml
        assert_eq!(settings.application.name, "auditor-test");
        assert_eq!(settings.audit.default_concurrency, 4);
        assert_eq!(settings.audit.callback.max_retries, 2);
        // and the rest from serde defaults
        assert_eq!(settings.audit.retain_finished_jobs, 1000);
        assert_eq!(settings.audit.callback.initial_delay_ms, 500);
    }

    #[test]
    fn test_optional_files_not_required() {
        let _lock = TEST_MUTEX.lock().unwrap();
        let mut env = EnvGuard::clean();
        let temp_dir = setup_config_dir(&[("default.toml", BASE_CONFIG)]);
        env.set("AUDITOR_CONFIG_DIR", temp_dir.path().to_str().unwrap());
        env.set("AUDITOR_APP_ENV", "production");

        let settings = ConfigLoader::new().unwrap().load().unwrap();
        assert_eq!(settings.server.port, 3000);
    }

    #[test]
    fn test_single_file_mode_and_catalog_env() {
        let _lock = TEST_MUTEX.lock().unwrap();
        let mut env = EnvGuard::clean();
        let temp_dir = setup_config_dir(&[("single.toml", BASE_CONFIG)]);
        env.set(
            "AUDITOR_CONFIG_FILE",
            temp_dir.path().join("single.toml").to_str().unwrap(),
        );
        env.set("AUDITOR_CATALOG__PATH", "/srv/catalog.json");

        let loader = ConfigLoader::new().unwrap();
        assert!(loader.config_dir().is_none());

        let settings = loader.load().unwrap();
        assert_eq!(settings.application.name, "auditor-test");
        assert_eq!(settings.catalog.path.as_deref(), Some("/srv/catalog.json"));
    }

    #[test]
    fn test_cli_overrides() {
        let _lock = TEST_MUTEX.lock().unwrap();
        let _env = EnvGuard::clean();
        let temp_dir = setup_config_dir(&[("cli.toml", "[server]\nport = 4040\n")]);

        let loader = ConfigLoader::new()
            .unwrap()
            .with_config_file(temp_dir.path().join("cli.toml"))
            .with_environment(Environment::Test);

        assert_eq!(loader.environment(), Environment::Test);
        assert_eq!(loader.load().unwrap().server.port, 4040);
    }

    #[test]
    fn test_invalid_settings_fail_validation() {
        let _lock = TEST_MUTEX.lock().unwrap();
        let mut env = EnvGuard::clean();
        let temp_dir = setup_config_dir(&[(
            "default.toml",
            "[audit]\ndefault_concurrency = 64\nmax_concurrency = 8\n",
        )]);
        env.set("AUDITOR_CONFIG_DIR", temp_dir.path().to_str().unwrap());

        let err = ConfigLoader::new().unwrap().load().unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }
}
