//! Configuration management for t2m

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::collector::DEFAULT_MAX_FETCH;
use crate::content_warning::ContentWarningRules;
use crate::error::{ConfigError, Result};
use crate::transform::DEFAULT_SHORTENER_DOMAIN;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ledger: LedgerConfig,
    pub twitter: TwitterConfig,
    #[serde(default)]
    pub mastodon: MastodonConfig,
    #[serde(default)]
    pub content_warnings: ContentWarningConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub path: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: "~/.local/share/t2m/db.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwitterConfig {
    /// File holding the app-only bearer token
    pub bearer_token_file: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_api_base() -> String {
    "https://api.twitter.com".to_string()
}

impl TwitterConfig {
    /// Read the bearer token from `bearer_token_file`
    pub fn bearer_token(&self) -> Result<SecretString> {
        let path = expand_path(&self.bearer_token_file);
        let content = std::fs::read_to_string(&path).map_err(ConfigError::ReadError)?;
        let token = content.trim();
        if token.is_empty() {
            return Err(ConfigError::MissingField(format!(
                "twitter bearer token ({} is empty)",
                path.display()
            ))
            .into());
        }
        Ok(SecretString::from(token.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MastodonConfig {
    /// Directory of `<user@instance>.token` files
    pub credentials_dir: String,
}

impl Default for MastodonConfig {
    fn default() -> Self {
        Self {
            credentials_dir: "~/.config/t2m/mastodon".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentWarningConfig {
    pub rules_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default = "default_delay_seconds")]
    pub delay_seconds: u64,
    #[serde(default = "default_max_fetch")]
    pub max_fetch: usize,
    #[serde(default = "default_shortener_domain")]
    pub shortener_domain: String,
}

fn default_delay_seconds() -> u64 {
    30
}

fn default_max_fetch() -> usize {
    DEFAULT_MAX_FETCH
}

fn default_shortener_domain() -> String {
    DEFAULT_SHORTENER_DOMAIN.to_string()
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            delay_seconds: default_delay_seconds(),
            max_fetch: default_max_fetch(),
            shortener_domain: default_shortener_domain(),
        }
    }
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            ledger: LedgerConfig::default(),
            twitter: TwitterConfig {
                bearer_token_file: "~/.config/t2m/twitter.token".to_string(),
                api_base: default_api_base(),
            },
            mastodon: MastodonConfig::default(),
            content_warnings: ContentWarningConfig::default(),
            defaults: DefaultsConfig::default(),
        }
    }

    /// Ledger location, with `~` expanded
    pub fn ledger_path(&self) -> PathBuf {
        expand_path(&self.ledger.path)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.defaults.delay_seconds)
    }

    /// Content-warning rules; none when no rules file is configured or the
    /// file does not exist
    pub fn content_warning_rules(&self) -> Result<ContentWarningRules> {
        match &self.content_warnings.rules_file {
            Some(file) => ContentWarningRules::load(&expand_path(file)),
            None => Ok(ContentWarningRules::default()),
        }
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("T2M_CONFIG") {
        return Ok(expand_path(&path));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("t2m").join("config.toml"))
}

fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [twitter]
            bearer_token_file = "/tmp/token"
            "#,
        )
        .unwrap();

        assert_eq!(config.twitter.api_base, "https://api.twitter.com");
        assert_eq!(config.ledger.path, "~/.local/share/t2m/db.json");
        assert_eq!(config.mastodon.credentials_dir, "~/.config/t2m/mastodon");
        assert_eq!(config.defaults.delay_seconds, 30);
        assert_eq!(config.defaults.max_fetch, 200);
        assert_eq!(config.defaults.shortener_domain, "t.co");
        assert_eq!(config.delay(), Duration::from_secs(30));
        assert!(config.content_warnings.rules_file.is_none());
    }

    #[test]
    fn test_twitter_section_is_required() {
        let result: std::result::Result<Config, _> = toml::from_str("[ledger]\npath = \"db.json\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_path() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            [ledger]
            path = "/data/db.json"

            [twitter]
            bearer_token_file = "/tmp/token"
            api_base = "http://localhost:8080"

            [defaults]
            delay_seconds = 5
            shortener_domain = "sho.rt"
            "#
        )
        .unwrap();

        let config = Config::load_from_path(file.path()).unwrap();
        assert_eq!(config.ledger_path(), PathBuf::from("/data/db.json"));
        assert_eq!(config.twitter.api_base, "http://localhost:8080");
        assert_eq!(config.delay(), Duration::from_secs(5));
        assert_eq!(config.defaults.max_fetch, 200);
        assert_eq!(config.defaults.shortener_domain, "sho.rt");
    }

    #[test]
    fn test_load_invalid_toml() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[twitter\nbearer_token_file = ").unwrap();

        let result = Config::load_from_path(file.path());
        assert!(matches!(
            result,
            Err(crate::error::T2mError::Config(ConfigError::ParseError(_)))
        ));
    }

    #[test]
    fn test_bearer_token_is_trimmed() {
        use secrecy::ExposeSecret;

        let temp_dir = TempDir::new().unwrap();
        let token_path = temp_dir.path().join("twitter.token");
        std::fs::write(&token_path, "AAAA-token\n").unwrap();

        let twitter = TwitterConfig {
            bearer_token_file: token_path.display().to_string(),
            api_base: default_api_base(),
        };
        assert_eq!(twitter.bearer_token().unwrap().expose_secret(), "AAAA-token");
    }

    #[test]
    fn test_empty_bearer_token_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let token_path = temp_dir.path().join("twitter.token");
        std::fs::write(&token_path, "\n").unwrap();

        let twitter = TwitterConfig {
            bearer_token_file: token_path.display().to_string(),
            api_base: default_api_base(),
        };
        assert!(twitter.bearer_token().is_err());
    }

    #[test]
    fn test_content_warning_rules_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let rules_path = temp_dir.path().join("cw.json");
        std::fs::write(&rules_path, r#"{"spoiler": ["(spoiler)"]}"#).unwrap();

        let mut config = Config::default_config();
        assert!(config.content_warning_rules().unwrap().is_empty());

        config.content_warnings.rules_file = Some(rules_path.display().to_string());
        assert_eq!(config.content_warning_rules().unwrap().len(), 1);

        config.content_warnings.rules_file =
            Some(temp_dir.path().join("missing.json").display().to_string());
        assert!(config.content_warning_rules().unwrap().is_empty());
    }

    #[test]
    #[serial]
    fn test_resolve_config_path_from_env() {
        std::env::set_var("T2M_CONFIG", "/custom/t2m.toml");
        let path = resolve_config_path().unwrap();
        std::env::remove_var("T2M_CONFIG");

        assert_eq!(path, PathBuf::from("/custom/t2m.toml"));
    }

    #[test]
    #[serial]
    fn test_resolve_config_path_default() {
        std::env::remove_var("T2M_CONFIG");
        let path = resolve_config_path().unwrap();
        assert!(path.ends_with("t2m/config.toml"));
    }
}
