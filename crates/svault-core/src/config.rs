use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{VaultError, VaultResult};

/// Top-level configuration (loaded from svault.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SvaultConfig {
    pub storage: StorageConfig,
    pub keys: KeysConfig,
    pub sessions: SessionsConfig,
    pub encryption: EncryptionConfig,
    pub scope: ScopeConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Base directory for all svault artifacts (default: ~/.config/svault)
    pub root: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeysConfig {
    /// Master secret file (default: <root>/master.key)
    pub master_secret_file: Option<PathBuf>,
    /// Directory for derived recipient keys (default: <root>/keys)
    pub key_dir: Option<PathBuf>,
    /// Purpose segment used when none is given (default: "session")
    pub default_purpose: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    /// Ciphertext + metadata directory (default: <root>/sessions)
    pub dir: Option<PathBuf>,
    /// Index document (default: <sessions dir>/index.json)
    pub index_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptionConfig {
    /// Sealing backend name; "age" is the only one available
    pub algorithm: String,
    /// Static recipient public key used when no derivation path is requested
    pub recipient: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    /// External identifier hashed into the scope token (e.g. a repository URL)
    pub identifier: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (default: warn)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
        }
    }
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self {
            algorithm: "age".into(),
            recipient: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".into(),
            format: "text".into(),
        }
    }
}

impl SvaultConfig {
    /// Load configuration from a TOML file, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &Path) -> VaultResult<Self> {
        if !path.exists() {
            tracing::debug!("config file not found: {} (using defaults)", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(VaultError::io(path))?;
        Self::parse(&content, path)
    }

    /// Parse TOML already read from `origin`.
    pub fn parse(content: &str, origin: &Path) -> VaultResult<Self> {
        toml::from_str(content).map_err(|e| VaultError::Serialization {
            path: origin.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn root(&self) -> PathBuf {
        expand_tilde(&self.storage.root)
    }

    pub fn master_secret_path(&self) -> PathBuf {
        self.keys
            .master_secret_file
            .as_deref()
            .map(expand_tilde)
            .unwrap_or_else(|| self.root().join("master.key"))
    }

    pub fn key_dir(&self) -> PathBuf {
        self.keys
            .key_dir
            .as_deref()
            .map(expand_tilde)
            .unwrap_or_else(|| self.root().join("keys"))
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.sessions
            .dir
            .as_deref()
            .map(expand_tilde)
            .unwrap_or_else(|| self.root().join("sessions"))
    }

    pub fn index_path(&self) -> PathBuf {
        self.sessions
            .index_file
            .as_deref()
            .map(expand_tilde)
            .unwrap_or_else(|| self.sessions_dir().join("index.json"))
    }

    pub fn default_purpose(&self) -> &str {
        self.keys.default_purpose.as_deref().unwrap_or("session")
    }
}

/// Default base directory: $XDG_CONFIG_HOME/svault or ~/.config/svault
fn default_root() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
        .join("svault")
}

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Expand `~/` in a path to the user's home directory
pub fn expand_tilde(path: &Path) -> PathBuf {
    match path.to_str().and_then(|s| s.strip_prefix("~/")) {
        Some(rest) => home_dir().join(rest),
        None => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[storage]
root = "/var/lib/svault"

[keys]
master_secret_file = "/etc/svault/master.key"
default_purpose = "agent"

[sessions]
dir = "/srv/sessions"

[encryption]
algorithm = "age"
recipient = "age1qyqszqgpqyqszqgpqyqszqgpqyqszqgpqyqszqgpqyqszqgpqyqs3290gq"

[scope]
identifier = "https://github.com/example/repo"

[logging]
level = "debug"
format = "json"
"#;
        let config: SvaultConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(config.root(), PathBuf::from("/var/lib/svault"));
        assert_eq!(
            config.master_secret_path(),
            PathBuf::from("/etc/svault/master.key")
        );
        assert_eq!(config.key_dir(), PathBuf::from("/var/lib/svault/keys"));
        assert_eq!(config.sessions_dir(), PathBuf::from("/srv/sessions"));
        assert_eq!(
            config.index_path(),
            PathBuf::from("/srv/sessions/index.json")
        );
        assert_eq!(config.default_purpose(), "agent");
        assert!(config.encryption.recipient.is_some());
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_parse_defaults() {
        let config: SvaultConfig = toml::from_str("").unwrap();

        assert_eq!(config.encryption.algorithm, "age");
        assert_eq!(config.default_purpose(), "session");
        assert_eq!(config.logging.level, "warn");
        assert!(config.root().ends_with("svault"));
        assert_eq!(config.master_secret_path(), config.root().join("master.key"));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = SvaultConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.encryption.algorithm, "age");
    }

    #[test]
    fn test_load_malformed_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("svault.toml");
        std::fs::write(&path, "[storage\nroot = 1").unwrap();

        let err = SvaultConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("svault.toml"));
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = SvaultConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: SvaultConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.storage.root, parsed.storage.root);
        assert_eq!(config.encryption.algorithm, parsed.encryption.algorithm);
    }

    #[test]
    fn test_expand_tilde() {
        let expanded = expand_tilde(Path::new("~/.config/svault"));
        assert!(!expanded.to_str().unwrap().starts_with("~/"));
        assert_eq!(expand_tilde(Path::new("/abs")), PathBuf::from("/abs"));
    }
}
