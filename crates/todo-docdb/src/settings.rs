//! # Application Settings
//!
//! The string-keyed settings the repository facade reads at startup.
//!
//! ## Settings Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Settings Priority                                    │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TODO_DATABASE=ToDoList                                             │
//! │     TODO_ENDPOINT=https://my-account.documents.azure.com:443/          │
//! │                                                                         │
//! │  2. TOML Settings File                                                 │
//! │     ~/.config/todo-docdb/todo.toml (Linux)                             │
//! │     ~/Library/Application Support/com.todo.docdb/todo.toml (macOS)     │
//! │                                                                         │
//! │  3. Nothing else: missing keys surface as Configuration errors         │
//! │     the first time the connection context needs them.                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Settings File Format
//! ```toml
//! # todo.toml
//! [settings]
//! database = "ToDoList"
//! collection = "Items"
//! endpoint = "https://my-account.documents.azure.com:443/"
//! authKey = "base64-master-key=="
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{DocDbError, DocDbResult};

// =============================================================================
// Setting Keys
// =============================================================================

/// Name of the database holding the to-do collection.
pub const DATABASE_KEY: &str = "database";

/// Name of the collection holding to-do items.
pub const COLLECTION_KEY: &str = "collection";

/// Service endpoint URI.
pub const ENDPOINT_KEY: &str = "endpoint";

/// Base64 master key used to sign requests.
pub const AUTH_KEY_KEY: &str = "authKey";

/// Environment variable overriding each setting key.
const ENV_OVERRIDES: [(&str, &str); 4] = [
    (DATABASE_KEY, "TODO_DATABASE"),
    (COLLECTION_KEY, "TODO_COLLECTION"),
    (ENDPOINT_KEY, "TODO_ENDPOINT"),
    (AUTH_KEY_KEY, "TODO_AUTH_KEY"),
];

/// Default settings file name.
const SETTINGS_FILE_NAME: &str = "todo.toml";

// =============================================================================
// AppSettings
// =============================================================================

/// A mapping from setting keys to string values.
///
/// Values are stored as given; a key whose value is empty or whitespace is
/// treated as absent by [`AppSettings::get`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default)]
    settings: BTreeMap<String, String>,
}

impl AppSettings {
    /// Creates empty settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds settings from key/value pairs.
    ///
    /// ## Example
    /// ```rust
    /// use todo_docdb::AppSettings;
    ///
    /// let settings = AppSettings::from_pairs([("database", "ToDoList")]);
    /// assert_eq!(settings.get("database"), Some("ToDoList"));
    /// ```
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        AppSettings {
            settings: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Loads settings from file and environment.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Settings file (explicit path, or `todo.toml` in the platform config dir)
    /// 2. Environment variables
    ///
    /// A missing file is not an error; an unreadable or malformed one is.
    pub fn load(path: Option<PathBuf>) -> DocDbResult<Self> {
        let mut settings = Self::default();

        if let Some(path) = path.or_else(Self::default_settings_path) {
            if path.exists() {
                info!(?path, "Loading settings from file");
                settings = Self::from_file(&path)?;
            } else {
                debug!(?path, "Settings file not found, using environment only");
            }
        }

        settings.apply_env_overrides();

        Ok(settings)
    }

    /// Reads a TOML settings file.
    pub fn from_file(path: &Path) -> DocDbResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parses settings from TOML text.
    pub fn from_toml(contents: &str) -> DocDbResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Returns the value for `key`, treating empty values as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.settings
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// Returns the value for `key` or a Configuration error naming it.
    pub fn require(&self, key: &str) -> DocDbResult<&str> {
        self.get(key).ok_or_else(|| DocDbError::missing_setting(key))
    }

    /// Sets a value, replacing any previous one.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.settings.insert(key.into(), value.into());
    }

    /// Returns a copy with `key` set.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    /// Applies overrides using `lookup` to read each override variable.
    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for (key, var) in ENV_OVERRIDES {
            if let Some(value) = lookup(var) {
                debug!(key = %key, var = %var, "Overriding setting from environment");
                self.set(key, value);
            }
        }
    }

    /// Returns the default settings file path.
    fn default_settings_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "todo", "docdb")
            .map(|dirs| dirs.config_dir().join(SETTINGS_FILE_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_get_treats_blank_as_absent() {
        let settings = AppSettings::from_pairs([(DATABASE_KEY, "ToDoList"), (COLLECTION_KEY, "  ")]);
        assert_eq!(settings.get(DATABASE_KEY), Some("ToDoList"));
        assert_eq!(settings.get(COLLECTION_KEY), None);
        assert_eq!(settings.get(ENDPOINT_KEY), None);
    }

    #[test]
    fn test_require_names_missing_key() {
        let settings = AppSettings::new();
        match settings.require(DATABASE_KEY) {
            Err(DocDbError::Configuration { key }) => assert_eq!(key, DATABASE_KEY),
            other => panic!("expected Configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_from_toml() {
        let settings = AppSettings::from_toml(
            r#"
            [settings]
            database = "ToDoList"
            collection = "Items"
            authKey = "a2V5"
            "#,
        )
        .unwrap();

        assert_eq!(settings.get(DATABASE_KEY), Some("ToDoList"));
        assert_eq!(settings.get(COLLECTION_KEY), Some("Items"));
        assert_eq!(settings.get(AUTH_KEY_KEY), Some("a2V5"));
    }

    #[test]
    fn test_malformed_toml_is_load_error() {
        let err = AppSettings::from_toml("[settings\ndatabase =").unwrap_err();
        assert!(matches!(err, DocDbError::SettingsLoad(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[settings]\ndatabase = \"FromFile\"").unwrap();

        let settings = AppSettings::from_file(file.path()).unwrap();
        assert_eq!(settings.get(DATABASE_KEY), Some("FromFile"));
    }

    #[test]
    fn test_overrides_replace_file_values() {
        let mut settings = AppSettings::from_pairs([(DATABASE_KEY, "FromFile"), (COLLECTION_KEY, "Items")]);
        settings.apply_overrides_from(|var| match var {
            "TODO_DATABASE" => Some("FromEnv".to_string()),
            _ => None,
        });

        assert_eq!(settings.get(DATABASE_KEY), Some("FromEnv"));
        assert_eq!(settings.get(COLLECTION_KEY), Some("Items"));
    }

    #[test]
    fn test_toml_round_trip_keeps_camel_case_key() {
        let settings = AppSettings::new().with(AUTH_KEY_KEY, "k");
        let text = toml::to_string(&settings).unwrap();
        assert!(text.contains("authKey"));
    }
}
