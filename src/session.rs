/*!
 * Saving and restoring the active configuration
 *
 * A session is a flat JSON record of every [`Config`] field plus a schema
 * version. Loading never merges: a successful load replaces the whole
 * configuration and a failed one leaves it untouched.
 */

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{Config, EmptyDirPolicy, FileSettings, OutputFormat};
use crate::error::{PersistenceError, Result, TreegenError};
use crate::matcher::Rule;
use crate::transform::TransformOptions;

/// Schema version written by this build
pub const SCHEMA_VERSION: u32 = 1;

/// Session file name used when none is given
pub const DEFAULT_SESSION_FILE: &str = ".treegen.session.json";

/// Persisted form of a [`Config`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Schema version
    pub version: u32,
    /// When the record was written (informational)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
    pub root: PathBuf,
    pub output_file: PathBuf,
    pub format: OutputFormat,
    pub rules: Vec<Rule>,
    pub source_only: bool,
    pub respect_gitignore: bool,
    pub empty_dirs: EmptyDirPolicy,
    pub max_file_size: u64,
    #[serde(default)]
    pub description: Option<String>,
    pub strip_comments: bool,
    pub strip_docstrings: bool,
    pub strip_function_bodies: bool,
    pub removed_functions: BTreeSet<String>,
    pub collapse_blank_lines: bool,
    #[serde(default)]
    pub file_settings: BTreeMap<String, FileSettings>,
    pub num_threads: usize,
}

impl SessionRecord {
    /// Snapshot a configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            version: SCHEMA_VERSION,
            saved_at: Some(Utc::now()),
            root: config.root.clone(),
            output_file: config.output_file.clone(),
            format: config.format,
            rules: config.rules.clone(),
            source_only: config.source_only,
            respect_gitignore: config.respect_gitignore,
            empty_dirs: config.empty_dirs,
            max_file_size: config.max_file_size,
            description: config.description.clone(),
            strip_comments: config.transform.strip_comments,
            strip_docstrings: config.transform.strip_docstrings,
            strip_function_bodies: config.transform.strip_function_bodies,
            removed_functions: config.transform.removed_functions.clone(),
            collapse_blank_lines: config.transform.collapse_blank_lines,
            file_settings: config.file_settings.clone(),
            num_threads: config.num_threads,
        }
    }

    /// Turn the record back into a configuration
    pub fn into_config(self) -> std::result::Result<Config, PersistenceError> {
        check_version(u64::from(self.version))?;
        if self.num_threads == 0 {
            return Err(PersistenceError::MalformedRecord(
                "`num_threads` must be at least 1".to_string(),
            ));
        }

        Ok(Config {
            root: self.root,
            output_file: self.output_file,
            format: self.format,
            rules: self.rules,
            source_only: self.source_only,
            respect_gitignore: self.respect_gitignore,
            empty_dirs: self.empty_dirs,
            max_file_size: self.max_file_size,
            description: self.description,
            transform: TransformOptions {
                strip_comments: self.strip_comments,
                strip_docstrings: self.strip_docstrings,
                strip_function_bodies: self.strip_function_bodies,
                removed_functions: self.removed_functions,
                collapse_blank_lines: self.collapse_blank_lines,
            },
            file_settings: self.file_settings,
            num_threads: self.num_threads,
        })
    }

    /// Decode a record, checking the version before the field layout
    pub fn from_json(text: &str) -> std::result::Result<Self, PersistenceError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| PersistenceError::MalformedRecord(e.to_string()))?;
        let Some(object) = value.as_object() else {
            return Err(PersistenceError::MalformedRecord(
                "expected a JSON object".to_string(),
            ));
        };
        let version = object
            .get("version")
            .and_then(Value::as_u64)
            .ok_or_else(|| {
                PersistenceError::MalformedRecord("missing or invalid `version`".to_string())
            })?;
        check_version(version)?;

        serde_json::from_value(value).map_err(|e| PersistenceError::MalformedRecord(e.to_string()))
    }

    /// Encode as pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn check_version(found: u64) -> std::result::Result<(), PersistenceError> {
    if found == 0 || found > u64::from(SCHEMA_VERSION) {
        return Err(PersistenceError::VersionMismatch {
            found,
            supported: SCHEMA_VERSION,
        });
    }
    Ok(())
}

/// A session file on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    /// Store at an explicit path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store for `file` resolved against a project root
    pub fn in_root(root: &Path, file: &Path) -> Self {
        if file.is_absolute() {
            Self::new(file)
        } else {
            Self::new(root.join(file))
        }
    }

    /// Location of the session file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a session file exists
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Write the configuration and return the record that was saved
    pub fn save(&self, config: &Config) -> Result<SessionRecord> {
        let record = SessionRecord::from_config(config);
        let json = record.to_json()?;
        fs::write(&self.path, json + "\n").map_err(|e| TreegenError::FileAccess {
            path: self.path.clone(),
            source: e,
        })?;
        log::info!("Saved session to {}", self.path.display());
        Ok(record)
    }

    /// Read and decode the record without converting it
    pub fn read_record(&self) -> Result<SessionRecord> {
        let text = fs::read_to_string(&self.path).map_err(|e| TreegenError::FileAccess {
            path: self.path.clone(),
            source: e,
        })?;
        Ok(SessionRecord::from_json(&text)?)
    }

    /// Load the saved configuration
    pub fn load(&self) -> Result<Config> {
        let config = self.read_record()?.into_config()?;
        log::info!("Loaded session from {}", self.path.display());
        Ok(config)
    }

    /// Replace `config` with the saved one; on failure `config` is untouched
    pub fn restore_into(&self, config: &mut Config) -> Result<()> {
        *config = self.load()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_config() -> Config {
        let mut config = Config {
            root: PathBuf::from("/work/project"),
            output_file: PathBuf::from("out/prompt.xml"),
            format: OutputFormat::Xml,
            rules: vec![Rule::name("build"), Rule::glob("**/*.log")],
            source_only: true,
            respect_gitignore: true,
            empty_dirs: EmptyDirPolicy::Hide,
            max_file_size: 4096,
            description: Some("Demo project".to_string()),
            num_threads: 2,
            ..Config::default()
        };
        config.transform.strip_comments = true;
        config.transform.collapse_blank_lines = true;
        config.transform.removed_functions.insert("helper".to_string());
        config.file_settings.insert(
            "src/raw.py".to_string(),
            FileSettings {
                include: true,
                transform: Some(TransformOptions::default()),
            },
        );
        config
    }

    #[test]
    fn test_record_round_trip() {
        let config = sample_config();
        let json = SessionRecord::from_config(&config).to_json().unwrap();
        let restored = SessionRecord::from_json(&json)
            .unwrap()
            .into_config()
            .unwrap();
        assert_eq!(restored, config);
    }

    #[test]
    fn test_newer_version_is_rejected() {
        let mut record = serde_json::to_value(SessionRecord::from_config(&sample_config())).unwrap();
        record["version"] = Value::from(SCHEMA_VERSION + 1);
        // A newer schema may also have reshaped fields
        record["rules"] = Value::from("build");

        let err = SessionRecord::from_json(&record.to_string()).unwrap_err();
        assert!(matches!(
            err,
            PersistenceError::VersionMismatch { found: 2, supported: 1 }
        ));
    }

    #[test]
    fn test_missing_field_is_malformed() {
        let mut record = serde_json::to_value(SessionRecord::from_config(&sample_config())).unwrap();
        record.as_object_mut().unwrap().remove("rules");

        let err = SessionRecord::from_json(&record.to_string()).unwrap_err();
        assert!(matches!(err, PersistenceError::MalformedRecord(_)));
    }

    #[test]
    fn test_non_object_and_missing_version_are_malformed() {
        for text in ["[1, 2]", "{\"root\": \".\"}", "not json", "{\"version\": \"1\"}"] {
            let err = SessionRecord::from_json(text).unwrap_err();
            assert!(matches!(err, PersistenceError::MalformedRecord(_)), "{text}");
        }
    }

    #[test]
    fn test_zero_threads_is_malformed() {
        let mut record = SessionRecord::from_config(&sample_config());
        record.num_threads = 0;
        assert!(matches!(
            record.into_config(),
            Err(PersistenceError::MalformedRecord(_))
        ));
    }

    #[test]
    fn test_store_save_and_restore() {
        let dir = tempdir().unwrap();
        let store = SessionStore::in_root(dir.path(), Path::new(DEFAULT_SESSION_FILE));
        assert!(!store.exists());

        let saved = sample_config();
        store.save(&saved).unwrap();
        assert!(store.exists());
        assert_eq!(store.read_record().unwrap().version, SCHEMA_VERSION);

        let mut current = Config::default();
        store.restore_into(&mut current).unwrap();
        assert_eq!(current, saved);
    }

    #[test]
    fn test_failed_restore_leaves_config_untouched() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("broken.json"));

        let mut current = sample_config();
        let before = current.clone();

        // Missing file
        assert!(store.restore_into(&mut current).is_err());
        assert_eq!(current, before);

        fs::write(store.path(), "{\"version\": 99}").unwrap();
        let err = store.restore_into(&mut current).unwrap_err();
        assert!(matches!(
            err,
            TreegenError::Persistence(PersistenceError::VersionMismatch { found: 99, .. })
        ));
        assert_eq!(current, before);
    }
}
