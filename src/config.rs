// ⚙️ Settings - file locations, engine choice and access policy
// JSON on disk; every field has a default so a partial (or missing) file works

use crate::access::AccessPolicy;
use crate::db::DEFAULT_LIMIT;
use crate::error::Result;
use crate::recognizer::EngineSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// SQLite ledger database
    pub ledger_path: PathBuf,

    /// Text audit log
    pub audit_path: PathBuf,

    /// Leaderboard size when no limit is given
    pub default_limit: usize,

    pub engine: EngineSettings,

    pub access: AccessPolicy,

    /// Listen address for the HTTP server
    pub bind_addr: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ledger_path: PathBuf::from("bear_hunt.db"),
            audit_path: PathBuf::from("upload_log.txt"),
            default_limit: DEFAULT_LIMIT,
            engine: EngineSettings::default(),
            access: AccessPolicy::default(),
            bind_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }

        let text = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&text)?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();

        let settings = Settings::load(&dir.path().join("nope.json")).unwrap();

        assert_eq!(settings, Settings::default());
        assert_eq!(settings.default_limit, 10);
        assert_eq!(settings.access.required_role.as_deref(), Some("OCR Access"));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bear_hunt.json");
        fs::write(
            &path,
            r#"{
                "default_limit": 25,
                "engine": {"kind": "plain_text"},
                "access": {"allowed_channels": [112233]}
            }"#,
        )
        .unwrap();

        let settings = Settings::load(&path).unwrap();

        assert_eq!(settings.default_limit, 25);
        assert_eq!(settings.engine, EngineSettings::PlainText);
        assert_eq!(settings.access.allowed_channels, Some(vec![112233]));
        assert_eq!(settings.access.allowed_users, None);
        assert_eq!(settings.access.required_role.as_deref(), Some("OCR Access"));
        assert_eq!(settings.ledger_path, PathBuf::from("bear_hunt.db"));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bear_hunt.json");
        let mut settings = Settings::default();
        settings.bind_addr = "127.0.0.1:8080".to_string();

        settings.save(&path).unwrap();

        assert_eq!(Settings::load(&path).unwrap(), settings);
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(Settings::load(&path), Err(LedgerError::Config(_))));
    }
}
