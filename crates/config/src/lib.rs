use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Represents the full CLI configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub default_profile: Option<String>,
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Config {
    /// Load configuration from the provided path or the default config file.
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let path = path
            .map(|p| p.as_ref().to_path_buf())
            .unwrap_or_else(Config::default_path);

        if !path.exists() {
            return Ok(Config::default());
        }

        debug!(path = %path.display(), "Loading config");
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("Unable to read config file at {}", path.display()))?;

        serde_yaml::from_str(&raw)
            .with_context(|| format!("Malformed YAML in config file {}", path.display()))
    }

    /// Persist the configuration to disk, creating parent directories if needed.
    pub fn save<P: AsRef<Path>>(&self, path: Option<P>) -> Result<()> {
        let path = path
            .map(|p| p.as_ref().to_path_buf())
            .unwrap_or_else(Config::default_path);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Unable to create config directory {}", parent.display())
            })?;
        }

        let serialized = serde_yaml::to_string(self)?;
        fs::write(&path, serialized)
            .with_context(|| format!("Unable to write config file {}", path.display()))?;

        Ok(())
    }

    /// Convenience helper to retrieve a profile by name.
    pub fn profile(&self, name: &str) -> Option<&Profile> {
        self.profiles.get(name)
    }

    /// Insert or replace a profile. The first profile ever stored becomes
    /// the default so a fresh `auth login` is immediately usable.
    pub fn upsert_profile(&mut self, name: impl Into<String>, profile: Profile) {
        let name = name.into();
        if self.default_profile.is_none() {
            self.default_profile = Some(name.clone());
        }
        self.profiles.insert(name, profile);
    }

    /// Returns either the requested profile or falls back to the default one.
    pub fn resolve_profile<'a>(
        &'a self,
        requested: Option<&'a str>,
    ) -> Option<(&'a str, &'a Profile)> {
        if let Some(name) = requested {
            self.profiles.get(name).map(|profile| (name, profile))
        } else if let Some(default_name) = self.default_profile.as_deref() {
            self.profiles
                .get(default_name)
                .map(|profile| (default_name, profile))
        } else if let Some((name, profile)) = self.profiles.iter().next() {
            Some((name.as_str(), profile))
        } else {
            None
        }
    }

    fn default_path() -> PathBuf {
        let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(".redmine-cli");
        path.push("config.yaml");
        path
    }
}

/// A single Redmine installation. The API key itself lives in the
/// credential store or in the environment, never in this file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Profile {
    pub base_url: Option<String>,
    /// Project identifier used when a command is run without `--project`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetrySettings>,
}

/// Per-profile retry knobs. Unset fields fall back to the client defaults
/// (3 attempts, 60 second wait).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct RetrySettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_secs: Option<u64>,
}

impl RetrySettings {
    pub fn or_defaults(self) -> (usize, u64) {
        (self.max_attempts.unwrap_or(3), self.wait_secs.unwrap_or(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.default_profile.is_none());
        assert!(config.profiles.is_empty());
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Some("/nonexistent/config.yaml"));
        assert!(result.is_ok());
        let config = result.unwrap();
        assert!(config.profiles.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let mut config = Config {
            default_profile: Some("lab".to_string()),
            ..Default::default()
        };

        let profile = Profile {
            base_url: Some("https://tracker.example.org/redmine".to_string()),
            default_project: Some("cfia".to_string()),
            retry: Some(RetrySettings {
                max_attempts: Some(5),
                wait_secs: Some(10),
            }),
        };

        config.profiles.insert("lab".to_string(), profile);

        let temp_file = NamedTempFile::new().unwrap();
        let temp_path = temp_file.path();

        config.save(Some(temp_path)).unwrap();
        let loaded = Config::load(Some(temp_path)).unwrap();

        assert_eq!(loaded.default_profile, Some("lab".to_string()));
        assert_eq!(loaded.profiles.len(), 1);

        let lab = loaded.profiles.get("lab").unwrap();
        assert_eq!(
            lab.base_url,
            Some("https://tracker.example.org/redmine".to_string())
        );
        assert_eq!(lab.default_project, Some("cfia".to_string()));
        let retry = lab.retry.unwrap();
        assert_eq!(retry.max_attempts, Some(5));
        assert_eq!(retry.wait_secs, Some(10));
    }

    #[test]
    fn test_load_malformed_yaml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "invalid: yaml: [unclosed").unwrap();

        let result = Config::load(Some(temp_file.path()));
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Malformed YAML"));
    }

    #[test]
    fn test_resolve_profile_requested() {
        let mut config = Config {
            default_profile: Some("lab".to_string()),
            ..Default::default()
        };

        config.profiles.insert(
            "lab".to_string(),
            Profile {
                base_url: Some("https://lab.example.org".to_string()),
                ..Default::default()
            },
        );
        config.profiles.insert(
            "staging".to_string(),
            Profile {
                base_url: Some("https://staging.example.org".to_string()),
                ..Default::default()
            },
        );

        let (name, profile) = config.resolve_profile(Some("staging")).unwrap();
        assert_eq!(name, "staging");
        assert_eq!(
            profile.base_url,
            Some("https://staging.example.org".to_string())
        );
    }

    #[test]
    fn test_resolve_profile_default() {
        let mut config = Config {
            default_profile: Some("lab".to_string()),
            ..Default::default()
        };

        config.profiles.insert(
            "lab".to_string(),
            Profile {
                base_url: Some("https://lab.example.org".to_string()),
                ..Default::default()
            },
        );

        let (name, _) = config.resolve_profile(None).unwrap();
        assert_eq!(name, "lab");
    }

    #[test]
    fn test_resolve_profile_first_available() {
        let mut config = Config::default();
        config.profiles.insert(
            "only".to_string(),
            Profile {
                base_url: Some("https://only.example.org".to_string()),
                ..Default::default()
            },
        );

        let (name, _) = config.resolve_profile(None).unwrap();
        assert_eq!(name, "only");
    }

    #[test]
    fn test_resolve_profile_none_available() {
        let config = Config::default();
        assert!(config.resolve_profile(None).is_none());
        assert!(config.resolve_profile(Some("missing")).is_none());
    }

    #[test]
    fn test_upsert_first_profile_becomes_default() {
        let mut config = Config::default();
        config.upsert_profile(
            "lab",
            Profile {
                base_url: Some("https://lab.example.org".to_string()),
                ..Default::default()
            },
        );
        config.upsert_profile("staging", Profile::default());

        assert_eq!(config.default_profile.as_deref(), Some("lab"));
        assert_eq!(config.profiles.len(), 2);
    }

    #[test]
    fn test_retry_settings_fall_back_to_client_defaults() {
        assert_eq!(RetrySettings::default().or_defaults(), (3, 60));
        let custom = RetrySettings {
            max_attempts: Some(5),
            wait_secs: None,
        };
        assert_eq!(custom.or_defaults(), (5, 60));
    }

    #[test]
    fn test_retry_settings_are_optional_in_yaml() {
        let yaml = "profiles:\n  lab:\n    base_url: https://lab.example.org\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let lab = config.profile("lab").unwrap();
        assert!(lab.retry.is_none());
        assert!(lab.default_project.is_none());
    }
}
