use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

/// File-backed store for Redmine API keys, one entry per profile.
///
/// Keys live in a JSON map at `~/.redmine-cli/credentials`, written with
/// 0600 permissions on unix. Unreadable or malformed files are treated as
/// empty rather than bricking the CLI.
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new() -> Result<Self> {
        let home = dirs::home_dir().context("Cannot determine home directory")?;
        Ok(Self {
            path: home.join(".redmine-cli").join("credentials"),
        })
    }

    /// Store rooted at an explicit file, mainly for tests.
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn set_key(&self, profile: &str, api_key: &str) -> Result<()> {
        let mut creds = self.read_all();
        creds.insert(profile.to_string(), api_key.to_string());
        self.write_all(&creds)
    }

    pub fn get_key(&self, profile: &str) -> Result<Option<String>> {
        Ok(self.read_all().get(profile).cloned())
    }

    pub fn delete_key(&self, profile: &str) -> Result<()> {
        let mut creds = self.read_all();
        if creds.remove(profile).is_none() {
            return Ok(());
        }
        self.write_all(&creds)
    }

    fn read_all(&self) -> HashMap<String, String> {
        fs::read_to_string(&self.path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default()
    }

    fn write_all(&self, creds: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Unable to create {}", parent.display()))?;
        }

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options
            .open(&self.path)
            .with_context(|| format!("Unable to write {}", self.path.display()))?;
        let json = serde_json::to_string_pretty(creds)?;
        file.write_all(json.as_bytes())?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> CredentialStore {
        CredentialStore::at_path(dir.path().join("credentials"))
    }

    #[test]
    fn keys_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store.set_key("lab", "d4c1f3").unwrap();
        store.set_key("staging", "0ff1ce").unwrap();

        assert_eq!(store.get_key("lab").unwrap().as_deref(), Some("d4c1f3"));
        assert_eq!(store.get_key("staging").unwrap().as_deref(), Some("0ff1ce"));
        assert_eq!(store.get_key("missing").unwrap(), None);
    }

    #[test]
    fn delete_removes_only_the_requested_profile() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store.set_key("lab", "d4c1f3").unwrap();
        store.set_key("staging", "0ff1ce").unwrap();
        store.delete_key("lab").unwrap();

        assert_eq!(store.get_key("lab").unwrap(), None);
        assert_eq!(store.get_key("staging").unwrap().as_deref(), Some("0ff1ce"));

        // Deleting an absent profile is a no-op.
        store.delete_key("lab").unwrap();
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert_eq!(store.get_key("lab").unwrap(), None);
    }

    #[test]
    fn malformed_file_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("credentials");
        fs::write(&path, "not json").unwrap();

        let store = CredentialStore::at_path(&path);
        assert_eq!(store.get_key("lab").unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    fn credentials_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.set_key("lab", "d4c1f3").unwrap();

        let mode = fs::metadata(dir.path().join("credentials"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
