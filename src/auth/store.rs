//! Persisted account settings.
//!
//! The encrypted store keeps every account's settings in one AES-256-GCM
//! sealed file (~/.config/roost/credentials.enc). The encryption key is
//! derived from machine-specific identifiers.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::oauth::redact;
use crate::error::{Error, Result};
use crate::lock::lock;
use crate::paths;

const NONCE_SIZE: usize = 12;

/// Settings group for an account: `username@host`
pub fn settings_group_name(username: &str, instance_uri: &str) -> String {
    let host = instance_uri
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/');
    format!("{username}@{host}")
}

/// Everything needed to restore a session
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSettings {
    /// Instance URI (`https://host`)
    pub instance_uri: String,
    /// Local username
    pub username: String,
    /// OAuth client id
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: String,
    /// User access token
    pub token: String,
}

impl AccountSettings {
    /// Key under which these settings are stored
    pub fn group_name(&self) -> String {
        settings_group_name(&self.username, &self.instance_uri)
    }
}

impl fmt::Debug for AccountSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountSettings")
            .field("instance_uri", &self.instance_uri)
            .field("username", &self.username)
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .field("token", &redact(&self.token))
            .finish()
    }
}

/// Somewhere account settings live between runs
pub trait SettingsStore: Send + Sync {
    /// Every stored account, in a stable order
    fn load_all(&self) -> Result<Vec<AccountSettings>>;
    /// Insert or replace one account's settings
    fn save(&self, settings: &AccountSettings) -> Result<()>;
    /// Forget one account
    fn remove(&self, group_name: &str) -> Result<()>;
}

/// In-memory store, used by tests and one-shot sessions
#[derive(Debug, Default)]
pub struct MemoryStore {
    groups: Mutex<BTreeMap<String, AccountSettings>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemoryStore {
    fn load_all(&self) -> Result<Vec<AccountSettings>> {
        Ok(lock(&self.groups).values().cloned().collect())
    }

    fn save(&self, settings: &AccountSettings) -> Result<()> {
        lock(&self.groups).insert(settings.group_name(), settings.clone());
        Ok(())
    }

    fn remove(&self, group_name: &str) -> Result<()> {
        lock(&self.groups).remove(group_name);
        Ok(())
    }
}

/// Get machine ID for key derivation (cross-platform)
fn get_machine_id() -> String {
    #[cfg(target_os = "linux")]
    {
        for path in ["/etc/machine-id", "/var/lib/dbus/machine-id"] {
            if let Ok(id) = fs::read_to_string(path) {
                return id.trim().to_string();
            }
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Ok(output) = std::process::Command::new("ioreg")
            .args(["-rd1", "-c", "IOPlatformExpertDevice"])
            .output()
        {
            let stdout = String::from_utf8_lossy(&output.stdout);
            if let Some(uuid) = stdout
                .lines()
                .find(|line| line.contains("IOPlatformUUID"))
                .and_then(|line| line.split('"').nth(3))
            {
                return uuid.to_string();
            }
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(output) = std::process::Command::new("reg")
            .args(["query", r"HKLM\SOFTWARE\Microsoft\Cryptography", "/v", "MachineGuid"])
            .output()
        {
            let stdout = String::from_utf8_lossy(&output.stdout);
            if let Some(guid) = stdout
                .lines()
                .find(|line| line.contains("MachineGuid"))
                .and_then(|line| line.split_whitespace().last())
            {
                return guid.to_string();
            }
        }
    }

    dirs::home_dir().map_or_else(
        || "roost-fallback-key".to_string(),
        |p| p.to_string_lossy().to_string(),
    )
}

/// Derive encryption key from machine-specific data
fn derive_key() -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(get_machine_id().as_bytes());
    if let Some(home) = dirs::home_dir() {
        hasher.update(home.to_string_lossy().as_bytes());
    }
    hasher.update(b"roost-client-core-v1");
    hasher.finalize().into()
}

/// AES-256-GCM sealed file holding every account's settings
pub struct EncryptedFileStore {
    path: PathBuf,
    key: [u8; 32],
}

impl fmt::Debug for EncryptedFileStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedFileStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl EncryptedFileStore {
    /// Store at the default location (~/.config/roost/credentials.enc)
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(paths::credentials_path()?))
    }

    /// Store at an explicit path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            key: derive_key(),
        }
    }

    /// File backing this store
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn cipher(&self) -> Result<Aes256Gcm> {
        Aes256Gcm::new_from_slice(&self.key).map_err(|e| Error::Storage(format!("Invalid key: {e}")))
    }

    fn read_groups(&self) -> Result<HashMap<String, AccountSettings>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }

        let encrypted = fs::read(&self.path)?;
        if encrypted.len() < NONCE_SIZE {
            tracing::warn!("credentials file {} is truncated; ignoring", self.path.display());
            return Ok(HashMap::new());
        }

        let (nonce_bytes, ciphertext) = encrypted.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher()?
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| Error::Storage("Failed to decrypt credentials".to_string()))?;

        Ok(serde_json::from_slice(&plaintext)?)
    }

    fn write_groups(&self, groups: &HashMap<String, AccountSettings>) -> Result<()> {
        let json = serde_json::to_vec(groups)?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::rng().fill(&mut nonce_bytes);

        let ciphertext = self
            .cipher()?
            .encrypt(Nonce::from_slice(&nonce_bytes), json.as_slice())
            .map_err(|_| Error::Storage("Failed to encrypt credentials".to_string()))?;

        let mut output = nonce_bytes.to_vec();
        output.extend(ciphertext);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, output)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&self.path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&self.path, perms)?;
        }

        Ok(())
    }
}

impl SettingsStore for EncryptedFileStore {
    fn load_all(&self) -> Result<Vec<AccountSettings>> {
        let mut all: Vec<_> = self.read_groups()?.into_values().collect();
        all.sort_by_key(AccountSettings::group_name);
        Ok(all)
    }

    fn save(&self, settings: &AccountSettings) -> Result<()> {
        let mut groups = self.read_groups().unwrap_or_else(|e| {
            tracing::warn!("Starting a fresh credentials file: {e}");
            HashMap::new()
        });
        groups.insert(settings.group_name(), settings.clone());
        self.write_groups(&groups)
    }

    fn remove(&self, group_name: &str) -> Result<()> {
        let mut groups = self.read_groups()?;
        if groups.remove(group_name).is_some() {
            self.write_groups(&groups)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn settings(username: &str) -> AccountSettings {
        AccountSettings {
            instance_uri: "https://example.social".into(),
            username: username.into(),
            client_id: "cid".into(),
            client_secret: "csecret".into(),
            token: "tok".into(),
        }
    }

    #[test]
    fn test_group_name() {
        assert_eq!(settings("alice").group_name(), "alice@example.social");
        assert_eq!(settings_group_name("bob", "pleroma.example/"), "bob@pleroma.example");
    }

    #[test]
    fn test_debug_redacts() {
        let debug = format!("{:?}", settings("alice"));
        assert!(!debug.contains("csecret"));
        assert!(!debug.contains("\"tok\""));
    }

    #[test]
    fn test_encrypted_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = EncryptedFileStore::new(dir.path().join("credentials.enc"));

        store.save(&settings("alice")).unwrap();
        store.save(&settings("bob")).unwrap();

        let raw = fs::read(store.path()).unwrap();
        assert!(!String::from_utf8_lossy(&raw).contains("csecret"));

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded, vec![settings("alice"), settings("bob")]);

        store.remove("alice@example.social").unwrap();
        assert_eq!(store.load_all().unwrap(), vec![settings("bob")]);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = EncryptedFileStore::new(dir.path().join("none.enc"));
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("credentials.enc");
        fs::write(&path, vec![7u8; 64]).unwrap();
        let store = EncryptedFileStore::new(path);
        assert!(matches!(store.load_all(), Err(Error::Storage(_))));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        store.save(&settings("alice")).unwrap();
        let mut updated = settings("alice");
        updated.token = "new".into();
        store.save(&updated).unwrap();

        assert_eq!(store.load_all().unwrap(), vec![updated]);
        store.remove("alice@example.social").unwrap();
        assert!(store.load_all().unwrap().is_empty());
    }
}
