//! Local persistence of client identities.

use super::{ClientError, Keypair};
use crate::codec;
use crate::crypto::Algorithm;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// One registered identity as kept on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredIdentity {
    pub handle: String,
    /// Fixed at registration and reused for every login
    pub algorithm: Algorithm,
    /// Base64 private key bytes
    pub private_key: String,
    /// Base64 public key bytes
    pub public_key: String,
    pub created_at: DateTime<Utc>,
}

impl StoredIdentity {
    pub fn new(handle: impl Into<String>, keypair: &Keypair, created_at: DateTime<Utc>) -> Self {
        Self {
            handle: handle.into(),
            algorithm: keypair.algorithm(),
            private_key: codec::encode(&keypair.private_key_bytes()),
            public_key: codec::encode(&keypair.public_key_bytes()),
            created_at,
        }
    }

    pub fn keypair(&self) -> Result<Keypair, ClientError> {
        let secret = codec::decode(&self.private_key)
            .map_err(|_| ClientError::CorruptKey(format!("private key of {} is not base64", self.handle)))?;
        Keypair::from_private_bytes(self.algorithm, &secret)
    }
}

/// Capability interface for private key storage.
pub trait KeyStore: Send + Sync {
    /// Whether this store can hold keys of `algorithm`.
    fn supports(&self, algorithm: Algorithm) -> bool;

    fn save(&self, identity: &StoredIdentity) -> Result<(), ClientError>;

    /// Fails with `UnknownIdentity` when nothing is stored for `handle`.
    fn load(&self, handle: &str) -> Result<StoredIdentity, ClientError>;

    fn list(&self) -> Result<Vec<StoredIdentity>, ClientError>;

    /// Returns whether an identity was removed.
    fn remove(&self, handle: &str) -> Result<bool, ClientError>;
}

/// One JSON file per handle under a private directory.
#[derive(Debug, Clone)]
pub struct FileKeyStore {
    dir: PathBuf,
}

impl FileKeyStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `~/.authgrid`
    pub fn default_dir() -> Result<PathBuf, ClientError> {
        dirs::home_dir()
            .map(|home| home.join(".authgrid"))
            .ok_or_else(|| ClientError::Io(std::io::Error::new(ErrorKind::NotFound, "no home directory")))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, handle: &str) -> Result<PathBuf, ClientError> {
        // Handles become file names
        if handle.is_empty() || handle.starts_with('.') || handle.contains(['/', '\\']) {
            return Err(ClientError::InvalidHandle(handle.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", handle)))
    }

    /// Creates the directory as 0700 from the start; an existing one is tightened.
    fn ensure_dir(&self) -> Result<(), ClientError> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
            fs::DirBuilder::new().recursive(true).mode(0o700).create(&self.dir)?;
            fs::set_permissions(&self.dir, fs::Permissions::from_mode(0o700))?;
        }

        #[cfg(not(unix))]
        fs::create_dir_all(&self.dir)?;

        Ok(())
    }
}

/// Open `path` for writing with owner-only access before any byte lands in it.
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    let file = {
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
        let file = options.mode(0o600).open(path)?;
        // mode() only applies when the file is created
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
        file
    };

    #[cfg(not(unix))]
    let file = options.open(path)?;

    Ok(file)
}

impl KeyStore for FileKeyStore {
    fn supports(&self, _algorithm: Algorithm) -> bool {
        true
    }

    fn save(&self, identity: &StoredIdentity) -> Result<(), ClientError> {
        let path = self.path_for(&identity.handle)?;
        self.ensure_dir()?;

        let contents = serde_json::to_string_pretty(identity)?;
        let mut file = open_private(&path)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;

        tracing::debug!("Saved identity {} to {}", identity.handle, path.display());
        Ok(())
    }

    fn load(&self, handle: &str) -> Result<StoredIdentity, ClientError> {
        let path = self.path_for(handle)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(ClientError::UnknownIdentity(handle.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self) -> Result<Vec<StoredIdentity>, ClientError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut identities = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            match fs::read_to_string(&path).map_err(ClientError::from).and_then(|contents| {
                serde_json::from_str::<StoredIdentity>(&contents).map_err(ClientError::from)
            }) {
                Ok(identity) => identities.push(identity),
                Err(e) => tracing::warn!("Skipping unreadable key file {}: {}", path.display(), e),
            }
        }

        identities.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(identities)
    }

    fn remove(&self, handle: &str) -> Result<bool, ClientError> {
        let path = self.path_for(handle)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
