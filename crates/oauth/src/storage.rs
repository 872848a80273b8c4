use std::{
    collections::BTreeMap,
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use {
    serde_json::Value,
    tracing::{debug, info},
};

use crate::{credential::Credential, error::Result, types::Provider};

/// File name used by [`FileCredentialStore::in_dir`].
pub const CREDENTIALS_FILE: &str = "credentials.json";

/// Where credentials live between runs.
pub trait CredentialStore: Send + Sync {
    fn save(&self, provider: Provider, credential: &Credential) -> Result<()>;

    fn load(&self, provider: Provider) -> Result<Option<Credential>>;

    /// Removing a provider that has no credential is not an error.
    fn delete(&self, provider: Provider) -> Result<()>;

    fn list(&self) -> Result<Vec<Provider>>;
}

/// JSON file holding one credential per provider, keyed by provider name.
///
/// Writers serialize on an exclusive lock file and replace the credential
/// file atomically, so readers never see a partial write.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(CREDENTIALS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| CREDENTIALS_FILE.into());
        name.push(".lock");
        self.dir().join(name)
    }

    /// Read-modify-write under the exclusive lock.
    fn update<T>(&self, f: impl FnOnce(&mut BTreeMap<String, Value>) -> T) -> Result<T> {
        fs::create_dir_all(self.dir())?;
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())?;
        let mut lock = fd_lock::RwLock::new(lock_file);
        let _guard = lock.write()?;

        let mut all = self.read_all()?;
        let out = f(&mut all);
        self.write_all(&all)?;
        Ok(out)
    }

    fn read_all(&self) -> Result<BTreeMap<String, Value>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&content).map_err(io::Error::from)?)
    }

    fn write_all(&self, all: &BTreeMap<String, Value>) -> Result<()> {
        let mut tmp = tempfile::NamedTempFile::new_in(self.dir())?;
        serde_json::to_writer_pretty(&mut tmp, all).map_err(io::Error::from)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o600))?;
        }
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn save(&self, provider: Provider, credential: &Credential) -> Result<()> {
        let value = serde_json::to_value(credential).map_err(io::Error::from)?;
        self.update(|all| all.insert(provider.as_str().to_string(), value))?;
        info!(%provider, path = %self.path.display(), "credential saved");
        Ok(())
    }

    fn load(&self, provider: Provider) -> Result<Option<Credential>> {
        match self.read_all()?.remove(provider.as_str()) {
            Some(value) => Ok(Some(
                serde_json::from_value(value).map_err(io::Error::from)?,
            )),
            None => Ok(None),
        }
    }

    fn delete(&self, provider: Provider) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        let removed = self.update(|all| all.remove(provider.as_str()).is_some())?;
        debug!(%provider, removed, "credential deleted");
        Ok(())
    }

    fn list(&self) -> Result<Vec<Provider>> {
        Ok(self
            .read_all()?
            .keys()
            .filter_map(|key| key.parse().ok())
            .collect())
    }
}
