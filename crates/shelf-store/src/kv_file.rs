use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::kv::KvBackend;

/// File-backed [`KvBackend`]: one file per entry under a base directory.
///
/// Writes go through a sibling `.tmp` file and a rename, so a crash mid-write
/// leaves the previous value readable. Entry names are restricted to simple
/// identifiers (the record store only uses well-known constants).
pub struct FileKv {
    base_dir: PathBuf,
    quota: Option<u64>,
}

impl FileKv {
    /// Open (or create) a file-backed store rooted at `base_dir`.
    pub fn open(base_dir: &Path) -> StoreResult<Self> {
        fs::create_dir_all(base_dir)?;
        Ok(Self {
            base_dir: base_dir.to_path_buf(),
            quota: None,
        })
    }

    /// Open with a total byte quota across all entries.
    pub fn open_with_quota(base_dir: &Path, quota: u64) -> StoreResult<Self> {
        let mut kv = Self::open(base_dir)?;
        kv.quota = Some(quota);
        Ok(kv)
    }

    fn entry_path(&self, entry: &str) -> StoreResult<PathBuf> {
        // Entry names are well-known constants, but reject anything that
        // could escape the base directory.
        if entry.is_empty()
            || !entry
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(StoreError::Serialization(format!(
                "invalid entry name: {entry:?}"
            )));
        }
        Ok(self.base_dir.join(format!("{entry}.json")))
    }

    /// Bytes currently stored, excluding the entry about to be replaced.
    fn used_bytes_excluding(&self, skip: &Path) -> StoreResult<u64> {
        let mut used = 0;
        for dirent in fs::read_dir(&self.base_dir)? {
            let dirent = dirent?;
            let path = dirent.path();
            if path.is_file() && path != skip {
                used += dirent.metadata()?.len();
            }
        }
        Ok(used)
    }
}

impl KvBackend for FileKv {
    fn get(&self, entry: &str) -> StoreResult<Option<String>> {
        let path = self.entry_path(entry)?;
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(&path)?))
    }

    fn set(&self, entry: &str, value: &str) -> StoreResult<()> {
        let path = self.entry_path(entry)?;

        if let Some(quota) = self.quota {
            let used = self.used_bytes_excluding(&path)?;
            let requested = value.len() as u64;
            if used + requested > quota {
                return Err(StoreError::StorageFull {
                    used,
                    quota,
                    requested,
                });
            }
        }

        let tmp = path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        debug!(entry, bytes = value.len(), "kv entry written");
        Ok(())
    }

    fn remove(&self, entry: &str) -> StoreResult<()> {
        let path = self.entry_path(entry)?;
        if path.is_file() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}
