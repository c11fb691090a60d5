//! Physical storage substrate.
//!
//! All byte-level operations against the mirrored on-disk tree live here,
//! including the staging paths that make deletion and overwrite reversible
//! until the catalog commit succeeds.

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

/// Handle on the storage root. Paths are storage-root-relative slash strings
/// exactly as stored on catalog rows.
#[derive(Debug, Clone)]
pub struct PhysicalStorage {
    root: PathBuf,
}

impl PhysicalStorage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path for a stored relative path. Absolute stored paths are
    /// rooted as-is.
    pub fn absolute(&self, relative: &str) -> PathBuf {
        if relative.is_empty() {
            self.root.clone()
        } else if Path::new(relative).is_absolute() {
            PathBuf::from(relative)
        } else {
            self.root.join(relative)
        }
    }

    /// Inverse of [`absolute`]: strip the storage-root prefix from an
    /// absolute path, yielding the store-relative slash form.
    pub fn to_relative(&self, absolute: &Path) -> Option<String> {
        let stripped = absolute.strip_prefix(&self.root).ok()?;
        let mut out = String::new();
        for component in stripped.components() {
            if !out.is_empty() {
                out.push('/');
            }
            out.push_str(&component.as_os_str().to_string_lossy());
        }
        Some(out)
    }

    pub async fn exists(&self, relative: &str) -> bool {
        fs::try_exists(self.absolute(relative)).await.unwrap_or(false)
    }

    pub async fn create_dir(&self, relative: &str) -> io::Result<()> {
        fs::create_dir_all(self.absolute(relative)).await
    }

    pub async fn remove_dir_all(&self, relative: &str) -> io::Result<()> {
        fs::remove_dir_all(self.absolute(relative)).await
    }

    pub async fn remove_file(&self, relative: &str) -> io::Result<()> {
        fs::remove_file(self.absolute(relative)).await
    }

    /// Rename/move within the storage tree, creating the target's parent if
    /// needed.
    pub async fn rename(&self, from: &str, to: &str) -> io::Result<()> {
        let target = self.absolute(to);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::rename(self.absolute(from), target).await
    }

    /// Two-step rename through a temporary name, for renames differing only
    /// by case: many filesystems treat the two names as the same entry.
    pub async fn rename_case_only(&self, from: &str, to: &str) -> io::Result<()> {
        let staging = format!("{to}.casing-{}", short_token());
        self.rename(from, &staging).await?;
        match self.rename(&staging, to).await {
            Ok(()) => Ok(()),
            Err(e) => {
                // Best effort to land back on the original name
                let _ = self.rename(&staging, from).await;
                Err(e)
            }
        }
    }

    pub async fn write_file(&self, relative: &str, bytes: &[u8]) -> io::Result<()> {
        let target = self.absolute(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(target, bytes).await
    }

    pub async fn read_file(&self, relative: &str) -> io::Result<Vec<u8>> {
        fs::read(self.absolute(relative)).await
    }

    pub async fn copy_file(&self, from: &str, to: &str) -> io::Result<u64> {
        let target = self.absolute(to);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::copy(self.absolute(from), target).await
    }

    /// Unique sibling path a directory or file is staged at before deletion,
    /// so the catalog commit can still be reversed by moving it back.
    pub fn pending_delete_path(&self, relative: &str) -> String {
        format!("{relative}.pending-delete-{}", short_token())
    }

    /// Unique sibling path a displaced file is parked at during an overwrite.
    pub fn pending_replace_path(&self, relative: &str) -> String {
        format!("{relative}.pending-replace-{}", short_token())
    }

    /// Actual on-disk casing of a child entry matching `name`
    /// case-insensitively, if present.
    pub async fn disk_name_of(
        &self,
        parent_relative: &str,
        name: &str,
    ) -> io::Result<Option<String>> {
        let mut entries = fs::read_dir(self.absolute(parent_relative)).await?;
        let wanted = name.to_lowercase();
        while let Some(entry) = entries.next_entry().await? {
            let entry_name = entry.file_name().to_string_lossy().to_string();
            if entry_name.to_lowercase() == wanted {
                return Ok(Some(entry_name));
            }
        }
        Ok(None)
    }
}

fn short_token() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_round_trip() {
        let storage = PhysicalStorage::new(PathBuf::from("/vault/storage"));
        let abs = storage.absolute("Docs/report.txt");
        assert_eq!(abs, PathBuf::from("/vault/storage/Docs/report.txt"));
        assert_eq!(
            storage.to_relative(&abs).as_deref(),
            Some("Docs/report.txt")
        );
    }

    #[test]
    fn absolute_stored_paths_pass_through() {
        let storage = PhysicalStorage::new(PathBuf::from("/vault/storage"));
        assert_eq!(
            storage.absolute("/elsewhere/file.bin"),
            PathBuf::from("/elsewhere/file.bin")
        );
    }

    #[test]
    fn staging_paths_stay_siblings() {
        let storage = PhysicalStorage::new(PathBuf::from("/vault/storage"));
        let staged = storage.pending_delete_path("Docs/Drafts");
        assert!(staged.starts_with("Docs/Drafts.pending-delete-"));
    }
}
