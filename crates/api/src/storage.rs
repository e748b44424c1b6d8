//! Asset storage for session images.
//!
//! Every asset lives under the upload directory, keyed by session id,
//! role, and original extension: `users/<id>_user.<ext>`,
//! `garments/<id>_garment.<ext>`, `outputs/<id>_output.<ext>`. The
//! returned references are origin-relative URLs (`/uploads/...`) that the
//! static file route serves directly, so an asset can never be served for
//! a different session than it was written for.

use std::path::{Path, PathBuf};

use uuid::Uuid;

/// The three logical roles an asset can have within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetRole {
    User,
    Garment,
    Output,
}

impl AssetRole {
    /// Subdirectory of the upload dir holding assets of this role.
    pub fn subdir(&self) -> &'static str {
        match self {
            AssetRole::User => "users",
            AssetRole::Garment => "garments",
            AssetRole::Output => "outputs",
        }
    }

    /// Filename tag distinguishing roles within a session.
    pub fn tag(&self) -> &'static str {
        match self {
            AssetRole::User => "user",
            AssetRole::Garment => "garment",
            AssetRole::Output => "output",
        }
    }
}

/// Manages session image files on the local filesystem.
pub struct StorageService {
    upload_dir: PathBuf,
}

impl StorageService {
    /// Create the service and ensure the role subdirectories exist.
    pub async fn new(upload_dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let upload_dir = upload_dir.into();
        for role in [AssetRole::User, AssetRole::Garment, AssetRole::Output] {
            tokio::fs::create_dir_all(upload_dir.join(role.subdir())).await?;
        }
        Ok(Self { upload_dir })
    }

    /// The directory served at `/uploads`.
    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// The origin-relative reference an asset will be stored under.
    /// Deterministic, so callers may record it before the bytes land.
    pub fn reference_for(&self, session_id: Uuid, role: AssetRole, ext: &str) -> String {
        format!(
            "/uploads/{}/{session_id}_{}.{ext}",
            role.subdir(),
            role.tag()
        )
    }

    /// Write an asset and return its origin-relative reference.
    pub async fn save(
        &self,
        session_id: Uuid,
        role: AssetRole,
        bytes: &[u8],
        ext: &str,
    ) -> std::io::Result<String> {
        let filename = format!("{session_id}_{}.{ext}", role.tag());
        let path = self.upload_dir.join(role.subdir()).join(&filename);
        tokio::fs::write(&path, bytes).await?;
        Ok(self.reference_for(session_id, role, ext))
    }

    /// Resolve a `/uploads/...` reference back to an absolute path.
    ///
    /// Returns `None` for references outside the upload dir (wrong prefix
    /// or path traversal).
    pub fn resolve(&self, reference: &str) -> Option<PathBuf> {
        let rel = reference.strip_prefix("/uploads/")?;
        if rel.is_empty() || rel.split('/').any(|part| part == "..") {
            return None;
        }
        Some(self.upload_dir.join(rel))
    }

    /// Delete every referenced file, best-effort and idempotent.
    ///
    /// A missing file is logged at debug and skipped; an I/O failure on one
    /// file is logged and does not abort the rest.
    pub async fn delete_session_files(&self, refs: &[Option<&str>]) {
        for reference in refs.iter().flatten().copied() {
            let Some(path) = self.resolve(reference) else {
                tracing::warn!(reference, "Skipping unresolvable asset reference");
                continue;
            };
            match tokio::fs::remove_file(&path).await {
                Ok(()) => tracing::info!(path = %path.display(), "Deleted asset"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!(path = %path.display(), "Asset already gone");
                }
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "Failed to delete asset");
                }
            }
        }
    }
}
