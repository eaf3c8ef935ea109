//! Filesystem-backed artifact store
//!
//! Directory layout:
//! ```text
//! <output_dir>/
//! ├── static/
//! │   ├── <id>.mp3
//! │   └── ...
//! └── genai/
//!     ├── <id>-<timestamp>-<seq>.mp3
//!     └── ...
//! ```
//!
//! Artifacts are addressed by their path relative to the root, always with
//! `/` separators. Writes go to a `.part` sibling first and are renamed into
//! place, so readers and rescans never observe a half-written artifact.

use crate::error::Result;
use crate::media::{is_artifact_file, MediaFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Artifact class, which also decides the subdirectory it lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactClass {
    /// Generated once, kept forever
    Static,
    /// Generated from a template, consumed at most once
    Generative,
}

impl ArtifactClass {
    pub fn subdir(&self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Generative => "genai",
        }
    }
}

/// Whether a path segment can appear in a URL as-is.
///
/// Artifact URLs are built by plain concatenation and request paths are
/// matched without percent-decoding, so only `[A-Za-z0-9._-]` is allowed.
pub fn is_url_safe_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// Filesystem persistence for generated payloads. Pure I/O, no policy.
pub struct ArtifactStore {
    root: PathBuf,
    format: MediaFormat,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>, format: MediaFormat) -> Self {
        Self {
            root: root.into(),
            format,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn format(&self) -> MediaFormat {
        self.format
    }

    /// Create the root and both class subdirectories if missing.
    pub async fn ensure_layout(&self) -> std::io::Result<()> {
        for class in [ArtifactClass::Static, ArtifactClass::Generative] {
            tokio::fs::create_dir_all(self.root.join(class.subdir())).await?;
        }
        Ok(())
    }

    /// Relative path of an artifact, e.g. `static/welcome.mp3`.
    pub fn relative_path(&self, class: ArtifactClass, id: &str) -> String {
        format!("{}/{}.{}", class.subdir(), id, self.format.extension())
    }

    /// Absolute filesystem location of a relative artifact path.
    pub fn absolute(&self, relative: &str) -> PathBuf {
        relative
            .split('/')
            .filter(|s| !s.is_empty())
            .fold(self.root.clone(), |acc, segment| acc.join(segment))
    }

    pub async fn exists(&self, relative: &str) -> bool {
        tokio::fs::try_exists(self.absolute(relative))
            .await
            .unwrap_or(false)
    }

    /// Write an artifact payload atomically (temp file + rename).
    pub async fn write(&self, relative: &str, payload: &[u8]) -> Result<()> {
        let dest = self.absolute(relative);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut part = dest.clone().into_os_string();
        part.push(".part");
        let part = PathBuf::from(part);

        if let Err(e) = tokio::fs::write(&part, payload).await {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(e.into());
        }
        tokio::fs::rename(&part, &dest).await?;

        tracing::debug!(path = %relative, bytes = payload.len(), "Stored artifact");
        Ok(())
    }

    /// Delete an artifact file.
    pub async fn delete(&self, relative: &str) -> std::io::Result<()> {
        tokio::fs::remove_file(self.absolute(relative)).await
    }

    /// Find every artifact file below the root, as relative paths.
    ///
    /// Leftover `.part` files from an interrupted write are ignored, as are
    /// files whose path could not be served back under its own URL.
    pub async fn scan(&self) -> Result<Vec<String>> {
        let mut found = Vec::new();
        for (relative, _) in self.walk_files().await? {
            if !is_artifact_file(&relative) {
                continue;
            }
            if !relative.split('/').all(is_url_safe_segment) {
                tracing::warn!(path = %relative, "Skipping artifact with a non URL-safe name");
                continue;
            }
            found.push(relative);
        }

        found.sort();
        Ok(found)
    }

    /// Delete `.part` files left behind by an interrupted or failed write.
    pub async fn remove_partial_files(&self) -> Result<usize> {
        let mut removed = 0;
        for (relative, path) in self.walk_files().await? {
            if !relative.ends_with(".part") {
                continue;
            }
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    tracing::debug!(path = %relative, "Removed partial write");
                    removed += 1;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(removed)
    }

    /// Every regular file below the root as `(relative, absolute)` paths.
    async fn walk_files(&self) -> Result<Vec<(String, PathBuf)>> {
        let mut files = Vec::new();
        let mut pending = vec![(self.root.clone(), String::new())];

        while let Some((dir, prefix)) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                let relative = if prefix.is_empty() {
                    name
                } else {
                    format!("{}/{}", prefix, name)
                };

                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push((entry.path(), relative));
                } else if file_type.is_file() {
                    files.push((relative, entry.path()));
                }
            }
        }

        Ok(files)
    }

    /// Map a request path onto an existing file below the root.
    ///
    /// Returns `None` for empty paths, paths with a `..` segment anywhere,
    /// and paths that do not name an existing regular file.
    pub async fn resolve(&self, request_path: &str) -> Option<PathBuf> {
        if request_path.contains("..") {
            return None;
        }
        let relative = request_path.trim_start_matches('/');
        if relative.is_empty() {
            return None;
        }

        let path = self.absolute(relative);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Some(path),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_store(dir: &TempDir) -> ArtifactStore {
        ArtifactStore::new(dir.path(), MediaFormat::Audio)
    }

    #[test]
    fn test_relative_path() {
        let store = ArtifactStore::new("/tmp/unused", MediaFormat::Audio);
        assert_eq!(
            store.relative_path(ArtifactClass::Static, "welcome"),
            "static/welcome.mp3"
        );

        let video = ArtifactStore::new("/tmp/unused", MediaFormat::Video);
        assert_eq!(
            video.relative_path(ArtifactClass::Generative, "joke-1"),
            "genai/joke-1.mp4"
        );
    }

    #[tokio::test]
    async fn test_write_exists_delete() {
        let dir = TempDir::new().unwrap();
        let store = make_store(&dir);
        store.ensure_layout().await.unwrap();

        let rel = store.relative_path(ArtifactClass::Static, "hello");
        assert!(!store.exists(&rel).await);

        store.write(&rel, b"ID3data").await.unwrap();
        assert!(store.exists(&rel).await);
        assert_eq!(
            std::fs::read(dir.path().join("static").join("hello.mp3")).unwrap(),
            b"ID3data"
        );
        assert!(!dir.path().join("static").join("hello.mp3.part").exists());

        store.delete(&rel).await.unwrap();
        assert!(!store.exists(&rel).await);
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = make_store(&dir);
        let err = store.delete("genai/missing.mp3").await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_scan_finds_nested_artifacts_only() {
        let dir = TempDir::new().unwrap();
        let store = make_store(&dir);
        store.ensure_layout().await.unwrap();

        store.write("static/a.mp3", b"a").await.unwrap();
        store.write("genai/b-1.mp3", b"b").await.unwrap();
        std::fs::write(dir.path().join("genai").join("c.mp3.part"), b"partial").unwrap();
        std::fs::write(dir.path().join("prompts.json"), b"{}").unwrap();
        std::fs::create_dir_all(dir.path().join("static").join("nested")).unwrap();
        std::fs::write(dir.path().join("static").join("nested").join("d.mp4"), b"d").unwrap();

        let found = store.scan().await.unwrap();
        assert_eq!(
            found,
            vec![
                "genai/b-1.mp3".to_string(),
                "static/a.mp3".to_string(),
                "static/nested/d.mp4".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_scan_skips_names_that_need_encoding() {
        let dir = TempDir::new().unwrap();
        let store = make_store(&dir);
        store.ensure_layout().await.unwrap();

        store.write("static/hello_world.mp3", b"a").await.unwrap();
        std::fs::write(dir.path().join("static").join("hello world.mp3"), b"b").unwrap();
        std::fs::write(dir.path().join("static").join("50%.mp3"), b"c").unwrap();

        let found = store.scan().await.unwrap();
        assert_eq!(found, vec!["static/hello_world.mp3".to_string()]);
    }

    #[tokio::test]
    async fn test_remove_partial_files() {
        let dir = TempDir::new().unwrap();
        let store = make_store(&dir);
        store.ensure_layout().await.unwrap();

        store.write("genai/done.mp3", b"a").await.unwrap();
        std::fs::write(dir.path().join("genai").join("cut.mp3.part"), b"partial").unwrap();
        std::fs::write(dir.path().join("static").join("x.mp4.part"), b"partial").unwrap();

        assert_eq!(store.remove_partial_files().await.unwrap(), 2);
        assert!(!dir.path().join("genai").join("cut.mp3.part").exists());
        assert!(!dir.path().join("static").join("x.mp4.part").exists());
        assert!(store.exists("genai/done.mp3").await);

        assert_eq!(store.remove_partial_files().await.unwrap(), 0);
    }

    #[test]
    fn test_url_safe_segment() {
        assert!(is_url_safe_segment("joke-1700000000000-3.mp3"));
        assert!(is_url_safe_segment("Welcome_v2"));
        assert!(!is_url_safe_segment(""));
        assert!(!is_url_safe_segment("hello world"));
        assert!(!is_url_safe_segment("50%"));
        assert!(!is_url_safe_segment("a#b"));
        assert!(!is_url_safe_segment("a?b"));
        assert!(!is_url_safe_segment("caf\u{e9}"));
    }

    #[tokio::test]
    async fn test_scan_missing_root_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path().join("absent"), MediaFormat::Audio);
        assert!(store.scan().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_existing_file() {
        let dir = TempDir::new().unwrap();
        let store = make_store(&dir);
        store.write("static/a.mp3", b"a").await.unwrap();

        let resolved = store.resolve("/static/a.mp3").await.unwrap();
        assert_eq!(resolved, dir.path().join("static").join("a.mp3"));
    }

    #[tokio::test]
    async fn test_resolve_rejects_parent_segments() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("root");
        let store = ArtifactStore::new(&root, MediaFormat::Audio);
        store.ensure_layout().await.unwrap();

        // A real file outside the root must stay unreachable.
        std::fs::write(dir.path().join("secret.mp3"), b"secret").unwrap();

        assert!(store.resolve("/../secret.mp3").await.is_none());
        assert!(store.resolve("/static/../../secret.mp3").await.is_none());
        assert!(store.resolve("/../etc/passwd").await.is_none());
    }

    #[tokio::test]
    async fn test_resolve_rejects_missing_and_directories() {
        let dir = TempDir::new().unwrap();
        let store = make_store(&dir);
        store.ensure_layout().await.unwrap();

        assert!(store.resolve("/").await.is_none());
        assert!(store.resolve("/static").await.is_none());
        assert!(store.resolve("/static/nope.mp3").await.is_none());
    }
}
