//! Registry of generated artifact files.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::ArtifactError;
use crate::clock::Clock;

/// Filename prefix of every artifact this registry creates.
pub const ARTIFACT_PREFIX: &str = "person_";

/// Lifecycle state of a tracked artifact. Deleted artifacts are no longer
/// tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactState {
    /// Written and reachable by URL.
    Created,
    /// A deferred deletion has been scheduled.
    PendingDeletion,
}

/// A generated image file and where it is served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedArtifact {
    /// Location on disk.
    pub file_path: PathBuf,
    /// Public URL under the artifact prefix.
    pub url: String,
    /// When the artifact was allocated.
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    created_at: DateTime<Utc>,
    state: ArtifactState,
}

/// Tracks generated files in one shared directory and deletes them.
///
/// Filenames are unique per allocation, so concurrent requests never write
/// the same file. Every deletion is delete-if-exists: a file that is
/// already gone is not an error, and failures are only logged.
pub struct ArtifactRegistry {
    dir: PathBuf,
    url_prefix: String,
    clock: Arc<dyn Clock>,
    entries: Mutex<BTreeMap<PathBuf, Entry>>,
}

impl ArtifactRegistry {
    /// Creates a registry over `dir`, creating the directory if needed.
    ///
    /// `url_prefix` is the public path under which `dir` is served, e.g.
    /// `/artifacts`.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError::Io`] if the directory cannot be created.
    pub fn new(
        dir: impl Into<PathBuf>,
        url_prefix: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ArtifactError> {
        let dir = dir.into();
        ensure_dir(&dir)?;
        Ok(Self {
            dir,
            url_prefix: url_prefix.into().trim_end_matches('/').to_string(),
            clock,
            entries: Mutex::new(BTreeMap::new()),
        })
    }

    /// Directory holding the artifacts.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Public URL for a file name in the artifact directory.
    #[must_use]
    pub fn url_for(&self, file_name: &str) -> String {
        format!("{}/{file_name}", self.url_prefix)
    }

    /// Allocates and tracks a unique artifact path for one person.
    ///
    /// The file itself is written by the caller.
    pub fn allocate(&self, person_index: usize, extension: &str) -> GeneratedArtifact {
        let file_name = format!(
            "{ARTIFACT_PREFIX}{person_index}_{}.{extension}",
            uuid::Uuid::new_v4().simple()
        );
        let created_at = self.clock.now();
        let artifact = GeneratedArtifact {
            file_path: self.dir.join(&file_name),
            url: self.url_for(&file_name),
            created_at,
        };

        self.lock().insert(
            artifact.file_path.clone(),
            Entry {
                created_at,
                state: ArtifactState::Created,
            },
        );

        artifact
    }

    /// Current state of a tracked artifact, or `None` once deleted.
    #[must_use]
    pub fn state(&self, path: &Path) -> Option<ArtifactState> {
        self.lock().get(path).map(|e| e.state)
    }

    /// Number of tracked artifacts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no artifacts are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Marks artifacts as awaiting a deferred deletion.
    pub fn mark_pending(&self, paths: &[PathBuf]) {
        let mut entries = self.lock();
        for path in paths {
            if let Some(entry) = entries.get_mut(path) {
                entry.state = ArtifactState::PendingDeletion;
            }
        }
    }

    /// Deletes one artifact if it exists and stops tracking it.
    ///
    /// Returns `true` if a file was removed.
    pub fn delete(&self, path: &Path) -> bool {
        self.lock().remove(path);
        match std::fs::remove_file(path) {
            Ok(()) => {
                log::debug!("Deleted artifact {}", path.display());
                true
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                log::warn!("Failed to delete artifact {}: {e}", path.display());
                false
            }
        }
    }

    /// Deletes every given artifact, returning how many files were removed.
    pub fn delete_all(&self, paths: &[PathBuf]) -> usize {
        paths.iter().filter(|p| self.delete(p)).count()
    }

    /// Deletes artifacts in the directory whose modification time is more
    /// than `max_age` before now.
    ///
    /// Files whose modification time cannot be read fall back to their
    /// tracked creation time; untracked files without one are left alone.
    /// Tracked entries older than `max_age` whose file has vanished are
    /// forgotten.
    pub fn sweep_stale(&self, max_age: Duration) -> usize {
        let now = self.clock.now();
        let max_age = TimeDelta::from_std(max_age).unwrap_or(TimeDelta::MAX);

        let stale: Vec<PathBuf> = self
            .artifact_files()
            .into_iter()
            .filter(|path| {
                self.modified_at(path)
                    .is_some_and(|modified| now.signed_duration_since(modified) > max_age)
            })
            .collect();

        let deleted = self.delete_all(&stale);
        self.lock()
            .retain(|path, e| path.exists() || now.signed_duration_since(e.created_at) <= max_age);

        if deleted > 0 {
            log::info!("Artifact sweep removed {deleted} stale file(s)");
        }
        deleted
    }

    /// Deletes every artifact in the directory regardless of age.
    pub fn sweep_all(&self) -> usize {
        let files = self.artifact_files();
        let deleted = self.delete_all(&files);
        self.lock().clear();
        log::info!("Manual artifact sweep removed {deleted} file(s)");
        deleted
    }

    /// Artifact files currently present in the directory.
    fn artifact_files(&self) -> Vec<PathBuf> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Failed to list artifact directory {}: {e}", self.dir.display());
                return Vec::new();
            }
        };

        entries
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.starts_with(ARTIFACT_PREFIX))
            })
            .map(|entry| entry.path())
            .collect()
    }

    fn modified_at(&self, path: &Path) -> Option<DateTime<Utc>> {
        std::fs::metadata(path)
            .and_then(|m| m.modified())
            .map(DateTime::<Utc>::from)
            .ok()
            .or_else(|| self.lock().get(path).map(|e| e.created_at))
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<PathBuf, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::clock::{ManualClock, SystemClock};

    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "ppe_artifacts_{name}_{}",
            uuid::Uuid::new_v4().simple()
        ))
    }

    fn write(artifact: &GeneratedArtifact) {
        std::fs::write(&artifact.file_path, b"jpeg").unwrap();
    }

    #[test]
    fn allocates_unique_paths_and_urls() {
        let dir = temp_dir("alloc");
        let registry = ArtifactRegistry::new(&dir, "/artifacts/", Arc::new(SystemClock)).unwrap();

        let a = registry.allocate(0, "jpg");
        let b = registry.allocate(0, "jpg");

        assert_ne!(a.file_path, b.file_path);
        assert!(a.url.starts_with("/artifacts/person_0_"));
        assert!(a.url.ends_with(".jpg"));
        assert_eq!(a.file_path.parent(), Some(dir.as_path()));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.state(&a.file_path), Some(ArtifactState::Created));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn delete_is_idempotent() {
        let dir = temp_dir("delete");
        let registry = ArtifactRegistry::new(&dir, "/artifacts", Arc::new(SystemClock)).unwrap();
        let artifact = registry.allocate(1, "jpg");
        write(&artifact);

        assert!(registry.delete(&artifact.file_path));
        assert!(!registry.delete(&artifact.file_path));
        assert!(!artifact.file_path.exists());
        assert!(registry.state(&artifact.file_path).is_none());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn sweep_removes_only_old_artifacts() {
        let dir = temp_dir("sweep");
        let clock = Arc::new(ManualClock::new());
        let registry = ArtifactRegistry::new(&dir, "/artifacts", clock.clone()).unwrap();
        let artifact = registry.allocate(0, "jpg");
        write(&artifact);
        let unrelated = dir.join("placeholder.jpg");
        std::fs::write(&unrelated, b"keep").unwrap();

        assert_eq!(registry.sweep_stale(Duration::from_secs(120)), 0);
        assert!(artifact.file_path.exists());

        clock.advance(Duration::from_secs(180));
        assert_eq!(registry.sweep_stale(Duration::from_secs(120)), 1);
        assert!(!artifact.file_path.exists());
        assert!(unrelated.exists());
        assert!(registry.is_empty());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn sweep_all_ignores_age() {
        let dir = temp_dir("sweep_all");
        let registry = ArtifactRegistry::new(&dir, "/artifacts", Arc::new(SystemClock)).unwrap();
        let a = registry.allocate(0, "jpg");
        let b = registry.allocate(1, "jpg");
        write(&a);
        write(&b);

        assert_eq!(registry.sweep_all(), 2);
        assert!(!a.file_path.exists());
        assert!(!b.file_path.exists());
        assert_eq!(registry.sweep_all(), 0);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn mark_pending_changes_state() {
        let dir = temp_dir("pending");
        let registry = ArtifactRegistry::new(&dir, "/artifacts", Arc::new(SystemClock)).unwrap();
        let a = registry.allocate(0, "jpg");

        registry.mark_pending(std::slice::from_ref(&a.file_path));

        assert_eq!(registry.state(&a.file_path), Some(ArtifactState::PendingDeletion));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
