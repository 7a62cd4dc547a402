use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{DeployError, DeployResult};
use crate::publish::{Artifact, digest, relative_path};

/// Result of putting an artifact into a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Created,
    Replaced,
    Unchanged,
}

/// A destination for published artifacts, addressed by relative path.
///
/// Artifacts are never edited in place: putting different content at
/// an existing path stores a new version.
pub trait ContentStore: Send {
    /// Paths of every stored artifact.
    fn list(&self) -> DeployResult<Vec<String>>;

    fn put(&mut self, artifact: &Artifact) -> DeployResult<PutOutcome>;

    fn delete(&mut self, path: &str) -> DeployResult<()>;
}

/// A stored artifact and its version, starting at 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    pub artifact: Arc<Artifact>,
    pub version: u32,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: BTreeMap<String, StoredArtifact>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&StoredArtifact> {
        self.objects.get(path)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl ContentStore for MemoryStore {
    fn list(&self) -> DeployResult<Vec<String>> {
        Ok(self.objects.keys().cloned().collect())
    }

    fn put(&mut self, artifact: &Artifact) -> DeployResult<PutOutcome> {
        let (version, outcome) = match self.objects.get(&artifact.path) {
            Some(existing) if existing.artifact.digest == artifact.digest => {
                return Ok(PutOutcome::Unchanged);
            }
            Some(existing) => (existing.version + 1, PutOutcome::Replaced),
            None => (1, PutOutcome::Created),
        };
        self.objects.insert(
            artifact.path.clone(),
            StoredArtifact {
                artifact: Arc::new(artifact.clone()),
                version,
            },
        );
        Ok(outcome)
    }

    fn delete(&mut self, path: &str) -> DeployResult<()> {
        self.objects.remove(path);
        Ok(())
    }
}

/// Stores artifacts as files under a local directory.
///
/// New content is written to a temporary sibling and renamed over the
/// target, so readers never observe a partially written file.
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

const TMP_SUFFIX: &str = ".ponte-tmp";

impl DirStore {
    pub fn new(root: impl Into<PathBuf>) -> DeployResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn target(&self, path: &str) -> DeployResult<PathBuf> {
        let relative = Path::new(path);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !safe || path.is_empty() {
            return Err(DeployError::InvalidConfig(format!(
                "artifact path '{path}' escapes the store"
            )));
        }
        Ok(self.root.join(relative))
    }
}

impl ContentStore for DirStore {
    fn list(&self) -> DeployResult<Vec<String>> {
        let mut paths = Vec::new();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = relative_path(&self.root, entry.path())?;
            if !path.ends_with(TMP_SUFFIX) {
                paths.push(path);
            }
        }
        Ok(paths)
    }

    fn put(&mut self, artifact: &Artifact) -> DeployResult<PutOutcome> {
        let target = self.target(&artifact.path)?;

        let outcome = if target.is_file() {
            let current = std::fs::read(&target)?;
            if digest(&current) == artifact.digest {
                return Ok(PutOutcome::Unchanged);
            }
            PutOutcome::Replaced
        } else {
            PutOutcome::Created
        };

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut tmp = target.clone().into_os_string();
        tmp.push(TMP_SUFFIX);
        std::fs::write(&tmp, &artifact.content)?;
        std::fs::rename(&tmp, &target)?;

        debug!(path = %artifact.path, ?outcome, "stored artifact");
        Ok(outcome)
    }

    fn delete(&mut self, path: &str) -> DeployResult<()> {
        let target = self.target(path)?;
        match std::fs::remove_file(&target) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
