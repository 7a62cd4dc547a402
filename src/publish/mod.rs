//! Publication of the front-end tree as immutable artifacts.
//!
//! Every file under the root becomes one [`Artifact`]. Text files
//! with a template-eligible extension have their `[TOKEN]`
//! placeholders replaced by deferred deployment outputs; everything
//! else is copied byte for byte.

pub mod store;
pub mod template;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use indexmap::IndexMap;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::deferred::{self, Deferred};
use crate::engine::{Declaration, Engine, Resource, ResourceRef};
use crate::error::{DeployError, DeployResult};

pub use store::{ContentStore, DirStore, MemoryStore, PutOutcome, StoredArtifact};

pub const BLOB: &str = "storage:Blob";

/// Extensions whose files are scanned for `[TOKEN]` placeholders.
pub const TEMPLATE_EXTENSIONS: &[&str] = &[
    "html", "htm", "js", "mjs", "cjs", "css", "json", "txt", "xml", "svg", "map",
];

/// The storage container artifacts are published into.
#[derive(Debug, Clone)]
pub struct Container {
    resource: ResourceRef,
    account_name: Deferred<String>,
    name: String,
}

impl Container {
    /// `resource` owns the container; artifacts are declared as its
    /// children.
    #[must_use]
    pub fn new(resource: &ResourceRef, account_name: Deferred<String>, name: &str) -> Self {
        Self {
            resource: resource.clone(),
            account_name,
            name: name.to_string(),
        }
    }

    #[must_use]
    pub const fn resource(&self) -> &ResourceRef {
        &self.resource
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Named deferred values available to templates.
///
/// Names are given without brackets: a file containing `[API_URL]`
/// reads the entry named `API_URL`.
#[derive(Debug, Clone, Default)]
pub struct SubstitutionContext {
    tokens: IndexMap<String, Deferred<String>>,
}

impl SubstitutionContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(mut self, name: &str, value: Deferred<String>) -> DeployResult<Self> {
        self.insert(name, value)?;
        Ok(self)
    }

    /// Add or replace a token. Names outside the placeholder grammar
    /// could never be referenced and are rejected.
    pub fn insert(&mut self, name: &str, value: Deferred<String>) -> DeployResult<()> {
        if !template::is_token_name(name) {
            return Err(DeployError::InvalidConfig(format!(
                "'{name}' is not a token name: use uppercase letters, digits and '_'"
            )));
        }
        self.tokens.insert(name.to_string(), value);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Deferred<String>> {
        self.tokens.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tokens.keys().map(String::as_str)
    }
}

/// One published file. The content never changes once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: String,
    pub content: Vec<u8>,
    pub content_type: Option<String>,
    /// Lowercase hex SHA-256 of `content`.
    pub digest: String,
}

impl Artifact {
    #[must_use]
    pub fn new(path: &str, content: Vec<u8>, content_type: Option<String>) -> Self {
        Self {
            path: path.to_string(),
            digest: digest(&content),
            content,
            content_type,
        }
    }
}

pub(crate) fn digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// `path` relative to `root`, `/`-separated.
pub(crate) fn relative_path(root: &Path, path: &Path) -> DeployResult<String> {
    let relative = path.strip_prefix(root).map_err(|_| {
        DeployError::Other(format!(
            "{} is outside {}",
            path.display(),
            root.display()
        ))
    })?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}

#[must_use]
pub fn is_template(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| TEMPLATE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

#[must_use]
pub fn content_type(path: &str) -> Option<String> {
    mime_guess::from_path(path)
        .first()
        .map(|m| m.essence_str().to_string())
}

#[derive(Debug, Clone)]
enum Body {
    Text(String),
    Binary(Vec<u8>),
}

/// A file found under the publisher root, before substitution.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: String,
    pub content_type: Option<String>,
    body: Body,
}

impl SourceFile {
    #[must_use]
    pub const fn is_template(&self) -> bool {
        matches!(self.body, Body::Text(_))
    }
}

/// An artifact waiting on the tokens its source references.
#[derive(Debug, Clone)]
pub struct PendingArtifact {
    pub path: String,
    pub artifact: Deferred<Artifact>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BlobRecord {
    name: String,
    storage_account_name: String,
    storage_container_name: String,
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_type: Option<String>,
    content_digest: String,
    source: String,
}

/// Paths touched by [`Publisher::sync`].
#[derive(Debug, Default)]
pub struct SyncReport {
    pub created: Vec<String>,
    pub replaced: Vec<String>,
    pub unchanged: Vec<String>,
    pub deleted: Vec<String>,
    pub failed: Vec<(String, DeployError)>,
}

impl SyncReport {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Publishes a local directory tree.
///
/// # Example
///
/// ```no_run
/// use ponte::deferred::Deferred;
/// use ponte::publish::{MemoryStore, Publisher, SubstitutionContext};
///
/// # async fn run() -> ponte::DeployResult<()> {
/// let api_url = "https://drone-apim.azure-api.net/api/v1/device/";
/// let context = SubstitutionContext::new().token("API_URL", Deferred::resolved(api_url.into()))?;
/// let mut store = MemoryStore::new();
///
/// let report = Publisher::new("frontend/dist")
///     .context(context)
///     .sync(&mut store)
///     .await?;
/// assert!(report.is_success());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Publisher {
    root: PathBuf,
    context: SubstitutionContext,
}

impl Publisher {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            context: SubstitutionContext::new(),
        }
    }

    #[must_use]
    pub fn context(mut self, context: SubstitutionContext) -> Self {
        self.context = context;
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walk the root and read every file. Siblings are visited in name
    /// order, so the result is stable across runs.
    pub fn discover(&self) -> DeployResult<Vec<SourceFile>> {
        if !self.root.is_dir() {
            return Err(DeployError::FileNotFound(self.root.display().to_string()));
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = relative_path(&self.root, entry.path())?;
            let bytes = std::fs::read(entry.path())?;

            let body = if is_template(&path) {
                match String::from_utf8(bytes) {
                    Ok(text) => Body::Text(text),
                    Err(e) => {
                        warn!(path = %path, "template file is not UTF-8, publishing as is");
                        Body::Binary(e.into_bytes())
                    }
                }
            } else {
                Body::Binary(bytes)
            };

            files.push(SourceFile {
                content_type: content_type(&path),
                path,
                body,
            });
        }
        debug!(root = %self.root.display(), files = files.len(), "discovered files");
        Ok(files)
    }

    /// Build the artifact of one file.
    ///
    /// A template referencing a token missing from the context yields
    /// a failed handle; other files are unaffected.
    #[must_use]
    pub fn pending(&self, file: SourceFile) -> PendingArtifact {
        let SourceFile {
            path,
            content_type,
            body,
        } = file;

        let artifact = match body {
            Body::Binary(bytes) => Deferred::resolved(Artifact::new(&path, bytes, content_type)),
            Body::Text(text) => self.substituted(&path, text, content_type),
        };
        PendingArtifact { path, artifact }
    }

    fn substituted(
        &self,
        path: &str,
        text: String,
        content_type: Option<String>,
    ) -> Deferred<Artifact> {
        let names = template::referenced_tokens(&text);

        let mut handles = Vec::with_capacity(names.len());
        for name in &names {
            match self.context.get(name) {
                Some(handle) => handles.push(handle.clone()),
                None => {
                    return Deferred::failed(DeployError::UnresolvedToken {
                        path: path.to_string(),
                        token: name.clone(),
                    });
                }
            }
        }

        let path = path.to_string();
        deferred::join_all(handles).map(move |values| {
            let values: BTreeMap<String, String> = names.into_iter().zip(values).collect();
            let content = template::substitute(&text, &values);
            Artifact::new(&path, content.into_bytes(), content_type)
        })
    }

    /// Every artifact of the tree, in path order.
    pub fn artifacts(&self) -> DeployResult<Vec<PendingArtifact>> {
        Ok(self
            .discover()?
            .into_iter()
            .map(|file| self.pending(file))
            .collect())
    }

    /// Declare one blob per artifact as a child of `container`.
    pub fn declare(
        &self,
        engine: &dyn Engine,
        container: &Container,
    ) -> DeployResult<Vec<Resource>> {
        let pending = self.artifacts()?;
        info!(
            container = %container.name,
            artifacts = pending.len(),
            "declaring published artifacts"
        );

        let mut blobs = Vec::with_capacity(pending.len());
        for PendingArtifact { path, artifact } in pending {
            if artifact.is_secret() {
                warn!(path = %path, "artifact content derives from a secret value");
            }
            let container_name = container.name.clone();
            let properties = deferred::join(container.account_name.clone(), artifact).try_map(
                move |(storage_account_name, artifact)| {
                    let record = BlobRecord {
                        source: STANDARD.encode(&artifact.content),
                        content_digest: format!("sha256:{}", artifact.digest),
                        name: artifact.path,
                        storage_account_name,
                        storage_container_name: container_name,
                        kind: "Block",
                        content_type: artifact.content_type,
                    };
                    Ok(serde_json::to_value(record)?)
                },
            );
            let declaration = Declaration::new(BLOB, &path, properties).parent(&container.resource);
            blobs.push(engine.declare(declaration)?);
        }
        Ok(blobs)
    }

    /// Put every artifact into `store` and delete stored artifacts
    /// whose source file no longer exists.
    ///
    /// Files fail independently: an artifact that cannot be built is
    /// recorded in the report and the rest are still published.
    pub async fn sync(&self, store: &mut dyn ContentStore) -> DeployResult<SyncReport> {
        let pending = self.artifacts()?;
        let sources: BTreeSet<String> = pending.iter().map(|p| p.path.clone()).collect();

        let resolved = futures::future::join_all(pending.into_iter().map(|p| async move {
            if p.artifact.is_secret() {
                warn!(path = %p.path, "artifact content derives from a secret value");
            }
            (p.path, p.artifact.resolve().await)
        }))
        .await;

        let mut report = SyncReport::default();
        for (path, result) in resolved {
            match result {
                Ok(artifact) => match store.put(&artifact)? {
                    PutOutcome::Created => report.created.push(path),
                    PutOutcome::Replaced => report.replaced.push(path),
                    PutOutcome::Unchanged => report.unchanged.push(path),
                },
                Err(err) => {
                    warn!(path = %path, error = %err, "artifact not published");
                    report.failed.push((path, err));
                }
            }
        }

        for stored in store.list()? {
            if !sources.contains(&stored) {
                store.delete(&stored)?;
                report.deleted.push(stored);
            }
        }

        info!(
            created = report.created.len(),
            replaced = report.replaced.len(),
            unchanged = report.unchanged.len(),
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "sync finished"
        );
        Ok(report)
    }
}
