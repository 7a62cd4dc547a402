use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Mutex;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::deferred::Deferred;
use crate::engine::{Declaration, Engine, Resource, ResourceRef};
use crate::error::{DeployError, DeployResult};

const REDACTED: &str = "[secret]";
const PLACEHOLDER: &str = "<computed ";

/// Whether `value` carries a preview placeholder, i.e. it was derived
/// from an output only known after provisioning.
#[must_use]
pub fn is_placeholder(value: &str) -> bool {
    value.contains(PLACEHOLDER)
}

fn placeholder(producer: &str, attr: &str) -> String {
    format!("{PLACEHOLDER}{producer}.{attr}>")
}

#[derive(Clone)]
struct Preset {
    value: Zeroizing<String>,
    secret: bool,
}

impl Preset {
    fn deferred(&self, producer: &str) -> Deferred<String> {
        let value = self.value.to_string();
        let d = Deferred::from_future(producer, async move { Ok(value) });
        if self.secret { d.secret() } else { d }
    }
}

#[derive(Clone)]
struct Entry {
    properties: Deferred<serde_json::Value>,
    parent: Option<ResourceRef>,
}

/// Outputs of an earlier provisioning run, as loaded by
/// [`MemoryEngine::with_outputs`].
///
/// ```yaml
/// stacks:
///   drone/tenant/dev:
///     tenantId: 72f988bf-0000-0000-0000-2d7cd011db47
/// resources:
///   - kind: cdn:Endpoint
///     name: drone-endpoint
///     attr: hostName
///     value: drone-endpoint.azureedge.net
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct OutputsFile {
    #[serde(default)]
    stacks: BTreeMap<String, BTreeMap<String, String>>,
    #[serde(default)]
    resources: Vec<ResourceOutput>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ResourceOutput {
    kind: String,
    name: String,
    attr: String,
    value: String,
    #[serde(default)]
    secret: bool,
}

#[derive(Default)]
struct State {
    entries: IndexMap<ResourceRef, Entry>,
    outputs: BTreeMap<(ResourceRef, String), Preset>,
    stack_outputs: BTreeMap<(String, String), Preset>,
}

/// In-process engine used for previews and tests.
///
/// Records declarations in order, derives ids as `<kind>/<name>`,
/// and serves outputs from the declared properties or from preset
/// values. In preview mode, outputs that neither source knows resolve
/// to a `<computed ...>` placeholder instead of failing.
#[derive(Default)]
pub struct MemoryEngine {
    state: Mutex<State>,
    preview: bool,
}

/// A declaration after its properties resolved.
#[derive(Debug, Clone, Serialize)]
pub struct AppliedResource {
    pub kind: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<ResourceRef>,
    #[serde(skip)]
    pub secret: bool,
    pub properties: serde_json::Value,
}

impl AppliedResource {
    #[must_use]
    pub fn reference(&self) -> ResourceRef {
        ResourceRef::new(&self.kind, &self.name)
    }

    /// Copy safe to print: secret property bags are replaced.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.secret {
            copy.properties = serde_json::Value::String(REDACTED.to_string());
        }
        copy
    }
}

/// Outcome of [`MemoryEngine::apply`]. Resources fail independently.
#[derive(Debug, Default)]
pub struct ApplyReport {
    pub applied: Vec<AppliedResource>,
    pub failed: Vec<(ResourceRef, DeployError)>,
}

impl ApplyReport {
    #[must_use]
    pub fn get(&self, kind: &str, name: &str) -> Option<&AppliedResource> {
        self.applied
            .iter()
            .find(|r| r.kind == kind && r.name == name)
    }

    #[must_use]
    pub fn of_kind(&self, kind: &str) -> Vec<&AppliedResource> {
        self.applied.iter().filter(|r| r.kind == kind).collect()
    }

    /// Render the applied resources as YAML with secrets redacted.
    pub fn to_yaml(&self) -> DeployResult<String> {
        let safe: Vec<AppliedResource> = self
            .applied
            .iter()
            .map(AppliedResource::redacted)
            .collect();
        Ok(serde_yaml::to_string(&safe)?)
    }
}

impl MemoryEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn preview() -> Self {
        Self {
            preview: true,
            ..Self::default()
        }
    }

    /// Preset a computed attribute, e.g. a host name assigned by the
    /// provider.
    #[must_use]
    pub fn with_output(self, kind: &str, name: &str, attr: &str, value: &str) -> Self {
        self.preset(kind, name, attr, value, false)
    }

    /// Preset a computed attribute that must stay secret, e.g. a
    /// function access key.
    #[must_use]
    pub fn with_secret_output(self, kind: &str, name: &str, attr: &str, value: &str) -> Self {
        self.preset(kind, name, attr, value, true)
    }

    #[must_use]
    pub fn with_stack_output(self, stack: &str, name: &str, value: &str) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.stack_outputs.insert(
                (stack.to_string(), name.to_string()),
                Preset {
                    value: Zeroizing::new(value.to_string()),
                    secret: false,
                },
            );
        }
        self
    }

    /// Preset every output listed in a YAML document of stack and
    /// resource outputs.
    pub fn with_outputs(self, content: &str) -> DeployResult<Self> {
        let file: OutputsFile = serde_yaml::from_str(content)?;
        let mut engine = self;
        for (stack, outputs) in &file.stacks {
            for (name, value) in outputs {
                engine = engine.with_stack_output(stack, name, value);
            }
        }
        for output in &file.resources {
            engine = engine.preset(
                &output.kind,
                &output.name,
                &output.attr,
                &output.value,
                output.secret,
            );
        }
        debug!(
            stacks = file.stacks.len(),
            resources = file.resources.len(),
            "loaded outputs"
        );
        Ok(engine)
    }

    pub fn load_outputs(self, path: &Path) -> DeployResult<Self> {
        if !path.exists() {
            return Err(DeployError::FileNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        self.with_outputs(&content)
    }

    #[must_use]
    pub const fn is_preview(&self) -> bool {
        self.preview
    }

    fn preset(self, kind: &str, name: &str, attr: &str, value: &str, secret: bool) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.outputs.insert(
                (ResourceRef::new(kind, name), attr.to_string()),
                Preset {
                    value: Zeroizing::new(value.to_string()),
                    secret,
                },
            );
        }
        self
    }

    fn lock(&self) -> DeployResult<std::sync::MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| DeployError::Other("engine state poisoned".into()))
    }

    /// Declared resources, in declaration order.
    pub fn declared(&self) -> DeployResult<Vec<ResourceRef>> {
        Ok(self.lock()?.entries.keys().cloned().collect())
    }

    /// The parent edge recorded for a resource.
    pub fn parent_of(&self, resource: &ResourceRef) -> DeployResult<Option<ResourceRef>> {
        Ok(self
            .lock()?
            .entries
            .get(resource)
            .and_then(|e| e.parent.clone()))
    }

    /// Resolve every declaration's properties.
    pub async fn apply(&self) -> DeployResult<ApplyReport> {
        let entries: Vec<(ResourceRef, Entry)> = self
            .lock()?
            .entries
            .iter()
            .map(|(r, e)| (r.clone(), e.clone()))
            .collect();

        let resolved = futures::future::join_all(entries.into_iter().map(
            |(reference, entry)| async move {
                let secret = entry.properties.is_secret();
                let result = entry.properties.resolve().await;
                (reference, entry.parent, secret, result)
            },
        ))
        .await;

        let mut report = ApplyReport::default();
        for (reference, parent, secret, result) in resolved {
            match result {
                Ok(properties) => {
                    debug!(resource = %reference, "applied");
                    report.applied.push(AppliedResource {
                        kind: reference.kind,
                        name: reference.name,
                        parent,
                        secret,
                        properties,
                    });
                }
                Err(err) => {
                    warn!(resource = %reference, error = %err, "resource failed");
                    report.failed.push((reference, err));
                }
            }
        }
        Ok(report)
    }
}

fn attribute(value: &serde_json::Value, attr: &str) -> Option<String> {
    match value.get(attr)? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

impl Engine for MemoryEngine {
    fn declare(&self, declaration: Declaration) -> DeployResult<Resource> {
        let Declaration {
            resource,
            properties,
            parent,
        } = declaration;

        let mut state = self.lock()?;
        if state.entries.contains_key(&resource) {
            return Err(DeployError::InvalidConfig(format!(
                "resource {resource} declared twice"
            )));
        }
        if let Some(p) = &parent {
            if !state.entries.contains_key(p) {
                return Err(DeployError::InvalidConfig(format!(
                    "parent {p} of {resource} is not declared"
                )));
            }
        }

        let mut producers: BTreeSet<String> = properties.producers().map(String::from).collect();
        producers.insert(resource.to_string());

        let id = format!("{}/{}", resource.kind, resource.name);
        let props = properties.clone();
        let id = Deferred::from_parts(producers, false, async move {
            props.resolve().await.map(|_| id)
        });

        debug!(resource = %resource, parent = ?parent, "declared");
        state.entries.insert(
            resource.clone(),
            Entry { properties, parent },
        );

        Ok(Resource::new(resource, id))
    }

    fn output(&self, resource: &ResourceRef, attr: &str) -> Deferred<String> {
        let producer = resource.to_string();
        let Ok(state) = self.lock() else {
            return Deferred::failed(DeployError::Other("engine state poisoned".into()));
        };
        let Some(entry) = state.entries.get(resource) else {
            return Deferred::failed(DeployError::upstream(
                producer,
                format!("output '{attr}' requested before declaration"),
            ));
        };

        let preset = state
            .outputs
            .get(&(resource.clone(), attr.to_string()))
            .cloned();
        let preview = self.preview;
        let attr = attr.to_string();
        let secret = entry.properties.is_secret() || preset.as_ref().is_some_and(|p| p.secret);

        let mut producers: BTreeSet<String> =
            entry.properties.producers().map(String::from).collect();
        producers.insert(producer.clone());

        let properties = entry.properties.clone();
        Deferred::from_parts(producers, secret, async move {
            let value = properties.resolve().await?;
            if let Some(p) = preset {
                return Ok(p.value.to_string());
            }
            match attribute(&value, &attr) {
                Some(v) => Ok(v),
                None if preview => Ok(placeholder(&producer, &attr)),
                None => Err(DeployError::upstream(
                    producer,
                    format!("no output named '{attr}'"),
                )),
            }
        })
    }

    fn stack_output(&self, stack: &str, name: &str) -> Deferred<String> {
        let producer = format!("stack::{stack}");
        let preset = self.lock().ok().and_then(|state| {
            state
                .stack_outputs
                .get(&(stack.to_string(), name.to_string()))
                .cloned()
        });

        match preset {
            Some(p) => p.deferred(&producer),
            None if self.preview => {
                let value = placeholder(&producer, name);
                Deferred::from_future(producer, async move { Ok(value) })
            }
            None => Deferred::failed(DeployError::upstream(
                producer,
                format!("stack has no output named '{name}'"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn props(value: serde_json::Value) -> Deferred<serde_json::Value> {
        Deferred::resolved(value)
    }

    #[tokio::test]
    async fn id_depends_on_properties() {
        let engine = MemoryEngine::new();
        let res = engine
            .declare(Declaration::new("storage:Account", "web", props(json!({"name": "web"}))))
            .unwrap();

        let id = res.id();

        assert!(id.producers().any(|p| p == "storage:Account::web"));
        assert_eq!(id.resolve().await.unwrap(), "storage:Account/web");
    }

    #[tokio::test]
    async fn output_from_properties() {
        let engine = MemoryEngine::new();
        let res = engine
            .declare(Declaration::new("apimanagement:Api", "v1", props(json!({"path": "api"}))))
            .unwrap();

        let path = engine.output(res.reference(), "path");

        assert_eq!(path.resolve().await.unwrap(), "api");
    }

    #[tokio::test]
    async fn missing_output_fails_unless_preview() {
        let strict = MemoryEngine::new();
        let res = strict
            .declare(Declaration::new("cdn:Endpoint", "e", props(json!({}))))
            .unwrap();
        let err = strict
            .output(res.reference(), "hostName")
            .resolve()
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::UpstreamResolution { .. }));

        let preview = MemoryEngine::preview();
        let res = preview
            .declare(Declaration::new("cdn:Endpoint", "e", props(json!({}))))
            .unwrap();
        let host = preview.output(res.reference(), "hostName").resolve().await.unwrap();
        assert_eq!(host, "<computed cdn:Endpoint::e.hostName>");
        assert!(is_placeholder(&format!("https://{host}")));
        assert!(!is_placeholder("https://e.azureedge.net"));
    }

    #[tokio::test]
    async fn outputs_loaded_from_yaml() {
        let engine = MemoryEngine::new()
            .with_outputs(
                r"
stacks:
  drone/tenant/dev:
    tenantId: t-1
resources:
  - kind: app:Function
    name: f
    attr: key
    value: s3cr3t
    secret: true
",
            )
            .unwrap();
        let res = engine
            .declare(Declaration::new("app:Function", "f", props(json!({}))))
            .unwrap();

        let tenant = engine.stack_output("drone/tenant/dev", "tenantId");
        let key = engine.output(res.reference(), "key");

        assert_eq!(tenant.resolve().await.unwrap(), "t-1");
        assert!(key.is_secret());
        assert_eq!(key.resolve().await.unwrap(), "s3cr3t");
        assert!(!engine.is_preview());
    }

    #[test]
    fn outputs_reject_unknown_sections_and_missing_files() {
        let typo = MemoryEngine::new().with_outputs("stack:\n  a:\n    b: c\n");
        assert!(matches!(typo, Err(DeployError::Yaml(_))));

        let missing = MemoryEngine::new().load_outputs(Path::new("no/such/outputs.yaml"));
        assert!(matches!(missing, Err(DeployError::FileNotFound(_))));
    }

    #[tokio::test]
    async fn secret_preset_is_flagged() {
        let engine = MemoryEngine::new().with_secret_output("app:Function", "f", "key", "s3cr3t");
        let res = engine
            .declare(Declaration::new("app:Function", "f", props(json!({}))))
            .unwrap();

        let key = engine.output(res.reference(), "key");

        assert!(key.is_secret());
        assert_eq!(key.resolve().await.unwrap(), "s3cr3t");
        assert!(!res.id().is_secret());
    }

    #[test]
    fn rejects_duplicate_and_orphan() {
        let engine = MemoryEngine::new();
        engine
            .declare(Declaration::new("k", "a", props(json!({}))))
            .unwrap();

        let dup = engine.declare(Declaration::new("k", "a", props(json!({}))));
        assert!(matches!(dup, Err(DeployError::InvalidConfig(_))));

        let orphan = engine.declare(
            Declaration::new("k", "b", props(json!({}))).parent(&ResourceRef::new("k", "missing")),
        );
        assert!(matches!(orphan, Err(DeployError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn apply_isolates_failures_and_redacts() {
        let engine = MemoryEngine::new();
        engine
            .declare(Declaration::new("k", "ok", props(json!({"v": 1}))))
            .unwrap();
        engine
            .declare(Declaration::new(
                "k",
                "bad",
                Deferred::failed(DeployError::upstream("x", "down")),
            ))
            .unwrap();
        engine
            .declare(Declaration::new("k", "hidden", props(json!({"value": "pw"})).secret()))
            .unwrap();

        let report = engine.apply().await.unwrap();

        assert_eq!(report.applied.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, ResourceRef::new("k", "bad"));
        let yaml = report.to_yaml().unwrap();
        assert!(!yaml.contains("pw"));
        assert!(yaml.contains("[secret]"));
    }
}
