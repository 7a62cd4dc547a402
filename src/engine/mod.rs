pub mod memory;

use std::fmt;

use serde::Serialize;

use crate::deferred::Deferred;
use crate::error::DeployResult;

/// Identifies a declared resource by kind and logical name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ResourceRef {
    pub kind: String,
    pub name: String,
}

impl ResourceRef {
    #[must_use]
    pub fn new(kind: &str, name: &str) -> Self {
        Self {
            kind: kind.to_string(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.kind, self.name)
    }
}

/// A desired resource handed to the provisioning engine.
///
/// `parent` is an explicit ownership edge: the engine creates the
/// parent before the child and removes the child no later than the
/// parent on teardown.
#[derive(Debug, Clone)]
pub struct Declaration {
    pub resource: ResourceRef,
    pub properties: Deferred<serde_json::Value>,
    pub parent: Option<ResourceRef>,
}

impl Declaration {
    #[must_use]
    pub fn new(kind: &str, name: &str, properties: Deferred<serde_json::Value>) -> Self {
        Self {
            resource: ResourceRef::new(kind, name),
            properties,
            parent: None,
        }
    }

    #[must_use]
    pub fn parent(mut self, parent: &ResourceRef) -> Self {
        self.parent = Some(parent.clone());
        self
    }
}

/// Handles returned for a declared resource.
#[derive(Debug, Clone)]
pub struct Resource {
    reference: ResourceRef,
    id: Deferred<String>,
}

impl Resource {
    #[must_use]
    pub const fn new(reference: ResourceRef, id: Deferred<String>) -> Self {
        Self { reference, id }
    }

    #[must_use]
    pub const fn reference(&self) -> &ResourceRef {
        &self.reference
    }

    /// The provider-assigned identifier. Never secret.
    #[must_use]
    pub fn id(&self) -> Deferred<String> {
        self.id.clone()
    }
}

/// The external provisioning engine.
///
/// Implementations compute the dependency graph from the producer
/// sets of declared properties, call the control plane, and reconcile
/// state. Nothing in this crate materializes a value except through an
/// implementation of this trait or a content store.
pub trait Engine {
    /// Register a desired resource and return handles to it.
    fn declare(&self, declaration: Declaration) -> DeployResult<Resource>;

    /// An attribute exposed by a declared resource.
    fn output(&self, resource: &ResourceRef, attr: &str) -> Deferred<String>;

    /// A named output of a separate, already applied deployment.
    fn stack_output(&self, stack: &str, name: &str) -> Deferred<String>;
}

/// Reads outputs of an upstream deployment.
///
/// # Example
///
/// ```
/// use ponte::engine::StackReference;
/// use ponte::engine::memory::MemoryEngine;
///
/// let engine = MemoryEngine::new()
///     .with_stack_output("org/telemetry/dev", "cosmosEndpoint", "https://db");
/// let telemetry = StackReference::new("org/telemetry/dev");
///
/// let endpoint = telemetry.require(&engine, "cosmosEndpoint");
/// assert_eq!(
///     futures::executor::block_on(endpoint.resolve()).unwrap(),
///     "https://db"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct StackReference {
    stack: String,
}

impl StackReference {
    #[must_use]
    pub fn new(stack: &str) -> Self {
        Self {
            stack: stack.to_string(),
        }
    }

    #[must_use]
    pub fn require(&self, engine: &dyn Engine, name: &str) -> Deferred<String> {
        engine.stack_output(&self.stack, name)
    }
}
