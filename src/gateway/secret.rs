use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::deferred::Deferred;
use crate::engine::{Declaration, Engine};
use crate::error::{DeployError, DeployResult};

pub const NAMED_VALUE: &str = "apimanagement:NamedValue";

/// A gateway secret, usable only through `{{name}}` indirection.
///
/// The reference carries the dependency on the secret's creation but
/// never the value itself.
#[derive(Debug, Clone)]
pub struct SecretRef {
    name: String,
    token: Deferred<String>,
}

impl SecretRef {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The `{{name}}` token, resolving once the secret record exists.
    #[must_use]
    pub fn token(&self) -> Deferred<String> {
        self.token.clone()
    }
}

impl PartialEq for SecretRef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for SecretRef {}

impl fmt::Display for SecretRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{{{}}}}}", self.name)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NamedValueRecord {
    name: String,
    display_name: String,
    service_name: String,
    tags: Vec<String>,
    secret: bool,
    value: String,
}

struct Bound {
    producers: BTreeSet<String>,
    reference: SecretRef,
}

/// Registers credentials as named gateway secrets.
pub struct SecretBinder {
    service: Deferred<String>,
    tags: Vec<String>,
    bound: BTreeMap<String, Bound>,
}

impl SecretBinder {
    /// `service` resolves to the gateway service that owns the
    /// secrets.
    #[must_use]
    pub fn new(service: Deferred<String>) -> Self {
        Self {
            service,
            tags: vec!["key".to_string(), "function".to_string(), "code".to_string()],
            bound: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| (*t).to_string()).collect();
        self
    }

    /// Store `key` as the secret `name` and return a reference to it.
    ///
    /// Binding the same name again with a key from the same producers
    /// returns the existing reference without declaring anything. A
    /// key without producers is a literal and can never be shown to be
    /// the same key, so rebinding it conflicts.
    pub fn bind(
        &mut self,
        engine: &dyn Engine,
        name: &str,
        key: Deferred<String>,
    ) -> DeployResult<SecretRef> {
        let producers: BTreeSet<String> = key.producers().map(String::from).collect();

        if let Some(existing) = self.bound.get(name) {
            if !producers.is_empty() && existing.producers == producers {
                debug!(secret = name, "secret already bound");
                return Ok(existing.reference.clone());
            }
            return Err(DeployError::DuplicateSecret(name.to_string()));
        }

        let record_name = name.to_string();
        let tags = self.tags.clone();
        let properties = crate::deferred::join(self.service.clone(), key.secret()).try_map(
            move |(service_name, value)| {
                let record = NamedValueRecord {
                    display_name: record_name.clone(),
                    name: record_name,
                    service_name,
                    tags,
                    secret: true,
                    value,
                };
                Ok(serde_json::to_value(record)?)
            },
        );

        let resource = engine.declare(Declaration::new(NAMED_VALUE, name, properties))?;
        let indirection = format!("{{{{{name}}}}}");
        let reference = SecretRef {
            name: name.to_string(),
            token: resource.id().map(move |_| indirection),
        };

        debug!(secret = name, "secret bound");
        self.bound.insert(
            name.to_string(),
            Bound {
                producers,
                reference: reference.clone(),
            },
        );
        Ok(reference)
    }
}
