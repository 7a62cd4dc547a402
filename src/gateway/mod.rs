//! Route configuration for the API gateway.
//!
//! [`GatewayBuilder`] turns a desired API shape into gateway records:
//! service, version set, API, operations, named secret, backend, one
//! inbound policy per operation, product and product/API link. Each
//! record's properties are joined from the identifiers of the records
//! it references, so the engine sees the creation order as data
//! dependencies and is free to parallelize independent branches.

pub mod policy;
pub mod route;
pub mod secret;

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::Naming;
use crate::deferred::{self, Deferred};
use crate::engine::{Declaration, Engine, Resource, ResourceRef};
use crate::error::{DeployError, DeployResult};

pub use policy::InboundPolicy;
pub use route::{Method, Operation, ParamType, PathParam};
pub use secret::{SecretBinder, SecretRef};

pub const SERVICE: &str = "apimanagement:Service";
pub const VERSION_SET: &str = "apimanagement:ApiVersionSet";
pub const API: &str = "apimanagement:Api";
pub const OPERATION: &str = "apimanagement:ApiOperation";
pub const BACKEND: &str = "apimanagement:Backend";
pub const POLICY: &str = "apimanagement:ApiOperationPolicy";
pub const PRODUCT: &str = "apimanagement:Product";
pub const PRODUCT_API: &str = "apimanagement:ProductApi";

const MANAGEMENT_URL: &str = "https://management.azure.com";
const DEFAULT_KEY_PARAM: &str = "code";

/// The compute tier behind the gateway.
#[derive(Debug, Clone)]
pub struct ComputeTarget {
    resource_id: Deferred<String>,
    base_url: Deferred<String>,
    access_key: Option<Deferred<String>>,
    key_param: Option<String>,
}

impl ComputeTarget {
    #[must_use]
    pub const fn new(resource_id: Deferred<String>, base_url: Deferred<String>) -> Self {
        Self {
            resource_id,
            base_url,
            access_key: None,
            key_param: None,
        }
    }

    /// A function app declared through `engine`: the base URL comes
    /// from its `defaultHostname` and the key from its `functionKey`
    /// output.
    #[must_use]
    pub fn function_app(engine: &dyn Engine, app: &Resource) -> Self {
        let base_url = engine
            .output(app.reference(), "defaultHostname")
            .map(|host| format!("https://{host}/api"));
        let key = engine.output(app.reference(), "functionKey");
        Self::new(app.id(), base_url).access_key(key)
    }

    /// Require key authentication, passing the key in the query
    /// parameter `param`.
    #[must_use]
    pub fn key_auth(mut self, param: &str) -> Self {
        self.key_param = Some(param.to_string());
        self
    }

    /// Supply the raw access key. Implies key authentication.
    #[must_use]
    pub fn access_key(mut self, key: Deferred<String>) -> Self {
        self.access_key = Some(key.secret());
        if self.key_param.is_none() {
            self.key_param = Some(DEFAULT_KEY_PARAM.to_string());
        }
        self
    }

    #[must_use]
    pub const fn requires_key(&self) -> bool {
        self.key_param.is_some()
    }
}

/// The API record: path, version and revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Api {
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub path: String,
    pub version: String,
    pub revision: String,
    pub protocols: Vec<String>,
}

impl Api {
    #[must_use]
    pub fn new(name: &str, path: &str) -> Self {
        Self {
            name: name.to_string(),
            display_name: name.to_string(),
            description: None,
            path: path.to_string(),
            version: String::new(),
            revision: String::new(),
            protocols: vec!["https".to_string()],
        }
    }

    #[must_use]
    pub fn version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    #[must_use]
    pub fn revision(mut self, revision: &str) -> Self {
        self.revision = revision.to_string();
        self
    }

    #[must_use]
    pub fn display_name(mut self, name: &str) -> Self {
        self.display_name = name.to_string();
        self
    }

    #[must_use]
    pub fn description(mut self, text: &str) -> Self {
        self.description = Some(text.to_string());
        self
    }

    #[must_use]
    pub fn protocols(mut self, protocols: &[&str]) -> Self {
        self.protocols = protocols.iter().map(|p| (*p).to_string()).collect();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Published,
    NotPublished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subscription {
    Required,
    NotRequired,
}

/// Product grouping of the API. Visibility and subscription are
/// always stated by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub product_id: String,
    pub display_name: String,
    pub description: Option<String>,
    pub terms: Option<String>,
    pub visibility: Visibility,
    pub subscription: Subscription,
}

impl Product {
    #[must_use]
    pub fn new(product_id: &str, visibility: Visibility, subscription: Subscription) -> Self {
        Self {
            product_id: product_id.to_string(),
            display_name: product_id.to_string(),
            description: None,
            terms: None,
            visibility,
            subscription,
        }
    }

    #[must_use]
    pub fn display_name(mut self, name: &str) -> Self {
        self.display_name = name.to_string();
        self
    }

    #[must_use]
    pub fn description(mut self, text: &str) -> Self {
        self.description = Some(text.to_string());
        self
    }

    #[must_use]
    pub fn terms(mut self, text: &str) -> Self {
        self.terms = Some(text.to_string());
        self
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Sku {
    name: &'static str,
    capacity: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ServiceRecord {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<String>,
    sku: Sku,
    publisher_email: String,
    publisher_name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VersionSetRecord {
    name: String,
    service_name: String,
    display_name: String,
    versioning_scheme: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRecord {
    name: String,
    service_name: String,
    display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    path: String,
    version: String,
    revision: String,
    version_set_id: String,
    protocols: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OperationRecord {
    service_name: String,
    api_name: String,
    operation_id: String,
    display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    method: Method,
    url_template: String,
    template_parameters: Vec<PathParam>,
}

#[derive(Serialize)]
struct QueryCredentials {
    query: std::collections::BTreeMap<String, String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BackendRecord {
    name: String,
    service_name: String,
    resource_id: String,
    url: String,
    protocol: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    credentials: Option<QueryCredentials>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PolicyRecord {
    service_name: String,
    api_name: String,
    operation_id: String,
    xml_content: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProductRecord {
    product_id: String,
    service_name: String,
    display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    terms: Option<String>,
    subscription_required: bool,
    published: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProductApiRecord {
    service_name: String,
    api_name: String,
    product_id: String,
}

fn to_properties<R: Serialize>(record: &R) -> DeployResult<serde_json::Value> {
    Ok(serde_json::to_value(record)?)
}

/// Handles to everything the gateway build declared.
#[derive(Debug, Clone)]
pub struct GatewayOutputs {
    /// `https://<gateway-host>/<api-path>/<version>/<operation-prefix>/`
    pub api_url: Deferred<String>,
    pub service: Resource,
    pub version_set: Resource,
    pub api: Resource,
    pub operations: Vec<Resource>,
    pub secret: Option<SecretRef>,
    pub backend: Resource,
    pub policies: Vec<Resource>,
    pub product: Resource,
    pub product_api: Resource,
}

impl GatewayOutputs {
    /// Every declared record, in declaration order.
    #[must_use]
    pub fn records(&self) -> Vec<ResourceRef> {
        let mut refs = vec![
            self.service.reference().clone(),
            self.version_set.reference().clone(),
            self.api.reference().clone(),
        ];
        refs.extend(self.operations.iter().map(|r| r.reference().clone()));
        refs.push(self.backend.reference().clone());
        refs.extend(self.policies.iter().map(|r| r.reference().clone()));
        refs.push(self.product.reference().clone());
        refs.push(self.product_api.reference().clone());
        refs
    }
}

/// Assembles the gateway records for one versioned API.
///
/// # Example
///
/// ```
/// use ponte::Naming;
/// use ponte::deferred::Deferred;
/// use ponte::engine::memory::MemoryEngine;
/// use ponte::gateway::{
///     Api, ComputeTarget, GatewayBuilder, Method, Operation, PathParam, Product,
///     Subscription, Visibility,
/// };
///
/// let engine = MemoryEngine::new();
/// let target = ComputeTarget::new(
///     Deferred::resolved("/subscriptions/s/sites/drone-app".to_string()),
///     Deferred::resolved("https://drone-app.azurewebsites.net/api".to_string()),
/// );
///
/// let outputs = GatewayBuilder::new(&Naming::new("drone"))
///     .publisher("drones@contoso.com", "contoso")
///     .api(Api::new("dronedeliveryapiv1", "api").version("v1").revision("1"))
///     .operation(
///         Operation::new("dronestatusGET", Method::Get, "/dronestatus/{deviceid}")
///             .param(PathParam::new("deviceid"))
///             .rewrite("GetStatusFunction?deviceId={deviceid}"),
///     )
///     .backend("dronestatusdotnet", target)
///     .product(Product::new(
///         "dronedeliveryprodapi",
///         Visibility::Published,
///         Subscription::NotRequired,
///     ))
///     .build(&engine)
///     .unwrap();
///
/// let url = futures::executor::block_on(outputs.api_url.resolve()).unwrap();
/// assert_eq!(url, "https://drone-apim.azure-api.net/api/v1/dronestatus/");
/// ```
#[derive(Debug, Clone)]
pub struct GatewayBuilder {
    service: String,
    domain: String,
    location: Option<String>,
    publisher: Option<(String, String)>,
    version_set: Option<(String, String)>,
    api: Option<Api>,
    operations: Vec<Operation>,
    backend: Option<(String, ComputeTarget)>,
    secret_name: Option<String>,
    origins: Vec<Deferred<String>>,
    product: Option<Product>,
    url_prefix: Option<String>,
    management_url: String,
}

impl GatewayBuilder {
    #[must_use]
    pub fn new(naming: &Naming) -> Self {
        Self {
            service: naming.gateway_service(),
            domain: naming.gateway_domain.clone(),
            location: None,
            publisher: None,
            version_set: None,
            api: None,
            operations: Vec::new(),
            backend: None,
            secret_name: None,
            origins: Vec::new(),
            product: None,
            url_prefix: None,
            management_url: MANAGEMENT_URL.to_string(),
        }
    }

    #[must_use]
    pub fn location(mut self, location: &str) -> Self {
        self.location = Some(location.to_string());
        self
    }

    #[must_use]
    pub fn publisher(mut self, email: &str, name: &str) -> Self {
        self.publisher = Some((email.to_string(), name.to_string()));
        self
    }

    /// Defaults to `<api-name>-versionset` named after the API.
    #[must_use]
    pub fn version_set(mut self, name: &str, display_name: &str) -> Self {
        self.version_set = Some((name.to_string(), display_name.to_string()));
        self
    }

    #[must_use]
    pub fn api(mut self, api: Api) -> Self {
        self.api = Some(api);
        self
    }

    #[must_use]
    pub fn operation(mut self, operation: Operation) -> Self {
        self.operations.push(operation);
        self
    }

    #[must_use]
    pub fn backend(mut self, name: &str, target: ComputeTarget) -> Self {
        self.backend = Some((name.to_string(), target));
        self
    }

    /// Name of the gateway secret holding the backend key. Defaults to
    /// `<backend>-key`.
    #[must_use]
    pub fn secret_name(mut self, name: &str) -> Self {
        self.secret_name = Some(name.to_string());
        self
    }

    /// Add a front-end origin allowed by CORS. Order of calls is the
    /// order in the rendered policy.
    #[must_use]
    pub fn origin(mut self, origin: Deferred<String>) -> Self {
        self.origins.push(origin);
        self
    }

    #[must_use]
    pub fn origins(mut self, origins: impl IntoIterator<Item = Deferred<String>>) -> Self {
        self.origins.extend(origins);
        self
    }

    #[must_use]
    pub fn product(mut self, product: Product) -> Self {
        self.product = Some(product);
        self
    }

    /// Last path segment of the public base URL. Defaults to the first
    /// literal segment of the first operation's template.
    #[must_use]
    pub fn url_prefix(mut self, prefix: &str) -> Self {
        self.url_prefix = Some(prefix.trim_matches('/').to_string());
        self
    }

    #[must_use]
    pub fn management_url(mut self, url: &str) -> Self {
        self.management_url = url.trim_end_matches('/').to_string();
        self
    }

    fn validate(&self) -> DeployResult<(&Api, &Product, &(String, ComputeTarget), String)> {
        let api = self
            .api
            .as_ref()
            .ok_or_else(|| DeployError::InvalidConfig("no API configured".into()))?;
        if api.path.trim_matches('/').is_empty() {
            return Err(DeployError::InvalidConfig(format!(
                "API '{}' needs a path",
                api.name
            )));
        }
        if api.version.is_empty() || api.revision.is_empty() {
            return Err(DeployError::InvalidConfig(format!(
                "API '{}' needs an explicit version and revision",
                api.name
            )));
        }
        if self.publisher.is_none() {
            return Err(DeployError::InvalidConfig(
                "gateway publisher email and name are required".into(),
            ));
        }
        if self.operations.is_empty() {
            return Err(DeployError::InvalidConfig(format!(
                "API '{}' has no operations",
                api.name
            )));
        }

        let mut ids = BTreeSet::new();
        for op in &self.operations {
            op.validate()?;
            if !ids.insert(op.operation_id.as_str()) {
                return Err(DeployError::malformed(
                    &op.operation_id,
                    format!("operation id is not unique within API '{}'", api.name),
                ));
            }
        }

        let backend = self
            .backend
            .as_ref()
            .ok_or_else(|| DeployError::InvalidConfig("no backend configured".into()))?;
        if backend.1.requires_key() && backend.1.access_key.is_none() {
            return Err(DeployError::MissingCredential(backend.0.clone()));
        }

        let product = self
            .product
            .as_ref()
            .ok_or_else(|| DeployError::InvalidConfig("no product configured".into()))?;

        let prefix = self
            .url_prefix
            .clone()
            .or_else(|| self.operations[0].prefix().map(String::from))
            .ok_or_else(|| {
                DeployError::InvalidConfig(
                    "cannot derive the public URL prefix; set url_prefix".into(),
                )
            })?;

        Ok((api, product, backend, prefix))
    }

    /// Validate the whole shape, then declare every record.
    ///
    /// Nothing is declared if validation fails.
    pub fn build(self, engine: &dyn Engine) -> DeployResult<GatewayOutputs> {
        let (api, product, (backend_name, target), prefix) = self.validate()?;
        let (publisher_email, publisher_name) = self.publisher.clone().unwrap_or_default();

        info!(
            service = %self.service,
            api = %api.name,
            operations = self.operations.len(),
            "declaring gateway"
        );

        // service
        let record = ServiceRecord {
            name: self.service.clone(),
            location: self.location.clone(),
            sku: Sku {
                name: "Consumption",
                capacity: 0,
            },
            publisher_email,
            publisher_name,
        };
        let service = engine.declare(Declaration::new(
            SERVICE,
            &self.service,
            Deferred::resolved(to_properties(&record)?),
        ))?;
        let service_name = engine.output(service.reference(), "name");

        // version set
        let (vs_name, vs_display) = self.version_set.clone().unwrap_or_else(|| {
            (format!("{}-versionset", api.name), api.display_name.clone())
        });
        let properties = {
            let name = vs_name.clone();
            service_name.clone().try_map(move |service_name| {
                to_properties(&VersionSetRecord {
                    name,
                    service_name,
                    display_name: vs_display,
                    versioning_scheme: "Segment",
                })
            })
        };
        let version_set = engine.declare(Declaration::new(VERSION_SET, &vs_name, properties))?;

        // api
        let properties = {
            let api = api.clone();
            deferred::join(service_name.clone(), version_set.id()).try_map(
                move |(service_name, version_set_id)| {
                    to_properties(&ApiRecord {
                        name: api.name,
                        service_name,
                        display_name: api.display_name,
                        description: api.description,
                        path: api.path.trim_matches('/').to_string(),
                        version: api.version,
                        revision: api.revision,
                        version_set_id,
                        protocols: api.protocols,
                    })
                },
            )
        };
        let api_resource = engine.declare(Declaration::new(API, &api.name, properties))?;
        let api_name = engine.output(api_resource.reference(), "name");

        // operations
        let mut operations = Vec::with_capacity(self.operations.len());
        for op in &self.operations {
            let properties = {
                let op = op.clone();
                deferred::join(service_name.clone(), api_name.clone()).try_map(
                    move |(service_name, api_name)| {
                        to_properties(&OperationRecord {
                            service_name,
                            api_name,
                            operation_id: op.operation_id,
                            display_name: op.display_name,
                            description: op.description,
                            method: op.method,
                            url_template: op.url_template,
                            template_parameters: op.params,
                        })
                    },
                )
            };
            debug!(operation = %op.operation_id, "declaring operation");
            operations.push(engine.declare(Declaration::new(
                OPERATION,
                &op.operation_id,
                properties,
            ))?);
        }

        // secret, then backend
        let secret = match (&target.access_key, &target.key_param) {
            (Some(key), Some(_)) => {
                let name = self
                    .secret_name
                    .clone()
                    .unwrap_or_else(|| format!("{backend_name}-key"));
                let mut binder = SecretBinder::new(service_name.clone());
                Some(binder.bind(engine, &name, key.clone())?)
            }
            _ => None,
        };
        let credential: Deferred<Option<String>> = secret
            .as_ref()
            .map_or_else(|| Deferred::resolved(None), |s| s.token().map(Some));

        let properties = {
            let name = backend_name.clone();
            let management_url = self.management_url.clone();
            let key_param = target.key_param.clone();
            deferred::join3(
                service_name.clone(),
                deferred::join(target.resource_id.clone(), target.base_url.clone()),
                credential,
            )
            .try_map(move |(service_name, (resource_id, url), token)| {
                let credentials = token.zip(key_param).map(|(token, param)| QueryCredentials {
                    query: std::collections::BTreeMap::from([(param, token)]),
                });
                to_properties(&BackendRecord {
                    name,
                    service_name,
                    resource_id: format!(
                        "{management_url}/{}",
                        resource_id.trim_start_matches('/')
                    ),
                    url,
                    protocol: "http",
                    credentials,
                })
            })
        };
        let backend = engine.declare(Declaration::new(BACKEND, backend_name, properties))?;
        let backend_id = engine.output(backend.reference(), "name");

        // policies
        let mut policies = Vec::with_capacity(self.operations.len());
        for op in &self.operations {
            let properties = {
                let op = op.clone();
                deferred::join3(
                    deferred::join(service_name.clone(), api_name.clone()),
                    backend_id.clone(),
                    deferred::join_all(self.origins.clone()),
                )
                .try_map(move |((service_name, api_name), backend_id, origins)| {
                    let policy = InboundPolicy::new(op.rewrite_template(), &backend_id)
                        .origins(origins)
                        .method(op.method);
                    to_properties(&PolicyRecord {
                        service_name,
                        api_name,
                        operation_id: op.operation_id,
                        xml_content: policy.to_xml(),
                    })
                })
            };
            policies.push(engine.declare(Declaration::new(POLICY, &op.operation_id, properties))?);
        }

        // product
        let properties = {
            let product = product.clone();
            service_name.clone().try_map(move |service_name| {
                to_properties(&ProductRecord {
                    product_id: product.product_id,
                    service_name,
                    display_name: product.display_name,
                    description: product.description,
                    terms: product.terms,
                    subscription_required: product.subscription == Subscription::Required,
                    published: product.visibility == Visibility::Published,
                })
            })
        };
        let product_resource =
            engine.declare(Declaration::new(PRODUCT, &product.product_id, properties))?;
        let product_id = engine.output(product_resource.reference(), "productId");

        let properties = deferred::join3(service_name, api_name, product_id).try_map(
            |(service_name, api_name, product_id)| {
                to_properties(&ProductApiRecord {
                    service_name,
                    api_name,
                    product_id,
                })
            },
        );
        let product_api = engine.declare(Declaration::new(
            PRODUCT_API,
            &format!("{}-{}", product.product_id, api.name),
            properties,
        ))?;

        // public URL
        let domain = self.domain.clone();
        let version = api.version.clone();
        let api_url = deferred::join(
            engine.output(service.reference(), "name"),
            engine.output(api_resource.reference(), "path"),
        )
        .map(move |(service, path)| {
            format!("https://{service}.{domain}/{path}/{version}/{prefix}/")
        });

        Ok(GatewayOutputs {
            api_url,
            service,
            version_set,
            api: api_resource,
            operations,
            secret,
            backend,
            policies,
            product: product_resource,
            product_api,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::memory::MemoryEngine;

    fn target() -> ComputeTarget {
        ComputeTarget::new(
            Deferred::resolved("/subscriptions/s/sites/app".to_string()),
            Deferred::resolved("https://app.example/api".to_string()),
        )
    }

    fn builder() -> GatewayBuilder {
        GatewayBuilder::new(&Naming::new("drone"))
            .publisher("drones@contoso.com", "contoso")
            .api(Api::new("dronedeliveryapiv1", "api").version("v1").revision("1"))
            .operation(
                Operation::new("dronestatusGET", Method::Get, "/dronestatus/{deviceid}")
                    .param(PathParam::new("deviceid"))
                    .rewrite("GetStatusFunction?deviceId={deviceid}"),
            )
            .backend("dronestatusdotnet", target())
            .product(Product::new(
                "dronedeliveryprodapi",
                Visibility::Published,
                Subscription::NotRequired,
            ))
    }

    #[test]
    fn missing_revision_rejected() {
        let engine = MemoryEngine::new();

        let err = builder()
            .api(Api::new("a", "api").version("v1"))
            .build(&engine)
            .unwrap_err();

        assert!(matches!(err, DeployError::InvalidConfig(_)));
        assert!(engine.declared().unwrap().is_empty());
    }

    #[test]
    fn malformed_route_declares_nothing() {
        let engine = MemoryEngine::new();

        let err = builder()
            .operation(Operation::new("broken", Method::Get, "/x/{id}"))
            .build(&engine)
            .unwrap_err();

        assert!(matches!(
            err,
            DeployError::MalformedRoute { ref operation, .. } if operation == "broken"
        ));
        assert!(engine.declared().unwrap().is_empty());
    }

    #[test]
    fn duplicate_operation_id() {
        let engine = MemoryEngine::new();
        let op = Operation::new("dronestatusGET", Method::Get, "/other");

        let err = builder().operation(op).build(&engine).unwrap_err();

        assert!(err.to_string().contains("not unique"));
    }

    #[test]
    fn key_auth_without_key_is_missing_credential() {
        let engine = MemoryEngine::new();

        let err = builder()
            .backend("dronestatusdotnet", target().key_auth("code"))
            .build(&engine)
            .unwrap_err();

        assert!(matches!(err, DeployError::MissingCredential(ref b) if b == "dronestatusdotnet"));
        assert!(engine.declared().unwrap().is_empty());
    }

    #[test]
    fn declaration_order_follows_dependencies() {
        let engine = MemoryEngine::new();

        let outputs = builder()
            .backend(
                "dronestatusdotnet",
                target().access_key(Deferred::resolved("k".to_string())),
            )
            .build(&engine)
            .unwrap();

        let kinds: Vec<String> = engine
            .declared()
            .unwrap()
            .into_iter()
            .map(|r| r.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                SERVICE,
                VERSION_SET,
                API,
                OPERATION,
                secret::NAMED_VALUE,
                BACKEND,
                POLICY,
                PRODUCT,
                PRODUCT_API
            ]
        );
        assert_eq!(outputs.records().len(), 8);
        assert!(outputs.secret.is_some());
    }

    #[tokio::test]
    async fn explicit_url_prefix() {
        let engine = MemoryEngine::new();

        let outputs = builder().url_prefix("/status/").build(&engine).unwrap();

        assert_eq!(
            outputs.api_url.resolve().await.unwrap(),
            "https://drone-apim.azure-api.net/api/v1/status/"
        );
    }

    #[tokio::test]
    async fn product_flags_are_explicit() {
        let engine = MemoryEngine::new();
        builder()
            .product(Product::new("p", Visibility::NotPublished, Subscription::Required))
            .build(&engine)
            .unwrap();

        let report = engine.apply().await.unwrap();
        let product = report.get(PRODUCT, "p").unwrap();

        assert_eq!(product.properties["published"], false);
        assert_eq!(product.properties["subscriptionRequired"], true);
        let link = report.get(PRODUCT_API, "p-dronedeliveryapiv1").unwrap();
        assert_eq!(link.properties["productId"], "p");
    }
}
