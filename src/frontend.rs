//! Front-end hosting: static website storage, optional CDN edge, and
//! the identity application guarding the API.

use serde::Serialize;
use tracing::info;

use crate::config::Naming;
use crate::deferred::{self, Deferred};
use crate::engine::{Declaration, Engine, Resource, ResourceRef};
use crate::error::DeployResult;
use crate::publish::Container;

pub const STORAGE_ACCOUNT: &str = "storage:Account";
pub const CDN_PROFILE: &str = "cdn:Profile";
pub const CDN_ENDPOINT: &str = "cdn:Endpoint";
pub const APPLICATION: &str = "azuread:Application";

const WEB_CONTAINER: &str = "$web";

/// Storage account serving the published front end, optionally
/// behind a CDN endpoint.
///
/// # Example
///
/// ```
/// use ponte::{Naming, StaticSite};
///
/// let site = StaticSite::new(&Naming::new("drone")).error_document("404.html").cdn();
///
/// assert_eq!(site.account, "dronefe");
/// assert_eq!(site.index_document, "index.html");
/// assert!(site.cdn.is_some());
/// ```
#[derive(Debug, Clone)]
pub struct StaticSite {
    pub account: String,
    pub index_document: String,
    pub error_document: Option<String>,
    pub cdn: Option<(String, String)>,
    pub tags: Vec<(String, String)>,
    default_cdn: (String, String),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StaticWebsite {
    index_document: String,
    #[serde(rename = "error404Document", skip_serializing_if = "Option::is_none")]
    error_document: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AccountRecord {
    name: String,
    account_tier: &'static str,
    account_replication_type: &'static str,
    static_website: StaticWebsite,
    tags: std::collections::BTreeMap<String, String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Origin {
    name: &'static str,
    host_name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EndpointRecord {
    name: String,
    profile_name: String,
    is_http_allowed: bool,
    origins: Vec<Origin>,
    origin_host_header: String,
}

impl StaticSite {
    #[must_use]
    pub fn new(naming: &Naming) -> Self {
        Self {
            account: naming.frontend_account(),
            index_document: "index.html".to_string(),
            error_document: None,
            cdn: None,
            tags: Vec::new(),
            default_cdn: (naming.cdn_profile(), naming.cdn_endpoint()),
        }
    }

    #[must_use]
    pub fn index_document(mut self, document: &str) -> Self {
        self.index_document = document.to_string();
        self
    }

    #[must_use]
    pub fn error_document(mut self, document: &str) -> Self {
        self.error_document = Some(document.to_string());
        self
    }

    /// Serve the site through a CDN endpoint named after the
    /// deployment.
    #[must_use]
    pub fn cdn(mut self) -> Self {
        self.cdn = Some(self.default_cdn.clone());
        self
    }

    /// Serve the site through a CDN profile and endpoint with explicit
    /// names.
    #[must_use]
    pub fn cdn_named(mut self, profile: &str, endpoint: &str) -> Self {
        self.cdn = Some((profile.to_string(), endpoint.to_string()));
        self
    }

    #[must_use]
    pub fn tag(mut self, key: &str, value: &str) -> Self {
        self.tags.push((key.to_string(), value.to_string()));
        self
    }

    pub fn declare(&self, engine: &dyn Engine) -> DeployResult<Website> {
        info!(account = %self.account, cdn = self.cdn.is_some(), "declaring static site");

        let record = AccountRecord {
            name: self.account.clone(),
            account_tier: "Standard",
            account_replication_type: "LRS",
            static_website: StaticWebsite {
                index_document: self.index_document.clone(),
                error_document: self.error_document.clone(),
            },
            tags: self.tags.iter().cloned().collect(),
        };
        let account = engine.declare(Declaration::new(
            STORAGE_ACCOUNT,
            &self.account,
            Deferred::resolved(serde_json::to_value(&record)?),
        ))?;

        let web_endpoint = engine.output(account.reference(), "primaryWebEndpoint");
        let web_host = engine.output(account.reference(), "primaryWebHost");

        let cdn_url = match &self.cdn {
            Some((profile, endpoint)) => {
                let profile_record = serde_json::json!({
                    "name": profile,
                    "sku": "Standard_Microsoft",
                });
                let profile_resource = engine.declare(Declaration::new(
                    CDN_PROFILE,
                    profile,
                    Deferred::resolved(profile_record),
                ))?;

                let name = endpoint.clone();
                let properties = deferred::join(
                    engine.output(profile_resource.reference(), "name"),
                    web_host.clone(),
                )
                .try_map(move |(profile_name, host)| {
                    Ok(serde_json::to_value(EndpointRecord {
                        name,
                        profile_name,
                        is_http_allowed: false,
                        origins: vec![Origin {
                            name: "origin",
                            host_name: host.clone(),
                        }],
                        origin_host_header: host,
                    })?)
                });
                let endpoint =
                    engine.declare(Declaration::new(CDN_ENDPOINT, endpoint, properties))?;
                Some(
                    engine
                        .output(endpoint.reference(), "hostName")
                        .map(|host| format!("https://{host}")),
                )
            }
            None => None,
        };

        let container = Container::new(
            account.reference(),
            engine.output(account.reference(), "name"),
            WEB_CONTAINER,
        );

        Ok(Website {
            account,
            web_endpoint,
            cdn_url,
            container,
        })
    }
}

/// Handles to a declared static site.
#[derive(Debug, Clone)]
pub struct Website {
    pub account: Resource,
    pub web_endpoint: Deferred<String>,
    pub cdn_url: Option<Deferred<String>>,
    pub container: Container,
}

impl Website {
    /// Front-end origins in discovery order: storage endpoint first,
    /// then the CDN host.
    #[must_use]
    pub fn origins(&self) -> Vec<Deferred<String>> {
        let mut origins = vec![self.web_endpoint.clone()];
        origins.extend(self.cdn_url.clone());
        origins
    }
}

/// Identity values the authenticated front end is templated with.
#[derive(Debug, Clone)]
pub struct Identity {
    pub tenant_id: Deferred<String>,
    pub application_id: Deferred<String>,
    pub application: Option<ResourceRef>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AppRole {
    allowed_member_types: Vec<&'static str>,
    description: &'static str,
    display_name: &'static str,
    is_enabled: bool,
    value: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResourceAccess {
    id: &'static str,
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RequiredResourceAccess {
    resource_app_id: &'static str,
    resource_accesses: Vec<ResourceAccess>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApplicationRecord {
    name: String,
    oauth2_allow_implicit_flow: bool,
    reply_urls: Vec<String>,
    identifier_uris: Vec<String>,
    app_roles: Vec<AppRole>,
    required_resource_accesses: Vec<RequiredResourceAccess>,
}

// Microsoft Graph, delegated User.Read.
const GRAPH_APP_ID: &str = "00000003-0000-0000-c000-000000000000";
const USER_READ_SCOPE: &str = "e1fe6dd8-ba31-4d61-89e7-88639da4683d";

impl Identity {
    /// Identity values provided by the caller, e.g. from a stack
    /// output of the tenant deployment.
    #[must_use]
    pub const fn new(tenant_id: Deferred<String>, application_id: Deferred<String>) -> Self {
        Self {
            tenant_id,
            application_id,
            application: None,
        }
    }

    /// Register the API application whose reply URLs are the
    /// front-end origins.
    pub fn register(
        engine: &dyn Engine,
        naming: &Naming,
        tenant_id: Deferred<String>,
        reply_urls: Vec<Deferred<String>>,
    ) -> DeployResult<Self> {
        let name = naming.identity_app();
        info!(application = %name, "declaring identity application");

        let record_name = name.clone();
        let properties = deferred::join_all(reply_urls).try_map(move |reply_urls| {
            Ok(serde_json::to_value(ApplicationRecord {
                identifier_uris: vec![format!("http://{record_name}")],
                name: record_name,
                oauth2_allow_implicit_flow: true,
                reply_urls,
                app_roles: vec![AppRole {
                    allowed_member_types: vec!["User"],
                    description: "Access to device status",
                    display_name: "Get Device Status",
                    is_enabled: true,
                    value: "GetStatus",
                }],
                required_resource_accesses: vec![RequiredResourceAccess {
                    resource_app_id: GRAPH_APP_ID,
                    resource_accesses: vec![ResourceAccess {
                        id: USER_READ_SCOPE,
                        kind: "Scope",
                    }],
                }],
            })?)
        });

        let app = engine.declare(Declaration::new(APPLICATION, &name, properties))?;
        Ok(Self {
            tenant_id,
            application_id: engine.output(app.reference(), "applicationId"),
            application: Some(app.reference().clone()),
        })
    }
}
