//! Declarative gateway and front-end deployment DSL for Rust.
//!
//! Ponte (Portuguese for *bridge*) describes the cloud topology of a
//! small serverless product as typed Rust: a static front end in
//! blob storage with an optional CDN edge, an API-management gateway
//! in front of a function app, an identity application guarding the
//! API, and the front-end files published with deployment outputs
//! substituted into them. No templates of templates, no shell.
//!
//! # Overview
//!
//! A deployment is a [`Pipeline`] that wires together:
//!
//! - A [`StaticSite`] describing the front-end storage account and
//!   its optional CDN endpoint
//! - A [`GatewayBuilder`] describing the versioned API, its
//!   operations, the backend binding and the product
//! - A [`Publisher`] walking the front-end build output and
//!   replacing `[API_URL]`, `[TENANT_ID]`, `[APP_ID]` and
//!   `[CLIENT_ID]` placeholders
//! - [`Naming`] conventions shared by every resource name
//!
//! # Architecture
//!
//! Nothing is created directly. Every resource is a
//! [`Declaration`](engine::Declaration) handed to an
//! [`Engine`](engine::Engine), and every value the engine only knows
//! after provisioning is a [`Deferred`]. Records reference each
//! other through deferred identifiers, so the creation order is
//! carried by the data itself:
//!
//! 1. **Front end** - storage account, CDN profile and endpoint,
//!    optional identity application
//! 2. **Gateway** - service, version set, API, operations, named
//!    secret, backend, per-operation policies, product
//! 3. **Assets** - one blob per front-end file, owned by the
//!    storage account
//!
//! Secrets stay secret: the backend key is stored as a gateway named
//! value and only its `{{name}}` reference appears in other records.
//!
//! # Examples
//!
//! Create an `xtask/src/main.rs` in your project:
//!
//! ```rust,no_run
//! use ponte::gateway::{Api, Method, Operation, PathParam, Product, Subscription, Visibility};
//! use ponte::{GatewayBuilder, Naming, Pipeline, StaticSite};
//!
//! fn main() -> anyhow::Result<()> {
//!     let naming = Naming::new("drone");
//!
//!     let gateway = GatewayBuilder::new(&naming)
//!         .publisher("drones@contoso.com", "Contoso")
//!         .api(Api::new("dronedeliveryapiv1", "api").version("v1").revision("1"))
//!         .operation(
//!             Operation::new("dronestatusGET", Method::Get, "/dronestatus/{deviceid}")
//!                 .param(PathParam::new("deviceid"))
//!                 .rewrite("GetStatusFunction?deviceId={deviceid}"),
//!         )
//!         .product(Product::new(
//!             "dronedeliveryprodapi",
//!             Visibility::Published,
//!             Subscription::NotRequired,
//!         ));
//!
//!     let pipeline = Pipeline::new(naming.clone(), gateway, "frontend/dist")
//!         .site(StaticSite::new(&naming).error_document("404.html").cdn())
//!         .backend_stack("dronestatusdotnet", "org/drone-compute/dev")
//!         .authenticated("org/drone-tenant/dev");
//!
//!     pipeline.run()?;
//!     Ok(())
//! }
//! ```
//!
//! Then use `cargo xtask` subcommands:
//!
//! ```sh
//! # Render every declaration, secrets redacted; values only known
//! # after provisioning show as `<computed ...>`
//! cargo xtask preview
//!
//! # Publish the templated front end into a directory. Every
//! # substituted value must come from provisioning outputs.
//! cargo xtask publish --out target/site --outputs outputs.yaml
//!
//! # Print the public API URL
//! cargo xtask url
//! ```

// Allow noisy pedantic lints that don't add value for a
// deployment tool crate.
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

pub mod config;
pub mod deferred;
pub mod engine;
pub mod error;
pub mod frontend;
pub mod gateway;
pub mod pipeline;
pub mod publish;

pub use config::Naming;
pub use deferred::Deferred;
pub use error::{DeployError, DeployResult};
pub use frontend::{Identity, StaticSite};
pub use gateway::{GatewayBuilder, SecretBinder, SecretRef};
pub use pipeline::{Deployment, Pipeline};
pub use publish::{Artifact, Publisher, SubstitutionContext};
