use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::Naming;
use crate::deferred::Deferred;
use crate::engine::memory::{ApplyReport, MemoryEngine, is_placeholder};
use crate::engine::{Engine, Resource, StackReference};
use crate::error::{DeployError, DeployResult};
use crate::frontend::{Identity, StaticSite, Website};
use crate::gateway::{ComputeTarget, GatewayBuilder, GatewayOutputs};
use crate::publish::{DirStore, Publisher, SubstitutionContext, SyncReport};

/// Token replaced by the public API base URL.
pub const API_URL: &str = "API_URL";
/// Token replaced by the directory tenant id.
pub const TENANT_ID: &str = "TENANT_ID";
/// Tokens replaced by the API application id.
pub const APP_ID: &str = "APP_ID";
pub const CLIENT_ID: &str = "CLIENT_ID";

#[derive(Debug, Clone)]
enum Backend {
    Target(ComputeTarget),
    Stack(StackReference),
}

/// Deployment pipeline wiring the front end, the gateway and the
/// published assets together.
pub struct Pipeline {
    naming: Naming,
    site: StaticSite,
    gateway: GatewayBuilder,
    backend: Option<(String, Backend)>,
    tenant: Option<StackReference>,
    assets: PathBuf,
}

/// Everything a [`Pipeline`] declared.
#[derive(Debug, Clone)]
pub struct Deployment {
    pub website: Website,
    pub identity: Option<Identity>,
    pub gateway: GatewayOutputs,
    pub publisher: Publisher,
    pub blobs: Vec<Resource>,
}

impl Deployment {
    /// Named outputs of the deployment, in a stable order.
    #[must_use]
    pub fn exports(&self) -> Vec<(&'static str, Deferred<String>)> {
        let mut exports = vec![
            ("apiUrl", self.gateway.api_url.clone()),
            ("storageAccountUrl", self.website.web_endpoint.clone()),
        ];
        if let Some(cdn) = &self.website.cdn_url {
            exports.push(("cdnUrl", cdn.clone()));
        }
        if let Some(identity) = &self.identity {
            exports.push(("applicationId", identity.application_id.clone()));
        }
        exports
    }
}

impl Pipeline {
    /// `gateway` describes the API; its CORS origins are filled in
    /// from the declared front end.
    #[must_use]
    pub fn new(naming: Naming, gateway: GatewayBuilder, assets: impl Into<PathBuf>) -> Self {
        Self {
            site: StaticSite::new(&naming),
            naming,
            gateway,
            backend: None,
            tenant: None,
            assets: assets.into(),
        }
    }

    #[must_use]
    pub fn site(mut self, site: StaticSite) -> Self {
        self.site = site;
        self
    }

    /// Bind the gateway to an explicit compute target.
    #[must_use]
    pub fn backend(mut self, name: &str, target: ComputeTarget) -> Self {
        self.backend = Some((name.to_string(), Backend::Target(target)));
        self
    }

    /// Bind the gateway to the function app exported by another
    /// deployment as `functionAppId`, `functionHostname` and
    /// `functionKey`.
    #[must_use]
    pub fn backend_stack(mut self, name: &str, stack: &str) -> Self {
        self.backend = Some((name.to_string(), Backend::Stack(StackReference::new(stack))));
        self
    }

    /// Register the API application and template the front end with
    /// the identity values. The tenant id is read from the `tenantId`
    /// output of `stack`.
    #[must_use]
    pub fn authenticated(mut self, stack: &str) -> Self {
        self.tenant = Some(StackReference::new(stack));
        self
    }

    #[must_use]
    pub fn assets(&self) -> &Path {
        &self.assets
    }

    /// Declare every resource of the deployment through `engine`.
    pub fn declare(&self, engine: &dyn Engine) -> DeployResult<Deployment> {
        self.declare_with(engine, false)
    }

    /// With `provisioned`, substituted values that are still preview
    /// placeholders fail the files that reference them.
    fn declare_with(&self, engine: &dyn Engine, provisioned: bool) -> DeployResult<Deployment> {
        self.naming.validate()?;

        let website = self.site.declare(engine)?;

        let identity = match &self.tenant {
            Some(stack) => Some(Identity::register(
                engine,
                &self.naming,
                stack.require(engine, "tenantId"),
                website.origins(),
            )?),
            None => None,
        };

        let mut gateway = self.gateway.clone().origins(website.origins());
        if let Some((name, backend)) = &self.backend {
            let target = match backend {
                Backend::Target(target) => target.clone(),
                Backend::Stack(stack) => {
                    let host = stack.require(engine, "functionHostname");
                    ComputeTarget::new(
                        stack.require(engine, "functionAppId"),
                        host.map(|h| format!("https://{h}/api")),
                    )
                    .access_key(stack.require(engine, "functionKey"))
                }
            };
            gateway = gateway.backend(name, target);
        }
        let gateway = gateway.build(engine)?;

        let value = |v: &Deferred<String>| {
            if provisioned {
                require_provisioned(v.clone())
            } else {
                v.clone()
            }
        };
        let mut context = SubstitutionContext::new().token(API_URL, value(&gateway.api_url))?;
        if let Some(identity) = &identity {
            context.insert(TENANT_ID, value(&identity.tenant_id))?;
            context.insert(APP_ID, value(&identity.application_id))?;
            context.insert(CLIENT_ID, value(&identity.application_id))?;
        }
        let publisher = Publisher::new(self.assets.clone()).context(context);
        let blobs = publisher.declare(engine, &website.container)?;

        info!(
            records = gateway.records().len(),
            artifacts = blobs.len(),
            authenticated = identity.is_some(),
            "deployment declared"
        );

        Ok(Deployment {
            website,
            identity,
            gateway,
            publisher,
            blobs,
        })
    }

    /// Declare and apply against `engine`, returning the applied
    /// resources.
    pub async fn preview(&self, engine: &MemoryEngine) -> DeployResult<ApplyReport> {
        self.declare(engine)?;
        engine.apply().await
    }

    /// Declare against `engine` and publish the front end into `out`.
    ///
    /// Files referencing a value the engine only knows as a preview
    /// placeholder are reported as failed and left unwritten.
    pub async fn publish(&self, engine: &MemoryEngine, out: &Path) -> DeployResult<SyncReport> {
        let deployment = self.declare_with(engine, true)?;
        let mut store = DirStore::new(out)?;
        deployment.publisher.sync(&mut store).await
    }

    /// The resolved public API base URL.
    pub async fn api_url(&self, engine: &MemoryEngine) -> DeployResult<String> {
        self.declare(engine)?.gateway.api_url.resolve().await
    }

    /// Parse CLI arguments and dispatch the appropriate
    /// command.
    ///
    /// # Errors
    ///
    /// Returns an error if the dispatched command fails.
    pub fn run(&self) -> DeployResult<()> {
        let cli = Cli::parse();
        initialise_logging(cli.verbose);

        let runtime = tokio::runtime::Builder::new_current_thread().build()?;
        // Only `preview` may show values that are not provisioned yet.
        let engine = match cli.command {
            Command::Preview => MemoryEngine::preview(),
            Command::Publish { .. } | Command::Url => MemoryEngine::new(),
        };
        let engine = match &cli.outputs {
            Some(path) => engine.load_outputs(path)?,
            None => engine,
        };

        runtime.block_on(async {
            match &cli.command {
                Command::Preview => self.cmd_preview(&engine).await,
                Command::Publish { out } => self.cmd_publish(&engine, out).await,
                Command::Url => self.cmd_url(&engine).await,
            }
        })
    }

    async fn cmd_preview(&self, engine: &MemoryEngine) -> DeployResult<()> {
        let report = self.preview(engine).await?;
        println!("{}", report.to_yaml()?);

        if report.failed.is_empty() {
            return Ok(());
        }
        for (resource, err) in &report.failed {
            warn!(resource = %resource, error = %err, "declaration did not resolve");
        }
        Err(DeployError::Other(format!(
            "{} of {} resources failed",
            report.failed.len(),
            report.failed.len() + report.applied.len()
        )))
    }

    async fn cmd_publish(&self, engine: &MemoryEngine, out: &Path) -> DeployResult<()> {
        let report = self.publish(engine, out).await?;
        for path in report.created.iter().chain(&report.replaced) {
            println!("{path}");
        }

        if report.is_success() {
            return Ok(());
        }
        Err(DeployError::Other(format!(
            "{} files not published",
            report.failed.len()
        )))
    }

    async fn cmd_url(&self, engine: &MemoryEngine) -> DeployResult<()> {
        println!("{}", self.api_url(engine).await?);
        Ok(())
    }
}

fn require_provisioned(value: Deferred<String>) -> Deferred<String> {
    let producer = value.producers().collect::<Vec<_>>().join(", ");
    value.try_map(move |v| {
        if is_placeholder(&v) {
            return Err(DeployError::upstream(
                producer,
                "value is only known after provisioning",
            ));
        }
        Ok(v)
    })
}

fn initialise_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    // A subscriber may already be installed by the host binary.
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Gateway and front-end deployment")]
struct Cli {
    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    /// YAML file of stack and resource outputs from provisioning
    #[arg(long, global = true, value_name = "FILE")]
    outputs: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render every declaration as YAML, secrets redacted
    Preview,
    /// Publish the templated front end into a directory
    Publish {
        /// Output directory
        #[arg(long)]
        out: PathBuf,
    },
    /// Print the public API base URL
    Url,
}
