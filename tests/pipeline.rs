use std::fs;

use ponte::engine::memory::MemoryEngine;
use ponte::engine::ResourceRef;
use ponte::error::DeployError;
use ponte::frontend::{APPLICATION, STORAGE_ACCOUNT};
use ponte::gateway::{Api, Method, Operation, PathParam, Product, Subscription, Visibility};
use ponte::publish::BLOB;
use ponte::{GatewayBuilder, Naming, Pipeline, StaticSite};

const FUNCTION_KEY: &str = "ZnVuY3Rpb24ta2V5LXZhbHVl";

const PROVISIONED: &str = r"
stacks:
  drone/compute/dev:
    functionAppId: /subscriptions/s/sites/drone-app
    functionHostname: drone-app.azurewebsites.net
    functionKey: ZnVuY3Rpb24ta2V5LXZhbHVl
resources:
  - kind: storage:Account
    name: dronefe
    attr: primaryWebEndpoint
    value: https://dronefe.z6.web.core.windows.net/
  - kind: storage:Account
    name: dronefe
    attr: primaryWebHost
    value: dronefe.z6.web.core.windows.net
  - kind: cdn:Endpoint
    name: drone-endpoint
    attr: hostName
    value: drone-endpoint.azureedge.net
  - kind: azuread:Application
    name: drone-api
    attr: applicationId
    value: app-42
";

const TENANT: &str = r"
stacks:
  drone/tenant/dev:
    tenantId: tenant-123
";

fn engine() -> MemoryEngine {
    MemoryEngine::new()
        .with_outputs(PROVISIONED)
        .and_then(|engine| engine.with_outputs(TENANT))
        .unwrap()
}

fn pipeline(assets: &std::path::Path) -> Pipeline {
    let naming = Naming::new("drone");
    let gateway = GatewayBuilder::new(&naming)
        .publisher("drones@contoso.com", "Contoso")
        .api(Api::new("dronedeliveryapiv1", "api").version("v1").revision("1"))
        .operation(
            Operation::new("dronestatusGET", Method::Get, "/dronestatus/{deviceid}")
                .param(PathParam::new("deviceid"))
                .rewrite("GetStatusFunction?deviceId={deviceid}"),
        )
        .product(Product::new(
            "dronedeliveryprodapi",
            Visibility::Published,
            Subscription::NotRequired,
        ));

    Pipeline::new(naming.clone(), gateway, assets)
        .site(StaticSite::new(&naming).error_document("404.html").cdn())
        .backend_stack("dronestatusdotnet", "drone/compute/dev")
        .authenticated("drone/tenant/dev")
}

fn assets() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("js")).unwrap();
    fs::write(dir.path().join("index.html"), "<title>Drone Status</title>").unwrap();
    fs::write(
        dir.path().join("js/config.js"),
        "api=[API_URL];tenant=[TENANT_ID];app=[APP_ID];client=[CLIENT_ID]",
    )
    .unwrap();
    dir
}

#[test]
fn declares_front_end_before_gateway_and_assets() {
    let assets = assets();
    let engine = engine();

    let deployment = pipeline(assets.path()).declare(&engine).unwrap();

    let kinds: Vec<String> = engine
        .declared()
        .unwrap()
        .into_iter()
        .map(|r| r.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            "storage:Account",
            "cdn:Profile",
            "cdn:Endpoint",
            "azuread:Application",
            "apimanagement:Service",
            "apimanagement:ApiVersionSet",
            "apimanagement:Api",
            "apimanagement:ApiOperation",
            "apimanagement:NamedValue",
            "apimanagement:Backend",
            "apimanagement:ApiOperationPolicy",
            "apimanagement:Product",
            "apimanagement:ProductApi",
            "storage:Blob",
            "storage:Blob",
        ]
    );
    assert_eq!(deployment.blobs.len(), 2);
    for blob in &deployment.blobs {
        assert_eq!(
            engine.parent_of(blob.reference()).unwrap(),
            Some(ResourceRef::new(STORAGE_ACCOUNT, "dronefe"))
        );
    }
}

#[tokio::test]
async fn exports_resolve() {
    let assets = assets();
    let engine = engine();
    let deployment = pipeline(assets.path()).declare(&engine).unwrap();

    let mut exports = Vec::new();
    for (name, value) in deployment.exports() {
        exports.push((name, value.resolve().await.unwrap()));
    }

    assert_eq!(
        exports,
        vec![
            ("apiUrl", "https://drone-apim.azure-api.net/api/v1/dronestatus/".to_string()),
            ("storageAccountUrl", "https://dronefe.z6.web.core.windows.net/".to_string()),
            ("cdnUrl", "https://drone-endpoint.azureedge.net".to_string()),
            ("applicationId", "app-42".to_string()),
        ]
    );
}

#[tokio::test]
async fn preview_redacts_function_key() {
    let assets = assets();
    let engine = engine();

    let report = pipeline(assets.path()).preview(&engine).await.unwrap();

    assert!(report.failed.is_empty());
    let yaml = report.to_yaml().unwrap();
    assert!(!yaml.contains(FUNCTION_KEY));
    assert!(yaml.contains("{{dronestatusdotnet-key}}"));

    let app = report.get(APPLICATION, "drone-api").unwrap();
    assert_eq!(app.properties["replyUrls"][0], "https://dronefe.z6.web.core.windows.net/");
    assert_eq!(app.properties["replyUrls"][1], "https://drone-endpoint.azureedge.net");
    let blob = report.get(BLOB, "js/config.js").unwrap();
    assert_eq!(blob.properties["storageContainerName"], "$web");
}

#[tokio::test]
async fn publish_substitutes_deployment_outputs() {
    let assets = assets();
    let out = tempfile::tempdir().unwrap();

    let report = pipeline(assets.path())
        .publish(&engine(), out.path())
        .await
        .unwrap();

    assert!(report.is_success());
    let config = fs::read_to_string(out.path().join("js/config.js")).unwrap();
    assert_eq!(
        config,
        "api=https://drone-apim.azure-api.net/api/v1/dronestatus/;\
         tenant=tenant-123;app=app-42;client=app-42"
    );
}

#[tokio::test]
async fn publish_from_outputs_file() {
    let assets = assets();
    let out = tempfile::tempdir().unwrap();
    let outputs = assets.path().join("outputs.yaml");
    fs::write(&outputs, PROVISIONED).unwrap();
    let engine = MemoryEngine::new()
        .load_outputs(&outputs)
        .and_then(|engine| engine.with_outputs(TENANT))
        .unwrap();

    let report = pipeline(assets.path())
        .publish(&engine, out.path())
        .await
        .unwrap();

    assert!(report.failed.is_empty());
    let config = fs::read_to_string(out.path().join("js/config.js")).unwrap();
    assert!(config.contains("tenant=tenant-123;app=app-42"));
}

#[tokio::test]
async fn publish_with_preview_engine_fails_identity_files() {
    let assets = assets();
    let out = tempfile::tempdir().unwrap();

    let report = pipeline(assets.path())
        .publish(&MemoryEngine::preview(), out.path())
        .await
        .unwrap();

    assert!(!report.is_success());
    assert_eq!(report.created, vec!["index.html"]);
    assert_eq!(report.failed.len(), 1);
    assert!(matches!(
        &report.failed[0],
        (path, DeployError::UpstreamResolution { .. }) if path == "js/config.js"
    ));
    assert!(!out.path().join("js/config.js").exists());
}

#[tokio::test]
async fn api_url_in_preview_mode() {
    let assets = assets();

    let url = pipeline(assets.path())
        .api_url(&MemoryEngine::preview())
        .await
        .unwrap();

    assert_eq!(url, "https://drone-apim.azure-api.net/api/v1/dronestatus/");
}

#[tokio::test]
async fn missing_tenant_fails_identity_files_only() {
    let assets = assets();
    let out = tempfile::tempdir().unwrap();
    let engine = MemoryEngine::new().with_outputs(PROVISIONED).unwrap();

    let report = pipeline(assets.path())
        .publish(&engine, out.path())
        .await
        .unwrap();

    assert_eq!(report.created, vec!["index.html"]);
    assert!(matches!(
        &report.failed[0],
        (path, DeployError::UpstreamResolution { producer, .. })
            if path == "js/config.js" && producer == "stack::drone/tenant/dev"
    ));
    assert!(!out.path().join("js/config.js").exists());
}

#[test]
fn missing_assets_directory() {
    let engine = engine();

    let err = pipeline(std::path::Path::new("/no/such/site"))
        .declare(&engine)
        .unwrap_err();

    assert!(matches!(err, DeployError::FileNotFound(_)));
}

#[test]
fn naming_loaded_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("naming.yaml");
    fs::write(&path, "app_name: drone\ngateway_domain: example.net\n").unwrap();

    let naming = Naming::load(&path).unwrap();

    assert_eq!(naming.gateway_host(), "drone-apim.example.net");
    assert!(matches!(
        Naming::load(&dir.path().join("missing.yaml")),
        Err(DeployError::FileNotFound(_))
    ));
}
