//! Drone status deployment example.
//!
//! Declares the authenticated drone status front end behind a CDN,
//! an API gateway in front of the status function app, and publishes
//! the front-end files with the gateway URL and identity values
//! substituted.
//!
//! ```sh
//! # Render every declaration, secrets redacted
//! cargo run --example drone_status -- preview
//!
//! # Publish the front end into a local directory, with the values
//! # of an earlier provisioning run
//! cargo run --example drone_status -- publish --out target/site \
//!     --outputs demos/outputs.yaml
//!
//! # Print the public API URL
//! cargo run --example drone_status -- url
//! ```

use ponte::gateway::{
    Api, Method, Operation, ParamType, PathParam, Product, Subscription, Visibility,
};
use ponte::{GatewayBuilder, Naming, Pipeline, StaticSite};

fn main() -> anyhow::Result<()> {
    let naming = Naming::new("drone");

    let gateway = GatewayBuilder::new(&naming)
        .location("westeurope")
        .publisher("drones@contoso.com", "Contoso Drone Delivery")
        .api(
            Api::new("dronedeliveryapiv1", "api")
                .version("v1")
                .revision("1")
                .display_name("Drone Delivery API")
                .description("Drone Delivery API"),
        )
        .operation(
            Operation::new("dronestatusGET", Method::Get, "/dronestatus/{deviceid}")
                .display_name("Retrieve drone status")
                .description("Retrieves the most recent status for the specified drone")
                .param(
                    PathParam::new("deviceid")
                        .ty(ParamType::String)
                        .description("device id"),
                )
                .rewrite("GetStatusFunction?deviceId={deviceid}"),
        )
        .product(
            Product::new(
                "dronedeliveryprodapi",
                Visibility::Published,
                Subscription::NotRequired,
            )
            .display_name("Drone Delivery Product")
            .description("Drone Delivery Product"),
        );

    let pipeline = Pipeline::new(naming.clone(), gateway, "demos/droneapp-auth")
        .site(
            StaticSite::new(&naming)
                .error_document("404.html")
                .tag("displayName", "Drone Front End Storage Account")
                .cdn(),
        )
        .backend_stack("dronestatusdotnet", "drone/compute/dev")
        .authenticated("drone/tenant/dev");

    pipeline.run()?;
    Ok(())
}
