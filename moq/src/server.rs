use clap::Parser;
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::{debug, info};

use http::{
    header::{HeaderName, AUTHORIZATION},
    HeaderValue, Request,
};
use hyper::{server::Server, service::service_fn};
use moq_config::prelude::ConfigContainer;
use std::{iter::once, net::SocketAddr, sync::Arc};
use tower::{make::Shared, ServiceBuilder};
use tower_http::{
    compression::CompressionLayer, propagate_header::PropagateHeaderLayer,
    sensitive_headers::SetSensitiveRequestHeadersLayer, set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::service::MockService;

#[derive(Parser, Debug)]
pub struct ServerCommandConfig {
    #[clap(long = "config", short, env = "CONFIG_PATH")]
    /// Location of root config file
    pub config_file: PathBuf,

    #[clap(
        long = "listen",
        short,
        env = "SERVER_LISTEN",
        default_value("127.0.0.1:3000")
    )]
    pub listen_address: String,
}

impl ServerCommandConfig {
    pub async fn run_server(&self) -> Result<(), anyhow::Error> {
        let config_container = ConfigContainer::new(&self.config_file);
        let user_config = config_container.load_config()?;
        let router = crate::config::build_router(&user_config)?;
        debug!("Found {} routes", router.routes().len());

        let addr: SocketAddr = self.listen_address.parse()?;
        let mock_service = Arc::new(RwLock::new(MockService::new(router)));

        crate::watch_for_changes(&self.config_file, mock_service.clone(), user_config.revision);

        let real_service = service_fn(move |req: Request<hyper::Body>| {
            let mock_service = mock_service.clone();
            async move {
                // Clone out of the lock so a delayed response never holds up a reload.
                let service = mock_service.read().await.clone();
                service.process_request(req).await
            }
        });

        let service = ServiceBuilder::new()
            .layer(SetSensitiveRequestHeadersLayer::new(once(AUTHORIZATION)))
            // High level logging of requests and responses
            .layer(TraceLayer::new_for_http())
            .layer(CompressionLayer::new())
            .layer(SetResponseHeaderLayer::overriding(
                HeaderName::from_static("x-moq"),
                HeaderValue::from_static("true"),
            ))
            .layer(SetResponseHeaderLayer::if_not_present(
                HeaderName::from_static(moq_router::ROUTE_ID_HEADER),
                HeaderValue::from_static("null"),
            ))
            // Propagate `X-Request-Id`s from requests to responses
            .layer(PropagateHeaderLayer::new(HeaderName::from_static(
                "x-request-id",
            )))
            .service(real_service);

        info!("Starting server on {}", addr);

        Server::bind(&addr).serve(Shared::new(service)).await?;

        Ok(())
    }
}

#[cfg(test)]
fn server_config(config_file: PathBuf) -> ServerCommandConfig {
    ServerCommandConfig {
        config_file,
        listen_address: "127.0.0.1:0".to_owned(),
    }
}

#[tokio::test]
async fn test_malformed_routes_fail_startup() {
    let dir = tempfile::tempdir().unwrap();
    let root = crate::write_config(dir.path(), Some("- url: /a\n  responses: ["));

    let err = server_config(root).run_server().await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<moq_config::prelude::ConfigError>(),
        Some(moq_config::prelude::ConfigError::YamlError(_))
    ));
}

#[tokio::test]
async fn test_invalid_route_fails_startup() {
    let dir = tempfile::tempdir().unwrap();
    let root = crate::write_config(
        dir.path(),
        Some("- url: /a\n  method: GET\n  responses:\n    900: a\n"),
    );

    assert!(server_config(root).run_server().await.is_err());
}

#[tokio::test]
async fn test_missing_routes_fail_startup() {
    let dir = tempfile::tempdir().unwrap();
    let root = crate::write_config(dir.path(), None);

    let err = server_config(root).run_server().await.unwrap_err();
    assert_eq!("'routes.yml' not found.", err.to_string());
}
