use clap::Parser;
use moq_config::prelude::{ConfigContainer, ConfigError};
use std::{path::Path, process::ExitCode, time::Duration};
use tokio::sync::RwLock;
use tracing::{debug, error, warn};

mod config;
mod server;
mod service;

use config::Opts;
use service::MockService;
use std::sync::Arc;

#[tokio::main]
async fn main() -> ExitCode {
    human_panic::setup_panic!();
    dotenv::dotenv().ok();

    let opt = Opts::parse();
    if let Err(e) = config::configure_logging(&opt.logging_opts) {
        eprintln!("Unable to configure logging: {}", e);
        return ExitCode::from(1);
    }

    let result = match opt.command {
        config::SubCommands::Server(server_opts) => server_opts.run_server().await,
    };

    let exit_code = match result {
        Err(e) => {
            error!("Exiting because of {}", e);
            1
        }
        Ok(_) => 0,
    };

    ExitCode::from(exit_code)
}

fn watch_for_changes(
    root_config: &Path,
    shared_service: Arc<RwLock<MockService>>,
    revision: String,
) {
    let root_config = root_config.to_path_buf();
    let config_container = ConfigContainer::new(&root_config);
    tokio::spawn(async move {
        let mut revision = Some(revision);
        loop {
            tokio::time::sleep(Duration::from_secs(5)).await;

            debug!("Reloading configuration");

            let service = match reload(&config_container, &mut revision) {
                Some(service) => service,
                None => continue,
            };

            {
                *shared_service.write().await = service;
            }
        }
    });
}

/// Loads a fresh route table. `None` keeps the one being served, either
/// because loading failed or because no file changed since `revision`.
fn reload(config_container: &ConfigContainer, revision: &mut Option<String>) -> Option<MockService> {
    let loaded_config = match config_container.load_config() {
        Ok(loaded_config) => loaded_config,
        Err(ConfigError::RoutesNotFound(routes_file)) => {
            warn!("Route document '{}' is missing", routes_file);
            *revision = None;
            return Some(MockService::Unavailable { routes_file });
        }
        Err(e) => {
            warn!("Unable to load config: {:?}", e);
            return None;
        }
    };

    if revision.as_deref() == Some(loaded_config.revision.as_str()) {
        debug!("Configuration unchanged");
        return None;
    }

    match config::build_router(&loaded_config) {
        Ok(router) => {
            debug!("Found {} routes", router.routes().len());
            *revision = Some(loaded_config.revision);
            Some(MockService::new(router))
        }
        Err(e) => {
            warn!("Unable to convert config: {:?}", e);
            None
        }
    }
}

#[cfg(test)]
fn write_config(dir: &Path, routes: Option<&str>) -> std::path::PathBuf {
    let root = dir.join("moq.toml");
    std::fs::write(&root, "[routes]\npaths = [\"routes.yml\"]\n").unwrap();
    if let Some(routes) = routes {
        std::fs::write(dir.join("routes.yml"), routes).unwrap();
    }
    root
}

#[test]
fn test_reload_serves_new_routes() {
    let dir = tempfile::tempdir().unwrap();
    let root = write_config(
        dir.path(),
        Some("- url: /a\n  method: GET\n  responses:\n    200: a\n"),
    );

    match reload(&ConfigContainer::new(&root), &mut None) {
        Some(MockService::Ready(router)) => assert_eq!(1, router.routes().len()),
        other => panic!("unexpected reload result {:?}", other),
    }
}

#[test]
fn test_reload_missing_routes_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let root = write_config(dir.path(), None);

    match reload(&ConfigContainer::new(&root), &mut None) {
        Some(MockService::Unavailable { routes_file }) => assert_eq!("routes.yml", routes_file),
        other => panic!("unexpected reload result {:?}", other),
    }
}

#[test]
fn test_reload_keeps_table_on_bad_document() {
    let dir = tempfile::tempdir().unwrap();
    let root = write_config(dir.path(), Some("- url: /a\n  responses: ["));
    assert!(reload(&ConfigContainer::new(&root), &mut None).is_none());

    let root = write_config(
        dir.path(),
        Some("- url: /a\n  method: GET\n  responses:\n    900: a\n"),
    );
    assert!(reload(&ConfigContainer::new(&root), &mut None).is_none());
}

#[test]
fn test_reload_skips_unchanged_files() {
    let dir = tempfile::tempdir().unwrap();
    let root = write_config(
        dir.path(),
        Some("- url: /a\n  method: GET\n  responses:\n    200: a\n"),
    );
    let container = ConfigContainer::new(&root);

    let mut revision = None;
    let first_id = match reload(&container, &mut revision) {
        Some(MockService::Ready(router)) => router.routes()[0].id.clone(),
        other => panic!("unexpected reload result {:?}", other),
    };
    assert!(revision.is_some());
    assert!(reload(&container, &mut revision).is_none());

    write_config(
        dir.path(),
        Some("- url: /a\n  method: GET\n  responses:\n    200: b\n"),
    );
    match reload(&container, &mut revision) {
        Some(MockService::Ready(router)) => assert_ne!(first_id, router.routes()[0].id),
        other => panic!("unexpected reload result {:?}", other),
    }

    std::fs::remove_file(dir.path().join("routes.yml")).unwrap();
    assert!(matches!(
        reload(&container, &mut revision),
        Some(MockService::Unavailable { .. })
    ));
    assert!(revision.is_none());

    write_config(
        dir.path(),
        Some("- url: /a\n  method: GET\n  responses:\n    200: b\n"),
    );
    assert!(matches!(
        reload(&container, &mut revision),
        Some(MockService::Ready(_))
    ));
}
