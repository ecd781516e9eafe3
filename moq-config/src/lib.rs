use config::Config;
use glob::glob;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

mod routes;
mod user;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("'{0}' not found.")]
    RoutesNotFound(String),
    #[error("Unable to resolve the directory of {0:?}")]
    InvalidRootPath(PathBuf),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    YamlError(#[from] serde_yaml::Error),
    #[error(transparent)]
    RootConfigError(#[from] config::ConfigError),
    #[error(transparent)]
    GlobError(#[from] glob::PatternError),
}

pub struct ConfigContainer {
    root_config_file: PathBuf,
}

pub struct ParsedUserConfig {
    pub root: user::ServerRootConfig,
    pub routes: Vec<routes::RouteConfig>,
    /// Digest of the root file and every route document that was read. It
    /// only changes when one of those files does.
    pub revision: String,
}

impl ConfigContainer {
    pub fn new(root_config_file: &Path) -> Self {
        Self {
            root_config_file: root_config_file.to_path_buf(),
        }
    }

    fn base_config_dir(&self) -> Result<PathBuf, ConfigError> {
        let parent = match self.root_config_file.parent() {
            Some(parent) if parent.as_os_str().is_empty() => Path::new("."),
            Some(parent) => parent,
            None => return Err(ConfigError::InvalidRootPath(self.root_config_file.clone())),
        };
        Ok(parent.canonicalize()?)
    }

    pub fn load_config(&self) -> Result<ParsedUserConfig, ConfigError> {
        debug!("Loading root config {:?}", self.root_config_file);
        let root_config = Config::builder()
            .add_source(config::File::from(self.root_config_file.as_path()))
            .build()?;

        let parsed_root: user::ServerRootConfig = root_config.try_deserialize()?;
        let base_config_dir = self.base_config_dir()?;

        let mut revision = md5::Context::new();
        revision.consume(std::fs::read(&self.root_config_file)?);

        let mut parsed_routes = Vec::new();
        for config_path in &parsed_root.routes.paths {
            let glob_path = base_config_dir.join(config_path);

            debug!("Glob path: {}", glob_path.display());
            let found_files: Vec<PathBuf> = glob(&glob_path.display().to_string())?
                .filter_map(|x| x.ok())
                .collect();

            if found_files.is_empty() {
                return Err(ConfigError::RoutesNotFound(config_path.clone()));
            }

            for route_file in found_files {
                debug!("Loading route document {:?}", route_file);
                let contents = std::fs::read_to_string(&route_file)?;
                revision.consume(route_file.display().to_string());
                revision.consume(&contents);
                let mut routes = routes::parse_routes(config_path, &contents)?;
                parsed_routes.append(&mut routes);
            }
        }

        Ok(ParsedUserConfig {
            root: parsed_root,
            routes: parsed_routes,
            revision: format!("{:x}", revision.compute()),
        })
    }
}

pub mod prelude {
    pub use crate::routes::{parse_routes, unique_id, RouteConfig, StatusKey};
    pub use crate::user::{NumericStrings, ResponsesConfig, RoutesConfig, ServerConfig, ServerRootConfig};
    pub use crate::{ConfigContainer, ConfigError, ParsedUserConfig};
}

#[cfg(test)]
fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_load_root_and_routes() {
    let dir = tempfile::tempdir().unwrap();
    let root = write_file(
        dir.path(),
        "moq.toml",
        r#"
[server]
base-path = "/api/"

[routes]
paths = ["users.yml", "posts.yml"]

[responses]
numeric-strings = "preserve"
"#,
    );
    write_file(
        dir.path(),
        "users.yml",
        "- url: /users/:id\n  method: GET\n  responses:\n    200: user\n",
    );
    write_file(
        dir.path(),
        "posts.yml",
        "- url: /posts\n  method: GET\n  responses:\n    200: posts\n- url: /posts\n  method: POST\n  responses:\n    201: created\n",
    );

    let parsed = ConfigContainer::new(&root).load_config().unwrap();
    assert_eq!("/api/", parsed.root.server.base_path);
    assert_eq!(
        user::NumericStrings::Preserve,
        parsed.root.responses.numeric_strings
    );

    let urls: Vec<(&str, &str)> = parsed
        .routes
        .iter()
        .map(|r| (r.method.as_str(), r.url.as_str()))
        .collect();
    assert_eq!(
        vec![("GET", "/users/:id"), ("GET", "/posts"), ("POST", "/posts")],
        urls
    );
}

#[test]
fn test_defaults_when_sections_missing() {
    let dir = tempfile::tempdir().unwrap();
    let root = write_file(dir.path(), "moq.yaml", "server:\n  base-path: /\n");
    write_file(
        dir.path(),
        "routes.yml",
        "- url: /\n  method: GET\n  responses:\n    200: home\n",
    );

    let parsed = ConfigContainer::new(&root).load_config().unwrap();
    assert_eq!(vec!["routes.yml".to_owned()], parsed.root.routes.paths);
    assert_eq!(
        user::NumericStrings::Coerce,
        parsed.root.responses.numeric_strings
    );
    assert_eq!(1, parsed.routes.len());
}

#[test]
fn test_missing_route_document() {
    let dir = tempfile::tempdir().unwrap();
    let root = write_file(dir.path(), "moq.toml", "[routes]\npaths = [\"routes.yml\"]\n");

    let err = ConfigContainer::new(&root).load_config().err().unwrap();
    assert!(matches!(err, ConfigError::RoutesNotFound(ref name) if name == "routes.yml"));
    assert_eq!("'routes.yml' not found.", err.to_string());
}

#[test]
fn test_empty_route_document() {
    let dir = tempfile::tempdir().unwrap();
    let root = write_file(dir.path(), "moq.toml", "[routes]\npaths = [\"routes.yml\"]\n");
    write_file(dir.path(), "routes.yml", "");

    let err = ConfigContainer::new(&root).load_config().err().unwrap();
    assert!(matches!(err, ConfigError::RoutesNotFound(_)));
}

#[test]
fn test_glob_route_documents() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("routes")).unwrap();
    let root = write_file(dir.path(), "moq.toml", "[routes]\npaths = [\"routes/*.yml\"]\n");
    write_file(
        &dir.path().join("routes"),
        "a.yml",
        "- url: /a\n  method: GET\n  responses:\n    200: a\n",
    );
    write_file(
        &dir.path().join("routes"),
        "b.yml",
        "- url: /b\n  method: GET\n  responses:\n    200: b\n",
    );

    let parsed = ConfigContainer::new(&root).load_config().unwrap();
    let urls: Vec<&str> = parsed.routes.iter().map(|r| r.url.as_str()).collect();
    assert_eq!(vec!["/a", "/b"], urls);
}

#[test]
fn test_revision_follows_file_contents() {
    let dir = tempfile::tempdir().unwrap();
    let root = write_file(dir.path(), "moq.toml", "[routes]\npaths = [\"routes.yml\"]\n");
    write_file(
        dir.path(),
        "routes.yml",
        "- url: /a\n  method: GET\n  responses:\n    200: a\n",
    );

    let container = ConfigContainer::new(&root);
    let first = container.load_config().unwrap();
    let second = container.load_config().unwrap();
    assert_eq!(first.revision, second.revision);
    assert_ne!(first.routes[0].id, second.routes[0].id);

    write_file(
        dir.path(),
        "routes.yml",
        "- url: /b\n  method: GET\n  responses:\n    200: b\n",
    );
    let third = container.load_config().unwrap();
    assert_ne!(first.revision, third.revision);
}
