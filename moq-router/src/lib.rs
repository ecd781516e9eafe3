use moq_config::prelude::{NumericStrings, RouteConfig};
use thiserror::Error;
use tracing::debug;

mod encode;
mod pattern;
mod route;
mod router;
mod status;
mod template;

pub use encode::{coerce_numeric_strings, json_response, not_found, server_error, NOT_FOUND_BODY};
pub use pattern::{Binding, PathPattern};
pub use route::{RenderedResponse, RouteDefinition, MAX_DELAY_SECS};
pub use router::{RequestContext, Router, ROUTE_ID_HEADER, STATUS_PARAMETER};
pub use status::{reason_phrase, ResponseTable, StatusResponse};
pub use template::{apply_bindings, replace_tree};

#[derive(Error, Debug)]
pub enum RouteError {
    #[error("Route {url} could not be loaded. Error: {source}")]
    InvalidRoute {
        url: String,
        #[source]
        source: Box<RouteError>,
    },
    #[error("No response configured for route")]
    NoResponsesProvided,
    #[error("Invalid response status {0}, expected a code between 100 and 599")]
    InvalidStatus(String),
    #[error(transparent)]
    RegexError(#[from] regex::Error),
    #[error(transparent)]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),
}

#[derive(Debug)]
pub struct RouterBuilder {
    configs: Vec<RouteConfig>,
    base_path: String,
    numeric_strings: NumericStrings,
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self {
            configs: Vec::new(),
            base_path: "/".to_owned(),
            numeric_strings: NumericStrings::default(),
        }
    }
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_config(&mut self, config: &RouteConfig) {
        self.configs.push(config.clone());
    }

    pub fn base_path(mut self, base_path: &str) -> Self {
        self.base_path = base_path.to_owned();
        self
    }

    pub fn numeric_strings(mut self, numeric_strings: NumericStrings) -> Self {
        self.numeric_strings = numeric_strings;
        self
    }

    pub fn build(self) -> Result<Router, RouteError> {
        debug!("{} routes loaded", self.configs.len());
        let mut routes = Vec::with_capacity(self.configs.len());
        for config in &self.configs {
            let route = RouteDefinition::try_from(config).map_err(|e| RouteError::InvalidRoute {
                url: config.url.clone(),
                source: Box::new(e),
            })?;
            routes.push(route);
        }

        Ok(Router::new(routes, &self.base_path, self.numeric_strings))
    }
}

#[test]
fn test_builder_reports_invalid_route() {
    let mut builder = RouterBuilder::new();
    builder.load_config(&route::route_config(
        "/ok",
        "GET",
        serde_json::json!({"200": "ok"}),
        0,
    ));
    builder.load_config(&route::route_config(
        "/broken",
        "GET",
        serde_json::json!({"999": "nope"}),
        0,
    ));

    let err = builder.build().unwrap_err();
    assert!(matches!(err, RouteError::InvalidRoute { ref url, .. } if url == "/broken"));
}

#[test]
fn test_builder_keeps_declaration_order() {
    let mut builder = RouterBuilder::new();
    for url in ["/c", "/a", "/b"] {
        builder.load_config(&route::route_config(
            url,
            "GET",
            serde_json::json!({"200": "ok"}),
            0,
        ));
    }

    let router = builder.build().unwrap();
    let urls: Vec<&str> = router.routes().iter().map(|r| r.pattern.as_str()).collect();
    assert_eq!(vec!["/c", "/a", "/b"], urls);
}
