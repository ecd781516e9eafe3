use bytes::Bytes;
use http::{HeaderName, Response};
use moq_config::prelude::NumericStrings;
use tokio::time::sleep;
use tracing::{debug, instrument};

use crate::encode::{json_response, not_found};
use crate::pattern::Binding;
use crate::route::RouteDefinition;
use crate::status::reason_phrase;

pub const ROUTE_ID_HEADER: &str = "x-moq-route-id";
pub const STATUS_PARAMETER: &str = "_status";

/// Everything the router needs to know about an incoming request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub method: String,
    /// The raw request target, query string included.
    pub target: String,
    pub requested_status: Option<u16>,
}

impl RequestContext {
    /// Builds the context, reading `_status` from the query string.
    pub fn new(method: &str, target: &str) -> Self {
        let requested_status = target
            .split_once('?')
            .and_then(|(_, query)| requested_status(query.as_bytes()));

        Self {
            method: method.to_owned(),
            target: target.to_owned(),
            requested_status,
        }
    }

    /// A `_status` field in a form encoded body wins over the query string.
    pub fn with_form_body(mut self, body: &[u8]) -> Self {
        if let Some(status) = requested_status(body) {
            self.requested_status = Some(status);
        }
        self
    }
}

fn requested_status(form: &[u8]) -> Option<u16> {
    form_urlencoded::parse(form)
        .filter(|(name, _)| name == STATUS_PARAMETER)
        .last()
        .and_then(|(_, value)| value.trim().parse::<u16>().ok())
        .filter(|status| *status >= 100)
}

/// The route table. Routes are tried in declaration order and the first one
/// matching wins.
#[derive(Debug, Clone)]
pub struct Router {
    routes: Vec<RouteDefinition>,
    base_path: String,
    numeric_strings: NumericStrings,
}

impl Router {
    pub fn new(routes: Vec<RouteDefinition>, base_path: &str, numeric_strings: NumericStrings) -> Self {
        Self {
            routes,
            base_path: normalize_base_path(base_path),
            numeric_strings,
        }
    }

    pub fn routes(&self) -> &[RouteDefinition] {
        &self.routes
    }

    /// Derives the path routes are matched against: no query string, no base
    /// path, always starting with `/`. Targets outside the base path resolve
    /// to nothing.
    pub fn resolve_path(&self, target: &str) -> Option<String> {
        let path = match target.split_once('?') {
            Some((path, _)) => path,
            None => target,
        };

        let path = if self.base_path == "/" {
            path
        } else if path == self.base_path.trim_end_matches('/') {
            ""
        } else {
            path.strip_prefix(self.base_path.as_str())?
        };

        if path.starts_with('/') {
            Some(path.to_owned())
        } else {
            Some(format!("/{}", path))
        }
    }

    pub fn find(&self, method: &str, path: &str) -> Option<(&RouteDefinition, Vec<Binding>)> {
        self.routes.iter().find_map(|route| {
            route
                .matches(method, path)
                .map(|bindings| (route, bindings))
        })
    }

    #[instrument(skip_all, fields(http.method = %ctx.method, http.target = %ctx.target))]
    pub async fn respond(&self, ctx: &RequestContext) -> Response<Bytes> {
        let path = match self.resolve_path(&ctx.target) {
            Some(path) => path,
            None => {
                debug!("{} is outside of {}", ctx.target, self.base_path);
                return not_found();
            }
        };
        debug!("Resolved path {}", path);

        let (route, bindings) = match self.find(&ctx.method, &path) {
            Some(found) => found,
            None => {
                debug!("No route matched {} {}", ctx.method, path);
                return not_found();
            }
        };
        debug!("Matched route {} ({})", route.id, route.pattern.as_str());

        if !route.delay.is_zero() {
            debug!("Starting a wait of {:?}", route.delay);
            sleep(route.delay).await;
        }

        let rendered = route.render(ctx.requested_status, &bindings);
        debug!(
            "Responding with {} {}",
            rendered.status.as_u16(),
            reason_phrase(rendered.status)
        );

        let mut response = json_response(rendered.status, &rendered.body, self.numeric_strings);
        response.headers_mut().insert(
            HeaderName::from_static(ROUTE_ID_HEADER),
            route.id_header.clone(),
        );
        response
    }
}

fn normalize_base_path(base_path: &str) -> String {
    let trimmed = base_path.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_owned()
    } else {
        format!("/{}/", trimmed)
    }
}

#[cfg(test)]
fn router(routes: Vec<moq_config::prelude::RouteConfig>, base_path: &str) -> Router {
    let mut builder = crate::RouterBuilder::new();
    for route in &routes {
        builder.load_config(route);
    }
    builder
        .base_path(base_path)
        .numeric_strings(NumericStrings::Coerce)
        .build()
        .unwrap()
}

#[cfg(test)]
fn body_json(response: Response<Bytes>) -> serde_json::Value {
    serde_json::from_slice(response.body()).unwrap()
}

#[cfg(test)]
use crate::route::route_config;
#[cfg(test)]
use http::StatusCode;
#[cfg(test)]
use serde_json::json;

#[test]
fn test_request_context_status() {
    assert_eq!(None, RequestContext::new("GET", "/users").requested_status);
    assert_eq!(
        Some(404),
        RequestContext::new("GET", "/users?_status=404").requested_status
    );
    assert_eq!(
        Some(201),
        RequestContext::new("GET", "/users?_status=404&_status=201").requested_status
    );
    assert_eq!(
        None,
        RequestContext::new("GET", "/users?_status=99").requested_status
    );
    assert_eq!(
        None,
        RequestContext::new("GET", "/users?_status=abc").requested_status
    );

    let ctx = RequestContext::new("POST", "/users?_status=404").with_form_body(b"name=x&_status=409");
    assert_eq!(Some(409), ctx.requested_status);

    let ctx = RequestContext::new("POST", "/users?_status=404").with_form_body(b"name=x");
    assert_eq!(Some(404), ctx.requested_status);
}

#[test]
fn test_resolve_path() {
    let root = router(vec![], "/");
    assert_eq!(Some("/users/42".to_owned()), root.resolve_path("/users/42"));
    assert_eq!(Some("/users/42".to_owned()), root.resolve_path("/users/42?_status=404"));
    assert_eq!(Some("/".to_owned()), root.resolve_path("/"));
    assert_eq!(Some("/".to_owned()), root.resolve_path(""));

    let mounted = router(vec![], "api");
    assert_eq!(Some("/users/42".to_owned()), mounted.resolve_path("/api/users/42?x=1"));
    assert_eq!(Some("/".to_owned()), mounted.resolve_path("/api/"));
    assert_eq!(Some("/".to_owned()), mounted.resolve_path("/api"));
    assert_eq!(None, mounted.resolve_path("/other/1"));
    assert_eq!(None, mounted.resolve_path("/apiary/1"));
}

#[tokio::test]
async fn test_targets_outside_base_path_are_not_found() {
    let routes = router(
        vec![route_config("/users/:id", "GET", json!({"200": {"id": ":id"}}), 0)],
        "/mock",
    );

    let response = routes.respond(&RequestContext::new("GET", "/mock/users/42")).await;
    assert_eq!(StatusCode::OK, response.status());
    assert_eq!(json!({"id": 42}), body_json(response));

    let response = routes.respond(&RequestContext::new("GET", "/users/42")).await;
    assert_eq!(StatusCode::NOT_FOUND, response.status());
    assert!(!response.headers().contains_key(ROUTE_ID_HEADER));
    assert_eq!(json!("Resource not found baby."), body_json(response));
}

#[test]
fn test_first_declared_route_wins() {
    let routes = router(
        vec![
            route_config("/users/:id", "GET", json!({"200": "by id"}), 0),
            route_config("/users/me", "GET", json!({"200": "me"}), 0),
        ],
        "/",
    );

    let (route, bindings) = routes.find("GET", "/users/me").unwrap();
    assert_eq!("GET /users/:id", route.id);
    assert_eq!(":id", bindings[0].token);
    assert_eq!("me", bindings[0].value);
}

#[test]
fn test_literal_routes_need_exact_path() {
    let routes = router(
        vec![route_config("/health", "GET", json!({"200": "up"}), 0)],
        "/",
    );

    assert!(routes.find("GET", "/health").is_some());
    assert!(routes.find("GET", "/healthz").is_none());
    assert!(routes.find("GET", "/health/").is_none());
    assert!(routes.find("POST", "/health").is_none());
}

#[tokio::test]
async fn test_respond_with_bindings() {
    let routes = router(
        vec![route_config(
            "/users/:id",
            "GET",
            json!({"200": {"id": ":id", "name": "demo"}}),
            0,
        )],
        "/",
    );

    let response = routes.respond(&RequestContext::new("GET", "/users/42")).await;
    assert_eq!(StatusCode::OK, response.status());
    assert_eq!(
        "GET /users/:id",
        response.headers()[ROUTE_ID_HEADER].to_str().unwrap()
    );
    assert_eq!(json!({"id": 42, "name": "demo"}), body_json(response));

    let response = routes.respond(&RequestContext::new("GET", "/users/7")).await;
    assert_eq!(json!({"id": 7, "name": "demo"}), body_json(response));

    let response = routes
        .respond(&RequestContext::new("GET", "/users/42/extra"))
        .await;
    assert_eq!(StatusCode::NOT_FOUND, response.status());
    assert_eq!(json!("Resource not found baby."), body_json(response));
}

#[tokio::test]
async fn test_respond_with_requested_status() {
    let routes = router(
        vec![route_config(
            "/items",
            "GET",
            json!({"200": "ok", "404": "missing"}),
            0,
        )],
        "/",
    );

    let response = routes
        .respond(&RequestContext::new("GET", "/items?_status=404"))
        .await;
    assert_eq!(StatusCode::NOT_FOUND, response.status());
    assert_eq!(json!("missing"), body_json(response));

    let response = routes
        .respond(&RequestContext::new("GET", "/items?_status=500"))
        .await;
    assert_eq!(StatusCode::OK, response.status());
    assert_eq!(json!("ok"), body_json(response));
}

#[tokio::test(start_paused = true)]
async fn test_delay_is_capped_at_ten_seconds() {
    let routes = router(
        vec![route_config("/slow", "GET", json!({"200": "done"}), 15)],
        "/",
    );

    let start = tokio::time::Instant::now();
    let response = routes.respond(&RequestContext::new("GET", "/slow")).await;
    assert_eq!(StatusCode::OK, response.status());
    let elapsed = start.elapsed();
    assert!(elapsed >= std::time::Duration::from_secs(10));
    assert!(elapsed < std::time::Duration::from_secs(11));
}

#[tokio::test(start_paused = true)]
async fn test_unmatched_request_is_not_delayed() {
    let routes = router(
        vec![route_config("/slow", "GET", json!({"200": "done"}), 5)],
        "/",
    );

    let start = tokio::time::Instant::now();
    let response = routes.respond(&RequestContext::new("DELETE", "/unknown")).await;
    assert_eq!(StatusCode::NOT_FOUND, response.status());
    assert_eq!(std::time::Duration::ZERO, start.elapsed());
}
