use http::{HeaderValue, StatusCode};
use moq_config::prelude::RouteConfig;
use serde_json::Value;
use std::time::Duration;

use crate::pattern::{Binding, PathPattern};
use crate::status::ResponseTable;
use crate::template::apply_bindings;
use crate::RouteError;

/// Upper bound for the configured delay of a route, in seconds.
pub const MAX_DELAY_SECS: u64 = 10;

/// One mocked endpoint, built once from its config and never changed.
#[derive(Debug, Clone)]
pub struct RouteDefinition {
    pub id: String,
    pub(crate) id_header: HeaderValue,
    pub pattern: PathPattern,
    pub method: String,
    pub responses: ResponseTable,
    pub delay: Duration,
}

/// A body ready to be serialized, rendered for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl RouteDefinition {
    pub fn try_from(config: &RouteConfig) -> Result<Self, RouteError> {
        Ok(Self {
            id: config.id.clone(),
            id_header: HeaderValue::from_str(&config.id)?,
            pattern: PathPattern::new(&config.url)?,
            method: config.method.clone(),
            responses: ResponseTable::try_from(&config.responses)?,
            delay: Duration::from_secs(config.delay.min(MAX_DELAY_SECS)),
        })
    }

    /// Returns the path bindings when both the method and the path match.
    pub fn matches(&self, method: &str, path: &str) -> Option<Vec<Binding>> {
        if self.method != method {
            return None;
        }

        self.pattern.captures(path)
    }

    /// Renders the body for the resolved status, substituting the bindings
    /// into a copy of the stored template.
    pub fn render(&self, requested_status: Option<u16>, bindings: &[Binding]) -> RenderedResponse {
        let selected = self.responses.select(requested_status);
        RenderedResponse {
            status: selected.status,
            body: apply_bindings(&selected.template, bindings),
        }
    }
}

#[cfg(test)]
pub(crate) fn route_config(url: &str, method: &str, responses: Value, delay: u64) -> RouteConfig {
    use moq_config::prelude::StatusKey;

    let responses = responses
        .as_object()
        .unwrap()
        .iter()
        .map(|(status, body)| (StatusKey::Text(status.clone()), body.clone()))
        .collect();
    RouteConfig {
        id: format!("{} {}", method, url),
        url: url.to_owned(),
        method: method.to_owned(),
        responses,
        delay,
    }
}

#[test]
fn test_method_must_match_exactly() {
    let route = RouteDefinition::try_from(&route_config(
        "/users",
        "GET",
        serde_json::json!({"200": "ok"}),
        0,
    ))
    .unwrap();

    assert!(route.matches("GET", "/users").is_some());
    assert!(route.matches("get", "/users").is_none());
    assert!(route.matches("POST", "/users").is_none());
}

#[test]
fn test_delay_is_clamped() {
    let config = route_config("/slow", "GET", serde_json::json!({"200": "ok"}), 15);
    let route = RouteDefinition::try_from(&config).unwrap();
    assert_eq!(Duration::from_secs(10), route.delay);

    let config = route_config("/slow", "GET", serde_json::json!({"200": "ok"}), 3);
    let route = RouteDefinition::try_from(&config).unwrap();
    assert_eq!(Duration::from_secs(3), route.delay);
}

#[test]
fn test_render_selected_status_only() {
    let config = route_config(
        "/users/:id",
        "GET",
        serde_json::json!({
            "200": {"id": ":id", "name": "demo"},
            "404": "no user :id",
        }),
        0,
    );
    let route = RouteDefinition::try_from(&config).unwrap();
    let bindings = route.matches("GET", "/users/42").unwrap();

    let rendered = route.render(None, &bindings);
    assert_eq!(StatusCode::OK, rendered.status);
    assert_eq!(serde_json::json!({"id": "42", "name": "demo"}), rendered.body);

    let rendered = route.render(Some(404), &bindings);
    assert_eq!(StatusCode::NOT_FOUND, rendered.status);
    assert_eq!(Value::from("no user 42"), rendered.body);

    let rendered = route.render(Some(418), &bindings);
    assert_eq!(StatusCode::OK, rendered.status);
}

#[test]
fn test_render_leaves_template_untouched() {
    let config = route_config(
        "/users/:id",
        "GET",
        serde_json::json!({"200": {"id": ":id"}}),
        0,
    );
    let route = RouteDefinition::try_from(&config).unwrap();

    let first = route.matches("GET", "/users/1").unwrap();
    assert_eq!(serde_json::json!({"id": "1"}), route.render(None, &first).body);

    let second = route.matches("GET", "/users/2").unwrap();
    assert_eq!(serde_json::json!({"id": "2"}), route.render(None, &second).body);

    assert_eq!(
        serde_json::json!({"id": ":id"}),
        route.responses.default_response().template
    );
}

#[test]
fn test_invalid_route() {
    let config = route_config("/empty", "GET", serde_json::json!({}), 0);
    assert!(matches!(
        RouteDefinition::try_from(&config),
        Err(RouteError::NoResponsesProvided)
    ));

    let mut config = route_config("/bad", "GET", serde_json::json!({"200": "ok"}), 0);
    config.id = "bad\nid".to_owned();
    assert!(matches!(
        RouteDefinition::try_from(&config),
        Err(RouteError::InvalidHeaderValue(_))
    ));
}
