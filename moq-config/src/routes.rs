use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::serde_as;
use std::fmt;
use tracing::debug;

use crate::ConfigError;

/// A single mocked endpoint as written in a route document.
#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RouteConfig {
    /// Unique ID that is included with every response when the route matches.
    /// When not provided, a random one will be generated.
    #[serde(default = "unique_id")]
    pub id: String,

    /// The url pattern, `/` delimited. Segments starting with `:` are
    /// parameters, e.g. `/users/:id`.
    pub url: String,

    /// The HTTP method the request must use. Compared case-sensitively.
    pub method: String,

    /// Status code to body. The first entry is served when the request does
    /// not ask for a specific status.
    #[serde_as(as = "serde_with::Map<_, _>")]
    pub responses: Vec<(StatusKey, Value)>,

    /// Seconds to wait before responding.
    #[serde(default)]
    pub delay: u64,
}

/// Status keys may be written as numbers (`200:`) or strings (`"200":`).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum StatusKey {
    Code(u16),
    Text(String),
}

impl StatusKey {
    pub fn as_code(&self) -> Option<u16> {
        match self {
            StatusKey::Code(code) => Some(*code),
            StatusKey::Text(text) => text.trim().parse().ok(),
        }
    }
}

impl fmt::Display for StatusKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusKey::Code(code) => write!(f, "{}", code),
            StatusKey::Text(text) => write!(f, "{}", text),
        }
    }
}

/// Parses the contents of one route document. `name` is what gets reported
/// when the document holds no routes at all.
pub fn parse_routes(name: &str, contents: &str) -> Result<Vec<RouteConfig>, ConfigError> {
    if contents.trim().is_empty() {
        return Err(ConfigError::RoutesNotFound(name.to_owned()));
    }

    let routes: Option<Vec<RouteConfig>> = serde_yaml::from_str(contents)?;
    let routes = routes.ok_or_else(|| ConfigError::RoutesNotFound(name.to_owned()))?;

    debug!("{} routes parsed from {}", routes.len(), name);
    Ok(routes)
}

pub fn unique_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[test]
fn test_parse_keeps_response_order() {
    let routes = parse_routes(
        "routes.yml",
        r#"
- url: /users/:id
  method: GET
  responses:
    404: missing
    "200":
      id: ":id"
    500: broken
"#,
    )
    .unwrap();

    assert_eq!(1, routes.len());
    let keys: Vec<Option<u16>> = routes[0].responses.iter().map(|(k, _)| k.as_code()).collect();
    assert_eq!(vec![Some(404), Some(200), Some(500)], keys);
    assert_eq!(0, routes[0].delay);
    assert!(!routes[0].id.is_empty());
}

#[test]
fn test_parse_keeps_body_key_order() {
    let routes = parse_routes(
        "routes.yml",
        r#"
- id: ordered
  url: /
  method: GET
  delay: 3
  responses:
    200:
      zebra: 1
      apple: 2
      mango: 3
"#,
    )
    .unwrap();

    let route = &routes[0];
    assert_eq!("ordered", route.id);
    assert_eq!(3, route.delay);
    let body = route.responses[0].1.as_object().unwrap();
    let keys: Vec<&String> = body.keys().collect();
    assert_eq!(vec!["zebra", "apple", "mango"], keys);
}

#[test]
fn test_parse_empty_document() {
    let err = parse_routes("routes.yml", "   \n").unwrap_err();
    assert_eq!("'routes.yml' not found.", err.to_string());

    let err = parse_routes("routes.yml", "~\n").unwrap_err();
    assert!(matches!(err, ConfigError::RoutesNotFound(_)));
}

#[test]
fn test_parse_malformed_document() {
    let err = parse_routes("routes.yml", "- url: /a\n  responses: [").unwrap_err();
    assert!(matches!(err, ConfigError::YamlError(_)));

    let err = parse_routes("routes.yml", "- method: GET\n  responses: {200: ok}").unwrap_err();
    assert!(matches!(err, ConfigError::YamlError(_)));
}
