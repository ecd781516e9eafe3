use http::StatusCode;
use moq_config::prelude::StatusKey;
use serde_json::Value;

use crate::RouteError;

/// Reason phrase written next to a status. Codes outside the table get an
/// empty phrase.
pub fn reason_phrase(status: StatusCode) -> &'static str {
    match status.as_u16() {
        100 => "Continue",
        101 => "Switching Protocols",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        203 => "Non-Authoritative Information",
        204 => "No Content",
        205 => "Reset Content",
        206 => "Partial Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "",
    }
}

#[derive(Debug, Clone)]
pub struct StatusResponse {
    pub status: StatusCode,
    pub template: Value,
}

/// The bodies a route can answer with, keyed by status. The first declared
/// status is the default.
#[derive(Debug, Clone)]
pub struct ResponseTable {
    default: StatusResponse,
    alternatives: Vec<StatusResponse>,
}

impl ResponseTable {
    pub fn try_from(configs: &[(StatusKey, Value)]) -> Result<Self, RouteError> {
        let mut responses: Vec<StatusResponse> = Vec::with_capacity(configs.len());
        for (key, template) in configs {
            let status = parse_status(key)?;
            match responses.iter_mut().find(|r| r.status == status) {
                Some(existing) => existing.template = template.clone(),
                None => responses.push(StatusResponse {
                    status,
                    template: template.clone(),
                }),
            }
        }

        let mut responses = responses.into_iter();
        let default = responses.next().ok_or(RouteError::NoResponsesProvided)?;

        Ok(Self {
            default,
            alternatives: responses.collect(),
        })
    }

    pub fn default_response(&self) -> &StatusResponse {
        &self.default
    }

    /// Picks the requested status when the route declares it, the default
    /// otherwise.
    pub fn select(&self, requested: Option<u16>) -> &StatusResponse {
        requested
            .filter(|status| *status >= 100)
            .and_then(|status| self.iter().find(|r| r.status.as_u16() == status))
            .unwrap_or(&self.default)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StatusResponse> {
        std::iter::once(&self.default).chain(self.alternatives.iter())
    }
}

fn parse_status(key: &StatusKey) -> Result<StatusCode, RouteError> {
    let code = key
        .as_code()
        .filter(|code| (100..=599).contains(code))
        .ok_or_else(|| RouteError::InvalidStatus(key.to_string()))?;
    StatusCode::from_u16(code).map_err(|_| RouteError::InvalidStatus(key.to_string()))
}

#[test]
fn test_reason_phrases() {
    assert_eq!("OK", reason_phrase(StatusCode::OK));
    assert_eq!(
        "Non-Authoritative Information",
        reason_phrase(StatusCode::NON_AUTHORITATIVE_INFORMATION)
    );
    assert_eq!("Not Found", reason_phrase(StatusCode::NOT_FOUND));
    assert_eq!("Service Unavailable", reason_phrase(StatusCode::SERVICE_UNAVAILABLE));
    assert_eq!("", reason_phrase(StatusCode::IM_A_TEAPOT));
    assert_eq!("", reason_phrase(StatusCode::BAD_GATEWAY));
}

#[cfg(test)]
fn table(entries: &[(u16, &str)]) -> ResponseTable {
    let configs: Vec<(StatusKey, Value)> = entries
        .iter()
        .map(|(code, body)| (StatusKey::Code(*code), Value::from(*body)))
        .collect();
    ResponseTable::try_from(&configs).unwrap()
}

#[test]
fn test_select_status() {
    let responses = table(&[(200, "ok"), (404, "missing"), (500, "broken")]);

    assert_eq!(StatusCode::OK, responses.select(None).status);
    assert_eq!(StatusCode::NOT_FOUND, responses.select(Some(404)).status);
    assert_eq!(Value::from("missing"), responses.select(Some(404)).template);
    assert_eq!(StatusCode::INTERNAL_SERVER_ERROR, responses.select(Some(500)).status);

    // Not declared by the route
    assert_eq!(StatusCode::OK, responses.select(Some(201)).status);
    // Below the accepted range
    assert_eq!(StatusCode::OK, responses.select(Some(99)).status);
}

#[test]
fn test_first_declared_is_default() {
    let responses = table(&[(404, "missing"), (200, "ok")]);
    assert_eq!(StatusCode::NOT_FOUND, responses.default_response().status);
    assert_eq!(StatusCode::NOT_FOUND, responses.select(None).status);
    assert_eq!(StatusCode::OK, responses.select(Some(200)).status);
}

#[test]
fn test_duplicate_status_replaces_body() {
    let configs = vec![
        (StatusKey::Code(200), Value::from("first")),
        (StatusKey::Text("200".to_owned()), Value::from("second")),
    ];
    let responses = ResponseTable::try_from(&configs).unwrap();
    assert_eq!(1, responses.iter().count());
    assert_eq!(Value::from("second"), responses.select(None).template);
}

#[test]
fn test_invalid_tables() {
    assert!(matches!(
        ResponseTable::try_from(&[]),
        Err(RouteError::NoResponsesProvided)
    ));
    assert!(matches!(
        ResponseTable::try_from(&[(StatusKey::Code(700), Value::Null)]),
        Err(RouteError::InvalidStatus(_))
    ));
    assert!(matches!(
        ResponseTable::try_from(&[(StatusKey::Text("ok".to_owned()), Value::Null)]),
        Err(RouteError::InvalidStatus(_))
    ));
}
