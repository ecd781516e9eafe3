use bytes::Bytes;
use http::{
    header::{CACHE_CONTROL, CONTENT_TYPE, EXPIRES},
    HeaderValue, Response, StatusCode,
};
use lazy_static::lazy_static;
use moq_config::prelude::NumericStrings;
use regex::Regex;
use serde_json::{Number, Value};
use tracing::warn;

pub const NOT_FOUND_BODY: &str = "Resource not found baby.";

lazy_static! {
    static ref NUMERIC_STRING: Regex =
        Regex::new(r"^\s*[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?\s*$").unwrap();
}

/// Serializes `body` as the JSON payload of a response with the no-cache
/// headers every answer carries.
pub fn json_response(status: StatusCode, body: &Value, numeric_strings: NumericStrings) -> Response<Bytes> {
    let payload = match numeric_strings {
        NumericStrings::Coerce => serde_json::to_vec(&coerce_numeric_strings(body.clone())),
        NumericStrings::Preserve => serde_json::to_vec(body),
    };
    let payload = match payload {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Unable to serialize response body. Error: {}", e);
            b"null".to_vec()
        }
    };

    let mut response = Response::new(Bytes::from(payload));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache, must-revalidate"));
    headers.insert(EXPIRES, HeaderValue::from_static("Mon, 26 Jul 1997 05:00:00 GMT"));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    response
}

pub fn not_found() -> Response<Bytes> {
    json_response(
        StatusCode::NOT_FOUND,
        &Value::from(NOT_FOUND_BODY),
        NumericStrings::Preserve,
    )
}

pub fn server_error(body: &str) -> Response<Bytes> {
    json_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        &Value::from(body),
        NumericStrings::Preserve,
    )
}

/// Rewrites every string value that reads as a number into that number.
/// Object keys stay strings.
pub fn coerce_numeric_strings(value: Value) -> Value {
    match value {
        Value::String(text) => match parse_number(&text) {
            Some(number) => Value::Number(number),
            None => Value::String(text),
        },
        Value::Array(items) => Value::Array(items.into_iter().map(coerce_numeric_strings).collect()),
        Value::Object(entries) => Value::Object(
            entries
                .into_iter()
                .map(|(key, item)| (key, coerce_numeric_strings(item)))
                .collect(),
        ),
        other => other,
    }
}

fn parse_number(text: &str) -> Option<Number> {
    if !NUMERIC_STRING.is_match(text) {
        return None;
    }

    let text = text.trim();
    if !text.contains(&['.', 'e', 'E'][..]) {
        if let Ok(integer) = text.parse::<i64>() {
            return Some(Number::from(integer));
        }
    }

    text.parse::<f64>().ok().and_then(Number::from_f64)
}

#[cfg(test)]
fn body_text(response: &Response<Bytes>) -> String {
    String::from_utf8(response.body().to_vec()).unwrap()
}

#[test]
fn test_coerce_numeric_strings() {
    let body = serde_json::json!({
        "id": "42",
        "negative": "-7",
        "padded": " 12 ",
        "ratio": "1.5",
        "exp": "1e3",
        "leading_dot": ".5",
        "huge": "123456789012345678901234567890",
        "word": "42abc",
        "empty": "",
        "hex": "0x1A",
        "list": ["1", "two"],
        "10": "ten",
    });

    let coerced = coerce_numeric_strings(body);
    assert_eq!(Value::from(42), coerced["id"]);
    assert_eq!(Value::from(-7), coerced["negative"]);
    assert_eq!(Value::from(12), coerced["padded"]);
    assert_eq!(Value::from(1.5), coerced["ratio"]);
    assert_eq!(Value::from(1000.0), coerced["exp"]);
    assert_eq!(Value::from(0.5), coerced["leading_dot"]);
    assert!(coerced["huge"].is_f64());
    assert_eq!(Value::from("42abc"), coerced["word"]);
    assert_eq!(Value::from(""), coerced["empty"]);
    assert_eq!(Value::from("0x1A"), coerced["hex"]);
    assert_eq!(serde_json::json!([1, "two"]), coerced["list"]);
    assert_eq!(Value::from("ten"), coerced["10"]);
}

#[test]
fn test_json_response_headers() {
    let response = json_response(
        StatusCode::CREATED,
        &serde_json::json!({"id": "42", "name": "demo"}),
        NumericStrings::Coerce,
    );

    assert_eq!(StatusCode::CREATED, response.status());
    assert_eq!("no-cache, must-revalidate", response.headers()[CACHE_CONTROL].to_str().unwrap());
    assert_eq!("Mon, 26 Jul 1997 05:00:00 GMT", response.headers()[EXPIRES].to_str().unwrap());
    assert_eq!("application/json", response.headers()[CONTENT_TYPE].to_str().unwrap());
    assert_eq!(r#"{"id":42,"name":"demo"}"#, body_text(&response));
}

#[test]
fn test_json_response_preserve_strings() {
    let response = json_response(
        StatusCode::OK,
        &serde_json::json!({"id": "42"}),
        NumericStrings::Preserve,
    );
    assert_eq!(r#"{"id":"42"}"#, body_text(&response));
}

#[test]
fn test_fixed_responses() {
    let response = not_found();
    assert_eq!(StatusCode::NOT_FOUND, response.status());
    assert_eq!(r#""Resource not found baby.""#, body_text(&response));

    let response = server_error("'routes.yml' not found.");
    assert_eq!(StatusCode::INTERNAL_SERVER_ERROR, response.status());
    assert_eq!(r#""'routes.yml' not found.""#, body_text(&response));
}
