use std::sync::Arc;

use http::{header::CONTENT_TYPE, request::Parts, StatusCode};
use hyper::{ext::ReasonPhrase, Body, Request, Response};
use moq_router::{reason_phrase, server_error, RequestContext, Router};
use tracing::{debug, info, instrument, warn};

/// The route table currently being served.
#[derive(Debug, Clone)]
pub enum MockService {
    Ready(Arc<Router>),
    /// The route document went missing, every request gets a server error
    /// until it is back.
    Unavailable { routes_file: String },
}

impl MockService {
    pub fn new(router: Router) -> Self {
        MockService::Ready(Arc::new(router))
    }

    #[instrument(skip_all, fields(http.uri = %req.uri(), http.method = %req.method()))]
    pub async fn process_request(&self, req: Request<Body>) -> Result<Response<Body>, anyhow::Error> {
        Ok(with_reason_phrase(self.dispatch(req).await?))
    }

    async fn dispatch(&self, req: Request<Body>) -> Result<Response<Body>, anyhow::Error> {
        let router = match self {
            MockService::Ready(router) => router,
            MockService::Unavailable { routes_file } => {
                debug!("Route table is unavailable");
                let message = format!("'{}' not found.", routes_file);
                return Ok(server_error(&message).map(Body::from));
            }
        };

        let (parts, body) = req.into_parts();
        let body = match hyper::body::to_bytes(body).await {
            Ok(body) => body,
            Err(e) => {
                info!("Unable to extract body from HTTP request. Error: {}", e);

                return Ok(Response::builder()
                    .status(StatusCode::INTERNAL_SERVER_ERROR)
                    .header("x-moq-source", "internal")
                    .body(Body::empty())?);
            }
        };

        let mut ctx = request_context(&parts);
        if is_form(&parts) {
            ctx = ctx.with_form_body(&body);
        }

        Ok(router.respond(&ctx).await.map(Body::from))
    }
}

/// The status line carries the phrase from the reason phrase table, empty for
/// codes it does not list.
fn with_reason_phrase(mut response: Response<Body>) -> Response<Body> {
    match ReasonPhrase::try_from(reason_phrase(response.status()).as_bytes()) {
        Ok(phrase) => {
            response.extensions_mut().insert(phrase);
        }
        Err(e) => warn!("Unable to set reason phrase. Error: {:?}", e),
    }
    response
}

fn request_context(parts: &Parts) -> RequestContext {
    let target = parts
        .uri
        .path_and_query()
        .map(|x| x.as_str())
        .unwrap_or("/");
    RequestContext::new(parts.method.as_str(), target)
}

fn is_form(parts: &Parts) -> bool {
    parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false)
}

#[cfg(test)]
fn service(routes: &str) -> MockService {
    let routes = moq_config::prelude::parse_routes("routes.yml", routes).unwrap();
    let mut builder = moq_router::RouterBuilder::new();
    for route in &routes {
        builder.load_config(route);
    }
    MockService::new(builder.build().unwrap())
}

#[cfg(test)]
async fn call(service: &MockService, req: Request<Body>) -> (StatusCode, http::HeaderMap, serde_json::Value) {
    let response = service.process_request(req).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
    (status, headers, serde_json::from_slice(&body).unwrap())
}

#[cfg(test)]
fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[cfg(test)]
const USER_ROUTES: &str = r#"
- url: /users/:id
  method: GET
  responses:
    200:
      id: ":id"
      name: demo
- url: /items
  method: GET
  responses:
    200: ok
    404: missing
"#;

#[tokio::test]
async fn test_user_lookup() {
    let service = service(USER_ROUTES);
    let (status, headers, body) = call(&service, get("/users/42")).await;

    assert_eq!(StatusCode::OK, status);
    assert_eq!(serde_json::json!({"id": 42, "name": "demo"}), body);
    assert_eq!("application/json", headers[CONTENT_TYPE].to_str().unwrap());
    assert_eq!(
        "no-cache, must-revalidate",
        headers[http::header::CACHE_CONTROL].to_str().unwrap()
    );
    assert_eq!(
        "Mon, 26 Jul 1997 05:00:00 GMT",
        headers[http::header::EXPIRES].to_str().unwrap()
    );
    assert!(headers.contains_key(moq_router::ROUTE_ID_HEADER));
}

#[tokio::test]
async fn test_segment_count_mismatch_is_not_found() {
    let service = service(USER_ROUTES);
    let (status, _, body) = call(&service, get("/users/42/extra")).await;

    assert_eq!(StatusCode::NOT_FOUND, status);
    assert_eq!(serde_json::json!("Resource not found baby."), body);
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let service = service(USER_ROUTES);
    let req = Request::builder()
        .method("DELETE")
        .uri("/unknown")
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = call(&service, req).await;

    assert_eq!(StatusCode::NOT_FOUND, status);
    assert_eq!(serde_json::json!("Resource not found baby."), body);
    assert!(!headers.contains_key(moq_router::ROUTE_ID_HEADER));
}

#[tokio::test]
async fn test_status_from_query() {
    let service = service(USER_ROUTES);

    let (status, _, body) = call(&service, get("/items?_status=404")).await;
    assert_eq!(StatusCode::NOT_FOUND, status);
    assert_eq!(serde_json::json!("missing"), body);

    let (status, _, body) = call(&service, get("/items?_status=503")).await;
    assert_eq!(StatusCode::OK, status);
    assert_eq!(serde_json::json!("ok"), body);
}

#[tokio::test]
async fn test_status_from_form_body() {
    let service = service(USER_ROUTES);
    let req = Request::builder()
        .uri("/items")
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("_status=404"))
        .unwrap();
    let (status, _, body) = call(&service, req).await;
    assert_eq!(StatusCode::NOT_FOUND, status);
    assert_eq!(serde_json::json!("missing"), body);

    // Only form bodies are read
    let req = Request::builder()
        .uri("/items")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from("_status=404"))
        .unwrap();
    let (status, _, _) = call(&service, req).await;
    assert_eq!(StatusCode::OK, status);
}

#[tokio::test]
async fn test_unavailable_routes() {
    let service = MockService::Unavailable {
        routes_file: "routes.yml".to_owned(),
    };
    let (status, _, body) = call(&service, get("/users/42")).await;

    assert_eq!(StatusCode::INTERNAL_SERVER_ERROR, status);
    assert_eq!(serde_json::json!("'routes.yml' not found."), body);
}

#[tokio::test(start_paused = true)]
async fn test_delay_does_not_block_other_requests() {
    let service = service(
        r#"
- url: /slow
  method: GET
  delay: 15
  responses:
    200: slow
- url: /fast
  method: GET
  responses:
    200: fast
"#,
    );

    let start = tokio::time::Instant::now();
    let slow_service = service.clone();
    let slow = tokio::spawn(async move { call(&slow_service, get("/slow")).await });

    let (_, _, body) = call(&service, get("/fast")).await;
    assert_eq!(serde_json::json!("fast"), body);
    assert!(start.elapsed() < std::time::Duration::from_secs(1));

    let (_, _, body) = slow.await.unwrap();
    assert_eq!(serde_json::json!("slow"), body);
    assert!(start.elapsed() >= std::time::Duration::from_secs(10));
    assert!(start.elapsed() < std::time::Duration::from_secs(11));
}

#[cfg(test)]
async fn status_line(service: MockService, target: &str) -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let make_service = hyper::service::make_service_fn(move |_| {
        let service = service.clone();
        async move {
            Ok::<_, std::convert::Infallible>(hyper::service::service_fn(move |req| {
                let service = service.clone();
                async move { service.process_request(req).await }
            }))
        }
    });
    let server = hyper::Server::bind(&std::net::SocketAddr::from(([127, 0, 0, 1], 0))).serve(make_service);
    let addr = server.local_addr();
    tokio::spawn(server);

    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        target
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let raw = String::from_utf8(raw).unwrap();
    raw.split("\r\n").next().unwrap().to_owned()
}

#[tokio::test]
async fn test_reason_phrase_on_status_line() {
    let service = service(
        r#"
- url: /odd
  method: GET
  responses:
    299: odd
    207: multi
    201: created
"#,
    );

    assert_eq!("HTTP/1.1 299 ", status_line(service.clone(), "/odd").await);
    assert_eq!("HTTP/1.1 207 ", status_line(service.clone(), "/odd?_status=207").await);
    assert_eq!(
        "HTTP/1.1 201 Created",
        status_line(service.clone(), "/odd?_status=201").await
    );
    assert_eq!("HTTP/1.1 404 Not Found", status_line(service, "/missing").await);

    let unavailable = MockService::Unavailable {
        routes_file: "routes.yml".to_owned(),
    };
    assert_eq!(
        "HTTP/1.1 500 Internal Server Error",
        status_line(unavailable, "/odd").await
    );
}

#[tokio::test]
async fn test_reason_phrase_extension() {
    let service = service(USER_ROUTES);
    let response = service.process_request(get("/items?_status=404")).await.unwrap();

    let phrase = response.extensions().get::<ReasonPhrase>().unwrap();
    assert_eq!(b"Not Found", phrase.as_bytes());
}
