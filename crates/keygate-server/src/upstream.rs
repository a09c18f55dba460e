// ABOUTME: Forwards authorized requests to the REST service keygate fronts and relays its response.
// ABOUTME: Strips hop-by-hop headers in both directions and maps transport failures to 413/502.

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::app_state::SharedState;

/// Headers that describe a single connection and must not be relayed.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Errors that can occur while forwarding a request.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("invalid upstream url: {0}")]
    InvalidUrl(String),

    #[error("upstream request failed: {0}")]
    Request(#[from] reqwest::Error),
}

impl IntoResponse for UpstreamError {
    fn into_response(self) -> Response {
        let status = match self {
            UpstreamError::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            UpstreamError::InvalidUrl(_) | UpstreamError::Request(_) => StatusCode::BAD_GATEWAY,
        };
        (
            status,
            axum::Json(serde_json::json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

/// Client side of the REST service: a pooled HTTP client plus the base URL
/// every forwarded path is appended to.
#[derive(Debug, Clone)]
pub struct Upstream {
    client: reqwest::Client,
    base_url: String,
    max_body_bytes: usize,
}

impl Upstream {
    pub fn new(client: reqwest::Client, base_url: &str, max_body_bytes: usize) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_body_bytes,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send `req` to the upstream service and convert its reply into a response.
    pub async fn forward(&self, req: Request) -> Result<Response, UpstreamError> {
        let (parts, body) = req.into_parts();

        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let target = format!("{}{}", self.base_url, path_and_query);
        let url = reqwest::Url::parse(&target).map_err(|_| UpstreamError::InvalidUrl(target))?;

        let body = axum::body::to_bytes(body, self.max_body_bytes)
            .await
            .map_err(|_| UpstreamError::BodyTooLarge {
                limit: self.max_body_bytes,
            })?;

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        headers.remove(header::HOST);
        headers.remove(header::CONTENT_LENGTH);

        tracing::debug!(method = %parts.method, %url, "forwarding request upstream");

        let upstream_resp = self
            .client
            .request(parts.method, url)
            .headers(headers)
            .body(body)
            .send()
            .await?;

        let status = upstream_resp.status();
        let mut resp_headers = upstream_resp.headers().clone();
        strip_hop_by_hop(&mut resp_headers);
        resp_headers.remove(header::CONTENT_LENGTH);
        let bytes = upstream_resp.bytes().await?;

        let mut resp = Response::new(Body::from(bytes));
        *resp.status_mut() = status;
        *resp.headers_mut() = resp_headers;
        Ok(resp)
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Catch-all handler: every request that makes it past the gate lands here.
pub async fn forward(State(state): State<SharedState>, req: Request) -> Response {
    match state.upstream.forward(req).await {
        Ok(resp) => resp,
        Err(e) => {
            tracing::warn!("upstream forwarding failed: {}", e);
            e.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::Request;
    use std::net::SocketAddr;
    use tower::ServiceExt;

    /// Echo service standing in for the REST backend: reports what it received.
    async fn spawn_echo() -> SocketAddr {
        async fn echo(req: axum::extract::Request) -> impl IntoResponse {
            let (parts, body) = req.into_parts();
            let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();
            let get = |name: &str| {
                parts
                    .headers
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .map(String::from)
            };
            let json = serde_json::json!({
                "method": parts.method.as_str(),
                "uri": parts.uri.to_string(),
                "body": String::from_utf8_lossy(&body),
                "private_key": get("privatekey"),
                "connection": get("connection"),
                "content_type": get("content-type"),
            });
            (
                StatusCode::ACCEPTED,
                [("x-upstream", "echo"), ("connection", "close")],
                axum::Json(json),
            )
        }

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().fallback(echo);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn test_app(base_url: &str, max_body_bytes: usize) -> Router {
        let upstream = Upstream::new(reqwest::Client::new(), base_url, max_body_bytes);
        let gate = keygate_core::Gate::new(
            keygate_core::Credential::new("privateKey", "1234567").unwrap(),
        );
        let state = std::sync::Arc::new(crate::AppState::new(gate, upstream));
        Router::new().fallback(forward).with_state(state)
    }

    async fn json_body(resp: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let upstream = Upstream::new(reqwest::Client::new(), "http://127.0.0.1:3001/", 1024);
        assert_eq!(upstream.base_url(), "http://127.0.0.1:3001");
    }

    #[tokio::test]
    async fn forwards_method_path_query_headers_and_body() {
        let addr = spawn_echo().await;
        let app = test_app(&format!("http://{}/", addr), 1024);

        let resp = app
            .oneshot(
                Request::post("/posts?_sort=id&_order=desc")
                    .header("privateKey", "1234567")
                    .header("content-type", "application/json")
                    .header("connection", "keep-alive")
                    .body(Body::from(r#"{"title":"hi"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        assert_eq!(resp.headers()["x-upstream"], "echo");
        assert!(
            resp.headers().get("connection").is_none(),
            "hop-by-hop response headers must not be relayed"
        );

        let json = json_body(resp).await;
        assert_eq!(json["method"], "POST");
        assert_eq!(json["uri"], "/posts?_sort=id&_order=desc");
        assert_eq!(json["body"], r#"{"title":"hi"}"#);
        assert_eq!(json["private_key"], "1234567");
        assert_eq!(json["content_type"], "application/json");
        assert_ne!(json["connection"], "keep-alive");
    }

    #[tokio::test]
    async fn base_path_is_preserved() {
        let addr = spawn_echo().await;
        let app = test_app(&format!("http://{}/api", addr), 1024);

        let resp = app
            .oneshot(Request::get("/posts/1").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let json = json_body(resp).await;
        assert_eq!(json["uri"], "/api/posts/1");
    }

    #[tokio::test]
    async fn oversized_body_is_rejected_with_413() {
        let addr = spawn_echo().await;
        let app = test_app(&format!("http://{}", addr), 8);

        let resp = app
            .oneshot(
                Request::post("/posts")
                    .body(Body::from("this body is far too long"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn unreachable_upstream_yields_502() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let app = test_app(&format!("http://{}", addr), 1024);
        let resp = app
            .oneshot(Request::get("/posts").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        let json = json_body(resp).await;
        assert!(json["error"].as_str().unwrap().contains("upstream"));
    }
}
