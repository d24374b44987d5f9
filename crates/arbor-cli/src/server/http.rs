// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! HTTP server for the dispatcher.
//!
//! This is a thin adapter that converts HTTP requests to `arbor::Request`,
//! calls `dispatcher.dispatch()`, and converts `arbor::Response` back to HTTP.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use arbor::Dispatcher;
use axum::{
    body::Body,
    extract::{Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Router,
};
use tower_http::services::ServeDir;
use tracing::warn;

const MAX_BODY_SIZE: usize = 1024 * 1024;

/// Shared application state for the server.
pub struct AppState {
    /// Request dispatcher.
    pub dispatcher: Dispatcher,
}

/// Builds the axum router: `/public` from disk, everything else dispatched.
pub fn app(dispatcher: Dispatcher, public_dir: &Path) -> Router {
    let state = Arc::new(AppState { dispatcher });

    Router::new()
        .nest_service("/public", ServeDir::new(public_dir))
        .fallback(fallback_handler)
        .with_state(state)
}

/// Binds `addr` and serves until the process stops.
pub async fn create_server(addr: &str, dispatcher: Dispatcher, public_dir: &Path) -> anyhow::Result<()> {
    let app = app(dispatcher, public_dir);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Main fallback handler that routes requests
async fn fallback_handler(State(state): State<Arc<AppState>>, request: Request<Body>) -> Response {
    let request = match to_arbor_request(request).await {
        Ok(request) => request,
        Err(status) => return status.into_response(),
    };

    let response = state.dispatcher.dispatch(request).await;
    into_http_response(response)
}

/// Converts an HTTP request, reading the body up to 1 MiB.
pub async fn to_arbor_request(request: Request<Body>) -> Result<arbor::Request, StatusCode> {
    let (parts, body) = request.into_parts();

    let bytes = axum::body::to_bytes(body, MAX_BODY_SIZE)
        .await
        .map_err(|_| StatusCode::PAYLOAD_TOO_LARGE)?;

    let query: HashMap<String, String> =
        form_urlencoded::parse(parts.uri.query().unwrap_or_default().as_bytes())
            .into_owned()
            .collect();

    let headers = parts.headers.iter().filter_map(|(name, value)| {
        let value = value.to_str().ok()?;
        Some((name.as_str().to_string(), value.to_string()))
    });

    let mut converted = arbor::Request::new(parts.method.as_str(), parts.uri.path())
        .with_headers(headers)
        .with_query(query);
    if !bytes.is_empty() {
        converted = converted.with_body(bytes.to_vec());
    }
    Ok(converted)
}

/// Converts a dispatcher response. Repeated headers such as `set-cookie`
/// are kept.
pub fn into_http_response(response: arbor::Response) -> Response {
    let mut builder = axum::http::Response::builder().status(response.status);
    for (name, value) in &response.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    match builder.body(Body::from(response.body)) {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "Invalid response from dispatcher");
            (StatusCode::INTERNAL_SERVER_ERROR, "Invalid response").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_request_conversion() {
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/de/search?q=rust%20lang&page=2")
            .header("content-type", "application/json")
            .header("cookie", "locale=de; theme=dark")
            .body(Body::from(r#"{"a":1}"#))
            .unwrap();

        let converted = to_arbor_request(request).await.unwrap();
        assert_eq!(converted.method, "POST");
        assert_eq!(converted.path, "/de/search");
        assert_eq!(converted.query.get("q").map(String::as_str), Some("rust lang"));
        assert_eq!(converted.query.get("page").map(String::as_str), Some("2"));
        assert_eq!(converted.cookie("theme"), Some("dark"));
        assert!(converted.is_json());
        assert_eq!(converted.body_str(), Some(r#"{"a":1}"#));
    }

    #[tokio::test]
    async fn test_empty_body_is_none() {
        let request = axum::http::Request::builder()
            .uri("/")
            .body(Body::empty())
            .unwrap();

        let converted = to_arbor_request(request).await.unwrap();
        assert!(converted.body.is_none());
        assert!(converted.query.is_empty());
    }

    #[test]
    fn test_response_conversion_keeps_repeated_headers() {
        let mut response = arbor::Response::html(404, "<h1>gone</h1>");
        response.append_header("set-cookie", "a=1; Path=/");
        response.append_header("set-cookie", "b=2; Path=/");

        let converted = into_http_response(response);
        assert_eq!(converted.status(), StatusCode::NOT_FOUND);
        let cookies: Vec<_> = converted.headers().get_all("set-cookie").iter().collect();
        assert_eq!(cookies.len(), 2);
    }
}
