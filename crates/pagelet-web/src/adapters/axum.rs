use crate::engine::{PageletCore, PageletEngine, decode_url_path};
use crate::error::PageError;
use axum::Router;
use axum::body::to_bytes;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::any;
use pagelet_core::PageRequest;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error};

pub const SOURCE_HEADER: &str = "x-pagelet-source";

#[derive(Clone)]
pub struct AxumPageletAdapter {
    engine: Arc<PageletEngine>,
    include_source_header: bool,
}

impl AxumPageletAdapter {
    pub fn new(engine: Arc<PageletEngine>) -> Self {
        Self {
            engine,
            include_source_header: true,
        }
    }

    pub fn with_source_header(mut self, enabled: bool) -> Self {
        self.include_source_header = enabled;
        self
    }

    /// Single wildcard route: every method, every path.
    pub fn router(self) -> Router {
        Router::new()
            .route("/", any(serve_page))
            .route("/{*path}", any(serve_page))
            .with_state(self)
    }

    /// Reads the body, then runs the page pipeline on a blocking worker so
    /// the script context never crosses an await point.
    pub async fn handle(&self, request: Request) -> Response {
        let (parts, body) = request.into_parts();
        let limit = self.engine.config().max_body_bytes;
        let bytes = match to_bytes(body, limit).await {
            Ok(v) => v,
            Err(e) => {
                return (
                    StatusCode::PAYLOAD_TOO_LARGE,
                    format!("failed to read request body (limit {limit} bytes): {e}"),
                )
                    .into_response();
            }
        };

        let page_request = page_request_from_parts(&parts.method, &parts.uri, &parts.headers, &bytes);
        let adapter = self.clone();
        match tokio::task::spawn_blocking(move || adapter.render(&page_request)).await {
            Ok(response) => response,
            Err(e) => {
                error!(path = %parts.uri.path(), error = %e, "page worker failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("page worker failed: {e}"),
                )
                    .into_response()
            }
        }
    }

    /// Runs the whole pipeline synchronously for one request.
    pub fn render(&self, request: &PageRequest) -> Response {
        let output = match self.engine.render_request(request) {
            Ok(v) => v,
            Err(err) => {
                if err.is_not_found() {
                    debug!(path = %request.path, "page not found");
                } else {
                    error!(path = %request.path, error = %err, "page failed");
                }
                return Self::error_response(&err);
            }
        };

        let mut response = Html(output.html).into_response();
        if self.include_source_header {
            if let Ok(v) = HeaderValue::from_str(&output.source.display().to_string()) {
                response.headers_mut().insert(SOURCE_HEADER, v);
            }
        }
        response
    }

    pub fn error_response(err: &PageError) -> Response {
        if err.is_not_found() {
            return (StatusCode::NOT_FOUND, "not found").into_response();
        }
        let status = StatusCode::from_u16(err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, err.to_string()).into_response()
    }
}

async fn serve_page(State(adapter): State<AxumPageletAdapter>, request: Request) -> Response {
    adapter.handle(request).await
}

/// The path is percent-decoded once; scripts and page resolution see the
/// decoded form.
pub fn page_request_from_parts(
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: &[u8],
) -> PageRequest {
    PageRequest {
        method: method.as_str().to_string(),
        path: decode_url_path(uri.path()),
        headers: headers_to_map(headers),
        body: String::from_utf8_lossy(body).into_owned(),
    }
}

fn headers_to_map(headers: &HeaderMap) -> BTreeMap<String, Vec<String>> {
    let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers {
        out.entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    out
}
