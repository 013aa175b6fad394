//! Hand-rolled CORS (§6: every response carries `Access-Control-Allow-Origin:
//! *`, methods `GET,POST,PATCH,DELETE,OPTIONS`, headers
//! `Content-Type,Authorization`; `OPTIONS *` answers 204). The workspace
//! carries no `tower-http`, so this is a small `axum::middleware::from_fn`
//! rather than a `CorsLayer`.

use axum::extract::Request;
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

const ALLOW_ORIGIN: &str = "*";
const ALLOW_METHODS: &str = "GET,POST,PATCH,DELETE,OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type,Authorization";

fn apply_headers(response: &mut Response) {
    let headers = response.headers_mut();
    headers.insert("access-control-allow-origin", HeaderValue::from_static(ALLOW_ORIGIN));
    headers.insert("access-control-allow-methods", HeaderValue::from_static(ALLOW_METHODS));
    headers.insert("access-control-allow-headers", HeaderValue::from_static(ALLOW_HEADERS));
}

pub async fn cors(req: Request, next: Next) -> Response {
    if req.method() == Method::OPTIONS {
        let mut response = StatusCode::NO_CONTENT.into_response();
        apply_headers(&mut response);
        return response;
    }
    let mut response = next.run(req).await;
    apply_headers(&mut response);
    response
}
