//! 请求上下文中间件：注入 request_id 并挂到日志 span 上。

use axum::{
    body::Body,
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use sc_telemetry::new_request_id;
use tracing::{Instrument, info_span};

pub async fn request_context(req: Request<Body>, next: Next) -> Response {
    let request_id = new_request_id();
    let span = info_span!(
        target: "sc.api",
        "request",
        request_id = %request_id,
        method = %req.method(),
        path = %req.uri().path()
    );

    let mut response = next.run(req).instrument(span).await;
    response.headers_mut().insert(
        "x-request-id",
        HeaderValue::from_str(&request_id).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    response
}
