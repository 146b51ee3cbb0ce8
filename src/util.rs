use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use lambda_http::http::header::{HeaderValue, CACHE_CONTROL, CONTENT_TYPE};
use lambda_http::http::StatusCode;
use lambda_http::{Body, Response};
use std::borrow::Cow;
use url::Url;

pub fn valid_target(u: &str) -> bool {
    if let Ok(parsed) = Url::parse(u) {
        match parsed.scheme() {
            "http" | "https" => {}
            _ => return false,
        }
        return parsed.host().is_some();
    }
    false
}

pub fn b64u(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn b64u_to_bytes(s: &str) -> Option<Vec<u8>> {
    URL_SAFE_NO_PAD.decode(s).ok()
}

/// Builds a response without going through the fallible `http` builder.
pub fn respond(status: u16, content_type: &'static str, body: Body) -> Response<Body> {
    let mut resp = Response::new(body);
    *resp.status_mut() = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    resp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    resp
}

pub fn resp_json(status: u16, v: serde_json::Value) -> Response<Body> {
    respond(status, "application/json", Body::Text(v.to_string()))
}

pub fn resp_html(status: u16, html: String) -> Response<Body> {
    respond(status, "text/html; charset=utf-8", Body::Text(html))
}

pub fn with_cache(mut resp: Response<Body>, value: &str) -> Response<Body> {
    if let Ok(v) = HeaderValue::from_str(value) {
        resp.headers_mut().insert(CACHE_CONTROL, v);
    }
    resp
}

pub fn json_err(status: u16, code: &'static str, message: impl Into<Cow<'static, str>>) -> Response<Body> {
    let payload = serde_json::json!({
        "error": code,
        "message": message.into(),
    });
    resp_json(status, payload)
}

/// Minimal escaping for text and attribute positions in generated markup.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
