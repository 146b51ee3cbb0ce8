// API Gateway simple-response authorizer for the admin routes (/v1/links*, /admin/*).
// Accepts the `ah_admin` session cookie or `Authorization: Bearer <ADMIN_SECRET>`.

use lambda_runtime::{service_fn, Error as LambdaError, LambdaEvent};
use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;

use articlehub::auth::{verify_password, verify_session, SESSION_COOKIE};

#[derive(Serialize)]
struct SimpleAuthz {
    #[serde(rename = "isAuthorized")]
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<HashMap<String, String>>,
}

fn get_header<'a>(evt: &'a JsonValue, name: &str) -> Option<&'a str> {
    let headers = evt.get("headers")?.as_object()?;
    headers.get(&name.to_ascii_lowercase())?.as_str()
}

fn get_cookie(evt: &JsonValue, name: &str) -> Option<String> {
    // HTTP API v2 splits cookies into their own array
    if let Some(arr) = evt.get("cookies").and_then(|c| c.as_array()) {
        for c in arr.iter().filter_map(|c| c.as_str()) {
            if let Some((k, v)) = c.trim().split_once('=') {
                if k == name {
                    return Some(v.to_string());
                }
            }
        }
    }
    let cookie_hdr = get_header(evt, "cookie")?;
    for part in cookie_hdr.split(';') {
        if let Some((k, v)) = part.trim().split_once('=') {
            if k == name {
                return Some(v.to_string());
            }
        }
    }
    None
}

fn authorize(evt: &JsonValue, secret: &str) -> SimpleAuthz {
    let ctx = |source: &str| {
        Some(HashMap::from([
            ("source".to_string(), source.to_string()),
            ("is_admin".to_string(), "true".to_string()),
        ]))
    };

    if let Some(tok) = get_cookie(evt, SESSION_COOKIE) {
        if verify_session(&tok, secret) {
            return SimpleAuthz {
                ok: true,
                context: ctx("cookie"),
            };
        }
        tracing::info!("admin cookie failed verification");
    }

    if let Some(pw) = get_header(evt, "authorization").and_then(|a| a.strip_prefix("Bearer ")) {
        if verify_password(pw, secret) {
            return SimpleAuthz {
                ok: true,
                context: ctx("bearer"),
            };
        }
    }

    tracing::info!("no valid admin credential found");
    SimpleAuthz {
        ok: false,
        context: None,
    }
}

#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .without_time()
        .init();
    lambda_runtime::run(service_fn(handler)).await
}

async fn handler(event: LambdaEvent<JsonValue>) -> Result<JsonValue, LambdaError> {
    let secret = std::env::var("ADMIN_SECRET").unwrap_or_default();
    Ok(json!(authorize(&event.payload, &secret)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use articlehub::auth::session_token;

    const SECRET: &str = "authz-secret";

    #[test]
    fn cookie_array_is_accepted() {
        let tok = session_token(SECRET).unwrap();
        let evt = json!({ "cookies": [format!("{SESSION_COOKIE}={tok}")] });
        assert!(authorize(&evt, SECRET).ok);
    }

    #[test]
    fn cookie_header_is_accepted() {
        let tok = session_token(SECRET).unwrap();
        let evt = json!({ "headers": { "cookie": format!("a=b; {SESSION_COOKIE}={tok}") } });
        assert!(authorize(&evt, SECRET).ok);
    }

    #[test]
    fn bearer_is_accepted() {
        let evt = json!({ "headers": { "authorization": format!("Bearer {SECRET}") } });
        let out = authorize(&evt, SECRET);
        assert!(out.ok);
        assert_eq!(out.context.unwrap()["source"], "bearer");
    }

    #[test]
    fn anonymous_and_locked_are_denied() {
        assert!(!authorize(&json!({}), SECRET).ok);
        let evt = json!({ "headers": { "authorization": "Bearer " } });
        assert!(!authorize(&evt, "").ok);
    }
}
