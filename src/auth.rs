use chrono::Utc;
use hmac::{Hmac, Mac};
use lambda_http::Error;
use lambda_http::Request;
use rand::RngCore;
use sha2::Sha256;
use std::io::{Error as IoError, ErrorKind};

use crate::util::{b64u, b64u_to_bytes};

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE: &str = "ah_admin";
const SESSION_CONTEXT: &[u8] = b"articlehub-admin-session";

fn mac(secret: &str) -> Option<HmacSha256> {
    if secret.is_empty() {
        return None;
    }
    HmacSha256::new_from_slice(secret.as_bytes()).ok()
}

/// Constant-time comparison of a submitted password against the shared secret.
/// An empty secret never matches anything.
pub fn verify_password(candidate: &str, secret: &str) -> bool {
    let (Some(mut expected), Some(mut given)) = (mac(secret), mac(secret)) else {
        return false;
    };
    expected.update(secret.as_bytes());
    given.update(candidate.as_bytes());
    given.verify_slice(&expected.finalize().into_bytes()).is_ok()
}

/// Session lifetime, shared by the cookie Max-Age and server-side verification.
pub const SESSION_MAX_AGE: i64 = 43200;
// tolerated clock drift for tokens minted by another instance
const SESSION_SKEW: i64 = 60;

fn session_mac(secret: &str, payload: &str) -> Option<HmacSha256> {
    let mut m = mac(secret)?;
    m.update(SESSION_CONTEXT);
    m.update(payload.as_bytes());
    Some(m)
}

/// Cookie value `<issued_at>.<nonce>.<sig>`. Rotating the secret logs everyone out.
pub fn session_token(secret: &str) -> Option<String> {
    session_token_at(secret, Utc::now().timestamp())
}

pub fn session_token_at(secret: &str, issued_at: i64) -> Option<String> {
    let mut nonce = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut nonce);
    let payload = format!("{issued_at}.{}", b64u(&nonce));
    let sig = session_mac(secret, &payload)?.finalize().into_bytes();
    Some(format!("{payload}.{}", b64u(&sig)))
}

pub fn verify_session(token: &str, secret: &str) -> bool {
    verify_session_at(token, secret, Utc::now().timestamp())
}

pub fn verify_session_at(token: &str, secret: &str, now: i64) -> bool {
    let Some((payload, sig_b64)) = token.rsplit_once('.') else {
        tracing::info!("session token parts missing");
        return false;
    };
    let Some(issued_at) = payload
        .split_once('.')
        .and_then(|(iat, _)| iat.parse::<i64>().ok())
    else {
        tracing::info!("session token issued-at unreadable");
        return false;
    };
    let Some(sig) = b64u_to_bytes(sig_b64) else {
        tracing::info!("session token base64 decode failed");
        return false;
    };
    let Some(m) = session_mac(secret, payload) else {
        return false;
    };
    if m.verify_slice(&sig).is_err() {
        return false;
    }
    if issued_at > now + SESSION_SKEW {
        tracing::info!(issued_at, now, "session token issued in the future");
        return false;
    }
    if now - issued_at > SESSION_MAX_AGE {
        tracing::info!(issued_at, now, "session token expired");
        return false;
    }
    true
}

pub fn session_cookie(token: &str) -> String {
    format!(
        "{SESSION_COOKIE}={token}; Path=/; Max-Age={SESSION_MAX_AGE}; HttpOnly; Secure; SameSite=Strict"
    )
}

pub fn cleared_session_cookie() -> String {
    format!("{SESSION_COOKIE}=deleted; Path=/; Max-Age=0; HttpOnly; Secure; SameSite=Strict")
}

/// Scan all Cookie headers (there can be multiple) and parse a single cookie by name.
pub fn cookie(req: &Request, name: &str) -> Option<String> {
    let mut out: Option<String> = None;
    for val in req.headers().get_all("Cookie").iter() {
        if let Ok(s) = val.to_str() {
            for part in s.split(';') {
                let kv = part.trim();
                if let Some((k, v)) = kv.split_once('=') {
                    if k == name {
                        out = Some(v.to_string());
                    }
                }
            }
        }
    }
    out
}

pub fn err_unauthorized(msg: &str) -> Error {
    IoError::new(ErrorKind::PermissionDenied, msg.to_owned()).into()
}

/// Admin check: session cookie first, then `Authorization: Bearer <secret>` for scripts.
pub fn is_admin(req: &Request, secret: &str) -> bool {
    if let Some(tok) = cookie(req, SESSION_COOKIE) {
        if verify_session(&tok, secret) {
            return true;
        }
        tracing::info!("admin cookie present but invalid");
    }
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|pw| verify_password(pw, secret))
        .unwrap_or(false)
}

pub fn require_admin(req: &Request, secret: &str) -> Result<(), Error> {
    if is_admin(req, secret) {
        Ok(())
    } else {
        Err(err_unauthorized("Unauthorized"))
    }
}

#[macro_export]
macro_rules! require_admin_or_return {
    ($req:expr, $secret:expr) => {
        if $crate::auth::require_admin(&$req, $secret).is_err() {
            return Ok($crate::util::json_err(
                401,
                "unauthorized",
                "Requires admin session",
            ));
        }
    };
}
