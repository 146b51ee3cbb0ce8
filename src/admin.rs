use lambda_http::http::header::{HeaderValue, LOCATION, SET_COOKIE};
use lambda_http::{Body, Error, Request, Response};
use serde_json::json;

use crate::{
    auth::{cleared_session_cookie, session_cookie, session_token, verify_password},
    handler::Ctx,
    model::{CreateError, CreateReq, CreateResp, LinkRecord, ListedLink},
    require_admin_or_return,
    util::{json_err, resp_json, respond},
};

const MAX_ID_ATTEMPTS: u32 = 6;

fn body_bytes(req: &Request) -> Vec<u8> {
    match req.body() {
        Body::Text(s) => s.as_bytes().to_vec(),
        Body::Binary(b) => b.clone(),
        _ => Vec::new(),
    }
}

pub(crate) async fn login(req: Request, ctx: &Ctx) -> Result<Response<Body>, Error> {
    let body = body_bytes(&req);
    let password = url::form_urlencoded::parse(&body)
        .find(|(k, _)| k == "password")
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default();

    if !verify_password(&password, &ctx.cfg.admin_secret) {
        tracing::info!("admin login rejected");
        return Ok(json_err(401, "unauthorized", "Invalid password"));
    }
    let Some(token) = session_token(&ctx.cfg.admin_secret) else {
        return Ok(json_err(401, "unauthorized", "Admin console is locked"));
    };

    let mut resp = respond(303, "text/plain", Body::Empty);
    let headers = resp.headers_mut();
    headers.append(SET_COOKIE, HeaderValue::from_str(&session_cookie(&token))?);
    headers.insert(LOCATION, HeaderValue::from_static("/admin/"));
    tracing::info!("admin session issued");
    Ok(resp)
}

pub(crate) async fn logout(_req: Request, _ctx: &Ctx) -> Result<Response<Body>, Error> {
    let mut resp = respond(204, "text/plain", Body::Empty);
    resp.headers_mut()
        .append(SET_COOKIE, HeaderValue::from_str(&cleared_session_cookie())?);
    Ok(resp)
}

pub(crate) async fn create_link(req: Request, ctx: &Ctx) -> Result<Response<Body>, Error> {
    require_admin_or_return!(req, &ctx.cfg.admin_secret);

    let payload: CreateReq = match serde_json::from_slice(&body_bytes(&req)) {
        Ok(p) => p,
        Err(_) => return Ok(json_err(400, "bad_json", "Expected {targetUrl, title}")),
    };

    for attempt in 1..=MAX_ID_ATTEMPTS {
        let record = match LinkRecord::create(&payload, attempt) {
            Ok(r) => r,
            Err(e @ CreateError::InvalidDestinationUrl) => {
                return Ok(json_err(400, "invalid_target", e.to_string()))
            }
            Err(e @ CreateError::EmptyTitle) => {
                return Ok(json_err(400, "invalid_title", e.to_string()))
            }
        };

        match ctx.store.persist(&record).await {
            Ok(Some(persisted)) => {
                tracing::info!(id = %record.id, slug = %record.slug, ?persisted, "link created");
                let out = CreateResp {
                    links: record.share_links(&ctx.cfg.public_base),
                    record,
                    persisted,
                };
                return Ok(resp_json(201, serde_json::to_value(out)?));
            }
            Ok(None) => continue,
            Err(e) => {
                tracing::error!(error = %e, "link create failed");
                return Ok(json_err(500, "store", e.to_string()));
            }
        }
    }
    Ok(json_err(500, "exhausted_attempts", "Could not allocate a unique id"))
}

pub(crate) async fn list_links(req: Request, ctx: &Ctx) -> Result<Response<Body>, Error> {
    require_admin_or_return!(req, &ctx.cfg.admin_secret);

    let items: Vec<ListedLink> = ctx
        .store
        .list()
        .await
        .into_iter()
        .map(|record| ListedLink {
            links: record.share_links(&ctx.cfg.public_base),
            record,
        })
        .collect();
    Ok(resp_json(200, json!({ "count": items.len(), "items": items })))
}

pub(crate) async fn delete_link(req: Request, ctx: &Ctx) -> Result<Response<Body>, Error> {
    require_admin_or_return!(req, &ctx.cfg.admin_secret);

    let raw = req.uri().path().trim_start_matches("/v1/links/");
    let id = urlencoding::decode(raw)
        .map(|c| c.into_owned())
        .unwrap_or_else(|_| raw.to_string());
    if id.is_empty() {
        return Ok(json_err(400, "missing_id", "Missing record id"));
    }

    match ctx.store.remove(&id).await {
        Ok(true) => {
            tracing::info!(id = %id, "link deleted");
            Ok(respond(204, "text/plain", Body::Empty))
        }
        Ok(false) => Ok(json_err(404, "not_found", "Record not found")),
        Err(e) => {
            tracing::error!(error = %e, id = %id, "link delete failed");
            Ok(json_err(503, "store", e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::auth::SESSION_COOKIE;
    use crate::handler::router;
    use crate::handler::tests::{ctx_with, get, text, SECRET};
    use crate::resolver::{resolve, Location};
    use crate::store::tests::record;
    use lambda_http::http;
    use lambda_http::{Body, Request};

    fn post_json(uri: &str, body: &str, bearer: Option<&str>) -> Request {
        let mut b = http::Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(pw) = bearer {
            b = b.header("Authorization", format!("Bearer {pw}"));
        }
        b.body(Body::from(body.to_string())).unwrap()
    }

    fn authed(method: &str, uri: &str) -> Request {
        http::Request::builder()
            .method(method)
            .uri(uri)
            .header("Authorization", format!("Bearer {SECRET}"))
            .body(Body::Empty)
            .unwrap()
    }

    fn json(resp: &lambda_http::Response<Body>) -> serde_json::Value {
        serde_json::from_str(&text(resp)).unwrap()
    }

    #[tokio::test]
    async fn create_then_resolve_every_share_link() {
        let ctx = ctx_with(vec![]);
        let req = post_json(
            "/v1/links",
            r#"{"targetUrl":"https://example.com/x","title":"Modern Business Strategy"}"#,
            Some(SECRET),
        );
        let resp = router(req, &ctx).await.unwrap();
        assert_eq!(resp.status().as_u16(), 201);
        let v = json(&resp);
        assert_eq!(v["record"]["slug"], "modern-business-strategy");
        assert_eq!(v["persisted"], "remote");

        let id = v["record"]["id"].as_str().unwrap().to_string();
        for scheme in ["path", "hash", "query"] {
            let link = v["links"][scheme].as_str().unwrap();
            let got = resolve(ctx.store.as_ref(), &Location::parse(link).unwrap())
                .await
                .unwrap();
            assert_eq!(got.record.id, id, "{scheme}");
            assert_eq!(got.record.target_url, "https://example.com/x");
        }
    }

    #[tokio::test]
    async fn create_rejects_invalid_target_and_title() {
        let ctx = ctx_with(vec![]);
        let bad_url = post_json(
            "/v1/links",
            r#"{"targetUrl":"not a url","title":"T"}"#,
            Some(SECRET),
        );
        let resp = router(bad_url, &ctx).await.unwrap();
        assert_eq!(resp.status().as_u16(), 400);
        assert_eq!(json(&resp)["error"], "invalid_target");

        let bad_title = post_json(
            "/v1/links",
            r#"{"targetUrl":"https://e.com","title":"  "}"#,
            Some(SECRET),
        );
        let resp = router(bad_title, &ctx).await.unwrap();
        assert_eq!(json(&resp)["error"], "invalid_title");

        let garbage = post_json("/v1/links", "{", Some(SECRET));
        let resp = router(garbage, &ctx).await.unwrap();
        assert_eq!(json(&resp)["error"], "bad_json");

        assert_eq!(ctx.store.cache().len().await, 0);
    }

    #[tokio::test]
    async fn admin_routes_require_a_session() {
        let ctx = ctx_with(vec![record("a", "A", "https://a", "2024-01-01T00:00:00Z")]);
        let create = post_json(
            "/v1/links",
            r#"{"targetUrl":"https://e.com","title":"T"}"#,
            Some("wrong"),
        );
        assert_eq!(router(create, &ctx).await.unwrap().status().as_u16(), 401);
        assert_eq!(router(get("/v1/links"), &ctx).await.unwrap().status().as_u16(), 401);
        let del = http::Request::builder()
            .method("DELETE")
            .uri("/v1/links/a")
            .body(Body::Empty)
            .unwrap();
        assert_eq!(router(del, &ctx).await.unwrap().status().as_u16(), 401);
    }

    #[tokio::test]
    async fn login_sets_cookie_that_unlocks_admin_api() {
        let ctx = ctx_with(vec![record("a", "A", "https://a", "2024-01-01T00:00:00Z")]);
        let bad = http::Request::builder()
            .method("POST")
            .uri("/admin/login")
            .body(Body::from("password=nope".to_string()))
            .unwrap();
        assert_eq!(router(bad, &ctx).await.unwrap().status().as_u16(), 401);

        let good = http::Request::builder()
            .method("POST")
            .uri("/admin/login")
            .body(Body::from(format!("password={SECRET}")))
            .unwrap();
        let resp = router(good, &ctx).await.unwrap();
        assert_eq!(resp.status().as_u16(), 303);
        let set_cookie = resp.headers()["set-cookie"].to_str().unwrap();
        let pair = set_cookie.split(';').next().unwrap().to_string();
        assert!(pair.starts_with(&format!("{SESSION_COOKIE}=")));

        let list = http::Request::builder()
            .method("GET")
            .uri("/v1/links")
            .header("Cookie", pair)
            .body(Body::Empty)
            .unwrap();
        let resp = router(list, &ctx).await.unwrap();
        assert_eq!(resp.status().as_u16(), 200);
        let v = json(&resp);
        assert_eq!(v["count"], 1);
        assert_eq!(v["items"][0]["id"], "a");
        assert_eq!(v["items"][0]["links"]["path"], "https://articlehub.test/out/a/a");
    }

    #[tokio::test]
    async fn logout_clears_cookie() {
        let ctx = ctx_with(vec![]);
        let resp = router(authed("POST", "/admin/logout"), &ctx).await.unwrap();
        assert_eq!(resp.status().as_u16(), 204);
        assert!(resp.headers()["set-cookie"]
            .to_str()
            .unwrap()
            .contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn delete_removes_record() {
        let ctx = ctx_with(vec![record("gone", "Gone", "https://g", "2024-01-01T00:00:00Z")]);
        let resp = router(authed("DELETE", "/v1/links/gone"), &ctx).await.unwrap();
        assert_eq!(resp.status().as_u16(), 204);
        let again = router(authed("DELETE", "/v1/links/gone"), &ctx).await.unwrap();
        assert_eq!(again.status().as_u16(), 404);
        let page = router(get("/out/gone/gone"), &ctx).await.unwrap();
        assert_eq!(page.status().as_u16(), 404);
    }
}
