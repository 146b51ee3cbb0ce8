use aws_config::BehaviorVersion;
use aws_sdk_dynamodb as ddb;
use lambda_http::{Body, Error, Request, Response};
use serde_json::json;
use std::sync::Arc;

use crate::{
    admin,
    config::Config,
    resolver::{self, Location, ResolveError},
    store::{CachedStore, DynamoStore, RecordStore},
    synth::{hash_loader_document, not_found_document, synthesize, FillerSource, TopicFiller, GATE_JS},
    util::{respond, resp_html, resp_json, with_cache},
};

pub type SharedStore = Arc<CachedStore<Arc<dyn RecordStore>>>;

#[derive(Clone)]
pub struct Ctx {
    pub store: SharedStore,
    pub filler: Arc<dyn FillerSource>,
    pub cfg: Arc<Config>,
}

impl Ctx {
    pub async fn new(cfg: Config) -> Self {
        let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        let ddb = ddb::Client::new(&config);
        let remote = DynamoStore::new(ddb, cfg.table.clone());
        Self::with_store(cfg, remote)
    }

    pub fn with_store(cfg: Config, remote: impl RecordStore) -> Self {
        let remote: Arc<dyn RecordStore> = Arc::new(remote);
        Self {
            store: Arc::new(CachedStore::new(remote)),
            filler: Arc::new(TopicFiller),
            cfg: Arc::new(cfg),
        }
    }
}

pub async fn router(req: Request, ctx: &Ctx) -> Result<Response<Body>, Error> {
    let method = req.method().as_str().to_string();
    let path = req.uri().path().to_string();

    match (method.as_str(), path.as_str()) {
        ("GET", "/js/gate.js") => Ok(with_cache(
            respond(200, "application/javascript", Body::Text(GATE_JS.to_string())),
            "public, max-age=3600",
        )),
        ("GET", "/v1/health") => health(ctx).await,
        ("POST", "/admin/login") => admin::login(req, ctx).await,
        ("POST", "/admin/logout") => admin::logout(req, ctx).await,
        ("POST", "/v1/links") => admin::create_link(req, ctx).await,
        ("GET", "/v1/links") => admin::list_links(req, ctx).await,
        ("DELETE", p) if p.starts_with("/v1/links/") => admin::delete_link(req, ctx).await,
        ("GET", "/article.html") => article(req, ctx).await,
        ("GET", p) if p.contains("/out/") => article(req, ctx).await,
        _ => Ok(not_found()),
    }
}

fn not_found() -> Response<Body> {
    resp_html(404, not_found_document())
}

async fn article(req: Request, ctx: &Ctx) -> Result<Response<Body>, Error> {
    let loc = Location::from_uri(req.uri());
    if loc.path == "/article.html" && resolver::extract(&loc).is_none() {
        return Ok(resp_html(200, hash_loader_document()));
    }

    match resolver::resolve(ctx.store.as_ref(), &loc).await {
        Ok(resolved) => {
            let doc = synthesize(&resolved.record, ctx.filler.as_ref(), ctx.cfg.gate);
            let cache = match ctx.cfg.cache_max_age {
                0 => "no-store".to_string(),
                n => format!("public, max-age={n}"),
            };
            Ok(with_cache(resp_html(200, doc.to_html()), &cache))
        }
        Err(ResolveError::NotFound) => Ok(not_found()),
    }
}

async fn health(ctx: &Ctx) -> Result<Response<Body>, Error> {
    let ok = ctx.store.healthy().await;
    if !ok {
        tracing::warn!("record store unreachable; serving from local cache");
    }
    Ok(resp_json(if ok { 200 } else { 503 }, json!({ "ok": ok })))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::gate::tests::{FakeSurface, BOTTOM};
    use crate::gate::{GateMachine, GateState, Phase, COUNTDOWN_START};
    use crate::store::tests::record;
    use crate::store::MemoryStore;
    use crate::synth::STATE_SLOT_ID;
    use lambda_http::http;

    pub(crate) const SECRET: &str = "let-me-in";

    pub(crate) fn ctx_with(records: Vec<crate::model::LinkRecord>) -> Ctx {
        Ctx::with_store(Config::local(SECRET), MemoryStore::with_records(records))
    }

    pub(crate) fn get(uri: &str) -> Request {
        http::Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::Empty)
            .unwrap()
    }

    pub(crate) fn text(resp: &Response<Body>) -> String {
        match resp.body() {
            Body::Text(s) => s.clone(),
            Body::Binary(b) => String::from_utf8(b.clone()).unwrap(),
            _ => String::new(),
        }
    }

    fn page_state(html: &str) -> serde_json::Value {
        let open = format!(r#"id="{STATE_SLOT_ID}">"#);
        let start = html.find(&open).unwrap() + open.len();
        let end = start + html[start..].find("</script>").unwrap();
        serde_json::from_str(&html[start..end]).unwrap()
    }

    fn run_gate(dest: &str) -> GateMachine<FakeSurface> {
        let mut m = GateMachine::attach(
            Default::default(),
            GateState::new(Some(dest.to_string())),
            FakeSurface::default(),
        );
        for _ in 0..=COUNTDOWN_START {
            m.tick();
        }
        m.click_affordance();
        m.on_scroll(BOTTOM);
        m.on_frame();
        m
    }

    #[tokio::test]
    async fn path_link_serves_article_and_gate_opens_destination() {
        let rec = record("a1b2c3", "Modern Business Strategy", "https://example.com/x", "2024-01-01T00:00:00Z");
        let ctx = ctx_with(vec![rec]);

        let resp = router(get("/out/a1b2c3/modern-business-strategy"), &ctx).await.unwrap();
        assert_eq!(resp.status().as_u16(), 200);
        let html = text(&resp);
        assert!(html.contains("<title>Modern Business Strategy - ArticleHub</title>"));

        let state = page_state(&html);
        let dest = state["destinationUrl"].as_str().unwrap();
        let mut m = run_gate(dest);
        assert_eq!(m.phase(), Phase::Unlocked);
        assert_eq!(m.click_continue(), Some("https://example.com/x"));
        assert_eq!(m.surface().opened, vec!["https://example.com/x"]);
    }

    #[tokio::test]
    async fn query_link_serves_the_same_record() {
        let rec = record("q1", "Health Tips", "https://example.com/h", "2024-01-01T00:00:00Z");
        let ctx = ctx_with(vec![rec]);
        let resp = router(get("/article.html?id=q1&slug=health-tips"), &ctx).await.unwrap();
        assert_eq!(resp.status().as_u16(), 200);
        assert_eq!(page_state(&text(&resp))["destinationUrl"], "https://example.com/h");
    }

    #[tokio::test]
    async fn bare_article_page_is_the_hash_loader() {
        let ctx = ctx_with(vec![]);
        let resp = router(get("/article.html"), &ctx).await.unwrap();
        assert_eq!(resp.status().as_u16(), 200);
        let html = text(&resp);
        assert!(html.contains("window.location.hash"));
        assert!(!html.contains(STATE_SLOT_ID));
    }

    #[tokio::test]
    async fn unknown_id_renders_fixed_404() {
        let ctx = ctx_with(vec![]);
        let resp = router(get("/out/nope/some-slug"), &ctx).await.unwrap();
        assert_eq!(resp.status().as_u16(), 404);
        let html = text(&resp);
        assert_eq!(html, not_found_document());
        assert!(!html.contains("gate.js"));
    }

    #[tokio::test]
    async fn empty_target_unlocks_but_never_navigates() {
        let rec = record("e1", "Empty", "", "2024-01-01T00:00:00Z");
        let ctx = ctx_with(vec![rec]);
        let resp = router(get("/out/e1/empty"), &ctx).await.unwrap();
        assert_eq!(resp.status().as_u16(), 200);
        let dest = page_state(&text(&resp))["destinationUrl"]
            .as_str()
            .unwrap()
            .to_string();
        let mut m = run_gate(&dest);
        assert_eq!(m.phase(), Phase::Unlocked);
        assert!(m.click_continue().is_none());
        assert!(m.surface().opened.is_empty());
    }

    #[tokio::test]
    async fn gate_script_and_health() {
        let ctx = ctx_with(vec![]);
        let js = router(get("/js/gate.js"), &ctx).await.unwrap();
        assert_eq!(js.status().as_u16(), 200);
        assert!(text(&js).contains("article-state"));

        let health = router(get("/v1/health"), &ctx).await.unwrap();
        assert_eq!(health.status().as_u16(), 200);
    }

    #[tokio::test]
    async fn unknown_routes_are_404() {
        let ctx = ctx_with(vec![]);
        let resp = router(get("/nothing-here"), &ctx).await.unwrap();
        assert_eq!(resp.status().as_u16(), 404);
    }
}
