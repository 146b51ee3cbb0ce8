use articlehub::config::Config;
use articlehub::handler::{self, Ctx};
use lambda_http::{run, service_fn, Error, Request};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .without_time()
        .init();

    let cfg = Config::from_env()?;
    let ctx = Ctx::new(cfg).await;
    if !ctx.store.healthy().await {
        tracing::warn!("record store unreachable at startup; using local cache");
    }

    // Clone once for the service closure; Ctx is a bundle of Arcs
    let ctx_for_service = ctx.clone();

    run(service_fn(move |req: Request| {
        let ctx = ctx_for_service.clone();
        async move { handler::router(req, &ctx).await }
    }))
    .await
}
