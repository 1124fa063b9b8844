use std::path::PathBuf;

use anyhow::{bail, Context as _, Result};
use shellcache_core::utils::format_bytes;
use shellcache_core::{
    CacheStorage, CacheWorker, Fetcher, Handled, HttpFetcher, Method, OfflineFetcher, Request,
    RequestMode, Response, WorkerError,
};
use tracing::debug;

use super::lifecycle::ensure_active;
use super::Context;

pub struct FetchArgs {
    pub urls: Vec<String>,
    pub mode: RequestMode,
    pub method: String,
    pub output: Option<PathBuf>,
}

pub async fn run(ctx: &mut Context, args: FetchArgs, offline: bool) -> Result<()> {
    if args.output.is_some() && args.urls.len() > 1 {
        bail!("--output can only be used with a single URL");
    }

    if offline {
        route_all(ctx, OfflineFetcher, args).await
    } else {
        let fetcher =
            HttpFetcher::with_timeout(ctx.settings.origin.clone(), ctx.config.request_timeout())?;
        route_all(ctx, fetcher, args).await
    }
}

async fn route_all<F: Fetcher>(ctx: &mut Context, fetcher: F, args: FetchArgs) -> Result<()> {
    let method = Method::from_bytes(args.method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("Invalid HTTP method: {}", args.method))?;

    let state = ctx.registration.state_for(ctx.version());
    debug!(state = %state, "Resuming worker");
    let worker = CacheWorker::resume(ctx.settings.clone(), fetcher, ctx.storage.clone(), state);
    ensure_active(ctx, &worker).await?;

    for raw in &args.urls {
        let url = ctx
            .settings
            .origin
            .join(raw)
            .with_context(|| format!("Invalid URL: {}", raw))?;
        let request = Request::new(method.clone(), url, args.mode);

        match respond(&worker, &request).await {
            Ok((source, response)) => {
                print_outcome(&request, source, response.as_ref());
                if let (Some(path), Some(response)) = (&args.output, response) {
                    std::fs::write(path, response.into_body())
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                }
            }
            Err(e) => println!("{} -> failed: {}", request.url, e),
        }
    }

    let written = worker.flush().await;
    debug!(written, "Background cache writes finished");
    Ok(())
}

/// Run one request through the worker. Requests the worker leaves alone go
/// straight to the network, as they would from an uncontrolled page.
async fn respond<F: Fetcher, S: CacheStorage>(
    worker: &CacheWorker<F, S>,
    request: &Request,
) -> Result<(&'static str, Option<Response>), WorkerError> {
    let handled = worker.handle(request).await?;
    let source = handled.source();
    match handled {
        Handled::PassThrough => Ok((source, Some(worker.pass_through(request).await?))),
        other => Ok((source, other.into_response())),
    }
}

fn print_outcome(request: &Request, source: &str, response: Option<&Response>) {
    match response {
        Some(response) => println!(
            "{} -> {} {} ({}, {})",
            request.url,
            source,
            response.status,
            response.kind.as_str(),
            format_bytes(response.body().len())
        ),
        None => println!("{} -> {}", request.url, source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use shellcache_core::{
        FetchError, MemoryCacheStorage, ResponseKind, Url, WorkerSettings, WorkerState,
    };

    #[derive(Default)]
    struct CountingFetcher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Fetcher for CountingFetcher {
        async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Response::new(
                request.url.clone(),
                201,
                ResponseKind::Basic,
                vec![],
                b"created".to_vec(),
            ))
        }
    }

    fn worker(state: WorkerState) -> CacheWorker<CountingFetcher, MemoryCacheStorage> {
        let settings = WorkerSettings {
            cache_name: "app-cache-v1".to_string(),
            origin: Url::parse("https://kedai.example/").expect("origin"),
            precache: vec![],
        };
        CacheWorker::resume(
            settings,
            CountingFetcher::default(),
            Arc::new(MemoryCacheStorage::new()),
            state,
        )
    }

    fn post() -> Request {
        Request::new(
            Method::POST,
            Url::parse("https://kedai.example/orders").expect("url"),
            RequestMode::SameOrigin,
        )
    }

    #[tokio::test]
    async fn test_post_reaches_network_once_and_skips_cache() {
        let worker = worker(WorkerState::Activated);

        let (source, response) = respond(&worker, &post()).await.expect("respond");
        assert_eq!(source, "pass-through");
        assert_eq!(response.map(|r| r.into_body()), Some(b"created".to_vec()));
        assert_eq!(worker.fetcher().calls.load(Ordering::SeqCst), 1);
        assert_eq!(worker.flush().await, 0);
        assert!(worker.storage().keys().await.expect("keys").is_empty());
    }

    #[tokio::test]
    async fn test_uncontrolled_get_still_fetched() {
        let worker = worker(WorkerState::Installed);
        let get = Request::get(Url::parse("https://kedai.example/vite.svg").expect("url"));

        let (source, response) = respond(&worker, &get).await.expect("respond");
        assert_eq!(source, "pass-through");
        assert_eq!(response.map(|r| r.status), Some(201));
        assert_eq!(worker.fetcher().calls.load(Ordering::SeqCst), 1);
        assert!(worker.storage().keys().await.expect("keys").is_empty());
    }
}
