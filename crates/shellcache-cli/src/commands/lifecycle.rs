use anyhow::{bail, Result};
use shellcache_core::worker::{ActivateReport, InstallReport};
use shellcache_core::{
    CacheStorage, CacheWorker, Fetcher, HttpFetcher, OfflineFetcher, WorkerState,
};

use super::Context;

pub async fn install(ctx: &mut Context) -> Result<()> {
    let fetcher = HttpFetcher::with_timeout(ctx.settings.origin.clone(), ctx.config.request_timeout())?;
    let worker = CacheWorker::new(ctx.settings.clone(), fetcher, ctx.storage.clone());

    let report = worker.install().await?;
    record_install(ctx, &report)?;
    print_install(&report);
    Ok(())
}

pub async fn activate(ctx: &mut Context) -> Result<()> {
    match ctx.registration.state_for(ctx.version()) {
        WorkerState::Installed => {}
        WorkerState::Activated => {
            println!("{} is already active", ctx.version());
            return Ok(());
        }
        _ => bail!("{} is not installed; run `shellcache install` first", ctx.version()),
    }

    // Activation only touches the cache stores
    let worker = CacheWorker::resume(
        ctx.settings.clone(),
        OfflineFetcher,
        ctx.storage.clone(),
        WorkerState::Installed,
    );
    let report = worker.activate().await?;
    record_activate(ctx, &report)?;
    print_activate(&report);
    Ok(())
}

/// Bring the worker to `Activated`, running whichever lifecycle steps the
/// registration says are still missing for the configured version.
pub async fn ensure_active<F: Fetcher, S: CacheStorage>(
    ctx: &mut Context,
    worker: &CacheWorker<F, S>,
) -> Result<()> {
    let state = worker.state().await;
    if state == WorkerState::Parsed {
        let report = worker.install().await?;
        record_install(ctx, &report)?;
        print_install(&report);
    }
    if worker.state().await == WorkerState::Installed {
        let report = worker.activate().await?;
        record_activate(ctx, &report)?;
        print_activate(&report);
    }
    Ok(())
}

fn record_install(ctx: &mut Context, report: &InstallReport) -> Result<()> {
    ctx.registration.mark_installed(&report.cache_name);
    ctx.registration.save()
}

fn record_activate(ctx: &mut Context, report: &ActivateReport) -> Result<()> {
    ctx.registration.mark_activated(&report.current);
    ctx.registration.save()
}

fn print_install(report: &InstallReport) {
    if !report.store_available {
        eprintln!("Warning: cache {} could not be opened; nothing pre-cached", report.cache_name);
    }
    println!(
        "Installed {}: {} cached, {} failed",
        report.cache_name,
        report.cached.len(),
        report.failed.len()
    );
    for failure in &report.failed {
        println!("  ✗ {} ({})", failure.url, failure.reason);
    }
}

fn print_activate(report: &ActivateReport) {
    println!("Activated {}", report.current);
    for name in &report.deleted {
        println!("  deleted {}", name);
    }
}
