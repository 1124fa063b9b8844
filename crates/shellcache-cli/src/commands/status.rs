use anyhow::Result;
use shellcache_core::utils::{format_age, format_bytes, truncate_string};
use shellcache_core::CacheStorage;
use tracing::warn;

use super::Context;

/// Maximum width of a cache key in listings
const KEY_DISPLAY_WIDTH: usize = 72;

pub async fn show(ctx: &Context) -> Result<()> {
    let reg = &ctx.registration.data;
    println!("Scope:      {}", reg.scope);
    println!("Configured: {}", ctx.version());
    println!(
        "Installed:  {}",
        describe(reg.installed_version.as_deref(), reg.installed_at)
    );
    println!(
        "Active:     {}",
        describe(reg.active_version.as_deref(), reg.activated_at)
    );
    println!("Storage:    {}", ctx.storage.root().display());
    println!();

    let names = ctx.storage.keys().await?;
    if names.is_empty() {
        println!("No caches");
        return Ok(());
    }

    for name in names {
        let marker = if name == ctx.version() { "*" } else { " " };
        let entries = match ctx.storage.entries(&name).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(cache = %name, error = %e, "Failed to read cache entries");
                println!("{} {} (unreadable: {})", marker, name, e);
                continue;
            }
        };
        let total: usize = entries.iter().map(|e| e.size).sum();
        println!(
            "{} {} ({} entries, {})",
            marker,
            name,
            entries.len(),
            format_bytes(total)
        );
        for entry in entries {
            println!(
                "    {:<width$} {:>3} {:>10} {}",
                truncate_string(&entry.key, KEY_DISPLAY_WIDTH),
                entry.status,
                format_bytes(entry.size),
                entry.age_display(),
                width = KEY_DISPLAY_WIDTH
            );
        }
    }
    Ok(())
}

pub async fn clear(ctx: &mut Context) -> Result<()> {
    for name in ctx.storage.keys().await? {
        if ctx.storage.delete(&name).await? {
            println!("deleted {}", name);
        }
    }
    ctx.registration.clear()?;
    println!("Registration cleared");
    Ok(())
}

fn describe(version: Option<&str>, at: Option<chrono::DateTime<chrono::Utc>>) -> String {
    match (version, at) {
        (Some(v), Some(at)) => {
            let minutes = (chrono::Utc::now() - at).num_minutes();
            format!("{} ({})", v, format_age(minutes))
        }
        (Some(v), None) => v.to_string(),
        (None, _) => "none".to_string(),
    }
}
