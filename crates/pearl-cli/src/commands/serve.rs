use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use pearl_config::{ConfigLoader, PearlConfig};
use pearl_runtime::PearlRuntime;
use pearl_server::AppState;

/// How often the serve loop checks the watched config for changes.
const RELOAD_POLL: Duration = Duration::from_secs(2);

pub(super) async fn cmd_serve(
    mut config: PearlConfig,
    listen: Option<String>,
    config_loader: ConfigLoader,
) -> pearl_core::Result<()> {
    if let Some(listen) = listen {
        config.server.listen = listen;
    }

    println!("🦪 Pearl v{}", env!("CARGO_PKG_VERSION"));
    println!("   Model: {} ({})", config.reasoning.model, config.reasoning.provider);
    println!("   Embeddings: {}", config.embedding.provider);
    println!("   Memory: {}", config.memory.backend);
    println!("   Config: {}", config_loader.path().display());

    // Kept alive for the lifetime of the server
    let _watcher = match config_loader.watch() {
        Ok(w) => {
            println!("   Config hot-reload: enabled");
            Some(w)
        }
        Err(e) => {
            warn!(error = %e, "config hot-reload disabled");
            None
        }
    };
    println!();

    let runtime = Arc::new(PearlRuntime::from_config(&config)?);
    let stats = runtime.stats()?;
    if stats.triage_pearls == 0 {
        eprintln!("⚠️  Triage memory is empty. Run `pearl seed` to load the built-in rules.");
    }

    let state = AppState::new(runtime);
    tokio::spawn(watch_for_reload(config_loader, config.clone(), state.clone()));

    pearl_server::start_server(&config.server, state).await
}

/// Rebuild the runtime whenever the hot-reloaded config changes. The store
/// and providers are kept; only tuning (limits, retry, sampling, learning
/// rates) takes effect without a restart.
async fn watch_for_reload(loader: ConfigLoader, initial: PearlConfig, state: Arc<AppState>) {
    let mut current = fingerprint(&initial);
    let mut ticker = tokio::time::interval(RELOAD_POLL);
    loop {
        ticker.tick().await;
        let next = loader.get();
        let print = fingerprint(&next);
        if print == current {
            continue;
        }
        current = print;

        if next.memory.backend != initial.memory.backend
            || next.reasoning.provider != initial.reasoning.provider
            || next.embedding.provider != initial.embedding.provider
        {
            warn!("backend or provider changes need a restart, applying the rest");
        }
        let rebuilt = state.runtime().await.reconfigured(&next);
        state.replace_runtime(Arc::new(rebuilt)).await;
        info!("runtime rebuilt from reloaded config");
    }
}

fn fingerprint(config: &PearlConfig) -> String {
    serde_json::to_string(config).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_tracks_tuning_changes() {
        let a = PearlConfig::default();
        let mut b = a.clone();
        assert_eq!(fingerprint(&a), fingerprint(&b));
        b.memory.rule_top_k += 1;
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }
}
