use anyhow::{Context, Result};
use nowcast_core::AllowList;
use nowcast_watch::{platform, Watcher};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // stdout carries the protocol; every diagnostic goes to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("nowcast_watch=info")),
        )
        .init();

    std::panic::set_hook(Box::new(|info| {
        error!("unhandled fault: {info}");
        std::process::exit(1);
    }));

    if let Err(e) = run().await {
        error!("{e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let policy = AllowList::from_env();
    let registry = platform::open_registry()
        .await
        .context("failed to request the media session registry")?;

    Watcher::new(registry, policy, std::io::stdout())
        .run()
        .await
        .context("watcher stopped")
}

#[cfg(all(test, not(target_os = "windows")))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_registry_is_reported_with_context() {
        let err = run().await.unwrap_err();
        let report = format!("{err:#}");
        assert!(report.starts_with("failed to request the media session registry"));
        assert!(report.contains("no media session registry"));
    }
}
