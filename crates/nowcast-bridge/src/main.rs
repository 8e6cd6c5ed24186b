use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use nowcast_bridge::cli::Args;
use nowcast_bridge::{
    logging, server, supervisor, BridgeConfig, LaunchTarget, NowPlayingHub, Supervisor,
};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = BridgeConfig::load(args.config.as_deref()).context("failed to load config")?;
    config.apply_env(|key| std::env::var(key).ok());
    config.apply_args(&args);

    let _log_guard = logging::init(&config.logging);

    let policy = config.filter.policy();
    info!(allow = %policy.to_env_value(), "allow-list active");
    let hub = Arc::new(NowPlayingHub::new(policy));

    let public_dir = if config.server.public_dir.is_dir() {
        info!(dir = %config.server.public_dir.display(), "serving overlay assets");
        Some(config.server.public_dir.as_path())
    } else {
        warn!(
            dir = %config.server.public_dir.display(),
            "overlay directory not found; static serving disabled"
        );
        None
    };
    let app = server::router(Arc::clone(&hub), public_dir);

    let listener = TcpListener::bind((config.server.bind.as_str(), config.server.port))
        .await
        .with_context(|| {
            format!(
                "failed to bind {}:{}",
                config.server.bind, config.server.port
            )
        })?;
    info!("bridge listening on http://{}", listener.local_addr()?);

    let cwd = std::env::current_dir().context("cannot read working directory")?;
    let watcher = match supervisor::resolve_watcher(&cwd, config.watcher.path.as_deref()) {
        Ok(program) => {
            info!(path = %program.display(), "found watcher binary");
            let supervisor = Supervisor::new(
                LaunchTarget::new(program),
                Arc::clone(&hub),
                config.watcher.restart_delay(),
            );
            Some(tokio::spawn(supervisor.run()))
        }
        Err(e) => {
            supervisor::report_missing(&e);
            None
        }
    };

    server::serve(listener, app, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutting down (ctrl-c)");
    })
    .await?;

    // Dropping the supervisor future drops the child, which kills it.
    if let Some(task) = watcher {
        task.abort();
        let _ = task.await;
    }
    Ok(())
}
