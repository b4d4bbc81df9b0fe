// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use showmirror::{
    ConfigState, Layout, LogReporter, ServerState, SpotifyCatalog, SyncEngine, ZotifyDownloader,
    bootstrap_config, serve,
};

/// Mirror podcast collections from a streaming catalog and publish them as RSS feeds
#[derive(Parser, Debug)]
#[command(name = "showmirror")]
#[command(version)]
struct Args {
    /// Directory holding config.json, the published tree and the staging area
    #[arg(long, env = "SHOWMIRROR_DATA_DIR", default_value = "/data")]
    data_dir: PathBuf,

    /// Run a single sync pass without the HTTP server, then exit
    #[arg(long)]
    once: bool,

    /// Run the sync loop only
    #[arg(long, conflicts_with = "once")]
    no_serve: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let layout = Layout::new(&args.data_dir);
    layout
        .ensure_dirs()
        .context("Failed to prepare data directory")?;
    let config = match bootstrap_config(&layout).context("Configuration is not usable")? {
        ConfigState::Loaded(config) => config,
        ConfigState::TemplateWritten(path) => {
            tracing::warn!(
                path = %path.display(),
                "no config found, wrote a template; fill in credentials and collections, then restart"
            );
            return Ok(());
        }
    };

    let credentials = config.resolved_credentials_path(&layout.data_dir);
    let catalog = SpotifyCatalog::new(&config).context("Failed to set up catalog client")?;
    let engine = SyncEngine::new(
        config.clone(),
        layout.clone(),
        catalog,
        ZotifyDownloader::new(config.downloader.clone(), credentials),
        LogReporter::shared(),
    );
    engine
        .prepare()
        .context("Failed to reset staging directory")?;

    if args.once {
        let summary = engine.run_pass().await;
        if summary.failed > 0 || summary.fetch_failures > 0 {
            std::process::exit(1);
        }
        return Ok(());
    }

    if args.no_serve {
        tokio::spawn(async move { engine.run_forever().await })
            .await
            .context("Sync loop panicked")?;
        bail!("Sync loop stopped unexpectedly");
    }

    // Bind before the first pass starts so a bad address never interrupts a fetch
    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("Failed to listen on {}", config.listen_addr))?;
    let sync_task = tokio::spawn(async move { engine.run_forever().await });
    let state = ServerState {
        base_url: config.base_url.clone(),
        collections: config.collections.clone(),
        output_root: layout.output_root.clone(),
    };
    let server_task = tokio::spawn(serve(listener, state));

    tokio::select! {
        result = sync_task => {
            result.context("Sync loop panicked")?;
            bail!("Sync loop stopped unexpectedly")
        }
        result = server_task => {
            result
                .context("HTTP server panicked")?
                .context("HTTP server failed")?;
            bail!("HTTP server stopped unexpectedly")
        }
    }
}
