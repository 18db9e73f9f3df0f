mod protocol;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use freshrss_core::{ConfigError, ReaderApi, ReaderConfig, TOOL_NAMES};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let config = match load_config() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    let api = match ReaderApi::new(&config) {
        Ok(api) => api,
        Err(err) => {
            error!(error = %err, "failed to build client");
            return ExitCode::FAILURE;
        }
    };
    info!(url = %config.connection.base_url, tools = TOOL_NAMES.len(), "bridge ready");

    match serve(api).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "bridge stopped");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    // stdout carries responses
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn config_dir() -> PathBuf {
    // Linux: ~/.config/freshrss-bridge
    let mut dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    dir.push("freshrss-bridge");
    dir
}

fn load_config() -> Result<ReaderConfig, ConfigError> {
    let path = config_dir().join("config.json");
    if path.is_file() {
        info!(path = %path.display(), "loading configuration file");
        ReaderConfig::from_file(&path)
    } else {
        debug!("no configuration file, reading environment");
        ReaderConfig::from_env()
    }
}

/// Reads request lines until EOF or Ctrl-C. Requests run concurrently and
/// answer in completion order.
async fn serve(api: ReaderApi) -> io::Result<()> {
    let (tx, mut rx) = mpsc::channel::<String>(64);
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(line) = rx.recv().await {
            stdout.write_all(line.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
        Ok::<_, io::Error>(())
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut requests = JoinSet::new();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => {
                    let api = api.clone();
                    let tx = tx.clone();
                    requests.spawn(async move {
                        let response = protocol::handle_line(&api, &line).await;
                        let _ = tx.send(response.render()).await;
                    });
                }
                None => break,
            },
            Some(joined) = requests.join_next(), if !requests.is_empty() => reap(joined),
            _ = &mut shutdown => {
                info!(in_flight = requests.len(), "interrupted, aborting requests");
                requests.abort_all();
                break;
            }
        }
    }

    debug!(in_flight = requests.len(), "waiting for outstanding requests");
    while let Some(joined) = requests.join_next().await {
        reap(joined);
    }
    drop(tx);
    writer.await.map_err(io::Error::other)?
}

fn reap(joined: Result<(), JoinError>) {
    if let Err(err) = joined {
        if err.is_panic() {
            warn!(error = %err, "request task panicked");
        }
    }
}
