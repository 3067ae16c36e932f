mod config;
mod shell;

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

use ember_backend::{Backend, HttpBackend, SimulatedBackend};
use ember_client::NotificationCenter;

use config::Config;
use shell::{App, Step};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Logs go to stderr so they do not interleave with shell output
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ember=info,ember_client=info".into()),
        )
        .init();

    let config = Config::from_env()?;

    let backend: Arc<dyn Backend> = match (&config.api_url, config.use_test_data()) {
        (Some(url), false) => {
            info!(%url, "using remote backend");
            Arc::new(
                HttpBackend::new(url, config.api_token.clone(), config.request_timeout)
                    .context("failed to build HTTP client")?,
            )
        }
        _ => {
            info!("using sample data");
            Arc::new(SimulatedBackend::default())
        }
    };

    let mut app = App::new(backend, NotificationCenter::new(), config.user_id, config.swipe);

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    stdout.write_all(b"ember - type 'help' for commands\n> ").await?;
    stdout.flush().await?;

    while let Some(line) = lines.next_line().await? {
        match app.handle(&line).await {
            Step::Continue(out) => {
                if !out.is_empty() {
                    stdout.write_all(out.as_bytes()).await?;
                    stdout.write_all(b"\n").await?;
                }
                stdout.write_all(b"> ").await?;
                stdout.flush().await?;
            }
            Step::Quit => break,
        }
    }

    app.shutdown().await;
    info!("bye");
    Ok(())
}
