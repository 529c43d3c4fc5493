use anyhow::{Context, Result};
use reqwest::Method;

use ci_client::config::{CliArgs, Command, Config};
use ci_client::ApiClient;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::load();

    // Load configuration first (for log level)
    let config = Config::from_args(&args)?;

    // Initialize logging with a configured level; stdout is for command output
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::debug!(
        server = %config.server_url,
        credential = %config.credential.mode(),
        "Configuration loaded"
    );

    let client = ApiClient::new(&config).context("Failed to create API client")?;

    match args.command {
        Command::Token => {
            let token = client.token().await.context("Failed to resolve token")?;
            tracing::info!(
                "Resolved token: {}...",
                token.chars().take(12).collect::<String>()
            );
            println!("{}", token);
        }

        Command::Get { path } => {
            let value: serde_json::Value = client
                .call(Method::GET, &path, None)
                .await
                .with_context(|| format!("GET {} failed", path))?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }

        Command::Ping => {
            let status = client.ping().await.context("Server is not reachable")?;
            println!("{} {}", config.server_url, status);
        }
    }

    Ok(())
}
