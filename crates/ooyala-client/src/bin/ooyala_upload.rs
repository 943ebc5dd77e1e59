//! Upload a local file as the content of an existing asset.
//!
//! Usage: `ooyala-upload <embed-code> <file>`

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ooyala_client::OoyalaClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ooyala_client=info,ooyala_upload=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true))
            .with(env_filter)
            .init();
    }

    let mut args = std::env::args().skip(1);
    let (embed_code, path) = match (args.next(), args.next()) {
        (Some(embed_code), Some(path)) => (embed_code, path),
        _ => bail!("usage: ooyala-upload <embed-code> <file>"),
    };

    let client = OoyalaClient::from_env().context("Failed to create Ooyala client")?;

    let payload = tokio::fs::read(&path)
        .await
        .with_context(|| format!("Failed to read {}", path))?;
    info!(embed_code = %embed_code, bytes = payload.len(), "Uploading {}", path);

    let status = client
        .upload_full_asset(&embed_code, payload)
        .await
        .with_context(|| format!("Upload failed for asset {}", embed_code))?;

    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
