use anyhow::{Context, Result};
use entrada::cli;
use rustls::crypto::ring;

#[tokio::main]
async fn main() -> Result<()> {
    // Both sqlx and reqwest link rustls; pick one process-wide provider.
    ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))
        .context("TLS crypto provider initialization failed")?;

    let action = cli::start()?;

    action.execute().await?;

    Ok(())
}
