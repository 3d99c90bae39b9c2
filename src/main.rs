use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    geoperm_cli::cli::app::run().await
}
