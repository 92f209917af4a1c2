use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    soulexplorer_cli::cli::run().await
}
