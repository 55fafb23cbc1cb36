use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    paperpilot_cli::cli::app::run().await
}
