use anyhow::Result;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    crypto_dashboard::app::run().await?;
    Ok(())
}
