#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = prepdeck_engine::run().await {
        eprintln!("prepdeck-engine fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
