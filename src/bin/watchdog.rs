#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = prepdeck_engine::run_watchdog().await {
        eprintln!("prepdeck-watchdog fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
