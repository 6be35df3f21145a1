use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let run = quota_run::build(quota_run::ENV_PREFIX)?;
    let snapshot = run.execute().await?;

    match run.store_path() {
        Some(path) => {
            std::fs::write(path, snapshot.to_json()?)?;
            println!("[quota-run] store written to {path}");
        }
        None => println!("{}", snapshot.to_json()?),
    }

    Ok(())
}
